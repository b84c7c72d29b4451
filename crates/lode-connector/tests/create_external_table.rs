//! Integration tests for the external-table create/validate/write/commit
//! protocol against the in-memory backend.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use lode_catalog::{Catalog, ColumnDef, ColumnType};
use lode_connector::{
    ConnectorConfig, ConnectorError, ErrorReporter, ExternalTableConnector, TableCreationRequest,
    TableScanner, PATH_COLUMN,
};
use lode_core::{
    Error as CoreError, LocationUri, MemoryBackend, ObjectMeta, Result as CoreResult,
    StorageBackend, WritePrecondition, WriteResult,
};

fn nation_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("nation_key", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("region_key", DataType::Int64, false),
    ]))
}

fn nation_rows() -> Vec<(i64, String, i64)> {
    (0..25)
        .map(|i| (i, format!("nation-{i:02}"), i % 5))
        .collect()
}

fn nation_batch(rows: &[(i64, String, i64)]) -> RecordBatch {
    RecordBatch::try_new(
        nation_schema(),
        vec![
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.1.clone()).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            )),
        ],
    )
    .expect("batch")
}

/// The 25-row source relation, split over several batches.
fn nation_batches() -> Vec<lode_connector::Result<RecordBatch>> {
    let rows = nation_rows();
    vec![
        Ok(nation_batch(&rows[0..10])),
        Ok(nation_batch(&rows[10..20])),
        Ok(nation_batch(&rows[20..25])),
    ]
}

fn collect_rows(batches: &[RecordBatch]) -> Vec<(i64, String, i64)> {
    let mut out = Vec::new();
    for batch in batches {
        let keys = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("nation_key");
        let names = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("name");
        let regions = batch
            .column(2)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("region_key");
        for row in 0..batch.num_rows() {
            out.push((keys.value(row), names.value(row).to_string(), regions.value(row)));
        }
    }
    out.sort();
    out
}

fn connector(
    backend: Arc<dyn StorageBackend>,
    config: ConnectorConfig,
) -> ExternalTableConnector {
    ExternalTableConnector::new(backend, Arc::new(Catalog::new()), config)
}

#[tokio::test]
async fn create_external_as_select_round_trips() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let connector = connector(Arc::clone(&backend), ConnectorConfig::default());

    let request = TableCreationRequest::external("test_create_external_as_select")
        .with_external_location("memory:///external/nation");

    let outcome = connector
        .create_table_as_select(&request, nation_schema(), nation_batches())
        .await
        .expect("create should succeed");

    // The statement's update count is the source row count.
    assert_eq!(outcome.rows_written, 25);
    assert_eq!(outcome.location.to_string(), "memory:///external/nation");

    // The catalog entry's location is the resolved URI exactly, and it
    // prefixes every written file.
    let table = connector
        .catalog()
        .get_table("test_create_external_as_select")
        .expect("catalog entry");
    assert_eq!(table.storage.location, "memory:///external/nation");
    assert!(table.storage.external);
    assert!(!outcome.files.is_empty());
    for file in &outcome.files {
        assert!(outcome.location.contains_path(&file.path));
    }

    // Reading the table back returns exactly the source relation,
    // order-independent.
    let scanner = TableScanner::new(Arc::clone(&backend));
    let scanned = scanner.scan(&table).await.expect("scan");
    assert_eq!(collect_rows(&scanned), nation_rows());

    // Every row reports a physical path under the table location.
    for batch in scanner.scan_with_paths(&table).await.expect("scan paths") {
        let idx = batch.schema().index_of(PATH_COLUMN).expect("$path");
        let paths = batch
            .column(idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("string column")
            .clone();
        for row in 0..batch.num_rows() {
            assert!(
                outcome.location.contains_path(paths.value(row)),
                "row path {} should be under the table location",
                paths.value(row)
            );
        }
    }
}

#[tokio::test]
async fn existing_directory_fails_without_writing() {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .put(
            "/external/occupied/preexisting.bin",
            Bytes::from("not ours"),
            WritePrecondition::None,
        )
        .await
        .unwrap();

    let connector = connector(
        Arc::clone(&backend) as Arc<dyn StorageBackend>,
        ConnectorConfig::default(),
    );
    let request = TableCreationRequest::external("test_create_external_exists")
        .with_external_location("memory:///external/occupied");

    for _ in 0..2 {
        // Failing is idempotent: same error kind on every attempt.
        let err = connector
            .create_table_as_select(&request, nation_schema(), nation_batches())
            .await
            .expect_err("occupied target must be rejected");
        assert!(
            matches!(err, ConnectorError::TargetDirectoryExists { .. }),
            "got {err}"
        );

        let diagnostic = ErrorReporter::diagnose(&err);
        assert!(diagnostic.message.contains("already exists"));
        assert!(diagnostic.message.contains("memory:///external/occupied"));

        // No new files, no catalog entry, directory contents unchanged.
        let listed = backend.list("/external/occupied/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "/external/occupied/preexisting.bin");
        assert!(connector
            .catalog()
            .get_table("test_create_external_exists")
            .is_none());
    }
}

#[tokio::test]
async fn schema_only_create_at_missing_path_writes_nothing() {
    let backend = Arc::new(MemoryBackend::new());
    let connector = connector(
        Arc::clone(&backend) as Arc<dyn StorageBackend>,
        ConnectorConfig::default(),
    );

    let request = TableCreationRequest::external("test_create_external_not_exists")
        .with_columns(vec![
            ColumnDef::new("id", ColumnType::BigInt),
            ColumnDef::new("name", ColumnType::Varchar),
        ])
        .with_external_location("memory:///external/not-yet-there");

    let outcome = connector.create_table(&request).await.expect("create");
    assert_eq!(outcome.rows_written, 0);
    assert!(outcome.files.is_empty());

    let table = connector
        .catalog()
        .get_table("test_create_external_not_exists")
        .expect("catalog entry");
    assert_eq!(table.storage.location, "memory:///external/not-yet-there");
    assert_eq!(table.columns.len(), 2);

    // Zero writes: the location is still untouched.
    assert!(backend.list("/external/not-yet-there/").await.unwrap().is_empty());
}

#[tokio::test]
async fn schema_only_create_requires_columns() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let connector = connector(backend, ConnectorConfig::default());

    let request = TableCreationRequest::external("no_columns")
        .with_external_location("memory:///external/no-columns");

    let err = connector.create_table(&request).await.unwrap_err();
    assert!(matches!(err, ConnectorError::InvalidRequest { .. }));
}

#[tokio::test]
async fn drop_table_keeps_data_files() {
    let backend = Arc::new(MemoryBackend::new());
    let connector = connector(
        Arc::clone(&backend) as Arc<dyn StorageBackend>,
        ConnectorConfig::default(),
    );

    let request = TableCreationRequest::external("droppable")
        .with_external_location("memory:///external/droppable");
    let outcome = connector
        .create_table_as_select(&request, nation_schema(), nation_batches())
        .await
        .expect("create");

    connector.drop_table("droppable").expect("drop");
    assert!(connector.catalog().get_table("droppable").is_none());

    // The catalog entry is gone but a direct storage listing still shows
    // every data file.
    let listed = backend.list("/external/droppable/").await.unwrap();
    assert_eq!(listed.len(), outcome.files.len());

    // Dropping again reports the missing table.
    let err = connector.drop_table("droppable").unwrap_err();
    assert_eq!(ErrorReporter::diagnose(&err).error_code, "TABLE_NOT_FOUND");
}

#[tokio::test]
async fn disabled_external_locations_are_rejected_before_any_io() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let config = ConnectorConfig::default().with_allow_external_location(false);
    let connector = connector(backend, config);

    let request = TableCreationRequest::external("gated")
        .with_external_location("memory:///external/gated");

    let err = connector
        .create_table_as_select(&request, nation_schema(), nation_batches())
        .await
        .unwrap_err();
    assert_eq!(ErrorReporter::diagnose(&err).error_code, "INVALID_LOCATION");
}

/// Backend wrapper that fails one put by 1-based attempt index, for
/// exercising the partial-write error path.
#[derive(Debug)]
struct FailNthPutBackend {
    inner: MemoryBackend,
    attempts: AtomicUsize,
    fail_attempt: usize,
}

impl FailNthPutBackend {
    fn new(fail_attempt: usize) -> Self {
        Self {
            inner: MemoryBackend::new(),
            attempts: AtomicUsize::new(0),
            fail_attempt,
        }
    }
}

#[async_trait]
impl StorageBackend for FailNthPutBackend {
    fn scheme(&self) -> &'static str {
        self.inner.scheme()
    }

    async fn get(&self, path: &str) -> CoreResult<Bytes> {
        self.inner.get(path).await
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> CoreResult<WriteResult> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_attempt {
            return Err(CoreError::storage(format!(
                "injected write failure: {path}"
            )));
        }
        self.inner.put(path, data, precondition).await
    }

    async fn delete(&self, path: &str) -> CoreResult<()> {
        self.inner.delete(path).await
    }

    async fn list(&self, prefix: &str) -> CoreResult<Vec<ObjectMeta>> {
        self.inner.list(prefix).await
    }

    async fn head(&self, path: &str) -> CoreResult<Option<ObjectMeta>> {
        self.inner.head(path).await
    }
}

#[tokio::test]
async fn failed_upload_leaves_partial_files_and_no_catalog_entry() {
    let backend = Arc::new(FailNthPutBackend::new(2));
    let config = ConnectorConfig::default().with_target_file_rows(10);
    let connector = connector(Arc::clone(&backend) as Arc<dyn StorageBackend>, config);

    let request = TableCreationRequest::external("partial")
        .with_external_location("memory:///external/partial");

    let err = connector
        .create_table_as_select(&request, nation_schema(), nation_batches())
        .await
        .expect_err("one upload fails");

    match &err {
        ConnectorError::Write { written, .. } => {
            // 25 rows at 10 per file is three uploads; exactly one was
            // injected to fail.
            assert_eq!(written.len(), 2);
            for file in written {
                assert!(file.path.starts_with("/external/partial/"));
            }
        }
        other => panic!("expected Write error, got {other}"),
    }
    assert_eq!(ErrorReporter::diagnose(&err).error_code, "WRITE_FAILED");

    // Fatal for the attempt: no catalog entry, files left for inspection.
    assert!(connector.catalog().get_table("partial").is_none());
    let leftovers = backend.list("/external/partial/").await.unwrap();
    assert_eq!(leftovers.len(), 2);
}

#[tokio::test]
async fn default_location_is_derived_under_the_warehouse_root() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let connector = connector(backend, ConnectorConfig::new("memory:///wh"));

    let request = TableCreationRequest::external("managed_external");
    let outcome = connector
        .create_table_as_select(&request, nation_schema(), nation_batches())
        .await
        .expect("create");

    assert_eq!(
        outcome.location.to_string(),
        "memory:///wh/external/managed_external"
    );
    let location = LocationUri::parse("memory:///wh/external/managed_external").unwrap();
    for file in &outcome.files {
        assert!(location.contains_path(&file.path));
    }
}
