//! Read-back of external table data, with per-row path introspection.
//!
//! The scanner exposes the provenance record the writer produced: every row
//! of an external table can report the physical data file it was read from
//! through the `$path` pseudo-column.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use lode_catalog::{FileFormat, TableMetadata};
use lode_core::{LocationUri, StorageBackend};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{ConnectorError, Result};
use crate::writer::WrittenFile;

/// Name of the per-row file-path introspection pseudo-column.
pub const PATH_COLUMN: &str = "$path";

/// Reads external table data files back into record batches.
pub struct TableScanner {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for TableScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableScanner").finish_non_exhaustive()
    }
}

impl TableScanner {
    /// Creates a scanner over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Lists the data files under a table location, sorted by path.
    ///
    /// Row counts come from the parquet footers, so this is the same
    /// provenance record the writer returned, recovered from storage alone.
    ///
    /// # Errors
    ///
    /// Fails if the listing fails or any data file's footer is unreadable.
    pub async fn list_files(
        &self,
        location: &LocationUri,
        format: FileFormat,
    ) -> Result<Vec<WrittenFile>> {
        let prefix = format!("{}/", location.path());
        let suffix = format!(".{}", format.extension());

        let mut entries = self.storage.list(&prefix).await?;
        entries.retain(|meta| meta.path.ends_with(&suffix));
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut files = Vec::with_capacity(entries.len());
        for meta in entries {
            let data = self.storage.get(&meta.path).await?;
            let reader = open_file(&meta.path, &data)?;
            let row_count = u64::try_from(reader.metadata().file_metadata().num_rows())
                .unwrap_or_default();
            files.push(WrittenFile {
                path: meta.path,
                row_count,
                byte_size: meta.size,
            });
        }
        Ok(files)
    }

    /// Reads every data file of `table` back into record batches.
    ///
    /// # Errors
    ///
    /// Fails if the table location is malformed, the listing fails, or a
    /// data file cannot be decoded.
    pub async fn scan(&self, table: &TableMetadata) -> Result<Vec<RecordBatch>> {
        Ok(self
            .scan_files(table)
            .await?
            .into_iter()
            .flat_map(|(_, batches)| batches)
            .collect())
    }

    /// Like [`TableScanner::scan`], with a trailing `$path` column on every
    /// batch carrying the physical file path each row was read from.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TableScanner::scan`].
    pub async fn scan_with_paths(&self, table: &TableMetadata) -> Result<Vec<RecordBatch>> {
        let mut out = Vec::new();
        for (path, batches) in self.scan_files(table).await? {
            for batch in batches {
                out.push(append_path_column(&batch, &path)?);
            }
        }
        Ok(out)
    }

    async fn scan_files(&self, table: &TableMetadata) -> Result<Vec<(String, Vec<RecordBatch>)>> {
        let location = LocationUri::parse(&table.storage.location)?;
        let files = self.list_files(&location, table.storage.format).await?;

        let mut out = Vec::with_capacity(files.len());
        for file in files {
            let data = self.storage.get(&file.path).await?;
            let batches = read_batches(&file.path, &data)?;
            out.push((file.path, batches));
        }
        Ok(out)
    }
}

fn open_file(
    path: &str,
    data: &Bytes,
) -> Result<ParquetRecordBatchReaderBuilder<Bytes>> {
    ParquetRecordBatchReaderBuilder::try_new(data.clone()).map_err(|e| ConnectorError::DataFile {
        path: path.to_string(),
        message: format!("parquet reader init failed: {e}"),
    })
}

fn read_batches(path: &str, data: &Bytes) -> Result<Vec<RecordBatch>> {
    let reader = open_file(path, data)?
        .build()
        .map_err(|e| ConnectorError::DataFile {
            path: path.to_string(),
            message: format!("parquet reader build failed: {e}"),
        })?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| ConnectorError::DataFile {
            path: path.to_string(),
            message: format!("parquet read batch failed: {e}"),
        })?;
        batches.push(batch);
    }
    Ok(batches)
}

fn append_path_column(batch: &RecordBatch, path: &str) -> Result<RecordBatch> {
    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.push(Field::new(PATH_COLUMN, DataType::Utf8, false));
    let schema: SchemaRef = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    let paths: Vec<&str> = std::iter::repeat(path).take(batch.num_rows()).collect();
    columns.push(Arc::new(StringArray::from(paths)));

    RecordBatch::try_new(schema, columns).map_err(|e| ConnectorError::DataFile {
        path: path.to_string(),
        message: format!("attaching {PATH_COLUMN} failed: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use chrono::Utc;
    use lode_catalog::{ColumnDef, ColumnType, StorageDescriptor};
    use lode_core::MemoryBackend;

    use crate::writer::DataWriter;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]))
    }

    fn batch(ids: &[i64]) -> RecordBatch {
        RecordBatch::try_new(schema(), vec![Arc::new(Int64Array::from(ids.to_vec()))])
            .expect("batch")
    }

    fn table(location: &str) -> TableMetadata {
        TableMetadata::new(
            "t1",
            vec![ColumnDef::new("id", ColumnType::BigInt).not_null()],
            StorageDescriptor::external(location, FileFormat::Parquet),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn scan_returns_written_rows_with_paths() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let location = LocationUri::parse("memory:///tables/t1").unwrap();

        let writer = DataWriter::new(Arc::clone(&storage), FileFormat::Parquet, 2);
        let written = writer
            .write(
                &location,
                schema(),
                vec![Ok(batch(&[1, 2])), Ok(batch(&[3]))],
            )
            .await
            .unwrap();
        assert_eq!(written.len(), 2);

        let scanner = TableScanner::new(storage);
        let table = table("memory:///tables/t1");

        let rows: u64 = scanner
            .scan(&table)
            .await
            .unwrap()
            .iter()
            .map(|b| b.num_rows() as u64)
            .sum();
        assert_eq!(rows, 3);

        for batch in scanner.scan_with_paths(&table).await.unwrap() {
            let idx = batch.schema().index_of(PATH_COLUMN).expect("$path column");
            let paths = batch
                .column(idx)
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("string column")
                .clone();
            for row in 0..batch.num_rows() {
                assert!(location.contains_path(paths.value(row)));
            }
        }
    }

    #[tokio::test]
    async fn list_files_recovers_provenance_from_storage() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let location = LocationUri::parse("memory:///tables/t1").unwrap();

        let writer = DataWriter::new(Arc::clone(&storage), FileFormat::Parquet, 10);
        let written = writer
            .write(&location, schema(), vec![Ok(batch(&[1, 2, 3]))])
            .await
            .unwrap();

        let scanner = TableScanner::new(storage);
        let listed = scanner
            .list_files(&location, FileFormat::Parquet)
            .await
            .unwrap();
        assert_eq!(listed, written);
    }
}
