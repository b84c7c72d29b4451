//! The create/validate/write/commit orchestration.

use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use lode_catalog::{columns_from_arrow_schema, Catalog, ColumnDef, StorageDescriptor, TableMetadata};
use lode_core::{LocationUri, StorageBackend};
use tracing::{debug, info, warn};

use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, Result};
use crate::policy::{ConflictPolicy, LocationDecision, RejectReason};
use crate::request::TableCreationRequest;
use crate::resolver::LocationResolver;
use crate::validator::LocationValidator;
use crate::writer::{DataWriter, WrittenFile};

/// Result of a successful create-table statement.
#[derive(Debug, Clone)]
pub struct CreateTableOutcome {
    /// The committed catalog metadata.
    pub table: TableMetadata,
    /// The resolved location the table was created at.
    pub location: LocationUri,
    /// The statement's update count.
    pub rows_written: u64,
    /// Provenance records for the files written by this statement.
    pub files: Vec<WrittenFile>,
}

/// The external-table connector.
///
/// One instance per engine, shared by sessions. Holds the storage backend
/// the external locations live on, the process-wide catalog, and the
/// connector configuration.
pub struct ExternalTableConnector {
    storage: Arc<dyn StorageBackend>,
    catalog: Arc<Catalog>,
    config: ConnectorConfig,
}

impl std::fmt::Debug for ExternalTableConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalTableConnector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExternalTableConnector {
    /// Creates a connector.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        catalog: Arc<Catalog>,
        config: ConnectorConfig,
    ) -> Self {
        Self {
            storage,
            catalog,
            config,
        }
    }

    /// Returns the catalog this connector commits into.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Executes a schema-only `CREATE TABLE ... WITH (external_location)`.
    ///
    /// The location is resolved and validated exactly as for the `AS SELECT`
    /// form, but nothing is written: directory creation is deferred until a
    /// writer first places a file there. On success the catalog entry's
    /// location is the resolved URI.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::InvalidRequest`] if no columns are
    /// declared, plus every failure mode of the resolve/validate/commit
    /// pipeline.
    pub async fn create_table(&self, request: &TableCreationRequest) -> Result<CreateTableOutcome> {
        if request.columns().is_empty() {
            return Err(ConnectorError::invalid_request(
                "a table without AS SELECT must declare at least one column",
            ));
        }

        let location = self.prepare(request).await?;
        let metadata = self.build_metadata(request, request.columns().to_vec(), &location);
        self.commit(metadata.clone(), &[])?;

        Ok(CreateTableOutcome {
            table: metadata,
            location,
            rows_written: 0,
            files: Vec::new(),
        })
    }

    /// Executes `CREATE TABLE ... WITH (external_location) AS SELECT`.
    ///
    /// Pipeline: resolve → classify → decide → write → commit. Every data
    /// file is durable before the catalog commit runs, so a reader can never
    /// observe the table name with missing or partial data. If the commit
    /// loses a name race, the files written by this attempt stay orphaned
    /// under the location; they are reported, not deleted.
    ///
    /// # Errors
    ///
    /// Surfaces the first failure of any pipeline step; see
    /// [`ConnectorError`] for the kinds. No automatic retry, no cleanup.
    pub async fn create_table_as_select<I>(
        &self,
        request: &TableCreationRequest,
        source_schema: SchemaRef,
        batches: I,
    ) -> Result<CreateTableOutcome>
    where
        I: IntoIterator<Item = Result<RecordBatch>>,
    {
        let location = self.prepare(request).await?;

        let columns = if request.columns().is_empty() {
            columns_from_arrow_schema(&source_schema)?
        } else {
            if request.columns().len() != source_schema.fields().len() {
                return Err(ConnectorError::invalid_request(format!(
                    "declared {} columns but the query produces {}",
                    request.columns().len(),
                    source_schema.fields().len()
                )));
            }
            request.columns().to_vec()
        };

        let writer = DataWriter::new(
            Arc::clone(&self.storage),
            self.config.file_format,
            self.config.target_file_rows,
        );
        let files = writer.write(&location, source_schema, batches).await?;
        let rows_written: u64 = files.iter().map(|f| f.row_count).sum();

        let metadata = self.build_metadata(request, columns, &location);
        self.commit(metadata.clone(), &files)?;

        info!(
            table = request.name(),
            %location,
            rows = rows_written,
            files = files.len(),
            "created external table"
        );

        Ok(CreateTableOutcome {
            table: metadata,
            location,
            rows_written,
            files,
        })
    }

    /// Executes `DROP TABLE` for an external table.
    ///
    /// Removes only the catalog entry; the location and its data files are
    /// never deleted by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`lode_catalog::CatalogError::NotFound`] (wrapped) if the
    /// table is not registered.
    pub fn drop_table(&self, name: &str) -> Result<TableMetadata> {
        let metadata = self.catalog.drop_table(name)?;
        info!(
            table = name,
            location = %metadata.storage.location,
            "dropped external table; data files retained"
        );
        Ok(metadata)
    }

    /// Resolve the location and run the classification + policy gate.
    ///
    /// The classification is taken fresh here, immediately before the
    /// decision; it is never cached across attempts.
    async fn prepare(&self, request: &TableCreationRequest) -> Result<LocationUri> {
        let location = LocationResolver::resolve(&self.config, request)?;
        let state = LocationValidator::classify(self.storage.as_ref(), &location).await?;
        debug!(table = request.name(), %location, state = %state, "classified target location");

        match ConflictPolicy::decide(&state) {
            LocationDecision::Proceed => Ok(location),
            LocationDecision::Reject(RejectReason::TargetExists { .. }) => {
                Err(ConnectorError::TargetDirectoryExists {
                    table: request.name().to_string(),
                    path: location.to_string(),
                })
            }
            LocationDecision::Reject(RejectReason::Inaccessible { reason }) => {
                Err(ConnectorError::LocationAccess {
                    path: location.to_string(),
                    reason,
                })
            }
        }
    }

    fn build_metadata(
        &self,
        request: &TableCreationRequest,
        columns: Vec<ColumnDef>,
        location: &LocationUri,
    ) -> TableMetadata {
        TableMetadata::new(
            request.name(),
            columns,
            StorageDescriptor::external(location.to_string(), self.config.file_format),
            Utc::now(),
        )
    }

    /// The single visibility point: the catalog's atomic, name-unique
    /// insert. A lost race leaves this attempt's files orphaned under the
    /// location, which is reported and left for the user to inspect.
    fn commit(&self, metadata: TableMetadata, files: &[WrittenFile]) -> Result<()> {
        if let Err(err) = self.catalog.register_table(metadata) {
            if !files.is_empty() {
                warn!(
                    files = files.len(),
                    error = %err,
                    "catalog commit failed; data files left orphaned under the table location"
                );
            }
            return Err(err.into());
        }
        Ok(())
    }
}
