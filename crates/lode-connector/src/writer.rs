//! The data writer: streams result batches into data files under a table
//! location.
//!
//! Files are encoded in memory with the parquet `ArrowWriter` and uploaded
//! with a `DoesNotExist` precondition under ULID-derived names, which are
//! unique within an attempt without coordination. Uploads run on parallel
//! tasks but the writer joins all of them before returning: the catalog
//! commit must never run while a file write is still in flight.

use std::io::Cursor;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use lode_catalog::FileFormat;
use lode_core::{LocationUri, StorageBackend, WritePrecondition, WriteResult};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use serde::Serialize;
use tokio::task::JoinHandle;
use ulid::Ulid;

use crate::error::{ConnectorError, Result};

/// Provenance record for one written data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    /// Absolute storage path of the file.
    pub path: String,
    /// Number of rows the file contains.
    pub row_count: u64,
    /// File size in bytes.
    pub byte_size: u64,
}

/// Writes a stream of result batches as data files under a location.
pub struct DataWriter {
    storage: Arc<dyn StorageBackend>,
    format: FileFormat,
    target_file_rows: usize,
}

impl std::fmt::Debug for DataWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataWriter")
            .field("format", &self.format)
            .field("target_file_rows", &self.target_file_rows)
            .finish_non_exhaustive()
    }
}

struct FileFailure {
    path: String,
    message: String,
}

impl DataWriter {
    /// Creates a writer that caps files at `target_file_rows` rows.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        format: FileFormat,
        target_file_rows: usize,
    ) -> Self {
        Self {
            storage,
            format,
            target_file_rows: target_file_rows.max(1),
        }
    }

    /// Streams `batches` into data files under `location` and returns the
    /// provenance records for every file written.
    ///
    /// Missing directories are created lazily, just before the first file is
    /// placed; a zero-row source therefore succeeds with zero files and no
    /// storage mutation at all. Every composed file path stays under
    /// `location` by construction.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Write`] if the source yields an error, a
    /// file fails to encode, or any upload fails. The error carries the
    /// files that were already fully written; they are left in place.
    pub async fn write<I>(
        &self,
        location: &LocationUri,
        schema: SchemaRef,
        batches: I,
    ) -> Result<Vec<WrittenFile>>
    where
        I: IntoIterator<Item = Result<RecordBatch>>,
    {
        let mut uploads: Vec<JoinHandle<std::result::Result<WrittenFile, FileFailure>>> =
            Vec::new();
        let mut pending: Vec<RecordBatch> = Vec::new();
        let mut pending_rows = 0usize;
        let mut dir_ready = false;
        let mut abort: Option<String> = None;

        for item in batches {
            let batch = match item {
                Ok(batch) => batch,
                Err(err) => {
                    abort = Some(format!("row source failed: {err}"));
                    break;
                }
            };
            if batch.num_rows() == 0 {
                continue;
            }

            pending_rows += batch.num_rows();
            pending.push(batch);

            if pending_rows >= self.target_file_rows {
                let sealed = std::mem::take(&mut pending);
                pending_rows = 0;
                if let Err(message) =
                    self.launch_upload(location, &schema, sealed, &mut dir_ready, &mut uploads)
                        .await
                {
                    abort = Some(message);
                    break;
                }
            }
        }

        if abort.is_none() && !pending.is_empty() {
            let sealed = std::mem::take(&mut pending);
            if let Err(message) = self
                .launch_upload(location, &schema, sealed, &mut dir_ready, &mut uploads)
                .await
            {
                abort = Some(message);
            }
        }

        // Barrier: every upload task must report before we return, success
        // or not. A partial join here would let the caller commit metadata
        // for files that are still in flight.
        let mut written = Vec::new();
        let mut failures = Vec::new();
        for joined in futures::future::join_all(uploads).await {
            match joined {
                Ok(Ok(file)) => written.push(file),
                Ok(Err(failure)) => failures.push(failure),
                Err(err) => failures.push(FileFailure {
                    path: location.to_string(),
                    message: format!("upload task panicked: {err}"),
                }),
            }
        }
        written.sort_by(|a, b| a.path.cmp(&b.path));

        if let Some(message) = abort {
            return Err(ConnectorError::Write {
                location: location.to_string(),
                message,
                written,
            });
        }
        if let Some(first) = failures.first() {
            return Err(ConnectorError::Write {
                location: location.to_string(),
                message: format!(
                    "{} of {} file uploads failed; first: {} ({})",
                    failures.len(),
                    failures.len() + written.len(),
                    first.path,
                    first.message
                ),
                written,
            });
        }
        Ok(written)
    }

    /// Encodes `batches` into one file and spawns its upload. Returns an
    /// error message (for the `Write` abort path) on encode or directory
    /// failures.
    async fn launch_upload(
        &self,
        location: &LocationUri,
        schema: &SchemaRef,
        batches: Vec<RecordBatch>,
        dir_ready: &mut bool,
        uploads: &mut Vec<JoinHandle<std::result::Result<WrittenFile, FileFailure>>>,
    ) -> std::result::Result<(), String> {
        let rows: u64 = batches.iter().map(|b| b.num_rows() as u64).sum();
        let data = encode_parquet(schema.clone(), &batches)?;

        let file_name = format!("{}.{}", Ulid::new(), self.format.extension());
        let file_path = location
            .join(&file_name)
            .map_err(|err| err.to_string())?
            .path()
            .to_string();

        if !*dir_ready {
            self.storage
                .ensure_dir(location.path())
                .await
                .map_err(|err| format!("creating {location} failed: {err}"))?;
            *dir_ready = true;
        }

        let storage = Arc::clone(&self.storage);
        uploads.push(tokio::spawn(async move {
            let byte_size = data.len() as u64;
            match storage
                .put(&file_path, data, WritePrecondition::DoesNotExist)
                .await
            {
                Ok(WriteResult::Success { .. }) => Ok(WrittenFile {
                    path: file_path,
                    row_count: rows,
                    byte_size,
                }),
                Ok(WriteResult::PreconditionFailed { .. }) => Err(FileFailure {
                    message: "a file with this name already exists".to_string(),
                    path: file_path,
                }),
                Err(err) => Err(FileFailure {
                    message: err.to_string(),
                    path: file_path,
                }),
            }
        }));
        Ok(())
    }
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("lode-connector".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encodes record batches into an in-memory parquet file.
fn encode_parquet(
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> std::result::Result<Bytes, String> {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties()))
        .map_err(|e| format!("parquet writer init failed: {e}"))?;
    for batch in batches {
        writer
            .write(batch)
            .map_err(|e| format!("parquet write failed: {e}"))?;
    }
    writer
        .close()
        .map_err(|e| format!("parquet close failed: {e}"))?;
    Ok(Bytes::from(cursor.into_inner()))
}
