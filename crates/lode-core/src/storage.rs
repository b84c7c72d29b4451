//! Storage backend abstraction for table data locations.
//!
//! This module defines the storage contract the connector writes through.
//! The contract is object-storage-shaped:
//!
//! - Conditional writes with preconditions (CAS-style)
//! - Object metadata including `last_modified` and a version token
//! - Prefix listing for provenance and location inspection
//!
//! The version token is an opaque `String` so different backends can supply
//! whatever their native notion of a version is (numeric generation, `ETag`,
//! mtime). Nothing in the connector interprets it beyond equality.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Precondition for conditional writes (CAS operations).
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the object does not exist.
    DoesNotExist,
    /// Write only if the object's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed, returns the current version token.
    PreconditionFailed {
        /// The version that caused the precondition to fail.
        current_version: String,
    },
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Opaque version token for CAS operations.
    pub version: String,
    /// Last modification timestamp, when the backend tracks one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Observed state of a storage location.
///
/// Derived fresh on every classification call and never cached: the
/// namespace under a location can change concurrently, so a classification
/// is only meaningful for the decision made immediately after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationState {
    /// Nothing exists at the path.
    Absent,
    /// The path is a directory with no entries.
    EmptyDirectory,
    /// The path is a directory containing at least one entry.
    NonEmptyDirectory {
        /// Number of direct entries observed.
        entries: usize,
    },
    /// The path exists but is not a directory, or inspecting it failed.
    Inaccessible {
        /// Why the location could not be used.
        reason: String,
    },
}

impl fmt::Display for LocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("absent"),
            Self::EmptyDirectory => f.write_str("empty directory"),
            Self::NonEmptyDirectory { entries } => {
                write!(f, "non-empty directory ({entries} entries)")
            }
            Self::Inaccessible { reason } => write!(f, "inaccessible ({reason})"),
        }
    }
}

/// Storage backend trait for table data locations.
///
/// All backends (local filesystem, in-memory) implement this trait. Paths
/// are absolute, `/`-separated keys; for filesystem backends they are real
/// filesystem paths.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Returns the URI scheme this backend serves (`file`, `memory`).
    fn scheme(&self) -> &'static str;

    /// Reads an entire object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes with an optional precondition.
    ///
    /// Returns [`WriteResult::PreconditionFailed`] if the precondition is not
    /// met. A failed precondition is a normal result, never an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures.
    async fn put(&self, path: &str, data: Bytes, precondition: WritePrecondition)
        -> Result<WriteResult>;

    /// Deletes an object. Succeeds even if the object doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists objects under the given prefix, in arbitrary order.
    ///
    /// Callers requiring deterministic order must sort the results.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if no object exists at exactly `path`. Directories are
    /// not objects.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;

    /// Classifies the state of a location.
    ///
    /// The default implementation uses object-store semantics, where
    /// directories exist only implicitly: an object at exactly `path` makes
    /// the location unusable as a directory, any key under `path/` makes it
    /// non-empty, and otherwise it is absent. Backends with real directories
    /// override this with a stat, which additionally distinguishes
    /// [`LocationState::EmptyDirectory`].
    ///
    /// I/O failures during classification are reported as
    /// [`LocationState::Inaccessible`], not as errors.
    async fn classify(&self, path: &str) -> LocationState {
        match self.head(path).await {
            Ok(Some(_)) => {
                return LocationState::Inaccessible {
                    reason: format!("an object exists at {path}; not a directory"),
                };
            }
            Ok(None) => {}
            Err(err) => {
                return LocationState::Inaccessible {
                    reason: err.to_string(),
                };
            }
        }

        let prefix = format!("{}/", path.trim_end_matches('/'));
        match self.list(&prefix).await {
            Ok(entries) if entries.is_empty() => LocationState::Absent,
            Ok(entries) => LocationState::NonEmptyDirectory {
                entries: entries.len(),
            },
            Err(err) => LocationState::Inaccessible {
                reason: err.to_string(),
            },
        }
    }

    /// Creates the directory at `path` and any missing ancestors.
    ///
    /// A no-op for backends where directories exist only implicitly.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures.
    async fn ensure_dir(&self, path: &str) -> Result<()> {
        let _ = path;
        Ok(())
    }
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Uses numeric versions internally (stored as
/// strings) to simulate object-store generation semantics.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: i64,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn scheme(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let current = objects.get(path);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(obj) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: obj.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match current {
                    Some(obj) if obj.version != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: obj.version.to_string(),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: "0".to_string(),
                        });
                    }
                    _ => {}
                }
            }
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |o| o.version + 1);
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
                last_modified: Utc::now(),
            },
        );
        drop(objects);

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| ObjectMeta {
                path: path.clone(),
                size: obj.data.len() as u64,
                version: obj.version.to_string(),
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects.get(path).map(|obj| ObjectMeta {
            path: path.to_string(),
            size: obj.data.len() as u64,
            version: obj.version.to_string(),
            last_modified: Some(obj.last_modified),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello world");

        let result = backend
            .put("warehouse/file.bin", data.clone(), WritePrecondition::None)
            .await
            .expect("put should succeed");
        assert!(matches!(result, WriteResult::Success { ref version } if version == "1"));

        let retrieved = backend
            .get("warehouse/file.bin")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn get_missing_object_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn precondition_does_not_exist() {
        let backend = MemoryBackend::new();

        let result = backend
            .put("new.bin", Bytes::from("data"), WritePrecondition::DoesNotExist)
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::Success { .. }));

        let result = backend
            .put("new.bin", Bytes::from("data2"), WritePrecondition::DoesNotExist)
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn precondition_matches_version() {
        let backend = MemoryBackend::new();

        let result = backend
            .put("gen.bin", Bytes::from("v1"), WritePrecondition::None)
            .await
            .expect("should succeed");
        let first_version = match result {
            WriteResult::Success { version } => version,
            WriteResult::PreconditionFailed { .. } => panic!("expected success"),
        };

        let result = backend
            .put(
                "gen.bin",
                Bytes::from("v2"),
                WritePrecondition::MatchesVersion(first_version.clone()),
            )
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::Success { .. }));

        let result = backend
            .put(
                "gen.bin",
                Bytes::from("v3"),
                WritePrecondition::MatchesVersion(first_version),
            )
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn list_with_prefix() {
        let backend = MemoryBackend::new();

        backend
            .put("/a/1.bin", Bytes::from("a1"), WritePrecondition::None)
            .await
            .unwrap();
        backend
            .put("/a/2.bin", Bytes::from("a2"), WritePrecondition::None)
            .await
            .unwrap();
        backend
            .put("/b/1.bin", Bytes::from("b1"), WritePrecondition::None)
            .await
            .unwrap();

        let list_a = backend.list("/a/").await.expect("should succeed");
        assert_eq!(list_a.len(), 2);

        let list_b = backend.list("/b/").await.expect("should succeed");
        assert_eq!(list_b.len(), 1);
    }

    #[tokio::test]
    async fn classify_absent_location() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.classify("/tables/t1").await, LocationState::Absent);
    }

    #[tokio::test]
    async fn classify_location_with_entries() {
        let backend = MemoryBackend::new();
        backend
            .put("/tables/t1/part.bin", Bytes::from("x"), WritePrecondition::None)
            .await
            .unwrap();

        assert_eq!(
            backend.classify("/tables/t1").await,
            LocationState::NonEmptyDirectory { entries: 1 }
        );
    }

    #[tokio::test]
    async fn classify_object_at_path_is_inaccessible() {
        let backend = MemoryBackend::new();
        backend
            .put("/tables/t1", Bytes::from("x"), WritePrecondition::None)
            .await
            .unwrap();

        let state = backend.classify("/tables/t1").await;
        assert!(matches!(state, LocationState::Inaccessible { .. }));
    }

    #[tokio::test]
    async fn classify_sibling_prefix_is_not_confused() {
        // /tables/t10 must not count as an entry of /tables/t1.
        let backend = MemoryBackend::new();
        backend
            .put("/tables/t10/part.bin", Bytes::from("x"), WritePrecondition::None)
            .await
            .unwrap();

        assert_eq!(backend.classify("/tables/t1").await, LocationState::Absent);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = MemoryBackend::new();
        backend
            .put("del.bin", Bytes::from("data"), WritePrecondition::None)
            .await
            .unwrap();

        backend.delete("del.bin").await.expect("should succeed");
        backend.delete("del.bin").await.expect("should succeed");
        assert!(backend.head("del.bin").await.unwrap().is_none());
    }
}
