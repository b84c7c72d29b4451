//! Local filesystem storage backend.
//!
//! Serves `file://` locations. The backend is rooted at a directory and
//! refuses to touch any path outside that root, so a misconfigured location
//! can never reach unrelated parts of the filesystem.
//!
//! Unlike object stores, the filesystem has real directories, so
//! [`StorageBackend::classify`] is overridden here with a stat that reports
//! the full four-way location state, including empty directories.

use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;

use crate::error::{Error, Result};
use crate::storage::{
    LocationState, ObjectMeta, StorageBackend, WritePrecondition, WriteResult,
};

/// Storage backend over a local filesystem subtree.
#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    /// Creates a backend rooted at `root`. Paths outside the root are
    /// rejected with [`Error::InvalidInput`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory this backend is confined to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let candidate = Path::new(path);
        if !candidate.is_absolute() {
            return Err(Error::InvalidInput(format!(
                "path must be absolute: {path}"
            )));
        }
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::InvalidInput(format!(
                "path cannot contain traversal segments: {path}"
            )));
        }
        if !candidate.starts_with(&self.root) {
            return Err(Error::InvalidInput(format!(
                "path escapes backend root {}: {path}",
                self.root.display()
            )));
        }
        Ok(candidate.to_path_buf())
    }

    fn object_meta(path: &str, meta: &std::fs::Metadata) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: meta.len(),
            version: file_version(meta),
            last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

fn file_version(meta: &std::fs::Metadata) -> String {
    let nanos = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos());
    format!("{}-{nanos}", meta.len())
}

fn io_error(op: &str, path: &Path, err: std::io::Error) -> Error {
    Error::storage_with_source(format!("{op} {} failed", path.display()), err)
}

#[async_trait]
impl StorageBackend for LocalFsBackend {
    fn scheme(&self) -> &'static str {
        "file"
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let resolved = self.resolve(path)?;
        match fs::read(&resolved).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object not found: {path}")))
            }
            Err(err) => Err(io_error("read", &resolved, err)),
        }
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let resolved = self.resolve(path)?;

        let current = match fs::metadata(&resolved).await {
            Ok(meta) => Some(meta),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(io_error("stat", &resolved, err)),
        };

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(meta) = &current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: file_version(meta),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => match &current {
                Some(meta) if file_version(meta) != expected => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: file_version(meta),
                    });
                }
                None => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: "0".to_string(),
                    });
                }
                _ => {}
            },
            WritePrecondition::None => {}
        }

        fs::write(&resolved, &data)
            .await
            .map_err(|err| io_error("write", &resolved, err))?;

        let meta = fs::metadata(&resolved)
            .await
            .map_err(|err| io_error("stat", &resolved, err))?;
        Ok(WriteResult::Success {
            version: file_version(&meta),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        match fs::remove_file(&resolved).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("remove", &resolved, err)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let root = self.resolve(prefix.trim_end_matches('/'))?;

        let mut out = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(io_error("list", &dir, err)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| io_error("list", &dir, err))?
            {
                let entry_path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|err| io_error("stat", &entry_path, err))?;
                if meta.is_dir() {
                    pending.push(entry_path);
                } else {
                    let key = entry_path.to_string_lossy().into_owned();
                    out.push(Self::object_meta(&key, &meta));
                }
            }
        }
        Ok(out)
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let resolved = self.resolve(path)?;
        match fs::metadata(&resolved).await {
            Ok(meta) if meta.is_file() => Ok(Some(Self::object_meta(path, &meta))),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error("stat", &resolved, err)),
        }
    }

    async fn classify(&self, path: &str) -> LocationState {
        let resolved = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(err) => {
                return LocationState::Inaccessible {
                    reason: err.to_string(),
                };
            }
        };

        let meta = match fs::metadata(&resolved).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return LocationState::Absent;
            }
            Err(err) => {
                return LocationState::Inaccessible {
                    reason: err.to_string(),
                };
            }
        };

        if !meta.is_dir() {
            return LocationState::Inaccessible {
                reason: format!("{path} exists and is not a directory"),
            };
        }

        let mut entries = match fs::read_dir(&resolved).await {
            Ok(entries) => entries,
            Err(err) => {
                return LocationState::Inaccessible {
                    reason: err.to_string(),
                };
            }
        };

        let mut count = 0usize;
        loop {
            match entries.next_entry().await {
                Ok(Some(_)) => count += 1,
                Ok(None) => break,
                Err(err) => {
                    return LocationState::Inaccessible {
                        reason: err.to_string(),
                    };
                }
            }
        }

        if count == 0 {
            LocationState::EmptyDirectory
        } else {
            LocationState::NonEmptyDirectory { entries: count }
        }
    }

    async fn ensure_dir(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        fs::create_dir_all(&resolved)
            .await
            .map_err(|err| io_error("create dir", &resolved, err))
    }
}
