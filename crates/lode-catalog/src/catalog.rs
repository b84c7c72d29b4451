//! The process-wide table catalog.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{CatalogError, Result};
use crate::metadata::TableMetadata;

/// Process-wide catalog of registered tables.
///
/// Thread-safe shared state with an explicit lifecycle: one instance is
/// constructed at engine startup and shared (behind an `Arc`) by every
/// session. All mutation goes through [`Catalog::register_table`] and
/// [`Catalog::drop_table`]; there is no ad hoc access to the underlying map.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, TableMetadata>>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table as a single atomic operation.
    ///
    /// Name uniqueness is checked under the write lock at commit time, not
    /// only at plan time, so of two concurrent registrations for the same
    /// name exactly one succeeds. This is the single point after which the
    /// table becomes visible to other sessions.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] if a table of the same name is
    /// already registered.
    pub fn register_table(&self, metadata: TableMetadata) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| CatalogError::Internal {
            message: "catalog lock poisoned".into(),
        })?;

        if tables.contains_key(&metadata.name) {
            return Err(CatalogError::conflict(&metadata.name));
        }
        tables.insert(metadata.name.clone(), metadata);
        Ok(())
    }

    /// Removes a table's metadata, returning it.
    ///
    /// Metadata only: for external tables the location and its data files
    /// are never deleted by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if no such table is registered.
    pub fn drop_table(&self, name: &str) -> Result<TableMetadata> {
        let mut tables = self.tables.write().map_err(|_| CatalogError::Internal {
            message: "catalog lock poisoned".into(),
        })?;

        tables
            .remove(name)
            .ok_or_else(|| CatalogError::not_found(name))
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<TableMetadata> {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(name).cloned())
    }

    /// Returns the registered table names, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}
