//! Table creation requests.

use lode_catalog::ColumnDef;

/// A validated request to create a table, produced by the planner.
///
/// Immutable once constructed. The column list may be empty for
/// `CREATE TABLE ... AS SELECT` forms, where the schema is inferred from the
/// producing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCreationRequest {
    name: String,
    columns: Vec<ColumnDef>,
    external_location: Option<String>,
    is_external: bool,
}

impl TableCreationRequest {
    /// Creates a request for an external table.
    #[must_use]
    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            external_location: None,
            is_external: true,
        }
    }

    /// Sets the declared column list.
    #[must_use]
    pub fn with_columns(mut self, columns: Vec<ColumnDef>) -> Self {
        self.columns = columns;
        self
    }

    /// Sets an explicit `external_location` property.
    #[must_use]
    pub fn with_external_location(mut self, location: impl Into<String>) -> Self {
        self.external_location = Some(location.into());
        self
    }

    /// The table name, unique within the catalog.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared columns; empty when the schema comes from `AS SELECT`.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// The explicit location, if the statement supplied one.
    #[must_use]
    pub fn external_location(&self) -> Option<&str> {
        self.external_location.as_deref()
    }

    /// Whether the table is external (data files not owned by the engine).
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.is_external
    }
}
