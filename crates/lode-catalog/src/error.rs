//! Error types for catalog operations.

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur during catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A table with the same name already exists.
    #[error("table '{name}' already exists")]
    Conflict {
        /// The conflicting table name.
        name: String,
    },

    /// The named table does not exist.
    #[error("table '{name}' not found")]
    NotFound {
        /// The table name that was looked up.
        name: String,
    },

    /// A column type has no representation in the catalog's type system.
    #[error("unsupported column type: {message}")]
    UnsupportedType {
        /// Description of the unsupported type.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl CatalogError {
    /// Creates a conflict error for `name`.
    #[must_use]
    pub fn conflict(name: impl Into<String>) -> Self {
        Self::Conflict { name: name.into() }
    }

    /// Creates a not-found error for `name`.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub(crate) fn unsupported_type(message: impl Into<String>) -> Self {
        Self::UnsupportedType {
            message: message.into(),
        }
    }
}
