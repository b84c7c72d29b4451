//! Error types for the external-table connector.
//!
//! Every failure of a create/drop attempt surfaces as one of these kinds as
//! the terminal result of the statement; none are silently swallowed and
//! none trigger automatic retries. Data files written before a failure are
//! left in place for inspection, never cleaned up.

use lode_catalog::CatalogError;

use crate::writer::WrittenFile;

/// Result type for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors that can occur during external-table operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The supplied location is malformed or disallowed by configuration.
    #[error("invalid external location: {message}")]
    InvalidLocation {
        /// What made the location invalid.
        message: String,
    },

    /// The creation request itself is malformed.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What made the request invalid.
        message: String,
    },

    /// The target location already contains data.
    ///
    /// The display string is a stable pattern external tooling matches on;
    /// do not reword it.
    #[error("Target directory for table '{table}' already exists: {path}")]
    TargetDirectoryExists {
        /// The table being created.
        table: String,
        /// The offending location.
        path: String,
    },

    /// The target location exists but cannot be used.
    #[error("cannot access location {path}: {reason}")]
    LocationAccess {
        /// The location that could not be reached.
        path: String,
        /// Why it could not be used.
        reason: String,
    },

    /// The data write failed partway.
    #[error("writing data to {location} failed: {message}")]
    Write {
        /// The location being written.
        location: String,
        /// Description of the failure.
        message: String,
        /// Files that were fully written before the failure. Left in place
        /// for diagnostics.
        written: Vec<WrittenFile>,
    },

    /// A data file could not be decoded on read-back.
    #[error("data file {path} is unreadable: {message}")]
    DataFile {
        /// The file that failed to decode.
        path: String,
        /// Description of the decode failure.
        message: String,
    },

    /// A catalog operation failed (name conflict at commit time, unknown
    /// table on drop, unsupported type during schema inference).
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] lode_core::Error),
}

impl ConnectorError {
    /// Creates an invalid-location error.
    #[must_use]
    pub fn invalid_location(message: impl Into<String>) -> Self {
        Self::InvalidLocation {
            message: message.into(),
        }
    }

    /// Creates an invalid-request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns true for the commit-time table-name conflict.
    #[must_use]
    pub fn is_catalog_conflict(&self) -> bool {
        matches!(self, Self::Catalog(CatalogError::Conflict { .. }))
    }
}
