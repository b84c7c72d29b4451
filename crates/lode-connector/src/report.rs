//! User-facing diagnostics.
//!
//! Maps internal failures to stable error codes and messages. Client tooling
//! matches on both, so codes here are append-only and the
//! [`ConnectorError::TargetDirectoryExists`] display pattern must not change.

use lode_catalog::CatalogError;
use serde::Serialize;

use crate::error::ConnectorError;

/// A user-facing rendering of a connector failure.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Stable error code identifier.
    pub error_code: &'static str,
    /// Human readable message, including the offending path where one
    /// exists.
    pub message: String,
    /// Whether retrying the statement unchanged can plausibly succeed.
    pub retryable: bool,
}

/// Formats connector failures for the statement result surface.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReporter;

impl ErrorReporter {
    /// Renders `error` as a diagnostic.
    #[must_use]
    pub fn diagnose(error: &ConnectorError) -> Diagnostic {
        match error {
            ConnectorError::InvalidLocation { .. } => Diagnostic {
                error_code: "INVALID_LOCATION",
                message: error.to_string(),
                retryable: false,
            },
            ConnectorError::InvalidRequest { .. } => Diagnostic {
                error_code: "INVALID_REQUEST",
                message: error.to_string(),
                retryable: false,
            },
            ConnectorError::TargetDirectoryExists { .. } => Diagnostic {
                error_code: "TARGET_DIRECTORY_EXISTS",
                message: error.to_string(),
                retryable: false,
            },
            ConnectorError::LocationAccess { .. } => Diagnostic {
                error_code: "LOCATION_INACCESSIBLE",
                message: error.to_string(),
                retryable: false,
            },
            ConnectorError::Write { written, .. } => Diagnostic {
                error_code: "WRITE_FAILED",
                message: format!(
                    "{error}; {} data file(s) were written before the failure and left in place",
                    written.len()
                ),
                retryable: false,
            },
            ConnectorError::DataFile { .. } => Diagnostic {
                error_code: "DATA_FILE_UNREADABLE",
                message: error.to_string(),
                retryable: false,
            },
            ConnectorError::Catalog(catalog) => Diagnostic {
                error_code: match catalog {
                    CatalogError::Conflict { .. } => "TABLE_ALREADY_EXISTS",
                    CatalogError::NotFound { .. } => "TABLE_NOT_FOUND",
                    CatalogError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
                    CatalogError::Internal { .. } => "INTERNAL",
                },
                message: error.to_string(),
                retryable: false,
            },
            ConnectorError::Storage(_) => Diagnostic {
                error_code: "STORAGE_ERROR",
                message: error.to_string(),
                retryable: true,
            },
        }
    }
}
