//! Connector configuration.

use lode_catalog::FileFormat;
use serde::Deserialize;

/// Configuration for the external-table connector.
///
/// Deserializable from the engine's config file; every field has a default
/// so a partial config section is enough.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Root URI of the engine-managed warehouse. Locations for tables
    /// without an explicit `external_location` are derived under it.
    pub warehouse_root: String,
    /// Path segment under the warehouse root for derived external-table
    /// locations.
    pub external_prefix: String,
    /// Whether statements may supply an explicit `external_location`.
    /// When false, writes outside the warehouse root are refused.
    pub allow_external_location: bool,
    /// Maximum number of rows placed in a single data file.
    pub target_file_rows: usize,
    /// Format of written data files.
    pub file_format: FileFormat,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            warehouse_root: "memory:///warehouse".to_string(),
            external_prefix: "external".to_string(),
            allow_external_location: true,
            target_file_rows: 100_000,
            file_format: FileFormat::Parquet,
        }
    }
}

impl ConnectorConfig {
    /// Creates a config with the given warehouse root and defaults for
    /// everything else.
    #[must_use]
    pub fn new(warehouse_root: impl Into<String>) -> Self {
        Self {
            warehouse_root: warehouse_root.into(),
            ..Self::default()
        }
    }

    /// Sets the maximum number of rows per data file.
    #[must_use]
    pub fn with_target_file_rows(mut self, rows: usize) -> Self {
        self.target_file_rows = rows;
        self
    }

    /// Enables or disables explicit external locations.
    #[must_use]
    pub fn with_allow_external_location(mut self, allow: bool) -> Self {
        self.allow_external_location = allow;
        self
    }
}
