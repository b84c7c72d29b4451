//! Location resolution.
//!
//! Pure computation of the canonical location URI for a creation request.
//! No filesystem access happens here; the resolved URI is classified by the
//! validator immediately before the policy decision.

use lode_core::LocationUri;

use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, Result};
use crate::request::TableCreationRequest;

/// Resolves the storage location for a table creation request.
#[derive(Debug, Clone, Copy)]
pub struct LocationResolver;

impl LocationResolver {
    /// Computes the canonical location URI for `request`.
    ///
    /// The user-supplied `external_location` wins when present; otherwise
    /// the location is derived under the configured warehouse root as
    /// `<warehouse_root>/<external_prefix>/<table_name>`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::InvalidLocation`] if the supplied string
    /// cannot be parsed as a location, contains traversal segments, or if
    /// explicit external locations are disabled by configuration.
    pub fn resolve(
        config: &ConnectorConfig,
        request: &TableCreationRequest,
    ) -> Result<LocationUri> {
        match request.external_location() {
            Some(raw) => {
                if !config.allow_external_location {
                    return Err(ConnectorError::invalid_location(format!(
                        "explicit external locations are disabled by configuration: {raw}"
                    )));
                }
                LocationUri::parse(raw)
                    .map_err(|err| ConnectorError::invalid_location(err.to_string()))
            }
            None => {
                let root = LocationUri::parse(&config.warehouse_root).map_err(|err| {
                    ConnectorError::invalid_location(format!(
                        "bad warehouse root '{}': {err}",
                        config.warehouse_root
                    ))
                })?;
                root.join(&config.external_prefix)
                    .and_then(|prefix| prefix.join(request.name()))
                    .map_err(|err| ConnectorError::invalid_location(err.to_string()))
            }
        }
    }
}
