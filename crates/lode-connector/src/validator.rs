//! Location validation.

use lode_core::{LocationState, LocationUri, StorageBackend};

use crate::error::{ConnectorError, Result};

/// Classifies the observed state of a resolved location.
#[derive(Debug, Clone, Copy)]
pub struct LocationValidator;

impl LocationValidator {
    /// Classifies the location with a single storage call.
    ///
    /// Must be invoked immediately before the conflict-policy decision on
    /// every creation attempt; classifications are never reused across
    /// attempts because the namespace can change concurrently. The
    /// check-then-act window this leaves open is accepted by design (the
    /// catalog commit is the final arbiter) rather than requiring a
    /// distributed lock on arbitrary storage backends.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::InvalidLocation`] if the backend does not
    /// serve the location's scheme. I/O failures while inspecting the path
    /// are reported inside [`LocationState::Inaccessible`], not as errors.
    pub async fn classify(
        storage: &dyn StorageBackend,
        location: &LocationUri,
    ) -> Result<LocationState> {
        if storage.scheme() != location.scheme().as_str() {
            return Err(ConnectorError::invalid_location(format!(
                "storage backend serves '{}' locations but got {location}",
                storage.scheme()
            )));
        }
        Ok(storage.classify(location.path()).await)
    }
}
