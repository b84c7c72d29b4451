//! The conflict policy: a pure decision over an observed location state.
//!
//! Keeping the decision separate from the I/O that observes the state
//! isolates the check-then-act race window to a single storage call, and
//! lets the observation be swapped for a backend-provided conditional-write
//! primitive without touching decision logic.

use lode_core::LocationState;

/// Why a creation attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The location already contains data. Proceeding would silently mix
    /// engine-written files with pre-existing, possibly unrelated data.
    TargetExists {
        /// Number of entries observed under the location.
        entries: usize,
    },
    /// The location exists but is not a directory, or inspecting it failed.
    Inaccessible {
        /// Why the location could not be used.
        reason: String,
    },
}

/// Outcome of the conflict policy for one creation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationDecision {
    /// The attempt may proceed; the writer creates any missing directories.
    Proceed,
    /// The attempt must stop before any write.
    Reject(RejectReason),
}

/// Maps a location classification to a proceed/reject decision.
#[derive(Debug, Clone, Copy)]
pub struct ConflictPolicy;

impl ConflictPolicy {
    /// Decides whether a creation attempt may proceed.
    ///
    /// Absent and empty locations carry no overwrite risk and are accepted;
    /// a non-empty directory is rejected unconditionally; an inaccessible
    /// path is rejected with its reason. The decision is identical whether
    /// or not the statement has an `AS SELECT` clause: a schema-only create
    /// still validates its location even though it writes nothing.
    #[must_use]
    pub fn decide(state: &LocationState) -> LocationDecision {
        match state {
            LocationState::Absent | LocationState::EmptyDirectory => LocationDecision::Proceed,
            LocationState::NonEmptyDirectory { entries } => {
                LocationDecision::Reject(RejectReason::TargetExists { entries: *entries })
            }
            LocationState::Inaccessible { reason } => {
                LocationDecision::Reject(RejectReason::Inaccessible {
                    reason: reason.clone(),
                })
            }
        }
    }
}
