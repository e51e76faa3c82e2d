use std::fmt;

use thiserror::Error;

use crate::drafts::store::StoreError;

/// Invariants the versioning core refuses to break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// Tombstoning the only active version would leave the family without a head.
    LastActiveVersion,
    /// A family has no active version to restore onto.
    NoActiveHead,
    /// `parent_id` links form a cycle or point outside the family.
    BrokenLineage,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Invariant::LastActiveVersion => "LastActiveVersion",
            Invariant::NoActiveHead => "NoActiveHead",
            Invariant::BrokenLineage => "BrokenLineage",
        };
        f.write_str(name)
    }
}

/// Failures of a versioning operation. "Nothing changed" is not one of them;
/// see `VersionOutcome::Unchanged`.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Draft version {0} not found")]
    NotFound(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(Invariant),

    #[error("Cannot compare versions: {0}")]
    ComparisonInput(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}
