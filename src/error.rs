//! Error type shared by every table operation.
//!
//! Lookup misses are not errors; they surface as `None`.

use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// The handle does not name an entry currently linked in this table:
    /// it was removed already, or it was issued by a different table.
    #[error("entry is not linked in this table")]
    NotLinked,

    /// Bucket indices are stored as `u32`, so larger bucket counts are refused.
    #[error("invalid bucket count {requested} (must fit in u32)")]
    InvalidCapacity { requested: usize },

    #[error("failed to allocate bucket array")]
    AllocationFailure(#[from] TryReserveError),

    /// Reported by `check_links` when a chain no longer satisfies the
    /// back-link invariants.
    #[error("broken chain in bucket {bucket}: {reason}")]
    BrokenLink { bucket: usize, reason: &'static str },
}
