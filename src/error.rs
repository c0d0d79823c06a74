//! Error taxonomy for the cache entry engine.
//!
//! Mirrors the semantic categories in the design: reaching an obsolete
//! entry, version/filter outcomes that are surfaced as results rather than
//! errors, future-adapter cancellation/timeout, and fatal collaborator
//! failures (storage, interceptor).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Error taxonomy raised by entry operations and the future adapter.
///
/// Clone because a single terminal error is delivered to every waiter and
/// listener registered on a [`crate::future::FutureAdapter`], not consumed
/// by the first one to observe it.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The entry reached its terminal obsolete state; callers must
    /// re-look-up the key in the owning partition map.
    #[error("entry removed")]
    EntryRemoved,

    /// A future adapter wait observed a `CANCELLED` terminal state.
    #[error("operation cancelled")]
    Cancelled,

    /// A bounded `get(timeout)` elapsed before the future completed.
    #[error("operation timed out")]
    Timeout,

    /// A blocking wait was interrupted and `ignore_interrupts` was not set.
    #[error("wait interrupted")]
    Interrupted,

    /// The row store or WAL collaborator failed. Fatal to the current
    /// operation; the entry does not roll back its in-memory state.
    #[error("storage error: {0}")]
    Storage(String),

    /// A user `onBefore*` interceptor callback raised an error, vetoing
    /// the operation.
    #[error("interceptor error: {0}")]
    Interceptor(String),

    /// Caller-supplied arguments or configuration were invalid.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// On-disk or in-memory structures failed a consistency check.
    #[error("corruption detected: {0}")]
    Corruption(String),
}

impl CacheError {
    /// Returns `true` for errors that represent a closed/obsolete entry
    /// rather than a transient collaborator failure.
    pub fn is_entry_removed(&self) -> bool {
        matches!(self, CacheError::EntryRemoved)
    }
}
