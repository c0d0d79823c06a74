//! Collaborator traits an entry's update closure reaches out to.
//!
//! A [`crate::entry::CacheEntry`] never talks to these directly; the update
//! closure (component F) is handed `&dyn` references to whichever of these
//! the owning partition was configured with, and default no-op/in-memory
//! implementations (module-local `Noop*`/`InMemory*` types below) let the
//! entry state machine and its tests run without a real storage backend.

use crate::error::Result;
use crate::version::Version;

/// Durable row storage backing a partition. The row store is the source of
/// truth an entry reloads from after an eviction and writes through to on
/// commit when write-through is configured.
pub trait RowStore: Send + Sync {
    /// Loads the current row for `key`, if any.
    fn load(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Version)>>;

    /// Writes `value` at `version` for `key`.
    fn store(&self, key: &[u8], value: &[u8], version: Version) -> Result<()>;

    /// Removes the row for `key` entirely.
    fn remove(&self, key: &[u8]) -> Result<()>;
}

/// Decides how long a value lives once written.
pub trait ExpiryPolicy: Send + Sync {
    /// Returns the TTL in milliseconds to apply to a freshly written value,
    /// or `0` for eternal.
    fn ttl_for_write(&self, key: &[u8]) -> u64;

    /// Returns the TTL in milliseconds to apply on a read-triggered touch
    /// (sliding expiration), or `0` to leave the existing TTL untouched.
    fn ttl_for_access(&self, key: &[u8]) -> u64;
}

/// User-supplied hooks invoked around a write, mirroring
/// `onBeforePut`/`onAfterPut`/`onBeforeRemove`/`onAfterRemove`.
pub trait Interceptor: Send + Sync {
    /// Runs before a put is applied. `Ok(None)` cancels the write
    /// (`INTERCEPTOR_CANCEL`); `Ok(Some(v))` adopts `v` in place of the
    /// caller's value; `Err` aborts the operation with the given error.
    fn on_before_put(&self, key: &[u8], new_value: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Runs after a put has been applied to the entry.
    fn on_after_put(&self, key: &[u8], old_value: Option<&[u8]>, new_value: &[u8]);

    /// Runs before a remove is applied. `Ok(true)` cancels the removal;
    /// `Err` aborts the operation with the given error.
    fn on_before_remove(&self, key: &[u8], old_value: Option<&[u8]>) -> Result<bool>;

    /// Runs after a remove has been applied to the entry.
    fn on_after_remove(&self, key: &[u8], old_value: Option<&[u8]>);
}

/// Registry of continuous queries notified of committed changes.
pub trait ContinuousQueryRegistry: Send + Sync {
    /// Notifies all registered continuous queries of an event on `key`.
    fn notify(&self, key: &[u8], event: crate::events::Event);
}

/// Write-ahead log a partition appends to before an update is considered
/// committed.
pub trait Wal: Send + Sync {
    /// Appends a record describing the update; must return only once
    /// durable per the configured sync mode.
    fn append(&self, record: &crate::wal::DataRecord) -> Result<()>;
}

/// A write-behind/write-through external system (e.g. a backing database)
/// distinct from the partition's own row store.
pub trait ExternalStore: Send + Sync {
    /// Loads a value from the external store on a read-through miss.
    fn load(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Writes a value to the external store on a write-through commit.
    fn store(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes a value from the external store.
    fn remove(&self, key: &[u8]) -> Result<()>;
}

/// Replicates committed updates to another datacenter for DR.
pub trait DrReplicator: Send + Sync {
    /// Ships `key`/`value` at `version` to the replica datacenter.
    fn replicate(&self, key: &[u8], value: Option<&[u8]>, version: Version) -> Result<()>;
}

/// Sink for entry lifecycle events (reads, writes, locks), decoupled from
/// [`ContinuousQueryRegistry`] so metrics/audit consumers don't need to
/// implement full CQ semantics.
pub trait EventRecorder: Send + Sync {
    /// Records an event.
    fn record(&self, event: crate::events::Event);
}

/// Owning collection of entries for one partition, providing the update
/// counter the update closure's conflict-check step reads.
pub trait Partition: Send + Sync {
    /// Monotonically increasing counter of applied updates in this
    /// partition, used to fence stale candidate promotions.
    fn update_counter(&self) -> u64;

    /// Advances the update counter by one and returns the new value.
    fn advance_update_counter(&self) -> u64;
}
