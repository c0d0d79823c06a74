//! Cache-wide configuration, following the teacher's `db::config` shape of
//! a plain settings struct plus named preset constructors.

use crate::version::VersionComparator;

/// Controls how strictly writes are ordered and acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomicityMode {
    /// Updates take the full MVCC candidate-set path with version checks
    /// and WAL-before-apply ordering.
    Transactional,
    /// Single-key updates apply immediately under the entry lock with no
    /// candidate bookkeeping; still linearizable per key.
    Atomic,
    /// Updates apply immediately and WAL append happens off the critical
    /// path; acceptable data loss window on crash.
    EventuallyConsistent,
}

/// Settings shared by all entries in a partition.
///
/// Derives `Serialize`/`Deserialize` so a deployment can load these
/// settings from a config file the way the teacher's `db::config::Config`
/// is loaded, rather than only being constructible from the preset
/// functions below.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Ordering mode applied to writes.
    pub atomicity_mode: AtomicityMode,
    /// Comparator used for all version checks in this cache.
    pub version_comparator: VersionComparator,
    /// Whether commits are written through to the external store
    /// synchronously before being considered complete.
    pub write_through: bool,
    /// Whether reads that miss the row store fall through to the external
    /// store.
    pub read_through: bool,
    /// Whether to defer obsolete-entry removal until no candidates remain,
    /// versus marking obsolete immediately.
    pub deferred_delete: bool,
    /// Default TTL in milliseconds applied to writes with no explicit TTL;
    /// `0` means eternal.
    pub default_ttl_millis: u64,
    /// Whether interrupts during a blocking `get` are deferred
    /// (re-asserted on return) rather than aborting the wait.
    pub ignore_interrupts: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::transactional()
    }
}

impl CacheConfig {
    /// Full MVCC candidate tracking, synchronous WAL, no write-through.
    pub fn transactional() -> Self {
        Self {
            atomicity_mode: AtomicityMode::Transactional,
            version_comparator: VersionComparator::strict(),
            write_through: false,
            read_through: false,
            deferred_delete: true,
            default_ttl_millis: 0,
            ignore_interrupts: false,
        }
    }

    /// Single-key atomic updates, synchronous WAL, immediate obsolete
    /// transitions.
    pub fn atomic() -> Self {
        Self {
            atomicity_mode: AtomicityMode::Atomic,
            version_comparator: VersionComparator::strict(),
            write_through: false,
            read_through: false,
            deferred_delete: false,
            default_ttl_millis: 0,
            ignore_interrupts: false,
        }
    }

    /// Best-effort ordering, ignores physical-time skew across nodes, and
    /// does not block writers on WAL durability.
    pub fn eventually_consistent() -> Self {
        Self {
            atomicity_mode: AtomicityMode::EventuallyConsistent,
            version_comparator: VersionComparator::ignoring_time(),
            write_through: false,
            read_through: false,
            deferred_delete: false,
            default_ttl_millis: 0,
            ignore_interrupts: true,
        }
    }
}
