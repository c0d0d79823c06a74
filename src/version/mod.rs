//! Monotonic logical clock for cache entries.
//!
//! A [`Version`] identifies a single write to a key. Versions are compared
//! with a [`VersionComparator`] rather than a blanket [`Ord`] impl because
//! the comparison mode (whether the physical-time component participates)
//! is a per-cache configuration choice, not a property of the version
//! itself — the same pair of versions can rank equal under one comparator
//! and strictly ordered under another.

use std::cmp::Ordering;

/// A secondary version carried for cross-datacenter (DR) comparisons,
/// independent of ordinary version ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConflictVersion {
    /// Topology version at the originating cluster when this value was
    /// produced.
    pub topology_version: u64,
    /// Per-node monotonic order at the originating cluster.
    pub order: u64,
    /// Originating node order.
    pub node_order: u32,
}

/// `(topologyVersion, order, nodeOrder, dataCenterId, [conflictVersion])`.
///
/// `global_time` is the physical-clock component used only by the
/// comparator; `order` is the per-node monotonic counter used both for
/// ordering and for the "start version" identity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    /// Cluster topology version at the time this version was minted.
    pub topology_version: u64,
    /// Physical wall-clock time captured at mint time, used for ordinary
    /// ordering unless the comparator ignores it.
    pub global_time: u64,
    /// Per-node monotonic counter.
    pub order: u64,
    /// Originating node's order in the topology.
    pub node_order: u32,
    /// Originating datacenter id, used by DR tooling.
    pub data_center_id: u8,
    /// Optional embedded conflict version for DR comparisons.
    pub conflict_version: Option<ConflictVersion>,
}

impl Version {
    /// Builds a version with no embedded conflict version.
    pub fn new(
        topology_version: u64,
        global_time: u64,
        order: u64,
        node_order: u32,
        data_center_id: u8,
    ) -> Self {
        Self {
            topology_version,
            global_time,
            order,
            node_order,
            data_center_id,
            conflict_version: None,
        }
    }

    /// Returns a copy of this version with the given conflict version
    /// embedded, for DR-aware writes.
    pub fn with_conflict_version(mut self, conflict: ConflictVersion) -> Self {
        self.conflict_version = Some(conflict);
        self
    }

    /// The zero version, used as the pre-construction sentinel for entries
    /// that have never been written.
    pub const fn zero() -> Self {
        Self {
            topology_version: 0,
            global_time: 0,
            order: 0,
            node_order: 0,
            data_center_id: 0,
            conflict_version: None,
        }
    }
}

/// Total order over [`Version`] values.
///
/// `ignore_time` omits the physical-time field from comparison so that
/// logically equivalent events minted at slightly different wall-clock
/// times on different nodes compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct VersionComparator {
    /// When set, `global_time` is excluded from the comparison tuple.
    pub ignore_time: bool,
}

impl VersionComparator {
    /// Comparator using the full `(topologyVersion, globalTime, order,
    /// nodeOrder)` tuple.
    pub const fn strict() -> Self {
        Self { ignore_time: false }
    }

    /// Comparator that skips `globalTime`.
    pub const fn ignoring_time() -> Self {
        Self { ignore_time: true }
    }

    /// Orders `a` relative to `b` under this comparator's mode.
    pub fn compare(&self, a: &Version, b: &Version) -> Ordering {
        a.topology_version
            .cmp(&b.topology_version)
            .then_with(|| {
                if self.ignore_time {
                    Ordering::Equal
                } else {
                    a.global_time.cmp(&b.global_time)
                }
            })
            .then_with(|| a.order.cmp(&b.order))
            .then_with(|| a.node_order.cmp(&b.node_order))
    }

    /// `true` iff `a` ranks strictly above `b`.
    pub fn is_greater(&self, a: &Version, b: &Version) -> bool {
        self.compare(a, b) == Ordering::Greater
    }

    /// `true` iff `a` and `b` rank equal under this comparator (which, in
    /// `ignore_time` mode, can hold even when `global_time` differs).
    pub fn is_equal(&self, a: &Version, b: &Version) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Outcome of comparing an incoming write's version against an entry's
/// current version under the atomic-update "version check" rule in
/// component F: a primary accepts an incoming update iff the incoming
/// version is strictly greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheckOutcome {
    /// Incoming version is newer; the write proceeds.
    Accept,
    /// Incoming version equals the current version; with write-through
    /// enabled this triggers an idempotent store refresh rather than a
    /// new write.
    EqualRefresh,
    /// Incoming version is older; the write is discarded.
    Reject,
}

/// Applies the version-check rule from component A/F.
pub fn check_version(
    comparator: &VersionComparator,
    current: &Version,
    incoming: &Version,
) -> VersionCheckOutcome {
    match comparator.compare(incoming, current) {
        Ordering::Greater => VersionCheckOutcome::Accept,
        Ordering::Equal => VersionCheckOutcome::EqualRefresh,
        Ordering::Less => VersionCheckOutcome::Reject,
    }
}

/// Mints monotonically increasing versions for a single node.
///
/// Implementations must guarantee that, under the configured
/// [`VersionComparator`], each successive call to [`VersionGenerator::next`]
/// on the same instance produces a version ranked strictly above the
/// previous one.
pub trait VersionGenerator: Send + Sync {
    /// Mints a fresh version with no regard to any prior version.
    fn next(&self) -> Version;

    /// Mints a version guaranteed to rank above `prev` under the
    /// generator's own comparator.
    fn next_after(&self, prev: &Version) -> Version;

    /// Mints a version for a value loaded from preload/persistence, which
    /// may legitimately carry an `order` lower than the node's current
    /// counter (the loaded value is older than anything minted locally so
    /// far).
    fn next_for_load(&self, prev: &Version) -> Version;
}

/// [`VersionGenerator`] scoped to one `(topology_version, node_order,
/// data_center_id)` triple, backed by an atomic monotonic counter.
pub struct LocalVersionGenerator {
    topology_version: std::sync::atomic::AtomicU64,
    node_order: u32,
    data_center_id: u8,
    counter: std::sync::atomic::AtomicU64,
}

impl LocalVersionGenerator {
    /// Creates a generator for the given node identity, counter starting
    /// at zero.
    pub fn new(topology_version: u64, node_order: u32, data_center_id: u8) -> Self {
        Self {
            topology_version: std::sync::atomic::AtomicU64::new(topology_version),
            node_order,
            data_center_id,
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Updates the topology version used for subsequently minted
    /// versions, e.g. after a rebalance.
    pub fn set_topology_version(&self, topology_version: u64) {
        self.topology_version
            .store(topology_version, std::sync::atomic::Ordering::SeqCst);
    }

    fn mint(&self) -> Version {
        let order = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        let global_time = now_millis();
        Version::new(
            self.topology_version.load(std::sync::atomic::Ordering::SeqCst),
            global_time,
            order,
            self.node_order,
            self.data_center_id,
        )
    }
}

impl VersionGenerator for LocalVersionGenerator {
    fn next(&self) -> Version {
        self.mint()
    }

    fn next_after(&self, _prev: &Version) -> Version {
        self.mint()
    }

    fn next_for_load(&self, _prev: &Version) -> Version {
        self.mint()
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
