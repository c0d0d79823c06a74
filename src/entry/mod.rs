//! Cache entry state machine: the authoritative in-memory metadata for one
//! key in a partition.
//!
//! Every operation below acquires [`CacheEntry`]'s monitor at its critical
//! section and releases it before doing any I/O (store, WAL, interceptor,
//! continuous-query delivery), per the concurrency model: the monitor is
//! the only synchronization protecting `val`/`ver`/`extras`/`flags`, and it
//! is never held while a thread might park.

pub mod closure;

use std::cmp::Ordering as CmpOrdering;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use rustc_hash::FxHasher;

use crate::candidate::CandidateSet;
use crate::config::{AtomicityMode, CacheConfig};
use crate::error::{CacheError, Result};
use crate::events::{Event, EventKind};
use crate::extras::{EntryExtras, TtlState};
use crate::future::FutureAdapter;
use crate::interfaces::{
    ContinuousQueryRegistry, EventRecorder, ExpiryPolicy, ExternalStore, Interceptor, Partition,
    RowStore, Wal,
};
use crate::metrics::EntryMetrics;
use crate::version::{Version, VersionGenerator};
use crate::wal::DataRecord;

use closure::{
    ConflictResolver, CurrentRow, Filter, Operation, TreeOp, TtlInstruction, UpdateClosure,
    UpdateOutcome,
};

const IS_DELETED: u8 = 1 << 0;
const IS_UNSWAPPED: u8 = 1 << 1;

struct EntryState {
    val: Option<Vec<u8>>,
    ver: Version,
    extras: EntryExtras,
    flags: u8,
}

impl EntryState {
    fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    fn set_flag(&mut self, flag: u8) {
        self.flags |= flag;
    }

    fn clear_flag(&mut self, flag: u8) {
        self.flags &= !flag;
    }
}

/// The collaborators an entry operation calls out to, bundled together so
/// call sites don't thread eight separate references through every method.
pub struct Collaborators<'a> {
    /// Off-heap row store backing this entry's partition.
    pub row_store: &'a dyn RowStore,
    /// Optional write-through/read-through external system of record.
    pub external_store: Option<&'a dyn ExternalStore>,
    /// Write-ahead log.
    pub wal: &'a dyn Wal,
    /// Optional before/after write hooks.
    pub interceptor: Option<&'a dyn Interceptor>,
    /// Optional continuous-query registry.
    pub cq: Option<&'a dyn ContinuousQueryRegistry>,
    /// Optional lifecycle event sink.
    pub events: Option<&'a dyn EventRecorder>,
    /// Owning partition, for the update counter.
    pub partition: &'a dyn Partition,
    /// Version generator used when no explicit version is supplied.
    pub version_generator: &'a dyn VersionGenerator,
    /// Expiry policy for TTL-for-create/update/access decisions.
    pub expiry_policy: &'a dyn ExpiryPolicy,
    /// A future attached by an asynchronous caller of this write; completed
    /// with the write's result after the monitor is released, alongside
    /// the continuous-query notification and interceptor `onAfter*` call.
    pub result_future: Option<&'a FutureAdapter<WriteOutcome>>,
    /// Optional activity counters, updated alongside the outcome tag.
    pub metrics: Option<&'a EntryMetrics>,
}

/// Result of a transactional or atomic write against an entry.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The outcome tag from the update closure.
    pub outcome: UpdateOutcome,
    /// The value committed before this write.
    pub old_value: Option<Vec<u8>>,
    /// The value committed by this write, if any.
    pub new_value: Option<Vec<u8>>,
    /// The version committed by this write, if any.
    pub new_version: Option<Version>,
    /// The partition's update counter after this write, if it counted.
    pub update_counter: Option<u64>,
}

/// A point-in-time snapshot taken during batch eviction, handed to the
/// batch swap writer before the entry's value is cleared.
#[derive(Debug, Clone)]
pub struct SwapEntrySnapshot {
    /// The evicted entry's key.
    pub key: Vec<u8>,
    /// The evicted value, if any.
    pub value: Option<Vec<u8>>,
    /// The version at eviction time.
    pub version: Version,
    /// TTL in effect at eviction time.
    pub ttl_millis: u64,
    /// Absolute expire time in effect at eviction time.
    pub expire_time_millis: u64,
}

/// One per live key in a partition. Owns its value, version, optional
/// metadata bag, and flags behind a single intrinsic monitor.
pub struct CacheEntry {
    key: Vec<u8>,
    start_ver: Version,
    local_node_order: u32,
    state: Mutex<EntryState>,
}

impl CacheEntry {
    /// Creates a fresh entry with no value, identified by `start_ver`.
    /// `local_node_order` is this process's node order, used by
    /// [`CacheEntry::is_new`] to detect entries that have never been
    /// written since construction.
    pub fn new(key: Vec<u8>, start_ver: Version, local_node_order: u32) -> Self {
        Self {
            key,
            start_ver,
            local_node_order,
            state: Mutex::new(EntryState {
                val: None,
                ver: start_ver,
                extras: EntryExtras::default(),
                flags: 0,
            }),
        }
    }

    /// The entry's key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The entry's current version.
    pub fn version(&self) -> Version {
        self.state.lock().ver
    }

    /// A cheap, stable hash of the key for log correlation, never the key
    /// itself.
    fn key_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    /// `true` iff the entry has reached its terminal obsolete state.
    pub fn is_obsolete(&self) -> bool {
        self.state.lock().extras.obsolete_version().is_some()
    }

    /// `true` iff the entry is a deferred-delete tombstone.
    pub fn is_deleted(&self) -> bool {
        self.state.lock().has_flag(IS_DELETED)
    }

    /// `true` iff this entry's version still equals its construction-time
    /// start version minted on this node — i.e. it has never been written.
    pub fn is_new(&self) -> bool {
        self.is_new_locked(&self.state.lock())
    }

    fn is_new_locked(&self, guard: &EntryState) -> bool {
        guard.ver == self.start_ver && self.start_ver.node_order == self.local_node_order
    }

    fn ensure_active(&self, guard: &EntryState) -> Result<()> {
        if guard.extras.obsolete_version().is_some() {
            Err(CacheError::EntryRemoved)
        } else {
            Ok(())
        }
    }

    /// Runs `f` against this entry's lock candidate set, lazily
    /// initializing it if empty. Fails with [`CacheError::EntryRemoved`] if
    /// the entry is already obsolete.
    pub fn with_candidates<R>(&self, f: impl FnOnce(&mut CandidateSet) -> R) -> Result<R> {
        let mut guard = self.state.lock();
        self.ensure_active(&guard)?;
        Ok(f(guard.extras.candidates_mut()))
    }

    /// Reads the current value per component E's `innerGet` algorithm.
    pub fn inner_get(
        &self,
        read_through: bool,
        record_event: bool,
        collaborators: &Collaborators,
        config: &CacheConfig,
        now_millis: u64,
    ) -> Result<Option<Vec<u8>>> {
        let mut guard = self.state.lock();
        self.ensure_active(&guard)?;

        if guard.val.is_none() && self.is_new_locked(&guard) && !guard.has_flag(IS_UNSWAPPED) {
            if let Some((value, version)) = collaborators.row_store.load(&self.key)? {
                guard.val = Some(value);
                guard.ver = version;
            }
            guard.set_flag(IS_UNSWAPPED);
        }

        if let Some(ttl) = guard.extras.ttl() {
            if ttl.is_expired_at(now_millis) {
                drop(guard);
                self.expire_locked(collaborators, config, now_millis)?;
                tracing::trace!(
                    target: "latticekv::entry",
                    key_hash = self.key_hash(),
                    outcome = "expired",
                    "inner_get"
                );
                return Ok(None);
            }
        }

        if guard.val.is_none() && read_through {
            let version_before = guard.ver;
            drop(guard);
            let loaded = match collaborators.external_store {
                Some(store) => store.load(&self.key)?,
                None => None,
            };
            guard = self.state.lock();
            self.ensure_active(&guard)?;
            if guard.ver == version_before {
                if let Some(value) = loaded {
                    let new_version = collaborators.version_generator.next_for_load(&guard.ver);
                    let ttl_millis = collaborators.expiry_policy.ttl_for_write(&self.key);
                    guard.val = Some(value);
                    guard.ver = new_version;
                    guard.extras = std::mem::take(&mut guard.extras)
                        .with_ttl(TtlState::from_ttl(ttl_millis, now_millis));
                }
            }
        }

        let result = guard.val.clone();
        let version = guard.ver;
        drop(guard);
        tracing::trace!(
            target: "latticekv::entry",
            key_hash = self.key_hash(),
            outcome = if result.is_some() { "hit" } else { "miss" },
            "inner_get"
        );
        if let Some(metrics) = collaborators.metrics {
            metrics.record_read(result.is_some());
        }
        if record_event {
            if let Some(events) = collaborators.events {
                events.record(Event::new(self.key.clone(), EventKind::Read, version));
            }
        }
        Ok(result)
    }

    /// Transactional set: commits `value` under an explicit or freshly
    /// minted version, evaluated against `filters` and the configured
    /// interceptor.
    #[allow(clippy::too_many_arguments)]
    pub fn inner_set(
        &self,
        value: Vec<u8>,
        explicit_version: Option<Version>,
        filters: &[&dyn Filter],
        ttl: TtlInstruction,
        collaborators: &Collaborators,
        config: &CacheConfig,
        now_millis: u64,
    ) -> Result<WriteOutcome> {
        self.inner_apply(
            Operation::Put(value),
            explicit_version,
            filters,
            None,
            ttl,
            true,
            collaborators,
            config,
            now_millis,
        )
    }

    /// Transactional remove: see [`CacheEntry::inner_set`].
    pub fn inner_remove(
        &self,
        explicit_version: Option<Version>,
        filters: &[&dyn Filter],
        collaborators: &Collaborators,
        config: &CacheConfig,
        now_millis: u64,
    ) -> Result<WriteOutcome> {
        self.inner_apply(
            Operation::Remove,
            explicit_version,
            filters,
            None,
            TtlInstruction::NotChanged,
            true,
            collaborators,
            config,
            now_millis,
        )
    }

    /// Atomic (lock-free) update: runs a full [`UpdateClosure`] including
    /// conflict resolution, used by caches with `AtomicityMode::Atomic`.
    #[allow(clippy::too_many_arguments)]
    pub fn inner_update<'a>(
        &self,
        op: Operation<'a>,
        explicit_version: Option<Version>,
        filters: &'a [&'a dyn Filter],
        conflict_resolver: Option<&'a dyn ConflictResolver>,
        ttl: TtlInstruction,
        is_primary: bool,
        collaborators: &Collaborators,
        config: &CacheConfig,
        now_millis: u64,
    ) -> Result<WriteOutcome> {
        self.inner_apply(
            op,
            explicit_version,
            filters,
            conflict_resolver,
            ttl,
            is_primary,
            collaborators,
            config,
            now_millis,
        )
    }

    /// Runs the update closure and applies its plan, then completes any
    /// future attached via `collaborators.result_future` with the same
    /// result handed back to the synchronous caller, per the data-flow
    /// rule that a write's completion fans out to the continuous-query
    /// notification, the interceptor `onAfter*` hook, and the attached
    /// future together.
    #[allow(clippy::too_many_arguments)]
    fn inner_apply<'a>(
        &self,
        op: Operation<'a>,
        explicit_version: Option<Version>,
        filters: &'a [&'a dyn Filter],
        conflict_resolver: Option<&'a dyn ConflictResolver>,
        ttl: TtlInstruction,
        is_primary: bool,
        collaborators: &Collaborators,
        config: &CacheConfig,
        now_millis: u64,
    ) -> Result<WriteOutcome> {
        let result = self.inner_apply_body(
            op,
            explicit_version,
            filters,
            conflict_resolver,
            ttl,
            is_primary,
            collaborators,
            config,
            now_millis,
        );
        if let Some(result_future) = collaborators.result_future {
            match &result {
                Ok(outcome) => {
                    result_future.on_done(outcome.clone());
                }
                Err(error) => {
                    result_future.on_error(error.clone());
                }
            }
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn inner_apply_body<'a>(
        &self,
        op: Operation<'a>,
        explicit_version: Option<Version>,
        filters: &'a [&'a dyn Filter],
        conflict_resolver: Option<&'a dyn ConflictResolver>,
        ttl: TtlInstruction,
        is_primary: bool,
        collaborators: &Collaborators,
        config: &CacheConfig,
        now_millis: u64,
    ) -> Result<WriteOutcome> {
        let mut guard = self.state.lock();
        self.ensure_active(&guard)?;

        let current = CurrentRow {
            value: guard.val.clone(),
            version: guard.ver,
        };
        let planned = UpdateClosure {
            key: &self.key,
            op,
            explicit_version,
            filters,
            interceptor: collaborators.interceptor,
            conflict_resolver,
            ttl,
            read_through: if config.read_through {
                collaborators.external_store
            } else {
                None
            },
            is_primary,
            write_through: config.write_through,
            comparator: config.version_comparator,
            version_generator: collaborators.version_generator,
            now_millis,
        }
        .plan(Some(&current))?;

        if let Some(metrics) = collaborators.metrics {
            match planned.outcome {
                UpdateOutcome::VersionCheckFailed => metrics.record_version_check_failure(),
                UpdateOutcome::ConflictUseOld => metrics.record_conflict_use_old(),
                _ => {}
            }
        }

        let counted = matches!(
            planned.outcome,
            UpdateOutcome::Success | UpdateOutcome::RemoveNoVal
        );

        match planned.tree_op {
            TreeOp::Put => {
                let new_version = planned
                    .new_version
                    .expect("put outcome always carries a version");
                let new_value = planned
                    .new_value
                    .clone()
                    .expect("put outcome always carries a value");
                collaborators
                    .row_store
                    .store(&self.key, &new_value, new_version)?;
                collaborators.wal.append(&DataRecord::new(
                    self.key.clone(),
                    Some(new_value.clone()),
                    new_version,
                ))?;
                let ttl_state = self.resolve_ttl_state(ttl, &guard, collaborators, now_millis);
                guard.val = Some(new_value);
                guard.ver = new_version;
                guard.extras = std::mem::take(&mut guard.extras).with_ttl(ttl_state);
                guard.clear_flag(IS_DELETED);
            }
            TreeOp::Remove => {
                let new_version = planned
                    .new_version
                    .expect("remove outcome always carries a version");
                collaborators.row_store.remove(&self.key)?;
                collaborators.wal.append(&DataRecord::new(
                    self.key.clone(),
                    None,
                    new_version,
                ))?;
                guard.val = None;
                guard.ver = new_version;
                self.finish_remove(&mut guard, new_version, config);
            }
            TreeOp::Noop => {}
        }

        let update_counter = if counted {
            Some(collaborators.partition.advance_update_counter())
        } else {
            None
        };
        let committed_version = guard.ver;
        drop(guard);

        if let Some((value, _version)) = &planned.external_refresh {
            if let Some(store) = collaborators.external_store {
                store.store(&self.key, value)?;
            }
        }

        tracing::debug!(
            target: "latticekv::entry",
            key_hash = self.key_hash(),
            outcome = ?planned.outcome,
            tree_op = ?planned.tree_op,
            "write planned"
        );

        if counted {
            if let Some(metrics) = collaborators.metrics {
                match planned.tree_op {
                    TreeOp::Remove => metrics.record_remove(),
                    _ => metrics.record_put(),
                }
            }
            let kind = match planned.tree_op {
                TreeOp::Remove => EventKind::Removed,
                _ => EventKind::Put,
            };
            let event = Event::with_values(
                self.key.clone(),
                kind,
                committed_version,
                planned.old_value.clone(),
                planned.new_value.clone(),
            );
            if let Some(events) = collaborators.events {
                events.record(event.clone());
            }
            if let Some(cq) = collaborators.cq {
                cq.notify(&self.key, event);
            }
            if let Some(interceptor) = collaborators.interceptor {
                match planned.tree_op {
                    TreeOp::Put => interceptor.on_after_put(
                        &self.key,
                        planned.old_value.as_deref(),
                        planned.new_value.as_deref().unwrap_or(&[]),
                    ),
                    TreeOp::Remove => {
                        interceptor.on_after_remove(&self.key, planned.old_value.as_deref())
                    }
                    TreeOp::Noop => {}
                }
            }
            if config.write_through {
                if let Some(store) = collaborators.external_store {
                    match planned.tree_op {
                        TreeOp::Put => store.store(
                            &self.key,
                            planned.new_value.as_deref().unwrap_or(&[]),
                        )?,
                        TreeOp::Remove => store.remove(&self.key)?,
                        TreeOp::Noop => {}
                    }
                }
            }
        }

        Ok(WriteOutcome {
            outcome: planned.outcome,
            old_value: planned.old_value,
            new_value: planned.new_value,
            new_version: planned.new_version,
            update_counter,
        })
    }

    fn resolve_ttl_state(
        &self,
        ttl: TtlInstruction,
        guard: &EntryState,
        collaborators: &Collaborators,
        now_millis: u64,
    ) -> TtlState {
        match ttl {
            TtlInstruction::Explicit(millis) => TtlState::from_ttl(millis, now_millis),
            TtlInstruction::PolicyForCreate | TtlInstruction::PolicyForUpdate => {
                TtlState::from_ttl(collaborators.expiry_policy.ttl_for_write(&self.key), now_millis)
            }
            TtlInstruction::NotChanged => guard.extras.ttl().unwrap_or(TtlState::ETERNAL),
            TtlInstruction::Eternal => TtlState::ETERNAL,
        }
    }

    /// Marks the entry obsolete or, with deferred deletion configured and
    /// active lock candidates present, a tombstone instead.
    fn finish_remove(&self, guard: &mut EntryState, version: Version, config: &CacheConfig) {
        let no_foreign_candidates = guard
            .extras
            .candidates()
            .map(CandidateSet::is_empty)
            .unwrap_or(true);
        if no_foreign_candidates && !config.deferred_delete {
            guard.extras = std::mem::take(&mut guard.extras).with_obsolete_version(version);
        } else {
            guard.set_flag(IS_DELETED);
        }
    }

    fn expire_locked(
        &self,
        collaborators: &Collaborators,
        config: &CacheConfig,
        now_millis: u64,
    ) -> Result<()> {
        let _ = now_millis;
        let mut guard = self.state.lock();
        if guard.extras.obsolete_version().is_some() {
            return Ok(());
        }
        let old_value = guard.val.take();
        let version = collaborators.version_generator.next_after(&guard.ver);
        guard.ver = version;
        self.finish_remove(&mut guard, version, config);
        let became_obsolete = guard.extras.obsolete_version().is_some();
        drop(guard);
        tracing::debug!(
            target: "latticekv::entry",
            key_hash = self.key_hash(),
            outcome = if became_obsolete { "obsolete" } else { "tombstoned" },
            "expire_locked"
        );
        if let Some(metrics) = collaborators.metrics {
            metrics.record_expiration();
        }
        let event = Event::with_values(self.key.clone(), EventKind::Expired, version, old_value, None);
        if let Some(events) = collaborators.events {
            events.record(event.clone());
        }
        if let Some(cq) = collaborators.cq {
            cq.notify(&self.key, event);
        }
        Ok(())
    }

    /// External TTL-scanner entry point: expires the entry if still
    /// active. Returns `true` iff this call performed the transition.
    pub fn on_ttl_expired(
        &self,
        collaborators: &Collaborators,
        config: &CacheConfig,
        now_millis: u64,
    ) -> Result<bool> {
        let still_active = {
            let guard = self.state.lock();
            guard.extras.obsolete_version().is_none()
        };
        if !still_active {
            return Ok(false);
        }
        self.expire_locked(collaborators, config, now_millis)?;
        Ok(true)
    }

    /// Attempts to mark the entry obsolete for single-entry eviction.
    /// Fails (returns `false`) if there are active lock candidates, or if
    /// deferred deletion is configured and the entry is currently a
    /// tombstone (`IS_DELETED`).
    pub fn evict_internal(
        &self,
        obsolete_ver: Version,
        filters: &[&dyn Filter],
        deferred_delete: bool,
    ) -> bool {
        let evicted = self.evict_internal_locked(obsolete_ver, filters, deferred_delete);
        tracing::trace!(
            target: "latticekv::entry",
            key_hash = self.key_hash(),
            outcome = if evicted { "evicted" } else { "retained" },
            "evict_internal"
        );
        evicted
    }

    fn evict_internal_locked(
        &self,
        obsolete_ver: Version,
        filters: &[&dyn Filter],
        deferred_delete: bool,
    ) -> bool {
        let mut guard = self.state.lock();
        if guard.extras.obsolete_version().is_some() {
            return true;
        }
        let has_readers = !guard
            .extras
            .candidates()
            .map(CandidateSet::is_empty)
            .unwrap_or(true);
        if has_readers {
            return false;
        }
        if deferred_delete && guard.has_flag(IS_DELETED) {
            return false;
        }
        if !filters.iter().all(|f| f.matches(guard.val.as_deref())) {
            return false;
        }
        guard.extras = std::mem::take(&mut guard.extras).with_obsolete_version(obsolete_ver);
        true
    }

    /// Like [`CacheEntry::evict_internal`] but, on success, returns a
    /// snapshot for the batch swap writer instead of discarding the value
    /// silently.
    pub fn evict_in_batch_internal(
        &self,
        obsolete_ver: Version,
        filters: &[&dyn Filter],
        deferred_delete: bool,
    ) -> Option<SwapEntrySnapshot> {
        let snapshot = self.evict_in_batch_internal_locked(obsolete_ver, filters, deferred_delete);
        tracing::trace!(
            target: "latticekv::entry",
            key_hash = self.key_hash(),
            outcome = if snapshot.is_some() { "evicted" } else { "retained" },
            "evict_in_batch_internal"
        );
        snapshot
    }

    fn evict_in_batch_internal_locked(
        &self,
        obsolete_ver: Version,
        filters: &[&dyn Filter],
        deferred_delete: bool,
    ) -> Option<SwapEntrySnapshot> {
        let mut guard = self.state.lock();
        if guard.extras.obsolete_version().is_some() {
            return None;
        }
        let has_readers = !guard
            .extras
            .candidates()
            .map(CandidateSet::is_empty)
            .unwrap_or(true);
        if has_readers {
            return None;
        }
        if deferred_delete && guard.has_flag(IS_DELETED) {
            return None;
        }
        if !filters.iter().all(|f| f.matches(guard.val.as_deref())) {
            return None;
        }
        let ttl = guard.extras.ttl().unwrap_or(TtlState::ETERNAL);
        let snapshot = SwapEntrySnapshot {
            key: self.key.clone(),
            value: guard.val.clone(),
            version: guard.ver,
            ttl_millis: ttl.ttl_millis,
            expire_time_millis: ttl.expire_time_millis,
        };
        guard.extras = std::mem::take(&mut guard.extras).with_obsolete_version(obsolete_ver);
        Some(snapshot)
    }

    /// Installs a value from preload or persistence. Applies iff the
    /// entry is new, or the incoming version compares above the current
    /// one (strictly, for atomic caches; per the comparator otherwise).
    pub fn initial_value(
        &self,
        value: Option<Vec<u8>>,
        version: Version,
        config: &CacheConfig,
        wal: &dyn Wal,
        wal_enabled: bool,
        is_near_cache: bool,
        cq: Option<&dyn ContinuousQueryRegistry>,
    ) -> Result<bool> {
        let mut guard = self.state.lock();
        self.ensure_active(&guard)?;

        let should_install = self.is_new_locked(&guard)
            || match config.atomicity_mode {
                AtomicityMode::Atomic => {
                    config.version_comparator.is_greater(&version, &guard.ver)
                }
                _ => {
                    config.version_comparator.compare(&version, &guard.ver) == CmpOrdering::Greater
                }
            };
        if !should_install {
            return Ok(false);
        }

        guard.val = value.clone();
        guard.ver = version;
        drop(guard);

        if wal_enabled && !is_near_cache {
            wal.append(&DataRecord::new(self.key.clone(), value.clone(), version))?;
        }
        if let Some(cq) = cq {
            if let Some(new_value) = &value {
                cq.notify(
                    &self.key,
                    Event::with_values(self.key.clone(), EventKind::Put, version, None, Some(new_value.clone())),
                );
            }
        }
        Ok(true)
    }
}
