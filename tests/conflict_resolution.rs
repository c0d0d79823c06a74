//! DR conflict resolution and entry-processor (`TRANSFORM`) scenarios
//! against the atomic update path.

use latticekv::config::CacheConfig;
use latticekv::defaults::{NoopContinuousQueryRegistry, NoopInterceptor, StaticExpiryPolicy};
use latticekv::entry::closure::{
    ConflictOutcome, ConflictResolver, EntryProcessor, Operation, ProcessorOutcome, TtlInstruction,
    UpdateOutcome, VersionedEntry,
};
use latticekv::entry::{CacheEntry, Collaborators};
use latticekv::error::Result;
use latticekv::interfaces::ExternalStore;
use latticekv::partition::InMemoryPartition;
use latticekv::row_store::InMemoryRowStore;
use latticekv::version::{LocalVersionGenerator, Version, VersionComparator};
use latticekv::wal::NoopWal;
use parking_lot::Mutex;

struct RecordingExternalStore {
    refreshed: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl RecordingExternalStore {
    fn new() -> Self {
        Self {
            refreshed: Mutex::new(Vec::new()),
        }
    }
}

impl ExternalStore for RecordingExternalStore {
    fn load(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn store(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.refreshed
            .lock()
            .push((key.to_vec(), value.to_vec()));
        Ok(())
    }

    fn remove(&self, _key: &[u8]) -> Result<()> {
        Ok(())
    }
}

struct UseOldResolver;
impl ConflictResolver for UseOldResolver {
    fn resolve(&self, _old: &VersionedEntry, _new: &VersionedEntry) -> ConflictOutcome {
        ConflictOutcome::UseOld
    }
}

/// Scenario 3: a conflict resolver returning `USE_OLD` on equal versions,
/// with write-through enabled at the primary, leaves the entry untouched
/// but refreshes the external store with the existing value.
#[test]
fn scenario_conflict_use_old_refreshes_external_store() {
    let row_store = InMemoryRowStore::new();
    let external_store = RecordingExternalStore::new();
    let wal = NoopWal;
    let interceptor = NoopInterceptor;
    let cq = NoopContinuousQueryRegistry;
    let partition = InMemoryPartition::new();
    let generator = LocalVersionGenerator::new(1, 0, 0);
    let expiry = StaticExpiryPolicy::eternal();

    let collaborators = Collaborators {
        row_store: &row_store,
        external_store: Some(&external_store),
        wal: &wal,
        interceptor: Some(&interceptor),
        cq: Some(&cq),
        events: None,
        partition: &partition,
        version_generator: &generator,
        expiry_policy: &expiry,
        result_future: None,
        metrics: None,
    };

    let mut config = CacheConfig::atomic();
    config.write_through = true;
    let entry = CacheEntry::new(b"a".to_vec(), Version::zero(), 0);

    let shared_version = Version::new(1, 1, 1, 0, 0);
    entry
        .inner_set(
            b"a".to_vec(),
            Some(shared_version),
            &[],
            TtlInstruction::Eternal,
            &collaborators,
            &config,
            0,
        )
        .unwrap();

    let resolver = UseOldResolver;
    let filters: [&dyn latticekv::entry::closure::Filter; 0] = [];
    let result = entry
        .inner_update(
            Operation::Put(b"b".to_vec()),
            Some(shared_version),
            &filters,
            Some(&resolver),
            TtlInstruction::Eternal,
            true,
            &collaborators,
            &config,
            0,
        )
        .unwrap();

    assert_eq!(result.outcome, UpdateOutcome::ConflictUseOld);
    assert_eq!(entry.version(), shared_version);
    assert_eq!(
        entry.inner_get(false, false, &collaborators, &config, 0).unwrap(),
        Some(b"a".to_vec())
    );
    let refreshed = external_store.refreshed.lock();
    assert_eq!(refreshed.as_slice(), &[(b"a".to_vec(), b"a".to_vec())]);
}

struct NoopProcessor;
impl EntryProcessor for NoopProcessor {
    fn invoke(&self, _current: Option<&[u8]>) -> ProcessorOutcome {
        ProcessorOutcome::Unchanged
    }
}

/// Scenario 5: an entry processor that leaves the entry unmodified reports
/// `INVOKE_NO_OP` and performs no version change.
#[test]
fn scenario_entry_processor_no_op() {
    let row_store = InMemoryRowStore::new();
    let wal = NoopWal;
    let interceptor = NoopInterceptor;
    let cq = NoopContinuousQueryRegistry;
    let partition = InMemoryPartition::new();
    let generator = LocalVersionGenerator::new(1, 0, 0);
    let expiry = StaticExpiryPolicy::eternal();

    let collaborators = Collaborators {
        row_store: &row_store,
        external_store: None,
        wal: &wal,
        interceptor: Some(&interceptor),
        cq: Some(&cq),
        events: None,
        partition: &partition,
        version_generator: &generator,
        expiry_policy: &expiry,
        result_future: None,
        metrics: None,
    };

    let config = CacheConfig::atomic();
    let entry = CacheEntry::new(b"a".to_vec(), Version::zero(), 0);
    let v1 = Version::new(1, 1, 1, 0, 0);
    entry
        .inner_set(b"1".to_vec(), Some(v1), &[], TtlInstruction::Eternal, &collaborators, &config, 0)
        .unwrap();

    let processor = NoopProcessor;
    let filters: [&dyn latticekv::entry::closure::Filter; 0] = [];
    let result = entry
        .inner_update(
            Operation::Transform(&processor),
            None,
            &filters,
            None,
            TtlInstruction::NotChanged,
            true,
            &collaborators,
            &config,
            0,
        )
        .unwrap();

    assert_eq!(result.outcome, UpdateOutcome::InvokeNoOp);
    assert_eq!(entry.version(), v1);
}

/// Boundary: under `ignore_time`, two versions differing only in physical
/// time compare equal, and the equal-version write path triggers a store
/// refresh rather than a new write.
#[test]
fn ignore_time_equal_version_triggers_refresh_not_new_write() {
    let cmp = VersionComparator::ignoring_time();
    let current = Version::new(1, 100, 5, 0, 0);
    let incoming = Version::new(1, 999, 5, 0, 0);
    assert!(cmp.is_equal(&current, &incoming));

    let row_store = InMemoryRowStore::new();
    let external_store = RecordingExternalStore::new();
    let wal = NoopWal;
    let interceptor = NoopInterceptor;
    let cq = NoopContinuousQueryRegistry;
    let partition = InMemoryPartition::new();
    let generator = LocalVersionGenerator::new(1, 0, 0);
    let expiry = StaticExpiryPolicy::eternal();
    let collaborators = Collaborators {
        row_store: &row_store,
        external_store: Some(&external_store),
        wal: &wal,
        interceptor: Some(&interceptor),
        cq: Some(&cq),
        events: None,
        partition: &partition,
        version_generator: &generator,
        expiry_policy: &expiry,
        result_future: None,
        metrics: None,
    };
    let mut config = CacheConfig::eventually_consistent();
    config.write_through = true;
    let entry = CacheEntry::new(b"a".to_vec(), Version::zero(), 0);
    entry
        .inner_set(b"a".to_vec(), Some(current), &[], TtlInstruction::Eternal, &collaborators, &config, 0)
        .unwrap();

    let result = entry
        .inner_set(b"b".to_vec(), Some(incoming), &[], TtlInstruction::Eternal, &collaborators, &config, 0)
        .unwrap();

    assert_eq!(result.outcome, UpdateOutcome::VersionCheckFailed);
    assert_eq!(
        entry.inner_get(false, false, &collaborators, &config, 0).unwrap(),
        Some(b"a".to_vec())
    );
}
