//! Stateless update planner executed under the entry monitor.
//!
//! [`UpdateClosure::plan`] takes the row the store handed back and the
//! operation parameters and returns a `{tree_op, new_row, outcome}` tuple
//! for [`crate::entry::CacheEntry`] to apply; it touches no shared state
//! itself; two calls with the same inputs produce the same plan.

use crate::error::{CacheError, Result};
use crate::interfaces::{ExternalStore, Interceptor};
use crate::version::{check_version, Version, VersionCheckOutcome, VersionComparator, VersionGenerator};

/// The row-store operation a plan resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOp {
    /// Write `new_row`'s value at its version.
    Put,
    /// Remove the row entirely.
    Remove,
    /// Leave the row store untouched.
    Noop,
}

/// Outcome tag reported alongside a plan, per component F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The plan applies a PUT or REMOVE that changes the committed value.
    Success,
    /// A REMOVE was requested against an already-absent value.
    RemoveNoVal,
    /// The incoming version did not strictly exceed the current one.
    VersionCheckFailed,
    /// The configured filter rejected the current value.
    FilterFailed,
    /// An entry processor ran but reported no modification.
    InvokeNoOp,
    /// The conflict resolver kept the existing value.
    ConflictUseOld,
    /// `onBeforePut`/`onBeforeRemove` vetoed the operation.
    InterceptorCancel,
}

/// What an entry processor did to the value it was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorOutcome {
    /// The processor made no change.
    Unchanged,
    /// The processor produced a new value.
    Update(Vec<u8>),
    /// The processor removed the value.
    Delete,
}

/// User-supplied entry-processor invoked for `TRANSFORM` operations.
pub trait EntryProcessor: Send + Sync {
    /// Runs against the current value (or `None` if absent) and reports
    /// what, if anything, changed.
    fn invoke(&self, current: Option<&[u8]>) -> ProcessorOutcome;
}

/// Predicate evaluated against the current value before a write commits.
pub trait Filter: Send + Sync {
    /// `true` iff the current value passes this filter.
    fn matches(&self, current: Option<&[u8]>) -> bool;
}

/// One side of a conflict-resolution comparison.
#[derive(Debug, Clone)]
pub struct VersionedEntry {
    /// The value on this side, if any.
    pub value: Option<Vec<u8>>,
    /// The version on this side.
    pub version: Version,
}

/// Result of resolving a conflict between the current and incoming value.
#[derive(Debug, Clone)]
pub enum ConflictOutcome {
    /// Keep the existing value; discard the incoming write.
    UseOld,
    /// Replace the incoming value with a merged one.
    Merge(Vec<u8>),
    /// Accept the incoming value unchanged.
    UseNew,
}

/// DR/cross-datacenter conflict resolver.
pub trait ConflictResolver: Send + Sync {
    /// Resolves a conflict between `old` (currently committed) and `new`
    /// (incoming).
    fn resolve(&self, old: &VersionedEntry, new: &VersionedEntry) -> ConflictOutcome;
}

/// How the plan's TTL/expire-time should be computed. `Explicit(0)`
/// demotes the operation to a delete, distinct from [`TtlInstruction::
/// Eternal`], which leaves the value un-expiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlInstruction {
    /// Caller supplied an explicit TTL in milliseconds. Zero means
    /// "demote to delete", not "no expiry".
    Explicit(u64),
    /// Ask the expiry policy for a create-time TTL.
    PolicyForCreate,
    /// Ask the expiry policy for an update-time TTL.
    PolicyForUpdate,
    /// Leave the existing TTL/expire-time untouched.
    NotChanged,
    /// No TTL; the value never expires.
    Eternal,
}

/// The operation this closure plans: a direct put/remove, or an
/// entry-processor transform.
pub enum Operation<'a> {
    /// Write `Vec<u8>` unconditionally (subject to the remaining steps).
    Put(Vec<u8>),
    /// Remove the value.
    Remove,
    /// Run a processor against the current value.
    Transform(&'a dyn EntryProcessor),
}

/// The row the store handed back for this key, if any.
#[derive(Debug, Clone)]
pub struct CurrentRow {
    /// Current committed value, if the key exists.
    pub value: Option<Vec<u8>>,
    /// Current committed version.
    pub version: Version,
}

/// Resolved plan: what to do to the row store, and why.
pub struct UpdateResult {
    /// The row-store operation to apply.
    pub tree_op: TreeOp,
    /// The new value, when `tree_op` is [`TreeOp::Put`].
    pub new_value: Option<Vec<u8>>,
    /// The version staged by this plan, when it changes the row.
    pub new_version: Option<Version>,
    /// The outcome tag surfaced to the caller.
    pub outcome: UpdateOutcome,
    /// The value that was committed before this plan ran.
    pub old_value: Option<Vec<u8>>,
    /// Set when a conflict/version-check outcome additionally requires
    /// refreshing the external store with the existing value (scenario:
    /// equal-version or `USE_OLD` conflict with write-through enabled at
    /// the primary).
    pub external_refresh: Option<(Vec<u8>, Version)>,
}

impl UpdateResult {
    fn noop(outcome: UpdateOutcome, old_value: Option<Vec<u8>>) -> Self {
        Self {
            tree_op: TreeOp::Noop,
            new_value: None,
            new_version: None,
            outcome,
            old_value,
            external_refresh: None,
        }
    }
}

/// Stateless planner for one update, built fresh per invocation from the
/// operation's parameters.
pub struct UpdateClosure<'a> {
    /// The key being updated, for interceptor/store calls.
    pub key: &'a [u8],
    /// The operation to plan.
    pub op: Operation<'a>,
    /// Caller-supplied version, preferred over minting one.
    pub explicit_version: Option<Version>,
    /// Filters evaluated against the current value; an empty slice always
    /// passes.
    pub filters: &'a [&'a dyn Filter],
    /// Optional veto/rewrite hook.
    pub interceptor: Option<&'a dyn Interceptor>,
    /// Optional DR conflict resolver.
    pub conflict_resolver: Option<&'a dyn ConflictResolver>,
    /// TTL computation rule for this operation.
    pub ttl: TtlInstruction,
    /// Read-through loader consulted when the row store has no current
    /// row and one is needed to evaluate the plan.
    pub read_through: Option<&'a dyn ExternalStore>,
    /// Whether this node is the primary for the key.
    pub is_primary: bool,
    /// Whether write-through to an external store is configured.
    pub write_through: bool,
    /// Version comparator in effect for this cache.
    pub comparator: VersionComparator,
    /// Version generator used when no explicit version is supplied.
    pub version_generator: &'a dyn VersionGenerator,
    /// Wall-clock time used for TTL/expiry computation, epoch millis.
    pub now_millis: u64,
}

impl<'a> UpdateClosure<'a> {
    /// Runs the nine-step planning algorithm and returns the resolved
    /// plan. Never mutates shared state; the caller applies the result.
    pub fn plan(&self, current: Option<&CurrentRow>) -> Result<UpdateResult> {
        // Step 1: load old.
        let (mut old_value, old_version) = match current {
            Some(row) => (row.value.clone(), row.version),
            None => (None, Version::zero()),
        };
        if old_value.is_none() {
            if let Some(store) = self.read_through {
                old_value = store.load(self.key)?;
            }
        }

        // Step 2: entry processor, or a direct put/remove.
        let (mut effective_value, mut modified, is_remove_request) = match &self.op {
            Operation::Put(v) => (Some(v.clone()), true, false),
            Operation::Remove => (None, true, true),
            Operation::Transform(processor) => match processor.invoke(old_value.as_deref()) {
                ProcessorOutcome::Unchanged => (old_value.clone(), false, false),
                ProcessorOutcome::Update(v) => (Some(v), true, false),
                ProcessorOutcome::Delete => (None, true, true),
            },
        };

        let incoming_version = self
            .explicit_version
            .unwrap_or_else(|| self.version_generator.next_after(&old_version));

        // Step 3: conflict resolution.
        if let Some(resolver) = self.conflict_resolver {
            let old_side = VersionedEntry {
                value: old_value.clone(),
                version: old_version,
            };
            let new_side = VersionedEntry {
                value: effective_value.clone(),
                version: incoming_version,
            };
            match resolver.resolve(&old_side, &new_side) {
                ConflictOutcome::UseOld => {
                    let mut result = UpdateResult::noop(UpdateOutcome::ConflictUseOld, old_value.clone());
                    if self.is_primary && self.write_through {
                        if let Some(v) = &old_value {
                            result.external_refresh = Some((v.clone(), old_version));
                        }
                    }
                    return Ok(result);
                }
                ConflictOutcome::Merge(merged) => {
                    effective_value = Some(merged);
                    modified = true;
                }
                ConflictOutcome::UseNew => {}
            }
        } else {
            // Step 4: version check, only when there is no conflict
            // resolver configured.
            match check_version(&self.comparator, &old_version, &incoming_version) {
                VersionCheckOutcome::Accept => {}
                VersionCheckOutcome::EqualRefresh => {
                    let mut result =
                        UpdateResult::noop(UpdateOutcome::VersionCheckFailed, old_value.clone());
                    if self.is_primary && self.write_through {
                        if let Some(v) = &old_value {
                            result.external_refresh = Some((v.clone(), old_version));
                        }
                    }
                    return Ok(result);
                }
                VersionCheckOutcome::Reject => {
                    return Ok(UpdateResult::noop(
                        UpdateOutcome::VersionCheckFailed,
                        old_value.clone(),
                    ));
                }
            }
        }

        // Step 5: filter.
        if !self.filters.iter().all(|f| f.matches(old_value.as_deref())) {
            return Ok(UpdateResult::noop(UpdateOutcome::FilterFailed, old_value.clone()));
        }

        // Step 6: invoke no-op.
        if !modified {
            return Ok(UpdateResult::noop(UpdateOutcome::InvokeNoOp, old_value.clone()));
        }

        // Step 7: interceptor.
        let mut is_remove = is_remove_request;
        if let Some(interceptor) = self.interceptor {
            if is_remove {
                let cancel = interceptor.on_before_remove(self.key, old_value.as_deref())?;
                if cancel {
                    return Ok(UpdateResult::noop(
                        UpdateOutcome::InterceptorCancel,
                        old_value.clone(),
                    ));
                }
            } else {
                let candidate = effective_value
                    .clone()
                    .expect("non-remove path always carries a candidate value");
                match interceptor.on_before_put(self.key, &candidate)? {
                    Some(adopted) => effective_value = Some(adopted),
                    None => {
                        return Ok(UpdateResult::noop(
                            UpdateOutcome::InterceptorCancel,
                            old_value.clone(),
                        ))
                    }
                }
            }
        }

        // Step 8: compute TTL/expire. An explicit zero TTL demotes the
        // operation to a delete regardless of what step 2-7 produced.
        if matches!(self.ttl, TtlInstruction::Explicit(0)) {
            is_remove = true;
            effective_value = None;
        }

        // Step 9: apply.
        if is_remove {
            let outcome = if old_value.is_none() {
                UpdateOutcome::RemoveNoVal
            } else {
                UpdateOutcome::Success
            };
            return Ok(UpdateResult {
                tree_op: TreeOp::Remove,
                new_value: None,
                new_version: Some(incoming_version),
                outcome,
                old_value,
                external_refresh: None,
            });
        }

        let new_value = effective_value.ok_or_else(|| {
            CacheError::Invalid("plan resolved to a put with no value".to_string())
        })?;
        Ok(UpdateResult {
            tree_op: TreeOp::Put,
            new_value: Some(new_value),
            new_version: Some(incoming_version),
            outcome: UpdateOutcome::Success,
            old_value,
            external_refresh: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::LocalVersionGenerator;

    struct AlwaysFail;
    impl Filter for AlwaysFail {
        fn matches(&self, _current: Option<&[u8]>) -> bool {
            false
        }
    }

    struct NoopProcessor;
    impl EntryProcessor for NoopProcessor {
        fn invoke(&self, _current: Option<&[u8]>) -> ProcessorOutcome {
            ProcessorOutcome::Unchanged
        }
    }

    fn closure<'a>(
        key: &'a [u8],
        op: Operation<'a>,
        gen: &'a LocalVersionGenerator,
    ) -> UpdateClosure<'a> {
        UpdateClosure {
            key,
            op,
            explicit_version: None,
            filters: &[],
            interceptor: None,
            conflict_resolver: None,
            ttl: TtlInstruction::Eternal,
            read_through: None,
            is_primary: true,
            write_through: false,
            comparator: VersionComparator::strict(),
            version_generator: gen,
            now_millis: 0,
        }
    }

    #[test]
    fn fresh_put_on_new_key_succeeds() {
        let gen = LocalVersionGenerator::new(1, 0, 0);
        let plan = closure(b"a", Operation::Put(b"1".to_vec()), &gen)
            .plan(None)
            .unwrap();
        assert_eq!(plan.outcome, UpdateOutcome::Success);
        assert_eq!(plan.tree_op, TreeOp::Put);
        assert_eq!(plan.new_value.unwrap(), b"1".to_vec());
    }

    #[test]
    fn stale_explicit_version_is_rejected() {
        let gen = LocalVersionGenerator::new(1, 0, 0);
        let current = CurrentRow {
            value: Some(b"1".to_vec()),
            version: Version::new(1, 200, 5, 0, 0),
        };
        let mut c = closure(b"a", Operation::Put(b"0".to_vec()), &gen);
        c.explicit_version = Some(Version::new(1, 100, 4, 0, 0));
        let plan = c.plan(Some(&current)).unwrap();
        assert_eq!(plan.outcome, UpdateOutcome::VersionCheckFailed);
        assert_eq!(plan.tree_op, TreeOp::Noop);
    }

    #[test]
    fn filter_failure_short_circuits_before_apply() {
        let gen = LocalVersionGenerator::new(1, 0, 0);
        let reject = AlwaysFail;
        let filters: [&dyn Filter; 1] = [&reject];
        let mut c = closure(b"a", Operation::Put(b"1".to_vec()), &gen);
        c.filters = &filters;
        let plan = c.plan(None).unwrap();
        assert_eq!(plan.outcome, UpdateOutcome::FilterFailed);
    }

    #[test]
    fn unmodified_processor_reports_invoke_no_op() {
        let gen = LocalVersionGenerator::new(1, 0, 0);
        let processor = NoopProcessor;
        let current = CurrentRow {
            value: Some(b"1".to_vec()),
            version: Version::new(1, 100, 1, 0, 0),
        };
        let plan = closure(b"a", Operation::Transform(&processor), &gen)
            .plan(Some(&current))
            .unwrap();
        assert_eq!(plan.outcome, UpdateOutcome::InvokeNoOp);
        assert_eq!(plan.tree_op, TreeOp::Noop);
    }

    #[test]
    fn explicit_zero_ttl_demotes_put_to_remove() {
        let gen = LocalVersionGenerator::new(1, 0, 0);
        let mut c = closure(b"a", Operation::Put(b"1".to_vec()), &gen);
        c.ttl = TtlInstruction::Explicit(0);
        let plan = c.plan(None).unwrap();
        assert_eq!(plan.tree_op, TreeOp::Remove);
    }

    #[test]
    fn remove_on_absent_value_reports_remove_no_val() {
        let gen = LocalVersionGenerator::new(1, 0, 0);
        let plan = closure(b"a", Operation::Remove, &gen).plan(None).unwrap();
        assert_eq!(plan.outcome, UpdateOutcome::RemoveNoVal);
        assert_eq!(plan.tree_op, TreeOp::Remove);
    }

    struct UseOldResolver;
    impl ConflictResolver for UseOldResolver {
        fn resolve(&self, _old: &VersionedEntry, _new: &VersionedEntry) -> ConflictOutcome {
            ConflictOutcome::UseOld
        }
    }

    #[test]
    fn conflict_use_old_with_write_through_refreshes_external_store() {
        let gen = LocalVersionGenerator::new(1, 0, 0);
        let resolver = UseOldResolver;
        let current = CurrentRow {
            value: Some(b"a".to_vec()),
            version: Version::new(1, 100, 1, 0, 0),
        };
        let mut c = closure(b"a", Operation::Put(b"b".to_vec()), &gen);
        c.conflict_resolver = Some(&resolver);
        c.write_through = true;
        let plan = c.plan(Some(&current)).unwrap();
        assert_eq!(plan.outcome, UpdateOutcome::ConflictUseOld);
        let (value, version) = plan.external_refresh.unwrap();
        assert_eq!(value, b"a".to_vec());
        assert_eq!(version, current.version);
    }
}
