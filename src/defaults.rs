//! Pass-through/reference implementations of the remaining collaborator
//! traits, so a [`crate::entry::CacheEntry`] can be exercised with only
//! the collaborators a given test or deployment actually cares about
//! overriding.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

use crate::error::Result;
use crate::events::{Event, EventKind};
use crate::interfaces::{ContinuousQueryRegistry, DrReplicator, EventRecorder, ExpiryPolicy, ExternalStore, Interceptor};
use crate::version::Version;

/// Fixed TTLs for create/update/access, with no per-key variation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticExpiryPolicy {
    /// TTL in milliseconds applied to freshly created values.
    pub create_millis: u64,
    /// TTL in milliseconds applied on update.
    pub update_millis: u64,
    /// TTL in milliseconds applied on read-triggered touch.
    pub access_millis: u64,
}

impl StaticExpiryPolicy {
    /// A policy with no TTL at all (eternal entries).
    pub fn eternal() -> Self {
        Self::default()
    }

    /// A uniform TTL applied to create, update, and access alike.
    pub fn uniform(millis: u64) -> Self {
        Self {
            create_millis: millis,
            update_millis: millis,
            access_millis: millis,
        }
    }
}

impl ExpiryPolicy for StaticExpiryPolicy {
    fn ttl_for_write(&self, _key: &[u8]) -> u64 {
        self.create_millis
    }

    fn ttl_for_access(&self, _key: &[u8]) -> u64 {
        self.access_millis
    }
}

/// An interceptor that never vetoes or rewrites anything.
#[derive(Debug, Default)]
pub struct NoopInterceptor;

impl Interceptor for NoopInterceptor {
    fn on_before_put(&self, _key: &[u8], new_value: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(Some(new_value.to_vec()))
    }

    fn on_after_put(&self, _key: &[u8], _old_value: Option<&[u8]>, _new_value: &[u8]) {}

    fn on_before_remove(&self, _key: &[u8], _old_value: Option<&[u8]>) -> Result<bool> {
        Ok(false)
    }

    fn on_after_remove(&self, _key: &[u8], _old_value: Option<&[u8]>) {}
}

/// A continuous-query registry with no registered queries.
#[derive(Debug, Default)]
pub struct NoopContinuousQueryRegistry;

impl ContinuousQueryRegistry for NoopContinuousQueryRegistry {
    fn notify(&self, _key: &[u8], _event: Event) {}
}

/// An external store backing no data at all: every load misses, every
/// write/remove succeeds silently.
#[derive(Debug, Default)]
pub struct NoopExternalStore;

impl ExternalStore for NoopExternalStore {
    fn load(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn store(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// A DR replicator that discards everything, for single-datacenter
/// deployments.
#[derive(Debug, Default)]
pub struct NoopDrReplicator;

impl DrReplicator for NoopDrReplicator {
    fn replicate(&self, _key: &[u8], _value: Option<&[u8]>, _version: Version) -> Result<()> {
        Ok(())
    }
}

/// Records emitted events for test assertions, gating by [`EventKind`] the
/// way the real collaborator's `isRecordable` check would.
pub struct ChannelEventRecorder {
    sender: Mutex<Sender<Event>>,
    recordable: Vec<EventKind>,
}

impl ChannelEventRecorder {
    /// Builds a recorder and the receiver half of its channel. `recordable`
    /// lists the event kinds that should actually be forwarded; all others
    /// are dropped.
    pub fn new(recordable: Vec<EventKind>) -> (Self, Receiver<Event>) {
        let (sender, receiver) = std::sync::mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
                recordable,
            },
            receiver,
        )
    }

    fn is_recordable(&self, kind: EventKind) -> bool {
        self.recordable.contains(&kind)
    }
}

impl EventRecorder for ChannelEventRecorder {
    fn record(&self, event: Event) {
        if self.is_recordable(event.kind) {
            let _ = self.sender.lock().unwrap().send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_expiry_policy_reports_uniform_ttl() {
        let policy = StaticExpiryPolicy::uniform(5_000);
        assert_eq!(policy.ttl_for_write(b"k"), 5_000);
        assert_eq!(policy.ttl_for_access(b"k"), 5_000);
    }

    #[test]
    fn noop_interceptor_passes_values_through() {
        let interceptor = NoopInterceptor;
        let adopted = interceptor.on_before_put(b"k", b"v").unwrap();
        assert_eq!(adopted.unwrap(), b"v".to_vec());
        assert!(!interceptor.on_before_remove(b"k", Some(b"v")).unwrap());
    }

    #[test]
    fn channel_event_recorder_filters_by_kind() {
        let (recorder, receiver) = ChannelEventRecorder::new(vec![EventKind::Put]);
        recorder.record(Event::new(b"k".to_vec(), EventKind::Read, Version::zero()));
        recorder.record(Event::new(b"k".to_vec(), EventKind::Put, Version::zero()));
        let first = receiver.recv().unwrap();
        assert_eq!(first.kind, EventKind::Put);
        assert!(receiver.try_recv().is_err());
    }
}
