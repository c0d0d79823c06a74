//! Entry lifecycle events delivered to continuous queries and event
//! recorders.

use crate::version::Version;

/// The kind of lifecycle event that occurred on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A read observed the current value.
    Read,
    /// A value was written (insert or update).
    Put,
    /// The entry was explicitly removed.
    Removed,
    /// The entry expired due to TTL.
    Expired,
    /// A lock candidate was granted ownership.
    Locked,
    /// The owning lock candidate released ownership.
    Unlocked,
}

/// A single lifecycle event, carrying enough context for a continuous
/// query or metrics consumer to react without re-reading the entry.
#[derive(Debug, Clone)]
pub struct Event {
    /// The key the event occurred on.
    pub key: Vec<u8>,
    /// What happened.
    pub kind: EventKind,
    /// The version in effect when the event was recorded.
    pub version: Version,
    /// The value committed before this event, for `Put`/`Removed`/
    /// `Expired` kinds.
    pub old_value: Option<Vec<u8>>,
    /// The value committed by this event, for `Put`.
    pub new_value: Option<Vec<u8>>,
}

impl Event {
    /// Builds an event with no old/new value pair attached (`Read`,
    /// `Locked`, `Unlocked`).
    pub fn new(key: Vec<u8>, kind: EventKind, version: Version) -> Self {
        Self {
            key,
            kind,
            version,
            old_value: None,
            new_value: None,
        }
    }

    /// Builds a `Put`/`Removed`/`Expired` event carrying the committed
    /// `(oldVal, newVal)` pair, per the continuous-query delivery
    /// guarantee that the notification reflects the value actually
    /// committed under the entry monitor.
    pub fn with_values(
        key: Vec<u8>,
        kind: EventKind,
        version: Version,
        old_value: Option<Vec<u8>>,
        new_value: Option<Vec<u8>>,
    ) -> Self {
        Self {
            key,
            kind,
            version,
            old_value,
            new_value,
        }
    }
}
