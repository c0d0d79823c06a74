//! Compact optional per-entry metadata.
//!
//! Most live entries carry no lock candidates and no explicit TTL, so the
//! common case is sized like a single enum tag plus (at most) one pointer,
//! not a struct with several always-present `Option` fields. Setters return
//! a possibly different variant; callers reassign the entry's `extras`
//! field rather than mutating in place, the way [`CommitStatus`] and
//! similar small state enums are updated by value throughout the teacher
//! codebase's storage layer.

use crate::candidate::CandidateSet;
use crate::version::Version;

/// TTL and absolute expiration time for an entry. Both fields are zero
/// ("eternal") or both set together at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TtlState {
    /// Time-to-live in milliseconds; zero means eternal.
    pub ttl_millis: u64,
    /// Absolute expiration time in epoch milliseconds; zero means eternal.
    pub expire_time_millis: u64,
}

impl TtlState {
    /// The eternal (never-expiring) state.
    pub const ETERNAL: TtlState = TtlState {
        ttl_millis: 0,
        expire_time_millis: 0,
    };

    /// Builds a TTL state with `expire_time = now + ttl`.
    pub fn from_ttl(ttl_millis: u64, now_millis: u64) -> Self {
        if ttl_millis == 0 {
            Self::ETERNAL
        } else {
            Self {
                ttl_millis,
                expire_time_millis: now_millis.saturating_add(ttl_millis),
            }
        }
    }

    /// `true` iff this entry carries no TTL.
    pub fn is_eternal(&self) -> bool {
        self.ttl_millis == 0 && self.expire_time_millis == 0
    }

    /// `true` iff `expire_time_millis` is set and has passed `now_millis`.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.expire_time_millis > 0 && self.expire_time_millis <= now_millis
    }
}

/// The optional metadata bag carried by a [`crate::entry::CacheEntry`].
///
/// Represented as a tagged sum over the observed combinations rather than
/// three independent `Option` fields, so the all-default entry (the common
/// case) costs one enum tag.
#[derive(Debug, Clone)]
pub enum EntryExtras {
    /// No TTL, no lock candidates, not obsolete.
    None,
    /// TTL/expire-time set, nothing else.
    Ttl(TtlState),
    /// MVCC lock candidates present, nothing else.
    Mvcc(CandidateSet),
    /// Entry has been marked obsolete; carries the obsolete version.
    Obsolete(Version),
    /// TTL and MVCC candidates both present.
    TtlMvcc(TtlState, CandidateSet),
    /// TTL set on an entry that has since gone obsolete. Retained briefly
    /// so a concurrent reader mid-flight can still see the TTL that was in
    /// effect; cleared on the next touch.
    TtlObsolete(TtlState, Version),
    /// MVCC candidates present on an entry that has since gone obsolete.
    MvccObsolete(CandidateSet, Version),
    /// All three pieces of metadata present simultaneously.
    Full(TtlState, CandidateSet, Version),
}

impl Default for EntryExtras {
    fn default() -> Self {
        EntryExtras::None
    }
}

impl EntryExtras {
    /// `true` iff this bag carries none of TTL, candidates, or obsolete
    /// version — i.e. it is semantically equivalent to not existing.
    pub fn is_empty(&self) -> bool {
        matches!(self, EntryExtras::None)
    }

    /// Returns the TTL state, if any.
    pub fn ttl(&self) -> Option<TtlState> {
        match self {
            EntryExtras::Ttl(t) | EntryExtras::TtlMvcc(t, _) | EntryExtras::TtlObsolete(t, _) => {
                Some(*t)
            }
            EntryExtras::Full(t, _, _) => Some(*t),
            _ => None,
        }
    }

    /// Returns the obsolete version, if the entry has transitioned to
    /// obsolete.
    pub fn obsolete_version(&self) -> Option<Version> {
        match self {
            EntryExtras::Obsolete(v)
            | EntryExtras::TtlObsolete(_, v)
            | EntryExtras::MvccObsolete(_, v) => Some(*v),
            EntryExtras::Full(_, _, v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the candidate set, if any.
    pub fn candidates(&self) -> Option<&CandidateSet> {
        match self {
            EntryExtras::Mvcc(c) | EntryExtras::TtlMvcc(_, c) | EntryExtras::MvccObsolete(c, _) => {
                Some(c)
            }
            EntryExtras::Full(_, c, _) => Some(c),
            _ => None,
        }
    }

    /// Returns a mutable reference to the candidate set, creating an empty
    /// one in place if this bag did not carry one yet.
    pub fn candidates_mut(&mut self) -> &mut CandidateSet {
        let needs_init = !matches!(
            self,
            EntryExtras::Mvcc(_)
                | EntryExtras::TtlMvcc(_, _)
                | EntryExtras::MvccObsolete(_, _)
                | EntryExtras::Full(_, _, _)
        );
        if needs_init {
            let taken = std::mem::replace(self, EntryExtras::None);
            *self = taken.with_candidates(CandidateSet::new());
        }
        match self {
            EntryExtras::Mvcc(c) | EntryExtras::TtlMvcc(_, c) | EntryExtras::MvccObsolete(c, _) => {
                c
            }
            EntryExtras::Full(_, c, _) => c,
            _ => unreachable!("initialized above"),
        }
    }

    /// Returns a new bag with the TTL set/cleared, preserving the other
    /// fields. Callers must reassign the entry's `extras` to the result.
    pub fn with_ttl(self, ttl: TtlState) -> Self {
        if ttl.is_eternal() {
            return self.clear_ttl();
        }
        match self {
            EntryExtras::None | EntryExtras::Ttl(_) => EntryExtras::Ttl(ttl),
            EntryExtras::Mvcc(c) | EntryExtras::TtlMvcc(_, c) => EntryExtras::TtlMvcc(ttl, c),
            EntryExtras::Obsolete(v) | EntryExtras::TtlObsolete(_, v) => {
                EntryExtras::TtlObsolete(ttl, v)
            }
            EntryExtras::MvccObsolete(c, v) | EntryExtras::Full(_, c, v) => {
                EntryExtras::Full(ttl, c, v)
            }
        }
    }

    fn clear_ttl(self) -> Self {
        match self {
            EntryExtras::None | EntryExtras::Ttl(_) => EntryExtras::None,
            EntryExtras::Mvcc(c) | EntryExtras::TtlMvcc(_, c) => EntryExtras::Mvcc(c),
            EntryExtras::Obsolete(v) | EntryExtras::TtlObsolete(_, v) => EntryExtras::Obsolete(v),
            EntryExtras::MvccObsolete(c, v) | EntryExtras::Full(_, c, v) => {
                EntryExtras::MvccObsolete(c, v)
            }
        }
    }

    /// Returns a new bag with the candidate set replaced, preserving TTL
    /// and obsolete fields.
    pub fn with_candidates(self, candidates: CandidateSet) -> Self {
        if candidates.is_empty() {
            return self.clear_candidates();
        }
        match self {
            EntryExtras::None | EntryExtras::Mvcc(_) => EntryExtras::Mvcc(candidates),
            EntryExtras::Ttl(t) | EntryExtras::TtlMvcc(t, _) => EntryExtras::TtlMvcc(t, candidates),
            EntryExtras::Obsolete(v) | EntryExtras::MvccObsolete(_, v) => {
                EntryExtras::MvccObsolete(candidates, v)
            }
            EntryExtras::TtlObsolete(t, v) | EntryExtras::Full(t, _, v) => {
                EntryExtras::Full(t, candidates, v)
            }
        }
    }

    fn clear_candidates(self) -> Self {
        match self {
            EntryExtras::None | EntryExtras::Mvcc(_) => EntryExtras::None,
            EntryExtras::Ttl(t) | EntryExtras::TtlMvcc(t, _) => EntryExtras::Ttl(t),
            EntryExtras::Obsolete(v) | EntryExtras::MvccObsolete(_, v) => EntryExtras::Obsolete(v),
            EntryExtras::TtlObsolete(t, v) | EntryExtras::Full(t, _, v) => {
                EntryExtras::TtlObsolete(t, v)
            }
        }
    }

    /// Returns a new bag marked obsolete at `version`, preserving TTL and
    /// candidates so in-flight readers still observe them briefly.
    pub fn with_obsolete_version(self, version: Version) -> Self {
        match self {
            EntryExtras::None | EntryExtras::Obsolete(_) => EntryExtras::Obsolete(version),
            EntryExtras::Ttl(t) | EntryExtras::TtlObsolete(t, _) => {
                EntryExtras::TtlObsolete(t, version)
            }
            EntryExtras::Mvcc(c) | EntryExtras::MvccObsolete(c, _) => {
                EntryExtras::MvccObsolete(c, version)
            }
            EntryExtras::TtlMvcc(t, c) | EntryExtras::Full(t, c, _) => {
                EntryExtras::Full(t, c, version)
            }
        }
    }
}
