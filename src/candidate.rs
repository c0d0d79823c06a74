//! Ordered lock candidate list for a single entry.
//!
//! Most entries have zero or one candidate, so the set is backed by a
//! [`smallvec::SmallVec`] with inline capacity for two before it spills to
//! the heap. Candidates are kept in arrival order; the first local,
//! granted candidate is the current owner.

use smallvec::SmallVec;

/// Identity of a lock candidate: either a local thread within this process
/// or a remote (node, thread) pair recorded for a transaction originating
/// elsewhere in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateOwner {
    /// A thread local to this process.
    Local(u64),
    /// A thread on a remote node, identified by node id and remote thread
    /// id.
    Remote(u32, u64),
}

impl CandidateOwner {
    /// `true` iff this candidate originates on this node.
    pub fn is_local(&self) -> bool {
        matches!(self, CandidateOwner::Local(_))
    }
}

/// A single pending or granted lock holder recorded on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Owning thread/node identity.
    pub owner: CandidateOwner,
    /// Transaction/lock version associated with this candidate.
    pub order: u64,
    /// `true` once the candidate has been granted ownership (as opposed to
    /// merely queued behind an earlier candidate).
    pub granted: bool,
}

/// Ordered candidate list owned by one [`crate::entry::CacheEntry`].
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: SmallVec<[Candidate; 2]>,
}

impl CandidateSet {
    /// Creates an empty candidate set.
    pub fn new() -> Self {
        Self {
            candidates: SmallVec::new(),
        }
    }

    /// `true` iff there are no candidates at all.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of candidates currently recorded.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Adds a candidate to the back of the queue. The first candidate
    /// added to an empty set is granted immediately; subsequent ones queue
    /// behind it.
    pub fn add(&mut self, owner: CandidateOwner, order: u64) -> Candidate {
        let granted = self.candidates.is_empty();
        let candidate = Candidate {
            owner,
            order,
            granted,
        };
        self.candidates.push(candidate);
        candidate
    }

    /// Removes the candidate owned by `owner`, if present, and promotes
    /// the next queued candidate to granted. Returns the removed
    /// candidate.
    pub fn remove(&mut self, owner: CandidateOwner) -> Option<Candidate> {
        let idx = self.candidates.iter().position(|c| c.owner == owner)?;
        let removed = self.candidates.remove(idx);
        self.promote_next();
        Some(removed)
    }

    fn promote_next(&mut self) {
        if let Some(front) = self.candidates.first_mut() {
            front.granted = true;
        }
    }

    /// Returns the currently granted (owning) candidate, if any.
    pub fn owner(&self) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.granted)
    }

    /// `true` iff any candidate currently holds ownership (granted).
    pub fn any_owner(&self) -> bool {
        self.candidates.iter().any(|c| c.granted)
    }

    /// `true` iff `owner` currently holds the granted candidate slot.
    pub fn is_owned_by(&self, owner: CandidateOwner) -> bool {
        self.owner().is_some_and(|c| c.owner == owner)
    }

    /// `true` iff a local thread id appears among the candidates,
    /// regardless of grant state.
    pub fn has_local_thread(&self, thread_id: u64) -> bool {
        self.candidates
            .iter()
            .any(|c| c.owner == CandidateOwner::Local(thread_id))
    }

    /// `true` iff the set has no candidates other than those in
    /// `exclude`. Used by the entry to decide whether a removal may
    /// immediately mark obsolete (safe iff no active owners other than the
    /// removing transaction).
    pub fn is_empty_excluding(&self, exclude: &[CandidateOwner]) -> bool {
        self.candidates
            .iter()
            .all(|c| exclude.contains(&c.owner))
    }

    /// Iterates candidates in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }
}
