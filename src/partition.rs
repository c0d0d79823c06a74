//! Reference [`Partition`] implementation: a bare monotone update counter.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::interfaces::Partition;

/// A partition whose only state is the `AtomicU64` update counter the
/// update closure's write path advances on every successful commit.
#[derive(Default)]
pub struct InMemoryPartition {
    counter: AtomicU64,
}

impl InMemoryPartition {
    /// Creates a partition with its counter at zero.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Partition for InMemoryPartition {
    fn update_counter(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn advance_update_counter(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_monotone_and_starts_at_zero() {
        let partition = InMemoryPartition::new();
        assert_eq!(partition.update_counter(), 0);
        assert_eq!(partition.advance_update_counter(), 1);
        assert_eq!(partition.advance_update_counter(), 2);
        assert_eq!(partition.update_counter(), 2);
    }
}
