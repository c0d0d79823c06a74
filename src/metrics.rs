//! Lightweight counters for entry activity, in the shape of the teacher's
//! `db::metrics::PerformanceMetrics`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Read/write/expiration counters for one cache, intended to be shared
/// behind an `Arc` across the partitions it covers.
#[derive(Debug, Default)]
pub struct EntryMetrics {
    reads: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    puts: AtomicU64,
    removes: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    version_check_failures: AtomicU64,
    conflict_use_old: AtomicU64,
}

/// A point-in-time copy of [`EntryMetrics`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reads: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub puts: u64,
    pub removes: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub version_check_failures: u64,
    pub conflict_use_old: u64,
}

impl EntryMetrics {
    /// Creates a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a read, classified as hit or miss.
    pub fn record_read(&self, hit: bool) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a successful put.
    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful remove.
    pub fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a TTL-driven expiration.
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an eviction.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a write rejected by the version check.
    pub fn record_version_check_failure(&self) {
        self.version_check_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a conflict resolver choosing to keep the existing value.
    pub fn record_conflict_use_old(&self) {
        self.conflict_use_old.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            version_check_failures: self.version_check_failures.load(Ordering::Relaxed),
            conflict_use_old: self.conflict_use_old.load(Ordering::Relaxed),
        }
    }

    /// Fraction of reads that were cache hits, `0.0` if there were none.
    pub fn cache_hit_rate(&self) -> f64 {
        let reads = self.reads.load(Ordering::Relaxed);
        if reads == 0 {
            return 0.0;
        }
        self.cache_hits.load(Ordering::Relaxed) as f64 / reads as f64
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.puts.store(0, Ordering::Relaxed);
        self.removes.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.version_check_failures.store(0, Ordering::Relaxed);
        self.conflict_use_old.store(0, Ordering::Relaxed);
    }

    /// Logs a one-line summary at `info` level.
    pub fn print_report(&self) {
        tracing::info!(
            reads = self.reads.load(Ordering::Relaxed),
            hit_rate = self.cache_hit_rate(),
            puts = self.puts.load(Ordering::Relaxed),
            removes = self.removes.load(Ordering::Relaxed),
            expirations = self.expirations.load(Ordering::Relaxed),
            evictions = self.evictions.load(Ordering::Relaxed),
            "entry metrics report"
        );
    }
}
