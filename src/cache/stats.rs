//! Cache Statistics Module
//!
//! Tracks lookups, expirations and sweeps for one cache instance.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Stats Recorder ==
/// Lock-free counters updated by cache operations.
///
/// Counters are atomics so the `get` fast path can record hits while holding
/// only the read lock.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    expired_on_access: AtomicU64,
    swept: AtomicU64,
    sweeps: AtomicU64,
    abandoned_sweeps: AtomicU64,
    resets: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// An entry found stale by a live lookup. Also counts as a miss.
    pub fn record_expired_on_access(&self) {
        self.expired_on_access.fetch_add(1, Ordering::Relaxed);
        self.record_miss();
    }

    pub fn record_sweep(&self, removed: usize, abandoned: bool) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.swept.fetch_add(removed as u64, Ordering::Relaxed);
        if abandoned {
            self.abandoned_sweeps.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the counters into a serializable snapshot.
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_on_access: self.expired_on_access.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            abandoned_sweeps: self.abandoned_sweeps.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Cache Stats ==
/// Point-in-time view of a cache's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups that found nothing (absent or expired)
    pub misses: u64,
    /// Entries removed by a lookup because they had expired
    pub expired_on_access: u64,
    /// Entries removed by sweeps
    pub swept: u64,
    /// Sweep passes run
    pub sweeps: u64,
    /// Sweep passes cut short by a reset or close
    pub abandoned_sweeps: u64,
    /// Calls to reset
    pub resets: u64,
    /// Entries stored when the snapshot was taken
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
