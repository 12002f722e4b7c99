//! Repository Statistics Module
//!
//! Tracks cache hits, misses and network activity of the repository.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Repository Stats ==
/// Point-in-time snapshot of repository counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    /// Loads served from the cache
    pub hits: u64,
    /// Loads that found no entry and waited on a fetch
    pub misses: u64,
    /// Network fetches started
    pub fetches: u64,
    /// Fetches that resolved to no data
    pub fetch_failures: u64,
    /// Background refreshes started for stale entries
    pub background_refreshes: u64,
    /// Entries currently cached
    pub total_entries: usize,
}

impl RepositoryStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was loaded yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters updated from concurrent loads and fetch tasks.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    background_refreshes: AtomicU64,
}

impl StatsCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_refresh(&self) {
        self.background_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, total_entries: usize) -> RepositoryStats {
        RepositoryStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            background_refreshes: self.background_refreshes.load(Ordering::Relaxed),
            total_entries,
        }
    }
}
