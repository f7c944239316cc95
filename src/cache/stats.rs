//! Cache Statistics Module
//!
//! Tracks lookup hits and misses, writes, rejected writes and purges.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the current generation
    pub hits: u64,
    /// Lookups with no entry in the current generation
    pub misses: u64,
    /// Entries written
    pub writes: u64,
    /// Writes rejected (quota, unknown generation)
    pub write_failures: u64,
    /// Generations deleted by purges
    pub purged_generations: u64,
    /// Entries across all live generations
    pub total_entries: usize,
    /// Bytes across all live generations
    pub total_bytes: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

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

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }

    pub fn record_purge(&mut self, generations: usize) {
        self.purged_generations += generations as u64;
    }
}
