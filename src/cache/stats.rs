//! Cache Statistics Module
//!
//! Tracks per-shard counters (hits, misses, admissions, evictions) and merges them.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
///
/// Each shard keeps its own copy under its lock; the engine sums them into a
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of writes that were stored (new or replaced)
    pub sets: u64,
    /// Number of new keys turned away by the admission policy
    pub rejections: u64,
    /// Number of entries evicted to make room
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expirations: u64,
    /// Frequency events lost to a saturated event queue
    pub dropped_events: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Sum of resident entry costs
    pub used_cost: u64,
    /// Configured capacity in cost units
    pub capacity: u64,
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
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
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

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_rejection(&mut self) {
        self.rejections += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // == Merge ==
    /// Adds every counter of `other` into `self`.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.sets += other.sets;
        self.rejections += other.rejections;
        self.evictions += other.evictions;
        self.expirations += other.expirations;
        self.dropped_events += other.dropped_events;
        self.total_entries += other.total_entries;
        self.used_cost += other.used_cost;
        self.capacity += other.capacity;
    }
}
