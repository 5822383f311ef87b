//! Cache Engine Module
//!
//! Routes operations to shards by key hash and feeds access events to the
//! frequency sketch in the background.
//!
//! ```text
//!  get/set/delete ──▶ hash(key) % N ──▶ Mutex<Shard i> ──▶ result
//!                                            │
//!                          (after unlock)    ▼
//!                                     EventQueue (bounded, drop-oldest)
//!                                            │
//!                                            ▼
//!                              sketch-worker ──▶ FrequencySketch
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::RandomState;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::cache::admission::AdmissionPolicy;
use crate::cache::entry::expiry_from_ttl;
use crate::cache::events::{Event, EventQueue, SketchWorker};
use crate::cache::eviction::EvictionCoordinator;
use crate::cache::shard::{Removal, RemovalCause, Shard};
use crate::cache::sketch::FrequencySketch;
use crate::cache::stats::CacheStats;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Fixed hasher seeds so that shard routing is reproducible across runs.
const HASH_SEEDS: [u64; 4] = [
    0x243F_6A88_85A3_08D3,
    0x1319_8A2E_0370_7344,
    0xA409_3822_299F_31D0,
    0x082E_FA98_EC4E_6C89,
];

// == Cache Engine ==
/// Sharded, capacity-bounded key/value cache with TinyLFU admission.
///
/// Safe to share between threads (`Arc<CacheEngine>`). Every operation locks
/// exactly one shard for its duration; operations on different shards never
/// contend.
#[derive(Debug)]
pub struct CacheEngine {
    shards: Box<[Mutex<Shard>]>,
    hasher: RandomState,
    sketch: Arc<FrequencySketch>,
    events: EventQueue,
    worker: SketchWorker,
    config: CacheConfig,
}

impl CacheEngine {
    // == Constructor ==
    /// Builds the shards, sketch and background worker from `config`.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let sketch = Arc::new(FrequencySketch::new(
            config.sketch_counters,
            config.sketch_reset_multiplier,
        ));
        let policy = AdmissionPolicy::new(sketch.clone());

        let shards: Box<[Mutex<Shard>]> = (0..config.shard_count)
            .map(|index| {
                let capacity = config.shard_capacity(index);
                let rng = match config.sample_seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
                    None => StdRng::from_entropy(),
                };
                let coordinator = EvictionCoordinator::new(
                    capacity,
                    config.window_ratio,
                    config.eviction_sample_size,
                    rng,
                );
                Mutex::new(Shard::new(capacity, coordinator, policy.clone()))
            })
            .collect();

        let (events, receiver) = EventQueue::bounded(config.event_queue_capacity);
        let worker = SketchWorker::spawn(sketch.clone(), receiver)
            .map_err(|e| CacheError::Internal(format!("failed to start sketch worker: {}", e)))?;

        info!(
            total_capacity = config.total_capacity,
            shards = config.shard_count,
            window_ratio = config.window_ratio,
            sample_size = config.eviction_sample_size,
            "cache engine initialized"
        );

        Ok(Self {
            shards,
            hasher: RandomState::with_seeds(HASH_SEEDS[0], HASH_SEEDS[1], HASH_SEEDS[2], HASH_SEEDS[3]),
            sketch,
            events,
            worker,
            config,
        })
    }

    // == Get ==
    /// Returns the value stored under `key`, or None if absent or expired.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let hash = self.hash(key);

        let lookup = self.shard(hash).lock().get(key, Instant::now());

        self.events.push(Event::Access(hash));
        if let Some(removal) = lookup.expired {
            self.events.push(Event::Removal(removal));
        }
        Ok(lookup.value)
    }

    // == Set ==
    /// Stores `value` under `key`.
    ///
    /// # Arguments
    /// * `cost` - Capacity units; None or 0 derives it as `key.len() + value.len()`
    /// * `ttl` - Time to live; None falls back to the configured default
    ///
    /// Returns `Ok(false)` when the admission policy turns a new key away or
    /// the TTL is zero. Fails with `ValueTooLarge` if the cost exceeds the
    /// capacity of the key's shard, leaving the cache unchanged.
    pub fn set(
        &self,
        key: &[u8],
        value: Vec<u8>,
        cost: Option<u64>,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        validate_key(key)?;
        let cost = cost
            .filter(|c| *c > 0)
            .unwrap_or((key.len() + value.len()) as u64);
        let hash = self.hash(key);
        let now = Instant::now();
        let expires_at = expiry_from_ttl(ttl.or(self.config.default_ttl), now);

        let outcome = self
            .shard(hash)
            .lock()
            .set(key, hash, value, cost, expires_at, now)?;

        self.events.push(Event::Access(hash));
        self.publish_removals(&outcome.removed);

        if !outcome.admitted {
            debug!(hash, cost, "write not admitted");
        }
        let evicted = outcome
            .removed
            .iter()
            .filter(|r| r.cause == RemovalCause::Evicted)
            .count();
        if evicted > 0 {
            debug!(hash, cost, evicted, "evicted entries to admit write");
        }

        Ok(outcome.admitted)
    }

    // == Delete ==
    /// Removes `key`. Returns false if it was absent or already expired.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        validate_key(key)?;
        let hash = self.hash(key);

        let removal = self.shard(hash).lock().delete(key, Instant::now());

        match removal {
            Some(removal) => {
                self.events.push(Event::Removal(removal));
                Ok(removal.cause == RemovalCause::Deleted)
            }
            None => Ok(false),
        }
    }

    // == Clear ==
    /// Empties every shard. Each shard is cleared atomically under its lock.
    pub fn clear(&self) {
        let removed: usize = self.shards.iter().map(|shard| shard.lock().clear()).sum();
        info!(removed, "cache cleared");
    }

    // == Cleanup Expired ==
    /// Removes every expired entry. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut count = 0;
        for shard in self.shards.iter() {
            let removed = shard.lock().remove_expired(now);
            count += removed.len();
            self.publish_removals(&removed);
        }
        count
    }

    // == Stats ==
    /// Sums shard statistics into one snapshot.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::new();
        for shard in self.shards.iter() {
            stats.merge(&shard.lock().stats());
        }
        stats.dropped_events = self.events.dropped();
        stats
    }

    /// Number of resident entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Capacity of shard `index`, in cost units.
    pub fn shard_capacity(&self, index: usize) -> Option<u64> {
        (index < self.shards.len()).then(|| self.config.shard_capacity(index))
    }

    /// Capacity and current usage of shard `index`, as (capacity, used).
    pub fn shard_usage(&self, index: usize) -> Option<(u64, u64)> {
        self.shards.get(index).map(|shard| {
            let shard = shard.lock();
            (shard.capacity(), shard.used())
        })
    }

    /// Index of the shard `key` maps to.
    pub fn shard_index(&self, key: &[u8]) -> usize {
        (self.hash(key) % self.shards.len() as u64) as usize
    }

    /// Current frequency estimate of `key`.
    pub fn frequency(&self, key: &[u8]) -> u8 {
        self.sketch.estimate(self.hash(key))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Wait ==
    /// Blocks until every event published so far has reached the sketch.
    pub fn wait(&self) {
        self.worker.wait();
    }

    // == Shutdown ==
    /// Stops the sketch worker. Further operations still work, but no longer
    /// update frequency estimates or count dropped events.
    pub fn shutdown(&self) {
        self.events.close();
        if self.worker.shutdown().is_some() {
            info!(dropped_events = self.events.dropped(), "cache engine shut down");
        }
    }

    fn hash(&self, key: &[u8]) -> u64 {
        self.hasher.hash_one(key)
    }

    fn shard(&self, hash: u64) -> &Mutex<Shard> {
        &self.shards[(hash % self.shards.len() as u64) as usize]
    }

    fn publish_removals(&self, removed: &[Removal]) {
        for removal in removed {
            self.events.push(Event::Removal(*removal));
        }
    }
}

impl Drop for CacheEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    Ok(())
}
