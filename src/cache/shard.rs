//! Shard Store Module
//!
//! One capacity-bounded partition of the key space: entry storage, window/main
//! placement, TinyLFU admission and lazy TTL expiry.

use std::collections::HashMap;
use std::time::Instant;

use crate::cache::admission::{AdmissionDecision, AdmissionPolicy, Victim};
use crate::cache::entry::{expired_at, CacheEntry, Key, Segment};
use crate::cache::eviction::EvictionCoordinator;
use crate::cache::stats::CacheStats;
use crate::error::{CacheError, Result};

/// Observed frequency at which a window entry moves to main.
const PROMOTION_FREQUENCY: u8 = 2;

// == Removal ==
/// Why an entry left the shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Explicit delete
    Deleted,
    /// Displaced to make room
    Evicted,
    /// TTL elapsed
    Expired,
}

/// Record of one removed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Hash of the removed key
    pub hash: u64,
    /// Cost released
    pub cost: u64,
    /// Reason for removal
    pub cause: RemovalCause,
}

// == Outcomes ==
/// Result of a shard lookup.
#[derive(Debug, Default)]
pub struct Lookup {
    /// Value, if present and live
    pub value: Option<Vec<u8>>,
    /// Set when the lookup found and dropped an expired entry
    pub expired: Option<Removal>,
}

/// Result of a shard write.
#[derive(Debug, Default)]
pub struct SetOutcome {
    /// Whether the entry is now resident
    pub admitted: bool,
    /// Entries removed to make room (or the stale entry of a zero-TTL write)
    pub removed: Vec<Removal>,
}

// == Shard ==
/// Lock-free core of a shard; the engine wraps each one in a mutex.
///
/// Invariant: `used` equals the summed cost of `entries` and never exceeds
/// `capacity` when a method returns.
#[derive(Debug)]
pub struct Shard {
    /// Resident entries
    entries: HashMap<Key, CacheEntry>,
    /// Window/main placement and victim sampling
    coordinator: EvictionCoordinator,
    /// Frequency comparison for new keys
    policy: AdmissionPolicy,
    /// Cost budget
    capacity: u64,
    /// Summed cost of resident entries
    used: u64,
    /// Local counters
    stats: CacheStats,
}

impl Shard {
    // == Constructor ==
    /// Creates an empty shard.
    pub fn new(capacity: u64, coordinator: EvictionCoordinator, policy: AdmissionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            coordinator,
            policy,
            capacity,
            used: 0,
            stats: CacheStats::new(),
        }
    }

    // == Get ==
    /// Looks up `key` at time `now`.
    ///
    /// An expired entry is removed and reported absent. A live window entry
    /// whose observed frequency (sketch estimate plus this access) reaches 2
    /// is promoted to main.
    pub fn get(&mut self, key: &[u8], now: Instant) -> Lookup {
        let Some(entry) = self.entries.get(key) else {
            self.stats.record_miss();
            return Lookup::default();
        };

        if entry.is_expired(now) {
            self.stats.record_miss();
            return Lookup {
                value: None,
                expired: self.remove_entry(key, RemovalCause::Expired),
            };
        }

        let value = entry.value.clone();
        let (hash, cost, segment) = (entry.hash, entry.cost, entry.segment);
        self.stats.record_hit();

        if segment == Segment::Window && self.seen_before(hash) {
            self.promote(key, cost);
        }

        Lookup {
            value: Some(value),
            expired: None,
        }
    }

    // == Set ==
    /// Inserts or replaces `key`.
    ///
    /// - Cost above the shard capacity fails with `ValueTooLarge`; nothing changes.
    /// - An expiry at or before `now` drops any existing entry and stores nothing.
    /// - A live existing entry is replaced in place, with the same promotion
    ///   rule as `get`; if the shard overflows, other entries are evicted,
    ///   lowest sampled frequency first.
    /// - A new key goes to the window if it has room, else to main if the shard
    ///   has room, else through the admission policy. Rejection leaves the
    ///   shard untouched.
    pub fn set(
        &mut self,
        key: &[u8],
        hash: u64,
        value: Vec<u8>,
        cost: u64,
        expires_at: Option<Instant>,
        now: Instant,
    ) -> Result<SetOutcome> {
        if cost > self.capacity {
            return Err(CacheError::ValueTooLarge {
                cost,
                capacity: self.capacity,
            });
        }

        let mut removed = Vec::new();

        if expired_at(expires_at, now) {
            removed.extend(self.remove_entry(key, RemovalCause::Expired));
            self.stats.record_rejection();
            return Ok(SetOutcome {
                admitted: false,
                removed,
            });
        }

        let existing = self
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(now), entry.segment, entry.cost));
        match existing {
            Some((true, _, _)) => {
                removed.extend(self.remove_entry(key, RemovalCause::Expired));
            }
            Some((false, segment, old_cost)) => {
                // An overwrite is an access too
                if segment == Segment::Window && self.seen_before(hash) {
                    self.promote(key, old_cost);
                }
                removed.extend(self.replace(key, value, cost, expires_at));
                self.stats.record_set();
                return Ok(SetOutcome {
                    admitted: true,
                    removed,
                });
            }
            None => {}
        }

        let needed = self.used.saturating_add(cost).saturating_sub(self.capacity);
        let decision = {
            let entries = &self.entries;
            let coordinator = &mut self.coordinator;
            self.policy.decide(hash, needed, |chosen| {
                victims_for(entries, coordinator.sample(chosen))
            })
        };

        match decision {
            AdmissionDecision::Reject => {
                self.stats.record_rejection();
                return Ok(SetOutcome {
                    admitted: false,
                    removed,
                });
            }
            AdmissionDecision::Admit => {}
            AdmissionDecision::AdmitWithEviction(victims) => {
                for victim in victims {
                    removed.extend(self.remove_entry(&victim, RemovalCause::Evicted));
                }
            }
        }

        let segment = if self.coordinator.window_has_room(cost) {
            Segment::Window
        } else {
            Segment::Main
        };
        let key = Key::from(key);
        self.coordinator.insert(key.clone(), segment, cost);
        self.entries
            .insert(key, CacheEntry::new(value, cost, hash, expires_at, segment));
        self.used += cost;
        self.stats.record_set();

        Ok(SetOutcome {
            admitted: true,
            removed,
        })
    }

    // == Delete ==
    /// Removes `key`.
    ///
    /// Returns a `Deleted` removal for a live entry. An expired entry is still
    /// dropped but reported with cause `Expired`.
    pub fn delete(&mut self, key: &[u8], now: Instant) -> Option<Removal> {
        let cause = match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => RemovalCause::Expired,
            Some(_) => RemovalCause::Deleted,
            None => return None,
        };
        self.remove_entry(key, cause)
    }

    // == Clear ==
    /// Removes every entry. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.coordinator.clear();
        self.used = 0;
        count
    }

    // == Remove Expired ==
    /// Drops every entry expired at `now`.
    pub fn remove_expired(&mut self, now: Instant) -> Vec<Removal> {
        let expired: Vec<Key> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .iter()
            .filter_map(|key| self.remove_entry(key, RemovalCause::Expired))
            .collect()
    }

    /// Number of resident entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summed cost of resident entries.
    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Segment of a resident key.
    pub fn segment_of(&self, key: &[u8]) -> Option<Segment> {
        self.entries.get(key).map(|entry| entry.segment)
    }

    /// Snapshot of local counters plus occupancy.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.used_cost = self.used;
        stats.capacity = self.capacity;
        stats
    }

    /// Replaces a live entry in place, evicting others while the shard overflows.
    fn replace(
        &mut self,
        key: &[u8],
        value: Vec<u8>,
        cost: u64,
        expires_at: Option<Instant>,
    ) -> Vec<Removal> {
        let Some((stored_key, entry)) = self.entries.get_key_value(key) else {
            return Vec::new();
        };
        let stored_key = stored_key.clone();
        let (old_cost, segment) = (entry.cost, entry.segment);

        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
            entry.cost = cost;
            entry.expires_at = expires_at;
        }
        self.coordinator.adjust_cost(segment, old_cost, cost);
        self.used = self.used - old_cost + cost;

        // A grown window entry that no longer fits the window moves to main
        if segment == Segment::Window
            && self.coordinator.window_cost() > self.coordinator.window_capacity()
        {
            self.promote(key, cost);
        }

        let mut removed = Vec::new();
        let exclude = [stored_key];
        while self.used > self.capacity {
            let sampled = self.coordinator.sample(&exclude);
            let victims = victims_for(&self.entries, sampled);
            let Some(victim) = self.policy.weakest(victims) else {
                break;
            };
            removed.extend(self.remove_entry(&victim.key, RemovalCause::Evicted));
        }
        removed
    }

    /// True if the access in progress is at least the second one observed.
    fn seen_before(&self, hash: u64) -> bool {
        self.policy.estimate(hash).saturating_add(1) >= PROMOTION_FREQUENCY
    }

    fn promote(&mut self, key: &[u8], cost: u64) {
        if self.coordinator.promote(key, cost) {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.segment = Segment::Main;
            }
        }
    }

    fn remove_entry(&mut self, key: &[u8], cause: RemovalCause) -> Option<Removal> {
        let entry = self.entries.remove(key)?;
        self.coordinator.remove(key, entry.segment, entry.cost);
        self.used -= entry.cost;

        match cause {
            RemovalCause::Evicted => self.stats.record_eviction(),
            RemovalCause::Expired => self.stats.record_expiration(),
            RemovalCause::Deleted => {}
        }

        Some(Removal {
            hash: entry.hash,
            cost: entry.cost,
            cause,
        })
    }
}

/// Resolves sampled keys to victims, skipping any that are gone.
fn victims_for(entries: &HashMap<Key, CacheEntry>, keys: Vec<Key>) -> Vec<Victim> {
    keys.into_iter()
        .filter_map(|key| {
            let entry = entries.get(&key)?;
            Some(Victim {
                hash: entry.hash,
                cost: entry.cost,
                key,
            })
        })
        .collect()
}
