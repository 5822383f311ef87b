//! Eviction Coordinator Module
//!
//! Tracks window/main placement for one shard and samples eviction victims.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::Rng;

use crate::cache::entry::{Key, Segment};

/// Random draws allowed per requested sample slot before giving up.
const DRAWS_PER_SLOT: usize = 8;

// == Eviction Coordinator ==
/// Two-segment placement for a single shard.
///
/// - Window: keys in insertion order, capped at `window_capacity` cost
///   units. Each key gets a sequence number; `window_slots` maps the key back
///   to it so removal and promotion skip a scan.
/// - Main: every other resident key, stored in a vector so a uniform random
///   sample is O(sample size). `main_slots` maps a key to its vector index.
///
/// Main has no separate budget: it may use whatever shard capacity the window
/// does not.
#[derive(Debug)]
pub struct EvictionCoordinator {
    /// Window keys by insertion sequence, oldest first
    window: BTreeMap<u64, Key>,
    /// Sequence number of each window key
    window_slots: HashMap<Key, u64>,
    /// Next window sequence number
    next_seq: u64,
    /// Cost currently held by the window
    window_cost: u64,
    /// Maximum cost the window may hold
    window_capacity: u64,
    /// Main keys in arbitrary order
    main: Vec<Key>,
    /// Index of each main key in `main`
    main_slots: HashMap<Key, usize>,
    /// Cost currently held by main
    main_cost: u64,
    /// Random main entries drawn per sample
    sample_size: usize,
    /// Victim sampling source
    rng: StdRng,
}

impl EvictionCoordinator {
    // == Constructor ==
    /// Creates a coordinator for a shard of `capacity` cost units.
    ///
    /// The window receives `floor(capacity * window_ratio)` units, at least one.
    pub fn new(capacity: u64, window_ratio: f64, sample_size: usize, rng: StdRng) -> Self {
        let window_capacity = ((capacity as f64 * window_ratio).floor() as u64)
            .max(1)
            .min(capacity.max(1));

        Self {
            window: BTreeMap::new(),
            window_slots: HashMap::new(),
            next_seq: 0,
            window_cost: 0,
            window_capacity,
            main: Vec::new(),
            main_slots: HashMap::new(),
            main_cost: 0,
            sample_size: sample_size.max(1),
            rng,
        }
    }

    /// Maximum cost the window may hold.
    pub fn window_capacity(&self) -> u64 {
        self.window_capacity
    }

    /// Cost currently held by the window.
    pub fn window_cost(&self) -> u64 {
        self.window_cost
    }

    /// Cost currently held by main.
    pub fn main_cost(&self) -> u64 {
        self.main_cost
    }

    /// Number of keys tracked in each segment, as (window, main).
    pub fn segment_lens(&self) -> (usize, usize) {
        (self.window.len(), self.main.len())
    }

    /// True if an entry of `cost` fits in the window without displacing anything.
    pub fn window_has_room(&self, cost: u64) -> bool {
        self.window_cost + cost <= self.window_capacity
    }

    // == Insert ==
    /// Starts tracking `key` in `segment`.
    pub fn insert(&mut self, key: Key, segment: Segment, cost: u64) {
        match segment {
            Segment::Window => self.push_window(key, cost),
            Segment::Main => self.push_main(key, cost),
        }
    }

    // == Remove ==
    /// Stops tracking `key`.
    pub fn remove(&mut self, key: &[u8], segment: Segment, cost: u64) {
        match segment {
            Segment::Window => {
                if self.take_window(key).is_some() {
                    self.window_cost -= cost;
                }
            }
            Segment::Main => {
                if let Some(slot) = self.main_slots.remove(key) {
                    self.main.swap_remove(slot);
                    if let Some(moved) = self.main.get(slot) {
                        self.main_slots.insert(moved.clone(), slot);
                    }
                    self.main_cost -= cost;
                }
            }
        }
    }

    // == Adjust Cost ==
    /// Records an in-place cost change of a tracked key.
    pub fn adjust_cost(&mut self, segment: Segment, old_cost: u64, new_cost: u64) {
        let total = match segment {
            Segment::Window => &mut self.window_cost,
            Segment::Main => &mut self.main_cost,
        };
        *total = *total - old_cost + new_cost;
    }

    // == Promote ==
    /// Moves a window key into main.
    ///
    /// Returns false if the key was not in the window.
    pub fn promote(&mut self, key: &[u8], cost: u64) -> bool {
        match self.take_window(key) {
            Some(key) => {
                self.window_cost -= cost;
                self.push_main(key, cost);
                true
            }
            None => false,
        }
    }

    // == Sample ==
    /// Draws eviction candidates, skipping any key in `exclude`.
    ///
    /// Returns up to `sample_size` distinct random main keys plus the oldest
    /// window key. An empty result means nothing is left to evict.
    pub fn sample(&mut self, exclude: &[Key]) -> Vec<Key> {
        let mut picked: Vec<Key> = Vec::with_capacity(self.sample_size + 1);

        if self.main.len() <= self.sample_size + exclude.len() {
            picked.extend(
                self.main
                    .iter()
                    .filter(|k| !exclude.contains(k))
                    .take(self.sample_size)
                    .cloned(),
            );
        } else {
            let mut draws = 0;
            while picked.len() < self.sample_size && draws < self.sample_size * DRAWS_PER_SLOT {
                draws += 1;
                let key = &self.main[self.rng.gen_range(0..self.main.len())];
                if !exclude.contains(key) && !picked.contains(key) {
                    picked.push(key.clone());
                }
            }
        }

        if let Some(oldest) = self.window.values().find(|k| !exclude.contains(k)) {
            picked.push(oldest.clone());
        }

        picked
    }

    // == Clear ==
    /// Forgets every tracked key.
    pub fn clear(&mut self) {
        self.window.clear();
        self.window_slots.clear();
        self.window_cost = 0;
        self.main.clear();
        self.main_slots.clear();
        self.main_cost = 0;
    }

    fn push_window(&mut self, key: Key, cost: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.window_slots.insert(key.clone(), seq);
        self.window.insert(seq, key);
        self.window_cost += cost;
    }

    fn take_window(&mut self, key: &[u8]) -> Option<Key> {
        let seq = self.window_slots.remove(key)?;
        self.window.remove(&seq)
    }

    fn push_main(&mut self, key: Key, cost: u64) {
        self.main_slots.insert(key.clone(), self.main.len());
        self.main.push(key);
        self.main_cost += cost;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn key(name: &str) -> Key {
        Key::from(name.as_bytes())
    }

    fn coordinator(capacity: u64, ratio: f64, sample_size: usize) -> EvictionCoordinator {
        EvictionCoordinator::new(capacity, ratio, sample_size, StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_window_capacity_from_ratio() {
        assert_eq!(coordinator(1000, 0.01, 5).window_capacity(), 10);
        assert_eq!(coordinator(2, 0.5, 5).window_capacity(), 1);
        // Never zero, never above the shard
        assert_eq!(coordinator(10, 0.01, 5).window_capacity(), 1);
        assert_eq!(coordinator(1, 0.9, 5).window_capacity(), 1);
    }

    #[test]
    fn test_insert_tracks_costs_per_segment() {
        let mut c = coordinator(100, 0.1, 5);
        c.insert(key("a"), Segment::Window, 4);
        c.insert(key("b"), Segment::Main, 6);

        assert_eq!(c.window_cost(), 4);
        assert_eq!(c.main_cost(), 6);
        assert_eq!(c.segment_lens(), (1, 1));
        assert!(c.window_has_room(6));
        assert!(!c.window_has_room(7));
    }

    #[test]
    fn test_remove_from_main_keeps_slots_consistent() {
        let mut c = coordinator(100, 0.1, 5);
        for name in ["a", "b", "c", "d"] {
            c.insert(key(name), Segment::Main, 1);
        }

        c.remove(b"a", Segment::Main, 1);
        c.remove(b"c", Segment::Main, 1);

        assert_eq!(c.segment_lens(), (0, 2));
        assert_eq!(c.main_cost(), 2);
        let mut rest: Vec<Key> = c.sample(&[]);
        rest.sort();
        assert_eq!(rest, vec![key("b"), key("d")]);

        // Removing an unknown key is a no-op
        c.remove(b"zzz", Segment::Main, 1);
        assert_eq!(c.main_cost(), 2);
    }

    #[test]
    fn test_sample_includes_oldest_window_key() {
        let mut c = coordinator(100, 0.1, 5);
        c.insert(key("w1"), Segment::Window, 1);
        c.insert(key("w2"), Segment::Window, 1);
        c.insert(key("m1"), Segment::Main, 1);

        let sample = c.sample(&[]);
        assert!(sample.contains(&key("w1")));
        assert!(!sample.contains(&key("w2")));
        assert!(sample.contains(&key("m1")));

        let sample = c.sample(&[key("w1")]);
        assert!(sample.contains(&key("w2")));
    }

    #[test]
    fn test_window_removal_keeps_insertion_order() {
        let mut c = coordinator(1000, 0.5, 5);
        for i in 0..200 {
            c.insert(key(&format!("w{}", i)), Segment::Window, 1);
        }

        c.remove(b"w0", Segment::Window, 1);
        c.remove(b"w100", Segment::Window, 1);
        assert!(c.promote(b"w1", 1));
        assert!(!c.promote(b"w100", 1));

        assert_eq!(c.window_cost(), 197);
        assert_eq!(c.segment_lens(), (197, 1));
        let sample = c.sample(&[key("w1")]);
        assert!(sample.contains(&key("w2")));
        assert!(!sample.contains(&key("w3")));

        // A re-inserted key goes to the back
        c.remove(b"w2", Segment::Window, 1);
        c.insert(key("w2"), Segment::Window, 1);
        let sample = c.sample(&[key("w1")]);
        assert!(sample.contains(&key("w3")));
    }

    #[test]
    fn test_sample_is_bounded_and_distinct() {
        let mut c = coordinator(1000, 0.01, 5);
        for i in 0..100 {
            c.insert(key(&format!("k{}", i)), Segment::Main, 1);
        }

        let sample = c.sample(&[]);
        assert!(!sample.is_empty());
        assert!(sample.len() <= 5);
        for (i, k) in sample.iter().enumerate() {
            assert!(!sample[i + 1..].contains(k));
        }
    }

    #[test]
    fn test_sample_respects_exclusions() {
        let mut c = coordinator(100, 0.1, 5);
        c.insert(key("a"), Segment::Main, 1);
        c.insert(key("b"), Segment::Main, 1);

        assert_eq!(c.sample(&[key("a")]), vec![key("b")]);
        assert!(c.sample(&[key("a"), key("b")]).is_empty());
    }

    #[test]
    fn test_sampling_is_deterministic_for_a_seed() {
        let build = || {
            let mut c = coordinator(1000, 0.01, 3);
            for i in 0..50 {
                c.insert(key(&format!("k{}", i)), Segment::Main, 1);
            }
            c
        };

        let (mut first, mut second) = (build(), build());
        assert_eq!(first.sample(&[]), second.sample(&[]));
    }

    #[test]
    fn test_promote_moves_window_key_to_main() {
        let mut c = coordinator(100, 0.1, 5);
        c.insert(key("a"), Segment::Window, 3);

        assert!(c.promote(b"a", 3));
        assert_eq!(c.window_cost(), 0);
        assert_eq!(c.main_cost(), 3);
        assert_eq!(c.segment_lens(), (0, 1));

        assert!(!c.promote(b"a", 3));
    }

    #[test]
    fn test_adjust_cost_and_clear() {
        let mut c = coordinator(100, 0.1, 5);
        c.insert(key("a"), Segment::Window, 3);
        c.adjust_cost(Segment::Window, 3, 8);
        assert_eq!(c.window_cost(), 8);

        c.clear();
        assert_eq!(c.window_cost(), 0);
        assert_eq!(c.main_cost(), 0);
        assert_eq!(c.segment_lens(), (0, 0));
        assert!(c.sample(&[]).is_empty());
    }
}
