//! Frequency Sketch Module
//!
//! Approximate, memory-bounded access frequency estimation for key hashes.

use std::sync::atomic::{AtomicU64, Ordering};

// == Constants ==
/// Multiplicative seeds, one per hash depth.
const SEEDS: [u64; 4] = [
    0xABC9_DEFD_ABCD_EF01,
    0xFEDC_BA98_7654_3210,
    0x0F1E_2D3C_4B5A_6978,
    0x9876_5432_10AB_CDEF,
];

/// Clears the high bit of every nibble so halving never carries across counters.
const RESET_MASK: u64 = 0x7777_7777_7777_7777;

/// Largest value a 4-bit counter can hold.
pub const MAX_FREQUENCY: u8 = 15;

/// Smallest table width, in 64-bit words.
const MIN_WIDTH: usize = 8;

// == Frequency Sketch ==
/// Count-min sketch of 4-bit saturating counters.
///
/// Each `u64` word packs 16 counters. A key hash maps to one counter per depth
/// (four depths) and the estimate is the minimum of those counters. Once the
/// number of increments since the last reset exceeds
/// `width * reset_multiplier`, every counter is halved so that stale history
/// fades out.
///
/// Words are atomics so that shards can read estimates while the sketch
/// worker is updating them. Collisions only ever over-estimate.
#[derive(Debug)]
pub struct FrequencySketch {
    /// Counter words, length is a power of two
    table: Box<[AtomicU64]>,
    /// Increments since the last reset
    additions: AtomicU64,
    /// Increment count that triggers a reset
    reset_threshold: u64,
}

impl FrequencySketch {
    // == Constructor ==
    /// Creates a sketch with roughly `capacity` counter words.
    ///
    /// # Arguments
    /// * `capacity` - Requested width, rounded up to a power of two (minimum 8)
    /// * `reset_multiplier` - Resets happen every `width * reset_multiplier` increments
    pub fn new(capacity: usize, reset_multiplier: u64) -> Self {
        let width = capacity.max(MIN_WIDTH).next_power_of_two();
        let table = (0..width).map(|_| AtomicU64::new(0)).collect();

        Self {
            table,
            additions: AtomicU64::new(0),
            reset_threshold: (width as u64).saturating_mul(reset_multiplier.max(1)),
        }
    }

    /// Number of counter words in the table.
    pub fn width(&self) -> usize {
        self.table.len()
    }

    /// Increment count that triggers an automatic reset.
    pub fn reset_threshold(&self) -> u64 {
        self.reset_threshold
    }

    /// Increments recorded since the last reset.
    pub fn additions(&self) -> u64 {
        self.additions.load(Ordering::Relaxed)
    }

    // == Estimate ==
    /// Returns the approximate access frequency of `hash`, in `[0, 15]`.
    pub fn estimate(&self, hash: u64) -> u8 {
        let mut freq = MAX_FREQUENCY as u64;
        for depth in 0..SEEDS.len() {
            let (index, offset) = self.slot(hash, depth);
            let count = (self.table[index].load(Ordering::Relaxed) >> offset) & 0xF;
            freq = freq.min(count);
        }
        freq as u8
    }

    // == Increment ==
    /// Records one access of `hash`.
    ///
    /// Saturated counters stay at 15. Triggers [`reset`](Self::reset) once
    /// the additions since the last reset exceed the threshold.
    pub fn increment(&self, hash: u64) {
        let mut added = false;
        for depth in 0..SEEDS.len() {
            let (index, offset) = self.slot(hash, depth);
            let bumped = self.table[index]
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |word| {
                    if (word >> offset) & 0xF < MAX_FREQUENCY as u64 {
                        Some(word + (1u64 << offset))
                    } else {
                        None
                    }
                })
                .is_ok();
            added |= bumped;
        }

        if added {
            let additions = self.additions.fetch_add(1, Ordering::Relaxed) + 1;
            if additions > self.reset_threshold {
                self.reset();
            }
        }
    }

    // == Reset ==
    /// Halves every counter and starts a new aging period.
    pub fn reset(&self) {
        for word in self.table.iter() {
            let _ = word.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |w| {
                Some((w >> 1) & RESET_MASK)
            });
        }
        self.additions.store(0, Ordering::Relaxed);
    }

    // == Clear ==
    /// Zeroes every counter.
    pub fn clear(&self) {
        for word in self.table.iter() {
            word.store(0, Ordering::Relaxed);
        }
        self.additions.store(0, Ordering::Relaxed);
    }

    /// Maps `hash` at `depth` to a (word index, nibble bit offset) pair.
    #[inline]
    fn slot(&self, hash: u64, depth: usize) -> (usize, u32) {
        let mixed = hash.wrapping_mul(SEEDS[depth]);
        let index = ((mixed >> 32) as usize) & (self.table.len() - 1);
        let offset = (((mixed >> 28) & 0xF) as u32) << 2;
        (index, offset)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_hash_estimates_zero() {
        let sketch = FrequencySketch::new(64, 10);
        assert_eq!(sketch.estimate(0xDEAD_BEEF), 0);
    }

    #[test]
    fn test_width_rounds_to_power_of_two() {
        assert_eq!(FrequencySketch::new(100, 10).width(), 128);
        assert_eq!(FrequencySketch::new(1, 10).width(), MIN_WIDTH);
        assert_eq!(FrequencySketch::new(64, 10).reset_threshold(), 640);
    }

    #[test]
    fn test_increments_accumulate() {
        let sketch = FrequencySketch::new(64, 10);
        for _ in 0..7 {
            sketch.increment(99);
        }
        assert_eq!(sketch.estimate(99), 7);
    }

    #[test]
    fn test_counters_saturate() {
        let sketch = FrequencySketch::new(64, 10);
        for _ in 0..40 {
            sketch.increment(1);
        }
        assert_eq!(sketch.estimate(1), MAX_FREQUENCY);
    }

    #[test]
    fn test_estimates_never_undercount() {
        let sketch = FrequencySketch::new(128, 10);
        for _ in 0..5 {
            sketch.increment(1);
        }
        for _ in 0..3 {
            sketch.increment(2);
        }
        assert!(sketch.estimate(1) >= 5);
        assert!(sketch.estimate(2) >= 3);
    }

    #[test]
    fn test_reset_halves_counters() {
        let sketch = FrequencySketch::new(32, 10);
        for _ in 0..10 {
            sketch.increment(7);
        }
        let before = sketch.estimate(7);
        sketch.reset();
        assert_eq!(sketch.estimate(7), before / 2);
        assert_eq!(sketch.additions(), 0);
    }

    #[test]
    fn test_automatic_reset_after_threshold() {
        // width 8, multiplier 10: reset after 80 increments
        let sketch = FrequencySketch::new(8, 10);
        for _ in 0..10 {
            sketch.increment(42);
        }
        assert_eq!(sketch.estimate(42), 10);

        let mut reset_seen = false;
        for key in 1000..1200u64 {
            let before = sketch.additions();
            sketch.increment(key.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            if sketch.additions() < before {
                reset_seen = true;
                break;
            }
        }

        assert!(reset_seen, "sketch should have aged");
        assert!(sketch.estimate(42) < 10);
        assert_eq!(sketch.additions(), 0);
    }

    #[test]
    fn test_every_aging_period_has_full_length() {
        // width 64, multiplier 2: threshold 128, so every 129th increment resets
        let sketch = FrequencySketch::new(64, 2);
        let threshold = sketch.reset_threshold();

        let mut periods = Vec::new();
        let mut since_reset = 0u64;
        for key in 0..1000u64 {
            let before = sketch.additions();
            sketch.increment(key.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            since_reset += 1;
            if sketch.additions() < before {
                periods.push(since_reset);
                since_reset = 0;
            }
        }

        assert!(periods.len() >= 3);
        assert!(periods.iter().all(|p| *p == threshold + 1), "{:?}", periods);
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let sketch = FrequencySketch::new(16, 10);
        sketch.increment(5);
        sketch.increment(5);
        sketch.clear();
        assert_eq!(sketch.estimate(5), 0);
        assert_eq!(sketch.additions(), 0);
    }
}
