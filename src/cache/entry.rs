//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with cost and expiry metadata.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, immutable key bytes.
///
/// The shard map and the eviction coordinator both hold the key; sharing
/// avoids a second allocation per entry.
pub type Key = Arc<[u8]>;

// == Segment ==
/// Which part of the shard an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Small FIFO area that takes new entries without a frequency check
    Window,
    /// Frequency-vetted area, sampled for victims
    Main,
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: Vec<u8>,
    /// Capacity units consumed by this entry
    pub cost: u64,
    /// Hash of the key, used for sketch lookups when this entry is a victim
    pub hash: u64,
    /// Absolute expiry, None = no expiration
    pub expires_at: Option<Instant>,
    /// Current placement
    pub segment: Segment,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry.
    pub fn new(
        value: Vec<u8>,
        cost: u64,
        hash: u64,
        expires_at: Option<Instant>,
        segment: Segment,
    ) -> Self {
        Self {
            value,
            cost,
            hash,
            expires_at,
            segment,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry whose expiry equals `now` is already expired, so a zero TTL
    /// never produces an observable entry.
    pub fn is_expired(&self, now: Instant) -> bool {
        expired_at(self.expires_at, now)
    }
}

// == Utility Functions ==
/// Converts a relative TTL into an absolute expiry.
///
/// A TTL too large to represent is treated as no expiry.
pub fn expiry_from_ttl(ttl: Option<Duration>, now: Instant) -> Option<Instant> {
    ttl.and_then(|ttl| now.checked_add(ttl))
}

/// True when `expires_at` is set and not after `now`.
pub fn expired_at(expires_at: Option<Instant>, now: Instant) -> bool {
    matches!(expires_at, Some(expires) if now >= expires)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(expires_at: Option<Instant>) -> CacheEntry {
        CacheEntry::new(b"value".to_vec(), 5, 7, expires_at, Segment::Window)
    }

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let now = Instant::now();
        let entry = entry(None);

        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::from_secs(3600)));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let now = Instant::now();
        let entry = entry(expiry_from_ttl(Some(Duration::from_secs(10)), now));

        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + Duration::from_secs(9)));
        assert!(entry.is_expired(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let now = Instant::now();
        let entry = entry(expiry_from_ttl(Some(Duration::ZERO), now));

        assert!(entry.is_expired(now));
    }

    #[test]
    fn test_unrepresentable_ttl_means_no_expiry() {
        let now = Instant::now();
        assert_eq!(expiry_from_ttl(Some(Duration::MAX), now), None);
        assert_eq!(expiry_from_ttl(None, now), None);
    }

    #[test]
    fn test_expired_at_without_expiry() {
        assert!(!expired_at(None, Instant::now()));
    }
}
