//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.
//!
//! Keys and values travel as JSON strings, so the HTTP API only carries
//! UTF-8 data. The engine itself stores arbitrary bytes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: The value to store, stored as its UTF-8 bytes
/// - `cost`: Optional capacity units; absent or 0 derives it from the sizes
/// - `ttl`: Optional TTL in seconds (uses default if not specified, 0 = already expired)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
    /// Optional cost in capacity units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u64>,
    /// Optional TTL in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Creates a request with no explicit cost or TTL.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            cost: None,
            ttl: None,
        }
    }

    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        None
    }

    /// TTL as a duration.
    pub fn ttl_duration(&self) -> Option<Duration> {
        self.ttl.map(Duration::from_secs)
    }
}
