//! Configuration Module
//!
//! Handles loading and validating server and cache engine configuration.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

// == Config Error ==
/// Reasons a configuration is refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("total capacity must be greater than zero")]
    ZeroCapacity,

    #[error("total capacity {0} exceeds the maximum of {max}", max = MAX_TOTAL_CAPACITY)]
    CapacityTooLarge(u64),

    #[error("shard count must be greater than zero")]
    ZeroShards,

    #[error("total capacity {capacity} is smaller than shard count {shards}")]
    CapacityBelowShards { capacity: u64, shards: usize },

    #[error("window ratio must be strictly between 0 and 1, got {0}")]
    WindowRatio(f64),

    #[error("eviction sample size must be greater than zero")]
    ZeroSampleSize,

    #[error("event queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("sketch counters must be greater than zero")]
    ZeroSketchCounters,

    #[error("sketch reset multiplier must be greater than zero")]
    ZeroResetMultiplier,

    #[error("invalid listen address: {0}")]
    ListenAddress(String),
}

// == Cache Config ==
/// Cache engine parameters, immutable once the engine is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Capacity of the whole cache, in cost units
    pub total_capacity: u64,
    /// Number of independently locked shards
    pub shard_count: usize,
    /// Fraction of each shard reserved for the admission window
    pub window_ratio: f64,
    /// TTL applied to writes that carry none, None = no expiry
    pub default_ttl: Option<Duration>,
    /// Random main entries compared per admission round
    pub eviction_sample_size: usize,
    /// Bound of the frequency event queue
    pub event_queue_capacity: usize,
    /// Width of the frequency sketch, in 64-bit counter words
    pub sketch_counters: usize,
    /// Sketch halves itself every `sketch_counters * multiplier` increments
    pub sketch_reset_multiplier: u64,
    /// Seed for victim sampling; None draws from OS entropy
    pub sample_seed: Option<u64>,
}

impl CacheConfig {
    /// Default config with the given capacity and shard count.
    pub fn with_capacity(total_capacity: u64, shard_count: usize) -> Self {
        Self {
            total_capacity,
            shard_count,
            ..Self::default()
        }
    }

    // == Validate ==
    /// Checks every field, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.total_capacity > MAX_TOTAL_CAPACITY {
            return Err(ConfigError::CapacityTooLarge(self.total_capacity));
        }
        if self.shard_count == 0 {
            return Err(ConfigError::ZeroShards);
        }
        if self.total_capacity < self.shard_count as u64 {
            return Err(ConfigError::CapacityBelowShards {
                capacity: self.total_capacity,
                shards: self.shard_count,
            });
        }
        if !(self.window_ratio > 0.0 && self.window_ratio < 1.0) {
            return Err(ConfigError::WindowRatio(self.window_ratio));
        }
        if self.eviction_sample_size == 0 {
            return Err(ConfigError::ZeroSampleSize);
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.sketch_counters == 0 {
            return Err(ConfigError::ZeroSketchCounters);
        }
        if self.sketch_reset_multiplier == 0 {
            return Err(ConfigError::ZeroResetMultiplier);
        }
        Ok(())
    }

    /// Capacity of shard `index`.
    ///
    /// The remainder of `total_capacity / shard_count` goes one unit each to
    /// the lowest-numbered shards.
    pub fn shard_capacity(&self, index: usize) -> u64 {
        let shards = self.shard_count as u64;
        let base = self.total_capacity / shards;
        let extra = u64::from((index as u64) < self.total_capacity % shards);
        base + extra
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            total_capacity: 1 << 20,
            shard_count: 16,
            window_ratio: 0.01,
            default_ttl: None,
            eviction_sample_size: 5,
            event_queue_capacity: 4096,
            sketch_counters: 1 << 16,
            sketch_reset_multiplier: 10,
            sample_seed: None,
        }
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub listen_address: String,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Cache engine parameters
    pub cache: CacheConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LISTEN_ADDRESS` - Bind address (default: 0.0.0.0:5050)
    /// - `TOTAL_CAPACITY` - Cache capacity in cost units (default: 1048576)
    /// - `SHARD_COUNT` - Number of shards (default: 16)
    /// - `WINDOW_RATIO` - Admission window fraction (default: 0.01)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 = none (default: 0)
    /// - `EVICTION_SAMPLE_SIZE` - Victims sampled per round (default: 5)
    /// - `EVENT_QUEUE_CAPACITY` - Frequency event queue bound (default: 4096)
    /// - `SKETCH_COUNTERS` - Sketch width in words (default: 65536)
    /// - `SKETCH_RESET_MULTIPLIER` - Sketch aging period multiplier (default: 10)
    /// - `SAMPLE_SEED` - Fixed sampling seed (default: random)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    ///
    /// Unparsable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();
        let default_ttl: u64 = env_or("DEFAULT_TTL", 0);

        Self {
            listen_address: env::var("LISTEN_ADDRESS").unwrap_or_else(|_| DEFAULT_LISTEN_ADDRESS.into()),
            cleanup_interval: env_or("CLEANUP_INTERVAL", 1),
            cache: CacheConfig {
                total_capacity: env_or("TOTAL_CAPACITY", defaults.total_capacity),
                shard_count: env_or("SHARD_COUNT", defaults.shard_count),
                window_ratio: env_or("WINDOW_RATIO", defaults.window_ratio),
                default_ttl: (default_ttl > 0).then(|| Duration::from_secs(default_ttl)),
                eviction_sample_size: env_or("EVICTION_SAMPLE_SIZE", defaults.eviction_sample_size),
                event_queue_capacity: env_or("EVENT_QUEUE_CAPACITY", defaults.event_queue_capacity),
                sketch_counters: env_or("SKETCH_COUNTERS", defaults.sketch_counters),
                sketch_reset_multiplier: env_or(
                    "SKETCH_RESET_MULTIPLIER",
                    defaults.sketch_reset_multiplier,
                ),
                sample_seed: env::var("SAMPLE_SEED").ok().and_then(|v| v.parse().ok()),
            },
        }
    }

    /// Parsed bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_address
            .parse()
            .map_err(|_| ConfigError::ListenAddress(self.listen_address.clone()))
    }

    /// Validates the cache section and the listen address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.socket_addr().map(|_| ())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.into(),
            cleanup_interval: 1,
            cache: CacheConfig::default(),
        }
    }
}

/// Default bind address of the server.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:5050";

/// Largest accepted total capacity. Keeps `used + cost` within `u64` in every shard.
pub const MAX_TOTAL_CAPACITY: u64 = u64::MAX / 2;

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "ignoring unparsable environment value");
            default
        }),
        Err(_) => default,
    }
}
