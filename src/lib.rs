//! Ristretto - a sharded in-memory cache server
//!
//! W-TinyLFU admission backed by a count-min frequency sketch, sampled
//! eviction, per-shard locking and optional TTL expiration, served over
//! HTTP/JSON with a matching client.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEngine, CacheStats};
pub use client::{CacheClient, ClientError};
pub use config::{CacheConfig, Config, ConfigError};
pub use error::CacheError;
pub use tasks::spawn_cleanup_task;
