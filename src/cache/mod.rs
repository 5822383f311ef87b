//! Cache Module
//!
//! Sharded in-memory cache with W-TinyLFU admission, cost-based capacity
//! and TTL expiration.

mod admission;
mod engine;
mod entry;
mod eviction;
mod events;
mod shard;
mod sketch;
mod stats;


// Re-export public types
pub use admission::{AdmissionDecision, AdmissionPolicy, Victim};
pub use engine::CacheEngine;
pub use entry::{CacheEntry, Key, Segment};
pub use eviction::EvictionCoordinator;
pub use events::{Event, EventQueue, SketchWorker, WorkerTotals};
pub use shard::{Lookup, Removal, RemovalCause, SetOutcome, Shard};
pub use sketch::{FrequencySketch, MAX_FREQUENCY};
pub use stats::CacheStats;
