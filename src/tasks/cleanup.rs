//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired cache entries.
//!
//! Reads already drop expired entries lazily; the sweep reclaims capacity
//! held by entries nobody reads again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheEngine;

/// Spawns a background task that periodically removes expired entries.
///
/// # Arguments
/// * `cache` - Shared cache engine
/// * `cleanup_interval_secs` - Seconds between sweeps; 0 is treated as 1
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheEngine::new(CacheConfig::default())?);
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<CacheEngine>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "starting TTL cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired();

            if removed > 0 {
                info!(removed, remaining = cache.len(), "TTL cleanup removed expired entries");
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn engine() -> Arc<CacheEngine> {
        Arc::new(CacheEngine::new(CacheConfig::with_capacity(100, 2)).unwrap())
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = engine();
        cache
            .set(b"expire_soon", b"value".to_vec(), None, Some(Duration::from_millis(200)))
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), 1);

        // Sweep runs at ~1s; nothing reads the key in between
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.len(), 0, "expired entry should have been swept");
        assert_eq!(cache.stats().expirations, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = engine();
        cache
            .set(b"long_lived", b"value".to_vec(), None, Some(Duration::from_secs(3600)))
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.get(b"long_lived").unwrap(), Some(b"value".to_vec()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(engine(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
