//! TTL Cleanup Task
//!
//! Background task that periodically removes expired pages from the page
//! cache, so cold keys do not hold memory until they are evicted.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryPageCache;

/// Spawns a background task that periodically sweeps expired pages.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps.
///
/// # Arguments
/// * `cache` - shared page cache
/// * `cleanup_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(cache: Arc<MemoryPageCache>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting page cache cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired().await;

            if removed > 0 {
                info!("Page cache cleanup: removed {} expired pages", removed);
            } else {
                debug!("Page cache cleanup: no expired pages found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedPage, PageCacheBackend};
    use crate::http::PageResponse;

    fn page() -> CachedPage {
        let mut response = PageResponse::new();
        response.set_body("cached");
        CachedPage::snapshot(&response)
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_pages() {
        let cache = Arc::new(MemoryPageCache::new(100));
        cache
            .put(cache.create_element("expire_soon", page(), Duration::from_millis(500)))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), 1);

        // Wait for the page to expire and a sweep to run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.len().await, 0, "Expired page should have been swept");
        assert_eq!(cache.stats().await.unwrap().expirations, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_live_pages() {
        let cache = Arc::new(MemoryPageCache::new(100));
        cache
            .put(cache.create_element("long_lived", page(), Duration::from_secs(3600)))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let found = cache.get("long_lived").await.unwrap();
        assert!(found.is_some(), "Live page should not be removed");

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = Arc::new(MemoryPageCache::new(100));

        let handle = spawn_cleanup_task(cache, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
