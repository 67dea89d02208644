//! Cache Backend Module
//!
//! Contract between the page caching valve and whatever stores pages, plus
//! the bundled in-memory implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheElement, CacheStats, CachedPage, FlightGuard, KeyLocks, PageCacheStore};
use crate::error::Result;

// == Backend Contract ==
/// Key/value/TTL store with per-key single-flight.
///
/// `acquire` must be usable concurrently with `clear`; clearing drops
/// stored elements only and never disturbs held render slots.
#[async_trait]
pub trait PageCacheBackend: Send + Sync {
    /// Returns the live element stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<CacheElement>>;

    /// Wraps `page` into an element for `key` expiring after `ttl`.
    fn create_element(&self, key: &str, page: CachedPage, ttl: Duration) -> CacheElement {
        CacheElement::new(key, page, ttl)
    }

    /// Stores `element` under its key.
    async fn put(&self, element: CacheElement) -> Result<()>;

    /// Drops every stored element.
    async fn clear(&self) -> Result<()>;

    /// Takes the render slot for `key`, waiting while another task holds it.
    async fn acquire(&self, key: &str) -> Result<FlightGuard>;

    /// Current counters.
    async fn stats(&self) -> Result<CacheStats>;
}

// == Memory Page Cache ==
/// In-memory backend: a `PageCacheStore` behind an async lock and a
/// `KeyLocks` table kept apart from it.
#[derive(Debug)]
pub struct MemoryPageCache {
    store: RwLock<PageCacheStore>,
    flights: Arc<KeyLocks>,
}

impl MemoryPageCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: RwLock::new(PageCacheStore::new(max_entries)),
            flights: KeyLocks::new(),
        }
    }

    /// Creates a backend from configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.max_entries)
    }

    /// Number of keys currently being rendered or waited on.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Removes expired elements, returning how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        self.store.write().await.cleanup_expired()
    }

    /// Drops every stored element, returning how many there were.
    pub async fn purge(&self) -> usize {
        let removed = self.store.write().await.clear();
        debug!(removed, "page cache cleared");
        removed
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait]
impl PageCacheBackend for MemoryPageCache {
    async fn get(&self, key: &str) -> Result<Option<CacheElement>> {
        // write lock: lookups update LRU order and counters
        Ok(self.store.write().await.get(key))
    }

    async fn put(&self, element: CacheElement) -> Result<()> {
        self.store.write().await.put(element);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.purge().await;
        Ok(())
    }

    async fn acquire(&self, key: &str) -> Result<FlightGuard> {
        Ok(self.flights.acquire(key).await)
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(self.store.read().await.stats())
    }
}
