//! Page Cache Store Module
//!
//! In-memory element storage combining a HashMap with LRU tracking and TTL
//! expiration.

use std::collections::HashMap;

use crate::cache::{CacheElement, CacheStats, LruTracker};

// == Page Cache Store ==
/// Element storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct PageCacheStore {
    /// Key -> element
    elements: HashMap<String, CacheElement>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of elements allowed
    max_entries: usize,
}

impl PageCacheStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` elements (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        Self {
            elements: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
        }
    }

    // == Put ==
    /// Stores an element under its own key.
    ///
    /// An existing element for the key is replaced. At capacity the least
    /// recently used element is evicted first.
    pub fn put(&mut self, element: CacheElement) {
        let key = element.key.clone();

        if !self.elements.contains_key(&key) && self.elements.len() >= self.max_entries {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.elements.remove(&evicted);
                self.stats.record_eviction();
            }
        }

        self.elements.insert(key.clone(), element);
        self.lru.touch(&key);
        self.stats.record_store();
        self.stats.set_total_entries(self.elements.len());
    }

    // == Get ==
    /// Returns the live element for `key`.
    ///
    /// Expired elements are removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<CacheElement> {
        match self.elements.get(key) {
            Some(element) if element.is_expired() => {
                self.elements.remove(key);
                self.lru.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                self.stats.set_total_entries(self.elements.len());
                None
            }
            Some(element) => {
                let element = element.clone();
                self.stats.record_hit();
                self.lru.touch(key);
                Some(element)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Clear ==
    /// Drops every element. Statistics other than the entry count are kept.
    pub fn clear(&mut self) -> usize {
        let count = self.elements.len();
        self.elements.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
        count
    }

    // == Cleanup Expired ==
    /// Removes all expired elements, returning how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .elements
            .iter()
            .filter(|(_, element)| element.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.elements.remove(key);
            self.lru.remove(key);
        }

        self.stats.record_expirations(expired.len());
        self.stats.set_total_entries(self.elements.len());
        expired.len()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.elements.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
