//! Cache Statistics Module
//!
//! Counters describing page cache effectiveness.

use serde::Serialize;

// == Cache Stats ==
/// Page cache counters, reported by the stats endpoint.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheStats {
    /// Lookups answered with a live element
    pub hits: u64,
    /// Lookups that found nothing or an expired element
    pub misses: u64,
    /// Elements stored after a cacheable render
    pub stores: u64,
    /// Elements dropped to make room
    pub evictions: u64,
    /// Elements dropped because their TTL elapsed
    pub expirations: u64,
    /// Current number of elements
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_store(&mut self) {
        self.stores += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_store_and_eviction_counters() {
        let mut stats = CacheStats::new();
        stats.record_store();
        stats.record_eviction();
        stats.record_expirations(3);
        stats.set_total_entries(7);

        assert_eq!(stats.stores, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.total_entries, 7);
    }
}
