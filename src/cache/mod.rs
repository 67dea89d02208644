//! Cache Module
//!
//! Page cache building blocks: the order-sensitive key, the per-request
//! cacheability context, response snapshots, the backend contract with its
//! in-memory implementation, single-flight render slots and events.

mod backend;
mod element;
mod events;
mod flight;
mod key;
mod lock;
mod lru;
mod page_context;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use backend::{MemoryPageCache, PageCacheBackend};
pub use element::{current_timestamp_ms, CacheElement, CachedPage};
pub use events::{CacheEvents, LoggingListener, PageCacheEvent, PageCacheListener};
pub use flight::{FlightGuard, KeyLocks};
pub use key::PageCacheKey;
pub use lru::LruTracker;
pub use page_context::PageCacheContext;
pub use stats::CacheStats;
pub use store::PageCacheStore;
