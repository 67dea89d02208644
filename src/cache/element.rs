//! Cache Element Module
//!
//! Immutable response snapshots and the TTL-bearing elements that hold them.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;

use crate::http::{PageResponse, ResponseCookie};

// == Cached Page ==
/// Snapshot of a fully rendered response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPage {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub cookies: Vec<ResponseCookie>,
    pub body: Bytes,
}

impl CachedPage {
    /// Copies status, headers, cookies and body out of `response`.
    pub fn snapshot(response: &PageResponse) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            cookies: response.cookies().to_vec(),
            body: response.body().clone(),
        }
    }

    /// Overwrites `response` with this snapshot.
    pub fn replay_onto(&self, response: &mut PageResponse) {
        response.replace(
            self.status,
            self.headers.clone(),
            self.cookies.clone(),
            self.body.clone(),
        );
    }
}

// == Cache Element ==
/// A cached page stored under a string key with an embedded TTL.
#[derive(Debug, Clone)]
pub struct CacheElement {
    /// Backend key (string form of the page cache key)
    pub key: String,
    /// The cached response
    pub page: Arc<CachedPage>,
    /// Time to live given at creation
    pub ttl: Duration,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheElement {
    // == Constructor ==
    /// Creates an element expiring `ttl` from now.
    pub fn new(key: impl Into<String>, page: CachedPage, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        Self {
            key: key.into(),
            page: Arc::new(page),
            ttl,
            created_at: now,
            expires_at: now.saturating_add(ttl.as_millis() as u64),
        }
    }

    // == Is Expired ==
    /// Checks if the element has expired.
    ///
    /// An element is expired once the current time reaches its expiration
    /// time, so a zero TTL is expired immediately.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
