//! Page Cache Context Module
//!
//! Per-request cacheability decision shared by all valves of an invocation.

use crate::cache::PageCacheKey;

// == Page Cache Context ==
/// Holds whether the current response may be cached, why not, and its key.
#[derive(Debug, Clone)]
pub struct PageCacheContext {
    cacheable: bool,
    reasons: Vec<String>,
    key: PageCacheKey,
}

impl Default for PageCacheContext {
    fn default() -> Self {
        Self {
            cacheable: true,
            reasons: Vec::new(),
            key: PageCacheKey::new(),
        }
    }
}

impl PageCacheContext {
    /// Creates a cacheable context with an empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true unless some valve marked the response uncacheable.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Marks the response uncacheable, recording an optional reason.
    pub fn mark_uncacheable(&mut self, reason: Option<&str>) {
        self.cacheable = false;
        if let Some(reason) = reason {
            self.reasons.push(reason.to_string());
        }
    }

    /// Reasons recorded by `mark_uncacheable`, in call order.
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn key(&self) -> &PageCacheKey {
        &self.key
    }

    pub fn key_mut(&mut self) -> &mut PageCacheKey {
        &mut self.key
    }
}
