//! Page cache events.
//!
//! Diagnostics side channel of the page caching valve: a plain observer
//! list invoked synchronously. A failing or panicking listener is logged
//! and skipped; the publisher never sees the failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

/// Outcome of one pass through the page caching valve.
#[derive(Debug, Clone, PartialEq)]
pub enum PageCacheEvent {
    /// A stored element was replayed. `after_wait` is set when the element
    /// was published by a concurrent render this request waited on.
    Hit { key: String, after_wait: bool },
    /// A fresh render was stored.
    Stored { key: String, ttl: Duration },
    /// A fresh render was served but not stored.
    Skipped { key: String, reasons: Vec<String> },
    /// The downstream valves failed; nothing was stored.
    RenderFailed { key: String, error: String },
    /// The backend failed during `op`; the request was served uncached.
    BackendFailed {
        key: String,
        op: &'static str,
        error: String,
    },
}

impl PageCacheEvent {
    pub fn key(&self) -> &str {
        match self {
            PageCacheEvent::Hit { key, .. }
            | PageCacheEvent::Stored { key, .. }
            | PageCacheEvent::Skipped { key, .. }
            | PageCacheEvent::RenderFailed { key, .. }
            | PageCacheEvent::BackendFailed { key, .. } => key,
        }
    }
}

/// Subscriber to page cache events.
pub trait PageCacheListener: Send + Sync {
    fn on_event(&self, event: &PageCacheEvent) -> anyhow::Result<()>;
}

/// Ordered list of listeners.
#[derive(Default)]
pub struct CacheEvents {
    listeners: Mutex<Vec<Arc<dyn PageCacheListener>>>,
}

impl CacheEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list holding only a `LoggingListener`.
    pub fn logging() -> Self {
        let events = Self::new();
        events.add_listener(Arc::new(LoggingListener));
        events
    }

    pub fn add_listener(&self, listener: Arc<dyn PageCacheListener>) {
        mutex_lock(&self.listeners, SOURCE, "add_listener").push(listener);
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.listeners, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every listener in registration order.
    pub fn publish(&self, event: PageCacheEvent) {
        // snapshot so listeners run without holding the list lock
        let listeners = mutex_lock(&self.listeners, SOURCE, "publish").clone();

        for (position, listener) in listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(
                    listener = position,
                    key = event.key(),
                    error = %error,
                    "Page cache listener failed"
                ),
                Err(_) => warn!(
                    listener = position,
                    key = event.key(),
                    "Page cache listener panicked"
                ),
            }
        }
    }
}

// == Logging Listener ==
/// Writes every event to the log: backend failures at warn, the rest at
/// debug.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl PageCacheListener for LoggingListener {
    fn on_event(&self, event: &PageCacheEvent) -> anyhow::Result<()> {
        match event {
            PageCacheEvent::Hit { key, after_wait } => {
                debug!(cache = "page", outcome = "hit", key = %key, after_wait, "serving cached page")
            }
            PageCacheEvent::Stored { key, ttl } => debug!(
                cache = "page",
                outcome = "stored",
                key = %key,
                ttl_secs = ttl.as_secs(),
                "cached rendered page"
            ),
            PageCacheEvent::Skipped { key, reasons } => debug!(
                cache = "page",
                outcome = "skipped",
                key = %key,
                reasons = ?reasons,
                "rendered page not cacheable"
            ),
            PageCacheEvent::RenderFailed { key, error } => {
                debug!(cache = "page", outcome = "render_failed", key = %key, error = %error, "render failed")
            }
            PageCacheEvent::BackendFailed { key, op, error } => warn!(
                cache = "page",
                outcome = "backend_failed",
                key = %key,
                op,
                error = %error,
                "Page cache backend failed, serving uncached"
            ),
        }
        Ok(())
    }
}
