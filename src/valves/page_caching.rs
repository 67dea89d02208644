//! Page Caching Valve
//!
//! Caches the whole downstream rendering chain as one opaque response,
//! keyed by request identity plus any attributes upstream valves added to
//! the page cache key. Concurrent first requests for one key render once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{
    CacheElement, CacheEvents, CachedPage, PageCacheBackend, PageCacheContext, PageCacheEvent,
};
use crate::error::Result;
use crate::http::{parse_http_date, PageResponse};
use crate::pipeline::{Valve, ValveContext};

// == Page Caching Valve ==
pub struct PageCachingValve {
    cache: Arc<dyn PageCacheBackend>,
    default_ttl: Duration,
    events: Arc<CacheEvents>,
    enabled: bool,
}

impl PageCachingValve {
    pub fn new(cache: Arc<dyn PageCacheBackend>, default_ttl: Duration) -> Self {
        Self {
            cache,
            default_ttl,
            events: Arc::new(CacheEvents::logging()),
            enabled: true,
        }
    }

    /// Publishes outcomes to `events` instead of a private list.
    pub fn with_events(mut self, events: Arc<CacheEvents>) -> Self {
        self.events = events;
        self
    }

    /// A disabled valve passes every request straight through.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn events(&self) -> &Arc<CacheEvents> {
        &self.events
    }

    async fn lookup(&self, key: &str) -> Lookup {
        match self.cache.get(key).await {
            Ok(Some(element)) if !element.is_expired() => Lookup::Hit(element),
            Ok(_) => Lookup::Miss,
            Err(error) => {
                self.backend_failed(key, "get", &error);
                Lookup::Failed
            }
        }
    }

    fn backend_failed(&self, key: &str, op: &'static str, error: &dyn std::fmt::Display) {
        self.events.publish(PageCacheEvent::BackendFailed {
            key: key.to_string(),
            op,
            error: error.to_string(),
        });
    }

    fn replay(&self, ctx: &mut ValveContext, element: &CacheElement, after_wait: bool) {
        element.page.replay_onto(ctx.response_mut());
        self.events.publish(PageCacheEvent::Hit {
            key: element.key.clone(),
            after_wait,
        });
    }

    /// Runs the rest of the chain and stores the result when cacheable.
    ///
    /// The caller holds the render slot for `key` for the whole call.
    async fn render(&self, ctx: &mut ValveContext, key: &str) -> Result<()> {
        let mark = ResponseMark::capture(ctx.response());

        if let Err(error) = ctx.invoke_next().await {
            self.events.publish(PageCacheEvent::RenderFailed {
                key: key.to_string(),
                error: error.to_string(),
            });
            return Err(error);
        }

        let context = ctx.page_cache_context().clone();
        let now = Utc::now();
        let decision = decide(
            &context,
            ctx.response(),
            &mark,
            now,
            self.default_ttl,
        );

        match decision {
            Decision::Store(ttl) => {
                let page = CachedPage::snapshot(ctx.response());
                let element = self.cache.create_element(key, page, ttl);
                match self.cache.put(element).await {
                    Ok(()) => {
                        self.events.publish(PageCacheEvent::Stored {
                            key: key.to_string(),
                            ttl,
                        });
                    }
                    Err(error) => self.backend_failed(key, "put", &error),
                }
            }
            Decision::Skip(reasons) => {
                self.events.publish(PageCacheEvent::Skipped {
                    key: key.to_string(),
                    reasons,
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Valve for PageCachingValve {
    async fn invoke(&self, ctx: &mut ValveContext) -> Result<()> {
        if !self.enabled
            || !is_cacheable_method(ctx.request().method())
            || !ctx.page_cache_context().is_cacheable()
        {
            return ctx.invoke_next().await;
        }

        let key = build_key(ctx)?;

        // Lookup
        match self.lookup(&key).await {
            Lookup::Hit(element) => {
                self.replay(ctx, &element, false);
                return Ok(());
            }
            Lookup::Miss => {}
            Lookup::Failed => return ctx.invoke_next().await,
        }

        // Miss: take the render slot, then look again in case the previous
        // holder stored the page while this request waited.
        let guard = match self.cache.acquire(&key).await {
            Ok(guard) => guard,
            Err(error) => {
                self.backend_failed(&key, "acquire", &error);
                return ctx.invoke_next().await;
            }
        };

        match self.lookup(&key).await {
            Lookup::Hit(element) => {
                guard.release();
                self.replay(ctx, &element, true);
                return Ok(());
            }
            Lookup::Miss => {}
            Lookup::Failed => {
                guard.release();
                return ctx.invoke_next().await;
            }
        }

        debug!(cache = "page", outcome = "miss", key = %key, "cache miss, rendering");
        let outcome = self.render(ctx, &key).await;
        guard.release();
        outcome
    }
}

/// Result of a backend lookup. A failed lookup is served uncached.
enum Lookup {
    Hit(CacheElement),
    Miss,
    Failed,
}

fn is_cacheable_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Appends the request identity to the page cache key and returns the
/// backend key string.
///
/// Attributes set by earlier valves stay first, in the order they were set.
fn build_key(ctx: &mut ValveContext) -> Result<String> {
    let request = ctx.request();
    let method = request.method().as_str().to_string();
    let scheme = request.scheme().to_string();
    let host = request.host().to_string();
    let port = request.port();
    let context_path = request.context_path().to_string();
    let path = request.path_info().to_string();
    let query = request.query().map(str::to_string);
    let mount = ctx.resolved_mount().cloned();

    let key = ctx.page_cache_context_mut().key_mut();
    key.set_attribute("method", &method)?;
    key.set_attribute("scheme", &scheme)?;
    key.set_attribute("host", &host)?;
    key.set_attribute("port", &port)?;
    if let Some(mount) = &mount {
        key.set_attribute("site", &mount.site)?;
        key.set_attribute("mount", &mount.mount_path)?;
    }
    key.set_attribute("context_path", &context_path)?;
    key.set_attribute("path", &path)?;
    key.set_attribute("query", &query)?;

    Ok(key.as_cache_string())
}

// == Response Mark ==
/// What the response looked like before the rest of the chain ran, so that
/// changes made during the render can be told apart.
#[derive(Debug, Clone)]
struct ResponseMark {
    cookies: usize,
    set_cookie_headers: usize,
    expires: Option<HeaderValue>,
}

impl ResponseMark {
    fn capture(response: &PageResponse) -> Self {
        Self {
            cookies: response.cookies().len(),
            set_cookie_headers: response.headers().get_all(header::SET_COOKIE).iter().count(),
            expires: response.headers().get(header::EXPIRES).cloned(),
        }
    }
}

// == Decision ==
#[derive(Debug, Clone, PartialEq)]
enum Decision {
    Store(Duration),
    Skip(Vec<String>),
}

/// Decides whether a freshly rendered response may be stored, and for how
/// long.
fn decide(
    context: &PageCacheContext,
    response: &PageResponse,
    mark: &ResponseMark,
    now: DateTime<Utc>,
    default_ttl: Duration,
) -> Decision {
    let mut reasons = Vec::new();
    let headers = response.headers();

    if !context.is_cacheable() {
        if context.reasons().is_empty() {
            reasons.push("marked uncacheable".to_string());
        } else {
            reasons.extend(context.reasons().iter().cloned());
        }
    }
    if has_directive(headers, header::PRAGMA, "no-cache") {
        reasons.push("Pragma: no-cache".to_string());
    }
    for directive in ["no-cache", "no-store"] {
        if has_directive(headers, header::CACHE_CONTROL, directive) {
            reasons.push(format!("Cache-Control: {directive}"));
        }
    }

    let expires = headers.get(header::EXPIRES);
    let expires_at = match expires {
        None => None,
        Some(value) => match value.to_str().ok().and_then(parse_http_date) {
            Some(date) if date > now => Some(date),
            Some(_) => {
                reasons.push("Expires is not in the future".to_string());
                None
            }
            None => {
                reasons.push("Expires is not a valid date".to_string());
                None
            }
        },
    };

    let set_cookie_headers = headers.get_all(header::SET_COOKIE).iter().count();
    if response.cookies().len() > mark.cookies || set_cookie_headers > mark.set_cookie_headers {
        reasons.push("cookie set during render".to_string());
    }

    if !reasons.is_empty() {
        return Decision::Skip(reasons);
    }

    let set_during_render = expires.is_some() && expires != mark.expires.as_ref();
    let ttl = match expires_at {
        Some(date) if set_during_render => ttl_until(date, now),
        _ => default_ttl,
    };
    Decision::Store(ttl)
}

/// Whole seconds until `date`, rounded up.
fn ttl_until(date: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let millis = (date - now).num_milliseconds().max(0) as u64;
    Duration::from_secs(millis.div_ceil(1000))
}

/// True when any value of `name` lists `directive`, ignoring case and any
/// `=argument` part.
fn has_directive(headers: &HeaderMap, name: header::HeaderName, directive: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|item| item.split('=').next().unwrap_or("").trim())
        .any(|item| item.eq_ignore_ascii_case(directive))
}
