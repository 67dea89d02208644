//! Valve Context Module
//!
//! Per-request state carried through every valve of one pipeline run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::cache::PageCacheContext;
use crate::error::Result;
use crate::http::{PageRequest, PageResponse};
use crate::pipeline::RegisteredValve;
use crate::site::ResolvedMount;

// == Valve Context ==
/// One invocation of a pipeline.
///
/// Owned by a single request task and consumed when the request completes.
/// It is passed explicitly to every valve; nothing about the current
/// request lives in global state.
pub struct ValveContext {
    request: PageRequest,
    response: PageResponse,
    attributes: HashMap<String, Value>,
    resolved_mount: Option<ResolvedMount>,
    page_cache: Option<PageCacheContext>,
    stage: &'static str,
    valves: Arc<[RegisteredValve]>,
    cursor: usize,
    started_at: Instant,
}

impl ValveContext {
    pub fn new(request: PageRequest) -> Self {
        Self {
            request,
            response: PageResponse::new(),
            attributes: HashMap::new(),
            resolved_mount: None,
            page_cache: None,
            stage: "",
            valves: Arc::from(Vec::new()),
            cursor: 0,
            started_at: Instant::now(),
        }
    }

    // == Chain ==
    /// Runs the valve at the cursor, advancing past it first.
    ///
    /// Past the last valve of the stage this returns `Ok(())` without doing
    /// anything, so the final valve may call it unconditionally.
    pub async fn invoke_next(&mut self) -> Result<()> {
        let Some(entry) = self.valves.get(self.cursor).cloned() else {
            return Ok(());
        };
        self.cursor += 1;
        entry.valve().invoke(self).await
    }

    /// Walks `valves` from the start as stage `stage`.
    pub(crate) async fn walk(&mut self, stage: &'static str, valves: Arc<[RegisteredValve]>) -> Result<()> {
        self.stage = stage;
        self.valves = valves;
        self.cursor = 0;
        self.invoke_next().await
    }

    /// Name of the stage being walked.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    // == Page Cache Context ==
    /// The page cache context of this invocation, created on first access.
    pub fn page_cache_context(&mut self) -> &PageCacheContext {
        self.page_cache.get_or_insert_with(PageCacheContext::new)
    }

    pub fn page_cache_context_mut(&mut self) -> &mut PageCacheContext {
        self.page_cache.get_or_insert_with(PageCacheContext::new)
    }

    // == Request / Response ==
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn response(&self) -> &PageResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut PageResponse {
        &mut self.response
    }

    pub fn resolved_mount(&self) -> Option<&ResolvedMount> {
        self.resolved_mount.as_ref()
    }

    pub fn set_resolved_mount(&mut self, mount: ResolvedMount) {
        self.resolved_mount = Some(mount);
    }

    // == Attributes ==
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Time since the invocation was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn into_response(self) -> PageResponse {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Valve;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Appends its label to a shared trace before and after continuing.
    struct Tracing {
        label: &'static str,
        trace: Arc<Mutex<Vec<String>>>,
        call_next: bool,
    }

    #[async_trait]
    impl Valve for Tracing {
        async fn invoke(&self, ctx: &mut ValveContext) -> Result<()> {
            self.trace.lock().unwrap().push(format!("{}>", self.label));
            if self.call_next {
                ctx.invoke_next().await?;
            }
            self.trace.lock().unwrap().push(format!("<{}", self.label));
            Ok(())
        }
    }

    fn chain(trace: &Arc<Mutex<Vec<String>>>, steps: &[(&'static str, bool)]) -> Arc<[RegisteredValve]> {
        steps.iter()
            .map(|&(label, call_next)| {
                RegisteredValve::new(
                    label,
                    Arc::new(Tracing {
                        label,
                        trace: trace.clone(),
                        call_next,
                    }),
                )
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn test_walk_nests_valves() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = ValveContext::new(PageRequest::get("/"));

        ctx.walk("processing", chain(&trace, &[("a", true), ("b", true)]))
            .await
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), ["a>", "b>", "<b", "<a"]);
        assert_eq!(ctx.stage(), "processing");
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = ValveContext::new(PageRequest::get("/"));

        ctx.walk("processing", chain(&trace, &[("a", false), ("b", true)]))
            .await
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), ["a>", "<a"]);
    }

    #[tokio::test]
    async fn test_invoke_next_past_end_is_noop() {
        let mut ctx = ValveContext::new(PageRequest::get("/"));
        assert!(ctx.invoke_next().await.is_ok());
    }

    #[test]
    fn test_page_cache_context_is_stable() {
        let mut ctx = ValveContext::new(PageRequest::get("/"));
        ctx.page_cache_context_mut()
            .key_mut()
            .set_attribute("variant", "mobile")
            .unwrap();
        ctx.page_cache_context_mut().mark_uncacheable(Some("preview"));

        let context = ctx.page_cache_context();
        assert!(context.key().contains("variant"));
        assert!(!context.is_cacheable());
        assert_eq!(context.reasons(), ["preview"]);
    }

    #[test]
    fn test_attributes() {
        let mut ctx = ValveContext::new(PageRequest::get("/"));
        ctx.set_attribute("locale", Value::from("en"));

        assert_eq!(ctx.attribute("locale"), Some(&Value::from("en")));
        assert_eq!(ctx.remove_attribute("locale"), Some(Value::from("en")));
        assert!(ctx.attribute("locale").is_none());
    }
}
