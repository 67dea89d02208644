//! API Handlers
//!
//! HTTP request handlers: the pipeline entry point for site traffic and the
//! page cache admin endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::{CacheEvents, MemoryPageCache, PageCacheBackend};
use crate::config::{Config, SiteConfig};
use crate::error::Result;
use crate::http::PageRequest;
use crate::models::{ClearResponse, HealthResponse, StatsResponse};
use crate::pipeline::Pipelines;
use crate::site::{StaticContent, StaticMounts};
use crate::valves::{builtin_registry, ValveDependencies};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Assembled pipelines; site traffic runs through the default one
    pub pipelines: Arc<Pipelines>,
    /// Page cache shared by every page caching valve
    pub cache: Arc<MemoryPageCache>,
    /// Page cache event listeners
    pub events: Arc<CacheEvents>,
    /// Prefix stripped from request paths
    pub context_path: String,
}

impl AppState {
    /// Creates a new AppState around already assembled pipelines.
    pub fn new(pipelines: Pipelines, cache: Arc<MemoryPageCache>, events: Arc<CacheEvents>) -> Self {
        Self {
            pipelines: Arc::new(pipelines),
            cache,
            events,
            context_path: String::new(),
        }
    }

    /// Builds the page cache, the built-in valves and every pipeline of
    /// `site`.
    ///
    /// Fails when any pipeline cannot be assembled.
    pub fn from_config(config: &Config, site: &SiteConfig) -> Result<Self> {
        let cache = Arc::new(MemoryPageCache::from_config(config));
        let events = Arc::new(CacheEvents::logging());

        let deps = ValveDependencies {
            cache: cache.clone(),
            events: events.clone(),
            mounts: Arc::new(StaticMounts::from_config(&site.mounts)),
            content: Arc::new(StaticContent::from_config(&site.content)),
            default_ttl: config.default_ttl(),
            page_cache_enabled: config.page_cache_enabled,
            cache_variants: site.cache_variants.clone(),
        };
        let pipelines = Pipelines::from_config(site, &builtin_registry(&deps))?;

        let mut state = Self::new(pipelines, cache, events);
        state.context_path = config.context_path.clone();
        Ok(state)
    }
}

/// Fallback handler: runs every non-admin request through the default
/// pipeline.
pub async fn pipeline_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, _body) = request.into_parts();
    let page_request = PageRequest::from_parts(&parts, &state.context_path);

    let outcome = match state.pipelines.default_pipeline() {
        Ok(pipeline) => pipeline.invoke(page_request).await,
        Err(error) => Err(error),
    };

    match outcome {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}

/// Handler for GET /_cache/stats
///
/// Returns current page cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.cache.stats().await?;
    Ok(Json(StatsResponse::new(&stats, state.cache.in_flight())))
}

/// Handler for POST /_cache/clear
///
/// Drops every cached page. Renders in flight are not disturbed.
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.cache.purge().await;
    Json(ClearResponse::new(removed))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipelines = state
        .pipelines
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();
    Json(HealthResponse::healthy(pipelines))
}
