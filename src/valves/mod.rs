//! Valves Module
//!
//! The built-in valves and the registry that makes them available to site
//! configuration by name.
//!
//! # Valves
//! - `initialization` - Request id, credential check
//! - `context-resolving` - Mount resolution, 404 when unmounted
//! - `cache-variant` - Query and cookie values added to the page cache key
//! - `page-caching` - Full-response cache with single-flight renders
//! - `content-rendering` - Writes the content item into the response
//! - `cleanup` - Request completion log

mod cache_variant;
mod cleanup;
mod content_rendering;
mod context_resolving;
mod initialization;
mod page_caching;

use std::sync::Arc;
use std::time::Duration;

pub use cache_variant::CacheVariantValve;
pub use cleanup::CleanupValve;
pub use content_rendering::ContentRenderingValve;
pub use context_resolving::ContextResolvingValve;
pub use initialization::{InitializationValve, REQUEST_ID_ATTRIBUTE};
pub use page_caching::PageCachingValve;

use crate::cache::{CacheEvents, PageCacheBackend};
use crate::config::CacheVariantConfig;
use crate::pipeline::ValveRegistry;
use crate::site::{ContentLookup, MountResolver};

pub const INITIALIZATION: &str = "initialization";
pub const CONTEXT_RESOLVING: &str = "context-resolving";
pub const CACHE_VARIANT: &str = "cache-variant";
pub const PAGE_CACHING: &str = "page-caching";
pub const CONTENT_RENDERING: &str = "content-rendering";
pub const CLEANUP: &str = "cleanup";

/// Collaborators the built-in valves are constructed with.
#[derive(Clone)]
pub struct ValveDependencies {
    pub cache: Arc<dyn PageCacheBackend>,
    pub events: Arc<CacheEvents>,
    pub mounts: Arc<dyn MountResolver>,
    pub content: Arc<dyn ContentLookup>,
    pub default_ttl: Duration,
    pub page_cache_enabled: bool,
    pub cache_variants: CacheVariantConfig,
}

/// A registry holding every built-in valve under its configuration name.
pub fn builtin_registry(deps: &ValveDependencies) -> ValveRegistry {
    let mut registry = ValveRegistry::new();
    registry.register(INITIALIZATION, Arc::new(InitializationValve::new()));
    registry.register(
        CONTEXT_RESOLVING,
        Arc::new(ContextResolvingValve::new(deps.mounts.clone())),
    );
    registry.register(
        CACHE_VARIANT,
        Arc::new(CacheVariantValve::from_config(&deps.cache_variants)),
    );
    registry.register(
        PAGE_CACHING,
        Arc::new(
            PageCachingValve::new(deps.cache.clone(), deps.default_ttl)
                .with_events(deps.events.clone())
                .enabled(deps.page_cache_enabled),
        ),
    );
    registry.register(
        CONTENT_RENDERING,
        Arc::new(ContentRenderingValve::new(deps.content.clone())),
    );
    registry.register(CLEANUP, Arc::new(CleanupValve));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryPageCache;
    use crate::config::SiteConfig;
    use crate::http::PageRequest;
    use crate::pipeline::{Pipelines, Stage};
    use crate::site::{StaticContent, StaticMounts};

    fn deps() -> ValveDependencies {
        let site = SiteConfig::default();
        ValveDependencies {
            cache: Arc::new(MemoryPageCache::new(10)),
            events: Arc::new(CacheEvents::new()),
            mounts: Arc::new(StaticMounts::from_config(&site.mounts)),
            content: Arc::new(StaticContent::new()),
            default_ttl: Duration::from_secs(60),
            page_cache_enabled: true,
            cache_variants: CacheVariantConfig::default(),
        }
    }

    #[test]
    fn test_builtin_registry_knows_every_valve() {
        let registry = builtin_registry(&deps());
        for name in [
            INITIALIZATION,
            CONTEXT_RESOLVING,
            CACHE_VARIANT,
            PAGE_CACHING,
            CONTENT_RENDERING,
            CLEANUP,
        ] {
            assert!(registry.contains(name), "{name} not registered");
        }
        assert!(!registry.contains("templating"));
    }

    #[tokio::test]
    async fn test_default_site_runs_through_builtin_valves() {
        let pipelines = Pipelines::from_config(&SiteConfig::default(), &builtin_registry(&deps())).unwrap();
        let pipeline = pipelines.default_pipeline().unwrap();

        assert_eq!(
            pipeline.valve_names(Stage::Processing),
            [CONTEXT_RESOLVING, PAGE_CACHING, CONTENT_RENDERING]
        );

        // no content configured: rendered as a 404 by the content valve
        let response = pipeline.invoke(PageRequest::get("/")).await.unwrap();
        assert_eq!(response.status(), 404);
    }
}
