//! Content Rendering Valve
//!
//! Writes the content item found for the resolved mount into the response.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{PipelineError, Result};
use crate::pipeline::{Valve, ValveContext};
use crate::site::ContentLookup;

pub struct ContentRenderingValve {
    content: Arc<dyn ContentLookup>,
}

impl ContentRenderingValve {
    pub fn new(content: Arc<dyn ContentLookup>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl Valve for ContentRenderingValve {
    async fn invoke(&self, ctx: &mut ValveContext) -> Result<()> {
        let mount = ctx
            .resolved_mount()
            .cloned()
            .ok_or_else(|| PipelineError::Render("no resolved mount to render".to_string()))?;

        match self.content.find(&mount.site, &mount.path).await {
            Some(item) => {
                if !item.cacheable {
                    ctx.page_cache_context_mut()
                        .mark_uncacheable(Some("content is not cacheable"));
                }
                let response = ctx.response_mut();
                response.set_status(StatusCode::OK);
                response.set_header(header::CONTENT_TYPE.as_str(), &item.content_type)?;
                if let Some(seconds) = item.expires_secs {
                    response.set_date_header(header::EXPIRES.as_str(), expires_after(seconds)?)?;
                }
                response.set_body(item.body);
            }
            None => {
                ctx.page_cache_context_mut()
                    .mark_uncacheable(Some("content not found"));
                let response = ctx.response_mut();
                response.set_status(StatusCode::NOT_FOUND);
                response.set_header(header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8")?;
                response.set_body("Not Found");
            }
        }

        ctx.invoke_next().await
    }
}

/// `Expires` value `seconds` from now. Fails when the date is not
/// representable.
fn expires_after(seconds: u64) -> Result<DateTime<Utc>> {
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or_else(|| PipelineError::Render(format!("expires_secs {seconds} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{parse_http_date, PageRequest};
    use crate::pipeline::RegisteredValve;
    use crate::site::{ContentItem, ResolvedMount, StaticContent};

    fn content() -> Arc<StaticContent> {
        let mut content = StaticContent::new();
        content.insert("main", "/about", ContentItem::html("<h1>About</h1>"));
        content.insert(
            "main",
            "/live",
            ContentItem {
                expires_secs: Some(30),
                cacheable: false,
                ..ContentItem::html("live")
            },
        );
        content.insert(
            "main",
            "/forever",
            ContentItem {
                expires_secs: Some(100_000_000_000_000_000),
                ..ContentItem::html("forever")
            },
        );
        Arc::new(content)
    }

    async fn render(path: &str) -> Result<ValveContext> {
        let valves: Vec<RegisteredValve> = vec![RegisteredValve::new(
            "content-rendering",
            Arc::new(ContentRenderingValve::new(content())),
        )];
        let mut ctx = ValveContext::new(PageRequest::get(path));
        ctx.set_resolved_mount(ResolvedMount {
            site: "main".to_string(),
            mount_path: "/".to_string(),
            path: path.to_string(),
        });
        ctx.walk("processing", valves.into()).await?;
        Ok(ctx)
    }

    #[tokio::test]
    async fn test_renders_found_content() {
        let mut ctx = render("/about").await.unwrap();

        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(ctx.response().body(), "<h1>About</h1>");
        assert_eq!(ctx.response().header("content-type"), Some("text/html; charset=utf-8"));
        assert!(ctx.response().header("expires").is_none());
        assert!(ctx.page_cache_context().is_cacheable());
    }

    #[tokio::test]
    async fn test_expiring_uncacheable_content() {
        let mut ctx = render("/live").await.unwrap();

        let expires = parse_http_date(ctx.response().header("expires").unwrap()).unwrap();
        assert!(expires > Utc::now());
        assert!(!ctx.page_cache_context().is_cacheable());
    }

    #[tokio::test]
    async fn test_missing_content_is_404() {
        let mut ctx = render("/missing").await.unwrap();

        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ctx.page_cache_context().reasons(), ["content not found"]);
    }

    #[tokio::test]
    async fn test_unresolved_request_is_an_error() {
        let valves: Vec<RegisteredValve> = vec![RegisteredValve::new(
            "content-rendering",
            Arc::new(ContentRenderingValve::new(content())),
        )];
        let mut ctx = ValveContext::new(PageRequest::get("/about"));

        let err = ctx.walk("processing", valves.into()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_is_a_render_error() {
        let err = render("/forever").await.err().unwrap();
        assert!(matches!(err, PipelineError::Render(message) if message.contains("expires_secs")));
    }

    #[test]
    fn test_expires_after_bounds() {
        assert!(expires_after(60).unwrap() > Utc::now());
        assert!(expires_after(u64::MAX).is_err());
        assert!(expires_after(i64::MAX as u64).is_err());
    }
}
