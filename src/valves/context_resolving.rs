//! Context Resolving Valve
//!
//! Resolves the mount serving the request. Requests no mount covers end
//! here with a 404.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use tracing::debug;

use crate::error::Result;
use crate::pipeline::{Valve, ValveContext};
use crate::site::MountResolver;

pub struct ContextResolvingValve {
    resolver: Arc<dyn MountResolver>,
}

impl ContextResolvingValve {
    pub fn new(resolver: Arc<dyn MountResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Valve for ContextResolvingValve {
    async fn invoke(&self, ctx: &mut ValveContext) -> Result<()> {
        match self.resolver.resolve(ctx.request()).await {
            Some(mount) => {
                debug!(site = %mount.site, mount = %mount.mount_path, path = %mount.path, "mount resolved");
                ctx.set_resolved_mount(mount);
                ctx.invoke_next().await
            }
            None => {
                debug!(
                    host = ctx.request().host(),
                    path = ctx.request().path_info(),
                    "no mount for request"
                );
                ctx.page_cache_context_mut().mark_uncacheable(Some("no mount"));
                let response = ctx.response_mut();
                response.set_status(StatusCode::NOT_FOUND);
                response.set_header(header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8")?;
                response.set_body("Not Found");
                Ok(())
            }
        }
    }
}
