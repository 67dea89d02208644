//! Initialization Valve
//!
//! Tags each invocation with a request id and keeps requests carrying
//! credentials out of the page cache.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::http::header;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::{Valve, ValveContext};

/// Attribute holding the per-process request sequence number.
pub const REQUEST_ID_ATTRIBUTE: &str = "request.id";

#[derive(Debug, Default)]
pub struct InitializationValve {
    next_id: AtomicU64,
}

impl InitializationValve {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Valve for InitializationValve {
    async fn invoke(&self, ctx: &mut ValveContext) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        ctx.set_attribute(REQUEST_ID_ATTRIBUTE, Value::from(id));

        if ctx.request().headers().contains_key(header::AUTHORIZATION) {
            ctx.page_cache_context_mut()
                .mark_uncacheable(Some("request carries credentials"));
        }

        debug!(
            request_id = id,
            method = %ctx.request().method(),
            path = ctx.request().path_info(),
            "request started"
        );
        ctx.invoke_next().await
    }
}
