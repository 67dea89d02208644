//! Cleanup Valve

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::pipeline::{Valve, ValveContext};
use crate::valves::REQUEST_ID_ATTRIBUTE;

/// Logs the outcome of every request once all other valves are done.
#[derive(Debug, Default)]
pub struct CleanupValve;

#[async_trait]
impl Valve for CleanupValve {
    async fn invoke(&self, ctx: &mut ValveContext) -> Result<()> {
        let request_id = ctx
            .attribute(REQUEST_ID_ATTRIBUTE)
            .and_then(|id| id.as_u64())
            .unwrap_or_default();

        info!(
            request_id,
            method = %ctx.request().method(),
            path = ctx.request().path_info(),
            status = ctx.response().status().as_u16(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "request completed"
        );
        ctx.invoke_next().await
    }
}
