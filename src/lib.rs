//! HST Pipeline - a site-delivery request pipeline
//!
//! Independently declared valves are assembled into one deterministic order
//! per pipeline stage at startup. Per request, the page caching valve turns
//! the downstream chain into a TTL-bounded full-response cache where
//! concurrent first requests for a page render it once.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod site;
pub mod tasks;
pub mod valves;

pub use api::{create_router, AppState};
pub use config::{Config, SiteConfig};
pub use error::{PipelineError, Result};
pub use tasks::spawn_cleanup_task;
