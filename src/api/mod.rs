//! API Module
//!
//! HTTP handlers and routing for the pipeline server.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /_cache/stats` - Page cache statistics
//! - `POST /_cache/clear` - Drop every cached page
//! - fallback - Site traffic through the default pipeline

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
