//! API Routes
//!
//! Configures the Axum router: admin endpoints first, everything else into
//! the default pipeline.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{clear_handler, health_handler, pipeline_handler, stats_handler, AppState};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /_cache/stats` - Page cache statistics
/// - `POST /_cache/clear` - Drop every cached page
/// - anything else - Served by the default pipeline
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/_cache/stats", get(stats_handler))
        .route("/_cache/clear", post(clear_handler))
        .fallback(pipeline_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
