//! Error types for the pipeline server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Pipeline Error Enum ==
/// Unified error type for pipeline assembly, request processing and caching.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The ordering constraints of a stage form a cycle
    #[error("Unsatisfiable valve ordering in {stage}: {}", names.join(" -> "))]
    OrderingCycle { stage: String, names: Vec<String> },

    /// Two valves with the same name were assembled into one stage
    #[error("Duplicate valve name: {0}")]
    DuplicateValve(String),

    /// A configured valve name has no registered implementation
    #[error("Unknown valve: {0}")]
    UnknownValve(String),

    /// No pipeline with the requested name exists
    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),

    /// The site configuration could not be loaded or is malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A page cache key attribute could not be serialized
    #[error("Key attribute serialization failed: {0}")]
    KeySerialization(#[from] serde_json::Error),

    /// A valve failed while rendering the response
    #[error("Render failed: {0}")]
    Render(String),

    /// The cache backend failed
    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl PipelineError {
    /// Returns true for errors raised while building pipelines at startup.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::OrderingCycle { .. }
                | PipelineError::DuplicateValve(_)
                | PipelineError::UnknownValve(_)
                | PipelineError::InvalidConfig(_)
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::UnknownPipeline(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
