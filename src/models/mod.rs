//! Response models for the admin endpoints
//!
//! This module defines the DTOs (Data Transfer Objects) serialized into
//! JSON bodies by the health and page cache endpoints.

pub mod responses;

// Re-export commonly used types
pub use responses::{ClearResponse, ErrorResponse, HealthResponse, StatsResponse};
