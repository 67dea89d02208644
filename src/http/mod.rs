//! HTTP Module
//!
//! Request and response abstractions consumed by valves. HTTP parsing
//! itself is left to axum; these types only carry what valves read and write.

mod request;
mod response;

pub use request::PageRequest;
pub use response::{parse_http_date, PageResponse, ResponseCookie, HTTP_DATE_FORMAT};
