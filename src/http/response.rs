//! Outbound response abstraction mutated by valves.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{PipelineError, Result};

/// Format of HTTP dates (`Expires`, `Last-Modified`).
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

// == Response Cookie ==
/// A cookie set on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    /// Max-Age in seconds
    pub max_age: Option<i64>,
    pub http_only: bool,
}

impl ResponseCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
            http_only: false,
        }
    }

    /// Renders the `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut value = format!("{}={}", self.name, self.value);
        if let Some(path) = &self.path {
            value.push_str("; Path=");
            value.push_str(path);
        }
        if let Some(max_age) = self.max_age {
            value.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.http_only {
            value.push_str("; HttpOnly");
        }
        value
    }
}

// == Page Response ==
/// Mutable response under construction by the valve chain.
#[derive(Debug, Clone)]
pub struct PageResponse {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<ResponseCookie>,
    body: Bytes,
}

impl Default for PageResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
        }
    }
}

impl PageResponse {
    pub fn new() -> Self {
        Self::default()
    }

    // == Status ==
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    // == Headers ==
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of header `name` as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Replaces all values of header `name`.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Appends a value to header `name`.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Sets header `name` to `date` formatted as an HTTP date.
    pub fn set_date_header(&mut self, name: &str, date: DateTime<Utc>) -> Result<()> {
        self.set_header(name, &date.format(HTTP_DATE_FORMAT).to_string())
    }

    // == Cookies ==
    pub fn add_cookie(&mut self, cookie: ResponseCookie) {
        self.cookies.push(cookie);
    }

    pub fn cookies(&self) -> &[ResponseCookie] {
        &self.cookies
    }

    // == Body ==
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    // == Bulk Replacement ==
    /// Overwrites every part of the response.
    pub fn replace(
        &mut self,
        status: StatusCode,
        headers: HeaderMap,
        cookies: Vec<ResponseCookie>,
        body: Bytes,
    ) {
        self.status = status;
        self.headers = headers;
        self.cookies = cookies;
        self.body = body;
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| PipelineError::Render(format!("invalid header name: {}", name)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| PipelineError::Render(format!("invalid value for header {}", name)))?;
    Ok((header_name, header_value))
}

/// Parses an HTTP date such as `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

// == IntoResponse Implementation ==
impl IntoResponse for PageResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        for cookie in &self.cookies {
            if let Ok(value) = HeaderValue::from_str(&cookie.to_header_value()) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }

        response
    }
}
