//! Inbound request abstraction handed to valves.

use axum::http::{header, request::Parts, HeaderMap, Method};
use url::form_urlencoded;

// == Page Request ==
/// Read-only view of an inbound request.
#[derive(Debug, Clone)]
pub struct PageRequest {
    method: Method,
    scheme: String,
    host: String,
    port: u16,
    context_path: String,
    path_info: String,
    query: Option<String>,
    query_params: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
}

impl PageRequest {
    // == Constructors ==
    /// Creates a request for `path` on `localhost:80` with no headers.
    pub fn new(method: Method, path: &str) -> Self {
        let (path, query) = split_path_and_query(path);
        Self {
            method,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 80,
            context_path: String::new(),
            path_info: normalize_path(path),
            query_params: query.map(parse_query).unwrap_or_default(),
            query: query.map(str::to_string),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
        }
    }

    /// Shorthand for a GET request.
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// Builds a request from axum request parts.
    ///
    /// The scheme comes from `X-Forwarded-Proto` (default `http`), host and
    /// port from the `Host` header, and `context_path` is stripped from the
    /// front of the path to form the path info.
    pub fn from_parts(parts: &Parts, context_path: &str) -> Self {
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "http".to_string());

        let authority = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());
        let (host, port) = split_host_and_port(&authority, &scheme);

        let path = parts.uri.path();
        let context_path = context_path.trim_end_matches('/');
        let path_info = match path.strip_prefix(context_path) {
            Some(rest) if !context_path.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                rest
            }
            _ => path,
        };

        let query = parts.uri.query();
        let cookies = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .collect();

        Self {
            method: parts.method.clone(),
            scheme,
            host,
            port,
            context_path: context_path.to_string(),
            path_info: normalize_path(path_info),
            query_params: query.map(parse_query).unwrap_or_default(),
            query: query.map(str::to_string),
            headers: parts.headers.clone(),
            cookies,
        }
    }

    // == Builder Helpers ==
    pub fn with_host(mut self, host: &str, port: u16) -> Self {
        self.host = host.to_ascii_lowercase();
        self.port = port;
        self
    }

    /// Adds a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(name.as_bytes()),
            header::HeaderValue::from_str(value),
        ) {
            if name == header::COOKIE {
                self.cookies.extend(parse_cookie_header(value.to_str().unwrap_or("")));
            }
            self.headers.append(name, value);
        }
        self
    }

    // == Accessors ==
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// Path below the context path, always starting with `/`.
    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    /// Raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// First value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of header `name` as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }
}

// == Parsing Helpers ==
fn split_path_and_query(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn split_host_and_port(authority: &str, scheme: &str) -> (String, u16) {
    let default_port = if scheme == "https" { 443 } else { 80 };
    let split = if authority.starts_with('[') {
        authority
            .split_once("]:")
            .map(|(host, port)| (&authority[..host.len() + 1], port))
    } else {
        authority.rsplit_once(':')
    };
    match split.and_then(|(host, port)| port.parse().ok().map(|port| (host, port))) {
        Some((host, port)) => (host.to_ascii_lowercase(), port),
        None => (authority.to_ascii_lowercase(), default_port),
    }
}

/// Decodes `application/x-www-form-urlencoded` pairs (`%XX` and `+`).
fn parse_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_new_splits_query() {
        let request = PageRequest::get("/news?page=2&sort");
        assert_eq!(request.path_info(), "/news");
        assert_eq!(request.query(), Some("page=2&sort"));
        assert_eq!(request.query_param("page"), Some("2"));
        assert_eq!(request.query_param("sort"), Some(""));
    }

    #[test]
    fn test_query_params_are_decoded() {
        let request = PageRequest::get("/search?q=hello%20world&tag=a+b&empty=&&x=%2B1");
        assert_eq!(request.query(), Some("q=hello%20world&tag=a+b&empty=&&x=%2B1"));
        assert_eq!(request.query_param("q"), Some("hello world"));
        assert_eq!(request.query_param("tag"), Some("a b"));
        assert_eq!(request.query_param("empty"), Some(""));
        assert_eq!(request.query_param("x"), Some("+1"));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn test_from_parts_reads_host_and_port() {
        let request = Request::builder()
            .uri("/site/about?lang=en")
            .header("Host", "Example.org:8080")
            .header("Cookie", "session=abc; theme=dark")
            .body(())
            .unwrap();

        let request = PageRequest::from_parts(&parts(request), "/site");

        assert_eq!(request.scheme(), "http");
        assert_eq!(request.host(), "example.org");
        assert_eq!(request.port(), 8080);
        assert_eq!(request.context_path(), "/site");
        assert_eq!(request.path_info(), "/about");
        assert_eq!(request.query_param("lang"), Some("en"));
        assert_eq!(request.cookie("theme"), Some("dark"));
    }

    #[test]
    fn test_from_parts_forwarded_https_defaults_port() {
        let request = Request::builder()
            .uri("/")
            .header("Host", "example.org")
            .header("X-Forwarded-Proto", "HTTPS")
            .body(())
            .unwrap();

        let request = PageRequest::from_parts(&parts(request), "");

        assert_eq!(request.scheme(), "https");
        assert_eq!(request.port(), 443);
        assert_eq!(request.path_info(), "/");
    }

    #[test]
    fn test_context_path_root_maps_to_slash() {
        let request = Request::builder().uri("/site").body(()).unwrap();
        let request = PageRequest::from_parts(&parts(request), "/site/");
        assert_eq!(request.path_info(), "/");
    }

    #[test]
    fn test_context_path_requires_segment_boundary() {
        let request = Request::builder().uri("/sitemap.xml").body(()).unwrap();
        let request = PageRequest::from_parts(&parts(request), "/site");
        assert_eq!(request.path_info(), "/sitemap.xml");
    }

    #[test]
    fn test_ipv6_host_with_port() {
        let request = Request::builder()
            .uri("/")
            .header("Host", "[::1]:9000")
            .body(())
            .unwrap();
        let request = PageRequest::from_parts(&parts(request), "");
        assert_eq!(request.host(), "[::1]");
        assert_eq!(request.port(), 9000);
    }

    #[test]
    fn test_with_header_collects_cookies() {
        let request = PageRequest::get("/").with_header("Cookie", "a=1");
        assert_eq!(request.cookie("a"), Some("1"));
        assert_eq!(request.header("cookie"), Some("a=1"));
    }
}
