//! Request and response model.
//!
//! These are the values the controller reasons about: what the page asked
//! for, and what goes back to it. Header names are always stored lowercase.

use std::collections::BTreeMap;

use bytes::Bytes;
use url::Url;

/// The fetch mode reported by the page for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

impl RequestMode {
    /// Parse the mode string used by the page (`navigate`, `same-origin`, ...).
    ///
    /// Unknown strings fall back to `SameOrigin`.
    pub fn parse(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "navigate" => Self::Navigate,
            "cors" => Self::Cors,
            "no-cors" => Self::NoCors,
            _ => Self::SameOrigin,
        }
    }
}

/// An outgoing request from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: BTreeMap<String, String>,
}

impl Request {
    /// Create a request with an explicit method.
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, mode: RequestMode::default(), headers: BTreeMap::new() }
    }

    /// Plain subresource GET.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Top-level page load as the browser issues it.
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_header("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Whether the page says it will accept an HTML document.
    pub fn accepts_html(&self) -> bool {
        self.header("accept").is_some_and(|accept| accept.contains("text/html"))
    }
}

/// A response snapshot: status, headers, body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    /// Bodyless response with the given status.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    /// The value surfaced when a fetch rejects and nothing can stand in for it.
    pub fn network_error() -> Self {
        Self::empty(0)
    }

    /// JSON document with the given status.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    /// HTML document with the given status.
    pub fn html(status: u16, document: String) -> Self {
        Self::new(status, document).with_header("content-type", "text/html; charset=utf-8")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Only a plain 200 counts as storable.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_network_error(&self) -> bool {
        self.status == 0
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_request_mode_parse() {
        assert_eq!(RequestMode::parse("navigate"), RequestMode::Navigate);
        assert_eq!(RequestMode::parse("NO-CORS"), RequestMode::NoCors);
        assert_eq!(RequestMode::parse("cors"), RequestMode::Cors);
        assert_eq!(RequestMode::parse("whatever"), RequestMode::SameOrigin);
    }

    #[test]
    fn test_navigate_request_accepts_html() {
        let req = Request::navigate(url("https://app.test/schedule"));
        assert!(req.is_get());
        assert_eq!(req.mode, RequestMode::Navigate);
        assert!(req.accepts_html());
    }

    #[test]
    fn test_method_is_uppercased() {
        let req = Request::new("post", url("https://app.test/api/x"));
        assert_eq!(req.method, "POST");
        assert!(!req.is_get());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = Request::get(url("https://app.test/")).with_header("Accept", "application/json");
        assert_eq!(req.header("ACCEPT"), Some("application/json"));
        assert!(!req.accepts_html());
    }

    #[test]
    fn test_response_helpers() {
        let ok = Response::new(200, "hello");
        assert!(ok.is_ok());
        assert!(!Response::empty(204).is_ok());
        assert!(Response::network_error().is_network_error());

        let json = Response::json(503, &serde_json::json!({ "error": "x" }));
        assert_eq!(json.content_type(), Some("application/json"));
        assert_eq!(json.status, 503);
    }
}
