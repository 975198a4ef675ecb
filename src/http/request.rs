//! Inbound request values.
//!
//! # Responsibilities
//! - Carry the head delivered by the transport (method, target, headers)
//! - Pair it with the assembled body and the bindings of the current layer
//!
//! # Design Decisions
//! - A `Request` is an immutable value; binding parameters derives a new
//!   instance so outer dispatch layers keep their own view
//! - The body is `Bytes`, so deriving a request never copies payload data

use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use bytes::Bytes;
use serde::de::DeserializeOwned;

/// Head of an inbound request as delivered by the transport.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Append a header, skipping names or values that are not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid request header"),
        }
        self
    }
}

/// A complete logical request: head, body and parameter bindings.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
    parameters: HashMap<String, String>,
}

impl Request {
    pub fn new(head: RequestHead, body: impl Into<Bytes>) -> Self {
        Self {
            method: head.method,
            uri: head.uri,
            headers: head.headers,
            body: body.into(),
            parameters: HashMap::new(),
        }
    }

    /// Derive a request carrying `parameters`; `self` is left as it was.
    pub fn with_parameters(&self, parameters: HashMap<String, String>) -> Request {
        Request {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            parameters,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw request target, query included.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup; non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Bound value of `name`, or the empty string when unbound.
    pub fn parameter(&self, name: &str) -> &str {
        self.param(name).unwrap_or_default()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_parameters_leaves_original_untouched() {
        let original = Request::new(RequestHead::new(Method::GET, "/echo/hi"), "");
        let mut bound = HashMap::new();
        bound.insert("word".to_string(), "hi".to_string());

        let derived = original.with_parameters(bound);
        assert_eq!(derived.parameter("word"), "hi");
        assert_eq!(original.parameter("word"), "");
        assert!(original.param("word").is_none());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let head = RequestHead::new(Method::GET, "/").with_header("API-Key", "1234");
        let request = Request::new(head, Bytes::new());
        assert_eq!(request.header("api-key"), Some("1234"));
        assert_eq!(request.header("API-KEY"), Some("1234"));
    }

    #[test]
    fn test_json_body() {
        let request = Request::new(
            RequestHead::new(Method::POST, "/items"),
            r#"{"name":"apple","count":3}"#,
        );
        let value: serde_json::Value = request.json().unwrap();
        assert_eq!(value["count"], 3);
        assert_eq!(request.body_text(), Some(r#"{"name":"apple","count":3}"#));
    }
}
