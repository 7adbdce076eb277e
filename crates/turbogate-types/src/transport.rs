//! Transport-level request and response representations.
//!
//! These are the mutable views of an HTTP exchange that transport plugins
//! operate on before the body is translated into a domain request. Instances
//! are normally handed out by a pool, so both types expose a `reset` that
//! clears every field while keeping allocated capacity.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Initial capacity of header, query and path-param maps on fresh instances
pub const DEFAULT_MAP_CAPACITY: usize = 16;

/// Case-insensitive map lookup: exact key, then lower-cased key, then a full scan
fn lookup<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    if let Some(value) = map.get(key) {
        return Some(value.as_str());
    }

    if key.bytes().any(|b| b.is_ascii_uppercase()) {
        if let Some(value) = map.get(&key.to_ascii_lowercase()) {
            return Some(value.as_str());
        }
    }

    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Remove every entry whose key matches `key` case-insensitively
fn remove_ignore_case(map: &mut HashMap<String, String>, key: &str) -> Option<String> {
    if let Some(value) = map.remove(key) {
        return Some(value);
    }
    let found = map.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned()?;
    map.remove(&found)
}

/// HTTP request as seen by transport plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRequest {
    /// HTTP method (`GET`, `POST`, ...)
    pub method: String,
    /// Request path without the query string
    pub path: String,
    /// Request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Decoded query parameters
    #[serde(default)]
    pub query: HashMap<String, String>,
    /// Parameters captured by the router from the path template
    #[serde(default)]
    pub path_params: HashMap<String, String>,
    /// Raw request body
    #[serde(default)]
    pub body: Vec<u8>,
}

impl TransportRequest {
    /// Create a request with pre-sized maps
    #[must_use]
    pub fn with_capacity(map_capacity: usize) -> Self {
        Self {
            method: String::new(),
            path: String::new(),
            headers: HashMap::with_capacity(map_capacity),
            query: HashMap::with_capacity(map_capacity),
            path_params: HashMap::with_capacity(map_capacity),
            body: Vec::new(),
        }
    }

    /// Create a request for the given method and path
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let mut request = Self::with_capacity(DEFAULT_MAP_CAPACITY);
        request.method = method.into();
        request.path = path.into();
        request
    }

    /// Look up a header, ignoring case
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }

    /// Look up a query parameter, ignoring case
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }

    /// Look up a path parameter, ignoring case
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        lookup(&self.path_params, name)
    }

    /// Set a header, replacing any existing value stored under a differently-cased key
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        remove_ignore_case(&mut self.headers, &name);
        self.headers.insert(name, value.into());
    }

    /// Remove a header, ignoring case
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        remove_ignore_case(&mut self.headers, name)
    }

    /// Whether the `Content-Type` header declares a JSON body
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
    }

    /// Builder-style body setter
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder-style header setter
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Clear every field, keeping allocated capacity
    pub fn reset(&mut self) {
        self.method.clear();
        self.path.clear();
        self.headers.clear();
        self.query.clear();
        self.path_params.clear();
        self.body.clear();
    }
}

/// HTTP response as seen by transport plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResponse {
    /// HTTP status code (0 until something sets it)
    pub status_code: u16,
    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Raw response body
    #[serde(default)]
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Create a response with pre-sized header map
    #[must_use]
    pub fn with_capacity(map_capacity: usize) -> Self {
        Self {
            status_code: 0,
            headers: HashMap::with_capacity(map_capacity),
            body: Vec::new(),
        }
    }

    /// Create a response with the given status
    #[must_use]
    pub fn new(status_code: u16) -> Self {
        let mut response = Self::with_capacity(DEFAULT_MAP_CAPACITY);
        response.status_code = status_code;
        response
    }

    /// Create a JSON response
    #[must_use]
    pub fn json(status_code: u16, body: &Value) -> Self {
        let mut response = Self::new(status_code);
        response.set_json_body(body);
        response
    }

    /// Create a JSON error response of the form `{"error": {"message": ...}}`
    #[must_use]
    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self::json(
            status_code,
            &serde_json::json!({ "error": { "message": message.into() } }),
        )
    }

    /// Look up a header, ignoring case
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }

    /// Set a header, replacing any existing value stored under a differently-cased key
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        remove_ignore_case(&mut self.headers, &name);
        self.headers.insert(name, value.into());
    }

    /// Replace the body with serialized JSON and set the content type
    pub fn set_json_body(&mut self, body: &Value) {
        self.body.clear();
        // Serializing a `Value` into a Vec cannot fail
        let _ = serde_json::to_writer(&mut self.body, body);
        self.set_header("Content-Type", "application/json");
    }

    /// Whether the status code is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Clear every field, keeping allocated capacity
    pub fn reset(&mut self) {
        self.status_code = 0;
        self.headers.clear();
        self.body.clear();
    }
}
