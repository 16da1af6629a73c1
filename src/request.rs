//! Incoming HTTP request type.
//!
//! The listener hands the façade an already-parsed request: method string,
//! path as received (still percent-encoded, decoded per segment during
//! matching), query pairs, headers and raw body bytes. Captured path
//! parameters travel separately as [`Params`](crate::Params).

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// An incoming HTTP request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) query: HashMap<String, String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a query-string parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Deserializes the body as JSON.
    ///
    /// An empty body is malformed: handlers only call this when they require
    /// a payload.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(ApiError::MalformedBody)
    }

    /// Parses the body as an untyped JSON value.
    pub fn json_value(&self) -> Result<serde_json::Value, ApiError> {
        self.json()
    }

    /// Parses the body as a JSON object, rejecting arrays and scalars.
    pub fn json_object(&self) -> Result<serde_json::Map<String, serde_json::Value>, ApiError> {
        match self.json_value()? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(ApiError::bad_request("request body must be a JSON object")),
        }
    }
}
