//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! A response is a status code plus either no body, a raw body with an
//! explicit content type, or JSON. Build one in a handler and return it, or
//! return anything that implements [`IntoResponse`].

use bytes::Bytes;
use http_body_util::Full;
use serde::Serialize;
use tracing::error;

use crate::status::Status;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use fascia::{Response, Status};
///
/// Response::json(br#"{"speed":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(Status::NoContent);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use fascia::{Response, Status};
///
/// Response::builder()
///     .status(Status::Created)
///     .header("location", "/api/by-path/~/tabletop!t1")
///     .json(br#"{"id":"t1"}"#.to_vec());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: u16,
}

impl Response {
    /// `200 OK` with `application/json` bytes from a serializer.
    pub fn json(body: Vec<u8>) -> Self {
        Self::bytes_raw("application/json", body)
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes_raw("text/plain; charset=utf-8", body.into().into_bytes())
    }

    /// Response with no body.
    pub fn status(code: Status) -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: code.into() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: Status::Ok.into() }
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Appends a header, keeping any already present.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    fn bytes_raw(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            body,
            headers: vec![("content-type".to_owned(), content_type.to_owned())],
            status: Status::Ok.into(),
        }
    }

    /// Converts into the hyper response the server writes to the wire.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Full::new(Bytes::from(self.body))).unwrap_or_else(|e| {
            error!("invalid response: {e}");
            let mut fallback = http::Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `Status::Ok` (200).
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: Status) -> Self {
        self.status = code.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish(ContentType::Json.as_str(), body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text.as_str(), body.into().into_bytes())
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.finish(content_type.as_str(), body)
    }

    /// Terminate with no body (e.g. `Status::NoContent`).
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── Json ──────────────────────────────────────────────────────────────────────

/// Serializes its contents as the response body.
///
/// ```rust
/// use fascia::{Json, Params, Request};
/// use serde_json::json;
///
/// async fn get_speed(_req: Request, _p: Params) -> Json<serde_json::Value> {
///     Json(json!({ "speed": 1.0 }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => Response::json(bytes),
            Err(e) => {
                error!("failed to serialize response body: {e}");
                Response::status(Status::InternalServerError)
            }
        }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implemented for the usual handler return types. `Result<T, ApiError>`
/// is the common one: the error side becomes a JSON error payload.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a [`Status`] directly from a handler: `return Status::NoContent`
impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::status(self) }
}

impl IntoResponse for () {
    fn into_response(self) -> Response { Response::status(Status::Ok) }
}

/// Override the status of any response: `(Status::Created, Json(body))`.
impl<T: IntoResponse> IntoResponse for (Status, T) {
    fn into_response(self) -> Response {
        let mut res = self.1.into_response();
        res.status = self.0.into();
        res
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_wrapper_sets_content_type() {
        let res = Json(json!({ "open": false })).into_response();
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.header("Content-Type"), Some("application/json"));
        assert_eq!(res.body(), br#"{"open":false}"#);
    }

    #[test]
    fn tuple_overrides_status() {
        let res = (Status::Created, Json(json!([]))).into_response();
        assert_eq!(res.status_code(), 201);
        assert_eq!(res.body(), b"[]");
    }

    #[test]
    fn unit_is_empty_ok() {
        let res = ().into_response();
        assert_eq!(res.status_code(), 200);
        assert!(res.body().is_empty());
    }

    #[test]
    fn builder_keeps_custom_headers_after_content_type() {
        let res = Response::builder()
            .status(Status::Created)
            .header("location", "/api/things/42")
            .text("made");
        assert_eq!(res.status_code(), 201);
        assert_eq!(res.headers()[0].0, "content-type");
        assert_eq!(res.header("location"), Some("/api/things/42"));
    }

    #[test]
    fn converts_to_hyper_response() {
        let inner = Response::status(Status::NoContent)
            .with_header("access-control-allow-origin", "*")
            .into_inner();
        assert_eq!(inner.status(), http::StatusCode::NO_CONTENT);
        assert_eq!(inner.headers()["access-control-allow-origin"], "*");
    }
}
