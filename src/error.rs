//! Error types.
//!
//! Three families, one per phase of the process:
//!
//! - [`Error`]: infrastructure (binding a port, reading the config file).
//! - [`RegistrationError`]: startup configuration. A route or strategy that
//!   cannot be built stops the process before any request is served.
//! - [`ApiError`]: one failed request. Converts into a JSON error response
//!   whose status conveys the error class.

use serde::Serialize;
use tracing::{debug, error};

use crate::response::{IntoResponse, Json, Response};
use crate::status::Status;
use crate::translate::{Rejection, TranslateError};

/// Infrastructure failures surfaced by [`Server`](crate::Server) and
/// [`Config`](crate::Config).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid listen address `{addr}`: {source}")]
    ListenAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// A route or strategy declaration that cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("pattern `{pattern}` has a capture segment with no name")]
    EmptyCaptureName { pattern: String },

    #[error("pattern `{pattern}`: rest capture `**{name}` must be the final segment")]
    RestNotLast { pattern: String, name: String },

    #[error("pattern `{pattern}` captures `{name}` more than once")]
    DuplicateCapture { pattern: String, name: String },

    #[error("route `{route}` binds parameter `{param}` which its pattern does not capture")]
    UnboundParameter { route: String, param: String },

    #[error("strategy for {kind} declares {role} `{property}` twice")]
    DuplicateProperty {
        kind: String,
        property: &'static str,
        role: &'static str,
    },
}

/// A request failure. The variant picks the status class.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("malformed request body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error("{0}")]
    Conflict(String),

    #[error("method `{0}` is not allowed")]
    MethodNotAllowed(String),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_)         => Status::NotFound,
            Self::BadRequest(_)       => Status::BadRequest,
            Self::MalformedBody(_)    => Status::BadRequest,
            Self::Conflict(_)         => Status::Conflict,
            Self::MethodNotAllowed(_) => Status::MethodNotAllowed,
            Self::Internal(_)         => Status::InternalServerError,
            Self::Translate(e) => match e {
                TranslateError::UnknownProperty { .. }
                | TranslateError::InvalidValue { .. } => Status::BadRequest,
                TranslateError::Rejected { source, .. } => match source.kind() {
                    Rejection::Invalid  => Status::BadRequest,
                    Rejection::Conflict => Status::Conflict,
                },
                TranslateError::Projection { .. }
                | TranslateError::Serialize { .. } => Status::InternalServerError,
            },
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.code(), "request failed: {self}");
        } else {
            debug!(status = status.code(), "request rejected: {self}");
        }
        (status, Json(ErrorBody { message: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::SetError;

    #[test]
    fn status_follows_error_class() {
        assert_eq!(ApiError::not_found("x").status(), Status::NotFound);
        assert_eq!(ApiError::conflict("x").status(), Status::Conflict);
        assert_eq!(ApiError::internal("x").status(), Status::InternalServerError);

        let malformed = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        assert_eq!(ApiError::MalformedBody(malformed).status(), Status::BadRequest);
    }

    #[test]
    fn setter_rejection_keeps_strategy_judgement() {
        let conflict: ApiError = TranslateError::Rejected {
            property: "recipeId".into(),
            source: SetError::conflict("situation is running"),
        }
        .into();
        assert_eq!(conflict.status(), Status::Conflict);

        let invalid: ApiError = TranslateError::Rejected {
            property: "recipeId".into(),
            source: SetError::invalid("no such recipe"),
        }
        .into();
        assert_eq!(invalid.status(), Status::BadRequest);
        assert!(invalid.to_string().contains("recipeId"));
    }

    #[test]
    fn error_response_carries_message() {
        let res = ApiError::bad_request("quantity must be greater than 0").into_response();
        assert_eq!(res.status_code(), 400);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["message"], "quantity must be greater than 0");
    }
}
