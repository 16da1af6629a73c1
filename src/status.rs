//! HTTP status codes as a typed enum.
//!
//! The façade only ever answers with a handful of codes, so this is the
//! subset of the IANA registry a REST endpoint over live state actually
//! needs. Use [`Status`] anywhere a status code is accepted:
//!
//! ```rust
//! use fascia::{Response, Status};
//!
//! // status-only, no body
//! Response::status(Status::NoContent);
//!
//! // return Status directly from a handler, fascia wraps it
//! async fn delete_token(_req: fascia::Request, _p: fascia::Params) -> Status {
//!     Status::NoContent
//! }
//! ```

/// A standard HTTP status code.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                    // 200
    Created,               // 201
    Accepted,              // 202
    NoContent,             // 204

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    MovedPermanently,      // 301
    Found,                 // 302
    NotModified,           // 304

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,            // 400
    Unauthorized,          // 401
    Forbidden,             // 403
    NotFound,              // 404
    MethodNotAllowed,      // 405
    NotAcceptable,         // 406
    RequestTimeout,        // 408
    Conflict,              // 409
    Gone,                  // 410
    ContentTooLarge,       // 413
    UnsupportedMediaType,  // 415
    UnprocessableContent,  // 422
    TooManyRequests,       // 429

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError,   // 500
    NotImplemented,        // 501
    ServiceUnavailable,    // 503
    GatewayTimeout,        // 504
}

impl Status {
    /// The numeric code.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok                   => 200,
            Self::Created              => 201,
            Self::Accepted             => 202,
            Self::NoContent            => 204,
            Self::MovedPermanently     => 301,
            Self::Found                => 302,
            Self::NotModified          => 304,
            Self::BadRequest           => 400,
            Self::Unauthorized         => 401,
            Self::Forbidden            => 403,
            Self::NotFound             => 404,
            Self::MethodNotAllowed     => 405,
            Self::NotAcceptable        => 406,
            Self::RequestTimeout       => 408,
            Self::Conflict             => 409,
            Self::Gone                 => 410,
            Self::ContentTooLarge      => 413,
            Self::UnsupportedMediaType => 415,
            Self::UnprocessableContent => 422,
            Self::TooManyRequests      => 429,
            Self::InternalServerError  => 500,
            Self::NotImplemented       => 501,
            Self::ServiceUnavailable   => 503,
            Self::GatewayTimeout       => 504,
        }
    }

    /// The canonical reason phrase (RFC 9110 §15).
    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok                   => "OK",
            Self::Created              => "Created",
            Self::Accepted             => "Accepted",
            Self::NoContent            => "No Content",
            Self::MovedPermanently     => "Moved Permanently",
            Self::Found                => "Found",
            Self::NotModified          => "Not Modified",
            Self::BadRequest           => "Bad Request",
            Self::Unauthorized         => "Unauthorized",
            Self::Forbidden            => "Forbidden",
            Self::NotFound             => "Not Found",
            Self::MethodNotAllowed     => "Method Not Allowed",
            Self::NotAcceptable        => "Not Acceptable",
            Self::RequestTimeout       => "Request Timeout",
            Self::Conflict             => "Conflict",
            Self::Gone                 => "Gone",
            Self::ContentTooLarge      => "Content Too Large",
            Self::UnsupportedMediaType => "Unsupported Media Type",
            Self::UnprocessableContent => "Unprocessable Content",
            Self::TooManyRequests      => "Too Many Requests",
            Self::InternalServerError  => "Internal Server Error",
            Self::NotImplemented       => "Not Implemented",
            Self::ServiceUnavailable   => "Service Unavailable",
            Self::GatewayTimeout       => "Gateway Timeout",
        }
    }

    pub fn is_server_error(self) -> bool {
        self.code() >= 500
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.code()
    }
}
