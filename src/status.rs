//! HTTP status codes the service answers with.
//!
//! ```rust
//! use quotes::{Response, Status};
//!
//! Response::status(Status::Ok);
//!
//! Response::builder()
//!     .status(Status::Created)
//!     .json(br#"{"id":"42"}"#.to_vec());
//! ```

/// The status codes this service emits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200
    Created,             // 201
    Accepted,            // 202

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    NotFound,            // 404
    MethodNotAllowed,    // 405
    TooManyRequests,     // 429

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok                  => 200,
            Self::Created             => 201,
            Self::Accepted            => 202,
            Self::BadRequest          => 400,
            Self::NotFound            => 404,
            Self::MethodNotAllowed    => 405,
            Self::TooManyRequests     => 429,
            Self::InternalServerError => 500,
        }
    }

    /// The canonical reason phrase, e.g. `"Not Found"`.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok                  => "OK",
            Self::Created             => "Created",
            Self::Accepted            => "Accepted",
            Self::BadRequest          => "Bad Request",
            Self::NotFound            => "Not Found",
            Self::MethodNotAllowed    => "Method Not Allowed",
            Self::TooManyRequests     => "Too Many Requests",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl From<Status> for http::StatusCode {
    fn from(s: Status) -> http::StatusCode {
        http::StatusCode::from_u16(s.code()).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}
