//! JSON in, JSON out, and the error envelope.
//!
//! Every client-visible failure goes through [`write_error`]: the full error
//! chain is logged, the client gets `{"error": "<message>"}` where the
//! message is chosen by the caller and never derived from the error itself.

use std::error::Error as StdError;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::response::Response;
use crate::status::Status;

/// The body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Parses the first JSON value of a request body into `T`.
///
/// Anything after that value is ignored. Takes the body by value, so it is
/// released on every return path.
pub fn decode<T: DeserializeOwned>(body: Bytes) -> Result<T, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_slice(&body);
    T::deserialize(&mut de)
}

/// Serializes `value` as an `application/json` response with `status`.
///
/// A value that fails to serialize is a defect in this crate; it becomes a
/// redacted 500.
pub fn encode<T: Serialize + ?Sized>(value: &T, status: Status) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => Response::builder().status(status).json(body),
        Err(e) => write_error(&e, Status::InternalServerError, "the developer messed up"),
    }
}

/// Logs `err` with its source chain, then answers with only `message`.
pub fn write_error(err: &(dyn StdError + 'static), status: Status, message: &str) -> Response {
    error!(
        status = status.code(),
        reason = status.reason(),
        error = %err,
        cause = %chain(err),
        "{message}"
    );
    envelope(status, message)
}

/// An error envelope with nothing to log (routing misses and the like).
pub(crate) fn envelope(status: Status, message: &str) -> Response {
    let body = ErrorBody { error: message.to_owned() };
    // A struct holding one String always serializes.
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    Response::builder().status(status).json(bytes)
}

fn chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = Vec::new();
    let mut next = err.source();
    while let Some(e) = next {
        out.push(e.to_string());
        next = e.source();
    }
    out.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::NewQuote;

    #[test]
    fn decode_rejects_malformed_and_ill_shaped_bodies() {
        assert!(decode::<NewQuote>(Bytes::from_static(b"{not json")).is_err());
        assert!(decode::<NewQuote>(Bytes::from_static(b"[1,2]")).is_err());
        assert!(decode::<NewQuote>(Bytes::new()).is_err());
        let ok: NewQuote = decode(Bytes::from_static(br#"{"book":"b","quote":"q"}"#)).unwrap();
        assert_eq!(ok.quote, "q");
    }

    #[test]
    fn decode_stops_after_the_first_value() {
        let ok: NewQuote = decode(Bytes::from_static(br#"{"book":"b","quote":"q"} {"book":"x"}"#)).unwrap();
        assert_eq!(ok.book, "b");
        let ok: NewQuote = decode(Bytes::from_static(b"{\"quote\":\"q\"}\ntrailing")).unwrap();
        assert_eq!(ok.quote, "q");
    }

    #[test]
    fn encode_sets_status_and_json_content_type() {
        let res = encode(&vec![1, 2, 3], Status::Accepted);
        assert_eq!(res.status_code(), Status::Accepted);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body(), b"[1,2,3]");
    }

    #[test]
    fn write_error_never_echoes_the_error_text() {
        let err = std::io::Error::other("relation \"quote\" does not exist");
        let res = write_error(&err, Status::InternalServerError, "could not retrieve quotes");
        let body: ErrorBody = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.error, "could not retrieve quotes");
        assert!(!String::from_utf8_lossy(res.body()).contains("relation"));
    }
}
