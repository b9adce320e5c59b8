//! Cross-origin resource sharing.
//!
//! Any `http://` or `https://` origin may call the API. Preflights are
//! answered here and never reach the router; every other response gets the
//! allow headers when the request came from an allowed origin.
//!
//! A refused preflight is still a bare `200`, only without allow headers.
//! The browser treats that as a refusal.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use http::HeaderMap;

use crate::response::Response;
use crate::status::Status;

const ALLOWED_METHODS: [&str; 6] = ["GET", "POST", "PUT", "DELETE", "OPTIONS", "PATCH"];

/// Lowercase. `origin` is always allowed on top of these.
const ALLOWED_HEADERS: [&str; 4] = ["accept", "authorization", "content-type", "x-csrf-token"];

const EXPOSED_HEADERS: &str = "Link";

/// Seconds a browser may cache a preflight answer.
const MAX_AGE_SECS: &str = "300";

pub(crate) fn is_preflight(method: &http::Method, headers: &HeaderMap) -> bool {
    method == http::Method::OPTIONS
        && headers.contains_key(ORIGIN)
        && headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

pub(crate) fn preflight(headers: &HeaderMap) -> Response {
    let mut res = Response::status(Status::Ok);
    res.append_header(VARY.as_str(), "Origin, Access-Control-Request-Method, Access-Control-Request-Headers");

    let Some(origin) = allowed_origin(headers) else {
        return res;
    };
    let Some(method) = header(headers, &ACCESS_CONTROL_REQUEST_METHOD)
        .map(str::to_ascii_uppercase)
        .filter(|m| ALLOWED_METHODS.contains(&m.as_str()))
    else {
        return res;
    };

    let requested: Vec<String> = header(headers, &ACCESS_CONTROL_REQUEST_HEADERS)
        .unwrap_or_default()
        .split(',')
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect();
    if !requested.iter().all(|h| h == "origin" || ALLOWED_HEADERS.contains(&h.as_str())) {
        return res;
    }

    res.append_header(ACCESS_CONTROL_ALLOW_ORIGIN.as_str(), origin);
    res.append_header(ACCESS_CONTROL_ALLOW_METHODS.as_str(), method);
    if !requested.is_empty() {
        res.append_header(ACCESS_CONTROL_ALLOW_HEADERS.as_str(), requested.join(", "));
    }
    res.append_header(ACCESS_CONTROL_MAX_AGE.as_str(), MAX_AGE_SECS);
    res
}

/// Adds the allow headers to an ordinary response.
pub(crate) fn decorate(method: &http::Method, headers: &HeaderMap, res: &mut Response) {
    res.append_header(VARY.as_str(), "Origin");

    let Some(origin) = allowed_origin(headers) else {
        return;
    };
    if !ALLOWED_METHODS.contains(&method.as_str()) {
        return;
    }
    res.append_header(ACCESS_CONTROL_ALLOW_ORIGIN.as_str(), origin);
    res.append_header(ACCESS_CONTROL_EXPOSE_HEADERS.as_str(), EXPOSED_HEADERS);
}

fn allowed_origin(headers: &HeaderMap) -> Option<&str> {
    header(headers, &ORIGIN).filter(|origin| {
        let origin = origin.to_ascii_lowercase();
        origin.starts_with("http://") || origin.starts_with("https://")
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &http::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
