//! Middleware layer.
//!
//! Cross-cutting request concerns applied by the server around every
//! dispatch, outermost first:
//!
//! ```text
//! trace        one log line per request: method, path, status, latency
//! cors         preflight answers, allow-origin on every other response
//! rate_limit   per-IP token bucket, 429 when empty
//! ```
//!
//! [`strip_trailing_slash`] runs before all of them so `/quote/` is logged
//! and routed as `/quote`.

pub(crate) mod cors;
pub(crate) mod rate_limit;
pub(crate) mod trace;

/// Removes trailing slashes so `/quote/` and `/quote` reach the same route.
/// The root path is left alone.
pub(crate) fn strip_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[cfg(test)]
mod tests {
    use super::strip_trailing_slash;

    #[test]
    fn strips_all_trailing_slashes_but_keeps_root() {
        assert_eq!(strip_trailing_slash("/quote/"), "/quote");
        assert_eq!(strip_trailing_slash("/quote//"), "/quote");
        assert_eq!(strip_trailing_slash("/"), "/");
        assert_eq!(strip_trailing_slash("/quote"), "/quote");
    }
}
