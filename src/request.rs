//! Incoming HTTP request type.

use bytes::Bytes;

/// An incoming HTTP request with its body already collected.
///
/// Handlers only ever look at the query string and the body; routing and
/// cross-cutting concerns have consumed the rest before the handler runs.
pub struct Request {
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Bytes,
}

impl Request {
    pub(crate) fn new(raw_query: Option<&str>, body: Bytes) -> Self {
        let query = raw_query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { query, body }
    }

    /// Takes ownership of the body, dropping the rest of the request.
    pub fn into_body(self) -> Bytes { self.body }

    /// Returns the first percent-decoded value of a query parameter.
    ///
    /// An empty value (`?id=`) is reported the same as a missing one.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_query(q: &str) -> Request {
        Request::new(Some(q), Bytes::new())
    }

    #[test]
    fn query_is_percent_decoded() {
        let req = with_query("id=a%20b&id=second");
        assert_eq!(req.query("id"), Some("a b"));
    }

    #[test]
    fn empty_query_value_reads_as_missing() {
        assert_eq!(with_query("id=").query("id"), None);
        assert_eq!(with_query("other=1").query("id"), None);
        assert_eq!(Request::new(None, Bytes::new()).query("id"), None);
    }
}
