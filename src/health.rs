//! Health check.
//!
//! `GET /` answers `200 healthchecked` as long as the process can serve
//! HTTP at all. It has no dependencies on purpose; storage reachability is
//! verified once at startup with [`QuoteStore::ping`](crate::store::QuoteStore::ping).

use crate::{Request, Response};

pub const HEALTH_MARKER: &str = "healthchecked";

pub async fn healthcheck(_req: Request) -> Response {
    Response::text(HEALTH_MARKER)
}
