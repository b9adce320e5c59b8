//! Per-request access log.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use tracing::{info, warn};

use crate::response::Response;

/// Awaits `fut` and logs the completed request once.
///
/// Server errors log at `warn`, everything else at `info`. The handler that
/// produced a 5xx has already logged the underlying cause.
pub(crate) async fn trace<F>(method: &http::Method, path: &str, peer: SocketAddr, fut: F) -> Response
where
    F: Future<Output = Response>,
{
    let started = Instant::now();
    let res = fut.await;
    let status = res.status_code().code();
    let latency_us = started.elapsed().as_micros() as u64;

    if status >= 500 {
        warn!(%method, path, %peer, status, latency_us, "request failed");
    } else {
        info!(%method, path, %peer, status, latency_us, "request");
    }
    res
}
