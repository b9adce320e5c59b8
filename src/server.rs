//! HTTP server: accept loop, connection tasks, request dispatch.
//!
//! # Request path
//!
//! ```text
//! strip trailing slash → trace → CORS preflight? → rate limit → route → handler
//!                                                                ↓
//!                                      CORS headers added on the way out
//! ```
//!
//! # Shutdown
//!
//! On a termination signal the server:
//! 1. Stops calling `listener.accept()` and drops the listener, so new
//!    connections are refused.
//! 2. Tells every live connection to finish its current request and close.
//!    Idle keep-alive connections close at once.
//! 3. Waits up to the grace period (30 s by default) for the connection
//!    tasks, then aborts whatever is left.
//!
//! [`Server::serve`] reports which of the last two happened as an
//! [`Outcome`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::codec;
use crate::error::Error;
use crate::lifecycle::{self, Outcome, Phase, Signals, DEFAULT_GRACE_PERIOD};
use crate::middleware::rate_limit::{self, RateLimit, RateLimiter};
use crate::middleware::{self, cors};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Route, Router};
use crate::status::Status;

/// The HTTP server, already bound to its address.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    grace_period: Duration,
    rate_limit: Option<RateLimit>,
}

/// What every connection task shares.
struct App {
    router: Router,
    limiter: Option<RateLimiter>,
}

impl Server {
    /// Binds the listening socket. Failing to bind is fatal for the process,
    /// so it is reported here rather than when serving starts.
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), quotes::Error> {
    /// let server = quotes::Server::bind("0.0.0.0:3000").await?;
    /// # Ok(()) }
    /// ```
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!(phase = %Phase::Starting, %addr, "listener bound");
        Ok(Self {
            listener,
            addr,
            grace_period: DEFAULT_GRACE_PERIOD,
            rate_limit: Some(RateLimit::default()),
        })
    }

    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// How long in-flight requests may run after shutdown starts.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Per-client request limit, 100 per minute unless changed. `None`
    /// turns limiting off.
    pub fn rate_limit(mut self, rate_limit: Option<RateLimit>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Serves `router` until SIGHUP, SIGINT, SIGTERM or SIGQUIT, then drains.
    pub async fn serve(self, router: Router) -> Result<Outcome, Error> {
        let mut signals = Signals::install()?;
        let shutdown = async move {
            let name = signals.recv().await;
            info!(signal = name, "termination signal received");
        };
        Ok(self.serve_with_shutdown(router, shutdown).await)
    }

    /// Serves `router` until `shutdown` resolves, then drains.
    pub async fn serve_with_shutdown<F>(self, router: Router, shutdown: F) -> Outcome
    where
        F: Future<Output = ()>,
    {
        let Self { listener, addr, grace_period, rate_limit } = self;

        // One routing table and one set of rate-limit buckets, shared by
        // every connection task through the Arc.
        let app = Arc::new(App {
            router,
            limiter: rate_limit.map(RateLimiter::new),
        });

        // Every live connection holds a receiver; a send asks them all to wind down.
        let (drain_tx, drain_rx) = watch::channel(());

        // Tracks every connection task so draining can wait on, or abort,
        // whatever is still running.
        let mut tasks = JoinSet::new();

        // `select!` polls `shutdown` by reference on every iteration, which
        // requires it to stay put in memory; `tokio::pin!` pins it on the stack.
        tokio::pin!(shutdown);
        info!(phase = %Phase::Serving, %addr, "accepting connections");

        loop {
            tokio::select! {
                // Arms are polled top to bottom instead of at random. With
                // shutdown first, a pending signal wins over a queued
                // connection, so nothing is admitted after it fires.
                biased;

                () = &mut shutdown => break,

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    let app = Arc::clone(&app);
                    let draining = drain_rx.clone();
                    tasks.spawn(serve_connection(stream, peer, app, draining));
                }

                // Reap finished connections so the set only holds live ones.
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("connection task failed: {e}");
                    }
                }
            }
        }

        drop(listener);
        info!(
            phase = %Phase::Draining,
            in_flight = tasks.len(),
            grace_ms = grace_period.as_millis() as u64,
            "stopped accepting, draining connections"
        );
        // `drain_rx` is still alive, so the send cannot fail.
        let _ = drain_tx.send(());

        lifecycle::drain(&mut tasks, grace_period).await
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    app: Arc<App>,
    mut draining: watch::Receiver<()>,
) {
    // Called once per request on this connection, so keep-alive clients
    // reuse the same task.
    let svc = service_fn(move |req| {
        let app = Arc::clone(&app);
        async move { dispatch(app, req, peer).await }
    });

    // The auto builder speaks HTTP/1.1 or HTTP/2, whichever the client
    // opens with. `TokioIo` bridges tokio's IO traits to hyper's.
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    // `graceful_shutdown` lets the request in progress finish, then closes.
    // An idle keep-alive connection closes right away.
    let mut notified = false;
    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    debug!(%peer, "connection closed with error: {e}");
                }
                break;
            }
            _ = draining.changed(), if !notified => {
                notified = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response. Every failure becomes a
/// response, so hyper never sees an error.
async fn dispatch(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let path = middleware::strip_trailing_slash(parts.uri.path()).to_owned();

    let response = middleware::trace::trace(
        &parts.method,
        &path,
        peer,
        handle(&app, &parts, &path, peer, body),
    )
    .await;

    Ok(response.into_inner())
}

async fn handle(
    app: &App,
    parts: &http::request::Parts,
    path: &str,
    peer: SocketAddr,
    body: Incoming,
) -> Response {
    // Preflights are answered before the limiter and the router.
    if cors::is_preflight(&parts.method, &parts.headers) {
        return cors::preflight(&parts.headers);
    }

    let limited = app.limiter.as_ref().and_then(|limiter| limiter.check(peer.ip()).err());
    let mut res = match limited {
        Some(retry_after) => rate_limit::rejection(peer, retry_after),
        None => route(&app.router, parts, path, body).await,
    };
    cors::decorate(&parts.method, &parts.headers, &mut res);
    res
}

async fn route(router: &Router, parts: &http::request::Parts, path: &str, body: Incoming) -> Response {
    let handler = match router.lookup(&parts.method, path) {
        Route::Found(handler) => handler,
        Route::MethodNotAllowed => return codec::envelope(Status::MethodNotAllowed, "method not allowed"),
        Route::NotFound => return codec::envelope(Status::NotFound, "not found"),
    };

    // The body is only read once a handler is known to want it.
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return codec::write_error(&e, Status::BadRequest, "could not read request body"),
    };

    handler.call(Request::new(parts.uri.query(), body)).await
}
