//! Per-client request limiting.
//!
//! Each peer IP owns a token bucket that holds `requests` tokens and refills
//! at `requests` per window. A request spends one token; a client with an
//! empty bucket gets `429 Too Many Requests` and a `Retry-After` hint.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::codec;
use crate::response::Response;
use crate::status::Status;

/// Buckets are swept once the map grows past this many clients.
const SWEEP_THRESHOLD: usize = 4096;

/// How many requests one client may make per window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    requests: NonZeroU32,
    window: Duration,
}

impl RateLimit {
    pub const fn per_minute(requests: NonZeroU32) -> Self {
        Self { requests, window: Duration::from_secs(60) }
    }

    pub fn requests(&self) -> u32 {
        self.requests.get()
    }
}

impl Default for RateLimit {
    /// 100 requests per minute.
    fn default() -> Self {
        Self::per_minute(NonZeroU32::MIN.saturating_add(99))
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

impl Bucket {
    fn refilled(&self, now: Instant, capacity: f64, per_sec: f64) -> f64 {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        (self.tokens + elapsed * per_sec).min(capacity)
    }
}

pub(crate) struct RateLimiter {
    limit: RateLimit,
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

impl RateLimiter {
    pub(crate) fn new(limit: RateLimit) -> Self {
        Self { limit, buckets: Mutex::new(HashMap::new()) }
    }

    /// Spends a token for `ip`, or returns how long until one is available.
    pub(crate) fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let capacity = f64::from(self.limit.requests.get());
        let per_sec = capacity / self.limit.window.as_secs_f64();

        let mut buckets = self.buckets.lock();
        if buckets.len() >= SWEEP_THRESHOLD {
            // A full bucket is indistinguishable from a fresh one.
            buckets.retain(|_, b| b.refilled(now, capacity, per_sec) < capacity);
        }

        let bucket = buckets.entry(ip).or_insert(Bucket { tokens: capacity, last: now });
        bucket.tokens = bucket.refilled(now, capacity, per_sec);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - bucket.tokens) / per_sec))
        }
    }
}

/// The `429` answer for a client that ran out of tokens.
pub(crate) fn rejection(peer: SocketAddr, retry_after: Duration) -> Response {
    let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
    warn!(%peer, retry_after_secs = secs, "rate limit exceeded");

    let mut res = codec::envelope(Status::TooManyRequests, "too many requests");
    res.append_header(http::header::RETRY_AFTER.as_str(), secs.to_string());
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn limiter(requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimit::per_minute(NonZeroU32::new(requests).unwrap()))
    }

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn default_is_one_hundred_per_minute() {
        assert_eq!(RateLimit::default().requests(), 100);
    }

    #[test]
    fn burst_is_capped_and_clients_are_independent() {
        let limiter = limiter(3);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at(A, now).is_ok());
        }
        let wait = limiter.check_at(A, now).unwrap_err();
        assert!(wait > Duration::from_secs(19) && wait < Duration::from_secs(21));
        assert!(limiter.check_at(B, now).is_ok());
    }

    #[test]
    fn tokens_come_back_over_the_window() {
        let limiter = limiter(60);
        let start = Instant::now();
        for _ in 0..60 {
            assert!(limiter.check_at(A, start).is_ok());
        }
        assert!(limiter.check_at(A, start).is_err());
        assert!(limiter.check_at(A, start + Duration::from_millis(1100)).is_ok());
    }

    #[test]
    fn rejection_uses_the_error_envelope() {
        let res = rejection("127.0.0.1:9".parse().unwrap(), Duration::from_millis(300));
        assert_eq!(res.status_code(), Status::TooManyRequests);
        assert_eq!(res.header("retry-after"), Some("1"));
        let body: codec::ErrorBody = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.error, "too many requests");
    }
}
