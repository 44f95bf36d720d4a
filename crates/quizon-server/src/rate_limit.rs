//! Per-IP request throttling for the public API.
//!
//! Token-bucket per client address: each request costs one token, tokens
//! refill continuously at `rate` per second up to `burst`.  Buckets are
//! dropped lazily once idle.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

const IDLE_PURGE_SECS: f64 = 600.0;

#[derive(Debug)]
struct Bucket {
    available: f64,
    touched: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    rate: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            burst,
        }
    }

    /// Consume one token for `ip`, refilling for the elapsed time first.
    /// Returns `false` when the bucket is empty.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        // Opportunistic cleanup of idle clients.
        buckets.retain(|_, bucket| now.duration_since(bucket.touched).as_secs_f64() < IDLE_PURGE_SECS);

        let bucket = buckets.entry(ip).or_insert(Bucket {
            available: self.burst,
            touched: now,
        });

        let elapsed = now.duration_since(bucket.touched).as_secs_f64();
        bucket.available = (bucket.available + elapsed * self.rate).min(self.burst);
        bucket.touched = now;

        if bucket.available >= 1.0 {
            bucket.available -= 1.0;
            true
        } else {
            false
        }
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ip) = client_ip(&req) {
        if !limiter.allow(ip).await {
            warn!(ip = %ip, "rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(req).await)
}

/// Prefer the first `X-Forwarded-For` hop (the server is expected to sit
/// behind a reverse proxy), falling back to the socket address.
fn client_ip(req: &Request<axum::body::Body>) -> Option<IpAddr> {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip())
}
