/// Rate limiting middleware
///
/// Token bucket rate limiting keyed by client address, kept in process
/// memory. Two limiters run side by side:
///
/// - the global limiter, applied to every route (`RATE_LIMIT_PER_MINUTE`)
/// - the login limiter, applied to `POST /auth/login` only
///   (`LOGIN_RATE_LIMIT_PER_MINUTE`)
///
/// # Algorithm
///
/// - Each client starts with a full bucket of `per_minute` tokens
/// - Tokens refill continuously at `per_minute / 60` per second
/// - Each request consumes 1 token; an empty bucket means `429`
/// - Buckets idle long enough to be full again are pruned
///
/// # Client key
///
/// The peer address, or `"unknown"` when the server runs without connect
/// info. Behind a reverse proxy (`TRUST_PROXY=true`) the right-most
/// `X-Forwarded-For` hop is used, then `X-Real-IP`, then the peer. Hops to
/// the left of it are client-supplied and never trusted.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per minute
/// - `X-RateLimit-Remaining`: Tokens remaining
/// - `X-RateLimit-Reset`: Unix timestamp when the bucket is full again
/// - `Retry-After`: Seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Prune idle buckets once the map grows past this size
const PRUNE_THRESHOLD: usize = 1024;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    /// `n` requests per minute with a burst of `n`
    pub fn per_minute(n: u32) -> Self {
        let n = n.max(1);
        RateLimit {
            requests_per_minute: n,
            refill_rate: n as f64 / 60.0,
            bucket_capacity: n,
        }
    }

    /// Time an empty bucket takes to fill up
    fn full_refill(&self) -> Duration {
        Duration::from_secs_f64(self.bucket_capacity as f64 / self.refill_rate)
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Result of rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds until another request is allowed (0 when `ok`)
    pub retry_after: u64,

    /// Seconds until the bucket is full again
    pub reset_after: u64,
}

/// In-memory token bucket limiter
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Consumes one token for `key`
    pub fn check(&self, key: &str) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        let RateLimit {
            refill_rate,
            bucket_capacity,
            ..
        } = self.limit;

        // A poisoned map only holds counters; keep using it.
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        if buckets.len() >= PRUNE_THRESHOLD {
            let idle = self.limit.full_refill();
            buckets.retain(|_, b| now.saturating_duration_since(b.last_refill) < idle);
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(bucket_capacity, now));
        bucket.refill(refill_rate, bucket_capacity, now);

        let ok = bucket.try_consume(1.0);
        RateLimitResult {
            ok,
            remaining: bucket.tokens.floor().max(0.0) as u32,
            retry_after: if ok {
                0
            } else {
                bucket.seconds_until_available(1.0, refill_rate)
            },
            reset_after: bucket.seconds_until_available(bucket_capacity as f64, refill_rate),
        }
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Rate limit key for a request
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let peer = peer.map(|addr| addr.ip().to_string());
    if !trust_proxy {
        return peer.unwrap_or_else(|| "unknown".to_string());
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

fn request_key(state: &AppState, request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_key(request.headers(), peer, state.config.rate_limit.trust_proxy)
}

async fn enforce(
    limiter: &RateLimiter,
    key: String,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let result = limiter.check(&key);
    let limit = limiter.limit();

    if !result.ok {
        tracing::warn!(client = %key, retry_after = result.retry_after, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;

    let reset_at = chrono::Utc::now().timestamp() + result.reset_after as i64;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit.requests_per_minute));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at));

    Ok(response)
}

/// Global rate limiting layer
///
/// # Errors
///
/// - 429 Too Many Requests: Rate limit exceeded
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = request_key(&state, &request);
    enforce(&state.rate_limiter, key, request, next).await
}

/// Login rate limiting layer, applied to `POST /auth/login`
pub async fn login_rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = request_key(&state, &request);
    enforce(&state.login_limiter, key, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(300);
        assert_eq!(limit.requests_per_minute, 300);
        assert_eq!(limit.bucket_capacity, 300);
        assert_eq!(limit.refill_rate, 5.0);

        assert_eq!(RateLimit::per_minute(0).bucket_capacity, 1);
    }

    #[test]
    fn test_token_bucket_consume() {
        let mut bucket = TokenBucket::new(10, Instant::now());
        assert!(bucket.try_consume(1.0));
        assert_eq!(bucket.tokens, 9.0);
        assert!(bucket.try_consume(5.0));
        assert_eq!(bucket.tokens, 4.0);
        assert!(!bucket.try_consume(10.0));
        assert_eq!(bucket.tokens, 4.0);
    }

    #[test]
    fn test_token_bucket_refill_capped() {
        let start = Instant::now();
        let mut bucket = TokenBucket {
            tokens: 95.0,
            last_refill: start,
        };

        bucket.refill(1.0, 100, start + Duration::from_secs(10));
        assert_eq!(bucket.tokens, 100.0);
    }

    #[test]
    fn test_token_bucket_seconds_until_available() {
        let bucket = TokenBucket {
            tokens: 2.0,
            last_refill: Instant::now(),
        };

        assert_eq!(bucket.seconds_until_available(5.0, 1.0), 3);
        assert_eq!(bucket.seconds_until_available(1.0, 1.0), 0);
    }

    #[test]
    fn test_limiter_blocks_after_burst_and_recovers() {
        let limiter = RateLimiter::new(RateLimit::per_minute(60));
        let start = Instant::now();

        for _ in 0..60 {
            assert!(limiter.check_at("1.2.3.4", start).ok);
        }

        let blocked = limiter.check_at("1.2.3.4", start);
        assert!(!blocked.ok);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.retry_after, 1);

        // Other clients have their own bucket
        assert!(limiter.check_at("5.6.7.8", start).ok);

        assert!(limiter.check_at("1.2.3.4", start + Duration::from_secs(1)).ok);
    }

    #[test]
    fn test_limiter_prunes_idle_buckets() {
        let limiter = RateLimiter::new(RateLimit::per_minute(60));
        let start = Instant::now();

        for i in 0..PRUNE_THRESHOLD {
            limiter.check_at(&format!("client-{}", i), start);
        }
        assert_eq!(limiter.tracked_clients(), PRUNE_THRESHOLD);

        limiter.check_at("late", start + Duration::from_secs(120));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_client_key_ignores_forwarded_headers_by_default() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));

        assert_eq!(client_key(&headers, Some(peer), false), "10.0.0.9");
        assert_eq!(client_key(&headers, None, false), "unknown");
    }

    #[test]
    fn test_client_key_behind_proxy() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, Some(peer), true), "10.0.0.9");

        headers.insert("x-real-ip", HeaderValue::from_static("172.16.0.2"));
        assert_eq!(client_key(&headers, Some(peer), true), "172.16.0.2");

        // Left-most hop is whatever the client sent
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 203.0.113.7"));
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.7");
    }
}
