//! Rate limiting for the credential endpoints
//!
//! Login, registration, and token refresh are limited per client with a
//! token bucket: the bucket holds `requests_per_minute` tokens, refills
//! continuously, and each request takes one. An empty bucket answers
//! `429 Too Many Requests` with `Retry-After`.
//!
//! Buckets live in process by default. With `REDIS_URL` set they live in
//! Redis (key `medemede:ratelimit:auth:{client}`, two minute TTL) so several
//! API instances share them; if Redis errors the in-process bucket is used.
//!
//! The client is identified by the socket peer address. With
//! `TRUST_PROXY_HEADERS` on, the first `X-Forwarded-For` address is used
//! instead; the header is caller-controlled otherwise.
//!
//! Responses carry `X-RateLimit-Limit` and `X-RateLimit-Remaining`.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::Mutex;

/// Past this many tracked clients, full buckets are forgotten
const MAX_TRACKED_CLIENTS: usize = 10_000;

const REDIS_KEY_PREFIX: &str = "medemede:ratelimit:auth";

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

tokens = math.min(capacity, tokens + (math.max(0, now - last_refill) * refill_rate))

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
redis.call('EXPIRE', key, 120)

if allowed == 1 then
    return {1, math.floor(tokens), 0}
else
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub requests_per_minute: u32,

    /// Tokens per second
    pub refill_rate: f64,

    /// Burst size
    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        Self {
            requests_per_minute: requests,
            refill_rate: requests as f64 / 60.0,
            bucket_capacity: requests,
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,

    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn seconds_until_available(&self, rate: f64) -> u64 {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub ok: bool,

    pub remaining: u32,

    /// Seconds until a request would be allowed
    pub retry_after: u64,
}

pub struct RateLimiter {
    limit: RateLimit,

    buckets: Mutex<HashMap<String, TokenBucket>>,

    redis: Option<ConnectionManager>,

    script: redis::Script,
}

impl RateLimiter {
    /// In-process buckets only
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            buckets: Mutex::new(HashMap::new()),
            redis: None,
            script: redis::Script::new(TOKEN_BUCKET_SCRIPT),
        }
    }

    /// Shares buckets through Redis
    ///
    /// # Errors
    ///
    /// Fails if the URL is invalid or Redis is unreachable.
    pub async fn with_redis(limit: RateLimit, redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        tracing::info!("Rate limiting through Redis");

        let mut limiter = Self::new(limit);
        limiter.redis = Some(manager);
        Ok(limiter)
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Takes one token from the client's bucket
    pub async fn check(&self, client: &str) -> RateLimitResult {
        if let Some(redis) = &self.redis {
            match self.check_redis(redis.clone(), client).await {
                Ok(result) => return result,
                Err(e) => {
                    tracing::warn!(error = %e, "Redis rate limit check failed, using local bucket")
                }
            }
        }
        self.check_local(client, Instant::now()).await
    }

    async fn check_local(&self, client: &str, now: Instant) -> RateLimitResult {
        let RateLimit {
            refill_rate,
            bucket_capacity,
            ..
        } = self.limit;

        let mut buckets = self.buckets.lock().await;
        if buckets.len() >= MAX_TRACKED_CLIENTS && !buckets.contains_key(client) {
            buckets.retain(|_, bucket| {
                bucket.refill(refill_rate, bucket_capacity, now);
                bucket.tokens < bucket_capacity as f64
            });
        }

        let bucket = buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::full(bucket_capacity, now));
        bucket.refill(refill_rate, bucket_capacity, now);

        if bucket.try_consume() {
            RateLimitResult {
                ok: true,
                remaining: bucket.tokens.floor() as u32,
                retry_after: 0,
            }
        } else {
            RateLimitResult {
                ok: false,
                remaining: 0,
                retry_after: bucket.seconds_until_available(refill_rate).max(1),
            }
        }
    }

    async fn check_redis(
        &self,
        mut conn: ConnectionManager,
        client: &str,
    ) -> Result<RateLimitResult, redis::RedisError> {
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        let key = format!("{}:{}", REDIS_KEY_PREFIX, client);

        let result: Vec<i64> = self
            .script
            .key(&key)
            .arg(self.limit.bucket_capacity)
            .arg(self.limit.refill_rate)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;

        let field = |i: usize| result.get(i).copied().unwrap_or(0);
        Ok(RateLimitResult {
            ok: field(0) == 1,
            remaining: field(1).max(0) as u32,
            retry_after: field(2).max(0) as u64,
        })
    }
}

/// Identifies the caller for rate limiting
pub fn client_key(request: &Request, trust_proxy_headers: bool) -> String {
    let forwarded = || {
        request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
    };
    let peer = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    };

    trust_proxy_headers
        .then(forwarded)
        .flatten()
        .or_else(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware for the auth routes
pub async fn auth_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_key(&request, state.config.rate_limit.trust_proxy_headers);
    let result = state.rate_limiter.check(&client).await;

    if !result.ok {
        tracing::warn!(client = %client, path = %request.uri().path(), "Auth rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Too many attempts. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-ratelimit-limit",
        HeaderValue::from(state.rate_limiter.limit().requests_per_minute),
    );
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::time::Duration;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(60);
        assert_eq!(limit.bucket_capacity, 60);
        assert_eq!(limit.refill_rate, 1.0);

        assert_eq!(RateLimit::per_minute(0).bucket_capacity, 1);
    }

    #[test]
    fn test_token_bucket_consume() {
        let mut bucket = TokenBucket::full(2, Instant::now());
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        assert_eq!(bucket.tokens, 0.0);
    }

    #[test]
    fn test_token_bucket_refill_capped() {
        let start = Instant::now();
        let mut bucket = TokenBucket {
            tokens: 5.0,
            last_refill: start,
        };

        bucket.refill(1.0, 100, start + Duration::from_secs(10));
        assert!((bucket.tokens - 15.0).abs() < 1e-9);

        bucket.refill(1.0, 100, start + Duration::from_secs(1000));
        assert_eq!(bucket.tokens, 100.0);
    }

    #[test]
    fn test_seconds_until_available() {
        let bucket = TokenBucket {
            tokens: 0.25,
            last_refill: Instant::now(),
        };
        assert_eq!(bucket.seconds_until_available(0.5), 2);
    }

    #[tokio::test]
    async fn test_limiter_blocks_after_capacity() {
        let limiter = RateLimiter::new(RateLimit::per_minute(3));
        let now = Instant::now();

        for remaining in [2, 1, 0] {
            let result = limiter.check_local("10.0.0.1", now).await;
            assert!(result.ok);
            assert_eq!(result.remaining, remaining);
        }

        let blocked = limiter.check_local("10.0.0.1", now).await;
        assert!(!blocked.ok);
        assert_eq!(blocked.retry_after, 20);

        // Other clients have their own bucket
        assert!(limiter.check_local("10.0.0.2", now).await.ok);

        let later = limiter
            .check_local("10.0.0.1", now + Duration::from_secs(30))
            .await;
        assert!(later.ok);
    }

    fn request_from(peer: [u8; 4], forwarded_for: Option<&str>) -> Request {
        let mut builder = Request::builder();
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 5123))));
        request
    }

    #[test]
    fn test_client_key_ignores_forwarded_for_by_default() {
        let spoofed = request_from([192, 168, 1, 4], Some("203.0.113.7"));
        assert_eq!(client_key(&spoofed, false), "192.168.1.4");

        let rotated = request_from([192, 168, 1, 4], Some("198.51.100.9"));
        assert_eq!(client_key(&rotated, false), client_key(&spoofed, false));

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request, false), "unknown");
    }

    #[test]
    fn test_client_key_uses_forwarded_for_behind_proxy() {
        let request = request_from([10, 0, 0, 1], Some("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_key(&request, true), "203.0.113.7");

        let request = request_from([10, 0, 0, 1], Some(" "));
        assert_eq!(client_key(&request, true), "10.0.0.1");

        let request = request_from([10, 0, 0, 1], None);
        assert_eq!(client_key(&request, true), "10.0.0.1");
    }
}
