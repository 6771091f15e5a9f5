//! Rate limiting middleware.
//!
//! Each request is counted against a token bucket identified by the
//! applicable limit and the key function's output. Buckets that have
//! refilled completely carry no state and are swept periodically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::{DashMap, DashSet};

use crate::config::schema::RateLimitSettings;
use crate::http::request::endpoint;
use crate::observability::metrics;
use crate::security::key_func::KeyFunc;
use crate::security::limits::RateLimit;

const MEMORY_STORAGE: &str = "memory://";

/// Hits between sweeps of refilled buckets.
const SWEEP_EVERY: u64 = 1024;

/// Marks a request as coming from an authenticated user.
///
/// Inserted into the request extensions by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated;

/// Per-request limit override, e.g. for users with a custom quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRateLimit(pub RateLimit);

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// When the bucket is full again; `None` if that is beyond `Instant`.
    full_at: Option<Instant>,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        let now = Instant::now();
        Self {
            tokens: capacity,
            last_update: now,
            full_at: Some(now),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the bucket is full again.
    fn time_to_full(&self, capacity: f64, refill_rate: f64) -> Duration {
        Duration::try_from_secs_f64(((capacity - self.tokens) / refill_rate).max(0.0))
            .unwrap_or(Duration::MAX)
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: RateLimit,
    /// Whole requests left before the bucket is empty.
    pub remaining: u32,
    /// Time until the bucket is full again.
    pub reset_after: Duration,
}

/// Rate limiter shared by all requests of an application.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    buckets: DashMap<String, TokenBucket>,
    hits: AtomicU64,
    exempt: DashSet<String>,
    settings: RateLimitSettings,
    key_func: KeyFunc,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings, key_func: KeyFunc) -> Self {
        if !settings.storage_uri.starts_with(MEMORY_STORAGE) {
            tracing::warn!(
                storage_uri = %settings.storage_uri,
                "Unsupported rate-limit storage, counting in memory"
            );
        }

        Self {
            inner: Arc::new(Inner {
                buckets: DashMap::new(),
                hits: AtomicU64::new(0),
                exempt: DashSet::new(),
                settings,
                key_func,
            }),
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.inner.settings
    }

    /// Exclude the route at `path` from rate limiting.
    pub fn exempt(&self, path: impl Into<String>) {
        self.inner.exempt.insert(path.into());
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.inner.exempt.contains(path)
    }

    /// Bucket key of the request, as computed by the key function.
    pub fn key_for(&self, request: &Request) -> String {
        (self.inner.key_func)(request)
    }

    /// Limit applying to `request` on route `endpoint`.
    ///
    /// Per-endpoint limits win, then a per-request override, then the
    /// authenticated or guest limit.
    pub fn limit_for(&self, request: &Request, endpoint: &str) -> RateLimit {
        let settings = &self.inner.settings;
        if let Some(limit) = settings.per_endpoint.get(endpoint) {
            return *limit;
        }
        if let Some(UserRateLimit(limit)) = request.extensions().get::<UserRateLimit>() {
            return *limit;
        }
        if request.extensions().get::<Authenticated>().is_some() {
            settings.authenticated
        } else {
            settings.guest
        }
    }

    /// Count one request for `key` against `limit`.
    pub fn hit(&self, key: &str, limit: RateLimit) -> Decision {
        let capacity = f64::from(limit.count);
        let refill_rate = limit.refill_rate();

        let decision = {
            let mut bucket = self
                .inner
                .buckets
                .entry(format!("{limit}/{key}"))
                .or_insert_with(|| TokenBucket::new(capacity));
            let allowed = bucket.try_acquire(capacity, refill_rate);
            let reset_after = bucket.time_to_full(capacity, refill_rate);
            bucket.full_at = bucket.last_update.checked_add(reset_after);

            Decision {
                allowed,
                limit,
                remaining: bucket.tokens.max(0.0).floor() as u32,
                reset_after,
            }
        };

        // The entry guard is released above; sweeping takes every shard lock.
        if self.inner.hits.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
        decision
    }

    /// Drop buckets that have refilled completely. Returns how many went.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.buckets.len();
        self.inner
            .buckets
            .retain(|_, bucket| !matches!(bucket.full_at, Some(full_at) if full_at <= now));
        let swept = before.saturating_sub(self.inner.buckets.len());
        if swept > 0 {
            tracing::debug!(swept, "Swept idle rate-limit buckets");
        }
        swept
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.inner.buckets.len()
    }

    /// Forget all counters.
    pub fn reset(&self) {
        self.inner.buckets.clear();
    }
}

/// Middleware function for rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = endpoint(&request);
    if !limiter.settings().enabled || limiter.is_exempt(&endpoint) {
        return next.run(request).await;
    }

    let key = limiter.key_for(&request);
    let limit = limiter.limit_for(&request, &endpoint);
    let decision = limiter.hit(&key, limit);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, endpoint = %endpoint, limit = %limit, "Rate limit exceeded");
        metrics::record_rate_limited(&endpoint);
        let mut response = Response::new(Body::from("Rate limit exceeded"));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response
    };

    if limiter.settings().headers_enabled {
        insert_rate_limit_headers(response.headers_mut(), &decision);
    }
    response
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    let reset_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .saturating_add(decision.reset_after)
        .as_secs();

    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit.count));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at));
    if !decision.allowed {
        let retry_after = (decision.limit.period.as_secs_f64() / f64::from(decision.limit.count))
            .ceil() as u64;
        headers.insert("retry-after", HeaderValue::from(retry_after.max(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::key_func::{remote_address, useragent_and_ip};
    use axum::http::header::USER_AGENT;
    use std::collections::BTreeMap;

    fn limiter(guest: RateLimit) -> RateLimiter {
        let settings = RateLimitSettings {
            guest,
            ..Default::default()
        };
        RateLimiter::new(settings, Arc::new(useragent_and_ip))
    }

    fn request(user_agent: &str) -> Request {
        axum::http::Request::builder()
            .header(USER_AGENT, user_agent)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_bucket_exhausts() {
        let limiter = limiter(RateLimit::per_second(2));
        let limit = RateLimit::per_second(2);

        let first = limiter.hit("client", limit);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.hit("client", limit).allowed);

        let third = limiter.hit("client", limit);
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);

        // Other keys have their own bucket.
        assert!(limiter.hit("other", limit).allowed);

        limiter.reset();
        assert!(limiter.hit("client", limit).allowed);
    }

    #[test]
    fn test_same_key_shares_bucket() {
        let limiter = limiter(RateLimit::per_second(1));
        let limit = RateLimit::per_second(1);

        let a = limiter.key_for(&request("firefox"));
        let b = limiter.key_for(&request("firefox"));
        let c = limiter.key_for(&request("curl"));
        assert_eq!(a, b);
        assert_ne!(a, c);

        assert!(limiter.hit(&a, limit).allowed);
        assert!(!limiter.hit(&b, limit).allowed);
        assert!(limiter.hit(&c, limit).allowed);
    }

    #[test]
    fn test_limit_precedence() {
        let mut per_endpoint = BTreeMap::new();
        per_endpoint.insert("/special".to_string(), RateLimit::per_second(200));
        let settings = RateLimitSettings {
            guest: RateLimit::per_second(2),
            authenticated: RateLimit::per_second(5),
            per_endpoint,
            ..Default::default()
        };
        let limiter = RateLimiter::new(settings, Arc::new(remote_address));

        let mut request = request("x");
        assert_eq!(limiter.limit_for(&request, "/"), RateLimit::per_second(2));

        request.extensions_mut().insert(Authenticated);
        assert_eq!(limiter.limit_for(&request, "/"), RateLimit::per_second(5));

        request
            .extensions_mut()
            .insert(UserRateLimit(RateLimit::per_second(10)));
        assert_eq!(limiter.limit_for(&request, "/"), RateLimit::per_second(10));

        assert_eq!(
            limiter.limit_for(&request, "/special"),
            RateLimit::per_second(200)
        );
    }

    #[test]
    fn test_huge_period_does_not_overflow() {
        let limiter = limiter(RateLimit::per_second(1));
        let limit: RateLimit = "1 per 18446744073709551615 seconds".parse().unwrap();

        let first = limiter.hit("client", limit);
        assert!(first.allowed);
        assert_eq!(first.reset_after, Duration::MAX);
        assert!(!limiter.hit("client", limit).allowed);

        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, &first);
        assert!(headers.contains_key("x-ratelimit-reset"));

        // Never refills within `Instant` range, so it is kept.
        assert_eq!(limiter.sweep(), 0);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_sweep_drops_refilled_buckets() {
        let limiter = limiter(RateLimit::per_second(1));
        let fast = RateLimit::per_second(1000);
        let slow = RateLimit::new(10, Duration::from_secs(3600));

        for i in 0..100 {
            limiter.hit(&format!("ua-{i}:1.2.3.4"), fast);
        }
        limiter.hit("steady", slow);
        assert_eq!(limiter.bucket_count(), 101);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.sweep(), 100);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_hits_trigger_sweep() {
        let limiter = limiter(RateLimit::per_second(1));
        let fast = RateLimit::per_second(1000);

        for i in 0..SWEEP_EVERY - 1 {
            limiter.hit(&format!("ua-{i}"), fast);
        }
        assert_eq!(limiter.bucket_count(), (SWEEP_EVERY - 1) as usize);

        std::thread::sleep(Duration::from_millis(20));
        limiter.hit("last", fast);
        assert!(limiter.bucket_count() <= 1);
    }

    #[test]
    fn test_exempt() {
        let limiter = limiter(RateLimit::per_second(1));
        assert!(!limiter.is_exempt("/ping"));
        limiter.exempt("/ping");
        assert!(limiter.is_exempt("/ping"));
    }

    #[test]
    fn test_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        let decision = Decision {
            allowed: false,
            limit: RateLimit::per_second(2),
            remaining: 0,
            reset_after: Duration::from_secs(1),
        };
        insert_rate_limit_headers(&mut headers, &decision);

        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "2");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
        assert_eq!(headers.get("retry-after").unwrap(), "1");
        assert!(headers.contains_key("x-ratelimit-reset"));
    }
}
