//! Metrics recorded by the middleware.
//!
//! # Metrics
//! - `ratelimit_rejected_total` (counter): rejected requests by endpoint
//! - `https_redirects_total` (counter): plain HTTP requests redirected
//!
//! Without an installed recorder these calls are no-ops.

pub fn record_rate_limited(endpoint: &str) {
    ::metrics::counter!("ratelimit_rejected_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_https_redirect() {
    ::metrics::counter!("https_redirects_total").increment(1);
}
