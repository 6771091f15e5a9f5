//! Health check endpoint.
//!
//! # Design Decisions
//! - `/ping` answers without touching any backing service
//! - It is exempt from rate limiting and never forced onto HTTPS, so load
//!   balancers can probe it over plain HTTP

pub mod ping;

use tracing::debug;

use crate::http::App;
use crate::security::headers::{SecureHeaders, ViewOptions};
use crate::security::rate_limit::RateLimiter;

pub use ping::{blueprint, ping, PING_PATH};

/// Mount `/ping` on `app` and opt it out of throttling and forced HTTPS.
pub fn register(app: &mut App, limiter: &RateLimiter, secure_headers: Option<&SecureHeaders>) {
    app.register_router(blueprint());
    limiter.exempt(PING_PATH);
    if let Some(secure_headers) = secure_headers {
        secure_headers.view_options(PING_PATH, ViewOptions { force_https: false });
    }
    debug!(path = PING_PATH, "Health check registered");
}
