//! Liveness probe.

use axum::{routing::get, Router};

pub const PING_PATH: &str = "/ping";

/// Always `OK`.
pub async fn ping() -> &'static str {
    "OK"
}

/// Router serving [`ping`] for GET, HEAD and OPTIONS.
pub fn blueprint() -> Router {
    Router::new().route(PING_PATH, get(ping).head(ping).options(ping))
}
