//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::{self, Body},
    extract::ConnectInfo,
    http::{header::USER_AGENT, HeaderMap, Request, StatusCode},
    routing::get,
    Router,
};
use serde_json::json;
use tower::ServiceExt;

use webapp_init::config::defaults::{self, APP_DEFAULT_SECURE_HEADERS};
use webapp_init::http::RequestIdExt;
use webapp_init::{init_app, App, InitOptions};

/// An app with test routes and forced HTTPS turned off.
pub fn base_app() -> App {
    let mut app = App::new("testapp");
    app.config_mut().insert("TESTING", true);

    let mut secure_headers = defaults::default_secure_headers();
    secure_headers["force_https"] = json!(false);
    app.config_mut().insert(APP_DEFAULT_SECURE_HEADERS, secure_headers);

    app.route(
        "/requestid",
        get(|request: Request<Body>| async move {
            request
                .request_id()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default()
        }),
    );
    app.route("/limited_rate", get(|| async { "test" }));
    app.route("/unlimited_rate", get(|| async { "test" }));
    app
}

/// [`base_app`] with tight limits and rate-limit headers on.
pub fn limited_app() -> App {
    let mut app = base_app();
    let config = app.config_mut();
    config.insert("RATELIMIT_GUEST_USER", "2 per second");
    config.insert("RATELIMIT_AUTHENTICATED_USER", "5 per second");
    config.insert(
        "RATELIMIT_PER_ENDPOINT",
        json!({ "/unlimited_rate": "200 per second" }),
    );
    config.insert("RATELIMIT_HEADERS_ENABLED", true);
    app
}

/// Initialize `app` with default options and build its router.
pub fn router(mut app: App) -> Router {
    init_app(&mut app, InitOptions::default()).unwrap();
    app.into_router().unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// Send `request` from 127.0.0.1.
pub async fn send(router: &Router, mut request: Request<Body>) -> TestResponse {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

    TestResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn get_path(router: &Router, path: &str) -> TestResponse {
    send(router, Request::builder().uri(path).body(Body::empty()).unwrap()).await
}

pub async fn get_as(router: &Router, path: &str, user_agent: &str) -> TestResponse {
    send(
        router,
        Request::builder()
            .uri(path)
            .header(USER_AGENT, user_agent)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}
