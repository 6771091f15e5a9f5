mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{CONTENT_SECURITY_POLICY, LOCATION, USER_AGENT},
        Method, Request, StatusCode,
    },
    response::Html,
    routing::get,
};
use serde_json::json;

use common::{base_app, get_as, get_path, limited_app, router, send};
use webapp_init::config::defaults::{
    APP_DEFAULT_SECURE_HEADERS, APP_ENABLE_SECURE_HEADERS, APP_HEALTH_BLUEPRINT_ENABLED,
    APP_REQUESTID_HEADER, APP_THEME, RATELIMIT_KEY_FUNC, RATELIMIT_STORAGE_URI,
    RATELIMIT_STORAGE_URL,
};
use webapp_init::config::init::DEBUG_CSP_SOURCE;
use webapp_init::observability::toolbar::NoopToolbar;
use webapp_init::security::key_func::remote_address;
use webapp_init::theme::MemoryLoader;
use webapp_init::{init_app, App, ConfigError, InitError, InitOptions, EXTENSION_NAME};

#[tokio::test]
async fn test_ping_ignores_rate_limits() {
    let router = router(limited_app());

    for _ in 0..10 {
        let response = get_path(&router, "/ping").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "OK");
    }
}

#[tokio::test]
async fn test_ping_over_plain_http_with_forced_https() {
    let mut app = App::new("testapp");
    init_app(&mut app, InitOptions::default()).unwrap();
    let router = app.into_router().unwrap();

    let ping = get_path(&router, "/ping").await;
    assert_eq!(ping.status, StatusCode::OK);

    let other = send(
        &router,
        Request::builder()
            .uri("/elsewhere")
            .header("host", "example.org")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(other.status, StatusCode::FOUND);
    assert_eq!(
        other.headers.get(LOCATION).unwrap(),
        "https://example.org/elsewhere"
    );
}

#[tokio::test]
async fn test_ping_head_with_forced_https() {
    let mut app = App::new("testapp");
    init_app(&mut app, InitOptions::default()).unwrap();
    let router = app.into_router().unwrap();

    let ping = send(
        &router,
        Request::builder()
            .method(Method::HEAD)
            .uri("/ping")
            .header("host", "example.org")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(ping.status, StatusCode::OK);
    assert!(ping.headers.get(LOCATION).is_none());
    assert!(ping.body.is_empty());
}

#[tokio::test]
async fn test_health_blueprint_disabled() {
    let mut app = base_app();
    app.config_mut().insert(APP_HEALTH_BLUEPRINT_ENABLED, false);
    let router = router(app);

    assert_eq!(get_path(&router, "/ping").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_guest_limit_and_headers() {
    let router = router(limited_app());

    let first = get_as(&router, "/limited_rate", "firefox").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.headers.get("x-ratelimit-limit").unwrap(), "2");
    assert_eq!(first.headers.get("x-ratelimit-remaining").unwrap(), "1");

    assert_eq!(
        get_as(&router, "/limited_rate", "firefox").await.status,
        StatusCode::OK
    );

    let rejected = get_as(&router, "/limited_rate", "firefox").await;
    assert_eq!(rejected.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(rejected.headers.contains_key("retry-after"));
    // Secure headers wrap the limiter.
    assert!(rejected.headers.contains_key(CONTENT_SECURITY_POLICY));

    // Another user agent from the same address has its own bucket.
    assert_eq!(
        get_as(&router, "/limited_rate", "curl").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_per_endpoint_limit() {
    let router = router(limited_app());

    for _ in 0..20 {
        let response = get_as(&router, "/unlimited_rate", "firefox").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers.get("x-ratelimit-limit").unwrap(), "200");
    }
}

#[tokio::test]
async fn test_key_func_from_config() {
    let mut app = limited_app();
    app.config_mut().insert(RATELIMIT_KEY_FUNC, "remote_address");
    let router = router(app);

    assert_eq!(get_as(&router, "/limited_rate", "a").await.status, StatusCode::OK);
    assert_eq!(get_as(&router, "/limited_rate", "b").await.status, StatusCode::OK);
    // Same address, different agent: the address alone is the key.
    assert_eq!(
        get_as(&router, "/limited_rate", "c").await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_key_func_override() {
    let mut app = limited_app();
    let options = InitOptions {
        key_func: Some(Arc::new(remote_address)),
        ..Default::default()
    };
    init_app(&mut app, options).unwrap();
    let router = app.into_router().unwrap();

    get_as(&router, "/limited_rate", "a").await;
    get_as(&router, "/limited_rate", "b").await;
    assert_eq!(
        get_as(&router, "/limited_rate", "c").await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[test]
fn test_unknown_key_func_fails() {
    let mut app = base_app();
    app.config_mut().insert(RATELIMIT_KEY_FUNC, "no_such_func");

    let err = init_app(&mut app, InitOptions::default()).err().unwrap();
    assert!(matches!(
        err,
        InitError::Config(ConfigError::UnknownKeyFunc(name)) if name == "no_such_func"
    ));
    assert!(app.extensions().app().is_none());
}

#[test]
fn test_same_client_same_key() {
    let mut app = base_app();
    let extension = init_app(&mut app, InitOptions::default()).unwrap();
    let limiter = extension.limiter();

    let request = |user_agent: &str| {
        Request::builder()
            .uri("/")
            .header(USER_AGENT, user_agent)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(
        limiter.key_for(&request("firefox")),
        limiter.key_for(&request("firefox"))
    );
    assert_ne!(
        limiter.key_for(&request("firefox")),
        limiter.key_for(&request("chrome"))
    );
}

#[tokio::test]
async fn test_request_id_captured_and_truncated() {
    let mut app = base_app();
    app.config_mut().insert(APP_REQUESTID_HEADER, "X-Request-Id");
    let router = router(app);

    let long_id = "a".repeat(300);
    let response = send(
        &router,
        Request::builder()
            .uri("/requestid")
            .header("X-Request-Id", &long_id)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, long_id[..200]);

    assert_eq!(get_path(&router, "/requestid").await.body, "");
}

#[tokio::test]
async fn test_request_id_disabled() {
    let mut app = base_app();
    app.config_mut().insert(APP_REQUESTID_HEADER, json!(null));
    let router = router(app);

    let response = send(
        &router,
        Request::builder()
            .uri("/requestid")
            .header("X-Request-Id", "1234")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.body, "");
}

#[test]
fn test_legacy_storage_key_migrated() {
    let mut app = base_app();
    app.config_mut().insert(RATELIMIT_STORAGE_URL, "redis://x");

    let extension = init_app(&mut app, InitOptions::default()).unwrap();

    assert_eq!(
        app.config().get_str(RATELIMIT_STORAGE_URI),
        Some("redis://x")
    );
    assert_eq!(extension.deprecations().len(), 1);
    assert_eq!(extension.deprecations()[0].key, RATELIMIT_STORAGE_URL);
    assert_eq!(extension.limiter().settings().storage_uri, "redis://x");
}

#[test]
fn test_debug_csp_appended_once() {
    let mut app = App::new("testapp");
    app.config_mut().insert("DEBUG", true);
    let extension = init_app(&mut app, InitOptions::default()).unwrap();

    let sources = app.config().get(APP_DEFAULT_SECURE_HEADERS).unwrap()
        ["content_security_policy"]["default-src"]
        .as_array()
        .unwrap()
        .clone();
    let count = sources
        .iter()
        .filter(|s| s.as_str() == Some(DEBUG_CSP_SOURCE))
        .count();
    assert_eq!(count, 1);

    let policy = extension
        .secure_headers()
        .unwrap()
        .content_security_policy()
        .unwrap();
    assert!(policy.starts_with("default-src 'self' 'unsafe-inline'"));

    // Re-running on the already patched config does not append again.
    let mut again = App::with_config("testapp", app.config().clone());
    init_app(&mut again, InitOptions::default()).unwrap();
    let sources = &again.config().get(APP_DEFAULT_SECURE_HEADERS).unwrap()
        ["content_security_policy"]["default-src"];
    assert_eq!(sources, &json!(["'self'", "'unsafe-inline'"]));
}

#[test]
fn test_debug_keeps_explicitly_empty_policy() {
    let mut app = base_app();
    app.config_mut().insert("DEBUG", true);
    app.config_mut()
        .get_mut(APP_DEFAULT_SECURE_HEADERS)
        .unwrap()["content_security_policy"] = json!({});

    let extension = init_app(&mut app, InitOptions::default()).unwrap();

    assert_eq!(
        app.config().get(APP_DEFAULT_SECURE_HEADERS).unwrap()["content_security_policy"],
        json!({})
    );
    assert_eq!(
        extension.secure_headers().unwrap().content_security_policy(),
        None
    );
}

#[tokio::test]
async fn test_secure_headers_disabled() {
    let mut app = base_app();
    app.config_mut().insert(APP_ENABLE_SECURE_HEADERS, false);

    let extension = init_app(&mut app, InitOptions::default()).unwrap();
    assert!(extension.secure_headers().is_none());
    assert_eq!(app.middleware_names()[0], "rate-limit");

    let router = app.into_router().unwrap();
    let response = get_path(&router, "/limited_rate").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.headers.contains_key(CONTENT_SECURITY_POLICY));
}

#[test]
fn test_middleware_order() {
    let mut app = base_app();
    init_app(&mut app, InitOptions::default()).unwrap();

    let names = app.middleware_names();
    let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert!(position("secure-headers") < position("rate-limit"));
    assert!(names.contains(&"request-id"));
}

#[test]
fn test_init_twice_rejected() {
    let mut app = base_app();
    init_app(&mut app, InitOptions::default()).unwrap();
    let before = app.middleware_names();

    let err = init_app(&mut app, InitOptions::default()).err().unwrap();
    assert!(matches!(err, InitError::AlreadyRegistered(EXTENSION_NAME)));
    assert_eq!(app.middleware_names(), before);
    assert!(app.extensions().app().is_some());
}

#[test]
fn test_existing_config_untouched() {
    let mut app = base_app();
    app.config_mut().insert("RATELIMIT_GUEST_USER", "7 per minute");
    app.config_mut().insert("OTHER_SETTING", "kept");
    init_app(&mut app, InitOptions::default()).unwrap();

    assert_eq!(app.config().get_str("RATELIMIT_GUEST_USER"), Some("7 per minute"));
    assert_eq!(app.config().get_str("OTHER_SETTING"), Some("kept"));
    assert_eq!(app.config().get_str("RATELIMIT_AUTHENTICATED_USER"), Some("5000 per hour"));
}

#[tokio::test]
async fn test_theme_and_safe_redirect() {
    let mut app = base_app();
    app.config_mut().insert(APP_THEME, json!(["dark"]));
    app.config_mut().insert("APP_ALLOWED_HOSTS", json!(["example.org"]));
    app.templates_mut().set_loader(
        MemoryLoader::new()
            .with("page.txt", "plain {{ next | safe_redirect }}")
            .with("dark/page.txt", "dark {{ next | safe_redirect }}"),
    );
    app.route(
        "/page",
        get(
            |axum::Extension(tera): axum::Extension<Arc<tera::Tera>>| async move {
                let mut context = tera::Context::new();
                context.insert("next", "https://evil.com/home");
                tera.render("page.txt", &context).unwrap()
            },
        ),
    );
    let router = router(app);

    let response = get_path(&router, "/page").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "dark /home");
}

#[test]
fn test_toolbar_absent_is_not_fatal() {
    let mut app = base_app();
    let options = InitOptions {
        toolbar: Some(Box::new(NoopToolbar)),
        ..Default::default()
    };
    init_app(&mut app, options).unwrap();
    assert!(app.extensions().debug_toolbar().is_none());
}

#[cfg(feature = "debug-toolbar")]
#[tokio::test]
async fn test_toolbar_in_debug() {
    let mut app = base_app();
    app.config_mut().insert("DEBUG", true);
    app.route(
        "/html",
        get(|| async { Html("<html><body><p>hi</p></body></html>") }),
    );
    init_app(&mut app, InitOptions::default()).unwrap();
    assert!(app.extensions().debug_toolbar().is_some());
    let router = app.into_router().unwrap();

    let page = get_path(&router, "/html").await;
    assert!(page.body.contains("<div id=\"debug-toolbar\">"));
    assert!(page.body.ends_with("</body></html>"));

    let text = get_path(&router, "/limited_rate").await;
    assert_eq!(text.body, "test");
}

#[cfg(feature = "debug-toolbar")]
#[tokio::test]
async fn test_toolbar_passes_large_pages_through() {
    let page = format!(
        "<html><body>{}</body></html>",
        "x".repeat(webapp_init::observability::toolbar::MAX_BODY_BYTES + 1024)
    );
    let expected_len = page.len();

    let mut app = base_app();
    app.config_mut().insert("DEBUG", true);
    app.route("/big", get(move || async move { Html(page) }));
    init_app(&mut app, InitOptions::default()).unwrap();
    let router = app.into_router().unwrap();

    let response = get_path(&router, "/big").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.len(), expected_len);
    assert!(!response.body.contains("debug-toolbar"));
    assert!(response.body.ends_with("</body></html>"));
}

#[cfg(feature = "debug-toolbar")]
#[test]
fn test_toolbar_registered_but_inactive_without_debug() {
    let mut app = base_app();
    init_app(&mut app, InitOptions::default()).unwrap();

    assert!(app.extensions().debug_toolbar().is_some());
    assert!(!app.middleware_names().contains(&"debug-toolbar"));
}
