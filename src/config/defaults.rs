//! Default configuration values.
//!
//! Only entries whose names start with one of [`CONFIG_PREFIXES`] are merged
//! into an application's config.

use serde_json::{json, Value};

/// Prefixes of the keys owned by this crate.
pub const CONFIG_PREFIXES: [&str; 2] = ["APP_", "RATELIMIT_"];

pub const APP_ALLOWED_HOSTS: &str = "APP_ALLOWED_HOSTS";
pub const APP_DEFAULT_SECURE_HEADERS: &str = "APP_DEFAULT_SECURE_HEADERS";
pub const APP_ENABLE_SECURE_HEADERS: &str = "APP_ENABLE_SECURE_HEADERS";
pub const APP_HEALTH_BLUEPRINT_ENABLED: &str = "APP_HEALTH_BLUEPRINT_ENABLED";
pub const APP_REQUESTID_HEADER: &str = "APP_REQUESTID_HEADER";
pub const APP_THEME: &str = "APP_THEME";

pub const RATELIMIT_ENABLED: &str = "RATELIMIT_ENABLED";
pub const RATELIMIT_GUEST_USER: &str = "RATELIMIT_GUEST_USER";
pub const RATELIMIT_AUTHENTICATED_USER: &str = "RATELIMIT_AUTHENTICATED_USER";
pub const RATELIMIT_PER_ENDPOINT: &str = "RATELIMIT_PER_ENDPOINT";
pub const RATELIMIT_HEADERS_ENABLED: &str = "RATELIMIT_HEADERS_ENABLED";
pub const RATELIMIT_KEY_FUNC: &str = "RATELIMIT_KEY_FUNC";
pub const RATELIMIT_STORAGE_URI: &str = "RATELIMIT_STORAGE_URI";
/// Old name of [`RATELIMIT_STORAGE_URI`].
pub const RATELIMIT_STORAGE_URL: &str = "RATELIMIT_STORAGE_URL";

/// Default secure-headers policy.
pub fn default_secure_headers() -> Value {
    json!({
        "force_https": true,
        "force_https_permanent": false,
        "frame_options": "sameorigin",
        "frame_options_allow_from": null,
        "strict_transport_security": true,
        "strict_transport_security_max_age": 31_556_926,
        "strict_transport_security_include_subdomains": true,
        "strict_transport_security_preload": false,
        "content_security_policy": {
            "default-src": ["'self'"],
            "object-src": ["'none'"],
        },
        "content_security_policy_report_only": false,
        "content_security_policy_report_uri": null,
        "referrer_policy": "strict-origin-when-cross-origin",
        "x_content_type_options": true,
    })
}

/// All default entries, in a stable order.
pub fn defaults() -> Vec<(&'static str, Value)> {
    vec![
        // Hosts a `safe_redirect` target may point at; null means none.
        (APP_ALLOWED_HOSTS, Value::Null),
        (APP_DEFAULT_SECURE_HEADERS, default_secure_headers()),
        (APP_ENABLE_SECURE_HEADERS, json!(true)),
        (APP_HEALTH_BLUEPRINT_ENABLED, json!(true)),
        (APP_REQUESTID_HEADER, json!("X-Request-Id")),
        (APP_THEME, Value::Null),
        (RATELIMIT_ENABLED, json!(true)),
        (RATELIMIT_GUEST_USER, json!("1000 per hour")),
        (RATELIMIT_AUTHENTICATED_USER, json!("5000 per hour")),
        (RATELIMIT_PER_ENDPOINT, json!({})),
        (RATELIMIT_HEADERS_ENABLED, json!(false)),
        (RATELIMIT_KEY_FUNC, Value::Null),
        (RATELIMIT_STORAGE_URI, json!("memory://")),
    ]
}
