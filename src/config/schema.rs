//! Typed views over the config store.
//!
//! The store keeps raw JSON values; subsystems read them through these
//! structs once, at startup.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::defaults::{
    APP_DEFAULT_SECURE_HEADERS, RATELIMIT_AUTHENTICATED_USER, RATELIMIT_ENABLED,
    RATELIMIT_GUEST_USER, RATELIMIT_HEADERS_ENABLED, RATELIMIT_PER_ENDPOINT,
    RATELIMIT_STORAGE_URI,
};
use crate::config::store::Config;
use crate::error::ConfigError;
use crate::security::limits::RateLimit;

/// Sources of one CSP directive: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CspSources {
    One(String),
    Many(Vec<String>),
}

impl CspSources {
    pub fn to_vec(&self) -> Vec<&str> {
        match self {
            CspSources::One(source) => vec![source.as_str()],
            CspSources::Many(sources) => sources.iter().map(String::as_str).collect(),
        }
    }
}

/// Directive name -> allowed sources.
pub type CspPolicy = BTreeMap<String, CspSources>;

/// Secure-headers policy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecureHeadersConfig {
    /// Redirect plain HTTP requests to HTTPS.
    pub force_https: bool,

    /// Use 301 instead of 302 for the HTTPS redirect.
    pub force_https_permanent: bool,

    /// `sameorigin`, `deny` or `allow-from`.
    pub frame_options: Option<String>,

    /// Origin for `allow-from` frame options.
    pub frame_options_allow_from: Option<String>,

    pub strict_transport_security: bool,
    pub strict_transport_security_max_age: u64,
    pub strict_transport_security_include_subdomains: bool,
    pub strict_transport_security_preload: bool,

    /// Empty or null means no CSP header at all.
    #[serde(deserialize_with = "null_as_empty")]
    pub content_security_policy: CspPolicy,
    pub content_security_policy_report_only: bool,
    pub content_security_policy_report_uri: Option<String>,

    pub referrer_policy: Option<String>,

    /// Send `X-Content-Type-Options: nosniff`.
    pub x_content_type_options: bool,
}

impl Default for SecureHeadersConfig {
    fn default() -> Self {
        let mut content_security_policy = CspPolicy::new();
        content_security_policy.insert(
            "default-src".to_string(),
            CspSources::Many(vec!["'self'".to_string()]),
        );
        content_security_policy.insert(
            "object-src".to_string(),
            CspSources::Many(vec!["'none'".to_string()]),
        );

        Self {
            force_https: true,
            force_https_permanent: false,
            frame_options: Some("sameorigin".to_string()),
            frame_options_allow_from: None,
            strict_transport_security: true,
            strict_transport_security_max_age: 31_556_926, // one year
            strict_transport_security_include_subdomains: true,
            strict_transport_security_preload: false,
            content_security_policy,
            content_security_policy_report_only: false,
            content_security_policy_report_uri: None,
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            x_content_type_options: true,
        }
    }
}

impl SecureHeadersConfig {
    /// Read `APP_DEFAULT_SECURE_HEADERS`; missing or null yields the defaults.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        match config.get(APP_DEFAULT_SECURE_HEADERS) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ConfigError::invalid(APP_DEFAULT_SECURE_HEADERS, e)),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<CspPolicy, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<CspPolicy>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Rate limiting settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSettings {
    /// Master switch for the limiter.
    pub enabled: bool,

    /// Limit for anonymous clients.
    pub guest: RateLimit,

    /// Limit for authenticated clients.
    pub authenticated: RateLimit,

    /// Route path -> limit, overriding the per-user limits.
    pub per_endpoint: BTreeMap<String, RateLimit>,

    /// Emit `X-RateLimit-*` response headers.
    pub headers_enabled: bool,

    /// Counter storage location.
    pub storage_uri: String,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            guest: RateLimit::new(1000, std::time::Duration::from_secs(3600)),
            authenticated: RateLimit::new(5000, std::time::Duration::from_secs(3600)),
            per_endpoint: BTreeMap::new(),
            headers_enabled: false,
            storage_uri: "memory://".to_string(),
        }
    }
}

impl RateLimitSettings {
    /// Read the `RATELIMIT_*` keys; absent keys keep their defaults.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if config.contains_key(RATELIMIT_ENABLED) {
            settings.enabled = config.get_bool(RATELIMIT_ENABLED);
        }
        if let Some(limit) = limit_at(config, RATELIMIT_GUEST_USER)? {
            settings.guest = limit;
        }
        if let Some(limit) = limit_at(config, RATELIMIT_AUTHENTICATED_USER)? {
            settings.authenticated = limit;
        }

        match config.get(RATELIMIT_PER_ENDPOINT) {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                for (endpoint, limit) in map {
                    let limit = limit
                        .as_str()
                        .ok_or_else(|| ConfigError::invalid(RATELIMIT_PER_ENDPOINT, "limits must be strings"))?
                        .parse()?;
                    settings.per_endpoint.insert(endpoint.clone(), limit);
                }
            }
            Some(_) => {
                return Err(ConfigError::invalid(RATELIMIT_PER_ENDPOINT, "expected a table"));
            }
        }

        settings.headers_enabled = config.get_bool(RATELIMIT_HEADERS_ENABLED);
        if let Some(uri) = config.get_str(RATELIMIT_STORAGE_URI) {
            settings.storage_uri = uri.to_string();
        }

        Ok(settings)
    }
}

fn limit_at(config: &Config, key: &str) -> Result<Option<RateLimit>, ConfigError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some),
        Some(_) => Err(ConfigError::invalid(key, "expected a limit string")),
    }
}
