//! Config initialization: legacy key migration, default merge and the
//! debug-mode CSP relaxation.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::defaults::{
    defaults, APP_DEFAULT_SECURE_HEADERS, CONFIG_PREFIXES, RATELIMIT_STORAGE_URI,
    RATELIMIT_STORAGE_URL,
};
use crate::config::store::Config;

/// Source appended to `default-src` in debug mode so inline scripts run.
pub const DEBUG_CSP_SOURCE: &str = "'unsafe-inline'";

const CSP_KEY: &str = "content_security_policy";
const DEFAULT_SRC: &str = "default-src";

/// A deprecated config key that was migrated during init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deprecation {
    pub key: String,
    pub replacement: String,
}

impl std::fmt::Display for Deprecation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} has been renamed to {}.", self.key, self.replacement)
    }
}

/// Initialize `config` with the crate defaults.
///
/// Returns the deprecations encountered; they are also logged.
pub fn init_config(config: &mut Config) -> Vec<Deprecation> {
    init_config_with(config, &defaults())
}

/// Like [`init_config`] with an explicit set of defaults.
pub fn init_config_with(config: &mut Config, defaults: &[(&str, Value)]) -> Vec<Deprecation> {
    let mut deprecations = Vec::new();

    if let Some(legacy) = config.get(RATELIMIT_STORAGE_URL).cloned() {
        config.insert(RATELIMIT_STORAGE_URI, legacy);
        let deprecation = Deprecation {
            key: RATELIMIT_STORAGE_URL.to_string(),
            replacement: RATELIMIT_STORAGE_URI.to_string(),
        };
        warn!(
            key = RATELIMIT_STORAGE_URL,
            replacement = RATELIMIT_STORAGE_URI,
            "Deprecated config key: {}",
            deprecation
        );
        deprecations.push(deprecation);
    }

    let merged = merge_defaults(config, defaults, &CONFIG_PREFIXES);
    debug!(merged, "Config defaults merged");

    if config.debug() {
        patch_debug_csp(config);
    }

    deprecations
}

/// Set every prefixed default that is absent from `config`.
///
/// Returns how many keys were added.
pub fn merge_defaults(config: &mut Config, defaults: &[(&str, Value)], prefixes: &[&str]) -> usize {
    let mut merged = 0;
    for (name, value) in defaults {
        if !prefixes.iter().any(|prefix| name.starts_with(prefix)) {
            continue;
        }
        if !config.contains_key(name) {
            config.insert(*name, value.clone());
            merged += 1;
        }
    }
    merged
}

/// Relax the content security policy for development.
///
/// An explicitly empty `content_security_policy` object or `default-src`
/// list is left alone; absent ones are created.
pub fn patch_debug_csp(config: &mut Config) {
    let headers = config.set_default(APP_DEFAULT_SECURE_HEADERS, Map::new());
    let Some(headers) = headers.as_object_mut() else {
        warn!("{} is not an object, skipping debug CSP", APP_DEFAULT_SECURE_HEADERS);
        return;
    };

    if is_empty_object(headers.get(CSP_KEY)) {
        return;
    }
    let csp = headers
        .entry(CSP_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(csp) = csp.as_object_mut() else {
        debug!("content_security_policy is not a directive map, skipping debug CSP");
        return;
    };

    if is_empty_array(csp.get(DEFAULT_SRC)) {
        return;
    }
    let sources = csp
        .entry(DEFAULT_SRC)
        .or_insert_with(|| Value::Array(Vec::new()));
    if sources.is_null() {
        *sources = Value::Array(Vec::new());
    }
    if let Some(single) = sources.as_str().map(str::to_owned) {
        *sources = Value::Array(vec![Value::String(single)]);
    }

    if let Value::Array(list) = sources {
        if !list.iter().any(|s| s.as_str() == Some(DEBUG_CSP_SOURCE)) {
            list.push(Value::String(DEBUG_CSP_SOURCE.to_string()));
        }
    }
}

fn is_empty_object(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Object(map)) if map.is_empty())
}

fn is_empty_array(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Array(list)) if list.is_empty())
}
