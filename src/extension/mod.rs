//! Application extension: one-time startup wiring.
//!
//! # Startup Sequence
//! ```text
//! init_app(app, options)
//!     → config init (legacy keys, defaults, debug CSP)
//!     → secure headers            (APP_ENABLE_SECURE_HEADERS)
//!     → safe_redirect filter
//!     → rate limiter              (after secure headers)
//!     → /ping route               (APP_HEALTH_BLUEPRINT_ENABLED)
//!     → request-id hook           (APP_REQUESTID_HEADER)
//!     → debug toolbar             (when available)
//!     → theme loader              (APP_THEME)
//!     → registry entry "webapp-init"
//! ```
//!
//! Every step reads the config once; nothing is re-evaluated per request.

pub mod registry;

use std::sync::Arc;

use axum::{http::HeaderName, middleware};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::defaults::{
    APP_ALLOWED_HOSTS, APP_ENABLE_SECURE_HEADERS, APP_HEALTH_BLUEPRINT_ENABLED,
    APP_REQUESTID_HEADER, APP_THEME,
};
use crate::config::{init_config, Config, Deprecation, RateLimitSettings, SecureHeadersConfig};
use crate::error::{ConfigError, InitError};
use crate::health;
use crate::http::request::request_id_middleware;
use crate::http::App;
use crate::observability::toolbar::{self, DebugToolbar};
use crate::security::headers::{secure_headers_middleware, SecureHeaders};
use crate::security::key_func::{KeyFunc, KeyFuncRegistry};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::theme::filters::{safe_redirect_filter, SAFE_REDIRECT};
use crate::theme::ThemeLoader;

pub use registry::Extensions;

/// Registry key of this extension.
pub const EXTENSION_NAME: &str = "webapp-init";

/// Overrides for [`init_app`].
#[derive(Default)]
pub struct InitOptions {
    /// Key functions `RATELIMIT_KEY_FUNC` may name.
    pub key_funcs: KeyFuncRegistry,

    /// Key function to use regardless of `RATELIMIT_KEY_FUNC`.
    pub key_func: Option<KeyFunc>,

    /// Toolbar to use instead of probing for one.
    pub toolbar: Option<Box<dyn DebugToolbar>>,
}

/// Handles to the middleware wired by [`init_app`].
pub struct AppExtension {
    limiter: RateLimiter,
    secure_headers: Option<SecureHeaders>,
    deprecations: Vec<Deprecation>,
}

impl AppExtension {
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Present when `APP_ENABLE_SECURE_HEADERS` was on.
    pub fn secure_headers(&self) -> Option<&SecureHeaders> {
        self.secure_headers.as_ref()
    }

    /// Deprecated config keys migrated during init.
    pub fn deprecations(&self) -> &[Deprecation] {
        &self.deprecations
    }
}

/// Wire the extension into `app`.
///
/// Must run once per application; a second call fails with
/// [`InitError::AlreadyRegistered`] before touching `app`.
pub fn init_app(app: &mut App, options: InitOptions) -> Result<Arc<AppExtension>, InitError> {
    if app.extensions().app().is_some() {
        return Err(InitError::AlreadyRegistered(EXTENSION_NAME));
    }

    let deprecations = init_config(app.config_mut());

    let secure_headers = if app.config().get_bool(APP_ENABLE_SECURE_HEADERS) {
        let secure = SecureHeaders::new(SecureHeadersConfig::from_config(app.config())?)?;
        let state = secure.clone();
        app.layer_fn("secure-headers", move |router| {
            router.layer(middleware::from_fn_with_state(state, secure_headers_middleware))
        });
        Some(secure)
    } else {
        None
    };

    let allowed_hosts = allowed_hosts(app.config())?;
    app.templates_mut()
        .register_filter(SAFE_REDIRECT, safe_redirect_filter(allowed_hosts));

    // Registered after the secure headers so their redirect and headers wrap
    // the limiter's response, 429s included.
    let key_func = match options.key_func {
        Some(key_func) => key_func,
        None => options.key_funcs.resolve(app.config())?,
    };
    let limiter = RateLimiter::new(RateLimitSettings::from_config(app.config())?, key_func);
    let state = limiter.clone();
    app.layer_fn("rate-limit", move |router| {
        router.layer(middleware::from_fn_with_state(state, rate_limit_middleware))
    });

    if app.config().get_bool(APP_HEALTH_BLUEPRINT_ENABLED) {
        health::register(app, &limiter, secure_headers.as_ref());
    }

    if let Some(header) = request_id_header(app.config())? {
        debug!(header = %header, "Capturing request ids");
        app.layer_fn("request-id", move |router| {
            router.layer(middleware::from_fn_with_state(header, request_id_middleware))
        });
    }

    let toolbar = options.toolbar.unwrap_or_else(toolbar::probe);
    if toolbar.is_available() {
        toolbar.install(app);
        app.extensions_mut()
            .register_debug_toolbar(Arc::from(toolbar))?;
    } else {
        debug!("Debug toolbar extension not installed");
    }

    let themes = themes(app.config())?;
    if !themes.is_empty() {
        debug!(themes = ?themes, "Using theme template loader");
        app.templates_mut()
            .wrap_loader(|inner| Box::new(ThemeLoader::new(themes, inner)));
    }

    let extension = Arc::new(AppExtension {
        limiter,
        secure_headers,
        deprecations,
    });
    app.extensions_mut().register_app(Arc::clone(&extension))?;

    info!(
        app = %app.name(),
        middleware = ?app.middleware_names(),
        "Extension {} initialized",
        EXTENSION_NAME
    );
    Ok(extension)
}

fn allowed_hosts(config: &Config) -> Result<Vec<String>, ConfigError> {
    string_list(config, APP_ALLOWED_HOSTS)
}

fn themes(config: &Config) -> Result<Vec<String>, ConfigError> {
    string_list(config, APP_THEME)
}

/// A string or list of strings; null and absent are empty.
fn string_list(config: &Config, key: &str) -> Result<Vec<String>, ConfigError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::invalid(key, "expected strings"))
            })
            .collect(),
        Some(_) => Err(ConfigError::invalid(key, "expected a string or a list of strings")),
    }
}

fn request_id_header(config: &Config) -> Result<Option<HeaderName>, ConfigError> {
    match config.get(APP_REQUESTID_HEADER) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::String(name)) if name.is_empty() => Ok(None),
        Some(Value::String(name)) => HeaderName::from_bytes(name.as_bytes())
            .map(Some)
            .map_err(|e| ConfigError::invalid(APP_REQUESTID_HEADER, e)),
        Some(_) => Err(ConfigError::invalid(APP_REQUESTID_HEADER, "expected a header name")),
    }
}
