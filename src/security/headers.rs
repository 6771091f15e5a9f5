//! Security response headers and forced HTTPS.
//!
//! # Responsibilities
//! - Redirect plain HTTP requests to HTTPS unless the route opts out
//! - Add CSP, HSTS, frame, content-type and referrer headers to responses
//!
//! # Design Decisions
//! - Header values are rendered once, when the middleware is built
//! - Headers a handler already set are left alone
//! - HSTS is only sent over HTTPS

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{
            CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY_REPORT_ONLY, HOST, LOCATION,
            REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::debug;

use crate::config::defaults::APP_DEFAULT_SECURE_HEADERS;
use crate::config::schema::{CspPolicy, SecureHeadersConfig};
use crate::error::ConfigError;
use crate::http::request::{endpoint, is_https};
use crate::observability::metrics;

/// Per-route overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub force_https: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self { force_https: true }
    }
}

/// Secure-headers middleware state.
#[derive(Clone)]
pub struct SecureHeaders {
    inner: Arc<Inner>,
}

struct Inner {
    config: SecureHeadersConfig,
    view_options: DashMap<String, ViewOptions>,
    /// Headers added to every response.
    always: Vec<(HeaderName, HeaderValue)>,
    /// HSTS value, sent on HTTPS responses only.
    hsts: Option<HeaderValue>,
}

impl SecureHeaders {
    /// Build the middleware state, rendering every header value.
    pub fn new(config: SecureHeadersConfig) -> Result<Self, ConfigError> {
        let mut always = Vec::new();

        if let Some(policy) = render_csp(
            &config.content_security_policy,
            config.content_security_policy_report_uri.as_deref(),
        ) {
            let name = if config.content_security_policy_report_only {
                CONTENT_SECURITY_POLICY_REPORT_ONLY
            } else {
                CONTENT_SECURITY_POLICY
            };
            always.push((name, header_value(&policy)?));
        }

        if let Some(frame_options) = render_frame_options(&config) {
            always.push((X_FRAME_OPTIONS, header_value(&frame_options)?));
        }

        if config.x_content_type_options {
            always.push((X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")));
        }

        if let Some(referrer_policy) = &config.referrer_policy {
            always.push((REFERRER_POLICY, header_value(referrer_policy)?));
        }

        let hsts = if config.strict_transport_security {
            Some(header_value(&render_hsts(&config))?)
        } else {
            None
        };

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                view_options: DashMap::new(),
                always,
                hsts,
            }),
        })
    }

    pub fn config(&self) -> &SecureHeadersConfig {
        &self.inner.config
    }

    /// Override options for the route at `path`.
    pub fn view_options(&self, path: impl Into<String>, options: ViewOptions) {
        self.inner.view_options.insert(path.into(), options);
    }

    /// Options in effect for the route at `path`.
    pub fn options_for(&self, path: &str) -> ViewOptions {
        self.inner
            .view_options
            .get(path)
            .map(|options| *options)
            .unwrap_or_default()
    }

    /// Rendered CSP header value, if any.
    pub fn content_security_policy(&self) -> Option<String> {
        render_csp(
            &self.inner.config.content_security_policy,
            self.inner.config.content_security_policy_report_uri.as_deref(),
        )
    }

    fn apply(&self, headers: &mut HeaderMap, https: bool) {
        for (name, value) in &self.inner.always {
            headers.entry(name.clone()).or_insert_with(|| value.clone());
        }
        if https {
            if let Some(hsts) = &self.inner.hsts {
                headers
                    .entry(STRICT_TRANSPORT_SECURITY)
                    .or_insert_with(|| hsts.clone());
            }
        }
    }
}

/// Middleware enforcing HTTPS and decorating responses.
pub async fn secure_headers_middleware(
    State(secure): State<SecureHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let https = is_https(&request);

    if !https && secure.config().force_https {
        let path = endpoint(&request);
        if secure.options_for(&path).force_https {
            return https_redirect(&request, secure.config().force_https_permanent);
        }
    }

    let mut response = next.run(request).await;
    secure.apply(response.headers_mut(), https);
    response
}

fn https_redirect(request: &Request, permanent: bool) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = format!("https://{host}{path_and_query}");

    debug!(location = %location, "Redirecting to HTTPS");
    metrics::record_https_redirect();

    let status = if permanent {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::FOUND
    };
    match HeaderValue::from_str(&location) {
        Ok(location) => (status, [(LOCATION, location)]).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid host").into_response(),
    }
}

/// Render a policy as `directive src src; directive src`.
fn render_csp(policy: &CspPolicy, report_uri: Option<&str>) -> Option<String> {
    if policy.is_empty() {
        return None;
    }

    let mut directives: Vec<String> = policy
        .iter()
        .map(|(directive, sources)| {
            let sources = sources.to_vec();
            if sources.is_empty() {
                directive.clone()
            } else {
                format!("{} {}", directive, sources.join(" "))
            }
        })
        .collect();

    if let Some(uri) = report_uri {
        directives.push(format!("report-uri {uri}"));
    }

    Some(directives.join("; "))
}

fn render_frame_options(config: &SecureHeadersConfig) -> Option<String> {
    let options = config.frame_options.as_deref()?.to_ascii_uppercase();
    match (options.as_str(), config.frame_options_allow_from.as_deref()) {
        ("ALLOW-FROM", Some(origin)) => Some(format!("ALLOW-FROM {origin}")),
        _ => Some(options),
    }
}

fn render_hsts(config: &SecureHeadersConfig) -> String {
    let mut value = format!("max-age={}", config.strict_transport_security_max_age);
    if config.strict_transport_security_include_subdomains {
        value.push_str("; includeSubDomains");
    }
    if config.strict_transport_security_preload {
        value.push_str("; preload");
    }
    value
}

fn header_value(value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::invalid(APP_DEFAULT_SECURE_HEADERS, e))
}
