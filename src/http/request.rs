//! Per-request context and request inspection helpers.
//!
//! # Responsibilities
//! - Capture a client-supplied request id from a configurable header
//! - Name the endpoint a request was routed to
//! - Tell whether a request arrived over HTTPS
//!
//! # Design Decisions
//! - Request ids are capped, never rejected
//! - Per-request state lives in the request's extensions

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{self, HeaderName},
    middleware::Next,
    response::Response,
};

/// Request ids longer than this many characters are truncated.
pub const REQUEST_ID_MAX_CHARS: usize = 200;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Client-supplied request id, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Build a request id from a raw header value.
    ///
    /// Empty values yield `None`.
    pub fn from_header(value: &[u8]) -> Option<Self> {
        let value = String::from_utf8_lossy(value);
        if value.is_empty() {
            return None;
        }
        Some(Self(value.chars().take(REQUEST_ID_MAX_CHARS).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Access to the captured request id.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for http::Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Pre-request hook storing the value of `header` as a [`RequestId`].
pub async fn request_id_middleware(
    State(header): State<HeaderName>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(&header)
        .and_then(|value| RequestId::from_header(value.as_bytes()));

    if let Some(request_id) = request_id {
        request.extensions_mut().insert(request_id);
    }

    next.run(request).await
}

/// Route template the request matched, or its raw path when unrouted.
pub fn endpoint(request: &http::Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// Whether the request arrived over HTTPS, directly or via a proxy.
pub fn is_https<B>(request: &http::Request<B>) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    request
        .headers()
        .get(X_FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}
