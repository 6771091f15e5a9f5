//! Optional in-page debug toolbar.
//!
//! The toolbar is a capability: when the `debug-toolbar` feature is compiled
//! in, [`probe`] returns an HTML panel injector; otherwise it returns
//! [`NoopToolbar`] and startup carries on without one.

use crate::http::App;

/// Registry key of the toolbar.
pub const TOOLBAR_NAME: &str = "debug-toolbar";

pub trait DebugToolbar: Send + Sync {
    fn name(&self) -> &'static str {
        TOOLBAR_NAME
    }

    /// Whether this toolbar can be installed at all.
    fn is_available(&self) -> bool;

    /// Attach the toolbar to `app`. Only called when available.
    fn install(&self, app: &mut App);
}

/// Stand-in when no toolbar is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopToolbar;

impl DebugToolbar for NoopToolbar {
    fn is_available(&self) -> bool {
        false
    }

    fn install(&self, _app: &mut App) {}
}

/// The toolbar this build provides.
pub fn probe() -> Box<dyn DebugToolbar> {
    #[cfg(feature = "debug-toolbar")]
    {
        Box::new(html::HtmlToolbar)
    }
    #[cfg(not(feature = "debug-toolbar"))]
    {
        Box::new(NoopToolbar)
    }
}

#[cfg(feature = "debug-toolbar")]
pub use html::{HtmlToolbar, MAX_BODY_BYTES};

#[cfg(feature = "debug-toolbar")]
mod html {
    use std::time::Instant;

    use axum::{
        body::{self, Body, HttpBody},
        extract::Request,
        http::{
            header::{CONTENT_LENGTH, CONTENT_TYPE},
            StatusCode,
        },
        middleware::{self, Next},
        response::Response,
    };
    use tracing::{debug, warn};

    use super::DebugToolbar;
    use crate::http::request::RequestIdExt;
    use crate::http::App;

    /// Largest page body the toolbar will buffer. Larger or streamed pages
    /// are served untouched.
    pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

    /// Injects a request summary panel into HTML pages while `DEBUG` is on.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct HtmlToolbar;

    impl DebugToolbar for HtmlToolbar {
        fn is_available(&self) -> bool {
            true
        }

        fn install(&self, app: &mut App) {
            if !app.debug() {
                debug!("Debug toolbar inactive outside debug mode");
                return;
            }
            app.layer_fn(super::TOOLBAR_NAME, |router| {
                router.layer(middleware::from_fn(toolbar_middleware))
            });
        }
    }

    async fn toolbar_middleware(request: Request, next: Next) -> Response {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let request_id = request.request_id().map(|id| id.as_str().to_string());

        let response = next.run(request).await;

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/html"));
        if !is_html {
            return response;
        }

        let (mut parts, body) = response.into_parts();
        let fits = body
            .size_hint()
            .upper()
            .is_some_and(|upper| upper <= MAX_BODY_BYTES as u64);
        if !fits {
            debug!(path = %path, "Page too large or streamed, skipping debug toolbar");
            return Response::from_parts(parts, body);
        }

        let bytes = match body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Debug toolbar could not buffer the page");
                parts.status = StatusCode::INTERNAL_SERVER_ERROR;
                parts.headers.remove(CONTENT_LENGTH);
                return Response::from_parts(parts, Body::empty());
            }
        };

        let Ok(page) = String::from_utf8(bytes.to_vec()) else {
            return Response::from_parts(parts, Body::from(bytes));
        };

        let panel = render_panel(
            method.as_str(),
            &path,
            parts.status.as_u16(),
            started.elapsed().as_secs_f64() * 1000.0,
            request_id.as_deref(),
        );
        parts.headers.remove(CONTENT_LENGTH);
        Response::from_parts(parts, Body::from(inject(&page, &panel)))
    }

    pub(super) fn render_panel(
        method: &str,
        path: &str,
        status: u16,
        elapsed_ms: f64,
        request_id: Option<&str>,
    ) -> String {
        let mut rows = format!(
            "<li>{} {}</li><li>status {}</li><li>{:.2} ms</li>",
            tera::escape_html(method),
            tera::escape_html(path),
            status,
            elapsed_ms
        );
        if let Some(id) = request_id {
            rows.push_str(&format!("<li>request id {}</li>", tera::escape_html(id)));
        }
        format!("<div id=\"debug-toolbar\"><ul>{rows}</ul></div>")
    }

    /// Insert `panel` before the last `</body>`, or append it.
    pub(super) fn inject(page: &str, panel: &str) -> String {
        match page.rfind("</body>") {
            Some(at) => format!("{}{}{}", &page[..at], panel, &page[at..]),
            None => format!("{page}{panel}"),
        }
    }
}
