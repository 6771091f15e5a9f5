//! Application instance assembled at startup.
//!
//! An [`App`] collects configuration, routes, middleware and the template
//! environment while extensions initialize, then turns into an
//! [`axum::Router`] once, before serving.

use std::sync::Arc;

use axum::{routing::MethodRouter, Extension, Router};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::TemplateError;
use crate::extension::Extensions;
use crate::theme::TemplateEnv;

type Wrap = Box<dyn FnOnce(Router) -> Router + Send>;

/// A web application under construction.
pub struct App {
    name: String,
    config: Config,
    extensions: Extensions,
    templates: TemplateEnv,
    routes: Router,
    middleware: Vec<(&'static str, Wrap)>,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, Config::new())
    }

    pub fn with_config(name: impl Into<String>, config: Config) -> Self {
        Self {
            name: name.into(),
            config,
            extensions: Extensions::default(),
            templates: TemplateEnv::empty(),
            routes: Router::new(),
            middleware: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn debug(&self) -> bool {
        self.config.debug()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn templates(&self) -> &TemplateEnv {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateEnv {
        &mut self.templates
    }

    /// Register a route.
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> &mut Self {
        self.routes = std::mem::take(&mut self.routes).route(path, method_router);
        self
    }

    /// Merge a group of routes.
    pub fn register_router(&mut self, router: Router) -> &mut Self {
        self.routes = std::mem::take(&mut self.routes).merge(router);
        self
    }

    /// Push middleware onto the stack.
    ///
    /// Middleware sees requests in registration order: the first one pushed
    /// runs first on the way in and last on the way out.
    pub fn layer_fn<F>(&mut self, name: &'static str, wrap: F) -> &mut Self
    where
        F: FnOnce(Router) -> Router + Send + 'static,
    {
        tracing::debug!(app = %self.name, middleware = name, "Middleware registered");
        self.middleware.push((name, Box::new(wrap)));
        self
    }

    /// Names of the registered middleware, outermost first.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|(name, _)| *name).collect()
    }

    /// Compile templates and wrap the routes in the middleware stack.
    ///
    /// Handlers reach the compiled templates through
    /// `Extension<Arc<tera::Tera>>`.
    pub fn into_router(self) -> Result<Router, TemplateError> {
        let tera = Arc::new(self.templates.compile()?);

        let mut router = self.routes;
        for (_, wrap) in self.middleware.into_iter().rev() {
            router = wrap(router);
        }

        Ok(router
            .layer(Extension(tera))
            .layer(TraceLayer::new_for_http()))
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("middleware", &self.middleware_names())
            .finish_non_exhaustive()
    }
}
