//! Web application initialization library.
//!
//! Wires a standard set of cross-cutting concerns into an [`App`] in one
//! call to [`init_app`]: configuration defaults, secure response headers,
//! rate limiting, a `/ping` health route, request-id capture, an optional
//! debug toolbar and themed template loading.
//!
//! ```no_run
//! use webapp_init::{init_app, App, HttpServer, InitOptions, Shutdown};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = App::new("records");
//! init_app(&mut app, InitOptions::default())?;
//!
//! let shutdown = Shutdown::new();
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! HttpServer::new(app)?.run(listener, shutdown.subscribe()).await?;
//! # Ok(())
//! # }
//! ```

// Core
pub mod config;
pub mod error;
pub mod extension;
pub mod http;

// Features wired by the extension
pub mod health;
pub mod security;
pub mod theme;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::Config;
pub use error::{ConfigError, InitError, TemplateError};
pub use extension::{init_app, AppExtension, InitOptions, EXTENSION_NAME};
pub use http::{App, HttpServer};
pub use lifecycle::Shutdown;
