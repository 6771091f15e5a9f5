//! HTTP application subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     app.rs (routes, middleware stack, templates)
//!     → into_router()
//!     → server.rs (bind, serve, graceful shutdown)
//!
//! Per request:
//!     middleware in registration order
//!     → request.rs (request id, endpoint, scheme)
//!     → handler
//! ```

pub mod app;
pub mod request;
pub mod server;

pub use app::App;
pub use request::{RequestId, RequestIdExt};
pub use server::HttpServer;
