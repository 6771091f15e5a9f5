//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Middleware and startup produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters through the `metrics` facade)
//!     → toolbar.rs (in-page request summary while DEBUG is on)
//! ```
//!
//! # Design Decisions
//! - No recorder is installed here; the embedding binary chooses one
//! - The toolbar is optional and compiled behind a cargo feature

pub mod logging;
pub mod metrics;
pub mod toolbar;
