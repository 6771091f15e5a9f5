//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! SIGTERM/SIGINT
//!     → wait_for_signal()
//!     → Shutdown::trigger()
//!     → every subscriber (HTTP server) stops accepting and drains
//! ```

pub mod shutdown;

pub use shutdown::{wait_for_signal, Shutdown};
