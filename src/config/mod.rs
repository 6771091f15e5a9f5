//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse into a key/value store)
//!     → init.rs (legacy key migration, default merge, debug CSP)
//!     → schema.rs (typed views read once by each subsystem)
//! ```
//!
//! # Design Decisions
//! - The store is a flat map of upper-case keys, values keep their JSON shape
//! - Defaults never overwrite keys the application already set
//! - An explicitly empty container is a value, not an absence

pub mod defaults;
pub mod init;
pub mod loader;
pub mod schema;
pub mod store;

pub use init::{init_config, Deprecation};
pub use loader::load_config;
pub use schema::{CspPolicy, CspSources, RateLimitSettings, SecureHeadersConfig};
pub use store::Config;
