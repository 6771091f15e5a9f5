//! Template environment and theme support.
//!
//! # Data Flow
//! ```text
//! TemplateLoader (filesystem / memory)
//!     → ThemeLoader (optional, prefers "{theme}/{name}")
//!     → TemplateEnv::compile (Tera + registered filters)
//!     → shared as Arc<Tera> with request handlers
//! ```

pub mod engine;
pub mod filters;
pub mod loader;

pub use engine::TemplateEnv;
pub use filters::{safe_redirect, SAFE_REDIRECT};
pub use loader::{FileSystemLoader, MemoryLoader, TemplateLoader, ThemeLoader};
