//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (force HTTPS, then decorate the response)
//!     → rate_limit.rs (key_func.rs picks the client key,
//!                      limits.rs parses the applicable limit)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Secure headers wrap the limiter, so 429 responses carry them too
//! - Rate-limit state is in memory and per process

pub mod headers;
pub mod key_func;
pub mod limits;
pub mod rate_limit;

pub use headers::{SecureHeaders, ViewOptions};
pub use key_func::{KeyFunc, KeyFuncRegistry};
pub use limits::RateLimit;
pub use rate_limit::{Authenticated, RateLimiter, UserRateLimit};
