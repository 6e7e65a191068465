//! # Mortem Utilities
//!
//! Shared utilities and logging setup for the Mortem binaries.
//!
//! Libraries in the workspace only emit `tracing` events; installing a
//! subscriber is left to binaries through [`logging::init`].

pub mod logging;

// Re-export commonly used logging items for convenience
pub use logging::{LogConfig, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
