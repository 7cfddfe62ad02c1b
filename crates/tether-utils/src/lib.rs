//! # Tether Utilities
//!
//! Shared logging and configuration helpers for Tether.
//!
//! This crate provides the logging setup used by the `tether` binary and by
//! hosts embedding `tether-core`, built on `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    LogFormat, LogLevel, LoggingError, LoggingGuard, init_logging, init_logging_to_dir, init_logging_with_level,
};
pub use tracing::{debug, error, info, trace, warn};
