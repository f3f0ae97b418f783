//! Logging setup for the provider process.
//!
//! All logs go to **stderr**: stdout is reserved for the handshake line the
//! host reads when it spawns the plugin.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `xyz_provider=debug`)
//!
//! ```bash
//! # Trace every registration sent to the host
//! RUST_LOG=xyz_provider=debug ./hemmer-provider-xyz
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber.
///
/// Respects `RUST_LOG` and falls back to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LOG_LEVEL);
}

/// Initialize logging with a custom default level used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if a subscriber was already set.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LOG_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter parsing and the idempotent initializer are exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_LEVEL).is_ok());
        assert!(EnvFilter::try_new("xyz_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,xyz_provider=debug").is_ok());
    }

    #[test]
    fn test_try_init_logging_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
