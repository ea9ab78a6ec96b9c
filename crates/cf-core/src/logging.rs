//! Logging bootstrap
//!
//! `RUST_LOG` takes precedence; otherwise the configured level is used.

use crate::config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Build the filter for a configured level
pub fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Install the global fmt subscriber
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(level: LogLevel) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(false)
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init(LogLevel::Warn);
        init(LogLevel::Debug);
    }
}
