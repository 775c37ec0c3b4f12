//! Logging setup using `tracing-subscriber`.
//!
//! Logs go to stderr so that `--format json` output on stdout stays
//! machine readable.
//!
//! - `warn`: failed compiles, unreadable settings
//! - `info`: one line per compiled file
//! - `debug`: target state transitions, settings load/save
//! - `trace`: file system events seen by `watch`

use std::io;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: Level::WARN, with_target: false, with_ansi: true }
    }
}

impl LogConfig {
    /// Create a `LogConfig` from CLI verbosity count.
    ///
    /// - 0 (no `-v`): warn level
    /// - 1 (`-v`): info level
    /// - 2 (`-vv`): debug level
    /// - 3+: trace level
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self { level, with_target: verbosity >= 2, ..Default::default() }
    }
}

/// Initialize the global tracing subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target)
        .without_time();

    tracing_subscriber::registry().with(build_env_filter(config.level)).with(layer).init();
}

/// Build an `EnvFilter` from the given level, respecting `RUST_LOG` env var.
fn build_env_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();

    // Dependencies stay at warn unless RUST_LOG says otherwise
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,lesswatch={level},lesswatch_cli={level}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_verbosity() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::WARN);
        assert_eq!(LogConfig::from_verbosity(1).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(2).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(7).level, Level::TRACE);
        assert!(!LogConfig::from_verbosity(1).with_target);
    }
}
