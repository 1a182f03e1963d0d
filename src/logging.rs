//! Logging initialization.
//!
//! Configures the `tracing` subscriber with level filtering via the
//! `FEED_LOG` environment variable, falling back to the configured level.
//!
//! ```bash
//! FEED_LOG=debug feedctl replay ops.jsonl
//! FEED_LOG=feed_session::session=trace,warn feedctl replay ops.jsonl
//! ```

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding filter directives.
pub const LOG_ENV_VAR: &str = "FEED_LOG";

/// Builds the filter: `FEED_LOG` if set and valid, else `default_level`,
/// else `info`.
pub fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber, writing to stderr.
///
/// Does nothing if a global subscriber is already set.
pub fn init(default_level: &str) {
    let result = fmt()
        .with_env_filter(build_filter(default_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
