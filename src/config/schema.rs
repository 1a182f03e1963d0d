//! TOML configuration schema types.
//!
//! All structs derive `Deserialize` and `Serialize` with `#[serde(default)]`,
//! so any subset of keys is a valid file. Duration fields are humantime
//! strings (`"1h"`, `"30m"`) parsed when the config is converted into the
//! runtime settings types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::model::PagingConfig;
use crate::session::SessionConfig;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
///
/// ```toml
/// [model]
/// [session]
/// [logging]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Paging of the root level of each provider.
    pub model: ModelConfig,
    /// Session lifetime and update behavior.
    pub session: SessionSection,
    /// Log output settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Paging settings for new model providers.
    pub fn paging(&self) -> PagingConfig {
        PagingConfig {
            initial_page_size: self.model.initial_page_size,
            page_size: self.model.page_size,
            min_page_size: self.model.min_page_size,
        }
    }

    /// Session settings, with `session.lifetime` parsed.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        Ok(SessionConfig {
            lifetime: self.session.lifetime_duration()?,
            limit_paging_updates: self.session.limit_paging_updates,
            schema_version: self.session.schema_version,
        })
    }

    /// Checks the fields serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.lifetime_duration()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Synthetic paging of root-level children.
///
/// All zeros (the default) shows every root child at once.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Root children bound by the first page. `0` disables synthetic tokens.
    pub initial_page_size: usize,
    /// Root children revealed by each later page. `0` reuses `initial_page_size`.
    pub page_size: usize,
    /// Extend a page to the end rather than leave fewer children behind it.
    pub min_page_size: usize,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// `[session]` table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    /// How long a session stays alive after creation, e.g. `"1h"`.
    pub lifetime: String,
    /// Apply paging responses only to the session that asked for them.
    pub limit_paging_updates: bool,
    /// Schema version stamped on new session metadata.
    pub schema_version: i32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            lifetime: "1h".to_string(),
            limit_paging_updates: true,
            schema_version: 2,
        }
    }
}

impl SessionSection {
    pub fn lifetime_duration(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(&self.lifetime).map_err(|e| ConfigError::InvalidDuration {
            field: "session.lifetime",
            value: self.lifetime.clone(),
            message: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// `[logging]` table. `FEED_LOG` overrides `level` when set.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`, or any
    /// `EnvFilter` directive string.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
