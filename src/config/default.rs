//! Default configuration template and `config init` support.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::error::ConfigError;
use crate::config::xdg;

/// Commented TOML template holding every default value.
///
/// Must stay equal to `Config::default()` when parsed.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Feed Session Configuration
#
# All values shown below are the built-in defaults.
# Location: $XDG_CONFIG_HOME/feed-session/config.toml

# ==============================================================================
# Model
# ==============================================================================

[model]

# Root children shown before the first synthetic "load more" token.
# 0 disables synthetic paging and shows every root child at once.
initial_page_size = 0

# Root children revealed each time a synthetic token is handled.
# 0 reuses initial_page_size.
page_size = 0

# If fewer than this many children would remain after a page, the page is
# extended to the end instead of ending in another token.
min_page_size = 0

# ==============================================================================
# Session
# ==============================================================================

[session]

# How long a session stays alive after creation.
# Examples: "30m", "1h", "12h"
lifetime = "1h"

# Apply a paging response only to the session that requested it.
# When false, every session holding the token's parent is updated.
limit_paging_updates = true

# Schema version stamped on new session metadata.
schema_version = 2

# ==============================================================================
# Logging
# ==============================================================================

[logging]

# Options: "error", "warn", "info", "debug", "trace"
# The FEED_LOG environment variable takes precedence when set.
level = "info"
"#;

/// Writes the default template to the XDG config path.
///
/// - Existing file and `force == false`: `ConfigError::AlreadyExists`.
/// - Existing file and `force == true`: the old file is kept as `.toml.backup`.
pub fn create_default_config(force: bool) -> Result<PathBuf, ConfigError> {
    let path = xdg::config_path();
    create_default_config_at(&path, force)?;
    Ok(path)
}

/// Same as [`create_default_config`] for an explicit path.
pub fn create_default_config_at(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() {
        if !force {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        let backup_path = path.with_extension("toml.backup");
        fs::rename(path, &backup_path).map_err(|e| ConfigError::WriteError {
            path: backup_path.clone(),
            source: e,
        })?;
        tracing::info!("Backed up existing config to {}", backup_path.display());
    }

    write_default_config(path)?;
    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}

fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        xdg::ensure_dir(parent).map_err(|e| ConfigError::WriteError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}
