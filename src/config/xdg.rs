//! Platform-aware config path resolution.
//!
//! `$XDG_CONFIG_HOME` wins on every platform. Otherwise Linux uses
//! `~/.config` and macOS uses `~/Library/Application Support`.

use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "feed-session";

/// Returns the configuration directory for feed-session.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join(APP_NAME);
        }
    }
    platform_config_dir().join(APP_NAME)
}

fn platform_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::home_dir()
            .map(|home| home.join(".config"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Returns the path to the main configuration file, `config_dir()/config.toml`.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Creates a directory and its parents with mode 0700.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_xdg_config<F: FnOnce()>(value: Option<&str>, f: F) {
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        match value {
            Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
        f();
        match original {
            Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    #[test]
    #[serial]
    fn config_dir_honors_xdg_override() {
        with_xdg_config(Some("/tmp/xdg-test"), || {
            assert_eq!(config_dir(), PathBuf::from("/tmp/xdg-test/feed-session"));
            assert_eq!(
                config_path(),
                PathBuf::from("/tmp/xdg-test/feed-session/config.toml")
            );
        });
    }

    #[test]
    #[serial]
    fn config_dir_ignores_empty_override() {
        with_xdg_config(Some(""), || {
            assert!(config_dir().ends_with(APP_NAME));
            assert_ne!(config_dir(), PathBuf::from(APP_NAME));
        });
    }

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let nested = tmp.path().join("a").join("b");
        ensure_dir(&nested).expect("ensure_dir");
        assert!(nested.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&nested).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
