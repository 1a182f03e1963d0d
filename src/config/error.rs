//! Configuration error types for loading and parsing TOML config files.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading, parsing, or writing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read configuration file: {path}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("Invalid configuration at {path}:{line}:{column}: {message}")]
    ParseError {
        path: PathBuf,
        /// One-based line of the error (0 if unknown).
        line: usize,
        /// One-based column of the error (0 if unknown).
        column: usize,
        message: String,
    },

    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// A configuration file already exists at the target path.
    #[error("Configuration file already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Failed to write a configuration file to disk.
    #[error("Failed to write configuration file: {path}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration to TOML.
    #[error("Failed to serialize configuration: {message}")]
    SerializeError { message: String },

    /// A duration field is not a valid humantime string.
    #[error("Invalid duration for {field}: '{value}' ({message})")]
    InvalidDuration {
        /// Dotted key of the offending field, e.g. `session.lifetime`.
        field: &'static str,
        value: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn parse_error_display_includes_position() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("/tmp/config.toml"),
            line: 3,
            column: 7,
            message: "expected `=`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration at /tmp/config.toml:3:7: expected `=`"
        );
    }

    #[test]
    fn read_error_exposes_io_source() {
        let err = ConfigError::ReadError {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let source = err.source().expect("ReadError should carry its io::Error");
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn invalid_duration_names_field_and_value() {
        let err = ConfigError::InvalidDuration {
            field: "session.lifetime",
            value: "forever".to_string(),
            message: "unknown unit".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("session.lifetime"));
        assert!(msg.contains("forever"));
    }

    #[test]
    fn already_exists_display() {
        let err = ConfigError::AlreadyExists {
            path: PathBuf::from("/home/u/.config/feed-session/config.toml"),
        };
        assert!(err.to_string().starts_with("Configuration file already exists"));
    }
}
