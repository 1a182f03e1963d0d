//! Configuration for the feed session library and `feedctl`.
//!
//! Settings live in a TOML file under the XDG config directory. Every field
//! has a default, so a missing file or an empty one is a valid configuration.

/// Commented default template and `config init` support.
pub mod default;
/// Configuration error types.
pub mod error;
/// TOML loading with position-aware parse errors.
pub mod loader;
/// Configuration schema types.
pub mod schema;
/// Config path resolution.
pub mod xdg;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Config, LoggingConfig, ModelConfig, SessionSection};
