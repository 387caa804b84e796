//! Peek Configuration System
//!
//! Provides configuration management for expression evaluation sessions:
//! - Global user configuration (~/.peek/config.toml)
//! - Project configuration (./peek.toml)
//! - Environment variable overrides (PEEK_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.peek/config.toml)
//! 2. Project config (./peek.toml, searched upwards)
//! 3. Environment variables (PEEK_*)
//! 4. CLI flags and runtime toggles (handled by the caller)
//!
//! # Example
//!
//! ```no_run
//! use peek_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let settings = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("source locations: {}", settings.expression.use_source_locations);
//! ```

pub mod loader;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
pub use settings::{
    ColorSetting, ConfigFile, DiagnosticsSettings, ExpressionSettings, OutputFormat, Settings,
};
