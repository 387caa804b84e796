//! CLI configuration
//!
//! Expression and diagnostics settings come from peek-config's layered
//! loader (global file, project `peek.toml`, `PEEK_*` overrides). A few
//! CLI-only knobs are read straight from the environment.

use anyhow::{Context, Result};
use peek_config::{ColorSetting, ConfigLoader, OutputFormat, Settings};
use std::env;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Merged settings from configuration files and environment
    pub settings: Settings,
    /// Custom history file path (PEEK_HISTORY_FILE=/path/to/file)
    pub history_file: Option<PathBuf>,
}

impl Config {
    /// Load settings for the current directory
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir().context("Failed to determine the working directory")?;
        let settings = ConfigLoader::new()
            .load_from_directory(&cwd)
            .context("Failed to load configuration")?;
        tracing::debug!(?settings, "loaded configuration");
        Ok(Self {
            settings,
            history_file: env::var("PEEK_HISTORY_FILE").ok().map(PathBuf::from),
        })
    }

    /// JSON diagnostics unless asked otherwise (`[diagnostics] format = "json"`)
    pub fn default_json(&self) -> bool {
        self.settings.diagnostics.format == OutputFormat::Json
    }

    pub fn no_color(&self) -> bool {
        self.settings.diagnostics.color == ColorSetting::Never || env::var("NO_COLOR").is_ok()
    }

    /// Get the history file path
    ///
    /// Returns:
    /// 1. PEEK_HISTORY_FILE if set
    /// 2. ~/.peek/history if home directory exists
    /// 3. None otherwise
    pub fn get_history_path(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.history_file {
            return Some(path.clone());
        }
        dirs::home_dir().map(|home| home.join(".peek").join("history"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.default_json());
        assert!(config.settings.expression.use_source_locations);
    }

    #[test]
    fn test_json_format_setting() {
        let mut config = Config::default();
        config.settings.diagnostics.format = OutputFormat::Json;
        assert!(config.default_json());
    }

    #[test]
    #[serial]
    fn test_never_color_disables_color() {
        env::remove_var("NO_COLOR");
        let mut config = Config::default();
        assert!(!config.no_color());
        config.settings.diagnostics.color = ColorSetting::Never;
        assert!(config.no_color());
    }

    #[test]
    fn test_get_history_path_custom() {
        let config = Config {
            history_file: Some(PathBuf::from("/tmp/custom")),
            ..Config::default()
        };
        assert_eq!(
            config.get_history_path(),
            Some(PathBuf::from("/tmp/custom"))
        );
    }

    #[test]
    fn test_get_history_path_default() {
        let config = Config::default();
        let path = config.get_history_path();
        // Should be Some(~/.peek/history) if home directory exists
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path, Some(home.join(".peek").join("history")));
        }
    }

    #[test]
    #[serial]
    fn test_load_applies_environment() {
        env::set_var("PEEK_DIAGNOSTICS", "json");
        let config = Config::load().unwrap();
        assert!(config.default_json());
        env::remove_var("PEEK_DIAGNOSTICS");
    }
}
