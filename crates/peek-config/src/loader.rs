//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::settings::{ColorSetting, ConfigFile, OutputFormat, Settings};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "peek.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.peek/config.toml) - lowest priority
/// 2. Project config (./peek.toml) - overrides global
/// 3. Environment variables (PEEK_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config path instead of ~/.peek/config.toml
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load settings starting from the given directory
    ///
    /// Walks up the directory tree to find peek.toml, layers it over the global
    /// config (if any), then applies environment overrides.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Settings> {
        let mut settings = Settings::default();

        // Global config is optional and never fatal when the home dir is missing
        if let Some(global) = self.load_global_config()? {
            settings.apply(&global)?;
        }

        if let Some(project) = self.find_project_config(start_dir)? {
            settings.apply(&project)?;
        }

        self.apply_env_overrides(&mut settings)?;
        Ok(settings)
    }

    /// Load settings from a specific config file (plus global and env layers)
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Settings> {
        let mut settings = Settings::default();
        if let Some(global) = self.load_global_config()? {
            settings.apply(&global)?;
        }
        settings.apply(&ConfigFile::load_from_file(config_path)?)?;
        self.apply_env_overrides(&mut settings)?;
        Ok(settings)
    }

    /// Find project configuration by walking up the directory tree
    fn find_project_config(&self, start_dir: &Path) -> ConfigResult<Option<ConfigFile>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                return ConfigFile::load_from_file(&config_path).map(Some);
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok(None),
            }
        }
    }

    /// Load global configuration from ~/.peek/config.toml
    fn load_global_config(&mut self) -> ConfigResult<Option<ConfigFile>> {
        if self.global_config_path.is_none() {
            match Self::global_config_dir() {
                Ok(dir) => self.global_config_path = Some(dir.join("config.toml")),
                Err(ConfigError::HomeNotFound) => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        match &self.global_config_path {
            Some(path) if path.exists() => ConfigFile::load_from_file(path).map(Some),
            _ => Ok(None),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Recognized variables: PEEK_USE_SOURCE_LOCATIONS, PEEK_TOP_LEVEL,
    /// PEEK_MAX_CALL_DEPTH, PEEK_STEP_LIMIT, PEEK_COLOR, PEEK_DIAGNOSTICS.
    fn apply_env_overrides(&self, settings: &mut Settings) -> ConfigResult<()> {
        if let Ok(value) = env::var("PEEK_USE_SOURCE_LOCATIONS") {
            settings.expression.use_source_locations = parse_bool(&value);
        }

        if let Ok(value) = env::var("PEEK_TOP_LEVEL") {
            settings.expression.top_level = parse_bool(&value);
        }

        if let Ok(value) = env::var("PEEK_MAX_CALL_DEPTH") {
            settings.expression.max_call_depth =
                parse_positive("PEEK_MAX_CALL_DEPTH", &value)? as usize;
        }

        if let Ok(value) = env::var("PEEK_STEP_LIMIT") {
            settings.expression.step_limit = parse_positive("PEEK_STEP_LIMIT", &value)?;
        }

        if let Ok(value) = env::var("PEEK_COLOR") {
            settings.diagnostics.color = ColorSetting::parse("PEEK_COLOR", &value)?;
        }

        if let Ok(value) = env::var("PEEK_DIAGNOSTICS") {
            settings.diagnostics.format = OutputFormat::parse("PEEK_DIAGNOSTICS", &value)?;
        }

        Ok(())
    }

    /// Get the global configuration directory (~/.peek)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".peek"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_positive(field: &str, value: &str) -> ConfigResult<u64> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a positive integer, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn isolated_loader(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_global_config_path(dir.path().join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[expression]
use_source_locations = false
"#,
        );

        let settings = isolated_loader(&temp_dir)
            .load_from_directory(temp_dir.path())
            .unwrap();
        assert!(!settings.expression.use_source_locations);
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[expression]
step_limit = 42
"#,
        );
        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let settings = isolated_loader(&temp_dir)
            .load_from_directory(&sub_dir)
            .unwrap();
        assert_eq!(settings.expression.step_limit, 42);
    }

    #[test]
    fn test_parse_bool_values() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("off"));
        assert!(!parse_bool("false"));
    }

    #[test]
    fn test_parse_positive_rejects_zero() {
        assert!(parse_positive("X", "0").is_err());
        assert!(parse_positive("X", "abc").is_err());
        assert_eq!(parse_positive("X", " 7 ").unwrap(), 7);
    }
}
