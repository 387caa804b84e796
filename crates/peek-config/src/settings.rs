//! Settings model
//!
//! `ConfigFile` is the on-disk shape (every field optional so layers can be
//! merged); `Settings` is the resolved view handed to sessions.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default maximum depth of nested calls to functions defined in expressions
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Default number of interpreter steps before an evaluation is abandoned
pub const DEFAULT_STEP_LIMIT: u64 = 100_000;

/// One configuration file (global or project)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Expression evaluation settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<ExpressionFileConfig>,

    /// Diagnostic output settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticsFileConfig>,
}

/// `[expression]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ExpressionFileConfig {
    /// Resolve declarations from debug information to real source locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_source_locations: Option<bool>,

    /// Evaluate submissions as top-level declarations by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_level: Option<bool>,

    /// Maximum call depth for interpreted functions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_call_depth: Option<usize>,

    /// Maximum number of interpreter steps per evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_limit: Option<u64>,
}

/// `[diagnostics]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsFileConfig {
    /// "auto", "always" or "never"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// "human" or "json"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load a configuration file from disk
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate field values that the type system cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(expression) = &self.expression {
            if expression.max_call_depth == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "expression.max_call_depth".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            if expression.step_limit == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "expression.step_limit".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if let Some(diagnostics) = &self.diagnostics {
            if let Some(color) = &diagnostics.color {
                ColorSetting::parse("diagnostics.color", color)?;
            }
            if let Some(format) = &diagnostics.format {
                OutputFormat::parse("diagnostics.format", format)?;
            }
        }

        Ok(())
    }
}

/// Color preference for rendered diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSetting {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorSetting {
    /// Parse a color value, naming `field` in the error
    pub fn parse(field: &str, value: &str) -> ConfigResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorSetting::Auto),
            "always" => Ok(ColorSetting::Always),
            "never" => Ok(ColorSetting::Never),
            other => Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("must be 'auto', 'always', or 'never', got '{}'", other),
            }),
        }
    }
}

/// Output format for failed evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl OutputFormat {
    /// Parse a format value, naming `field` in the error
    pub fn parse(field: &str, value: &str) -> ConfigResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: format!("must be 'human' or 'json', got '{}'", other),
            }),
        }
    }
}

/// Resolved expression settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionSettings {
    pub use_source_locations: bool,
    pub top_level: bool,
    pub max_call_depth: usize,
    pub step_limit: u64,
}

impl Default for ExpressionSettings {
    fn default() -> Self {
        Self {
            use_source_locations: true,
            top_level: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

/// Resolved diagnostic output settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiagnosticsSettings {
    pub color: ColorSetting,
    pub format: OutputFormat,
}

/// Fully merged settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    pub expression: ExpressionSettings,
    pub diagnostics: DiagnosticsSettings,
}

impl Settings {
    /// Apply one configuration layer on top of these settings.
    ///
    /// Only fields present in `file` override. The file must already be validated.
    pub fn apply(&mut self, file: &ConfigFile) -> ConfigResult<()> {
        if let Some(expression) = &file.expression {
            if let Some(v) = expression.use_source_locations {
                self.expression.use_source_locations = v;
            }
            if let Some(v) = expression.top_level {
                self.expression.top_level = v;
            }
            if let Some(v) = expression.max_call_depth {
                self.expression.max_call_depth = v;
            }
            if let Some(v) = expression.step_limit {
                self.expression.step_limit = v;
            }
        }

        if let Some(diagnostics) = &file.diagnostics {
            if let Some(color) = &diagnostics.color {
                self.diagnostics.color = ColorSetting::parse("diagnostics.color", color)?;
            }
            if let Some(format) = &diagnostics.format {
                self.diagnostics.format = OutputFormat::parse("diagnostics.format", format)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[expression]
use_source_locations = false
"#;
        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(
            config.expression.unwrap().use_source_locations,
            Some(false)
        );
        assert!(config.diagnostics.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[expression]
use_locations = false
"#;
        let result: Result<ConfigFile, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_call_depth_rejected() {
        let config = ConfigFile {
            expression: Some(ExpressionFileConfig {
                max_call_depth: Some(0),
                ..Default::default()
            }),
            diagnostics: None,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_invalid_color_rejected() {
        let config = ConfigFile {
            expression: None,
            diagnostics: Some(DiagnosticsFileConfig {
                color: Some("sometimes".to_string()),
                format: None,
            }),
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("diagnostics.color"));
    }

    #[test]
    fn test_apply_overrides_only_present_fields() {
        let mut settings = Settings::default();
        let layer = ConfigFile {
            expression: Some(ExpressionFileConfig {
                step_limit: Some(10),
                ..Default::default()
            }),
            diagnostics: Some(DiagnosticsFileConfig {
                color: None,
                format: Some("json".to_string()),
            }),
        };
        settings.apply(&layer).unwrap();

        assert_eq!(settings.expression.step_limit, 10);
        assert!(settings.expression.use_source_locations);
        assert_eq!(settings.expression.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        assert_eq!(settings.diagnostics.format, OutputFormat::Json);
        assert_eq!(settings.diagnostics.color, ColorSetting::Auto);
    }
}
