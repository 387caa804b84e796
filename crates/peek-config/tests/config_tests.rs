//! Configuration loading and precedence tests

use peek_config::{
    ColorSetting, ConfigError, ConfigLoader, DiagnosticsSettings, ExpressionSettings, OutputFormat,
    Settings, CONFIG_FILE_NAME,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn create_config_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let config_path = dir.join(name);
    fs::write(&config_path, content).unwrap();
    config_path
}

fn clear_env() {
    for var in [
        "PEEK_USE_SOURCE_LOCATIONS",
        "PEEK_TOP_LEVEL",
        "PEEK_MAX_CALL_DEPTH",
        "PEEK_STEP_LIMIT",
        "PEEK_COLOR",
        "PEEK_DIAGNOSTICS",
    ] {
        env::remove_var(var);
    }
}

// ============================================================================
// Loading
// ============================================================================

#[test]
#[serial]
fn test_defaults_without_any_config() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("missing.toml"));
    let settings = loader.load_from_directory(temp_dir.path()).unwrap();

    assert_eq!(settings, Settings::default());
    assert!(settings.expression.use_source_locations);
    assert!(!settings.expression.top_level);
}

#[test]
#[serial]
fn test_project_overrides_global() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let global = create_config_file(
        temp_dir.path(),
        "global.toml",
        r#"
[expression]
use_source_locations = false
max_call_depth = 8

[diagnostics]
color = "never"
"#,
    );
    create_config_file(
        temp_dir.path(),
        CONFIG_FILE_NAME,
        r#"
[expression]
use_source_locations = true
"#,
    );

    let mut loader = ConfigLoader::with_global_config_path(global);
    let settings = loader.load_from_directory(temp_dir.path()).unwrap();

    assert!(settings.expression.use_source_locations);
    assert_eq!(settings.expression.max_call_depth, 8);
    assert_eq!(settings.diagnostics.color, ColorSetting::Never);
}

#[test]
#[serial]
fn test_env_overrides_project() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        CONFIG_FILE_NAME,
        r#"
[expression]
use_source_locations = true
step_limit = 500
"#,
    );

    env::set_var("PEEK_USE_SOURCE_LOCATIONS", "false");
    env::set_var("PEEK_DIAGNOSTICS", "json");
    let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("missing.toml"));
    let settings = loader.load_from_directory(temp_dir.path()).unwrap();
    clear_env();

    assert!(!settings.expression.use_source_locations);
    assert_eq!(settings.expression.step_limit, 500);
    assert_eq!(settings.diagnostics.format, OutputFormat::Json);
}

#[rstest]
#[case::source_locations_off("PEEK_USE_SOURCE_LOCATIONS", "0", |s: &mut Settings| s.expression.use_source_locations = false)]
#[case::top_level_on("PEEK_TOP_LEVEL", "yes", |s: &mut Settings| s.expression.top_level = true)]
#[case::call_depth("PEEK_MAX_CALL_DEPTH", "16", |s: &mut Settings| s.expression.max_call_depth = 16)]
#[case::step_limit("PEEK_STEP_LIMIT", " 250 ", |s: &mut Settings| s.expression.step_limit = 250)]
#[case::color_any_case("PEEK_COLOR", "ALWAYS", |s: &mut Settings| s.diagnostics.color = ColorSetting::Always)]
#[case::json_output("PEEK_DIAGNOSTICS", "json", |s: &mut Settings| s.diagnostics.format = OutputFormat::Json)]
#[serial]
fn test_each_env_override(#[case] var: &str, #[case] value: &str, #[case] expect: fn(&mut Settings)) {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var(var, value);
    let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("missing.toml"));
    let settings = loader.load_from_directory(temp_dir.path());
    clear_env();

    let mut expected = Settings::default();
    expect(&mut expected);
    assert_eq!(settings.unwrap(), expected);
}

#[test]
#[serial]
fn test_full_project_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        CONFIG_FILE_NAME,
        r#"
[expression]
use_source_locations = false
top_level = true
max_call_depth = 32
step_limit = 10000

[diagnostics]
color = "always"
format = "json"
"#,
    );

    let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("missing.toml"));
    let settings = loader.load_from_directory(temp_dir.path()).unwrap();
    assert_eq!(
        settings,
        Settings {
            expression: ExpressionSettings {
                use_source_locations: false,
                top_level: true,
                max_call_depth: 32,
                step_limit: 10_000,
            },
            diagnostics: DiagnosticsSettings {
                color: ColorSetting::Always,
                format: OutputFormat::Json,
            },
        }
    );
}

#[rstest]
#[case::zero("PEEK_MAX_CALL_DEPTH", "0")]
#[case::not_a_number("PEEK_STEP_LIMIT", "lots")]
#[case::unknown_color("PEEK_COLOR", "sometimes")]
#[case::unknown_format("PEEK_DIAGNOSTICS", "xml")]
#[serial]
fn test_invalid_env_value_names_variable(#[case] var: &str, #[case] value: &str) {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var(var, value);
    let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("missing.toml"));
    let result = loader.load_from_directory(temp_dir.path());
    clear_env();

    match result {
        Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, var),
        other => panic!("expected an invalid value error, got {:?}", other),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[test]
#[serial]
fn test_invalid_toml_reports_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), CONFIG_FILE_NAME, "[expression\n");

    let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("missing.toml"));
    match loader.load_from_file(&path) {
        Err(ConfigError::TomlParseError { file, .. }) => assert_eq!(file, path),
        other => panic!("expected TOML parse error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_missing_explicit_file_is_not_found() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("missing.toml"));
    let result = loader.load_from_file(&temp_dir.path().join("nope.toml"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}
