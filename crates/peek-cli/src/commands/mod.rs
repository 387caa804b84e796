pub mod eval;
pub mod repl;

use crate::config::Config;
use anyhow::{Context, Result};
use peek_runtime::{ColorMode, DiagnosticFormatter, EvalError, EvalOutcome, FrameSnapshot};
use std::path::Path;

/// Load the frame to evaluate against; no file means an empty frame
fn load_frame(path: Option<&Path>) -> Result<FrameSnapshot> {
    match path {
        Some(path) => FrameSnapshot::from_path(path)
            .with_context(|| format!("Failed to load frame snapshot: {}", path.display())),
        None => Ok(FrameSnapshot::empty()),
    }
}

fn formatter(config: &Config) -> DiagnosticFormatter {
    if config.no_color() {
        DiagnosticFormatter::plain()
    } else {
        DiagnosticFormatter::new(ColorMode::from(config.settings.diagnostics.color))
    }
}

/// Print a value to stdout and any warnings to stderr
fn print_outcome(outcome: &EvalOutcome, json: bool, formatter: &DiagnosticFormatter) {
    if json {
        if let Some(value) = &outcome.value {
            println!(
                "{}",
                serde_json::json!({
                    "name": value.name,
                    "type": value.type_name,
                    "value": value.summary,
                })
            );
        }
    } else if let Some(value) = &outcome.value {
        println!("{}", value);
    }
    formatter.emit_all(&outcome.warnings);
}

/// Print a failed evaluation: JSON error data to stdout, or rendered diagnostics to stderr
fn print_error(err: &EvalError, json: bool, formatter: &DiagnosticFormatter) {
    if json {
        println!("{}", err.error_data());
        return;
    }
    match err.failure() {
        Some(failure) => formatter.emit_all(&failure.diagnostics),
        None => eprintln!("error: {}", err),
    }
}
