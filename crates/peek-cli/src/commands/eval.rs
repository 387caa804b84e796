//! Eval command - evaluate expressions in one session

use crate::config::Config;
use anyhow::Result;
use peek_runtime::{EvalOptions, Session};
use std::path::PathBuf;

/// Arguments of `peek eval`
#[derive(Debug, Clone, Default)]
pub struct EvalArgs {
    pub exprs: Vec<String>,
    pub frame: Option<PathBuf>,
    pub top_level: bool,
    pub json: bool,
    pub no_source_locations: bool,
}

/// Evaluate every expression in order; returns whether all of them succeeded
pub fn run(args: &EvalArgs, config: &Config) -> Result<bool> {
    let frame = super::load_frame(args.frame.as_deref())?;

    let mut settings = config.settings.expression.clone();
    if args.no_source_locations {
        settings.use_source_locations = false;
    }
    let options = if args.top_level || settings.top_level {
        EvalOptions::top_level()
    } else {
        EvalOptions::statement()
    };
    let session = Session::with_settings(settings);
    let formatter = super::formatter(config);

    let mut succeeded = true;
    for expr in &args.exprs {
        match session.evaluate(expr, &options, &frame, &frame) {
            Ok(outcome) => super::print_outcome(&outcome, args.json, &formatter),
            Err(err) => {
                tracing::debug!(error_type = err.error_type(), "evaluation failed");
                succeeded = false;
                super::print_error(&err, args.json, &formatter);
            }
        }
    }
    Ok(succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(exprs: &[&str]) -> EvalArgs {
        EvalArgs {
            exprs: exprs.iter().map(|e| e.to_string()).collect(),
            ..EvalArgs::default()
        }
    }

    #[test]
    fn test_eval_valid_expressions() {
        let result = run(&args(&["int $x = 4;", "$x * $x"]), &Config::default());
        assert!(result.unwrap());
    }

    #[test]
    fn test_eval_reports_failure() {
        let result = run(&args(&["1 + undeclared"]), &Config::default());
        assert!(!result.unwrap());
    }

    #[test]
    fn test_eval_against_frame_file() {
        let mut frame = NamedTempFile::new().unwrap();
        writeln!(
            frame,
            r#"{{ "scopes": [{{ "name": "main", "variables": [{{ "name": "n", "type": "int", "value": 6 }}] }}] }}"#
        )
        .unwrap();
        let mut eval = args(&["n * 7"]);
        eval.frame = Some(frame.path().to_path_buf());
        assert!(run(&eval, &Config::default()).unwrap());
    }

    #[test]
    fn test_eval_missing_frame_file() {
        let mut eval = args(&["1"]);
        eval.frame = Some(PathBuf::from("nonexistent-frame.json"));
        assert!(run(&eval, &Config::default()).is_err());
    }
}
