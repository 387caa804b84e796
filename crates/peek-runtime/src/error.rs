//! Evaluation errors

use crate::diagnostic::{Diagnostic, DiagnosticReport, DIAG_VERSION};
use crate::provider::AccessError;
use crate::registry::SubmissionId;
use serde_json::json;
use thiserror::Error;

/// Error-class integer for failures of generic origin
pub const GENERIC_ERROR_TYPE: u32 = 1;
/// Error-class integer for expression-evaluation failures
pub const EXPRESSION_ERROR_TYPE: u32 = 2;

/// Diagnostics of one failed submission, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionFailure {
    pub submission: SubmissionId,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExpressionFailure {
    /// Structured record of every diagnostic
    pub fn report(&self) -> DiagnosticReport {
        DiagnosticReport::from_diagnostics(&self.diagnostics)
    }

    /// Show or hide the external locations of every diagnostic
    pub fn set_source_locations(&mut self, enabled: bool) {
        for diagnostic in &mut self.diagnostics {
            diagnostic.set_source_locations(enabled);
        }
    }

    /// Rendered text of every diagnostic, notes included
    pub fn rendered(&self) -> String {
        self.diagnostics
            .iter()
            .map(Diagnostic::to_human_string)
            .collect()
    }
}

/// Why an evaluation produced no value
#[derive(Debug, Error)]
pub enum EvalError {
    /// Syntax, lookup, redefinition or semantic errors (all recoverable)
    #[error("{}", .0.rendered())]
    Expression(ExpressionFailure),

    /// The caller abandoned the evaluation
    #[error("evaluation interrupted")]
    Interrupted,

    /// The live-process collaborator failed
    #[error(transparent)]
    Process(#[from] AccessError),
}

impl EvalError {
    /// Integer error class as seen by scripting clients
    pub fn error_type(&self) -> u32 {
        match self {
            EvalError::Expression(_) => EXPRESSION_ERROR_TYPE,
            EvalError::Interrupted | EvalError::Process(_) => GENERIC_ERROR_TYPE,
        }
    }

    pub fn failure(&self) -> Option<&ExpressionFailure> {
        match self {
            EvalError::Expression(failure) => Some(failure),
            _ => None,
        }
    }

    /// Structured error data: `{version, type, errors: [report]}`
    pub fn error_data(&self) -> serde_json::Value {
        let errors = match self {
            EvalError::Expression(failure) => {
                vec![serde_json::to_value(failure.report()).unwrap_or(serde_json::Value::Null)]
            }
            other => vec![json!({
                "version": DIAG_VERSION,
                "details": [{
                    "severity": "error",
                    "message": other.to_string(),
                    "rendered": format!("error: {}\n", other),
                    "source_location": {
                        "file": "",
                        "line": 0,
                        "column": 0,
                        "hidden": true,
                        "in_user_input": false,
                    },
                }],
            })],
        };
        json!({
            "version": DIAG_VERSION,
            "type": self.error_type(),
            "errors": errors,
        })
    }
}

/// Result type for evaluations
pub type EvalResult<T> = Result<T, EvalError>;
