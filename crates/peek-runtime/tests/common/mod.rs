//! Shared test utilities
//!
//! A [`Harness`] is one session evaluating against one frame snapshot.

#![allow(dead_code)]

use peek_runtime::{
    EvalError, EvalOptions, EvalOutcome, ExpressionFailure, FrameSnapshot, Session,
};

pub struct Harness {
    pub session: Session,
    pub frame: FrameSnapshot,
}

impl Harness {
    /// Session over an empty frame with no debug information
    pub fn new() -> Self {
        Self::with_frame(FrameSnapshot::empty())
    }

    /// Session over a frame snapshot given as JSON
    pub fn with_json(json: &str) -> Self {
        match FrameSnapshot::from_json(json) {
            Ok(frame) => Self::with_frame(frame),
            Err(err) => panic!("bad test snapshot: {}", err),
        }
    }

    pub fn with_frame(frame: FrameSnapshot) -> Self {
        Self {
            session: Session::new(),
            frame,
        }
    }

    pub fn eval_with(&self, text: &str, options: &EvalOptions) -> Result<EvalOutcome, EvalError> {
        self.session.evaluate(text, options, &self.frame, &self.frame)
    }

    pub fn eval(&self, text: &str) -> Result<EvalOutcome, EvalError> {
        self.eval_with(text, &EvalOptions::statement())
    }

    /// Summary of the value of a statement-mode submission that must succeed
    pub fn value(&self, text: &str) -> String {
        match self.eval(text) {
            Ok(outcome) => match outcome.value {
                Some(value) => value.summary,
                None => panic!("{:?} produced no value", text),
            },
            Err(err) => panic!("evaluation of {:?} failed:\n{}", text, err),
        }
    }

    /// Run a top-level submission that must succeed
    pub fn top(&self, text: &str) -> EvalOutcome {
        match self.eval_with(text, &EvalOptions::top_level()) {
            Ok(outcome) => outcome,
            Err(err) => panic!("top-level evaluation of {:?} failed:\n{}", text, err),
        }
    }

    /// Diagnostics of a submission that must fail with expression errors
    pub fn failure_with(&self, text: &str, options: &EvalOptions) -> ExpressionFailure {
        match self.eval_with(text, options) {
            Ok(_) => panic!("evaluation of {:?} unexpectedly succeeded", text),
            Err(EvalError::Expression(failure)) => failure,
            Err(other) => panic!("evaluation of {:?} failed without diagnostics: {}", text, other),
        }
    }

    pub fn failure(&self, text: &str) -> ExpressionFailure {
        self.failure_with(text, &EvalOptions::statement())
    }

    /// Rendered diagnostics of a statement-mode submission that must fail
    pub fn rendered(&self, text: &str) -> String {
        self.failure(text).rendered()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
