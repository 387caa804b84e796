//! Successful evaluation, persistence across submissions, and interruption

mod common;

use common::*;
use pretty_assertions::assert_eq;
use peek_config::ExpressionSettings;
use peek_runtime::{
    AccessError, Binding, DebugInfoLocation, DebugInfoProvider, DeclId, DiagnosticKind, EvalError,
    EvalOptions, EvaluationContext, ExternalDecl, FrameSnapshot, InterruptFlag, ProcessAccessor,
    Session, SubmissionId,
};
use std::cell::Cell;

// ============================================================================
// Result variables
// ============================================================================

#[test]
fn test_result_variables_are_numbered() {
    let harness = Harness::new();
    let first = harness.eval("1 + 2").unwrap();
    let Some(value) = first.value else {
        panic!("expected a value");
    };
    assert_eq!(value.name, "$0");
    assert_eq!(value.type_name, "int");
    assert_eq!(value.to_string(), "(int) $0 = 3");

    assert_eq!(harness.value("$0 * 2"), "6");
    assert_eq!(harness.value("$1 - $0"), "3");
}

#[test]
fn test_declaration_only_submission_has_no_value() {
    let harness = Harness::new();
    let outcome = harness.eval("int $x = 4;").unwrap();
    assert!(outcome.value.is_none());
    assert_eq!(outcome.submission, SubmissionId(0));
    assert_eq!(harness.value("$x * $x"), "16");
}

#[test]
fn test_records_persist_by_value() {
    let harness = Harness::new();
    harness.top("struct Pair { int a; int b; };");
    harness.eval("Pair $p; $p.a = 3; $p.b = 4;").unwrap();
    assert_eq!(harness.value("$p.a * $p.b"), "12");
    harness.eval("Pair copy = $p; copy.a = 100;").unwrap();
    assert_eq!(harness.value("$p.a"), "3");
}

#[test]
fn test_top_level_functions_call_each_other() {
    let harness = Harness::new();
    harness.top("int square(int x) { return x * x; }");
    harness.top("int sum_of_squares(int a, int b) { return square(a) + square(b); }");
    assert_eq!(harness.value("sum_of_squares(3, 4)"), "25");
}

#[test]
fn test_enum_results_summarised_by_name() {
    let harness = Harness::new();
    harness.top("enum Mood { Calm, Angry };");
    assert_eq!(harness.value("Angry"), "Angry");
}

#[test]
fn test_control_flow() {
    let harness = Harness::new();
    assert_eq!(
        harness.value("int total = 0; int i = 0; while (i < 4) { ++i; if (i == 3) {} else total += i; } total"),
        "7"
    );
    assert_eq!(harness.value("int n = 0; while (n < 10) { n = n + 3; } n"), "12");
}

#[test]
fn test_failed_submission_commits_nothing() {
    let harness = Harness::new();
    harness.failure("int $lost = 1; nope");
    let failure = harness.failure("$lost");
    assert_eq!(failure.diagnostics[0].message, "undeclared identifier '$lost'");
    assert!(harness.session.persistent_variables().is_empty());
}

#[test]
fn test_failed_submissions_still_consume_identities() {
    let harness = Harness::new();
    harness.failure("nope");
    let outcome = harness.eval("1").unwrap();
    assert_eq!(outcome.submission, SubmissionId(1));
    assert_eq!(harness.session.submission_text(SubmissionId(0)).as_deref(), Some("nope"));
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_step_limit() {
    let harness = Harness::new();
    let settings = ExpressionSettings {
        step_limit: 100,
        ..ExpressionSettings::default()
    };
    let session = Session::with_settings(settings);
    let err = session
        .evaluate("while (true) {}", &EvalOptions::statement(), &harness.frame, &harness.frame)
        .unwrap_err();
    assert!(err.to_string().contains("execution step limit of 100 exceeded"));
}

#[test]
fn test_call_depth_limit() {
    let session = Session::with_settings(ExpressionSettings {
        max_call_depth: 8,
        ..ExpressionSettings::default()
    });
    let frame = FrameSnapshot::empty();
    session
        .evaluate(
            "int forever(int n) { return forever(n + 1); }",
            &EvalOptions::top_level(),
            &frame,
            &frame,
        )
        .unwrap();
    let err = session
        .evaluate("forever(0)", &EvalOptions::statement(), &frame, &frame)
        .unwrap_err();
    assert!(err.to_string().contains("maximum call depth of 8 exceeded"));
}

// ============================================================================
// Interruption
// ============================================================================

/// Frame whose `poke` function interrupts the running evaluation
struct Interrupting {
    frame: FrameSnapshot,
    flag: InterruptFlag,
}

impl DebugInfoProvider for Interrupting {
    fn lookup(&self, name: &str) -> Option<ExternalDecl> {
        self.frame.lookup(name)
    }

    fn lookup_type(&self, name: &str) -> Option<ExternalDecl> {
        self.frame.lookup_type(name)
    }

    fn location_of(&self, decl: DeclId) -> Option<DebugInfoLocation> {
        self.frame.location_of(decl)
    }
}

impl ProcessAccessor for Interrupting {
    fn read_scope(&self) -> Result<EvaluationContext, AccessError> {
        self.frame.read_scope()
    }

    fn read_global(&self, name: &str) -> Result<Binding, AccessError> {
        self.frame.read_global(name)
    }

    fn call_function(&self, name: &str, args: &[Binding]) -> Result<Binding, AccessError> {
        if name == "poke" {
            self.flag.interrupt();
        }
        self.frame.call_function(name, args)
    }
}

#[test]
fn test_interrupt_mid_run_discards_submission() {
    let frame = FrameSnapshot::from_json(r#"{ "functions": [{ "name": "poke" }] }"#).unwrap();
    let flag = InterruptFlag::new();
    let collaborator = Interrupting {
        frame,
        flag: flag.clone(),
    };
    let session = Session::new();
    let options = EvalOptions::statement().with_interrupt(flag);

    let err = session
        .evaluate("int $kept = 1; poke(); 2", &options, &collaborator, &collaborator)
        .unwrap_err();
    assert!(matches!(err, EvalError::Interrupted));
    assert_eq!(err.error_type(), 1);
    assert!(session.persistent_variables().is_empty());

    let outcome = session
        .evaluate("3", &EvalOptions::statement(), &collaborator, &collaborator)
        .unwrap();
    assert_eq!(outcome.value.map(|v| v.name).as_deref(), Some("$0"));
}

#[test]
fn test_process_failure_is_generic() {
    let harness = Harness::with_json(r#"{ "functions": [{ "name": "crash", "return": "int" }] }"#);
    let err = harness.eval("crash()").unwrap_err();
    assert!(matches!(err, EvalError::Process(AccessError::CallFailed { .. })));
    assert_eq!(err.error_type(), 1);
    assert!(err.failure().is_none());
}

// ============================================================================
// Rejected redefinitions
// ============================================================================

/// Frame that counts calls made into the process
struct Counting {
    frame: FrameSnapshot,
    calls: Cell<u32>,
}

impl DebugInfoProvider for Counting {
    fn lookup(&self, name: &str) -> Option<ExternalDecl> {
        self.frame.lookup(name)
    }

    fn lookup_type(&self, name: &str) -> Option<ExternalDecl> {
        self.frame.lookup_type(name)
    }

    fn location_of(&self, decl: DeclId) -> Option<DebugInfoLocation> {
        self.frame.location_of(decl)
    }
}

impl ProcessAccessor for Counting {
    fn read_scope(&self) -> Result<EvaluationContext, AccessError> {
        self.frame.read_scope()
    }

    fn read_global(&self, name: &str) -> Result<Binding, AccessError> {
        self.frame.read_global(name)
    }

    fn call_function(&self, name: &str, args: &[Binding]) -> Result<Binding, AccessError> {
        self.calls.set(self.calls.get() + 1);
        self.frame.call_function(name, args)
    }
}

#[test]
fn test_rejected_redefinition_runs_no_initializer() {
    let frame = FrameSnapshot::from_json(
        r#"{ "functions": [{ "name": "side", "return": "int", "result": 5 }] }"#,
    )
    .unwrap();
    let process = Counting {
        frame,
        calls: Cell::new(0),
    };
    let session = Session::new();
    let top_level = EvalOptions::top_level();

    session.evaluate("int g = 1;", &top_level, &process, &process).unwrap();
    let err = session
        .evaluate("int g = side();", &top_level, &process, &process)
        .unwrap_err();
    let Some(failure) = err.failure() else {
        panic!("expected an expression failure, got {}", err);
    };
    assert_eq!(failure.diagnostics[0].kind, DiagnosticKind::Redefinition);
    assert_eq!(process.calls.get(), 0);

    let outcome = session
        .evaluate("g", &EvalOptions::statement(), &process, &process)
        .unwrap();
    assert_eq!(outcome.value.map(|v| v.summary).as_deref(), Some("0"));
    assert_eq!(process.calls.get(), 0);
}
