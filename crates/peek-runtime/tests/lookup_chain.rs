//! Name lookup through a paused frame: locals, captures, `this` and debug info

mod common;

use common::*;
use pretty_assertions::assert_eq;
use peek_runtime::{DiagnosticKind, EvalOptions};
use rstest::rstest;

/// A lambda nested in a lambda, inside a member function of `Derived`
const NESTED_FRAME: &str = r#"{
    "scopes": [
        { "name": "inner lambda", "variables": [
            { "name": "shadowed", "type": "int", "value": 1 }
        ] }
    ],
    "objects": [
        { "type": "inner closure", "fields": [
            { "name": "captured_inner", "type": "int", "value": 2 },
            { "name": "shadowed", "type": "int", "value": 50 }
        ] },
        { "type": "outer closure", "fields": [
            { "name": "captured_outer", "type": "int", "value": 3 },
            { "name": "captured_inner", "type": "int", "value": 99 }
        ] },
        { "type": "Derived", "fields": [
            { "name": "own", "type": "int", "value": 10 }
        ], "bases": [3] },
        { "type": "Base", "fields": [
            { "name": "base_field", "type": "int", "value": 20 }
        ] }
    ],
    "enclosing": [
        { "object": 0, "kind": "closure" },
        { "object": 1, "kind": "closure" },
        { "object": 2, "kind": "class" }
    ],
    "globals": [
        { "name": "g_limit", "type": "int", "value": 64, "file": "app.cpp", "line": 1, "column": 5 }
    ],
    "types": [
        { "name": "Base", "kind": "struct", "fields": [{ "name": "base_field", "type": "int" }] },
        { "name": "Derived", "kind": "class", "bases": ["Base"],
          "fields": [{ "name": "own", "type": "int" }],
          "methods": [{ "name": "answer", "return": "int", "result": 42 }] }
    ]
}"#;

fn nested() -> Harness {
    Harness::with_json(NESTED_FRAME)
}

#[rstest]
#[case::frame_local_beats_capture("shadowed", "1")]
#[case::innermost_capture_wins("captured_inner", "2")]
#[case::outer_capture("captured_outer", "3")]
#[case::implicit_this_field("own", "10")]
#[case::explicit_this_field("this->own", "10")]
#[case::base_class_field("base_field", "20")]
#[case::method_of_enclosing_class("answer()", "42")]
#[case::debug_info_global("g_limit", "64")]
#[case::mixed("shadowed + captured_inner + captured_outer + own + base_field", "36")]
fn test_resolves_through_chain(#[case] text: &str, #[case] expected: &str) {
    assert_eq!(nested().value(text), expected);
}

#[test]
fn test_expression_local_shadows_frame() {
    let harness = nested();
    assert_eq!(harness.value("int shadowed = 7; shadowed"), "7");
    assert_eq!(harness.value("shadowed"), "1");
}

#[test]
fn test_frame_writes_do_not_outlive_the_submission() {
    let harness = nested();
    assert_eq!(harness.value("shadowed = 5; shadowed * 2"), "10");
    assert_eq!(harness.value("shadowed"), "1");
    assert_eq!(harness.value("own += 1; own"), "11");
    assert_eq!(harness.value("own"), "10");
}

#[test]
fn test_persistent_variable_shadowed_by_frame() {
    let harness = nested();
    harness.value("int $own = 5; $own");
    assert_eq!(harness.value("$own + own"), "15");
}

#[test]
fn test_submission_functions_cannot_see_frame() {
    let harness = nested();
    let failure =
        harness.failure_with("int peek_at() { return shadowed; }", &EvalOptions::top_level());
    let diagnostic = &failure.diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::UndeclaredIdentifier);
    assert_eq!(diagnostic.message, "undeclared identifier 'shadowed'");
    assert_eq!((diagnostic.location.line, diagnostic.location.column), (1, 24));
}

#[test]
fn test_this_outside_member_function() {
    let harness = Harness::new();
    let failure = harness.failure("this");
    assert_eq!(
        failure.diagnostics[0].message,
        "invalid use of 'this' outside of a non-static member function"
    );
}

#[test]
fn test_unknown_member_of_enclosing_object() {
    let harness = nested();
    let failure = harness.failure("this->missing");
    assert_eq!(
        failure.diagnostics[0].message,
        "no member named 'missing' in 'Derived'"
    );
}
