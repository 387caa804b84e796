//! Expression evaluator front-end
//!
//! One call to [`Evaluator::evaluate`] takes a submission through its whole
//! life: register the text, wrap and parse it, run the semantic pass,
//! execute it when nothing went wrong, and commit its declarations and
//! persistent variables. All of that happens against working copies; a
//! failed submission leaves the session exactly as it found it, with one
//! exception: a top-level submission whose only errors are redefinitions
//! still commits (the latest definition wins) and still reports them.

mod interp;
mod lookup;
mod sema;

pub use lookup::LocalTypes;

use crate::diagnostic::{
    sort_diagnostics, Diagnostic, DiagnosticKind, LocationOwner, SourceLocation, SyntaxError,
};
use crate::error::{EvalError, EvalResult, ExpressionFailure};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::persistent::PersistentScope;
use crate::position::{PositionMapper, WrapperShape};
use crate::provider::{DebugInfoProvider, ProcessAccessor};
use crate::registry::{SourceRegistry, SubmissionId, SubmissionMode};
use crate::token::{Token, TokenKind};
use crate::tracker::DeclarationTracker;
use crate::value::{Binding, Heap, ObjectSpace, RuntimeError, Value};
use interp::{Interpreter, Limits, Runtime};
use lookup::Lookup;
use peek_config::ExpressionSettings;
use sema::{Environment, Sema};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalState {
    Submitted,
    Parsing,
    Succeeded,
    Failed,
}

/// Shared flag a caller sets to abandon a running evaluation
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-evaluation options
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub mode: SubmissionMode,
    pub interrupt: Option<InterruptFlag>,
}

impl EvalOptions {
    pub fn statement() -> Self {
        Self::default()
    }

    pub fn top_level() -> Self {
        Self {
            mode: SubmissionMode::TopLevel,
            interrupt: None,
        }
    }

    pub fn with_interrupt(mut self, flag: InterruptFlag) -> Self {
        self.interrupt = Some(flag);
        self
    }
}

/// Result value of a statement-mode submission, stored as `$N`
#[derive(Debug, Clone, PartialEq)]
pub struct EvalValue {
    pub name: String,
    pub type_name: String,
    pub value: Value,
    pub summary: String,
}

impl fmt::Display for EvalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {} = {}", self.type_name, self.name, self.summary)
    }
}

/// A successful evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub submission: SubmissionId,
    /// `None` for void results and top-level submissions
    pub value: Option<EvalValue>,
    pub warnings: Vec<Diagnostic>,
}

/// Evaluates one submission against session state and the debugged process
pub struct Evaluator<'a> {
    pub registry: &'a mut SourceRegistry,
    pub tracker: &'a mut DeclarationTracker,
    pub persistent: &'a mut PersistentScope,
    pub settings: &'a ExpressionSettings,
    pub debug_info: &'a dyn DebugInfoProvider,
    pub process: &'a dyn ProcessAccessor,
}

impl Evaluator<'_> {
    pub fn evaluate(self, text: &str, options: &EvalOptions) -> EvalResult<EvalOutcome> {
        let Evaluator {
            registry,
            tracker,
            persistent,
            settings,
            debug_info,
            process,
        } = self;

        let submission = registry.allocate(text, options.mode);
        let mut state = EvalState::Submitted;
        tracing::debug!(%submission, mode = ?options.mode, "submission registered");

        if options.interrupt.as_ref().is_some_and(InterruptFlag::is_set) {
            transition(submission, &mut state, EvalState::Failed);
            return Err(EvalError::Interrupted);
        }

        let mut context = process.read_scope().map_err(|err| {
            tracing::warn!(%submission, error = %err, "couldn't read the paused frame");
            EvalError::Process(err)
        })?;

        let registry: &SourceRegistry = registry;
        let mapper = PositionMapper::new(
            registry,
            settings.use_source_locations && context.source_locations_enabled,
        );

        transition(submission, &mut state, EvalState::Parsing);
        let wrapped = WrapperShape::for_mode(options.mode).wrap(text);
        let (tokens, lex_errors) = Lexer::new(&wrapped).tokenize();
        let type_names = known_type_names(&tokens, persistent, debug_info);
        let (unit, parse_errors) = Parser::new(tokens).with_type_names(type_names).parse();

        let mut diagnostics: Vec<Diagnostic> = lex_errors
            .iter()
            .chain(&parse_errors)
            .map(|err| syntax_diagnostic(&mapper, submission, err))
            .collect();

        let mut working = persistent.clone();
        let mut heap = Heap::new(
            std::mem::take(&mut context.objects),
            working.objects().clone(),
        );

        let env = Environment {
            context: &context,
            heap: &heap,
            tracker: &*tracker,
            debug_info,
        };
        let checked = Sema::new(submission, options.mode, &mapper, env, &mut working).check(&unit);
        diagnostics.extend(checked.diagnostics);
        sort_diagnostics(&mut diagnostics);

        let errors: Vec<&Diagnostic> = diagnostics.iter().filter(|d| d.is_error()).collect();
        let redefinitions_only = options.mode == SubmissionMode::TopLevel
            && !errors.is_empty()
            && errors.iter().all(|d| d.kind == DiagnosticKind::Redefinition);
        if !errors.is_empty() && !redefinitions_only {
            tracing::debug!(%submission, errors = errors.len(), "submission rejected");
            transition(submission, &mut state, EvalState::Failed);
            return Err(failure(submission, diagnostics, &mapper, debug_info));
        }

        let local_types = checked.local_types;
        let limits = Limits {
            max_call_depth: settings.max_call_depth,
            step_limit: settings.step_limit,
        };
        let result = {
            let runtime = Runtime {
                context: &mut context,
                heap: &mut heap,
                persistent: &mut working,
                local_types: &local_types,
                debug_info,
                process,
            };
            let mut interpreter =
                Interpreter::new(submission, runtime, &mapper, limits, options.interrupt.clone());
            match options.mode {
                _ if redefinitions_only => {
                    tracing::debug!(%submission, "skipping execution of a rejected submission");
                    interpreter.bind_top_level(&unit);
                    Ok(Value::Void)
                }
                SubmissionMode::Statement => interpreter.run_expression(&unit),
                SubmissionMode::TopLevel => interpreter.run_top_level(&unit),
            }
        };

        let value = match result {
            Ok(value) => value,
            Err(RuntimeError::Interrupted) => {
                transition(submission, &mut state, EvalState::Failed);
                return Err(EvalError::Interrupted);
            }
            Err(RuntimeError::Process { source, .. }) => {
                tracing::warn!(%submission, error = %source, "process access failed during evaluation");
                transition(submission, &mut state, EvalState::Failed);
                return Err(EvalError::Process(source));
            }
            Err(err) => {
                tracing::debug!(%submission, error = %err, "execution failed");
                diagnostics.push(runtime_diagnostic(&mapper, &err));
                transition(submission, &mut state, EvalState::Failed);
                return Err(failure(submission, diagnostics, &mapper, debug_info));
            }
        };

        let result_value = match (options.mode, &value) {
            (SubmissionMode::TopLevel, _) | (_, Value::Void) => None,
            (SubmissionMode::Statement, value) => {
                let ty = value.ty();
                let name = working.next_result_name();
                let stored = heap.copy_value(value, ObjectSpace::Persistent);
                let lookup = Lookup {
                    context: &context,
                    heap: &heap,
                    persistent: &working,
                    local_types: &local_types,
                    debug_info,
                };
                let summary = stored.summary(&heap, &|enum_name, v| lookup.enumerator_name(enum_name, v));
                working.set_variable(name.clone(), Binding::new(ty.clone(), stored.clone()), None);
                Some(EvalValue {
                    name,
                    type_name: ty.display_name(),
                    value: stored,
                    summary,
                })
            }
        };

        tracker.commit(checked.pending);
        working.set_objects(heap.into_persistent());
        *persistent = working;

        if redefinitions_only {
            tracing::debug!(%submission, "redefinitions committed; latest definition wins");
            transition(submission, &mut state, EvalState::Failed);
            return Err(failure(submission, diagnostics, &mapper, debug_info));
        }

        transition(submission, &mut state, EvalState::Succeeded);
        let warnings = diagnostics
            .into_iter()
            .map(|d| with_snippets(d, &mapper, debug_info))
            .collect();
        Ok(EvalOutcome {
            submission,
            value: result_value,
            warnings,
        })
    }
}

fn transition(submission: SubmissionId, state: &mut EvalState, next: EvalState) {
    tracing::debug!(%submission, from = ?*state, to = ?next, "evaluation state");
    *state = next;
}

/// Type names the parser must know to tell declarations from expressions
fn known_type_names(
    tokens: &[Token],
    persistent: &PersistentScope,
    debug_info: &dyn DebugInfoProvider,
) -> Vec<String> {
    let mut names: Vec<String> = persistent.type_names().cloned().collect();
    for token in tokens {
        if token.kind == TokenKind::Identifier
            && !names.contains(&token.lexeme)
            && debug_info.lookup_type(&token.lexeme).is_some()
        {
            names.push(token.lexeme.clone());
        }
    }
    names
}

fn syntax_diagnostic(mapper: &PositionMapper<'_>, submission: SubmissionId, err: &SyntaxError) -> Diagnostic {
    let diagnostic = Diagnostic::error(
        DiagnosticKind::Syntax,
        err.message.clone(),
        mapper.resolve(err.span.start, submission),
    );
    match mapper.highlight(err.span, submission) {
        Some((start, end)) => diagnostic.with_highlight(start, end),
        None => diagnostic,
    }
}

/// Diagnostic for an execution failure, placed in whichever submission ran the failing code
fn runtime_diagnostic(mapper: &PositionMapper<'_>, err: &RuntimeError) -> Diagnostic {
    let Some(site) = err.site() else {
        return Diagnostic::error(DiagnosticKind::Semantic, err.to_string(), SourceLocation::hidden());
    };
    let diagnostic = Diagnostic::error(
        DiagnosticKind::Semantic,
        err.to_string(),
        mapper.resolve(site.span.start, site.submission),
    );
    match mapper.highlight(site.span, site.submission) {
        Some((start, end)) => diagnostic.with_highlight(start, end),
        None => diagnostic,
    }
}

fn failure(
    submission: SubmissionId,
    diagnostics: Vec<Diagnostic>,
    mapper: &PositionMapper<'_>,
    debug_info: &dyn DebugInfoProvider,
) -> EvalError {
    EvalError::Expression(ExpressionFailure {
        submission,
        diagnostics: diagnostics
            .into_iter()
            .map(|d| with_snippets(d, mapper, debug_info))
            .collect(),
    })
}

/// Quote the source line of a diagnostic and of each of its notes.
/// Hidden external locations are quoted too, so they can be shown again.
pub(crate) fn with_snippets(
    mut diagnostic: Diagnostic,
    mapper: &PositionMapper<'_>,
    debug_info: &dyn DebugInfoProvider,
) -> Diagnostic {
    if diagnostic.snippet.is_none() && diagnostic.location.has_position() {
        diagnostic.snippet = match &diagnostic.location.owner {
            LocationOwner::Submission(_) => mapper.snippet(&diagnostic.location),
            LocationOwner::External(file) => debug_info.source_line(file, diagnostic.location.line),
        };
    }
    diagnostic.notes = diagnostic
        .notes
        .into_iter()
        .map(|note| with_snippets(note, mapper, debug_info))
        .collect();
    diagnostic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{EmptyFrame, NoDebugInfo};
    use pretty_assertions::assert_eq;

    struct Fixture {
        registry: SourceRegistry,
        tracker: DeclarationTracker,
        persistent: PersistentScope,
        settings: ExpressionSettings,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: SourceRegistry::new(),
                tracker: DeclarationTracker::new(),
                persistent: PersistentScope::new(),
                settings: ExpressionSettings::default(),
            }
        }

        fn eval(&mut self, text: &str, options: EvalOptions) -> EvalResult<EvalOutcome> {
            Evaluator {
                registry: &mut self.registry,
                tracker: &mut self.tracker,
                persistent: &mut self.persistent,
                settings: &self.settings,
                debug_info: &NoDebugInfo,
                process: &EmptyFrame,
            }
            .evaluate(text, &options)
        }

        fn value(&mut self, text: &str) -> String {
            match self.eval(text, EvalOptions::statement()) {
                Ok(outcome) => outcome.value.map(|v| v.to_string()).unwrap_or_default(),
                Err(err) => panic!("evaluation of {:?} failed:\n{}", text, err),
            }
        }

        fn errors(&mut self, text: &str, options: EvalOptions) -> String {
            match self.eval(text, options) {
                Ok(_) => panic!("evaluation of {:?} succeeded", text),
                Err(err) => err.to_string(),
            }
        }
    }

    #[test]
    fn test_arithmetic_result_is_persisted() {
        let mut fx = Fixture::new();
        assert_eq!(fx.value("1 + 2"), "(int) $0 = 3");
        assert_eq!(fx.value("$0 * 2"), "(int) $1 = 6");
        assert_eq!(fx.value("7 / 2.0"), "(double) $2 = 3.5");
    }

    #[test]
    fn test_undeclared_identifier_points_at_column_one() {
        let mut fx = Fixture::new();
        let text = fx.errors("a", EvalOptions::statement());
        assert_eq!(
            text,
            "<user expression 0>:1:1: error: undeclared identifier 'a'\n    1 | a\n      | ^\n"
        );
    }

    #[test]
    fn test_failed_submission_leaves_state_untouched() {
        let mut fx = Fixture::new();
        fx.errors("int $x = 1; undeclared_thing", EvalOptions::statement());
        assert!(fx.persistent.variable("$x").is_none());
        assert_eq!(fx.value("2"), "(int) $0 = 2");
    }

    #[test]
    fn test_dollar_variables_persist() {
        let mut fx = Fixture::new();
        assert_eq!(fx.value("int $counter = 41;"), "");
        assert_eq!(fx.value("++$counter"), "(int) $0 = 42");
        assert_eq!(fx.value("$counter"), "(int) $1 = 42");
    }

    #[test]
    fn test_top_level_function_is_callable() {
        let mut fx = Fixture::new();
        fx.eval("int twice(int x) { return x * 2; }", EvalOptions::top_level())
            .unwrap();
        assert_eq!(fx.value("twice(21)"), "(int) $0 = 42");
    }

    #[test]
    fn test_redefinition_commits_latest() {
        let mut fx = Fixture::new();
        fx.eval("struct Redef { int x; };", EvalOptions::top_level())
            .unwrap();
        let err = fx
            .eval("struct Redef { float y; };", EvalOptions::top_level())
            .unwrap_err();
        assert_eq!(err.error_type(), 2);
        assert!(err.to_string().contains("redefinition of 'Redef'"));
        assert!(fx.value("Redef r; r.y = 1.5; r.y").ends_with("= 1.5"));
    }

    #[test]
    fn test_division_by_zero_is_reported_at_operator() {
        let mut fx = Fixture::new();
        let text = fx.errors("int zero = 0; 1 / zero", EvalOptions::statement());
        assert!(text.starts_with("<user expression 0>:1:17: error: division by zero\n"));
    }

    #[test]
    fn test_step_limit_stops_infinite_loop() {
        let mut fx = Fixture::new();
        fx.settings.step_limit = 50;
        let text = fx.errors("while (true) {}", EvalOptions::statement());
        assert!(text.contains("execution step limit of 50 exceeded"));
    }

    #[test]
    fn test_interrupted_before_start() {
        let mut fx = Fixture::new();
        let flag = InterruptFlag::new();
        flag.interrupt();
        let err = fx
            .eval("1", EvalOptions::statement().with_interrupt(flag))
            .unwrap_err();
        assert!(matches!(err, EvalError::Interrupted));
        assert!(fx.persistent.variable("$0").is_none());
    }

    #[test]
    fn test_float_to_int_warning() {
        let mut fx = Fixture::new();
        let outcome = fx.eval("int x = 3.5; x", EvalOptions::statement()).unwrap();
        assert_eq!(outcome.value.unwrap().summary, "3");
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(
            outcome.warnings[0].message,
            "implicit conversion from 'double' to 'int' changes value from 3.5 to 3"
        );
    }
}
