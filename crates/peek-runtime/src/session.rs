//! Expression session
//!
//! A [`Session`] owns everything that outlives a single submission: the
//! source registry, the declaration tracker, the persistent scope and the
//! expression settings. Evaluations are serialized by one lock, so each
//! submission sees either all or none of an earlier submission's effects.

use crate::diagnostic::{Diagnostic, SourceLocation};
use crate::error::{EvalResult, ExpressionFailure};
use crate::evaluator::{with_snippets, EvalOptions, EvalOutcome, Evaluator};
use crate::position::PositionMapper;
use crate::persistent::PersistentScope;
use crate::provider::{DebugInfoProvider, NoDebugInfo, ProcessAccessor};
use crate::registry::{SourceRegistry, SubmissionId};
use crate::tracker::{DeclKind, DeclarationTracker};
use crate::value::{Heap, ObjectStore};
use peek_config::ExpressionSettings;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct SessionState {
    registry: SourceRegistry,
    tracker: DeclarationTracker,
    persistent: PersistentScope,
    settings: ExpressionSettings,
}

/// A persistent variable as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSummary {
    pub name: String,
    pub type_name: String,
    pub summary: String,
}

/// Debugger session state shared by all expression evaluations
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ExpressionSettings) -> Self {
        Self {
            state: Mutex::new(SessionState {
                settings,
                ..SessionState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate one submission against the paused process
    pub fn evaluate(
        &self,
        text: &str,
        options: &EvalOptions,
        debug_info: &dyn DebugInfoProvider,
        process: &dyn ProcessAccessor,
    ) -> EvalResult<EvalOutcome> {
        let mut guard = self.lock();
        let SessionState {
            registry,
            tracker,
            persistent,
            settings,
        } = &mut *guard;
        Evaluator {
            registry,
            tracker,
            persistent,
            settings,
            debug_info,
            process,
        }
        .evaluate(text, options)
    }

    /// Record a declaration made outside an evaluation
    ///
    /// Returns the redefinition error when `name` of `kind` was already
    /// declared; the new declaration replaces the old one either way.
    pub fn declare(
        &self,
        name: &str,
        kind: DeclKind,
        submission: SubmissionId,
        location: SourceLocation,
    ) -> Option<Diagnostic> {
        let mut state = self.lock();
        let diagnostic = state.tracker.declare(name, kind, submission, location)?;
        let mapper = PositionMapper::new(&state.registry, state.settings.use_source_locations);
        Some(with_snippets(diagnostic, &mapper, &NoDebugInfo))
    }

    /// Owner tag of a submission, e.g. `user expression 3`
    ///
    /// # Panics
    ///
    /// Panics on an identity this session never allocated.
    pub fn render(&self, id: SubmissionId) -> String {
        self.lock().registry.render(id)
    }

    /// Text of a submission, if it exists
    pub fn submission_text(&self, id: SubmissionId) -> Option<String> {
        let state = self.lock();
        if (id.0 as usize) < state.registry.len() {
            Some(state.registry.get(id).text.clone())
        } else {
            None
        }
    }

    /// Show or hide source locations in diagnostics of later evaluations
    pub fn set_use_source_locations(&self, enabled: bool) {
        tracing::debug!(enabled, "use-source-locations changed");
        self.lock().settings.use_source_locations = enabled;
    }

    pub fn use_source_locations(&self) -> bool {
        self.lock().settings.use_source_locations
    }

    /// Copy of an earlier failure with external locations shown or hidden
    /// per the current setting; nothing is evaluated again
    pub fn present(&self, failure: &ExpressionFailure) -> ExpressionFailure {
        let mut presented = failure.clone();
        presented.set_source_locations(self.use_source_locations());
        presented
    }

    pub fn settings(&self) -> ExpressionSettings {
        self.lock().settings.clone()
    }

    /// Persistent variables in creation order
    pub fn persistent_variables(&self) -> Vec<VariableSummary> {
        let state = self.lock();
        let persistent = &state.persistent;
        let heap = Heap::new(ObjectStore::new(), persistent.objects().clone());
        let enum_name = |name: &str, value: i64| {
            persistent.enum_def(name).and_then(|def| {
                def.enumerators
                    .iter()
                    .find(|(_, v)| *v == value)
                    .map(|(n, _)| n.clone())
            })
        };
        persistent
            .variables()
            .map(|var| VariableSummary {
                name: var.name.clone(),
                type_name: var.binding.ty.display_name(),
                summary: var.binding.value.summary(&heap, &enum_name),
            })
            .collect()
    }

    /// Number of submissions made so far
    pub fn submission_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Number of tracked declarations
    pub fn declaration_count(&self) -> usize {
        self.lock().tracker.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{EmptyFrame, NoDebugInfo};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_submissions_get_sequential_identities() {
        let session = Session::new();
        let first = session
            .evaluate("1", &EvalOptions::statement(), &NoDebugInfo, &EmptyFrame)
            .unwrap();
        let _ = session.evaluate("nope", &EvalOptions::statement(), &NoDebugInfo, &EmptyFrame);
        let third = session
            .evaluate("3", &EvalOptions::statement(), &NoDebugInfo, &EmptyFrame)
            .unwrap();
        assert_eq!(first.submission, SubmissionId(0));
        assert_eq!(third.submission, SubmissionId(2));
        assert_eq!(session.render(SubmissionId(1)), "user expression 1");
        assert_eq!(session.submission_text(SubmissionId(1)).as_deref(), Some("nope"));
        assert_eq!(session.submission_text(SubmissionId(7)), None);
    }

    #[test]
    fn test_declare_reports_previous_definition() {
        let session = Session::new();
        let loc = |line| SourceLocation::in_submission(SubmissionId(0), line, 1);
        assert!(session
            .declare("f", DeclKind::Function, SubmissionId(0), loc(1))
            .is_none());
        let err = session
            .declare("f", DeclKind::Function, SubmissionId(0), loc(3))
            .unwrap();
        assert_eq!(err.message, "redefinition of 'f'");
        assert_eq!(err.notes[0].location.line, 1);
        assert_eq!(session.declaration_count(), 1);
    }

    #[test]
    fn test_declare_quotes_both_definitions() {
        let session = Session::new();
        let options = EvalOptions::top_level();
        session
            .evaluate("struct Redef { double x; };", &options, &NoDebugInfo, &EmptyFrame)
            .unwrap();
        let _ = session.evaluate("struct Redef { float y; };", &options, &NoDebugInfo, &EmptyFrame);

        let err = session
            .declare(
                "Redef",
                DeclKind::Struct,
                SubmissionId(1),
                SourceLocation::in_submission(SubmissionId(1), 1, 8),
            )
            .unwrap();
        assert_eq!(
            err.to_human_string(),
            "<user expression 1>:1:8: error: redefinition of 'Redef'\n    1 | struct Redef { float y; };\n      |        ^\n<user expression 1>:1:8: note: previous definition is here\n    1 | struct Redef { float y; };\n      |        ^\n"
        );
    }

    #[test]
    fn test_toggle_round_trip() {
        let session = Session::new();
        assert!(session.use_source_locations());
        session.set_use_source_locations(false);
        assert!(!session.settings().use_source_locations);
        session.set_use_source_locations(true);
        assert!(session.use_source_locations());
    }

    #[test]
    fn test_persistent_variables_listing() {
        let session = Session::new();
        session
            .evaluate("int $a = 5; 2.5", &EvalOptions::statement(), &NoDebugInfo, &EmptyFrame)
            .unwrap();
        let vars = session.persistent_variables();
        assert_eq!(
            vars,
            vec![
                VariableSummary {
                    name: "$a".into(),
                    type_name: "int".into(),
                    summary: "5".into(),
                },
                VariableSummary {
                    name: "$0".into(),
                    type_name: "double".into(),
                    summary: "2.5".into(),
                },
            ]
        );
    }

    #[test]
    fn test_concurrent_evaluations_are_serialized() {
        let session = Arc::new(Session::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    session
                        .evaluate(&i.to_string(), &EvalOptions::statement(), &NoDebugInfo, &EmptyFrame)
                        .unwrap()
                })
            })
            .collect();
        let mut ids: Vec<u32> = handles
            .into_iter()
            .map(|h| h.join().unwrap().submission.0)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(session.persistent_variables().len(), 4);
    }
}
