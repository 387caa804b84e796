//! Declaration redefinition tracker
//!
//! Remembers the named entities introduced by earlier submissions. Declaring
//! a name that already has a record of the same kind yields a
//! "redefinition" error pointing back at the previous definition, and the new
//! declaration then replaces the old record: the latest definition always
//! wins for later lookups.
//!
//! Declarations made while a submission is being evaluated are staged in
//! [`PendingDeclarations`] and only reach the tracker through
//! [`DeclarationTracker::commit`].

use crate::diagnostic::{Diagnostic, DiagnosticKind, SourceLocation};
use crate::registry::SubmissionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of a tracked declaration; only equal kinds conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Struct,
    Class,
    Enum,
    Function,
    Variable,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeclKind::Struct => "struct",
            DeclKind::Class => "class",
            DeclKind::Enum => "enum",
            DeclKind::Function => "function",
            DeclKind::Variable => "variable",
        };
        write!(f, "{}", name)
    }
}

/// One tracked declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationRecord {
    pub name: String,
    pub kind: DeclKind,
    pub defining_submission: SubmissionId,
    pub defining_location: SourceLocation,
}

/// Committed declarations of a session
#[derive(Debug, Default)]
pub struct DeclarationTracker {
    records: HashMap<(String, DeclKind), DeclarationRecord>,
}

impl DeclarationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare and commit immediately
    pub fn declare(
        &mut self,
        name: &str,
        kind: DeclKind,
        submission: SubmissionId,
        location: SourceLocation,
    ) -> Option<Diagnostic> {
        let mut pending = PendingDeclarations::default();
        let conflict = pending.declare(self, name, kind, submission, location);
        self.commit(pending);
        conflict
    }

    /// Current record for `name` of `kind`
    pub fn lookup(&self, name: &str, kind: DeclKind) -> Option<&DeclarationRecord> {
        self.records.get(&(name.to_string(), kind))
    }

    /// All records with this name, regardless of kind
    pub fn records_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DeclarationRecord> {
        self.records.values().filter(move |r| r.name == name)
    }

    /// Apply staged declarations; later ones replace earlier ones
    pub fn commit(&mut self, pending: PendingDeclarations) {
        for record in pending.records {
            tracing::debug!(
                name = %record.name,
                kind = %record.kind,
                submission = record.defining_submission.0,
                "committed declaration"
            );
            self.records
                .insert((record.name.clone(), record.kind), record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Declarations staged by one in-flight submission
#[derive(Debug, Default)]
pub struct PendingDeclarations {
    records: Vec<DeclarationRecord>,
}

impl PendingDeclarations {
    /// Stage a declaration, checking it against staged and committed records
    pub fn declare(
        &mut self,
        tracker: &DeclarationTracker,
        name: &str,
        kind: DeclKind,
        submission: SubmissionId,
        location: SourceLocation,
    ) -> Option<Diagnostic> {
        let previous = self
            .lookup(name, kind)
            .or_else(|| tracker.lookup(name, kind));

        let conflict = previous.map(|prev| redefinition(name, location.clone(), prev));
        if conflict.is_some() {
            tracing::debug!(name, %kind, "redefinition; latest definition wins");
        }

        self.records.push(DeclarationRecord {
            name: name.to_string(),
            kind,
            defining_submission: submission,
            defining_location: location,
        });
        conflict
    }

    /// Most recent staged record for `name` of `kind`
    pub fn lookup(&self, name: &str, kind: DeclKind) -> Option<&DeclarationRecord> {
        self.records
            .iter()
            .rev()
            .find(|r| r.name == name && r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// "redefinition of 'X'" with a note at the previous definition
pub fn redefinition(name: &str, location: SourceLocation, previous: &DeclarationRecord) -> Diagnostic {
    redefinition_at(name, location, previous.defining_location.clone())
}

/// "redefinition of 'X'" with a note at an arbitrary previous location
pub fn redefinition_at(
    name: &str,
    location: SourceLocation,
    previous: SourceLocation,
) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::Redefinition,
        format!("redefinition of '{}'", name),
        location,
    )
    .with_note(Diagnostic::note("previous definition is here", previous))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loc(id: u32) -> SourceLocation {
        SourceLocation::in_submission(SubmissionId(id), 1, 8)
    }

    #[test]
    fn test_first_declaration_is_clean() {
        let mut tracker = DeclarationTracker::new();
        assert!(tracker
            .declare("Redef", DeclKind::Struct, SubmissionId(0), loc(0))
            .is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_redefinition_points_at_previous() {
        let mut tracker = DeclarationTracker::new();
        tracker.declare("Redef", DeclKind::Struct, SubmissionId(6), loc(6));
        let conflict = tracker
            .declare("Redef", DeclKind::Struct, SubmissionId(7), loc(7))
            .expect("conflict");

        assert_eq!(conflict.message, "redefinition of 'Redef'");
        assert_eq!(conflict.kind, DiagnosticKind::Redefinition);
        assert_eq!(conflict.location.submission(), Some(SubmissionId(7)));
        assert_eq!(conflict.notes.len(), 1);
        assert_eq!(conflict.notes[0].message, "previous definition is here");
        assert_eq!(conflict.notes[0].location.submission(), Some(SubmissionId(6)));
    }

    #[test]
    fn test_latest_definition_wins() {
        let mut tracker = DeclarationTracker::new();
        tracker.declare("S", DeclKind::Struct, SubmissionId(0), loc(0));
        tracker.declare("S", DeclKind::Struct, SubmissionId(1), loc(1));
        let third = tracker
            .declare("S", DeclKind::Struct, SubmissionId(2), loc(2))
            .expect("conflict");

        // The third definition references the second, not the first
        assert_eq!(third.notes[0].location.submission(), Some(SubmissionId(1)));
        assert_eq!(
            tracker.lookup("S", DeclKind::Struct).map(|r| r.defining_submission),
            Some(SubmissionId(2))
        );
    }

    #[test]
    fn test_different_kinds_do_not_conflict() {
        let mut tracker = DeclarationTracker::new();
        tracker.declare("S", DeclKind::Struct, SubmissionId(0), loc(0));
        assert!(tracker
            .declare("S", DeclKind::Function, SubmissionId(1), loc(1))
            .is_none());
        assert!(tracker
            .declare("S", DeclKind::Class, SubmissionId(2), loc(2))
            .is_none());
        assert_eq!(tracker.records_named("S").count(), 3);
    }

    #[test]
    fn test_pending_declarations_are_not_visible_until_commit() {
        let tracker = DeclarationTracker::new();
        let mut pending = PendingDeclarations::default();
        assert!(pending
            .declare(&tracker, "f", DeclKind::Function, SubmissionId(0), loc(0))
            .is_none());
        assert!(tracker.lookup("f", DeclKind::Function).is_none());

        // A second declaration inside the same submission conflicts with the staged one
        let conflict = pending.declare(&tracker, "f", DeclKind::Function, SubmissionId(0), loc(0));
        assert!(conflict.is_some());
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_discarded_pending_leaves_tracker_untouched() {
        let mut tracker = DeclarationTracker::new();
        {
            let mut pending = PendingDeclarations::default();
            pending.declare(&tracker, "T", DeclKind::Class, SubmissionId(0), loc(0));
        }
        assert!(tracker.is_empty());

        let mut pending = PendingDeclarations::default();
        pending.declare(&tracker, "T", DeclKind::Class, SubmissionId(1), loc(1));
        tracker.commit(pending);
        assert_eq!(
            tracker.lookup("T", DeclKind::Class).map(|r| r.defining_submission),
            Some(SubmissionId(1))
        );
    }
}
