//! Source buffer registry
//!
//! Every submitted expression becomes a synthetic buffer named
//! `user expression N`. Identities are handed out in submission order and
//! never reused within a session, so diagnostics rendered long after the fact
//! (for example a "previous definition" note) still point at the right text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one submission (0-based, strictly increasing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub u32);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the submitted text is parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// Statements evaluated inside a synthetic function; declarations are local
    #[default]
    Statement,
    /// Declarations of types, functions and globals that later submissions can see
    TopLevel,
}

/// One registered submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: SubmissionId,
    pub text: String,
    pub mode: SubmissionMode,
}

impl Submission {
    /// Source line `line` (1-based) of the user text
    pub fn line(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.text.split('\n').nth(line as usize - 1)
    }

    /// Number of user-visible lines (an empty submission has one empty line)
    pub fn line_count(&self) -> u32 {
        self.text.split('\n').count() as u32
    }
}

/// Registry of all submissions in a session
#[derive(Debug, Default)]
pub struct SourceRegistry {
    submissions: Vec<Submission>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `text` and assign it the next identity
    pub fn allocate(&mut self, text: impl Into<String>, mode: SubmissionMode) -> SubmissionId {
        let id = SubmissionId(self.submissions.len() as u32);
        self.submissions.push(Submission {
            id,
            text: text.into(),
            mode,
        });
        tracing::trace!(submission = id.0, ?mode, "allocated submission");
        id
    }

    /// Look up a submission.
    ///
    /// # Panics
    ///
    /// Panics on an identity this registry never allocated; that is a bug in
    /// the caller, not a user error.
    pub fn get(&self, id: SubmissionId) -> &Submission {
        match self.submissions.get(id.0 as usize) {
            Some(submission) => submission,
            None => panic!("internal error: unknown submission identity {}", id),
        }
    }

    /// Human-readable owner tag, e.g. `user expression 3`
    pub fn render(&self, id: SubmissionId) -> String {
        owner_tag(self.get(id).id)
    }

    /// Number of submissions allocated so far
    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

/// Owner tag for a submission identity
pub fn owner_tag(id: SubmissionId) -> String {
    format!("user expression {}", id.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_identity_is_zero() {
        let mut registry = SourceRegistry::new();
        assert_eq!(registry.allocate("1", SubmissionMode::Statement), SubmissionId(0));
        assert_eq!(registry.allocate("2", SubmissionMode::TopLevel), SubmissionId(1));
    }

    #[test]
    fn test_render_owner_tag() {
        let mut registry = SourceRegistry::new();
        registry.allocate("a", SubmissionMode::Statement);
        let id = registry.allocate("b", SubmissionMode::Statement);
        assert_eq!(registry.render(id), "user expression 1");
    }

    #[test]
    fn test_lines() {
        let mut registry = SourceRegistry::new();
        let id = registry.allocate("int a = 0;\nfoobar +=1;\na", SubmissionMode::Statement);
        let submission = registry.get(id);
        assert_eq!(submission.line_count(), 3);
        assert_eq!(submission.line(2), Some("foobar +=1;"));
        assert_eq!(submission.line(4), None);
        assert_eq!(submission.line(0), None);
    }

    #[test]
    #[should_panic(expected = "unknown submission identity")]
    fn test_unknown_identity_is_fatal() {
        let registry = SourceRegistry::new();
        registry.get(SubmissionId(7));
    }

    proptest! {
        #[test]
        fn prop_identities_strictly_increase(texts in proptest::collection::vec(".*", 1..32)) {
            let mut registry = SourceRegistry::new();
            let mut previous: Option<SubmissionId> = None;
            for text in texts {
                let id = registry.allocate(text.clone(), SubmissionMode::Statement);
                if let Some(prev) = previous {
                    prop_assert!(id > prev);
                }
                prop_assert_eq!(&registry.get(id).text, &text);
                previous = Some(id);
            }
        }
    }
}
