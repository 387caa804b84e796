//! Diagnostic system for expression evaluation
//!
//! Every failure of a submission flows through the `Diagnostic` type. A
//! diagnostic renders two ways: a clang-style text block (header, quoted
//! source line, caret line) and a structured record for programmatic
//! consumers.

pub mod formatter;

use crate::registry::{owner_tag, SubmissionId};
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic schema version
pub const DIAG_VERSION: u32 = 1;

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// Error taxonomy for recoverable failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Syntax,
    UndeclaredIdentifier,
    Redefinition,
    Semantic,
}

/// Who owns the text a location points into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationOwner {
    /// A synthetic `user expression N` buffer
    Submission(SubmissionId),
    /// A real file known from debug information
    External(String),
}

impl fmt::Display for LocationOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationOwner::Submission(id) => write!(f, "<{}>", owner_tag(*id)),
            LocationOwner::External(path) => write!(f, "{}", path),
        }
    }
}

/// A resolved, user-facing source position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub owner: LocationOwner,
    /// 1-based line (0 when no position is known)
    pub line: u32,
    /// 1-based column (0 when no position is known)
    pub column: u32,
    /// Rendering must not reveal file, line or column; the position is kept
    /// so the location can be shown again later
    pub hidden: bool,
    /// Points into text the user typed (as opposed to wrapper or external code)
    pub in_user_input: bool,
}

impl SourceLocation {
    /// Location inside a submission
    pub fn in_submission(id: SubmissionId, line: u32, column: u32) -> Self {
        Self {
            owner: LocationOwner::Submission(id),
            line,
            column,
            hidden: false,
            in_user_input: true,
        }
    }

    /// Location in a real source file
    pub fn external(path: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            owner: LocationOwner::External(path.into()),
            line,
            column,
            hidden: false,
            in_user_input: false,
        }
    }

    /// A location with no known position
    pub fn hidden() -> Self {
        Self {
            owner: LocationOwner::External(String::new()),
            line: 0,
            column: 0,
            hidden: true,
            in_user_input: false,
        }
    }

    /// The submission this location points into, if any
    pub fn submission(&self) -> Option<SubmissionId> {
        match self.owner {
            LocationOwner::Submission(id) => Some(id),
            LocationOwner::External(_) => None,
        }
    }

    /// Whether this location points at a known line of a named file
    pub fn has_position(&self) -> bool {
        match &self.owner {
            LocationOwner::Submission(_) => self.line > 0,
            LocationOwner::External(path) => self.line > 0 && !path.is_empty(),
        }
    }

    /// Show or hide an external location. Submission locations are always
    /// shown and locations without a position always stay hidden.
    pub fn set_shown(&mut self, shown: bool) {
        if matches!(self.owner, LocationOwner::External(_)) && self.has_position() {
            self.hidden = !shown;
        }
    }

    /// File name as reported in structured records
    pub fn file_name(&self) -> String {
        if self.hidden {
            return String::new();
        }
        match &self.owner {
            LocationOwner::Submission(id) => owner_tag(*id),
            LocationOwner::External(path) => path.clone(),
        }
    }
}

/// Syntax error produced before positions are resolved
///
/// Lexer and parser only know spans in the wrapped source; the evaluator maps
/// them through the position mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// A diagnostic (error, warning, or note)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    /// Highlighted column range `[start, end)` on the location's line
    pub highlight: Option<(u32, u32)>,
    /// The quoted source line, when the owner's text is available
    pub snippet: Option<String>,
    /// Attached notes (severity is always `Note`)
    pub notes: Vec<Diagnostic>,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::with_severity(kind, Severity::Error, message, location)
    }

    /// Create a warning diagnostic
    pub fn warning(
        kind: DiagnosticKind,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self::with_severity(kind, Severity::Warning, message, location)
    }

    /// Create a note; notes only ever appear attached to another diagnostic
    pub fn note(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::with_severity(DiagnosticKind::Semantic, Severity::Note, message, location)
    }

    fn with_severity(
        kind: DiagnosticKind,
        severity: Severity,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            location,
            highlight: None,
            snippet: None,
            notes: Vec::new(),
        }
    }

    /// Set the highlighted column range
    pub fn with_highlight(mut self, start: u32, end: u32) -> Self {
        self.highlight = Some((start, end));
        self
    }

    /// Set the quoted source line
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Attach a note
    pub fn with_note(mut self, note: Diagnostic) -> Self {
        debug_assert_eq!(note.severity, Severity::Note);
        self.notes.push(note);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Show or hide the external locations of this diagnostic and its notes
    pub fn set_source_locations(&mut self, enabled: bool) {
        self.location.set_shown(enabled);
        for note in &mut self.notes {
            note.set_source_locations(enabled);
        }
    }

    /// Render this diagnostic and its notes as text.
    ///
    /// ```text
    /// <user expression 7>:1:8: error: redefinition of 'Redef'
    ///     1 | struct Redef { float y; };
    ///       |        ^
    /// ```
    pub fn to_human_string(&self) -> String {
        let mut output = String::new();
        self.write_block(&mut output);
        for note in &self.notes {
            note.write_block(&mut output);
        }
        output
    }

    fn write_block(&self, output: &mut String) {
        if self.location.hidden {
            output.push_str(&format!("{}: {}\n", self.severity, self.message));
            return;
        }

        output.push_str(&format!(
            "{}:{}:{}: {}: {}\n",
            self.location.owner, self.location.line, self.location.column, self.severity, self.message
        ));

        if let Some(snippet) = &self.snippet {
            output.push_str(&format!("{:>5} | {}\n", self.location.line, snippet));
            output.push_str(&format!("{:>5} | {}\n", "", self.marker_line()));
        }
    }

    /// Caret line: `^` under the column, `~` across the rest of the highlight
    pub fn marker_line(&self) -> String {
        let column = self.location.column.max(1);
        let (start, end) = match self.highlight {
            Some((start, end)) => (start.min(column), end.max(column + 1)),
            None => (column, column + 1),
        };

        let mut marker = " ".repeat(start.saturating_sub(1) as usize);
        for col in start..end {
            if col == column {
                marker.push('^');
            } else {
                marker.push('~');
            }
        }
        marker
    }

    /// Structured record of this diagnostic
    pub fn to_detail(&self) -> DiagnosticDetail {
        DiagnosticDetail {
            severity: self.severity,
            message: self.message.clone(),
            rendered: self.to_human_string(),
            source_location: SourceLocationRecord {
                file: self.location.file_name(),
                line: if self.location.hidden { 0 } else { self.location.line },
                column: if self.location.hidden { 0 } else { self.location.column },
                hidden: self.location.hidden,
                in_user_input: self.location.in_user_input,
            },
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_string())
    }
}

/// `source_location` entry of a structured record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocationRecord {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub hidden: bool,
    pub in_user_input: bool,
}

/// One entry of `details`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticDetail {
    pub severity: Severity,
    pub message: String,
    pub rendered: String,
    pub source_location: SourceLocationRecord,
}

/// Structured record for a failed submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub version: u32,
    pub details: Vec<DiagnosticDetail>,
}

impl DiagnosticReport {
    /// Build a report from diagnostics already in source order
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        Self {
            version: DIAG_VERSION,
            details: diagnostics.iter().map(Diagnostic::to_detail).collect(),
        }
    }

    /// Concatenated rendered text of every detail
    pub fn rendered(&self) -> String {
        self.details.iter().map(|d| d.rendered.as_str()).collect()
    }

    /// Format as JSON string
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Result of rendering one diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagnostic {
    pub text: String,
    pub record: DiagnosticReport,
}

/// Render a diagnostic into text plus its structured record
pub fn render(diagnostic: &Diagnostic) -> RenderedDiagnostic {
    let record = DiagnosticReport::from_diagnostics(std::slice::from_ref(diagnostic));
    RenderedDiagnostic {
        text: diagnostic.to_human_string(),
        record,
    }
}

/// Sort diagnostics of one submission into left-to-right source order
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        a.location
            .line
            .cmp(&b.location.line)
            .then(a.location.column.cmp(&b.location.column))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(line: u32, column: u32) -> SourceLocation {
        SourceLocation::in_submission(SubmissionId(0), line, column)
    }

    #[test]
    fn test_caret_only() {
        let diag = Diagnostic::error(
            DiagnosticKind::UndeclaredIdentifier,
            "undeclared identifier 'unknown_identifier'",
            at(1, 1),
        )
        .with_snippet("unknown_identifier");

        assert_eq!(
            diag.to_human_string(),
            "<user expression 0>:1:1: error: undeclared identifier 'unknown_identifier'\n    1 | unknown_identifier\n      | ^\n"
        );
    }

    #[test]
    fn test_caret_with_range() {
        let diag = Diagnostic::error(
            DiagnosticKind::Semantic,
            "no matching function for call to 'foo'",
            at(1, 1),
        )
        .with_highlight(1, 4)
        .with_snippet("foo(1, 2)");
        assert_eq!(diag.marker_line(), "^~~");
    }

    #[test]
    fn test_range_around_caret() {
        let diag = Diagnostic::error(DiagnosticKind::Semantic, "m", at(1, 5)).with_highlight(3, 8);
        assert_eq!(diag.marker_line(), "  ~~^~~");
    }

    #[test]
    fn test_hidden_location_omits_position() {
        let diag = Diagnostic::error(DiagnosticKind::Semantic, "boom", SourceLocation::hidden())
            .with_snippet("never shown");
        assert_eq!(diag.to_human_string(), "error: boom\n");
    }

    #[test]
    fn test_note_rendered_after_primary() {
        let note = Diagnostic::note(
            "previous definition is here",
            SourceLocation::in_submission(SubmissionId(6), 1, 8),
        )
        .with_snippet("struct Redef { double x; };");
        let diag = Diagnostic::error(
            DiagnosticKind::Redefinition,
            "redefinition of 'Redef'",
            SourceLocation::in_submission(SubmissionId(7), 1, 8),
        )
        .with_snippet("struct Redef { float y; };")
        .with_note(note);

        assert_eq!(
            diag.to_human_string(),
            "<user expression 7>:1:8: error: redefinition of 'Redef'\n    1 | struct Redef { float y; };\n      |        ^\n<user expression 6>:1:8: note: previous definition is here\n    1 | struct Redef { double x; };\n      |        ^\n"
        );
    }

    #[test]
    fn test_external_owner_display() {
        let diag = Diagnostic::note(
            "candidate function not viable",
            SourceLocation::external("diagnostics/main.cpp", 3, 5),
        );
        assert!(diag
            .to_human_string()
            .starts_with("diagnostics/main.cpp:3:5: note: candidate function not viable\n"));
    }

    #[test]
    fn test_external_location_toggles_back() {
        let mut diag = Diagnostic::error(DiagnosticKind::Semantic, "no matching function", at(1, 1))
            .with_note(
                Diagnostic::note("candidate function", SourceLocation::external("main.cpp", 3, 5))
                    .with_snippet("int foo(int x);"),
            );
        let shown = diag.to_human_string();

        diag.set_source_locations(false);
        assert!(!diag.location.hidden);
        assert!(diag.notes[0].location.hidden);
        assert_eq!((diag.notes[0].location.line, diag.notes[0].location.column), (3, 5));
        assert!(diag.to_human_string().ends_with("note: candidate function\n"));
        let record = diag.notes[0].to_detail().source_location;
        assert_eq!((record.file.as_str(), record.line, record.column), ("", 0, 0));

        diag.set_source_locations(true);
        assert_eq!(diag.to_human_string(), shown);
    }

    #[test]
    fn test_positionless_location_stays_hidden() {
        let mut location = SourceLocation::hidden();
        location.set_shown(true);
        assert!(location.hidden);
    }

    #[test]
    fn test_detail_record() {
        let diag = Diagnostic::error(DiagnosticKind::UndeclaredIdentifier, "undeclared identifier 'a'", at(1, 1))
            .with_snippet("a+b");
        let detail = diag.to_detail();
        assert_eq!(detail.severity, Severity::Error);
        assert_eq!(detail.source_location.file, "user expression 0");
        assert!(!detail.source_location.hidden);
        assert!(detail.source_location.in_user_input);
        assert!(detail.rendered.contains("user expression"));
    }

    #[test]
    fn test_report_json_shape() {
        let diag = Diagnostic::error(DiagnosticKind::Syntax, "expected expression", at(1, 3));
        let report = DiagnosticReport::from_diagnostics(&[diag]);
        let json: serde_json::Value = serde_json::from_str(&report.to_json_string().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["details"][0]["severity"], "error");
        assert_eq!(json["details"][0]["source_location"]["column"], 3);
    }

    #[test]
    fn test_sort_left_to_right() {
        let mut diags = vec![
            Diagnostic::error(DiagnosticKind::UndeclaredIdentifier, "b", at(1, 3)),
            Diagnostic::error(DiagnosticKind::UndeclaredIdentifier, "c", at(2, 1)),
            Diagnostic::error(DiagnosticKind::UndeclaredIdentifier, "a", at(1, 1)),
        ];
        sort_diagnostics(&mut diags);
        let order: Vec<_> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_render_pairs_text_and_record() {
        let diag = Diagnostic::warning(DiagnosticKind::Semantic, "unused", at(1, 1));
        let rendered = render(&diag);
        assert_eq!(rendered.record.version, DIAG_VERSION);
        assert_eq!(rendered.record.details.len(), 1);
        assert_eq!(rendered.record.details[0].rendered, rendered.text);
    }
}
