//! Position mapper
//!
//! Submissions are parsed inside a synthetic wrapper. The lexer and parser
//! report character offsets into the wrapped text; this module subtracts the
//! wrapper back out so that the first user line is always line 1, and maps
//! debug-information locations to real files (or hides them).

use crate::diagnostic::SourceLocation;
use crate::registry::{SourceRegistry, SubmissionId, SubmissionMode};
use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Name of the synthetic function wrapping Statement-mode submissions
pub const EXPR_FUNCTION_NAME: &str = "$__peek_expr";

const STATEMENT_PREFIX: &str =
    "// peek expression wrapper\nvoid $__peek_expr(void *$__peek_arg) {\n";
const STATEMENT_SUFFIX: &str = "\n;\n}\n";
const TOP_LEVEL_PREFIX: &str = "// peek top-level wrapper\n";
const TOP_LEVEL_SUFFIX: &str = "\n";

/// Boilerplate placed around user text for one submission mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperShape {
    prefix: &'static str,
    suffix: &'static str,
}

impl WrapperShape {
    pub fn for_mode(mode: SubmissionMode) -> Self {
        match mode {
            SubmissionMode::Statement => Self {
                prefix: STATEMENT_PREFIX,
                suffix: STATEMENT_SUFFIX,
            },
            SubmissionMode::TopLevel => Self {
                prefix: TOP_LEVEL_PREFIX,
                suffix: TOP_LEVEL_SUFFIX,
            },
        }
    }

    /// Wrapped source handed to the lexer
    pub fn wrap(&self, text: &str) -> String {
        let mut wrapped =
            String::with_capacity(self.prefix.len() + text.len() + self.suffix.len());
        wrapped.push_str(self.prefix);
        wrapped.push_str(text);
        wrapped.push_str(self.suffix);
        wrapped
    }

    /// Characters before the first user character
    pub fn prefix_chars(&self) -> usize {
        self.prefix.chars().count()
    }

    /// Wrapper lines before the first user line
    pub fn prefix_lines(&self) -> u32 {
        self.prefix.matches('\n').count() as u32
    }
}

/// A location as recorded in debug information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfoLocation {
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

/// Maps wrapped-source offsets and debug-info locations to user-facing locations
pub struct PositionMapper<'a> {
    registry: &'a SourceRegistry,
    source_locations_enabled: bool,
}

impl<'a> PositionMapper<'a> {
    pub fn new(registry: &'a SourceRegistry, source_locations_enabled: bool) -> Self {
        Self {
            registry,
            source_locations_enabled,
        }
    }

    /// Resolve a character offset in the wrapped text of `id`
    ///
    /// Offsets inside the trailing wrapper clamp to one column past the end of
    /// the last user line and are not user input. Offsets inside the leading
    /// wrapper clamp to 1:1.
    pub fn resolve(&self, offset: usize, id: SubmissionId) -> SourceLocation {
        let submission = self.registry.get(id);
        let shape = WrapperShape::for_mode(submission.mode);
        let prefix = shape.prefix_chars();

        if offset < prefix {
            let mut location = SourceLocation::in_submission(id, 1, 1);
            location.in_user_input = false;
            return location;
        }

        let relative = offset - prefix;
        let user_chars = submission.text.chars().count();
        let in_user_input = relative < user_chars;

        let mut line = 1u32;
        let mut column = 1u32;
        for c in submission.text.chars().take(relative.min(user_chars)) {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        let mut location = SourceLocation::in_submission(id, line, column);
        location.in_user_input = in_user_input;
        location
    }

    /// Column range covered by `span` on its first line, for `^~~` rendering
    ///
    /// Returns `None` for single-character spans.
    pub fn highlight(&self, span: Span, id: SubmissionId) -> Option<(u32, u32)> {
        if span.len() <= 1 {
            return None;
        }
        let start = self.resolve(span.start, id);
        let end = self.resolve(span.end, id);
        let end_column = if end.line == start.line {
            end.column
        } else {
            let line_len = self
                .registry
                .get(id)
                .line(start.line)
                .map(|l| l.chars().count() as u32)
                .unwrap_or(start.column);
            line_len + 1
        };
        (end_column > start.column + 1).then_some((start.column, end_column))
    }

    /// Quoted source line for a location inside a submission
    pub fn snippet(&self, location: &SourceLocation) -> Option<String> {
        if location.hidden {
            return None;
        }
        let id = location.submission()?;
        if id.0 as usize >= self.registry.len() {
            return None;
        }
        self.registry
            .get(id)
            .line(location.line)
            .map(str::to_string)
    }

    /// Map a debug-information location to a real file location
    ///
    /// Without a usable line the result has no position. With source
    /// locations disabled the position is kept but marked hidden.
    pub fn resolve_external(&self, location: &DebugInfoLocation) -> SourceLocation {
        if location.line == 0 || location.file.is_empty() {
            return SourceLocation::hidden();
        }
        let mut resolved =
            SourceLocation::external(location.file.clone(), location.line, location.column.max(1));
        resolved.set_shown(self.source_locations_enabled);
        resolved
    }

    pub fn source_locations_enabled(&self) -> bool {
        self.source_locations_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn registry_with(text: &str, mode: SubmissionMode) -> (SourceRegistry, SubmissionId) {
        let mut registry = SourceRegistry::new();
        let id = registry.allocate(text, mode);
        (registry, id)
    }

    fn offset_of(text: &str, needle: &str, mode: SubmissionMode) -> usize {
        let shape = WrapperShape::for_mode(mode);
        let wrapped = shape.wrap(text);
        let byte = wrapped.find(needle).unwrap();
        wrapped[..byte].chars().count()
    }

    #[rstest]
    #[case(SubmissionMode::Statement)]
    #[case(SubmissionMode::TopLevel)]
    fn test_first_user_char_is_line_one_column_one(#[case] mode: SubmissionMode) {
        let (registry, id) = registry_with("unknown_identifier", mode);
        let mapper = PositionMapper::new(&registry, true);
        let offset = offset_of("unknown_identifier", "unknown_identifier", mode);
        let location = mapper.resolve(offset, id);
        assert_eq!((location.line, location.column), (1, 1));
        assert!(location.in_user_input);
    }

    #[test]
    fn test_multiline_submission() {
        let text = "int a = 0;\nfoobar +=1;\na";
        let (registry, id) = registry_with(text, SubmissionMode::Statement);
        let mapper = PositionMapper::new(&registry, true);
        let location = mapper.resolve(offset_of(text, "foobar", SubmissionMode::Statement), id);
        assert_eq!((location.line, location.column), (2, 1));
    }

    #[test]
    fn test_suffix_offsets_clamp_to_end_of_last_line() {
        let text = "1 +";
        let (registry, id) = registry_with(text, SubmissionMode::Statement);
        let mapper = PositionMapper::new(&registry, true);
        let wrapped_len = WrapperShape::for_mode(SubmissionMode::Statement)
            .wrap(text)
            .chars()
            .count();
        let location = mapper.resolve(wrapped_len - 2, id);
        assert_eq!((location.line, location.column), (1, 4));
        assert!(!location.in_user_input);
    }

    #[test]
    fn test_highlight_range() {
        let text = "foo(1, 2)";
        let (registry, id) = registry_with(text, SubmissionMode::Statement);
        let mapper = PositionMapper::new(&registry, true);
        let start = offset_of(text, "foo", SubmissionMode::Statement);
        assert_eq!(mapper.highlight(Span::new(start, start + 3), id), Some((1, 4)));
        assert_eq!(mapper.highlight(Span::new(start, start + 1), id), None);
    }

    #[test]
    fn test_snippet() {
        let text = "int a = 0;\nfoobar +=1;";
        let (registry, id) = registry_with(text, SubmissionMode::Statement);
        let mapper = PositionMapper::new(&registry, true);
        let location = SourceLocation::in_submission(id, 2, 1);
        assert_eq!(mapper.snippet(&location).as_deref(), Some("foobar +=1;"));
        assert_eq!(mapper.snippet(&SourceLocation::hidden()), None);
    }

    #[test]
    fn test_resolve_external_honors_toggle() {
        let registry = SourceRegistry::new();
        let debug_location = DebugInfoLocation {
            file: "main.cpp".into(),
            line: 3,
            column: 5,
        };

        let enabled = PositionMapper::new(&registry, true).resolve_external(&debug_location);
        assert!(!enabled.hidden);
        assert_eq!(enabled.file_name(), "main.cpp");
        assert_eq!((enabled.line, enabled.column), (3, 5));

        let disabled = PositionMapper::new(&registry, false).resolve_external(&debug_location);
        assert!(disabled.hidden);
        assert_eq!(disabled.file_name(), "");
        assert_eq!((disabled.line, disabled.column), (3, 5));
        assert_eq!(disabled.owner, enabled.owner);
    }

    #[test]
    fn test_resolve_external_without_line_has_no_position() {
        let registry = SourceRegistry::new();
        let debug_location = DebugInfoLocation {
            file: "main.cpp".into(),
            line: 0,
            column: 0,
        };
        let resolved = PositionMapper::new(&registry, true).resolve_external(&debug_location);
        assert_eq!(resolved, SourceLocation::hidden());
    }

    #[test]
    fn test_prefix_lines() {
        assert_eq!(WrapperShape::for_mode(SubmissionMode::Statement).prefix_lines(), 2);
        assert_eq!(WrapperShape::for_mode(SubmissionMode::TopLevel).prefix_lines(), 1);
    }
}
