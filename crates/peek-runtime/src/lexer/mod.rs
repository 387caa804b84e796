//! Lexical analysis (tokenization)
//!
//! The lexer converts wrapped expression source into a stream of tokens.
//! Spans are character offsets into the wrapped text so the position mapper
//! can translate them back into user coordinates.

use crate::diagnostic::SyntaxError;
use crate::span::Span;
use crate::token::{Token, TokenKind};

mod literals;

pub use literals::char_value;

/// Lexer state for tokenizing source code
pub struct Lexer {
    /// Characters of source code
    pub(super) chars: Vec<char>,
    /// Current position in chars
    pub(super) current: usize,
    /// Start position of current token
    pub(super) start_pos: usize,
    /// Collected diagnostics
    pub(super) diagnostics: Vec<SyntaxError>,
    /// True when only whitespace has been seen since the last newline
    at_line_start: bool,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: impl AsRef<str>) -> Self {
        Self {
            chars: source.as_ref().chars().collect(),
            current: 0,
            start_pos: 0,
            diagnostics: Vec::new(),
            at_line_start: true,
        }
    }

    /// Tokenize the source code, returning tokens and any diagnostics
    pub fn tokenize(&mut self) -> (Vec<Token>, Vec<SyntaxError>) {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            if token.kind != TokenKind::Error {
                tokens.push(token);
            }
            if is_eof {
                break;
            }
        }

        (tokens, std::mem::take(&mut self.diagnostics))
    }

    /// Scan the next token
    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        self.start_pos = self.current;

        if self.is_at_end() {
            return self.make_token(TokenKind::Eof);
        }

        if self.peek() == '#' && self.at_line_start {
            self.directive();
            return self.make_token(TokenKind::Error);
        }
        self.at_line_start = false;

        let c = self.advance();

        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            '{' => self.make_token(TokenKind::LeftBrace),
            '}' => self.make_token(TokenKind::RightBrace),
            ';' => self.make_token(TokenKind::Semicolon),
            ',' => self.make_token(TokenKind::Comma),
            '.' if self.peek().is_ascii_digit() => self.number(),
            '.' => self.make_token(TokenKind::Dot),
            ':' => {
                if self.match_char(':') {
                    self.make_token(TokenKind::ColonColon)
                } else {
                    self.make_token(TokenKind::Colon)
                }
            }
            '+' => {
                if self.match_char('+') {
                    self.make_token(TokenKind::PlusPlus)
                } else if self.match_char('=') {
                    self.make_token(TokenKind::PlusEqual)
                } else {
                    self.make_token(TokenKind::Plus)
                }
            }
            '-' => {
                if self.match_char('-') {
                    self.make_token(TokenKind::MinusMinus)
                } else if self.match_char('=') {
                    self.make_token(TokenKind::MinusEqual)
                } else if self.match_char('>') {
                    self.make_token(TokenKind::Arrow)
                } else {
                    self.make_token(TokenKind::Minus)
                }
            }
            '*' => self.one_or_assign(TokenKind::Star, TokenKind::StarEqual),
            '/' => self.one_or_assign(TokenKind::Slash, TokenKind::SlashEqual),
            '%' => self.one_or_assign(TokenKind::Percent, TokenKind::PercentEqual),
            '=' => self.one_or_assign(TokenKind::Equal, TokenKind::EqualEqual),
            '!' => self.one_or_assign(TokenKind::Bang, TokenKind::BangEqual),
            '<' => self.one_or_assign(TokenKind::Less, TokenKind::LessEqual),
            '>' => self.one_or_assign(TokenKind::Greater, TokenKind::GreaterEqual),
            '&' => {
                if self.match_char('&') {
                    self.make_token(TokenKind::AmpAmp)
                } else {
                    self.error_token("unexpected character '&'")
                }
            }
            '|' => {
                if self.match_char('|') {
                    self.make_token(TokenKind::PipePipe)
                } else {
                    self.error_token("unexpected character '|'")
                }
            }
            '\'' => self.char_literal(),
            c if c.is_ascii_digit() => self.number(),
            c if is_ident_start(c) => self.identifier(),
            c => self.error_token(&format!("unexpected character '{}'", c)),
        }
    }

    fn one_or_assign(&mut self, single: TokenKind, with_equal: TokenKind) -> Token {
        if self.match_char('=') {
            self.make_token(with_equal)
        } else {
            self.make_token(single)
        }
    }

    /// Scan an identifier or keyword
    fn identifier(&mut self) -> Token {
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let text = self.lexeme();
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, self.current_span())
    }

    /// Handle a preprocessor line; directives are never valid in expressions
    fn directive(&mut self) {
        self.advance(); // '#'
        while self.peek() == ' ' || self.peek() == '\t' {
            self.advance();
        }
        let name_start = self.current;
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let name: String = self.chars[name_start..self.current].iter().collect();
        let span = Span::new(self.start_pos, self.current.max(self.start_pos + 1));

        let rest_start = self.current;
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
        let rest: String = self.chars[rest_start..self.current].iter().collect();

        if name == "error" {
            let message = unquote_directive_text(rest.trim());
            self.diagnostics.push(SyntaxError::new(message, span));
        } else {
            self.diagnostics
                .push(SyntaxError::new("invalid preprocessing directive", span));
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    self.at_line_start = true;
                }
                '/' if self.peek_next() == '/' => {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == '*' => {
                    let start = self.current;
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            self.diagnostics.push(SyntaxError::new(
                                "unterminated /* comment",
                                Span::new(start, start + 2),
                            ));
                            return;
                        }
                        if self.peek() == '*' && self.peek_next() == '/' {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.advance() == '\n' {
                            self.at_line_start = true;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    // === Helper methods ===

    pub(super) fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    pub(super) fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        c
    }

    pub(super) fn peek(&self) -> char {
        self.chars.get(self.current).copied().unwrap_or('\0')
    }

    pub(super) fn peek_next(&self) -> char {
        self.chars.get(self.current + 1).copied().unwrap_or('\0')
    }

    pub(super) fn match_char(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    pub(super) fn lexeme(&self) -> String {
        self.chars[self.start_pos..self.current].iter().collect()
    }

    pub(super) fn current_span(&self) -> Span {
        Span::new(self.start_pos, self.current)
    }

    pub(super) fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme(), self.current_span())
    }

    pub(super) fn error_token(&mut self, message: &str) -> Token {
        self.diagnostics
            .push(SyntaxError::new(message, self.current_span()));
        self.make_token(TokenKind::Error)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// `#error("I am error.")` and `#error I am error.` report the same text
fn unquote_directive_text(text: &str) -> String {
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text)
        .trim();
    inner
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(inner)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = Lexer::new(source).tokenize();
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[rstest]
    #[case("a += 1", vec![TokenKind::Identifier, TokenKind::PlusEqual, TokenKind::Integer, TokenKind::Eof])]
    #[case("p->x", vec![TokenKind::Identifier, TokenKind::Arrow, TokenKind::Identifier, TokenKind::Eof])]
    #[case("E::A", vec![TokenKind::Identifier, TokenKind::ColonColon, TokenKind::Identifier, TokenKind::Eof])]
    #[case("x++ && !y", vec![TokenKind::Identifier, TokenKind::PlusPlus, TokenKind::AmpAmp, TokenKind::Bang, TokenKind::Identifier, TokenKind::Eof])]
    #[case("struct S {};", vec![TokenKind::Struct, TokenKind::Identifier, TokenKind::LeftBrace, TokenKind::RightBrace, TokenKind::Semicolon, TokenKind::Eof])]
    fn test_token_kinds(#[case] source: &str, #[case] expected: Vec<TokenKind>) {
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn test_dollar_identifiers() {
        let (tokens, _) = Lexer::new("$__peek_expr $0").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].lexeme, "$__peek_expr");
        assert_eq!(tokens[1].lexeme, "$0");
    }

    #[test]
    fn test_spans_are_char_offsets() {
        let (tokens, _) = Lexer::new("1 + unknown_identifier").tokenize();
        assert_eq!(tokens[2].span, Span::new(4, 22));
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("// line\n/* block\n */ x"),
            vec![TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let (_, diags) = Lexer::new("x /* never closed").tokenize();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "unterminated /* comment");
        assert_eq!(diags[0].span.start, 2);
    }

    #[test]
    fn test_error_directive() {
        let (tokens, diags) = Lexer::new("#error(\"I am error.\")").tokenize();
        assert_eq!(diags[0].message, "I am error.");
        assert_eq!(diags[0].span.start, 0);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_unknown_directive() {
        let (_, diags) = Lexer::new("  #pragma once").tokenize();
        assert_eq!(diags[0].message, "invalid preprocessing directive");
        assert_eq!(diags[0].span.start, 2);
    }

    #[test]
    fn test_unexpected_character() {
        let (tokens, diags) = Lexer::new("a @ b").tokenize();
        assert_eq!(diags[0].message, "unexpected character '@'");
        assert_eq!(tokens.len(), 3);
    }
}
