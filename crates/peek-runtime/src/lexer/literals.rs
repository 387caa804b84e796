//! Literal scanning for the lexer

use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

impl Lexer {
    /// Scan a number literal (decimal, hex, float, scientific notation)
    ///
    /// The first character has already been consumed.
    pub(super) fn number(&mut self) -> Token {
        let first = self.chars[self.start_pos];

        if first == '0' && matches!(self.peek(), 'x' | 'X') && self.peek_next().is_ascii_hexdigit()
        {
            self.advance(); // x
            while self.peek().is_ascii_hexdigit() {
                self.advance();
            }
            self.integer_suffix();
            return self.make_token(TokenKind::Integer);
        }

        let mut is_float = first == '.';

        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if !is_float && self.peek() == '.' {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        if matches!(self.peek(), 'e' | 'E') {
            let sign = matches!(self.peek_next(), '+' | '-');
            let digit_at = if sign { self.current + 2 } else { self.current + 1 };
            if self.chars.get(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.advance(); // e
                if sign {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }

        if is_float {
            if matches!(self.peek(), 'f' | 'F') {
                self.advance();
            }
            return self.make_token(TokenKind::Float);
        }

        self.integer_suffix();
        if self.peek().is_ascii_alphabetic() || self.peek() == '_' {
            while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
                self.advance();
            }
            let text = self.lexeme();
            return self.error_token(&format!("invalid suffix on integer constant '{}'", text));
        }
        self.make_token(TokenKind::Integer)
    }

    fn integer_suffix(&mut self) {
        while matches!(self.peek(), 'u' | 'U' | 'l' | 'L') {
            self.advance();
        }
    }

    /// Scan a character literal; the opening quote has been consumed
    pub(super) fn char_literal(&mut self) -> Token {
        if self.is_at_end() || self.peek() == '\n' {
            return self.error_token("missing terminating ' character");
        }

        if self.peek() == '\\' {
            self.advance();
            if self.is_at_end() {
                return self.error_token("missing terminating ' character");
            }
            let escaped = self.advance();
            if !matches!(escaped, 'n' | 'r' | 't' | '0' | '\\' | '\'' | '"') {
                while !self.is_at_end() && self.peek() != '\'' && self.peek() != '\n' {
                    self.advance();
                }
                self.match_char('\'');
                return self.error_token(&format!("unknown escape sequence '\\{}'", escaped));
            }
        } else if self.peek() == '\'' {
            self.advance();
            return self.error_token("empty character constant");
        } else {
            self.advance();
        }

        if !self.match_char('\'') {
            while !self.is_at_end() && self.peek() != '\'' && self.peek() != '\n' {
                self.advance();
            }
            self.match_char('\'');
            return self.error_token("multi-character character constant is not supported");
        }

        self.make_token(TokenKind::Char)
    }
}

/// Numeric value of a character literal lexeme such as `'a'` or `'\n'`
pub fn char_value(lexeme: &str) -> Option<char> {
    let inner = lexeme.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    match chars.next()? {
        '\\' => match chars.next()? {
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            '0' => Some('\0'),
            other => Some(other),
        },
        c => Some(c),
    }
}
