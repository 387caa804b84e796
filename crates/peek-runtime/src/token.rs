//! Token types for lexical analysis
//!
//! Defines the tokens of the C-family subset accepted by the expression evaluator.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Token produced by the lexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The source text of this token
    pub lexeme: String,
    /// Source location
    pub span: Span,
}

impl Token {
    /// Create a new token
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }
}

/// Classification of token types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Integer literal (42, 0x2a)
    Integer,
    /// Floating literal (3.14, 1e9)
    Float,
    /// Character literal ('a')
    Char,
    /// `true`
    True,
    /// `false`
    False,
    /// `nullptr`
    Nullptr,
    /// Identifier (may contain `$`)
    Identifier,

    // Declaration keywords
    Struct,
    Class,
    Enum,
    Void,
    Bool,
    CharKw,
    Short,
    Int,
    Long,
    Unsigned,
    FloatKw,
    Double,
    Auto,

    // Statement keywords
    If,
    Else,
    While,
    Return,
    This,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Semicolon,
    Comma,
    Dot,
    /// `->`
    Arrow,
    /// `::`
    ColonColon,
    Colon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AmpAmp,
    PipePipe,
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    PlusPlus,
    MinusMinus,

    /// Invalid input; the lexer already reported it
    Error,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Keyword lookup for an identifier-shaped lexeme
    pub fn keyword(text: &str) -> Option<TokenKind> {
        Some(match text {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nullptr" => TokenKind::Nullptr,
            "struct" => TokenKind::Struct,
            "class" => TokenKind::Class,
            "enum" => TokenKind::Enum,
            "void" => TokenKind::Void,
            "bool" => TokenKind::Bool,
            "char" => TokenKind::CharKw,
            "short" => TokenKind::Short,
            "int" => TokenKind::Int,
            "long" => TokenKind::Long,
            "unsigned" => TokenKind::Unsigned,
            "float" => TokenKind::FloatKw,
            "double" => TokenKind::Double,
            "auto" => TokenKind::Auto,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "return" => TokenKind::Return,
            "this" => TokenKind::This,
            _ => return None,
        })
    }

    /// Whether this token starts a builtin type specifier
    pub fn is_builtin_type(self) -> bool {
        matches!(
            self,
            TokenKind::Void
                | TokenKind::Bool
                | TokenKind::CharKw
                | TokenKind::Short
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Unsigned
                | TokenKind::FloatKw
                | TokenKind::Double
                | TokenKind::Auto
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("struct"), Some(TokenKind::Struct));
        assert_eq!(TokenKind::keyword("this"), Some(TokenKind::This));
        assert_eq!(TokenKind::keyword("foobar"), None);
    }

    #[test]
    fn test_builtin_types() {
        assert!(TokenKind::Int.is_builtin_type());
        assert!(TokenKind::Auto.is_builtin_type());
        assert!(!TokenKind::Struct.is_builtin_type());
        assert!(!TokenKind::Identifier.is_builtin_type());
    }
}
