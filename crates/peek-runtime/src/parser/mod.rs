//! Parsing (tokens to AST)
//!
//! The parser converts a stream of tokens into a `TranslationUnit`.
//! Uses Pratt parsing for expressions and recursive descent for statements
//! and declarations. Errors are collected, not thrown: after a failure the
//! parser resynchronizes at the next statement boundary so one pass reports
//! every independent problem.

mod expr;
mod stmt;

use crate::ast::*;
use crate::diagnostic::SyntaxError;
use crate::span::Span;
use crate::token::{Token, TokenKind};
use crate::types::{FloatKind, IntKind};
use std::collections::HashSet;

/// Parser state for building AST from tokens
pub struct Parser {
    pub(super) tokens: Vec<Token>,
    pub(super) current: usize,
    pub(super) diagnostics: Vec<SyntaxError>,
    /// Names known to denote types; disambiguates `T * x` from a multiplication
    pub(super) type_names: HashSet<String>,
}

/// Operator precedence levels for Pratt parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    Lowest,
    Assignment, // = += -= *= /= %=
    Or,         // ||
    And,        // &&
    Equality,   // == !=
    Comparison, // < <= > >=
    Term,       // + -
    Factor,     // * / %
    Unary,      // ! - * ++ --
    Call,       // () . -> postfix ++ --
}

/// Anything introduced by a type specifier
pub(super) enum Declaration {
    Record(RecordDecl),
    Enum(EnumDecl),
    Function(FunctionDecl),
    Variables(Vec<VarDecl>),
}

impl Parser {
    /// Create a new parser for the given tokens
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token::new(TokenKind::Eof, "", Span::new(end, end)));
        }
        Self {
            tokens,
            current: 0,
            diagnostics: Vec::new(),
            type_names: HashSet::new(),
        }
    }

    /// Seed the set of names that denote types (persistent and debug-info types)
    pub fn with_type_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.type_names.extend(names);
        self
    }

    /// Parse tokens into a translation unit
    pub fn parse(&mut self) -> (TranslationUnit, Vec<SyntaxError>) {
        let mut items = Vec::new();

        while !self.is_at_end() {
            if self.match_token(TokenKind::Semicolon) {
                continue;
            }
            if self.parse_item(&mut items).is_err() {
                self.synchronize();
            }
        }

        (TranslationUnit { items }, std::mem::take(&mut self.diagnostics))
    }

    // === Top-level parsing ===

    fn parse_item(&mut self, items: &mut Vec<Item>) -> Result<(), ()> {
        if self.check(TokenKind::RightBrace) {
            self.error("extraneous closing brace ('}')");
            self.advance();
            return Ok(());
        }

        if !self.starts_declaration() && !self.check(TokenKind::Identifier) {
            self.error("expected unqualified-id");
            return Err(());
        }

        match self.parse_declaration()? {
            Declaration::Record(r) => items.push(Item::Record(r)),
            Declaration::Enum(e) => items.push(Item::Enum(e)),
            Declaration::Function(f) => items.push(Item::Function(f)),
            Declaration::Variables(vars) => items.extend(vars.into_iter().map(Item::Variable)),
        }
        Ok(())
    }

    /// Parse a record, enum, function or variable declaration
    pub(super) fn parse_declaration(&mut self) -> Result<Declaration, ()> {
        let start = self.peek().span;

        if self.check(TokenKind::Struct) || self.check(TokenKind::Class) {
            let kind = if self.advance().kind == TokenKind::Struct {
                RecordKind::Struct
            } else {
                RecordKind::Class
            };
            let name = self.consume_identifier()?;

            if self.check(TokenKind::LeftBrace) {
                self.type_names.insert(name.name.clone());
                let fields = self.parse_record_body()?;
                let keyword = match kind {
                    RecordKind::Struct => "struct",
                    RecordKind::Class => "class",
                };
                self.expect_semicolon(&format!("expected ';' after {}", keyword))?;
                return Ok(Declaration::Record(RecordDecl {
                    kind,
                    name,
                    fields: Some(fields),
                    span: start.merge(self.previous().span),
                }));
            }

            if self.match_token(TokenKind::Semicolon) {
                self.type_names.insert(name.name.clone());
                return Ok(Declaration::Record(RecordDecl {
                    kind,
                    name,
                    fields: None,
                    span: start.merge(self.previous().span),
                }));
            }

            // Elaborated type specifier: `struct S s;`
            return self.parse_declarators(TypeSpec::Named(name), start);
        }

        if self.check(TokenKind::Enum) {
            self.advance();
            let scoped = self.match_token(TokenKind::Class) || self.match_token(TokenKind::Struct);
            let name = self.consume_identifier()?;

            if self.check(TokenKind::LeftBrace) {
                self.type_names.insert(name.name.clone());
                let enumerators = self.parse_enum_body()?;
                self.expect_semicolon("expected ';' after enum")?;
                return Ok(Declaration::Enum(EnumDecl {
                    name,
                    scoped,
                    enumerators,
                    span: start.merge(self.previous().span),
                }));
            }

            return self.parse_declarators(TypeSpec::Named(name), start);
        }

        let spec = self.parse_type_spec()?;
        self.parse_declarators(spec, start)
    }

    /// Declarator list after a type specifier; a lone `name(` starts a function
    fn parse_declarators(&mut self, spec: TypeSpec, start: Span) -> Result<Declaration, ()> {
        let spec_span = start.merge(self.previous().span);
        let mut decls = Vec::new();

        loop {
            let pointer_depth = self.parse_pointer_depth();
            let name = self.consume_identifier()?;
            let type_ref = TypeRef {
                spec: spec.clone(),
                pointer_depth,
                span: spec_span,
            };

            if decls.is_empty() && self.check(TokenKind::LeftParen) {
                return Ok(Declaration::Function(self.parse_function_rest(type_ref, name, start)?));
            }

            let init = if self.match_token(TokenKind::Equal) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            let span = name.span.merge(self.previous().span);
            decls.push(VarDecl {
                type_ref,
                name,
                init,
                span,
            });

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.expect_semicolon("expected ';' at end of declaration")?;
        Ok(Declaration::Variables(decls))
    }

    /// Parameters and body of a function whose name was just consumed
    fn parse_function_rest(
        &mut self,
        return_type: TypeRef,
        name: Identifier,
        start: Span,
    ) -> Result<FunctionDecl, ()> {
        self.consume(TokenKind::LeftParen, "expected '('")?;

        let mut params = Vec::new();
        let void_list = self.check(TokenKind::Void) && self.peek_at(1).kind == TokenKind::RightParen;
        if void_list {
            self.advance();
        } else if !self.check(TokenKind::RightParen) {
            loop {
                let param_start = self.peek().span;
                let spec = self.parse_param_spec()?;
                let spec_span = param_start.merge(self.previous().span);
                let pointer_depth = self.parse_pointer_depth();
                let param_name = if self.check(TokenKind::Identifier) {
                    let token = self.advance();
                    Some(Identifier {
                        name: token.lexeme.clone(),
                        span: token.span,
                    })
                } else {
                    None
                };
                params.push(Param {
                    type_ref: TypeRef {
                        spec,
                        pointer_depth,
                        span: spec_span,
                    },
                    name: param_name,
                    span: param_start.merge(self.previous().span),
                });

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightParen, "expected ')'")?;

        let body = if self.match_token(TokenKind::Semicolon) {
            None
        } else if self.check(TokenKind::LeftBrace) {
            Some(self.parse_block()?)
        } else {
            self.error("expected function body after function declarator");
            return Err(());
        };

        Ok(FunctionDecl {
            return_type,
            name,
            params,
            body,
            span: start.merge(self.previous().span),
        })
    }

    fn parse_param_spec(&mut self) -> Result<TypeSpec, ()> {
        if self.match_token(TokenKind::Struct)
            || self.match_token(TokenKind::Class)
            || self.match_token(TokenKind::Enum)
        {
            return Ok(TypeSpec::Named(self.consume_identifier()?));
        }
        self.parse_type_spec()
    }

    fn parse_record_body(&mut self) -> Result<Vec<FieldDecl>, ()> {
        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut fields = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(TokenKind::Semicolon) {
                continue;
            }
            let start = self.peek().span;
            let spec = self.parse_param_spec()?;
            let spec_span = start.merge(self.previous().span);
            loop {
                let pointer_depth = self.parse_pointer_depth();
                let name = self.consume_identifier()?;
                let span = start.merge(name.span);
                fields.push(FieldDecl {
                    type_ref: TypeRef {
                        spec: spec.clone(),
                        pointer_depth,
                        span: spec_span,
                    },
                    name,
                    span,
                });
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            self.expect_semicolon("expected ';' at end of declaration list")?;
        }

        self.consume(TokenKind::RightBrace, "expected '}'")?;
        Ok(fields)
    }

    fn parse_enum_body(&mut self) -> Result<Vec<Enumerator>, ()> {
        self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut enumerators = Vec::new();

        while !self.check(TokenKind::RightBrace) {
            let name = self.consume_identifier()?;
            let value = if self.match_token(TokenKind::Equal) {
                Some(self.parse_precedence(Precedence::Assignment)?)
            } else {
                None
            };
            enumerators.push(Enumerator { name, value });
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.consume(TokenKind::RightBrace, "expected '}'")?;
        Ok(enumerators)
    }

    /// Parse a type specifier (builtin keyword sequence or a type name)
    pub(super) fn parse_type_spec(&mut self) -> Result<TypeSpec, ()> {
        if self.check(TokenKind::Identifier) {
            let token = self.advance();
            return Ok(TypeSpec::Named(Identifier {
                name: token.lexeme.clone(),
                span: token.span,
            }));
        }

        let mut unsigned = false;
        let mut short = false;
        let mut longs = 0;
        let mut char = false;
        let mut int = false;
        let mut other: Option<TokenKind> = None;

        while self.peek().kind.is_builtin_type() {
            match self.advance().kind {
                TokenKind::Unsigned => unsigned = true,
                TokenKind::Short => short = true,
                TokenKind::Long => longs += 1,
                TokenKind::CharKw => char = true,
                TokenKind::Int => int = true,
                kind => other = Some(kind),
            }
        }

        if let Some(kind) = other {
            return Ok(match kind {
                TokenKind::Void => TypeSpec::Void,
                TokenKind::Bool => TypeSpec::Bool,
                TokenKind::Auto => TypeSpec::Auto,
                TokenKind::FloatKw => TypeSpec::Float(FloatKind::Float),
                _ => TypeSpec::Float(FloatKind::Double),
            });
        }

        if !(unsigned || short || longs > 0 || char || int) {
            self.error("expected a type");
            return Err(());
        }

        Ok(TypeSpec::Int(IntKind::from_specifiers(unsigned, short, longs, char)))
    }

    fn parse_pointer_depth(&mut self) -> u32 {
        let mut depth = 0;
        while self.match_token(TokenKind::Star) {
            depth += 1;
        }
        depth
    }

    /// Whether the upcoming tokens start a declaration rather than an expression
    pub(super) fn starts_declaration(&self) -> bool {
        let token = self.peek();
        match token.kind {
            kind if kind.is_builtin_type() => true,
            TokenKind::Struct | TokenKind::Class | TokenKind::Enum => true,
            TokenKind::Identifier => match self.peek_at(1).kind {
                TokenKind::Identifier => true,
                TokenKind::Star => self.type_names.contains(&token.lexeme),
                _ => false,
            },
            _ => false,
        }
    }

    // === Helper methods ===

    /// Advance to next token
    pub(super) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    /// Peek at current token
    pub(super) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Peek `n` tokens ahead, saturating at end of input
    pub(super) fn peek_at(&self, n: usize) -> &Token {
        let index = (self.current + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    /// Most recently consumed token
    pub(super) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Check if current token matches kind
    pub(super) fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    /// Match and consume token if it matches
    pub(super) fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume token of given kind or error
    pub(super) fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token, ()> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            self.error(message);
            Err(())
        }
    }

    /// Consume an identifier
    pub(super) fn consume_identifier(&mut self) -> Result<Identifier, ()> {
        if self.check(TokenKind::Identifier) {
            let token = self.advance();
            return Ok(Identifier {
                name: token.lexeme.clone(),
                span: token.span,
            });
        }
        if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::LeftParen)
            || self.peek().kind.is_builtin_type()
        {
            self.error("expected unqualified-id");
        } else {
            self.error("expected identifier");
        }
        Err(())
    }

    /// Require a `;`; a missing one is reported just past the previous token
    pub(super) fn expect_semicolon(&mut self, message: &str) -> Result<(), ()> {
        if self.match_token(TokenKind::Semicolon) {
            return Ok(());
        }
        let end = self.previous().span.end;
        self.diagnostics
            .push(SyntaxError::new(message, Span::new(end, end + 1)));
        Err(())
    }

    /// Check if at end of token stream
    pub(super) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || self.tokens[self.current].kind == TokenKind::Eof
    }

    /// Record an error at the current token
    pub(super) fn error(&mut self, message: &str) {
        let span = self.peek().span;
        self.diagnostics.push(SyntaxError::new(message, span));
    }

    /// Synchronize after error (skip to next statement)
    ///
    /// Never consumes a `}` so enclosing blocks still see their terminator.
    pub(super) fn synchronize(&mut self) {
        if self.is_at_end() || self.check(TokenKind::RightBrace) {
            return;
        }
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }

            match self.peek().kind {
                TokenKind::RightBrace
                | TokenKind::Struct
                | TokenKind::Class
                | TokenKind::Enum
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
