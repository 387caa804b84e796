//! Expression parsing (Pratt parsing)

use crate::ast::*;
use crate::lexer::char_value;
use crate::parser::{Parser, Precedence};
use crate::token::{Token, TokenKind};
use crate::types::{FloatKind, IntKind};

impl Parser {
    /// Parse an expression
    pub(super) fn parse_expression(&mut self) -> Result<Expr, ()> {
        self.parse_precedence(Precedence::Lowest)
    }

    /// Parse expression with given precedence
    pub(super) fn parse_precedence(&mut self, precedence: Precedence) -> Result<Expr, ()> {
        let mut left = self.parse_prefix()?;

        while precedence < self.current_precedence() {
            left = self.parse_infix(left)?;
        }

        Ok(left)
    }

    /// Parse prefix expression
    fn parse_prefix(&mut self) -> Result<Expr, ()> {
        match self.peek().kind {
            TokenKind::Integer => self.parse_integer(),
            TokenKind::Float => self.parse_float(),
            TokenKind::Char => {
                let token = self.advance();
                let value = char_value(&token.lexeme).unwrap_or('\0');
                Ok(Expr::Literal(Literal::Char(value), token.span))
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance();
                let value = token.kind == TokenKind::True;
                Ok(Expr::Literal(Literal::Bool(value), token.span))
            }
            TokenKind::Nullptr => {
                let span = self.advance().span;
                Ok(Expr::Literal(Literal::Nullptr, span))
            }
            TokenKind::This => Ok(Expr::This(self.advance().span)),
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::LeftParen => self.parse_group(),
            TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::Bang
            | TokenKind::Star
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus => self.parse_unary(),
            _ => {
                self.error("expected expression");
                Err(())
            }
        }
    }

    /// Parse infix expression
    fn parse_infix(&mut self, left: Expr) -> Result<Expr, ()> {
        match self.peek().kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::EqualEqual
            | TokenKind::BangEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::AmpAmp
            | TokenKind::PipePipe => self.parse_binary(left),
            TokenKind::Equal
            | TokenKind::PlusEqual
            | TokenKind::MinusEqual
            | TokenKind::StarEqual
            | TokenKind::SlashEqual
            | TokenKind::PercentEqual => self.parse_assignment(left),
            TokenKind::LeftParen => self.parse_call(left, Vec::new()),
            TokenKind::Dot | TokenKind::Arrow => self.parse_member(left),
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let token = self.advance();
                let op = if token.kind == TokenKind::PlusPlus {
                    PostfixOp::Increment
                } else {
                    PostfixOp::Decrement
                };
                let span = left.span().merge(token.span);
                Ok(Expr::Postfix {
                    op,
                    operand: Box::new(left),
                    span,
                })
            }
            _ => Ok(left),
        }
    }

    /// Get current token precedence
    pub(super) fn current_precedence(&self) -> Precedence {
        token_precedence(self.peek())
    }

    fn parse_integer(&mut self) -> Result<Expr, ()> {
        let token = self.advance().clone();
        let text = token.lexeme.to_ascii_lowercase();
        let digits = text.trim_end_matches(['u', 'l']);
        let suffix = &text[digits.len()..];

        let parsed = match digits.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => digits.parse::<u64>(),
        };
        let Ok(value) = parsed else {
            self.diagnostics.push(crate::diagnostic::SyntaxError::new(
                "integer literal is too large to be represented in any integer type",
                token.span,
            ));
            return Err(());
        };

        let unsigned = suffix.contains('u');
        let longs = suffix.matches('l').count() as u32;
        let mut kind = IntKind::from_specifiers(unsigned, false, longs, false);
        if kind == IntKind::Int && value > i32::MAX as u64 {
            kind = IntKind::Long;
        }
        if kind == IntKind::UInt && value > u32::MAX as u64 {
            kind = IntKind::ULong;
        }

        Ok(Expr::Literal(Literal::Int(value as i64, kind), token.span))
    }

    fn parse_float(&mut self) -> Result<Expr, ()> {
        let token = self.advance();
        let span = token.span;
        let (text, kind) = match token.lexeme.strip_suffix(['f', 'F']) {
            Some(text) => (text.to_string(), FloatKind::Float),
            None => (token.lexeme.clone(), FloatKind::Double),
        };
        let value: f64 = text.parse().unwrap_or(0.0);
        Ok(Expr::Literal(Literal::Float(value, kind), span))
    }

    /// Parse identifier, `Scope::name`, or a call with explicit template arguments
    fn parse_identifier(&mut self) -> Result<Expr, ()> {
        let token = self.advance();
        let ident = Identifier {
            name: token.lexeme.clone(),
            span: token.span,
        };

        if self.match_token(TokenKind::ColonColon) {
            let name = self.consume_member_name()?;
            let span = ident.span.merge(name.span);
            return Ok(Expr::Scoped {
                scope: ident,
                name,
                span,
            });
        }

        if self.check(TokenKind::Less) && self.template_args_ahead() {
            self.advance(); // <
            let mut template_args = Vec::new();
            loop {
                let start = self.peek().span;
                let spec = if self.match_token(TokenKind::Struct)
                    || self.match_token(TokenKind::Class)
                    || self.match_token(TokenKind::Enum)
                {
                    TypeSpec::Named(self.consume_identifier()?)
                } else {
                    self.parse_type_spec()?
                };
                let span = start.merge(self.previous().span);
                let mut pointer_depth = 0;
                while self.match_token(TokenKind::Star) {
                    pointer_depth += 1;
                }
                template_args.push(TypeRef {
                    spec,
                    pointer_depth,
                    span,
                });
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::Greater, "expected '>'")?;
            return self.parse_call(Expr::Identifier(ident), template_args);
        }

        Ok(Expr::Identifier(ident))
    }

    /// Lookahead for `< type, ... > (`
    fn template_args_ahead(&self) -> bool {
        let mut offset = 1;
        let mut saw_type = false;
        loop {
            let token = self.peek_at(offset);
            match token.kind {
                kind if kind.is_builtin_type() => saw_type = true,
                TokenKind::Struct | TokenKind::Class | TokenKind::Enum => {}
                TokenKind::Identifier if self.type_names.contains(&token.lexeme) => saw_type = true,
                TokenKind::Star | TokenKind::Comma if saw_type => {}
                TokenKind::Greater => {
                    return saw_type && self.peek_at(offset + 1).kind == TokenKind::LeftParen;
                }
                _ => return false,
            }
            offset += 1;
        }
    }

    /// Parse grouped expression
    fn parse_group(&mut self) -> Result<Expr, ()> {
        let start = self.advance().span;
        let expr = self.parse_expression()?;
        let end = self.consume(TokenKind::RightParen, "expected ')'")?.span;
        Ok(Expr::Group(Box::new(expr), start.merge(end)))
    }

    /// Parse unary expression
    fn parse_unary(&mut self) -> Result<Expr, ()> {
        let token = self.advance();
        let start = token.span;
        let op = match token.kind {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::PlusPlus => Some(UnaryOp::PreIncrement),
            TokenKind::MinusMinus => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        let operand = self.parse_precedence(Precedence::Unary)?;

        // Unary plus is the identity
        let Some(op) = op else {
            return Ok(operand);
        };

        let span = start.merge(operand.span());
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    /// Parse binary expression
    fn parse_binary(&mut self, left: Expr) -> Result<Expr, ()> {
        let op_token = self.advance();
        let op_span = op_token.span;
        let precedence = token_precedence(op_token);
        let op = match op_token.kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::EqualEqual => BinaryOp::Eq,
            TokenKind::BangEqual => BinaryOp::Ne,
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::LessEqual => BinaryOp::Le,
            TokenKind::Greater => BinaryOp::Gt,
            TokenKind::GreaterEqual => BinaryOp::Ge,
            TokenKind::AmpAmp => BinaryOp::And,
            _ => BinaryOp::Or,
        };

        let right = self.parse_precedence(precedence)?;
        let span = left.span().merge(right.span());

        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            op_span,
            span,
        })
    }

    /// Parse assignment (right associative)
    fn parse_assignment(&mut self, target: Expr) -> Result<Expr, ()> {
        let op_token = self.advance();
        let op_span = op_token.span;
        let op = match op_token.kind {
            TokenKind::PlusEqual => AssignOp::Compound(BinaryOp::Add),
            TokenKind::MinusEqual => AssignOp::Compound(BinaryOp::Sub),
            TokenKind::StarEqual => AssignOp::Compound(BinaryOp::Mul),
            TokenKind::SlashEqual => AssignOp::Compound(BinaryOp::Div),
            TokenKind::PercentEqual => AssignOp::Compound(BinaryOp::Rem),
            _ => AssignOp::Assign,
        };

        let value = self.parse_precedence(Precedence::Lowest)?;
        let span = target.span().merge(value.span());

        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
            op_span,
            span,
        })
    }

    /// Parse function call
    fn parse_call(&mut self, callee: Expr, template_args: Vec<TypeRef>) -> Result<Expr, ()> {
        self.consume(TokenKind::LeftParen, "expected '('")?;

        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.parse_precedence(Precedence::Lowest)?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        let end = self.consume(TokenKind::RightParen, "expected ')'")?.span;
        let span = callee.span().merge(end);

        Ok(Expr::Call {
            callee: Box::new(callee),
            template_args,
            args,
            span,
        })
    }

    /// Parse `.member` or `->member`
    fn parse_member(&mut self, object: Expr) -> Result<Expr, ()> {
        let arrow = self.advance().kind == TokenKind::Arrow;
        let member = self.consume_member_name()?;
        let span = object.span().merge(member.span);
        Ok(Expr::Member {
            object: Box::new(object),
            member,
            arrow,
            span,
        })
    }

    fn consume_member_name(&mut self) -> Result<Identifier, ()> {
        if self.check(TokenKind::Identifier) {
            let token = self.advance();
            return Ok(Identifier {
                name: token.lexeme.clone(),
                span: token.span,
            });
        }
        self.error("expected unqualified-id");
        Err(())
    }
}

/// Get precedence for a token
fn token_precedence(token: &Token) -> Precedence {
    match token.kind {
        TokenKind::Equal
        | TokenKind::PlusEqual
        | TokenKind::MinusEqual
        | TokenKind::StarEqual
        | TokenKind::SlashEqual
        | TokenKind::PercentEqual => Precedence::Assignment,
        TokenKind::PipePipe => Precedence::Or,
        TokenKind::AmpAmp => Precedence::And,
        TokenKind::EqualEqual | TokenKind::BangEqual => Precedence::Equality,
        TokenKind::Less | TokenKind::LessEqual | TokenKind::Greater | TokenKind::GreaterEqual => {
            Precedence::Comparison
        }
        TokenKind::Plus | TokenKind::Minus => Precedence::Term,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Factor,
        TokenKind::LeftParen
        | TokenKind::Dot
        | TokenKind::Arrow
        | TokenKind::PlusPlus
        | TokenKind::MinusMinus => Precedence::Call,
        _ => Precedence::Lowest,
    }
}
