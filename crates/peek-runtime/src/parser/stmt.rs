//! Statement parsing

use crate::ast::*;
use crate::parser::{Declaration, Parser};
use crate::token::TokenKind;

impl Parser {
    /// Parse a statement
    pub(super) fn parse_statement(&mut self) -> Result<Stmt, ()> {
        match self.peek().kind {
            TokenKind::LeftBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Semicolon => {
                let span = self.advance().span;
                Ok(Stmt::Empty(span))
            }
            _ if self.starts_declaration() => self.parse_declaration_statement(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect_semicolon("expected ';' after expression")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_declaration_statement(&mut self) -> Result<Stmt, ()> {
        match self.parse_declaration()? {
            Declaration::Variables(vars) => Ok(Stmt::Declaration(vars)),
            Declaration::Record(r) => Ok(Stmt::Record(r)),
            Declaration::Enum(e) => Ok(Stmt::Enum(e)),
            Declaration::Function(f) => {
                if f.body.is_some() {
                    self.diagnostics.push(crate::diagnostic::SyntaxError::new(
                        "function definition is not allowed here",
                        f.name.span,
                    ));
                }
                Ok(Stmt::Empty(f.span))
            }
        }
    }

    /// Parse a block statement
    pub(super) fn parse_block(&mut self) -> Result<Block, ()> {
        let start = self.consume(TokenKind::LeftBrace, "expected '{'")?.span;
        let mut statements = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(_) => self.synchronize(),
            }
        }

        let end = self.consume(TokenKind::RightBrace, "expected '}'")?.span;

        Ok(Block {
            statements,
            span: start.merge(end),
        })
    }

    /// Parse if statement
    fn parse_if(&mut self) -> Result<Stmt, ()> {
        let start = self.advance().span;
        self.consume(TokenKind::LeftParen, "expected '(' after 'if'")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "expected ')'")?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_token(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            span: start.merge(self.previous().span),
        })
    }

    /// Parse while loop
    fn parse_while(&mut self) -> Result<Stmt, ()> {
        let start = self.advance().span;
        self.consume(TokenKind::LeftParen, "expected '(' after 'while'")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "expected ')'")?;
        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::While {
            cond,
            body,
            span: start.merge(self.previous().span),
        })
    }

    /// Parse return statement
    fn parse_return(&mut self) -> Result<Stmt, ()> {
        let start = self.advance().span;
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon("expected ';' after return statement")?;

        Ok(Stmt::Return {
            value,
            span: start.merge(self.previous().span),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::tests::parse_source;

    fn body_of(source: &str) -> (Vec<Stmt>, Vec<String>) {
        let wrapped = format!("void f() {{\n{}\n;\n}}", source);
        let (unit, errors) = parse_source(&wrapped);
        let statements = match unit.items.first() {
            Some(Item::Function(f)) => f.body.clone().map(|b| b.statements).unwrap_or_default(),
            _ => Vec::new(),
        };
        (statements, errors.into_iter().map(|e| e.message).collect())
    }

    #[test]
    fn test_trailing_expression_without_semicolon() {
        let (body, errors) = body_of("int a = 0;\nfoobar +=1;\na");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(body.len(), 3);
        assert!(matches!(&body[0], Stmt::Declaration(v) if v[0].name.name == "a"));
        assert!(matches!(&body[1], Stmt::Expr(Expr::Assign { .. })));
        assert!(matches!(&body[2], Stmt::Expr(Expr::Identifier(id)) if id.name == "a"));
    }

    #[test]
    fn test_if_else_and_while() {
        let (body, errors) = body_of("int i = 0; while (i < 3) { i++; } if (i == 3) i = 0; else i = 1;");
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(matches!(&body[1], Stmt::While { .. }));
        assert!(matches!(&body[2], Stmt::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn test_local_struct_declaration() {
        let (body, errors) = body_of("struct $S { int x; }; $S s;");
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(matches!(&body[0], Stmt::Record(r) if r.name.name == "$S"));
        assert!(matches!(&body[1], Stmt::Declaration(_)));
    }

    #[test]
    fn test_missing_semicolon_between_statements() {
        let (_, errors) = body_of("int a = 0\nint b = 1;");
        assert_eq!(errors[0], "expected ';' at end of declaration");
    }

    #[test]
    fn test_nested_function_definition_rejected() {
        let (_, errors) = body_of("int g() { return 1; }");
        assert_eq!(errors, vec!["function definition is not allowed here"]);
    }

    #[test]
    fn test_unbalanced_block_reports_missing_brace() {
        let (_, errors) = body_of("{ int x = 1;");
        assert!(errors.iter().any(|e| e == "expected '}'"));
    }
}
