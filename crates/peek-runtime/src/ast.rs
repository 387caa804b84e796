//! Abstract Syntax Tree (AST) definitions
//!
//! The tree covers the C-family subset the evaluator accepts. All spans are
//! character offsets into the wrapped source.

use crate::span::Span;
use crate::types::{FloatKind, IntKind};
use serde::{Deserialize, Serialize};

/// A parsed synthetic buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub items: Vec<Item>,
}

/// Top-level item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Record(RecordDecl),
    Enum(EnumDecl),
    Function(FunctionDecl),
    Variable(VarDecl),
}

impl Item {
    /// Name of the declared entity
    pub fn name(&self) -> &Identifier {
        match self {
            Item::Record(r) => &r.name,
            Item::Enum(e) => &e.name,
            Item::Function(f) => &f.name,
            Item::Variable(v) => &v.name,
        }
    }
}

/// Identifier with its location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// `struct` or `class`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Struct,
    Class,
}

/// Record declaration: `struct Name { fields };` or `struct Name;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDecl {
    pub kind: RecordKind,
    pub name: Identifier,
    /// `None` for a forward declaration
    pub fields: Option<Vec<FieldDecl>>,
    pub span: Span,
}

/// Field inside a record body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub type_ref: TypeRef,
    pub name: Identifier,
    pub span: Span,
}

/// Enum declaration: `enum [class] Name { A, B = 2 };`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: Identifier,
    pub scoped: bool,
    pub enumerators: Vec<Enumerator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enumerator {
    pub name: Identifier,
    pub value: Option<Expr>,
}

/// Function definition or prototype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub return_type: TypeRef,
    pub name: Identifier,
    pub params: Vec<Param>,
    /// `None` for a prototype
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub type_ref: TypeRef,
    pub name: Option<Identifier>,
    pub span: Span,
}

/// Variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub type_ref: TypeRef,
    pub name: Identifier,
    pub init: Option<Expr>,
    pub span: Span,
}

/// Type as written in source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub spec: TypeSpec,
    pub pointer_depth: u32,
    pub span: Span,
}

/// Base type specifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSpec {
    Void,
    Bool,
    Auto,
    Int(IntKind),
    Float(FloatKind),
    /// A record or enum name, possibly elaborated (`struct S`)
    Named(Identifier),
}

/// Brace-enclosed statement list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// One or more declarators sharing a type specifier
    Declaration(Vec<VarDecl>),
    Record(RecordDecl),
    Enum(EnumDecl),
    Expr(Expr),
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Empty(Span),
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64, IntKind),
    Float(f64, FloatKind),
    Char(char),
    Bool(bool),
    Nullptr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
    Deref,
    PreIncrement,
    PreDecrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// `=` or a compound assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal, Span),
    Identifier(Identifier),
    This(Span),
    /// `Scope::name`
    Scoped {
        scope: Identifier,
        name: Identifier,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Postfix {
        op: PostfixOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        op_span: Span,
        span: Span,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
        op_span: Span,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        template_args: Vec<TypeRef>,
        args: Vec<Expr>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        member: Identifier,
        arrow: bool,
        span: Span,
    },
    Group(Box<Expr>, Span),
}

impl Expr {
    /// Full source range of this expression
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span) | Expr::This(span) | Expr::Group(_, span) => *span,
            Expr::Identifier(id) => id.span,
            Expr::Scoped { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Postfix { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Call { span, .. }
            | Expr::Member { span, .. } => *span,
        }
    }

    /// Where a diagnostic about this expression should point
    ///
    /// Binary and assignment expressions anchor at their operator, matching
    /// the usual compiler convention; everything else anchors at its start.
    pub fn anchor(&self) -> Span {
        match self {
            Expr::Binary { op_span, .. } | Expr::Assign { op_span, .. } => *op_span,
            Expr::Member { member, .. } => member.span,
            other => other.span(),
        }
    }
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Declaration(decls) => match (decls.first(), decls.last()) {
                (Some(first), Some(last)) => first.span.merge(last.span),
                _ => Span::dummy(),
            },
            Stmt::Record(r) => r.span,
            Stmt::Enum(e) => e.span,
            Stmt::Expr(e) => e.span(),
            Stmt::Block(b) => b.span,
            Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Empty(span) => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, start: usize) -> Identifier {
        Identifier {
            name: name.to_string(),
            span: Span::new(start, start + name.len()),
        }
    }

    #[test]
    fn test_binary_anchor_is_operator() {
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Identifier(ident("a", 0))),
            right: Box::new(Expr::Identifier(ident("b", 2))),
            op_span: Span::new(1, 2),
            span: Span::new(0, 3),
        };
        assert_eq!(expr.anchor(), Span::new(1, 2));
        assert_eq!(expr.span(), Span::new(0, 3));
    }

    #[test]
    fn test_member_anchor_is_member_name() {
        let expr = Expr::Member {
            object: Box::new(Expr::This(Span::new(0, 4))),
            member: ident("shadowed", 6),
            arrow: true,
            span: Span::new(0, 14),
        };
        assert_eq!(expr.anchor(), Span::new(6, 14));
    }

    #[test]
    fn test_item_name() {
        let item = Item::Variable(VarDecl {
            type_ref: TypeRef {
                spec: TypeSpec::Void,
                pointer_depth: 0,
                span: Span::new(0, 4),
            },
            name: ident("foo", 5),
            init: None,
            span: Span::new(0, 8),
        });
        assert_eq!(item.name().name, "foo");
    }

    #[test]
    fn test_comparison_ops() {
        assert!(BinaryOp::Le.is_comparison());
        assert!(!BinaryOp::And.is_comparison());
    }
}
