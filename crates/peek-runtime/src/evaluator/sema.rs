//! Semantic pass
//!
//! Walks the parsed submission once, resolving every identifier and type
//! name, checking calls, member accesses and assignments, and staging
//! redefinition checks in the tracker. Diagnostics are collected, never
//! thrown: an unresolved name yields `Type::Unknown`, which silences any
//! follow-on error about the same expression so each independent problem is
//! reported exactly once.
//!
//! In top-level mode records, enums and functions are defined into the
//! working copy of the persistent scope as soon as they are checked, so later
//! items of the same submission can use them.

use super::lookup::{LocalTypes, Lookup, Resolution};
use crate::ast::*;
use crate::context::EvaluationContext;
use crate::diagnostic::{Diagnostic, DiagnosticKind, SourceLocation};
use crate::persistent::{PersistentEnum, PersistentFunction, PersistentRecord, PersistentScope};
use crate::position::{PositionMapper, EXPR_FUNCTION_NAME};
use crate::provider::{DebugInfoProvider, DeclId, ExternalKind, FunctionSig};
use crate::registry::{SubmissionId, SubmissionMode};
use crate::span::Span;
use crate::tracker::{redefinition_at, DeclKind, DeclarationTracker, PendingDeclarations};
use crate::types::Type;
use crate::value::Heap;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only state the semantic pass consults
pub(super) struct Environment<'a> {
    pub context: &'a EvaluationContext,
    pub heap: &'a Heap,
    pub tracker: &'a DeclarationTracker,
    pub debug_info: &'a dyn DebugInfoProvider,
}

/// Result of the semantic pass
pub(super) struct Checked {
    pub diagnostics: Vec<Diagnostic>,
    pub pending: PendingDeclarations,
    pub local_types: LocalTypes,
}

struct LocalVar {
    name: String,
    ty: Type,
    location: SourceLocation,
}

/// Something that can be called
struct Callable {
    name: String,
    signature: FunctionSig,
    /// Where the candidate was declared, for the "not viable" note
    location: SourceLocation,
}

pub(super) struct Sema<'a> {
    submission: SubmissionId,
    mode: SubmissionMode,
    mapper: &'a PositionMapper<'a>,
    env: Environment<'a>,
    persistent: &'a mut PersistentScope,
    local_types: LocalTypes,
    pending: PendingDeclarations,
    scopes: Vec<Vec<LocalVar>>,
    /// Variables this submission adds to the persistent scope
    new_persistent: HashMap<String, Type>,
    /// Whether the paused frame is visible (false inside declared functions)
    frame_visible: bool,
    /// Name and return type of the function being checked
    function: Option<(String, Type)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Sema<'a> {
    pub fn new(
        submission: SubmissionId,
        mode: SubmissionMode,
        mapper: &'a PositionMapper<'a>,
        env: Environment<'a>,
        persistent: &'a mut PersistentScope,
    ) -> Self {
        Self {
            submission,
            mode,
            mapper,
            env,
            persistent,
            local_types: LocalTypes::default(),
            pending: PendingDeclarations::default(),
            scopes: Vec::new(),
            new_persistent: HashMap::new(),
            frame_visible: false,
            function: None,
            diagnostics: Vec::new(),
        }
    }

    /// Check a parsed submission
    pub fn check(mut self, unit: &TranslationUnit) -> Checked {
        match self.mode {
            SubmissionMode::TopLevel => {
                for item in &unit.items {
                    self.check_item(item);
                }
            }
            SubmissionMode::Statement => {
                let body = unit.items.iter().find_map(|item| match item {
                    Item::Function(f) if f.name.name == EXPR_FUNCTION_NAME => f.body.as_ref(),
                    _ => None,
                });
                if let Some(body) = body {
                    self.frame_visible = true;
                    self.check_block(body);
                }
            }
        }

        Checked {
            diagnostics: self.diagnostics,
            pending: self.pending,
            local_types: self.local_types,
        }
    }

    fn lookup(&self) -> Lookup<'_> {
        Lookup {
            context: self.env.context,
            heap: self.env.heap,
            persistent: &*self.persistent,
            local_types: &self.local_types,
            debug_info: self.env.debug_info,
        }
    }

    // === Diagnostics ===

    fn location(&self, span: Span) -> SourceLocation {
        self.mapper.resolve(span.start, self.submission)
    }

    fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        let diagnostic = Diagnostic::error(kind, message, self.location(span));
        self.diagnostics.push(diagnostic);
    }

    fn semantic(&mut self, message: impl Into<String>, span: Span) {
        self.error(DiagnosticKind::Semantic, message, span);
    }

    fn undeclared(&mut self, id: &Identifier) {
        tracing::trace!(name = %id.name, "identifier did not resolve");
        self.error(
            DiagnosticKind::UndeclaredIdentifier,
            format!("undeclared identifier '{}'", id.name),
            id.span,
        );
    }

    fn external_location(&self, id: DeclId) -> SourceLocation {
        self.env
            .debug_info
            .location_of(id)
            .map(|location| self.mapper.resolve_external(&location))
            .unwrap_or_else(SourceLocation::hidden)
    }

    // === Declarations ===

    fn check_item(&mut self, item: &Item) {
        match item {
            Item::Record(record) => self.check_record(record, true),
            Item::Enum(decl) => self.check_enum(decl, true),
            Item::Function(func) => self.check_function(func),
            Item::Variable(var) => {
                let ty = self.check_var_decl(var);
                let location = self.location(var.name.span);
                self.declare(&var.name.name, DeclKind::Variable, location);
                self.new_persistent.insert(var.name.name.clone(), ty);
            }
        }
    }

    /// Stage a tracked declaration, reporting a redefinition of an earlier
    /// submission's or the debugged program's declaration of the same kind
    fn declare(&mut self, name: &str, kind: DeclKind, location: SourceLocation) {
        let conflict = self.pending.declare(
            self.env.tracker,
            name,
            kind,
            self.submission,
            location.clone(),
        );
        if let Some(conflict) = conflict {
            self.diagnostics.push(conflict);
            return;
        }
        if let Some(previous) = self.external_definition(name, kind) {
            tracing::debug!(name, %kind, "redefinition of a debug-information declaration");
            self.diagnostics.push(redefinition_at(name, location, previous));
        }
    }

    fn external_definition(&self, name: &str, kind: DeclKind) -> Option<SourceLocation> {
        let decl = match kind {
            DeclKind::Struct | DeclKind::Class | DeclKind::Enum => {
                self.env.debug_info.lookup_type(name)?
            }
            DeclKind::Function | DeclKind::Variable => self.env.debug_info.lookup(name)?,
        };
        let same_kind = match (&decl.kind, kind) {
            (ExternalKind::Record { kind: RecordKind::Struct, .. }, DeclKind::Struct)
            | (ExternalKind::Record { kind: RecordKind::Class, .. }, DeclKind::Class)
            | (ExternalKind::Enum { .. }, DeclKind::Enum)
            | (ExternalKind::Function { .. }, DeclKind::Function)
            | (ExternalKind::Variable { .. }, DeclKind::Variable) => true,
            _ => false,
        };
        same_kind.then(|| self.external_location(decl.id))
    }

    fn check_record(&mut self, record: &RecordDecl, top_level: bool) {
        let location = self.location(record.name.span);
        let name = record.name.name.clone();

        let Some(fields) = &record.fields else {
            let forward = PersistentRecord {
                kind: record.kind,
                fields: None,
                location,
            };
            if top_level {
                self.persistent.define_record(name, forward);
            } else if self.lookup().named_type(&name).is_none() {
                self.local_types.define_record(name, forward);
            }
            return;
        };

        let mut resolved: Vec<(String, Type)> = Vec::new();
        let mut seen: Vec<(String, SourceLocation)> = Vec::new();
        for field in fields {
            let ty = self.resolve_type(&field.type_ref);
            let field_location = self.location(field.name.span);

            if let Some((_, previous)) = seen.iter().find(|(n, _)| *n == field.name.name) {
                let diagnostic = Diagnostic::error(
                    DiagnosticKind::Semantic,
                    format!("duplicate member '{}'", field.name.name),
                    field_location.clone(),
                )
                .with_note(Diagnostic::note("previous declaration is here", previous.clone()));
                self.diagnostics.push(diagnostic);
            }

            let self_referential = ty == Type::Record(name.clone());
            if self_referential || self.is_incomplete(&ty) {
                self.semantic(format!("field has incomplete type '{}'", ty), field.name.span);
            }

            seen.push((field.name.name.clone(), field_location));
            resolved.push((field.name.name.clone(), ty));
        }

        let kind = match record.kind {
            RecordKind::Struct => DeclKind::Struct,
            RecordKind::Class => DeclKind::Class,
        };
        if top_level {
            self.declare(&name, kind, location.clone());
        }

        let definition = PersistentRecord {
            kind: record.kind,
            fields: Some(resolved),
            location,
        };
        if top_level {
            self.persistent.define_record(name, definition);
        } else {
            self.local_types.define_record(name, definition);
        }
    }

    fn check_enum(&mut self, decl: &EnumDecl, top_level: bool) {
        let mut enumerators: Vec<(String, i64)> = Vec::new();
        let mut next = 0i64;

        for enumerator in &decl.enumerators {
            let value = match &enumerator.value {
                Some(expr) => match self.const_eval(expr, &enumerators) {
                    Some(value) => value,
                    None => {
                        self.semantic("expression is not an integral constant expression", expr.anchor());
                        next
                    }
                },
                None => next,
            };
            enumerators.push((enumerator.name.name.clone(), value));
            next = value.wrapping_add(1);
        }

        let location = self.location(decl.name.span);
        if top_level {
            self.declare(&decl.name.name, DeclKind::Enum, location.clone());
        }

        let def = PersistentEnum {
            scoped: decl.scoped,
            enumerators,
            location,
        };
        if top_level {
            self.persistent.define_enum(decl.name.name.clone(), def);
        } else {
            self.local_types.define_enum(decl.name.name.clone(), def);
        }
    }

    /// Integral constant value of an enumerator initializer
    fn const_eval(&self, expr: &Expr, earlier: &[(String, i64)]) -> Option<i64> {
        match expr {
            Expr::Literal(Literal::Int(v, _), _) => Some(*v),
            Expr::Literal(Literal::Char(c), _) => Some(*c as i64),
            Expr::Literal(Literal::Bool(b), _) => Some(i64::from(*b)),
            Expr::Group(inner, _) => self.const_eval(inner, earlier),
            Expr::Unary { op, operand, .. } => {
                let v = self.const_eval(operand, earlier)?;
                match op {
                    UnaryOp::Negate => Some(v.wrapping_neg()),
                    UnaryOp::Not => Some(i64::from(v == 0)),
                    _ => None,
                }
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let l = self.const_eval(left, earlier)?;
                let r = self.const_eval(right, earlier)?;
                match op {
                    BinaryOp::Add => Some(l.wrapping_add(r)),
                    BinaryOp::Sub => Some(l.wrapping_sub(r)),
                    BinaryOp::Mul => Some(l.wrapping_mul(r)),
                    BinaryOp::Div => (r != 0).then(|| l.wrapping_div(r)),
                    BinaryOp::Rem => (r != 0).then(|| l.wrapping_rem(r)),
                    BinaryOp::Eq => Some(i64::from(l == r)),
                    BinaryOp::Ne => Some(i64::from(l != r)),
                    BinaryOp::Lt => Some(i64::from(l < r)),
                    BinaryOp::Le => Some(i64::from(l <= r)),
                    BinaryOp::Gt => Some(i64::from(l > r)),
                    BinaryOp::Ge => Some(i64::from(l >= r)),
                    BinaryOp::And => Some(i64::from(l != 0 && r != 0)),
                    BinaryOp::Or => Some(i64::from(l != 0 || r != 0)),
                }
            }
            Expr::Identifier(id) => earlier
                .iter()
                .rev()
                .find(|(n, _)| *n == id.name)
                .map(|(_, v)| *v)
                .or_else(|| match self.lookup().resolve(&id.name, false) {
                    Some(Resolution::Enumerator { value, .. }) => Some(value),
                    _ => None,
                }),
            Expr::Scoped { scope, name, .. } => {
                let (_, enumerators) = self.lookup().enum_shape(&scope.name)?;
                enumerators
                    .into_iter()
                    .find(|(n, _)| *n == name.name)
                    .map(|(_, v)| v)
            }
            _ => None,
        }
    }

    fn check_function(&mut self, func: &FunctionDecl) {
        let return_type = self.resolve_type(&func.return_type);
        let params: Vec<Type> = func
            .params
            .iter()
            .map(|p| self.resolve_type(&p.type_ref))
            .collect();
        let location = self.location(func.name.span);

        if func.body.is_some() {
            self.declare(&func.name.name, DeclKind::Function, location.clone());
        }
        self.persistent.define_function(
            func.name.name.clone(),
            PersistentFunction {
                submission: self.submission,
                signature: FunctionSig {
                    return_type: return_type.clone(),
                    params: params.clone(),
                },
                decl: Arc::new(func.clone()),
                location,
            },
        );

        let Some(body) = &func.body else {
            return;
        };

        let saved_frame_visible = std::mem::replace(&mut self.frame_visible, false);
        let saved_function = self.function.replace((func.name.name.clone(), return_type));
        let saved_scopes = std::mem::take(&mut self.scopes);

        self.scopes.push(Vec::new());
        for (param, ty) in func.params.iter().zip(params) {
            if let Some(name) = &param.name {
                self.add_local(name, ty);
            }
        }
        for stmt in &body.statements {
            self.check_stmt(stmt);
        }

        self.scopes = saved_scopes;
        self.function = saved_function;
        self.frame_visible = saved_frame_visible;
    }

    /// Check a variable declaration and return its declared type
    fn check_var_decl(&mut self, var: &VarDecl) -> Type {
        let init_type = var.init.as_ref().map(|init| self.check_expr(init));

        let declared = if var.type_ref.spec == TypeSpec::Auto {
            match &init_type {
                Some(ty) => ty.clone(),
                None => {
                    self.semantic(
                        format!(
                            "declaration of variable '{}' with deduced type 'auto' requires an initializer",
                            var.name.name
                        ),
                        var.name.span,
                    );
                    return Type::Unknown;
                }
            }
        } else {
            self.resolve_type(&var.type_ref)
        };

        if self.is_incomplete(&declared) {
            self.semantic(
                format!("variable has incomplete type '{}'", declared),
                var.name.span,
            );
            return Type::Unknown;
        }

        if let (Some(init), Some(init_type)) = (&var.init, &init_type) {
            if convertible(init_type, &declared) {
                self.check_narrowing(&declared, init);
            } else {
                self.semantic(
                    format!(
                        "cannot initialize a variable of type '{}' with an expression of type '{}'",
                        declared, init_type
                    ),
                    init.span(),
                );
            }
        }

        declared
    }

    /// Warn when a floating literal loses its fractional part
    fn check_narrowing(&mut self, target: &Type, expr: &Expr) {
        if !matches!(target, Type::Int(_)) {
            return;
        }
        let Some((value, kind)) = float_literal(expr) else {
            return;
        };
        if value.fract() == 0.0 {
            return;
        }
        let diagnostic = Diagnostic::warning(
            DiagnosticKind::Semantic,
            format!(
                "implicit conversion from '{}' to '{}' changes value from {} to {}",
                kind.name(),
                target,
                value,
                value.trunc() as i64
            ),
            self.location(expr.span()),
        );
        self.diagnostics.push(diagnostic);
    }

    fn resolve_type(&mut self, type_ref: &TypeRef) -> Type {
        let resolved = self.lookup().type_of(type_ref);
        match resolved {
            Some(ty) => ty,
            None => {
                if let TypeSpec::Named(id) = &type_ref.spec {
                    self.semantic(format!("unknown type name '{}'", id.name), id.span);
                }
                Type::Unknown
            }
        }
    }

    fn is_incomplete(&self, ty: &Type) -> bool {
        match ty {
            Type::Void => true,
            Type::Record(name) => self
                .lookup()
                .record_shape(name)
                .map(|shape| !shape.complete)
                .unwrap_or(false),
            _ => false,
        }
    }

    // === Statements ===

    fn add_local(&mut self, name: &Identifier, ty: Type) {
        let location = self.location(name.span);
        let previous = self
            .scopes
            .last()
            .and_then(|scope| scope.iter().find(|local| local.name == name.name))
            .map(|local| local.location.clone());
        if let Some(previous) = previous {
            self.diagnostics
                .push(redefinition_at(&name.name, location.clone(), previous));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(LocalVar {
                name: name.name.clone(),
                ty,
                location,
            });
        }
    }

    fn find_local(&self, name: &str) -> Option<&LocalVar> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().rev().find(|local| local.name == name))
    }

    fn check_block(&mut self, block: &Block) {
        self.scopes.push(Vec::new());
        for stmt in &block.statements {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn check_scoped_stmt(&mut self, stmt: &Stmt) {
        self.scopes.push(Vec::new());
        self.check_stmt(stmt);
        self.scopes.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration(vars) => {
                for var in vars {
                    let ty = self.check_var_decl(var);
                    if self.frame_visible && var.name.name.starts_with('$') {
                        self.new_persistent.insert(var.name.name.clone(), ty);
                    } else {
                        self.add_local(&var.name, ty);
                    }
                }
            }
            Stmt::Record(record) => self.check_record(record, false),
            Stmt::Enum(decl) => self.check_enum(decl, false),
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
            Stmt::Block(block) => self.check_block(block),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_condition(cond);
                self.check_scoped_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_scoped_stmt(else_branch);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_condition(cond);
                self.check_scoped_stmt(body);
            }
            Stmt::Return { value, span } => self.check_return(value.as_ref(), *span),
            Stmt::Empty(_) => {}
        }
    }

    fn check_condition(&mut self, cond: &Expr) {
        let ty = self.check_expr(cond);
        if !ty.is_unknown() && !ty.is_scalar() {
            self.semantic(
                format!("value of type '{}' is not contextually convertible to 'bool'", ty),
                cond.span(),
            );
        }
    }

    fn check_return(&mut self, value: Option<&Expr>, span: Span) {
        let value_type = value.map(|v| self.check_expr(v));
        let Some((name, return_type)) = self.function.clone() else {
            return;
        };
        if return_type.is_unknown() {
            return;
        }

        match (value, value_type) {
            (Some(_), Some(ty))
                if return_type == Type::Void && ty != Type::Void && !ty.is_unknown() =>
            {
                self.semantic(format!("void function '{}' should not return a value", name), span);
            }
            (None, _) if return_type != Type::Void => {
                self.semantic(format!("non-void function '{}' should return a value", name), span);
            }
            (Some(expr), Some(ty)) if !convertible(&ty, &return_type) => {
                self.semantic(
                    format!(
                        "cannot initialize return object of type '{}' with an expression of type '{}'",
                        return_type, ty
                    ),
                    expr.span(),
                );
            }
            _ => {}
        }
    }

    // === Expressions ===

    fn check_expr(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::Literal(lit, _) => literal_type(lit),
            Expr::Identifier(id) => self.check_identifier(id),
            Expr::This(span) => self.check_this(*span),
            Expr::Scoped { scope, name, .. } => self.check_scoped_name(scope, name),
            Expr::Unary { op, operand, span } => self.check_unary(*op, operand, *span),
            Expr::Postfix { op, operand, span } => {
                self.check_increment(*op == PostfixOp::Increment, operand, *span)
            }
            Expr::Binary {
                op,
                left,
                right,
                op_span,
                ..
            } => {
                let left = self.check_expr(left);
                let right = self.check_expr(right);
                self.binary_type(*op, &left, &right, *op_span)
            }
            Expr::Assign {
                op,
                target,
                value,
                op_span,
                ..
            } => self.check_assign(*op, target, value, *op_span),
            Expr::Call {
                callee,
                template_args,
                args,
                ..
            } => self.check_call(callee, template_args, args),
            Expr::Member {
                object,
                member,
                arrow,
                ..
            } => {
                let object_type = self.check_expr(object);
                self.member_type(&object_type, member, *arrow)
            }
            Expr::Group(inner, _) => self.check_expr(inner),
        }
    }

    fn check_identifier(&mut self, id: &Identifier) -> Type {
        if let Some(local) = self.find_local(&id.name) {
            return local.ty.clone();
        }
        if let Some(ty) = self.new_persistent.get(&id.name) {
            return ty.clone();
        }

        let resolution = self.lookup().resolve(&id.name, self.frame_visible);
        match resolution {
            Some(Resolution::Context { ty, .. })
            | Some(Resolution::Member { ty, .. })
            | Some(Resolution::Persistent { ty })
            | Some(Resolution::Global { ty }) => ty,
            Some(Resolution::Enumerator { enum_name, .. }) => Type::Enum(enum_name),
            Some(Resolution::Function(_))
            | Some(Resolution::ExternalFunction { .. })
            | Some(Resolution::Method { .. }) => {
                self.semantic(
                    "reference to overloaded function could not be resolved; did you mean to call it?",
                    id.span,
                );
                Type::Unknown
            }
            None => {
                self.undeclared(id);
                Type::Unknown
            }
        }
    }

    fn check_this(&mut self, span: Span) -> Type {
        let object = if self.frame_visible {
            self.env.context.this_object()
        } else {
            None
        };
        match object.and_then(|o| self.env.heap.get(o)) {
            Some(object) => Type::pointer_to(Type::Record(object.type_name.clone())),
            None => {
                self.semantic("invalid use of 'this' outside of a non-static member function", span);
                Type::Unknown
            }
        }
    }

    fn check_scoped_name(&mut self, scope: &Identifier, name: &Identifier) -> Type {
        let enum_shape = self.lookup().enum_shape(&scope.name);
        match enum_shape {
            Some((_, enumerators)) => {
                if enumerators.iter().any(|(n, _)| *n == name.name) {
                    return Type::Enum(scope.name.clone());
                }
                self.semantic(
                    format!("no member named '{}' in '{}'", name.name, scope.name),
                    name.span,
                );
            }
            None => {
                let is_record = self.lookup().record_shape(&scope.name).is_some();
                if is_record {
                    self.semantic(
                        format!("no member named '{}' in '{}'", name.name, scope.name),
                        name.span,
                    );
                } else {
                    self.undeclared(scope);
                }
            }
        }
        Type::Unknown
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> Type {
        match op {
            UnaryOp::PreIncrement => return self.check_increment(true, operand, span),
            UnaryOp::PreDecrement => return self.check_increment(false, operand, span),
            _ => {}
        }

        let ty = self.check_expr(operand);
        if ty.is_unknown() {
            return Type::Unknown;
        }
        match (op, &ty) {
            (UnaryOp::Negate, ty) if ty.is_arithmetic() => ty.common_arithmetic(ty),
            (UnaryOp::Not, ty) if ty.is_scalar() => Type::Bool,
            (UnaryOp::Deref, Type::Pointer(inner)) if **inner == Type::Void => {
                self.semantic(
                    format!("indirection not permitted on operand of type '{}'", ty),
                    span,
                );
                Type::Unknown
            }
            (UnaryOp::Deref, Type::Pointer(inner)) => inner.as_ref().clone(),
            (UnaryOp::Deref, _) => {
                self.semantic(
                    format!("indirection requires pointer operand ('{}' invalid)", ty),
                    span,
                );
                Type::Unknown
            }
            _ => {
                self.semantic(format!("invalid argument type '{}' to unary expression", ty), span);
                Type::Unknown
            }
        }
    }

    fn check_increment(&mut self, increment: bool, operand: &Expr, span: Span) -> Type {
        let ty = self.check_expr(operand);
        if ty.is_unknown() {
            return Type::Unknown;
        }
        if !ty.is_arithmetic() || matches!(ty, Type::Enum(_)) {
            let verb = if increment { "increment" } else { "decrement" };
            self.semantic(format!("cannot {} value of type '{}'", verb, ty), span);
            return Type::Unknown;
        }
        if !self.is_assignable(operand) {
            self.semantic("expression is not assignable", operand.span());
        }
        ty
    }

    fn binary_type(&mut self, op: BinaryOp, left: &Type, right: &Type, op_span: Span) -> Type {
        if left.is_unknown() || right.is_unknown() {
            return Type::Unknown;
        }

        let valid = match op {
            BinaryOp::And | BinaryOp::Or => left.is_scalar() && right.is_scalar(),
            op if op.is_comparison() => {
                (left.is_arithmetic() && right.is_arithmetic()) || pointers_comparable(left, right)
            }
            BinaryOp::Rem => is_integral(left) && is_integral(right),
            _ => left.is_arithmetic() && right.is_arithmetic(),
        };
        if !valid {
            self.semantic(
                format!(
                    "invalid operands to binary expression ('{}' and '{}')",
                    left, right
                ),
                op_span,
            );
            return Type::Unknown;
        }

        match op {
            BinaryOp::And | BinaryOp::Or => Type::Bool,
            op if op.is_comparison() => Type::Bool,
            _ => left.common_arithmetic(right),
        }
    }

    fn is_assignable(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Identifier(id) => {
                if self.find_local(&id.name).is_some() || self.new_persistent.contains_key(&id.name) {
                    return true;
                }
                matches!(
                    self.lookup().resolve(&id.name, self.frame_visible),
                    Some(Resolution::Context { .. })
                        | Some(Resolution::Member { .. })
                        | Some(Resolution::Persistent { .. })
                        | Some(Resolution::Global { .. })
                )
            }
            Expr::Member { .. } => true,
            Expr::Unary {
                op: UnaryOp::Deref, ..
            } => true,
            Expr::Group(inner, _) => self.is_assignable(inner),
            _ => false,
        }
    }

    fn check_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, op_span: Span) -> Type {
        let target_type = self.check_expr(target);
        let value_type = self.check_expr(value);
        if target_type.is_unknown() {
            return Type::Unknown;
        }
        if !self.is_assignable(target) {
            self.semantic("expression is not assignable", op_span);
            return Type::Unknown;
        }

        match op {
            AssignOp::Assign => {
                if value_type.is_unknown() {
                    return target_type;
                }
                if convertible(&value_type, &target_type) {
                    self.check_narrowing(&target_type, value);
                } else {
                    self.semantic(
                        format!(
                            "assigning to '{}' from incompatible type '{}'",
                            target_type, value_type
                        ),
                        value.span(),
                    );
                }
            }
            AssignOp::Compound(binary) => {
                self.binary_type(binary, &target_type, &value_type, op_span);
            }
        }
        target_type
    }

    // === Calls and members ===

    fn check_call(&mut self, callee: &Expr, template_args: &[TypeRef], args: &[Expr]) -> Type {
        for type_arg in template_args {
            self.resolve_type(type_arg);
        }
        let arg_types: Vec<Type> = args.iter().map(|arg| self.check_expr(arg)).collect();

        let (target, callee_span) = match callee {
            Expr::Identifier(id) => (self.callee_by_name(id), id.span),
            Expr::Member {
                object,
                member,
                arrow,
                ..
            } => {
                let object_type = self.check_expr(object);
                (self.method_callee(&object_type, member, *arrow), member.span)
            }
            other => {
                let ty = self.check_expr(other);
                self.not_callable(&ty, other.span());
                (None, other.span())
            }
        };

        match target {
            Some(target) => self.check_arguments(&target, &arg_types, callee_span),
            None => Type::Unknown,
        }
    }

    fn not_callable(&mut self, ty: &Type, span: Span) {
        if !ty.is_unknown() {
            self.semantic(
                format!("called object type '{}' is not a function or function pointer", ty),
                span,
            );
        }
    }

    fn callee_by_name(&mut self, id: &Identifier) -> Option<Callable> {
        let local = self
            .find_local(&id.name)
            .map(|local| local.ty.clone())
            .or_else(|| self.new_persistent.get(&id.name).cloned());
        if let Some(ty) = local {
            self.not_callable(&ty, id.span);
            return None;
        }

        let resolution = self.lookup().resolve(&id.name, self.frame_visible);
        match resolution {
            Some(Resolution::Function(function)) => Some(Callable {
                name: id.name.clone(),
                signature: function.signature,
                location: function.location,
            }),
            Some(Resolution::ExternalFunction { id: decl, signature }) => Some(Callable {
                name: id.name.clone(),
                signature,
                location: self.external_location(decl),
            }),
            Some(Resolution::Method { method, .. }) => Some(Callable {
                name: id.name.clone(),
                location: method
                    .decl
                    .map(|decl| self.external_location(decl))
                    .unwrap_or_else(SourceLocation::hidden),
                signature: method.signature,
            }),
            Some(Resolution::Context { ty, .. })
            | Some(Resolution::Member { ty, .. })
            | Some(Resolution::Persistent { ty })
            | Some(Resolution::Global { ty }) => {
                self.not_callable(&ty, id.span);
                None
            }
            Some(Resolution::Enumerator { enum_name, .. }) => {
                self.not_callable(&Type::Enum(enum_name), id.span);
                None
            }
            None => {
                self.undeclared(id);
                None
            }
        }
    }

    fn method_callee(&mut self, object_type: &Type, member: &Identifier, arrow: bool) -> Option<Callable> {
        let record = self.member_base(object_type, member, arrow)?;
        let method = self.lookup().method(&record, &member.name);
        match method {
            Some(method) => Some(Callable {
                name: member.name.clone(),
                location: method
                    .decl
                    .map(|decl| self.external_location(decl))
                    .unwrap_or_else(SourceLocation::hidden),
                signature: method.signature,
            }),
            None => {
                let field = self.lookup().field_type(&record, &member.name);
                match field {
                    Some(ty) => self.not_callable(&ty, member.span),
                    None => self.semantic(
                        format!("no member named '{}' in '{}'", member.name, record),
                        member.span,
                    ),
                }
                None
            }
        }
    }

    /// Record accessed by `object.member` or `object->member`
    fn member_base(&mut self, object_type: &Type, member: &Identifier, arrow: bool) -> Option<String> {
        if object_type.is_unknown() {
            return None;
        }
        if let Some(record) = object_type.record_name(arrow) {
            return Some(record.to_string());
        }

        let message = match (object_type, arrow) {
            (Type::Pointer(inner), false) if matches!(**inner, Type::Record(_)) => format!(
                "member reference type '{}' is a pointer; did you mean to use '->'?",
                object_type
            ),
            (Type::Record(_), true) => {
                format!("member reference type '{}' is not a pointer", object_type)
            }
            _ => format!(
                "member reference base type '{}' is not a structure or union",
                object_type
            ),
        };
        self.semantic(message, member.span);
        None
    }

    fn member_type(&mut self, object_type: &Type, member: &Identifier, arrow: bool) -> Type {
        let Some(record) = self.member_base(object_type, member, arrow) else {
            return Type::Unknown;
        };
        let field = self.lookup().field_type(&record, &member.name);
        if let Some(ty) = field {
            return ty;
        }

        let is_method = self.lookup().method(&record, &member.name).is_some();
        if is_method {
            self.semantic("reference to non-static member function must be called", member.span);
        } else {
            self.semantic(
                format!("no member named '{}' in '{}'", member.name, record),
                member.span,
            );
        }
        Type::Unknown
    }

    fn check_arguments(&mut self, target: &Callable, arg_types: &[Type], callee_span: Span) -> Type {
        let params = &target.signature.params;
        let reason = if params.len() != arg_types.len() {
            Some(format!(
                "candidate function not viable: requires {} argument{}, but {} {} provided",
                params.len(),
                if params.len() == 1 { "" } else { "s" },
                arg_types.len(),
                if arg_types.len() == 1 { "was" } else { "were" }
            ))
        } else {
            arg_types
                .iter()
                .zip(params)
                .enumerate()
                .find(|(_, (arg, param))| !convertible(arg, param))
                .map(|(index, (arg, param))| {
                    format!(
                        "candidate function not viable: no known conversion from '{}' to '{}' for {} argument",
                        arg,
                        param,
                        ordinal(index + 1)
                    )
                })
        };

        let Some(reason) = reason else {
            return target.signature.return_type.clone();
        };

        let mut diagnostic = Diagnostic::error(
            DiagnosticKind::Semantic,
            format!("no matching function for call to '{}'", target.name),
            self.location(callee_span),
        );
        if let Some((start, end)) = self.mapper.highlight(callee_span, self.submission) {
            diagnostic = diagnostic.with_highlight(start, end);
        }
        diagnostic = diagnostic.with_note(Diagnostic::note(reason, target.location.clone()));
        self.diagnostics.push(diagnostic);
        Type::Unknown
    }
}

/// Whether a value of type `from` implicitly converts to `to`
pub(super) fn convertible(from: &Type, to: &Type) -> bool {
    match (from, to) {
        (Type::Unknown, _) | (_, Type::Unknown) => true,
        (from, to) if from == to => true,
        (from, Type::Bool) => from.is_scalar(),
        (from, Type::Int(_)) | (from, Type::Float(_)) => from.is_arithmetic(),
        (Type::Nullptr, Type::Pointer(_)) => true,
        (Type::Pointer(_), Type::Pointer(to)) => **to == Type::Void,
        _ => false,
    }
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Int(_, kind) => Type::Int(*kind),
        Literal::Float(_, kind) => Type::Float(*kind),
        Literal::Char(_) => Type::Int(crate::types::IntKind::Char),
        Literal::Bool(_) => Type::Bool,
        Literal::Nullptr => Type::Nullptr,
    }
}

fn float_literal(expr: &Expr) -> Option<(f64, crate::types::FloatKind)> {
    match expr {
        Expr::Literal(Literal::Float(v, kind), _) => Some((*v, *kind)),
        Expr::Group(inner, _) => float_literal(inner),
        Expr::Unary {
            op: UnaryOp::Negate,
            operand,
            ..
        } => float_literal(operand).map(|(v, kind)| (-v, kind)),
        _ => None,
    }
}

fn is_integral(ty: &Type) -> bool {
    ty.is_arithmetic() && !matches!(ty, Type::Float(_))
}

fn pointers_comparable(left: &Type, right: &Type) -> bool {
    match (left, right) {
        (Type::Pointer(a), Type::Pointer(b)) => a == b || **a == Type::Void || **b == Type::Void,
        (Type::Pointer(_), Type::Nullptr)
        | (Type::Nullptr, Type::Pointer(_))
        | (Type::Nullptr, Type::Nullptr) => true,
        _ => false,
    }
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Type::int(), Type::double(), true)]
    #[case(Type::Bool, Type::int(), true)]
    #[case(Type::Nullptr, Type::pointer_to(Type::int()), true)]
    #[case(Type::pointer_to(Type::int()), Type::pointer_to(Type::Void), true)]
    #[case(Type::pointer_to(Type::Void), Type::pointer_to(Type::int()), false)]
    #[case(Type::Record("S".into()), Type::int(), false)]
    #[case(Type::int(), Type::Enum("Color".into()), false)]
    #[case(Type::Enum("Color".into()), Type::int(), true)]
    #[case(Type::Unknown, Type::Record("S".into()), true)]
    fn test_convertible(#[case] from: Type, #[case] to: Type, #[case] expected: bool) {
        assert_eq!(convertible(&from, &to), expected);
    }

    #[rstest]
    #[case(1, "1st")]
    #[case(2, "2nd")]
    #[case(3, "3rd")]
    #[case(4, "4th")]
    #[case(11, "11th")]
    #[case(22, "22nd")]
    fn test_ordinal(#[case] n: usize, #[case] expected: &str) {
        assert_eq!(ordinal(n), expected);
    }

    #[test]
    fn test_pointer_comparisons() {
        let p = Type::pointer_to(Type::Record("S".into()));
        assert!(pointers_comparable(&p, &Type::Nullptr));
        assert!(!pointers_comparable(&p, &Type::pointer_to(Type::int())));
    }
}
