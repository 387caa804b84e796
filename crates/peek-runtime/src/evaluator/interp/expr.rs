//! Expression evaluation

use super::{Interpreter, Place};
use crate::ast::{AssignOp, BinaryOp, Expr, Identifier, Literal, PostfixOp, UnaryOp};
use crate::evaluator::lookup::Resolution;
use crate::span::Span;
use crate::types::{IntKind, Type};
use crate::value::{ObjectRef, RuntimeError, Value};

impl<'a> Interpreter<'a> {
    /// Evaluate an expression
    pub(super) fn eval_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(lit, _) => Ok(eval_literal(lit)),
            Expr::Identifier(id) => self.eval_identifier(id),
            Expr::This(span) => self.eval_this(*span),
            Expr::Scoped { scope, name, span } => self.eval_scoped(scope, name, *span),
            Expr::Unary { op, operand, span } => self.eval_unary(*op, operand, *span),
            Expr::Postfix { op, operand, span } => {
                let delta = if *op == PostfixOp::Increment { 1 } else { -1 };
                self.step_place(operand, delta, false, *span)
            }
            Expr::Binary {
                op,
                left,
                right,
                op_span,
                ..
            } => self.eval_binary(*op, left, right, *op_span),
            Expr::Assign {
                op,
                target,
                value,
                op_span,
                ..
            } => self.eval_assign(*op, target, value, *op_span),
            Expr::Call {
                callee, args, span, ..
            } => self.eval_call(callee, args, *span),
            Expr::Member { member, .. } => {
                let place = self.place_of(expr)?;
                Ok(self.read_place(&place, member.span)?.value)
            }
            Expr::Group(inner, _) => self.eval_expr(inner),
        }
    }

    fn eval_identifier(&mut self, id: &Identifier) -> Result<Value, RuntimeError> {
        if let Some(place) = self.place_of_name(&id.name) {
            return Ok(self.read_place(&place, id.span)?.value);
        }
        match self.lookup().resolve(&id.name, self.frame_visible()) {
            Some(Resolution::Enumerator { enum_name, value }) => Ok(Value::Enum {
                type_name: enum_name,
                value,
            }),
            Some(_) => Err(self.type_error(
                format!("reference to function '{}' must be called", id.name),
                id.span,
            )),
            None => Err(self.type_error(format!("undeclared identifier '{}'", id.name), id.span)),
        }
    }

    fn eval_this(&self, span: Span) -> Result<Value, RuntimeError> {
        let object = if self.frame_visible() {
            self.rt.context.this_object()
        } else {
            None
        };
        let type_name = object.and_then(|o| self.rt.heap.get(o)).map(|o| o.type_name.clone());
        match (object, type_name) {
            (Some(object), Some(type_name)) => Ok(Value::Pointer {
                pointee: Type::Record(type_name),
                target: Some(object),
            }),
            _ => Err(self.type_error("invalid use of 'this'", span)),
        }
    }

    fn eval_scoped(&self, scope: &Identifier, name: &Identifier, span: Span) -> Result<Value, RuntimeError> {
        let value = self
            .lookup()
            .enum_shape(&scope.name)
            .and_then(|(_, enumerators)| enumerators.into_iter().find(|(n, _)| *n == name.name))
            .map(|(_, value)| value);
        match value {
            Some(value) => Ok(Value::Enum {
                type_name: scope.name.clone(),
                value,
            }),
            None => Err(self.type_error(
                format!("no member named '{}' in '{}'", name.name, scope.name),
                span,
            )),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> Result<Value, RuntimeError> {
        match op {
            UnaryOp::PreIncrement => self.step_place(operand, 1, true, span),
            UnaryOp::PreDecrement => self.step_place(operand, -1, true, span),
            UnaryOp::Negate => match self.eval_expr(operand)? {
                Value::Float(v, kind) => Ok(Value::Float(-v, kind)),
                other => {
                    let ty = other.ty();
                    match (ty.common_arithmetic(&ty), other.as_i64()) {
                        (Type::Int(kind), Some(v)) => Ok(Value::Int(kind.wrap(v.wrapping_neg()), kind)),
                        _ => Err(self.type_error(
                            format!("invalid argument type '{}' to unary expression", ty),
                            span,
                        )),
                    }
                }
            },
            UnaryOp::Not => {
                let value = self.eval_expr(operand)?;
                match value.truthy() {
                    Some(b) => Ok(Value::Bool(!b)),
                    None => Err(self.type_error(
                        format!("invalid argument type '{}' to unary expression", value.ty()),
                        span,
                    )),
                }
            }
            UnaryOp::Deref => {
                let value = self.eval_expr(operand)?;
                let place = Place::Object(self.pointer_target(&value, span)?);
                Ok(self.read_place(&place, span)?.value)
            }
        }
    }

    /// Object a pointer value points at; null pointers fail
    fn pointer_target(&self, value: &Value, span: Span) -> Result<ObjectRef, RuntimeError> {
        match value {
            Value::Pointer {
                target: Some(target),
                ..
            } => Ok(*target),
            Value::Pointer { target: None, .. } | Value::Nullptr => Err(RuntimeError::NullDereference {
                site: self.site(span),
            }),
            other => Err(self.type_error(
                format!("indirection requires pointer operand ('{}' invalid)", other.ty()),
                span,
            )),
        }
    }

    /// `++x`, `x++`, `--x`, `x--`
    fn step_place(&mut self, operand: &Expr, delta: i64, prefix: bool, span: Span) -> Result<Value, RuntimeError> {
        let place = self.place_of(operand)?;
        let old = self.read_place(&place, span)?;
        let new = match &old.value {
            Value::Int(v, kind) => Value::Int(kind.wrap(v.wrapping_add(delta)), *kind),
            Value::Float(v, kind) => Value::Float(v + delta as f64, *kind),
            other => {
                let verb = if delta > 0 { "increment" } else { "decrement" };
                return Err(self.type_error(
                    format!("cannot {} value of type '{}'", verb, other.ty()),
                    span,
                ));
            }
        };
        self.write_place(&place, new.clone(), span)?;
        Ok(if prefix { new } else { old.value })
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, op_span: Span) -> Result<Value, RuntimeError> {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let l = self.eval_expr(left)?;
                let l = self.truth(&l, left.span())?;
                if (op == BinaryOp::And) != l {
                    return Ok(Value::Bool(l));
                }
                let r = self.eval_expr(right)?;
                Ok(Value::Bool(self.truth(&r, right.span())?))
            }
            _ => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.binary_op(op, l, r, op_span)
            }
        }
    }

    fn truth(&self, value: &Value, span: Span) -> Result<bool, RuntimeError> {
        value.truthy().ok_or_else(|| {
            self.type_error(
                format!("value of type '{}' is not contextually convertible to 'bool'", value.ty()),
                span,
            )
        })
    }

    /// Apply a non-short-circuit binary operator
    pub(super) fn binary_op(&self, op: BinaryOp, l: Value, r: Value, span: Span) -> Result<Value, RuntimeError> {
        if let (Some(a), Some(b)) = (pointer_identity(&l), pointer_identity(&r)) {
            return match op {
                BinaryOp::Eq => Ok(Value::Bool(a == b)),
                BinaryOp::Ne => Ok(Value::Bool(a != b)),
                _ => Err(self.invalid_operands(&l, &r, span)),
            };
        }

        let (lt, rt) = (l.ty(), r.ty());
        if !lt.is_arithmetic() || !rt.is_arithmetic() {
            return Err(self.invalid_operands(&l, &r, span));
        }

        match lt.common_arithmetic(&rt) {
            Type::Float(kind) => {
                let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                    return Err(self.invalid_operands(&l, &r, span));
                };
                let value = match op {
                    BinaryOp::Add => Value::Float(a + b, kind),
                    BinaryOp::Sub => Value::Float(a - b, kind),
                    BinaryOp::Mul => Value::Float(a * b, kind),
                    BinaryOp::Div => Value::Float(a / b, kind),
                    BinaryOp::Eq => Value::Bool(a == b),
                    BinaryOp::Ne => Value::Bool(a != b),
                    BinaryOp::Lt => Value::Bool(a < b),
                    BinaryOp::Le => Value::Bool(a <= b),
                    BinaryOp::Gt => Value::Bool(a > b),
                    BinaryOp::Ge => Value::Bool(a >= b),
                    BinaryOp::Rem | BinaryOp::And | BinaryOp::Or => {
                        return Err(self.invalid_operands(&l, &r, span))
                    }
                };
                Ok(value)
            }
            Type::Int(kind) => {
                let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) else {
                    return Err(self.invalid_operands(&l, &r, span));
                };
                integer_op(op, kind.wrap(a), kind.wrap(b), kind).map_err(|err| match err {
                        IntegerError::DivideByZero => RuntimeError::DivideByZero {
                            site: self.site(span),
                        },
                        IntegerError::Unsupported => self.invalid_operands(&l, &r, span),
                    })
            }
            _ => Err(self.invalid_operands(&l, &r, span)),
        }
    }

    fn invalid_operands(&self, l: &Value, r: &Value, span: Span) -> RuntimeError {
        RuntimeError::InvalidOperands {
            lhs: l.ty().display_name(),
            rhs: r.ty().display_name(),
            site: self.site(span),
        }
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, op_span: Span) -> Result<Value, RuntimeError> {
        let place = self.place_of(target)?;
        let rhs = self.eval_expr(value)?;
        let current = self.read_place(&place, op_span)?;

        let result = match op {
            AssignOp::Assign => rhs,
            AssignOp::Compound(binary) => self.binary_op(binary, current.value, rhs, op_span)?,
        };
        let converted = self.convert(result, &current.ty, value.span())?;
        self.write_place(&place, converted.clone(), op_span)?;
        Ok(converted)
    }

    /// Place an lvalue expression denotes
    pub(super) fn place_of(&mut self, expr: &Expr) -> Result<Place, RuntimeError> {
        match expr {
            Expr::Identifier(id) => self
                .place_of_name(&id.name)
                .ok_or_else(|| self.type_error("expression is not assignable", id.span)),
            Expr::Member {
                object,
                member,
                arrow,
                ..
            } => {
                let object = self.object_of(object, *arrow, member.span)?;
                match self.rt.heap.find_field(object, &member.name) {
                    Some((object, index)) => Ok(Place::Field { object, index }),
                    None => {
                        let type_name = self
                            .rt
                            .heap
                            .get(object)
                            .map(|o| o.type_name.clone())
                            .unwrap_or_default();
                        Err(self.type_error(
                            format!("no member named '{}' in '{}'", member.name, type_name),
                            member.span,
                        ))
                    }
                }
            }
            Expr::Unary {
                op: UnaryOp::Deref,
                operand,
                span,
            } => {
                let pointer = self.eval_expr(operand)?;
                Ok(Place::Object(self.pointer_target(&pointer, *span)?))
            }
            Expr::Group(inner, _) => self.place_of(inner),
            other => Err(self.type_error("expression is not assignable", other.span())),
        }
    }

    /// Object accessed by `.` (a record value) or `->` (a pointer to one)
    fn object_of(&mut self, expr: &Expr, arrow: bool, span: Span) -> Result<ObjectRef, RuntimeError> {
        let value = self.eval_expr(expr)?;
        match (&value, arrow) {
            (Value::Object { object, .. }, false) => Ok(*object),
            (Value::Pointer { .. } | Value::Nullptr, true) => self.pointer_target(&value, span),
            (other, _) => Err(self.type_error(
                format!(
                    "member reference base type '{}' is not a structure or union",
                    other.ty()
                ),
                span,
            )),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<Value, RuntimeError> {
        match callee {
            Expr::Identifier(id) => {
                let resolution = match self.place_of_name(&id.name) {
                    Some(_) => None,
                    None => self.lookup().resolve(&id.name, self.frame_visible()),
                };
                let values = self.eval_args(args)?;
                match resolution {
                    Some(Resolution::Function(function)) if function.decl.body.is_some() => {
                        self.call_declared(&function, values, id.span)
                    }
                    Some(Resolution::Function(function)) => {
                        self.call_process(&id.name, &function.signature, None, values, id.span)
                    }
                    Some(Resolution::ExternalFunction { signature, .. }) => {
                        self.call_process(&id.name, &signature, None, values, id.span)
                    }
                    Some(Resolution::Method { receiver, method }) => {
                        self.call_method(receiver, &method, values, id.span)
                    }
                    _ => Err(self.type_error(
                        format!("called object '{}' is not a function", id.name),
                        id.span,
                    )),
                }
            }
            Expr::Member {
                object,
                member,
                arrow,
                ..
            } => {
                let receiver = self.object_of(object, *arrow, member.span)?;
                let type_name = self
                    .rt
                    .heap
                    .get(receiver)
                    .map(|o| o.type_name.clone())
                    .unwrap_or_default();
                let method = self.lookup().method(&type_name, &member.name);
                let values = self.eval_args(args)?;
                match method {
                    Some(method) => self.call_method(receiver, &method, values, member.span),
                    None => Err(self.type_error(
                        format!("no member named '{}' in '{}'", member.name, type_name),
                        member.span,
                    )),
                }
            }
            other => Err(self.type_error("called object is not a function", other.span().merge(span))),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        args.iter().map(|arg| self.eval_expr(arg)).collect()
    }
}

fn integer_op(op: BinaryOp, a: i64, b: i64, kind: IntKind) -> Result<Value, IntegerError> {
    let signed = kind.is_signed();
    let compare = |a: i64, b: i64| {
        if signed {
            a.cmp(&b)
        } else {
            (a as u64).cmp(&(b as u64))
        }
    };
    let int = |v: i64| Value::Int(kind.wrap(v), kind);

    let value = match op {
        BinaryOp::Add => int(a.wrapping_add(b)),
        BinaryOp::Sub => int(a.wrapping_sub(b)),
        BinaryOp::Mul => int(a.wrapping_mul(b)),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(IntegerError::DivideByZero),
        BinaryOp::Div if signed => int(a.wrapping_div(b)),
        BinaryOp::Div => int(((a as u64) / (b as u64)) as i64),
        BinaryOp::Rem if signed => int(a.wrapping_rem(b)),
        BinaryOp::Rem => int(((a as u64) % (b as u64)) as i64),
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::Ne => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(compare(a, b).is_lt()),
        BinaryOp::Le => Value::Bool(compare(a, b).is_le()),
        BinaryOp::Gt => Value::Bool(compare(a, b).is_gt()),
        BinaryOp::Ge => Value::Bool(compare(a, b).is_ge()),
        BinaryOp::And | BinaryOp::Or => return Err(IntegerError::Unsupported),
    };
    Ok(value)
}

enum IntegerError {
    DivideByZero,
    Unsupported,
}

fn eval_literal(lit: &Literal) -> Value {
    match lit {
        Literal::Int(v, kind) => Value::Int(*v, *kind),
        Literal::Float(v, kind) => Value::Float(*v, *kind),
        Literal::Char(c) => Value::Int(*c as i64, IntKind::Char),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Nullptr => Value::Nullptr,
    }
}

/// Target of a pointer-like value, for equality comparisons
fn pointer_identity(value: &Value) -> Option<Option<ObjectRef>> {
    match value {
        Value::Pointer { target, .. } => Some(*target),
        Value::Nullptr => Some(None),
        _ => None,
    }
}
