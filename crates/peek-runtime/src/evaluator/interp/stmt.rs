//! Statement execution

use super::{ControlFlow, Interpreter};
use crate::ast::{Block, Stmt, TypeSpec, VarDecl};
use crate::value::{Binding, ObjectSpace, RuntimeError, Value};

impl<'a> Interpreter<'a> {
    /// Execute a statement; expression statements yield their value
    pub(super) fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Option<Value>, RuntimeError> {
        match stmt {
            Stmt::Declaration(vars) => {
                for var in vars {
                    self.exec_var_decl(var, false)?;
                }
                Ok(None)
            }
            // Types were registered by the semantic pass
            Stmt::Record(_) | Stmt::Enum(_) | Stmt::Empty(_) => Ok(None),
            Stmt::Expr(expr) => {
                self.tick(expr.span())?;
                Ok(Some(self.eval_expr(expr)?))
            }
            Stmt::Block(block) => {
                self.exec_block(block)?;
                Ok(None)
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                span,
            } => {
                self.tick(*span)?;
                if self.condition(cond)? {
                    self.exec_scoped(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.exec_scoped(else_branch)?;
                }
                Ok(None)
            }
            Stmt::While { cond, body, span } => {
                loop {
                    self.tick(*span)?;
                    if !self.condition(cond)? {
                        break;
                    }
                    self.exec_scoped(body)?;
                    if matches!(self.control_flow, ControlFlow::Return(_)) {
                        break;
                    }
                }
                Ok(None)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Void,
                };
                self.control_flow = ControlFlow::Return(value);
                Ok(None)
            }
        }
    }

    /// Execute a statement unless a `return` already happened
    pub(super) fn exec_until_return(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        if matches!(self.control_flow, ControlFlow::None) {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_block(&mut self, block: &Block) -> Result<(), RuntimeError> {
        self.push_scope();
        let result = block
            .statements
            .iter()
            .try_for_each(|stmt| self.exec_until_return(stmt));
        self.pop_scope();
        result
    }

    fn exec_scoped(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        self.push_scope();
        let result = self.exec_stmt(stmt).map(|_| ());
        self.pop_scope();
        result
    }

    fn condition(&mut self, cond: &crate::ast::Expr) -> Result<bool, RuntimeError> {
        let value = self.eval_expr(cond)?;
        value.truthy().ok_or_else(|| {
            self.type_error(
                format!("value of type '{}' is not contextually convertible to 'bool'", value.ty()),
                cond.span(),
            )
        })
    }

    /// Declare a variable; `global` marks a top-level submission's variable
    ///
    /// Globals and `$`-prefixed variables of the expression body go to the
    /// persistent scope, everything else is local to the current frame.
    pub(super) fn exec_var_decl(&mut self, var: &VarDecl, global: bool) -> Result<(), RuntimeError> {
        let declared = if var.type_ref.spec == TypeSpec::Auto {
            None
        } else {
            Some(self.lookup().type_of(&var.type_ref).ok_or_else(|| {
                self.type_error(format!("unknown type of '{}'", var.name.name), var.name.span)
            })?)
        };

        let (ty, value) = match (&var.init, declared) {
            (Some(init), declared) => {
                let value = self.eval_expr(init)?;
                let ty = declared.unwrap_or_else(|| value.ty());
                let value = self.convert(value, &ty, init.span())?;
                (ty, value)
            }
            (None, Some(ty)) => {
                let value = self.default_value(&ty);
                (ty, value)
            }
            (None, None) => {
                return Err(self.type_error(
                    format!("variable '{}' has no initializer", var.name.name),
                    var.name.span,
                ))
            }
        };

        let persistent = global || (self.frame_visible() && var.name.name.starts_with('$'));
        if persistent {
            self.define_persistent(&var.name.name, ty, value, var.name.span);
        } else {
            let value = self.rt.heap.copy_value(&value, ObjectSpace::Frame);
            self.define_local(&var.name.name, Binding::new(ty, value));
        }
        Ok(())
    }
}
