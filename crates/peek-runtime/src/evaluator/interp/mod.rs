//! Tree-walking interpreter for checked submissions
//!
//! Runs only after the semantic pass found no errors, so most type
//! mismatches cannot happen here; the remaining runtime failures (division
//! by zero, null dereference, collaborator errors, limits) carry the code
//! site they happened at. Functions declared by earlier submissions execute
//! with their own submission as the code owner, so a failure inside one maps
//! back to the text that defined it.

mod expr;
mod stmt;

use super::lookup::{LocalTypes, Lookup, MethodRef, Resolution};
use super::InterruptFlag;
use crate::ast::{Item, TranslationUnit, TypeSpec};
use crate::context::EvaluationContext;
use crate::persistent::{PersistentFunction, PersistentScope};
use crate::position::{PositionMapper, EXPR_FUNCTION_NAME};
use crate::provider::{DebugInfoProvider, FunctionSig, ProcessAccessor};
use crate::registry::SubmissionId;
use crate::span::Span;
use crate::types::Type;
use crate::value::{Binding, CodeSite, Heap, Object, ObjectRef, ObjectSpace, RuntimeError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Records nested deeper than this are left empty when default-constructed
const MAX_RECORD_DEPTH: usize = 16;

/// Control flow signal for handling return
#[derive(Debug, Clone, PartialEq)]
pub(super) enum ControlFlow {
    None,
    Return(Value),
}

/// Execution limits of one evaluation
#[derive(Debug, Clone, Copy)]
pub(super) struct Limits {
    pub max_call_depth: usize,
    pub step_limit: u64,
}

/// Mutable and shared state the interpreter runs against
pub(super) struct Runtime<'a> {
    pub context: &'a mut EvaluationContext,
    pub heap: &'a mut Heap,
    pub persistent: &'a mut PersistentScope,
    pub local_types: &'a LocalTypes,
    pub debug_info: &'a dyn DebugInfoProvider,
    pub process: &'a dyn ProcessAccessor,
}

/// One activation: the expression body, or a call to a declared function
struct Frame {
    /// Lexical scopes, outermost first
    scopes: Vec<Vec<(String, Binding)>>,
    /// Whether the paused frame's scopes and `this` are visible
    frame_visible: bool,
}

/// Something that can be read and assigned
#[derive(Debug, Clone)]
pub(super) enum Place {
    Local { scope: usize, index: usize },
    Context { frame: usize, index: usize },
    Field { object: ObjectRef, index: usize },
    Persistent(String),
    Global(String),
    /// A whole object behind a dereferenced pointer
    Object(ObjectRef),
}

/// Interpreter state
pub(super) struct Interpreter<'a> {
    /// Submission owning the code being executed
    pub(super) submission: SubmissionId,
    pub(super) rt: Runtime<'a>,
    pub(super) mapper: &'a PositionMapper<'a>,
    frames: Vec<Frame>,
    /// Debug-information globals read so far, with this evaluation's writes
    globals: HashMap<String, Binding>,
    limits: Limits,
    steps: u64,
    interrupt: Option<InterruptFlag>,
    pub(super) control_flow: ControlFlow,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        submission: SubmissionId,
        rt: Runtime<'a>,
        mapper: &'a PositionMapper<'a>,
        limits: Limits,
        interrupt: Option<InterruptFlag>,
    ) -> Self {
        Self {
            submission,
            rt,
            mapper,
            frames: Vec::new(),
            globals: HashMap::new(),
            limits,
            steps: 0,
            interrupt,
            control_flow: ControlFlow::None,
        }
    }

    /// Run the body of a statement-mode submission and return its value
    ///
    /// The value is that of the last statement when it is an expression, or
    /// the operand of an explicit `return`.
    pub fn run_expression(&mut self, unit: &TranslationUnit) -> Result<Value, RuntimeError> {
        let body = unit.items.iter().find_map(|item| match item {
            Item::Function(f) if f.name.name == EXPR_FUNCTION_NAME => f.body.as_ref(),
            _ => None,
        });
        let Some(body) = body else {
            return Ok(Value::Void);
        };

        self.frames.push(Frame {
            scopes: vec![Vec::new()],
            frame_visible: true,
        });

        let mut last = None;
        for stmt in &body.statements {
            if matches!(stmt, crate::ast::Stmt::Empty(_)) {
                continue;
            }
            last = self.exec_stmt(stmt)?;
            if let ControlFlow::Return(value) =
                std::mem::replace(&mut self.control_flow, ControlFlow::None)
            {
                self.frames.pop();
                return Ok(value);
            }
        }

        self.frames.pop();
        Ok(last.unwrap_or(Value::Void))
    }

    /// Run the initializers of a top-level submission's global variables
    pub fn run_top_level(&mut self, unit: &TranslationUnit) -> Result<Value, RuntimeError> {
        self.frames.push(Frame {
            scopes: vec![Vec::new()],
            frame_visible: false,
        });
        for item in &unit.items {
            if let Item::Variable(var) = item {
                self.tick(var.span)?;
                self.exec_var_decl(var, true)?;
            }
        }
        self.frames.pop();
        Ok(Value::Void)
    }

    /// Bind the globals of a submission committed despite redefinition
    /// errors: each takes its declared type, zero-initialized, and no
    /// initializer runs. `auto` globals keep any earlier binding.
    pub fn bind_top_level(&mut self, unit: &TranslationUnit) {
        for item in &unit.items {
            let Item::Variable(var) = item else {
                continue;
            };
            if var.type_ref.spec == TypeSpec::Auto {
                continue;
            }
            let Some(ty) = self.lookup().type_of(&var.type_ref) else {
                continue;
            };
            let value = self.default_value(&ty);
            self.define_persistent(&var.name.name, ty, value, var.name.span);
        }
    }

    pub(super) fn lookup(&self) -> Lookup<'_> {
        Lookup {
            context: &*self.rt.context,
            heap: &*self.rt.heap,
            persistent: &*self.rt.persistent,
            local_types: self.rt.local_types,
            debug_info: self.rt.debug_info,
        }
    }

    pub(super) fn site(&self, span: Span) -> CodeSite {
        CodeSite {
            submission: self.submission,
            span,
        }
    }

    pub(super) fn type_error(&self, msg: impl Into<String>, span: Span) -> RuntimeError {
        RuntimeError::TypeError {
            msg: msg.into(),
            site: self.site(span),
        }
    }

    /// Count one unit of work, honoring the step limit and interruption
    pub(super) fn tick(&mut self, span: Span) -> Result<(), RuntimeError> {
        if self.interrupt.as_ref().is_some_and(InterruptFlag::is_set) {
            tracing::debug!(steps = self.steps, "evaluation interrupted");
            return Err(RuntimeError::Interrupted);
        }
        self.steps += 1;
        if self.steps > self.limits.step_limit {
            return Err(RuntimeError::StepLimitExceeded {
                limit: self.limits.step_limit,
                site: self.site(span),
            });
        }
        Ok(())
    }

    fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub(super) fn frame_visible(&self) -> bool {
        self.frame().is_some_and(|f| f.frame_visible)
    }

    pub(super) fn push_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(Vec::new());
        }
    }

    pub(super) fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.pop();
        }
    }

    pub(super) fn define_local(&mut self, name: &str, binding: Binding) {
        if let Some(scope) = self.frames.last_mut().and_then(|f| f.scopes.last_mut()) {
            scope.push((name.to_string(), binding));
        }
    }

    /// Store a variable in the persistent scope, declared at `span`
    pub(super) fn define_persistent(&mut self, name: &str, ty: Type, value: Value, span: Span) {
        let value = self.rt.heap.copy_value(&value, ObjectSpace::Persistent);
        let location = self.mapper.resolve(span.start, self.submission);
        tracing::debug!(name, ty = %ty, "defining persistent variable");
        self.rt
            .persistent
            .set_variable(name, Binding::new(ty, value), Some(location));
    }

    // === Places ===

    fn find_local(&self, name: &str) -> Option<Place> {
        let frame = self.frame()?;
        frame
            .scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(scope, bindings)| {
                bindings
                    .iter()
                    .rposition(|(n, _)| n == name)
                    .map(|index| Place::Local { scope, index })
            })
    }

    /// Place named by an identifier, or `None` when the name is not a variable
    pub(super) fn place_of_name(&self, name: &str) -> Option<Place> {
        if let Some(place) = self.find_local(name) {
            return Some(place);
        }
        match self.lookup().resolve(name, self.frame_visible())? {
            Resolution::Context { frame, index, .. } => Some(Place::Context { frame, index }),
            Resolution::Member { object, index, .. } => Some(Place::Field { object, index }),
            Resolution::Persistent { .. } => Some(Place::Persistent(name.to_string())),
            Resolution::Global { .. } => Some(Place::Global(name.to_string())),
            _ => None,
        }
    }

    pub(super) fn read_place(&mut self, place: &Place, span: Span) -> Result<Binding, RuntimeError> {
        let binding = match place {
            Place::Local { scope, index } => self
                .frame()
                .and_then(|f| f.scopes.get(*scope))
                .and_then(|s| s.get(*index))
                .map(|(_, b)| b.clone()),
            Place::Context { frame, index } => self.rt.context.binding(*frame, *index).cloned(),
            Place::Field { object, index } => self
                .rt
                .heap
                .get(*object)
                .and_then(|o| o.fields.get(*index))
                .map(|f| f.binding.clone()),
            Place::Persistent(name) => self.rt.persistent.variable(name).map(|v| v.binding.clone()),
            Place::Global(name) => return self.read_global(name, span),
            Place::Object(object) => self.rt.heap.get(*object).map(|o| {
                Binding::new(
                    Type::Record(o.type_name.clone()),
                    Value::Object {
                        type_name: o.type_name.clone(),
                        object: *object,
                    },
                )
            }),
        };
        binding.ok_or_else(|| self.type_error("variable is no longer available", span))
    }

    /// Assign an already converted value
    pub(super) fn write_place(&mut self, place: &Place, value: Value, span: Span) -> Result<(), RuntimeError> {
        match place {
            Place::Object(target) => return self.overwrite_object(*target, &value, span),
            Place::Global(name) if !self.globals.contains_key(name) => {
                self.read_global(name, span)?;
            }
            _ => {}
        }

        let space = match place {
            Place::Persistent(_) => ObjectSpace::Persistent,
            Place::Field { object, .. } => object.space,
            _ => ObjectSpace::Frame,
        };
        let value = self.rt.heap.copy_value(&value, space);

        let slot = match place {
            Place::Local { scope, index } => self
                .frames
                .last_mut()
                .and_then(|f| f.scopes.get_mut(*scope))
                .and_then(|s| s.get_mut(*index))
                .map(|(_, b)| b),
            Place::Context { frame, index } => self.rt.context.binding_mut(*frame, *index),
            Place::Field { object, index } => self
                .rt
                .heap
                .get_mut(*object)
                .and_then(|o| o.fields.get_mut(*index))
                .map(|f| &mut f.binding),
            Place::Persistent(name) => self.rt.persistent.variable_mut(name).map(|v| &mut v.binding),
            Place::Global(name) => self.globals.get_mut(name),
            Place::Object(_) => None,
        };
        match slot {
            Some(binding) => {
                binding.value = value;
                Ok(())
            }
            None => Err(self.type_error("expression is not assignable", span)),
        }
    }

    /// `*p = value` for a record: replace the pointee's fields and bases
    fn overwrite_object(&mut self, target: ObjectRef, value: &Value, span: Span) -> Result<(), RuntimeError> {
        let Value::Object { object, .. } = value else {
            return Err(self.type_error("expression is not assignable", span));
        };
        let copy = self
            .rt
            .heap
            .copy_object(*object, target.space)
            .and_then(|copy| self.rt.heap.get(copy).cloned())
            .ok_or_else(|| self.type_error("object is no longer available", span))?;
        match self.rt.heap.get_mut(target) {
            Some(slot) => {
                *slot = copy;
                Ok(())
            }
            None => Err(RuntimeError::NullDereference {
                site: self.site(span),
            }),
        }
    }

    fn read_global(&mut self, name: &str, span: Span) -> Result<Binding, RuntimeError> {
        if let Some(binding) = self.globals.get(name) {
            return Ok(binding.clone());
        }
        tracing::trace!(name, "reading global from process");
        let binding = self
            .rt
            .process
            .read_global(name)
            .map_err(|source| RuntimeError::Process {
                source,
                site: self.site(span),
            })?;
        self.globals.insert(name.to_string(), binding.clone());
        Ok(binding)
    }

    // === Values ===

    /// Implicitly convert `value` to `ty`
    pub(super) fn convert(&self, value: Value, ty: &Type, span: Span) -> Result<Value, RuntimeError> {
        if ty.is_unknown() {
            return Ok(value);
        }
        match value.convert_to(ty) {
            Some(converted) => Ok(converted),
            None => Err(self.type_error(
                format!("cannot convert '{}' to '{}'", value.ty(), ty),
                span,
            )),
        }
    }

    /// Value of a declared but uninitialized variable
    pub(super) fn default_value(&mut self, ty: &Type) -> Value {
        self.default_value_at(ty, 0)
    }

    fn default_value_at(&mut self, ty: &Type, depth: usize) -> Value {
        match ty {
            Type::Bool => Value::Bool(false),
            Type::Int(kind) => Value::Int(0, *kind),
            Type::Float(kind) => Value::Float(0.0, *kind),
            Type::Enum(name) => Value::Enum {
                type_name: name.clone(),
                value: 0,
            },
            Type::Pointer(pointee) => Value::Pointer {
                pointee: pointee.as_ref().clone(),
                target: None,
            },
            Type::Nullptr => Value::Nullptr,
            Type::Record(name) => {
                let object = self.default_object(name, depth);
                Value::Object {
                    type_name: name.clone(),
                    object,
                }
            }
            Type::Void | Type::Unknown => Value::Void,
        }
    }

    fn default_object(&mut self, name: &str, depth: usize) -> ObjectRef {
        let mut object = Object::new(name);
        if depth <= MAX_RECORD_DEPTH {
            if let Some(shape) = self.lookup().record_shape(name) {
                for base in &shape.bases {
                    let base_object = self.default_object(base, depth + 1);
                    object.bases.push(base_object);
                }
                for (field, ty) in &shape.fields {
                    let value = self.default_value_at(ty, depth + 1);
                    object = object.with_field(field.clone(), Binding::new(ty.clone(), value));
                }
            }
        }
        self.rt.heap.alloc(ObjectSpace::Frame, object)
    }

    // === Calls ===

    /// Call a function declared by a submission
    pub(super) fn call_declared(
        &mut self,
        function: &PersistentFunction,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        if self.frames.len() > self.limits.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.limits.max_call_depth,
                site: self.site(span),
            });
        }
        self.tick(span)?;

        let decl = Arc::clone(&function.decl);
        let Some(body) = decl.body.as_ref() else {
            return Err(self.type_error(format!("function '{}' has no body", decl.name.name), span));
        };

        let mut scope = Vec::new();
        for ((param, ty), value) in decl.params.iter().zip(&function.signature.params).zip(args) {
            let value = self.convert(value, ty, span)?;
            let value = self.rt.heap.copy_value(&value, ObjectSpace::Frame);
            if let Some(name) = &param.name {
                scope.push((name.name.clone(), Binding::new(ty.clone(), value)));
            }
        }

        tracing::trace!(function = %decl.name.name, depth = self.frames.len(), "calling declared function");
        let caller = std::mem::replace(&mut self.submission, function.submission);
        self.frames.push(Frame {
            scopes: vec![scope],
            frame_visible: false,
        });

        let result = body
            .statements
            .iter()
            .try_for_each(|stmt| self.exec_until_return(stmt));

        self.frames.pop();
        let returned = std::mem::replace(&mut self.control_flow, ControlFlow::None);
        self.submission = caller;
        result?;

        let value = match returned {
            ControlFlow::Return(value) => value,
            ControlFlow::None => Value::Void,
        };
        match &function.signature.return_type {
            Type::Void => Ok(Value::Void),
            ty => {
                let converted = value.convert_to(ty);
                converted.ok_or_else(|| RuntimeError::TypeError {
                    msg: format!("cannot convert return value to '{}'", ty),
                    site: CodeSite {
                        submission: function.submission,
                        span: decl.name.span,
                    },
                })
            }
        }
    }

    /// Call a function in the live process
    pub(super) fn call_process(
        &mut self,
        name: &str,
        signature: &FunctionSig,
        receiver: Option<ObjectRef>,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        self.tick(span)?;

        let mut bindings = Vec::with_capacity(args.len() + 1);
        if let Some(receiver) = receiver {
            let type_name = self
                .rt
                .heap
                .get(receiver)
                .map(|o| o.type_name.clone())
                .unwrap_or_default();
            let pointee = Type::Record(type_name);
            bindings.push(Binding::new(
                Type::pointer_to(pointee.clone()),
                Value::Pointer {
                    pointee,
                    target: Some(receiver),
                },
            ));
        }
        for (value, ty) in args.into_iter().zip(&signature.params) {
            let value = self.convert(value, ty, span)?;
            bindings.push(Binding::new(ty.clone(), value));
        }

        tracing::debug!(function = name, args = bindings.len(), "calling into process");
        let result = self
            .rt
            .process
            .call_function(name, &bindings)
            .map_err(|source| RuntimeError::Process {
                source,
                site: self.site(span),
            })?;
        Ok(result.value)
    }

    pub(super) fn call_method(
        &mut self,
        receiver: ObjectRef,
        method: &MethodRef,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        self.call_process(&method.qualified_name(), &method.signature, Some(receiver), args, span)
    }
}

