//! Runtime value representation
//!
//! Scalars are immediate. Records live in an object store and are referred
//! to by [`ObjectRef`]; there are two stores, one for the paused frame (a
//! working copy of what the process collaborator reported) and one for
//! objects owned by persistent variables of the session.

use crate::provider::AccessError;
use crate::registry::SubmissionId;
use crate::span::Span;
use crate::types::{FloatKind, IntKind, Type};
use thiserror::Error;

/// Which store an object lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectSpace {
    Frame,
    Persistent,
}

/// Reference to an object in one of the stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub space: ObjectSpace,
    pub index: usize,
}

impl ObjectRef {
    pub fn frame(index: usize) -> Self {
        Self {
            space: ObjectSpace::Frame,
            index,
        }
    }

    /// Synthetic address shown when printing pointers
    pub fn address(self) -> u64 {
        let base = match self.space {
            ObjectSpace::Frame => 0x7ffe_e000_1000,
            ObjectSpace::Persistent => 0x6000_0000_1000,
        };
        base + (self.index as u64) * 0x40
    }
}

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i64, IntKind),
    Float(f64, FloatKind),
    Enum { type_name: String, value: i64 },
    Pointer { pointee: Type, target: Option<ObjectRef> },
    Nullptr,
    Object { type_name: String, object: ObjectRef },
}

impl Value {
    pub fn int(value: i64) -> Value {
        Value::Int(value, IntKind::Int)
    }

    /// Type of this value
    pub fn ty(&self) -> Type {
        match self {
            Value::Void => Type::Void,
            Value::Bool(_) => Type::Bool,
            Value::Int(_, kind) => Type::Int(*kind),
            Value::Float(_, kind) => Type::Float(*kind),
            Value::Enum { type_name, .. } => Type::Enum(type_name.clone()),
            Value::Pointer { pointee, .. } => Type::pointer_to(pointee.clone()),
            Value::Nullptr => Type::Nullptr,
            Value::Object { type_name, .. } => Type::Record(type_name.clone()),
        }
    }

    /// Integral view (bool, integers, enums)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(v, _) => Some(*v),
            Value::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Floating view of any arithmetic value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v, _) => Some(*v),
            Value::Int(v, kind) if !kind.is_signed() && kind.bits() == 64 => Some(*v as u64 as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Contextual conversion to bool
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Float(v, _) => Some(*v != 0.0),
            Value::Pointer { target, .. } => Some(target.is_some()),
            Value::Nullptr => Some(false),
            other => other.as_i64().map(|v| v != 0),
        }
    }

    /// Implicit conversion to `ty`; `None` when no conversion exists
    pub fn convert_to(&self, ty: &Type) -> Option<Value> {
        match (ty, self) {
            (Type::Unknown, _) => Some(self.clone()),
            (Type::Bool, _) => self.truthy().map(Value::Bool),
            (Type::Int(kind), Value::Float(v, _)) => Some(Value::Int(kind.wrap(*v as i64), *kind)),
            (Type::Int(kind), other) => other.as_i64().map(|v| Value::Int(kind.wrap(v), *kind)),
            (Type::Float(kind), other) => other.as_f64().map(|v| match kind {
                FloatKind::Float => Value::Float(f64::from(v as f32), *kind),
                FloatKind::Double => Value::Float(v, *kind),
            }),
            (Type::Enum(name), Value::Enum { type_name, value }) if name == type_name => {
                Some(Value::Enum {
                    type_name: type_name.clone(),
                    value: *value,
                })
            }
            (Type::Pointer(pointee), Value::Nullptr) => Some(Value::Pointer {
                pointee: pointee.as_ref().clone(),
                target: None,
            }),
            (Type::Pointer(pointee), Value::Pointer { pointee: from, target })
                if **pointee == *from || matches!(pointee.as_ref(), Type::Void) =>
            {
                Some(Value::Pointer {
                    pointee: pointee.as_ref().clone(),
                    target: *target,
                })
            }
            (Type::Record(name), Value::Object { type_name, .. }) if name == type_name => {
                Some(self.clone())
            }
            (Type::Nullptr, Value::Nullptr) => Some(Value::Nullptr),
            _ => None,
        }
    }

    /// Printed form of a scalar value; records print as their field list
    pub fn summary(&self, heap: &Heap, enum_name: &dyn Fn(&str, i64) -> Option<String>) -> String {
        match self {
            Value::Void => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(v, IntKind::Char) => format!("'{}'", char_display(*v)),
            Value::Int(v, kind) if !kind.is_signed() && kind.bits() == 64 => (*v as u64).to_string(),
            Value::Int(v, _) => v.to_string(),
            Value::Float(v, _) => v.to_string(),
            Value::Enum { type_name, value } => {
                enum_name(type_name, *value).unwrap_or_else(|| value.to_string())
            }
            Value::Pointer { target: None, .. } | Value::Nullptr => "0x0000000000000000".to_string(),
            Value::Pointer {
                target: Some(target),
                ..
            } => format!("0x{:016x}", target.address()),
            Value::Object { object, .. } => match heap.get(*object) {
                Some(obj) => {
                    let mut parts = Vec::new();
                    obj.describe_fields(heap, enum_name, &mut parts);
                    format!("({})", parts.join(", "))
                }
                None => "<invalid object>".to_string(),
            },
        }
    }
}

fn char_display(value: i64) -> String {
    match u8::try_from(value) {
        Ok(b'\n') => "\\n".to_string(),
        Ok(b'\t') => "\\t".to_string(),
        Ok(0) => "\\0".to_string(),
        Ok(b) if b.is_ascii_graphic() || b == b' ' => (b as char).to_string(),
        _ => format!("\\x{:02x}", value & 0xff),
    }
}

/// A typed slot
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: Type,
    pub value: Value,
}

impl Binding {
    pub fn new(ty: Type, value: Value) -> Self {
        Self { ty, value }
    }
}

/// Named field of an object
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub binding: Binding,
}

/// An object of record type
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub type_name: String,
    pub fields: Vec<Field>,
    /// Base class subobjects, in declaration order
    pub bases: Vec<ObjectRef>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
            bases: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.fields.push(Field {
            name: name.into(),
            binding,
        });
        self
    }

    fn describe_fields(
        &self,
        heap: &Heap,
        enum_name: &dyn Fn(&str, i64) -> Option<String>,
        parts: &mut Vec<String>,
    ) {
        for base in &self.bases {
            if let Some(base_obj) = heap.get(*base) {
                base_obj.describe_fields(heap, enum_name, parts);
            }
        }
        for field in &self.fields {
            parts.push(format!(
                "{} = {}",
                field.name,
                field.binding.value.summary(heap, enum_name)
            ));
        }
    }
}

/// Flat store of objects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectStore {
    objects: Vec<Object>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, returning its index
    pub fn push(&mut self, object: Object) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.objects.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Object> {
        self.objects.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }
}

/// Both stores seen by one evaluation
#[derive(Debug, Clone)]
pub struct Heap {
    pub frame: ObjectStore,
    pub persistent: ObjectStore,
    /// Frame objects below this index came from the process; the rest are temporaries
    frame_base: usize,
}

impl Heap {
    pub fn new(frame: ObjectStore, persistent: ObjectStore) -> Self {
        let frame_base = frame.len();
        Self {
            frame,
            persistent,
            frame_base,
        }
    }

    pub fn get(&self, object: ObjectRef) -> Option<&Object> {
        match object.space {
            ObjectSpace::Frame => self.frame.get(object.index),
            ObjectSpace::Persistent => self.persistent.get(object.index),
        }
    }

    pub fn get_mut(&mut self, object: ObjectRef) -> Option<&mut Object> {
        match object.space {
            ObjectSpace::Frame => self.frame.get_mut(object.index),
            ObjectSpace::Persistent => self.persistent.get_mut(object.index),
        }
    }

    pub fn alloc(&mut self, space: ObjectSpace, object: Object) -> ObjectRef {
        let index = match space {
            ObjectSpace::Frame => self.frame.push(object),
            ObjectSpace::Persistent => self.persistent.push(object),
        };
        ObjectRef { space, index }
    }

    /// Find a field in `object` or its bases (depth first)
    pub fn find_field(&self, object: ObjectRef, name: &str) -> Option<(ObjectRef, usize)> {
        let obj = self.get(object)?;
        if let Some(index) = obj.fields.iter().position(|f| f.name == name) {
            return Some((object, index));
        }
        obj.bases
            .iter()
            .find_map(|base| self.find_field(*base, name))
    }

    /// Deep copy an object graph into `space`
    pub fn copy_object(&mut self, object: ObjectRef, space: ObjectSpace) -> Option<ObjectRef> {
        let source = self.get(object)?.clone();
        let mut copy = Object::new(source.type_name);
        for field in source.fields {
            let value = self.copy_value(&field.binding.value, space);
            copy.fields.push(Field {
                name: field.name,
                binding: Binding::new(field.binding.ty, value),
            });
        }
        for base in source.bases {
            let base_copy = self.copy_object(base, space)?;
            copy.bases.push(base_copy);
        }
        Some(self.alloc(space, copy))
    }

    /// Value semantics for records: nested objects are copied into `space`
    pub fn copy_value(&mut self, value: &Value, space: ObjectSpace) -> Value {
        match value {
            Value::Object { type_name, object } => match self.copy_object(*object, space) {
                Some(copy) => Value::Object {
                    type_name: type_name.clone(),
                    object: copy,
                },
                None => value.clone(),
            },
            Value::Pointer {
                pointee,
                target: Some(target),
            } if space == ObjectSpace::Persistent && self.is_temporary(*target) => {
                Value::Pointer {
                    pointee: pointee.clone(),
                    target: None,
                }
            }
            other => other.clone(),
        }
    }

    /// Objects allocated during evaluation that do not outlive it
    fn is_temporary(&self, object: ObjectRef) -> bool {
        object.space == ObjectSpace::Frame && object.index >= self.frame_base
    }

    /// Give up the persistent store (to commit it back to the session)
    pub fn into_persistent(self) -> ObjectStore {
        self.persistent
    }
}

/// Where in which submission something happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSite {
    pub submission: SubmissionId,
    pub span: Span,
}

/// Runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivideByZero { site: CodeSite },
    #[error("dereference of null pointer")]
    NullDereference { site: CodeSite },
    #[error("invalid operands to binary expression ('{lhs}' and '{rhs}')")]
    InvalidOperands {
        lhs: String,
        rhs: String,
        site: CodeSite,
    },
    #[error("{msg}")]
    TypeError { msg: String, site: CodeSite },
    #[error("maximum call depth of {limit} exceeded")]
    CallDepthExceeded { limit: usize, site: CodeSite },
    #[error("execution step limit of {limit} exceeded")]
    StepLimitExceeded { limit: u64, site: CodeSite },
    #[error("evaluation interrupted")]
    Interrupted,
    #[error("{source}")]
    Process {
        #[source]
        source: AccessError,
        site: CodeSite,
    },
}

impl RuntimeError {
    /// Where the error happened, if it is tied to code
    pub fn site(&self) -> Option<CodeSite> {
        match self {
            RuntimeError::DivideByZero { site }
            | RuntimeError::NullDereference { site }
            | RuntimeError::InvalidOperands { site, .. }
            | RuntimeError::TypeError { site, .. }
            | RuntimeError::CallDepthExceeded { site, .. }
            | RuntimeError::StepLimitExceeded { site, .. }
            | RuntimeError::Process { site, .. } => Some(*site),
            RuntimeError::Interrupted => None,
        }
    }
}
