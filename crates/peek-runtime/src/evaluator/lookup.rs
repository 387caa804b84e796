//! Name and type lookup outside expression-local scopes
//!
//! Both the semantic pass and the interpreter resolve identifiers through
//! [`Lookup::resolve`], so the two always agree on what a name means:
//! paused-frame scopes (innermost first), then the enclosing object chain
//! (innermost first; fields and bases of each object, methods of class
//! objects), then persistent declarations of earlier submissions, then
//! debug information.

use crate::ast::{RecordKind, TypeRef, TypeSpec};
use crate::context::{EnclosingKind, EvaluationContext};
use crate::diagnostic::SourceLocation;
use crate::persistent::{PersistentEnum, PersistentFunction, PersistentRecord, PersistentScope};
use crate::provider::{DebugInfoProvider, DeclId, ExternalKind, FunctionSig};
use crate::types::Type;
use crate::value::{Heap, ObjectRef};
use std::collections::HashMap;

/// Base classes nested deeper than this are ignored
const MAX_BASE_DEPTH: usize = 16;

/// Records and enums declared inside statement bodies
#[derive(Debug, Clone, Default)]
pub struct LocalTypes {
    records: HashMap<String, PersistentRecord>,
    enums: HashMap<String, PersistentEnum>,
}

impl LocalTypes {
    pub fn define_record(&mut self, name: impl Into<String>, record: PersistentRecord) {
        self.records.insert(name.into(), record);
    }

    pub fn define_enum(&mut self, name: impl Into<String>, def: PersistentEnum) {
        self.enums.insert(name.into(), def);
    }

    fn enumerator(&self, name: &str) -> Option<(String, i64)> {
        self.enums
            .iter()
            .filter(|(_, e)| !e.scoped)
            .find_map(|(enum_name, e)| {
                e.enumerators
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| (enum_name.clone(), *v))
            })
    }
}

/// A method found on a record type or one of its bases
#[derive(Debug, Clone, PartialEq)]
pub(super) struct MethodRef {
    /// Type that declares the method
    pub owner_type: String,
    pub name: String,
    pub signature: FunctionSig,
    /// Debug-information record the method belongs to
    pub decl: Option<DeclId>,
}

impl MethodRef {
    /// Name the process collaborator knows the method by
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.owner_type, self.name)
    }
}

/// What an identifier denotes
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Resolution {
    /// Binding in a paused-frame scope
    Context { frame: usize, index: usize, ty: Type },
    /// Field of an enclosing object (or one of its bases)
    Member { object: ObjectRef, index: usize, ty: Type },
    /// Method of an enclosing class object
    Method { receiver: ObjectRef, method: MethodRef },
    Persistent { ty: Type },
    Function(PersistentFunction),
    Enumerator { enum_name: String, value: i64 },
    /// Global variable known from debug information
    Global { ty: Type },
    ExternalFunction { id: DeclId, signature: FunctionSig },
}

/// Layout of a record type, wherever it was declared
#[derive(Debug, Clone, PartialEq)]
pub(super) struct RecordShape {
    pub kind: RecordKind,
    pub fields: Vec<(String, Type)>,
    pub bases: Vec<String>,
    pub methods: Vec<(String, FunctionSig)>,
    /// False for a record that is only forward declared
    pub complete: bool,
    pub decl: Option<DeclId>,
    pub location: Option<SourceLocation>,
}

/// Read-only view of everything a name can resolve to
pub(super) struct Lookup<'a> {
    pub context: &'a EvaluationContext,
    pub heap: &'a Heap,
    pub persistent: &'a PersistentScope,
    pub local_types: &'a LocalTypes,
    pub debug_info: &'a dyn DebugInfoProvider,
}

impl<'a> Lookup<'a> {
    /// Resolve `name`; `frame_visible` is false inside functions declared by
    /// submissions, which cannot see the paused frame
    pub fn resolve(&self, name: &str, frame_visible: bool) -> Option<Resolution> {
        if frame_visible {
            if let Some((frame, index)) = self.context.find_local(name) {
                let ty = self
                    .context
                    .binding(frame, index)
                    .map(|b| b.ty.clone())
                    .unwrap_or(Type::Unknown);
                tracing::trace!(name, frame, "resolved in frame scope");
                return Some(Resolution::Context { frame, index, ty });
            }

            for (depth, enclosing) in self.context.enclosing.iter().enumerate() {
                if let Some((object, index)) = self.heap.find_field(enclosing.object, name) {
                    let ty = self
                        .heap
                        .get(object)
                        .and_then(|o| o.fields.get(index))
                        .map(|f| f.binding.ty.clone())
                        .unwrap_or(Type::Unknown);
                    tracing::trace!(name, depth, "resolved in enclosing object");
                    return Some(Resolution::Member { object, index, ty });
                }
                if enclosing.kind == EnclosingKind::Class {
                    let dynamic_type = self.heap.get(enclosing.object).map(|o| o.type_name.clone());
                    if let Some(method) = dynamic_type.and_then(|t| self.method(&t, name)) {
                        tracing::trace!(name, depth, "resolved as method of enclosing class");
                        return Some(Resolution::Method {
                            receiver: enclosing.object,
                            method,
                        });
                    }
                }
            }
        }

        if let Some(variable) = self.persistent.variable(name) {
            tracing::trace!(name, "resolved as persistent variable");
            return Some(Resolution::Persistent {
                ty: variable.binding.ty.clone(),
            });
        }
        if let Some(function) = self.persistent.function(name) {
            tracing::trace!(name, "resolved as persistent function");
            return Some(Resolution::Function(function.clone()));
        }
        let enumerator = self.local_types.enumerator(name).or_else(|| {
            self.persistent
                .enumerator(name)
                .map(|(enum_name, value)| (enum_name.to_string(), value))
        });
        if let Some((enum_name, value)) = enumerator {
            return Some(Resolution::Enumerator { enum_name, value });
        }

        let decl = self.debug_info.lookup(name)?;
        tracing::trace!(name, id = decl.id.0, "resolved from debug information");
        match decl.kind {
            ExternalKind::Variable { ty } => Some(Resolution::Global { ty }),
            ExternalKind::Function { signature } => Some(Resolution::ExternalFunction {
                id: decl.id,
                signature,
            }),
            ExternalKind::Enumerator { enum_name, value } => {
                Some(Resolution::Enumerator { enum_name, value })
            }
            ExternalKind::Record { .. } | ExternalKind::Enum { .. } => None,
        }
    }

    /// Layout of record `name`
    pub fn record_shape(&self, name: &str) -> Option<RecordShape> {
        if let Some(record) = self
            .local_types
            .records
            .get(name)
            .or_else(|| self.persistent.record(name))
        {
            return Some(RecordShape {
                kind: record.kind,
                fields: record.fields.clone().unwrap_or_default(),
                bases: Vec::new(),
                methods: Vec::new(),
                complete: record.fields.is_some(),
                decl: None,
                location: Some(record.location.clone()),
            });
        }

        let decl = self.debug_info.lookup_type(name)?;
        match decl.kind {
            ExternalKind::Record {
                kind,
                fields,
                methods,
                bases,
            } => Some(RecordShape {
                kind,
                fields,
                bases,
                methods,
                complete: true,
                decl: Some(decl.id),
                location: None,
            }),
            _ => None,
        }
    }

    /// Enumerators of enum `name`, with whether it is scoped
    pub fn enum_shape(&self, name: &str) -> Option<(bool, Vec<(String, i64)>)> {
        if let Some(def) = self
            .local_types
            .enums
            .get(name)
            .or_else(|| self.persistent.enum_def(name))
        {
            return Some((def.scoped, def.enumerators.clone()));
        }
        match self.debug_info.lookup_type(name)?.kind {
            ExternalKind::Enum {
                scoped,
                enumerators,
            } => Some((scoped, enumerators)),
            _ => None,
        }
    }

    /// Name of the enumerator of `enum_name` with `value`
    pub fn enumerator_name(&self, enum_name: &str, value: i64) -> Option<String> {
        let (_, enumerators) = self.enum_shape(enum_name)?;
        enumerators
            .into_iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n)
    }

    /// Type denoted by a type name
    pub fn named_type(&self, name: &str) -> Option<Type> {
        if self.local_types.records.contains_key(name) || self.persistent.record(name).is_some() {
            return Some(Type::Record(name.to_string()));
        }
        if self.local_types.enums.contains_key(name) || self.persistent.enum_def(name).is_some() {
            return Some(Type::Enum(name.to_string()));
        }
        match self.debug_info.lookup_type(name)?.kind {
            ExternalKind::Record { .. } => Some(Type::Record(name.to_string())),
            ExternalKind::Enum { .. } => Some(Type::Enum(name.to_string())),
            _ => None,
        }
    }

    /// Resolve a written type; `auto` resolves to `Unknown`
    pub fn type_of(&self, type_ref: &TypeRef) -> Option<Type> {
        let mut ty = match &type_ref.spec {
            TypeSpec::Void => Type::Void,
            TypeSpec::Bool => Type::Bool,
            TypeSpec::Auto => Type::Unknown,
            TypeSpec::Int(kind) => Type::Int(*kind),
            TypeSpec::Float(kind) => Type::Float(*kind),
            TypeSpec::Named(id) => self.named_type(&id.name)?,
        };
        for _ in 0..type_ref.pointer_depth {
            ty = Type::pointer_to(ty);
        }
        Some(ty)
    }

    /// Type of field `field` of record `record`, searching bases depth first
    pub fn field_type(&self, record: &str, field: &str) -> Option<Type> {
        self.field_type_at(record, field, 0)
    }

    fn field_type_at(&self, record: &str, field: &str, depth: usize) -> Option<Type> {
        if depth > MAX_BASE_DEPTH {
            return None;
        }
        let shape = self.record_shape(record)?;
        if let Some((_, ty)) = shape.fields.iter().find(|(n, _)| n == field) {
            return Some(ty.clone());
        }
        shape
            .bases
            .iter()
            .find_map(|base| self.field_type_at(base, field, depth + 1))
    }

    /// Method `name` of record `record`: the type itself first, then its bases
    pub fn method(&self, record: &str, name: &str) -> Option<MethodRef> {
        self.method_at(record, name, 0)
    }

    fn method_at(&self, record: &str, name: &str, depth: usize) -> Option<MethodRef> {
        if depth > MAX_BASE_DEPTH {
            return None;
        }
        let shape = self.record_shape(record)?;
        if let Some((_, signature)) = shape.methods.iter().find(|(n, _)| n == name) {
            return Some(MethodRef {
                owner_type: record.to_string(),
                name: name.to_string(),
                signature: signature.clone(),
                decl: shape.decl,
            });
        }
        shape
            .bases
            .iter()
            .find_map(|base| self.method_at(base, name, depth + 1))
    }
}
