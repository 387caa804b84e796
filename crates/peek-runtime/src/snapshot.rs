//! Frame snapshots
//!
//! A [`FrameSnapshot`] is a paused program described in JSON: its scope
//! frames, objects, enclosing-object chain, globals, functions, types and
//! source files. It stands in for a live process and its debug information,
//! which is what the command-line front-end and the integration tests
//! evaluate against.
//!
//! ```json
//! {
//!   "scopes": [{ "name": "main", "variables": [{ "name": "x", "type": "int", "value": 3 }] }],
//!   "objects": [{ "type": "Point", "fields": [{ "name": "x", "type": "int", "value": 1 }] }],
//!   "enclosing": [{ "object": 0, "kind": "class" }],
//!   "types": [{ "name": "Point", "kind": "struct", "fields": [{ "name": "x", "type": "int" }] }]
//! }
//! ```
//!
//! Values are JSON numbers, booleans, one-character strings (for `char`),
//! enumerator names, `null` (null pointer), `{"object": n}` (record stored
//! at index `n` of `objects`) or `{"pointer": n}`.

use crate::ast::RecordKind;
use crate::context::{EnclosingKind, EnclosingObject, EvaluationContext, ScopeFrame};
use crate::position::DebugInfoLocation;
use crate::provider::{
    AccessError, DebugInfoProvider, DeclId, ExternalDecl, ExternalKind, FunctionSig, ProcessAccessor,
};
use crate::types::{FloatKind, IntKind, Type};
use crate::value::{Binding, Object, ObjectRef, ObjectStore, Value};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while loading a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("'{owner}' refers to object {index}, but the snapshot has {count} objects")]
    UnknownObject {
        owner: String,
        index: usize,
        count: usize,
    },

    #[error("invalid value for '{name}' of type '{ty}': {value}")]
    InvalidValue {
        name: String,
        ty: String,
        value: String,
    },
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSnapshot {
    #[serde(default = "default_true")]
    source_locations: bool,
    #[serde(default)]
    scopes: Vec<RawScope>,
    #[serde(default)]
    objects: Vec<RawObject>,
    #[serde(default)]
    enclosing: Vec<RawEnclosing>,
    #[serde(default)]
    globals: Vec<RawVariable>,
    #[serde(default)]
    functions: Vec<RawFunction>,
    #[serde(default)]
    types: Vec<RawType>,
    #[serde(default)]
    sources: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawScope {
    name: String,
    #[serde(default)]
    variables: Vec<RawVariable>,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(flatten)]
    location: Option<DebugInfoLocation>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    fields: Vec<RawVariable>,
    #[serde(default)]
    bases: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawEnclosingKind {
    Closure,
    Class,
}

#[derive(Debug, Deserialize)]
struct RawEnclosing {
    object: usize,
    kind: RawEnclosingKind,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: String,
    #[serde(rename = "return", default = "void_name")]
    return_type: String,
    #[serde(default)]
    params: Vec<String>,
    /// Canned result returned when the function is called
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(flatten)]
    location: Option<DebugInfoLocation>,
}

fn void_name() -> String {
    "void".to_string()
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawTypeKind {
    Struct,
    Class,
    Enum,
}

#[derive(Debug, Deserialize)]
struct RawType {
    name: String,
    kind: RawTypeKind,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    methods: Vec<RawFunction>,
    #[serde(default)]
    bases: Vec<String>,
    #[serde(default)]
    scoped: bool,
    #[serde(default)]
    enumerators: Vec<(String, i64)>,
    #[serde(flatten)]
    location: Option<DebugInfoLocation>,
}

/// A declaration with its debug-information location
#[derive(Debug, Clone)]
struct Entry {
    decl: ExternalDecl,
    location: Option<DebugInfoLocation>,
}

/// Paused program loaded from JSON
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    context: EvaluationContext,
    globals: HashMap<String, Binding>,
    /// Canned call results, keyed by (qualified) function name
    results: HashMap<String, Binding>,
    values: Vec<Entry>,
    types: Vec<Entry>,
    sources: HashMap<String, String>,
}

impl FrameSnapshot {
    pub fn from_path(path: &Path) -> SnapshotResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> SnapshotResult<Self> {
        let raw: RawSnapshot = serde_json::from_str(text)?;
        let snapshot = Decoder::new(&raw).decode()?;
        tracing::debug!(
            scopes = snapshot.context.scopes.len(),
            objects = snapshot.context.objects.len(),
            declarations = snapshot.values.len() + snapshot.types.len(),
            "loaded frame snapshot"
        );
        Ok(snapshot)
    }

    /// A snapshot of an empty frame with no debug information
    pub fn empty() -> Self {
        Self {
            context: EvaluationContext::default(),
            globals: HashMap::new(),
            results: HashMap::new(),
            values: Vec::new(),
            types: Vec::new(),
            sources: HashMap::new(),
        }
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    fn entry(&self, id: DeclId) -> Option<&Entry> {
        self.values
            .iter()
            .chain(&self.types)
            .find(|entry| entry.decl.id == id)
    }
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl DebugInfoProvider for FrameSnapshot {
    fn lookup(&self, name: &str) -> Option<ExternalDecl> {
        self.values
            .iter()
            .find(|entry| entry.decl.name == name)
            .map(|entry| entry.decl.clone())
    }

    fn lookup_type(&self, name: &str) -> Option<ExternalDecl> {
        self.types
            .iter()
            .find(|entry| entry.decl.name == name)
            .map(|entry| entry.decl.clone())
    }

    fn location_of(&self, decl: DeclId) -> Option<DebugInfoLocation> {
        self.entry(decl).and_then(|entry| entry.location.clone())
    }

    fn source_line(&self, file: &str, line: u32) -> Option<String> {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        self.sources
            .get(file)
            .and_then(|text| text.lines().nth(index))
            .map(str::to_string)
    }
}

impl ProcessAccessor for FrameSnapshot {
    fn read_scope(&self) -> Result<EvaluationContext, AccessError> {
        Ok(self.context.clone())
    }

    fn read_global(&self, name: &str) -> Result<Binding, AccessError> {
        self.globals
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::VariableUnavailable(name.to_string()))
    }

    fn call_function(&self, name: &str, _args: &[Binding]) -> Result<Binding, AccessError> {
        self.results
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::CallFailed {
                name: name.to_string(),
                reason: "the snapshot records no result for it".to_string(),
            })
    }
}

/// Turns the raw JSON form into runtime values
struct Decoder<'r> {
    raw: &'r RawSnapshot,
    next_id: u32,
}

impl<'r> Decoder<'r> {
    fn new(raw: &'r RawSnapshot) -> Self {
        Self { raw, next_id: 0 }
    }

    fn next_id(&mut self) -> DeclId {
        let id = DeclId(self.next_id);
        self.next_id += 1;
        id
    }

    fn decode(mut self) -> SnapshotResult<FrameSnapshot> {
        let raw = self.raw;
        let mut objects = ObjectStore::new();
        for object in &raw.objects {
            let mut decoded = Object::new(object.ty.clone());
            for field in &object.fields {
                decoded = decoded.with_field(field.name.clone(), self.binding(field)?);
            }
            for base in &object.bases {
                decoded.bases.push(self.object_ref(&object.ty, *base)?);
            }
            objects.push(decoded);
        }

        let scopes = raw
            .scopes
            .iter()
            .map(|scope| {
                scope.variables.iter().try_fold(
                    ScopeFrame::new(scope.name.clone()),
                    |frame, var| -> SnapshotResult<ScopeFrame> {
                        Ok(frame.with_binding(var.name.clone(), self.binding(var)?))
                    },
                )
            })
            .collect::<SnapshotResult<Vec<_>>>()?;

        let enclosing = raw
            .enclosing
            .iter()
            .map(|e| -> SnapshotResult<EnclosingObject> {
                Ok(EnclosingObject {
                    object: self.object_ref("enclosing", e.object)?,
                    kind: match e.kind {
                        RawEnclosingKind::Closure => EnclosingKind::Closure,
                        RawEnclosingKind::Class => EnclosingKind::Class,
                    },
                })
            })
            .collect::<SnapshotResult<Vec<_>>>()?;

        let mut values = Vec::new();
        let mut globals = HashMap::new();
        let mut results = HashMap::new();
        for global in &raw.globals {
            let binding = self.binding(global)?;
            values.push(Entry {
                decl: ExternalDecl {
                    id: self.next_id(),
                    name: global.name.clone(),
                    kind: ExternalKind::Variable {
                        ty: binding.ty.clone(),
                    },
                },
                location: global.location.clone(),
            });
            globals.insert(global.name.clone(), binding);
        }
        for function in &raw.functions {
            let signature = self.signature(function);
            if let Some(result) = self.result(&function.name, function, &signature)? {
                results.insert(function.name.clone(), result);
            }
            values.push(Entry {
                decl: ExternalDecl {
                    id: self.next_id(),
                    name: function.name.clone(),
                    kind: ExternalKind::Function { signature },
                },
                location: function.location.clone(),
            });
        }

        let mut types = Vec::new();
        for ty in &raw.types {
            let id = self.next_id();
            let kind = match ty.kind {
                RawTypeKind::Enum => {
                    if !ty.scoped {
                        for (name, value) in &ty.enumerators {
                            values.push(Entry {
                                decl: ExternalDecl {
                                    id,
                                    name: name.clone(),
                                    kind: ExternalKind::Enumerator {
                                        enum_name: ty.name.clone(),
                                        value: *value,
                                    },
                                },
                                location: ty.location.clone(),
                            });
                        }
                    }
                    ExternalKind::Enum {
                        scoped: ty.scoped,
                        enumerators: ty.enumerators.clone(),
                    }
                }
                RawTypeKind::Struct | RawTypeKind::Class => {
                    let mut methods = Vec::new();
                    for method in &ty.methods {
                        let signature = self.signature(method);
                        let qualified = format!("{}::{}", ty.name, method.name);
                        if let Some(result) = self.result(&qualified, method, &signature)? {
                            results.insert(qualified, result);
                        }
                        methods.push((method.name.clone(), signature));
                    }
                    ExternalKind::Record {
                        kind: match ty.kind {
                            RawTypeKind::Class => RecordKind::Class,
                            _ => RecordKind::Struct,
                        },
                        fields: ty
                            .fields
                            .iter()
                            .map(|f| (f.name.clone(), self.parse_type(&f.ty)))
                            .collect(),
                        methods,
                        bases: ty.bases.clone(),
                    }
                }
            };
            types.push(Entry {
                decl: ExternalDecl {
                    id,
                    name: ty.name.clone(),
                    kind,
                },
                location: ty.location.clone(),
            });
        }

        Ok(FrameSnapshot {
            context: EvaluationContext {
                scopes,
                objects,
                enclosing,
                source_locations_enabled: raw.source_locations,
            },
            globals,
            results,
            values,
            types,
            sources: raw.sources.clone(),
        })
    }

    fn is_enum(&self, name: &str) -> bool {
        self.raw
            .types
            .iter()
            .any(|t| t.name == name && matches!(t.kind, RawTypeKind::Enum))
    }

    fn parse_type(&self, name: &str) -> Type {
        Type::from_c_name(name, |n| self.is_enum(n))
    }

    fn signature(&self, function: &RawFunction) -> FunctionSig {
        FunctionSig {
            return_type: self.parse_type(&function.return_type),
            params: function.params.iter().map(|p| self.parse_type(p)).collect(),
        }
    }

    fn result(
        &self,
        name: &str,
        function: &RawFunction,
        signature: &FunctionSig,
    ) -> SnapshotResult<Option<Binding>> {
        match &function.result {
            None if signature.return_type == Type::Void => {
                Ok(Some(Binding::new(Type::Void, Value::Void)))
            }
            None => Ok(None),
            Some(json) => {
                let value = self.value(name, &signature.return_type, json)?;
                Ok(Some(Binding::new(signature.return_type.clone(), value)))
            }
        }
    }

    fn object_ref(&self, owner: &str, index: usize) -> SnapshotResult<ObjectRef> {
        let count = self.raw.objects.len();
        if index < count {
            Ok(ObjectRef::frame(index))
        } else {
            Err(SnapshotError::UnknownObject {
                owner: owner.to_string(),
                index,
                count,
            })
        }
    }

    fn binding(&self, var: &RawVariable) -> SnapshotResult<Binding> {
        let ty = self.parse_type(&var.ty);
        let value = self.value(&var.name, &ty, &var.value)?;
        Ok(Binding::new(ty, value))
    }

    fn value(&self, name: &str, ty: &Type, json: &serde_json::Value) -> SnapshotResult<Value> {
        use serde_json::Value as Json;

        let invalid = || SnapshotError::InvalidValue {
            name: name.to_string(),
            ty: ty.display_name(),
            value: json.to_string(),
        };

        let value = match (ty, json) {
            (Type::Bool, Json::Bool(b)) => Value::Bool(*b),
            (Type::Int(IntKind::Char), Json::String(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Int(c as i64, IntKind::Char),
                    _ => return Err(invalid()),
                }
            }
            (Type::Int(kind), Json::Number(n)) => {
                let v = n
                    .as_i64()
                    .or_else(|| n.as_u64().map(|u| u as i64))
                    .ok_or_else(invalid)?;
                Value::Int(kind.wrap(v), *kind)
            }
            (Type::Float(kind), Json::Number(n)) => {
                let v = n.as_f64().ok_or_else(invalid)?;
                match kind {
                    FloatKind::Float => Value::Float(f64::from(v as f32), *kind),
                    FloatKind::Double => Value::Float(v, *kind),
                }
            }
            (Type::Enum(enum_name), Json::Number(n)) => Value::Enum {
                type_name: enum_name.clone(),
                value: n.as_i64().ok_or_else(invalid)?,
            },
            (Type::Enum(enum_name), Json::String(enumerator)) => {
                let value = self
                    .raw
                    .types
                    .iter()
                    .filter(|t| &t.name == enum_name)
                    .flat_map(|t| &t.enumerators)
                    .find(|(n, _)| n == enumerator)
                    .map(|(_, v)| *v)
                    .ok_or_else(invalid)?;
                Value::Enum {
                    type_name: enum_name.clone(),
                    value,
                }
            }
            (Type::Pointer(pointee), Json::Null) => Value::Pointer {
                pointee: pointee.as_ref().clone(),
                target: None,
            },
            (Type::Pointer(pointee), Json::Object(map)) => {
                let index = map
                    .get("pointer")
                    .and_then(Json::as_u64)
                    .ok_or_else(invalid)?;
                Value::Pointer {
                    pointee: pointee.as_ref().clone(),
                    target: Some(self.object_ref(name, index as usize)?),
                }
            }
            (Type::Record(type_name), Json::Object(map)) => {
                let index = map
                    .get("object")
                    .and_then(Json::as_u64)
                    .ok_or_else(invalid)?;
                Value::Object {
                    type_name: type_name.clone(),
                    object: self.object_ref(name, index as usize)?,
                }
            }
            (Type::Nullptr, Json::Null) => Value::Nullptr,
            (Type::Void, Json::Null) => Value::Void,
            _ => return Err(invalid()),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SNAPSHOT: &str = r##"{
        "scopes": [
            { "name": "main", "variables": [
                { "name": "count", "type": "int", "value": 3 },
                { "name": "origin", "type": "Point", "value": { "object": 0 } },
                { "name": "p", "type": "Point *", "value": { "pointer": 0 } },
                { "name": "c", "type": "Color", "value": "Green" },
                { "name": "letter", "type": "char", "value": "z" }
            ] }
        ],
        "objects": [
            { "type": "Point", "fields": [
                { "name": "x", "type": "int", "value": 1 },
                { "name": "y", "type": "double", "value": 2.5 }
            ] }
        ],
        "globals": [
            { "name": "g_total", "type": "long", "value": 40, "file": "main.cpp", "line": 2, "column": 6 }
        ],
        "functions": [
            { "name": "answer", "return": "int", "result": 42, "file": "main.cpp", "line": 4 }
        ],
        "types": [
            { "name": "Point", "kind": "struct", "fields": [
                { "name": "x", "type": "int" }, { "name": "y", "type": "double" }
            ] },
            { "name": "Color", "kind": "enum", "enumerators": [["Red", 0], ["Green", 1]] }
        ],
        "sources": { "main.cpp": "#include <cstdio>\nlong g_total = 40;\n" }
    }"##;

    #[test]
    fn test_decodes_scopes_and_objects() {
        let snapshot = FrameSnapshot::from_json(SNAPSHOT).unwrap();
        let context = snapshot.read_scope().unwrap();
        assert_eq!(context.scopes[0].bindings.len(), 5);
        assert_eq!(
            context.binding(0, 0),
            Some(&Binding::new(Type::int(), Value::int(3)))
        );
        assert_eq!(
            context.binding(0, 3).map(|b| &b.value),
            Some(&Value::Enum {
                type_name: "Color".into(),
                value: 1
            })
        );
        assert_eq!(context.objects.get(0).unwrap().fields.len(), 2);
    }

    #[test]
    fn test_debug_info_lookups() {
        let snapshot = FrameSnapshot::from_json(SNAPSHOT).unwrap();
        let global = snapshot.lookup("g_total").unwrap();
        assert_eq!(
            snapshot.location_of(global.id),
            Some(DebugInfoLocation {
                file: "main.cpp".into(),
                line: 2,
                column: 6
            })
        );
        assert!(matches!(
            snapshot.lookup("Green").unwrap().kind,
            ExternalKind::Enumerator { value: 1, .. }
        ));
        assert!(snapshot.lookup("Point").is_none());
        assert!(snapshot.lookup_type("Point").is_some());
        assert_eq!(
            snapshot.source_line("main.cpp", 2).as_deref(),
            Some("long g_total = 40;")
        );
        assert_eq!(snapshot.source_line("main.cpp", 0), None);
    }

    #[test]
    fn test_canned_call_results() {
        let snapshot = FrameSnapshot::from_json(SNAPSHOT).unwrap();
        assert_eq!(
            snapshot.call_function("answer", &[]).unwrap().value,
            Value::int(42)
        );
        assert!(snapshot.call_function("missing", &[]).is_err());
    }

    #[test]
    fn test_rejects_dangling_object_reference() {
        let err = FrameSnapshot::from_json(
            r#"{ "scopes": [{ "name": "f", "variables": [
                { "name": "p", "type": "Point *", "value": { "pointer": 3 } }
            ] }] }"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "'p' refers to object 3, but the snapshot has 0 objects"
        );
    }

    #[test]
    fn test_rejects_mistyped_value() {
        let err = FrameSnapshot::from_json(
            r#"{ "globals": [{ "name": "flag", "type": "bool", "value": 7 }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidValue { .. }));
    }
}
