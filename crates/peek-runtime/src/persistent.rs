//! Persistent declarations
//!
//! Types, functions and variables that outlive the submission that created
//! them: top-level declarations, `$`-prefixed statement-mode variables and
//! the `$N` result variables.

use crate::ast::{FunctionDecl, RecordKind};
use crate::diagnostic::SourceLocation;
use crate::provider::FunctionSig;
use crate::registry::SubmissionId;
use crate::types::Type;
use crate::value::{Binding, ObjectStore};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct PersistentRecord {
    pub kind: RecordKind,
    /// `None` while only forward declared
    pub fields: Option<Vec<(String, Type)>>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistentEnum {
    pub scoped: bool,
    pub enumerators: Vec<(String, i64)>,
    pub location: SourceLocation,
}

/// A function declared by a top-level submission
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentFunction {
    pub submission: SubmissionId,
    pub signature: FunctionSig,
    /// Prototypes have no body; calls then go to the process
    pub decl: Arc<FunctionDecl>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistentVariable {
    pub name: String,
    pub binding: Binding,
    /// Declaration site; result variables have none
    pub location: Option<SourceLocation>,
}

/// Session-wide persistent scope
#[derive(Debug, Clone, Default)]
pub struct PersistentScope {
    records: HashMap<String, PersistentRecord>,
    enums: HashMap<String, PersistentEnum>,
    functions: HashMap<String, PersistentFunction>,
    variables: Vec<PersistentVariable>,
    objects: ObjectStore,
    next_result: u32,
}

impl PersistentScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str) -> Option<&PersistentRecord> {
        self.records.get(name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&PersistentEnum> {
        self.enums.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&PersistentFunction> {
        self.functions.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&PersistentVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut PersistentVariable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    /// Variables in creation order
    pub fn variables(&self) -> impl Iterator<Item = &PersistentVariable> {
        self.variables.iter()
    }

    /// Enumerator of an unscoped persistent enum, as (enum name, value)
    pub fn enumerator(&self, name: &str) -> Option<(&str, i64)> {
        self.enums
            .iter()
            .filter(|(_, e)| !e.scoped)
            .find_map(|(enum_name, e)| {
                e.enumerators
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| (enum_name.as_str(), *v))
            })
    }

    /// Names of all persistent types
    pub fn type_names(&self) -> impl Iterator<Item = &String> {
        self.records.keys().chain(self.enums.keys())
    }

    /// Define or replace a record; a forward declaration never replaces a definition
    pub fn define_record(&mut self, name: impl Into<String>, record: PersistentRecord) {
        let name = name.into();
        if record.fields.is_none() {
            if let Some(existing) = self.records.get(&name) {
                if existing.fields.is_some() && existing.kind == record.kind {
                    return;
                }
            }
        }
        self.records.insert(name, record);
    }

    pub fn define_enum(&mut self, name: impl Into<String>, def: PersistentEnum) {
        self.enums.insert(name.into(), def);
    }

    /// Define or replace a function; a prototype never replaces a definition
    pub fn define_function(&mut self, name: impl Into<String>, function: PersistentFunction) {
        let name = name.into();
        if function.decl.body.is_none() {
            if let Some(existing) = self.functions.get(&name) {
                if existing.decl.body.is_some() {
                    return;
                }
            }
        }
        self.functions.insert(name, function);
    }

    /// Create or overwrite a variable
    pub fn set_variable(&mut self, name: impl Into<String>, binding: Binding, location: Option<SourceLocation>) {
        let name = name.into();
        match self.variable_mut(&name) {
            Some(existing) => {
                existing.binding = binding;
                existing.location = location;
            }
            None => self.variables.push(PersistentVariable {
                name,
                binding,
                location,
            }),
        }
    }

    /// Reserve the next result variable name (`$0`, `$1`, ...)
    pub fn next_result_name(&mut self) -> String {
        let name = format!("${}", self.next_result);
        self.next_result += 1;
        name
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn set_objects(&mut self, objects: ObjectStore) {
        self.objects = objects;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn loc() -> SourceLocation {
        SourceLocation::in_submission(SubmissionId(0), 1, 1)
    }

    #[test]
    fn test_result_names_count_up() {
        let mut scope = PersistentScope::new();
        assert_eq!(scope.next_result_name(), "$0");
        assert_eq!(scope.next_result_name(), "$1");
    }

    #[test]
    fn test_set_variable_overwrites() {
        let mut scope = PersistentScope::new();
        scope.set_variable("$x", Binding::new(Type::int(), Value::int(1)), Some(loc()));
        scope.set_variable("$x", Binding::new(Type::int(), Value::int(2)), Some(loc()));
        assert_eq!(scope.variables().count(), 1);
        assert_eq!(scope.variable("$x").unwrap().binding.value, Value::int(2));
    }

    #[test]
    fn test_forward_declaration_keeps_definition() {
        let mut scope = PersistentScope::new();
        scope.define_record(
            "S",
            PersistentRecord {
                kind: RecordKind::Struct,
                fields: Some(vec![("x".into(), Type::int())]),
                location: loc(),
            },
        );
        scope.define_record(
            "S",
            PersistentRecord {
                kind: RecordKind::Struct,
                fields: None,
                location: loc(),
            },
        );
        assert!(scope.record("S").unwrap().fields.is_some());
    }

    #[test]
    fn test_unscoped_enumerators_visible() {
        let mut scope = PersistentScope::new();
        scope.define_enum(
            "Color",
            PersistentEnum {
                scoped: false,
                enumerators: vec![("Red".into(), 0), ("Green".into(), 5)],
                location: loc(),
            },
        );
        scope.define_enum(
            "Mode",
            PersistentEnum {
                scoped: true,
                enumerators: vec![("Fast".into(), 1)],
                location: loc(),
            },
        );
        assert_eq!(scope.enumerator("Green"), Some(("Color", 5)));
        assert_eq!(scope.enumerator("Fast"), None);
        assert_eq!(scope.type_names().count(), 2);
    }
}
