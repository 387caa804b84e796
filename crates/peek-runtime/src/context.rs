//! Evaluation context
//!
//! What the evaluator can see at the paused point: lexical scope frames,
//! the objects they refer to, and the chain of enclosing objects (closure
//! objects of nested lambdas and the class object behind `this`). The
//! process collaborator builds one per submission; the evaluator works on a
//! copy and never writes it back.

use crate::value::{Binding, ObjectRef, ObjectStore};

/// One lexical scope frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeFrame {
    /// Descriptive name of the frame (function, block or lambda)
    pub name: String,
    pub bindings: Vec<(String, Binding)>,
}

impl ScopeFrame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    pub fn with_binding(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.bindings.push((name.into(), binding));
        self
    }

    /// Index of the last binding with this name (later bindings shadow earlier ones)
    pub fn position(&self, name: &str) -> Option<usize> {
        self.bindings.iter().rposition(|(n, _)| n == name)
    }
}

/// How an enclosing object relates to the paused code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnclosingKind {
    /// Closure object of a lambda; its fields are the captures
    Closure,
    /// Class object; `this` points at it
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnclosingObject {
    pub object: ObjectRef,
    pub kind: EnclosingKind,
}

/// Paused-program view handed to one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    /// Lexical scopes, outermost first
    pub scopes: Vec<ScopeFrame>,
    pub objects: ObjectStore,
    /// Enclosing objects, innermost first
    pub enclosing: Vec<EnclosingObject>,
    pub source_locations_enabled: bool,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            objects: ObjectStore::new(),
            enclosing: Vec::new(),
            source_locations_enabled: true,
        }
    }
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Innermost binding of `name`, as (frame index, binding index)
    pub fn find_local(&self, name: &str) -> Option<(usize, usize)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(frame, scope)| scope.position(name).map(|index| (frame, index)))
    }

    pub fn binding(&self, frame: usize, index: usize) -> Option<&Binding> {
        self.scopes
            .get(frame)
            .and_then(|scope| scope.bindings.get(index))
            .map(|(_, binding)| binding)
    }

    pub fn binding_mut(&mut self, frame: usize, index: usize) -> Option<&mut Binding> {
        self.scopes
            .get_mut(frame)
            .and_then(|scope| scope.bindings.get_mut(index))
            .map(|(_, binding)| binding)
    }

    /// The object `this` refers to: the innermost class object, skipping closures
    pub fn this_object(&self) -> Option<ObjectRef> {
        self.enclosing
            .iter()
            .find(|e| e.kind == EnclosingKind::Class)
            .map(|e| e.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use crate::value::Value;

    fn int(v: i64) -> Binding {
        Binding::new(Type::int(), Value::int(v))
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let context = EvaluationContext {
            scopes: vec![
                ScopeFrame::new("main").with_binding("x", int(1)),
                ScopeFrame::new("block").with_binding("x", int(2)),
            ],
            ..EvaluationContext::default()
        };
        assert_eq!(context.find_local("x"), Some((1, 0)));
        assert_eq!(context.binding(1, 0), Some(&int(2)));
        assert_eq!(context.find_local("y"), None);
    }

    #[test]
    fn test_this_skips_closures() {
        let context = EvaluationContext {
            enclosing: vec![
                EnclosingObject {
                    object: ObjectRef::frame(2),
                    kind: EnclosingKind::Closure,
                },
                EnclosingObject {
                    object: ObjectRef::frame(1),
                    kind: EnclosingKind::Closure,
                },
                EnclosingObject {
                    object: ObjectRef::frame(0),
                    kind: EnclosingKind::Class,
                },
            ],
            ..EvaluationContext::default()
        };
        assert_eq!(context.this_object(), Some(ObjectRef::frame(0)));
    }

    #[test]
    fn test_no_class_object() {
        assert_eq!(EvaluationContext::new().this_object(), None);
        assert!(EvaluationContext::new().source_locations_enabled);
    }
}
