//! Collaborator interfaces
//!
//! The evaluator does not read process memory or symbol files itself. It
//! consults a [`DebugInfoProvider`] for declarations known from debug
//! information and a [`ProcessAccessor`] for live state.

use crate::ast::RecordKind;
use crate::context::EvaluationContext;
use crate::position::DebugInfoLocation;
use crate::types::Type;
use crate::value::Binding;
use thiserror::Error;

/// Identity of a debug-information declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

/// Parameter and return types of a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSig {
    pub return_type: Type,
    pub params: Vec<Type>,
}

/// What a debug-information declaration is
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalKind {
    Variable {
        ty: Type,
    },
    Function {
        signature: FunctionSig,
    },
    /// Enumerator of an unscoped enum, visible by its bare name
    Enumerator {
        enum_name: String,
        value: i64,
    },
    Record {
        kind: RecordKind,
        fields: Vec<(String, Type)>,
        methods: Vec<(String, FunctionSig)>,
        bases: Vec<String>,
    },
    Enum {
        scoped: bool,
        enumerators: Vec<(String, i64)>,
    },
}

/// A declaration known from debug information
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDecl {
    pub id: DeclId,
    pub name: String,
    pub kind: ExternalKind,
}

/// Symbol and type information of the debugged program
pub trait DebugInfoProvider {
    /// Variable, function or enumerator named `name`
    fn lookup(&self, name: &str) -> Option<ExternalDecl>;

    /// Record or enum type named `name`
    fn lookup_type(&self, name: &str) -> Option<ExternalDecl>;

    /// Where a declaration was written
    fn location_of(&self, decl: DeclId) -> Option<DebugInfoLocation>;

    /// Text of one line of a source file, for quoting in diagnostics
    fn source_line(&self, _file: &str, _line: u32) -> Option<String> {
        None
    }
}

/// Errors reported by the live-process collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("couldn't read the current scope: {0}")]
    ScopeUnavailable(String),
    #[error("couldn't read variable '{0}'")]
    VariableUnavailable(String),
    #[error("couldn't call function '{name}': {reason}")]
    CallFailed { name: String, reason: String },
}

/// Live state of the paused process
///
/// Object references in returned bindings index into the object store of
/// the context returned by [`ProcessAccessor::read_scope`].
pub trait ProcessAccessor {
    /// Snapshot of the paused frame
    fn read_scope(&self) -> Result<EvaluationContext, AccessError>;

    /// Current value of a global variable known from debug information
    fn read_global(&self, name: &str) -> Result<Binding, AccessError>;

    /// Call a function in the process; methods are named `Type::method`
    fn call_function(&self, name: &str, args: &[Binding]) -> Result<Binding, AccessError>;
}

/// Provider with no debug information at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDebugInfo;

impl DebugInfoProvider for NoDebugInfo {
    fn lookup(&self, _name: &str) -> Option<ExternalDecl> {
        None
    }

    fn lookup_type(&self, _name: &str) -> Option<ExternalDecl> {
        None
    }

    fn location_of(&self, _decl: DeclId) -> Option<DebugInfoLocation> {
        None
    }
}

/// Accessor for a process with an empty frame
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyFrame;

impl ProcessAccessor for EmptyFrame {
    fn read_scope(&self) -> Result<EvaluationContext, AccessError> {
        Ok(EvaluationContext::default())
    }

    fn read_global(&self, name: &str) -> Result<Binding, AccessError> {
        Err(AccessError::VariableUnavailable(name.to_string()))
    }

    fn call_function(&self, name: &str, _args: &[Binding]) -> Result<Binding, AccessError> {
        Err(AccessError::CallFailed {
            name: name.to_string(),
            reason: "no process".to_string(),
        })
    }
}
