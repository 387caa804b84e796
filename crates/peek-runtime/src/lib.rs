//! Peek Runtime - debugger expression evaluation
//!
//! This library evaluates C-like expressions typed into a debugger against a
//! paused program, including:
//! - A registry of submitted source buffers with stable identities
//! - Mapping of positions in wrapped source back to what the user typed
//! - Parsing, semantic checks and interpretation of submissions
//! - Source-accurate diagnostics with caret highlights
//! - Tracking of declarations across submissions (latest definition wins)

/// Peek runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod ast;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod persistent;
pub mod position;
pub mod provider;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod span;
pub mod token;
pub mod tracker;
pub mod types;
pub mod value;

pub use context::{EnclosingKind, EnclosingObject, EvaluationContext, ScopeFrame};
pub use diagnostic::formatter::{ColorMode, DiagnosticFormatter};
pub use diagnostic::{
    render, sort_diagnostics, Diagnostic, DiagnosticDetail, DiagnosticKind, DiagnosticReport,
    LocationOwner, RenderedDiagnostic, Severity, SourceLocation, DIAG_VERSION,
};
pub use error::{EvalError, EvalResult, ExpressionFailure, EXPRESSION_ERROR_TYPE, GENERIC_ERROR_TYPE};
pub use evaluator::{EvalOptions, EvalOutcome, EvalState, EvalValue, Evaluator, InterruptFlag};
pub use lexer::Lexer;
pub use parser::Parser;
pub use persistent::PersistentScope;
pub use position::{DebugInfoLocation, PositionMapper, WrapperShape};
pub use provider::{
    AccessError, DebugInfoProvider, DeclId, EmptyFrame, ExternalDecl, ExternalKind, FunctionSig,
    NoDebugInfo, ProcessAccessor,
};
pub use registry::{SourceRegistry, Submission, SubmissionId, SubmissionMode};
pub use session::{Session, VariableSummary};
pub use snapshot::{FrameSnapshot, SnapshotError};
pub use span::Span;
pub use token::{Token, TokenKind};
pub use tracker::{DeclKind, DeclarationRecord, DeclarationTracker, PendingDeclarations};
pub use types::Type;
pub use value::{Binding, RuntimeError, Value};
