use crate::language::ast::{Expr, NodeId, Stmt};
use crate::language::span::Span;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;
pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no applicable overload of `{name}` accepts {argc} argument(s)")]
    MissingMethod { name: String, argc: usize },
    #[error("`{type_name}` has no member `{name}`")]
    MissingMember { name: String, type_name: String },
    #[error("`{type_name}` has no indexer accepting {argc} argument(s)")]
    MissingIndexer { type_name: String, argc: usize },
    #[error("null reference: {context}")]
    NullReference { context: String },
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
    #[error("arguments of `{name}` are not convertible: {message}")]
    ArgumentMismatch { name: String, message: String },
    #[error("no implicit conversion from `{from}` to `{to}`")]
    InvalidCast { from: String, to: String },
    #[error("`{name}` is already declared in this scope")]
    DuplicateDeclaration { name: String },
    #[error("uncaught script exception: {value}")]
    Thrown { value: String },
}

/// One entry of the node chain an error unwound through, innermost first.
#[derive(Clone, Copy, Debug)]
pub struct TraceEntry {
    pub node: NodeId,
    pub kind: &'static str,
    pub span: Span,
}

/// A runtime error plus the chain of syntax nodes being evaluated when it
/// occurred, so an embedder can render a trace without a call stack.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct EvalError {
    pub error: RuntimeError,
    pub trace: Vec<TraceEntry>,
}

impl EvalError {
    pub fn with_expr(mut self, expr: &Expr) -> Self {
        self.trace.push(TraceEntry {
            node: expr.id,
            kind: expr.kind_name(),
            span: expr.span,
        });
        self
    }

    pub fn with_stmt(mut self, stmt: &Stmt) -> Self {
        self.trace.push(TraceEntry {
            node: stmt.id,
            kind: stmt.kind_name(),
            span: stmt.span,
        });
        self
    }

    pub fn innermost(&self) -> Option<&TraceEntry> {
        self.trace.first()
    }
}

impl From<RuntimeError> for EvalError {
    fn from(error: RuntimeError) -> Self {
        Self {
            error,
            trace: Vec::new(),
        }
    }
}
