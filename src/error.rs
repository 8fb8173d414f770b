//! Error kinds reported by the compiler.

use thiserror::Error;

/// Failure to evaluate or lower an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The identifier resolves to neither a node nor a variable in the
    /// active context.
    #[error("unresolved identifier `{0}`")]
    Unresolved(String),

    /// Division by a constant zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// A fatal compilation error. Every kind aborts the run; no output artifact
/// is produced after any of these.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum CompileError {
    /// Either document failed to parse. Carries the rendered snippet.
    #[error("{0}")]
    Syntax(String),

    #[error("duplicate node `{0}`")]
    DuplicateNode(String),

    #[error("`{decl}` refers to unknown node `{node}`")]
    UnresolvedReference { node: String, decl: String },

    #[error("`{context}` must be a compile-time constant: {source}")]
    NonConstant {
        context: String,
        #[source]
        source: EvalError,
    },

    #[error("duplicate istate for node `{0}`")]
    DuplicateStateAssignment(String),

    #[error("node `{node}` has no `{attr}` attribute")]
    MissingAttribute { node: String, attr: String },

    #[error("cannot lower `{context}`: {source}")]
    Lower {
        context: String,
        #[source]
        source: EvalError,
    },
}
