//! Fatal error taxonomy for the query engine.
//!
//! Every error here is fatal to the query that raised it: operators never
//! catch and suppress, and the runner discards partial results and
//! uncommitted writes when one escapes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cypher syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("planning error: {0}")]
    PlanError(String),

    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    #[error("unknown parameter: ${0}")]
    UnknownParameter(String),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("unsupported temporal accessor '{0}'")]
    UnsupportedTemporalAccessor(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),

    #[error("procedure {name} expects {expected} argument(s), got {got}")]
    ProcedureArity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("non-aggregating expression used in an aggregate context: {0}")]
    NonAggregatingInAggregateContext(String),

    #[error("unknown label or relationship type: {0}")]
    UnknownLabelOrType(String),

    #[error("graph I/O error: {0}")]
    GraphIOError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
