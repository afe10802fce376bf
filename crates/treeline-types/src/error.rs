use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("invalid {kind} number: {input:?}")]
    InvalidNumber { kind: &'static str, input: String },

    #[error("unknown tree node type: {0}")]
    UnknownNodeType(String),
}
