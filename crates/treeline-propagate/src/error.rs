//! Error types for propagation.

use treeline_ledger::LedgerError;
use treeline_refs::RefError;

/// Errors raised while propagating an advancement.
///
/// Errors tied to a single reference are collected in the
/// [`PropagationReport`](crate::PropagationReport) rather than returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropagateError {
    /// Reference store failure (read, write, listing).
    #[error("reference store error: {0}")]
    Refs(#[from] RefError),

    /// Ledger failure while advancing a referrer.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Any other collaborator failure.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// The advancement queue no longer accepts events.
    #[error("propagation queue is closed")]
    QueueClosed,
}

/// Convenience alias for propagation results.
pub type PropagateResult<T> = Result<T, PropagateError>;
