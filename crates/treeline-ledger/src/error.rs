use treeline_types::NodeId;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The caller asked for something the ledger state does not allow, such
    /// as releasing a non-releasable or nonexistent version.
    #[error("invalid argument for node {node}: {reason}")]
    InvalidArgument { node: NodeId, reason: String },

    /// An append would break per-node numbering. Per-node serialization
    /// prevents this for regular appends; it surfaces only for imported
    /// records or a bug.
    #[error("invalid ledger state for node {node}: {reason}")]
    InvalidState { node: NodeId, reason: String },

    #[error("tree node not found: {0}")]
    NotFound(NodeId),

    #[error("ledger lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias used throughout the ledger crate.
pub type Result<T> = std::result::Result<T, LedgerError>;
