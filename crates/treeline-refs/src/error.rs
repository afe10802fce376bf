//! Error types for reference operations.

use thiserror::Error;
use treeline_ledger::LedgerError;
use treeline_types::{NodeId, ReleaseNr};

use crate::pinning::ReleaseProcessPinning;
use crate::types::{Referrer, TrackingMode};

/// Errors that can occur during reference store and pinning operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    /// No tracking record, pin, or node under this identity.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is inconsistent with the target's ledger state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("reference store lock poisoned: {0}")]
    LockPoisoned(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RefError {
    pub(crate) fn missing_reference(referrer: &Referrer) -> Self {
        RefError::NotFound(format!("reference held by {referrer}"))
    }
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;

/// A graph model process that cannot be pinned to a release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnpinnableProcess {
    pub referrer: Referrer,
    pub target: NodeId,
    pub tracking: TrackingMode,
}

/// Why a graph model is not ready to be released.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleasePrepError {
    /// Only graph models and forecast sheets can be released.
    #[error("node {node} of this kind cannot be released")]
    NotReleasable { node: NodeId },

    /// Some processes follow a moving target that has no release to pin.
    #[error("{} process(es) of {node} cannot be pinned", processes.len())]
    NotPinnable {
        node: NodeId,
        processes: Vec<UnpinnableProcess>,
    },

    /// Some latest-release processes lack a pinning decision.
    #[error("{} process(es) of {node} need a pinning decision", suggestions.len())]
    NeedsPinning {
        node: NodeId,
        suggestions: Vec<ReleaseProcessPinning>,
    },

    /// A decision pins to a release that does not exist.
    #[error("pin for {process} references missing release {release_nr} of {model}")]
    InvalidPin {
        process: String,
        model: NodeId,
        release_nr: ReleaseNr,
    },

    #[error(transparent)]
    Store(#[from] RefError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
