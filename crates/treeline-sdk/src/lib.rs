//! High-level SDK for Treeline.
//!
//! [`Treeline`] ties the ledgers, the reference store, the pinning store and
//! the propagation driver together. This is the main entry point for
//! applications embedding Treeline.

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod outcome;

pub use config::{EngineConfig, PropagationConfig};
pub use engine::Treeline;
pub use error::{SdkError, SdkResult};
pub use graph::{propagation_owner, LedgerGraph};
pub use outcome::{ReleaseOutcome, VersionOutcome};

// Re-export key types
pub use treeline_ledger::{HistoryEntry, ReleasePayload, ValidationReport, VersionPayload};
pub use treeline_propagate::{AdvancementEvent, PropagationQueue, PropagationReport};
pub use treeline_refs::{
    EffectiveSource, Referrer, ReleasePlan, ReleaseProcessPinning, TrackingMode, TrackingUpdate,
    TreeNodeReferenceTracking,
};
pub use treeline_types::{NodeId, Owner, ProcessId, ReleaseNr, TreeNode, TreeNodeInfo, TreeNodeType, VersionNr};
