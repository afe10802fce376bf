//! Foundation types for Treeline.
//!
//! This crate provides the identity, numbering, and snapshot types shared by
//! every other Treeline crate. Nothing here performs I/O or holds locks.
//!
//! # Key Types
//!
//! - [`NodeId`] / [`ProcessId`]: Identities of tree nodes and processes
//! - [`VersionNr`] / [`ReleaseNr`]: Per-node, strictly increasing numbers
//! - [`RecordId`]: UUID v7 identifier for ledger records
//! - [`TreeNode`] / [`TreeNodeType`]: Structural description of a node
//! - [`TreeNodeInfo`]: Reconciliation-relevant snapshot of a node
//! - [`TemporalAnchor`]: Hybrid Logical Clock timestamp for record ordering

pub mod error;
pub mod ids;
pub mod info;
pub mod node;
pub mod temporal;

pub use error::TypeError;
pub use ids::{NodeId, ProcessId, RecordId, ReleaseNr, VersionNr};
pub use info::TreeNodeInfo;
pub use node::{Owner, TreeNode, TreeNodeType};
pub use temporal::TemporalAnchor;
