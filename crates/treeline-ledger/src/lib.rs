//! Append-only version and release ledgers for Treeline.
//!
//! Every tree node owns two sequences:
//! - versions, numbered 1, 2, 3, ... as content is saved
//! - releases, numbered 1, 2, 3, ... each pinning one releasable version
//!
//! This crate provides:
//! - Record types ([`TreeNodeVersion`], [`TreeNodeRelease`]) and their payloads
//! - `NodeCatalog` / `VersionLedger` / `ReleaseLedger` trait boundaries
//! - `InMemoryLedger` with per-node writer serialization
//! - Projections to [`treeline_types::TreeNodeInfo`] and history views
//! - Stream validation (numbering, release pins, timestamps)

pub mod error;
pub mod memory;
pub mod projection;
pub mod records;
pub mod tags;
pub mod traits;
pub mod validation;

pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use projection::{HistoryEntry, ProjectionBuilder};
pub use records::{ReleasePayload, TreeNodeRelease, TreeNodeVersion, VersionPayload};
pub use tags::validate_release_tag;
pub use traits::{InfoSource, NodeCatalog, ReleaseLedger, VersionLedger};
pub use validation::{StreamValidator, ValidationReport, Violation, ViolationKind};
