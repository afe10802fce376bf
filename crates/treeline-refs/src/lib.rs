//! Reference tracking for Treeline.
//!
//! A *reference* is held by a referrer (a tree node, or a process inside a
//! graph model) and follows a target tree node under a tracking mode. When the
//! target advances, the resolver decides whether the reference is stale and
//! what it should move to.
//!
//! # Modules
//!
//! - [`types`]: [`TrackingMode`], [`TreeNodeReferenceTracking`], [`TrackingUpdate`], [`Referrer`]
//! - [`resolver`]: The pure [`resolve`] function
//! - [`traits`] / [`memory`]: The [`ReferenceStore`] boundary and its in-memory implementation
//! - [`pinning`]: Process interface pins ([`PinningStore`])
//! - [`selector`]: Tracking mode editing and effective sources
//! - [`release_prep`]: Pinning checks before a graph model release
//! - [`error`]: Error types

pub mod error;
pub mod memory;
pub mod pinning;
pub mod release_prep;
pub mod resolver;
pub mod selector;
pub mod traits;
pub mod types;

pub use error::{RefError, ReleasePrepError, Result, UnpinnableProcess};
pub use memory::InMemoryReferenceStore;
pub use pinning::{InMemoryPinningStore, PinningStore, ReleaseProcessPinning};
pub use release_prep::{AppliedPins, ReleasePlan, ReleasePreparer};
pub use resolver::{resolve, resolve_stored};
pub use selector::{
    available_release_nrs, dependency_token, effective_source, select_fixed,
    select_tracking_mode, EffectiveSource,
};
pub use traits::ReferenceStore;
pub use types::{Referrer, StoredReference, TrackingMode, TrackingUpdate, TreeNodeReferenceTracking};
