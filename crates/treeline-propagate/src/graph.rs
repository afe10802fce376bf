//! The driver's view of persistence.

use treeline_refs::{ReferenceStore, Referrer, StoredReference, TrackingUpdate, TreeNodeReferenceTracking};
use treeline_types::{NodeId, TreeNodeInfo};

use crate::error::PropagateResult;

/// Everything the [`PropagationDriver`](crate::PropagationDriver) needs from
/// storage.
pub trait ReferenceGraph: Send + Sync {
    /// All references whose target is `target`.
    fn references_to(&self, target: &NodeId) -> PropagateResult<Vec<StoredReference>>;

    /// Persist `update` on the record held by `referrer`.
    fn apply_update(
        &self,
        referrer: &Referrer,
        update: TrackingUpdate,
    ) -> PropagateResult<TreeNodeReferenceTracking>;

    /// Called once per pass for each node whose references changed.
    ///
    /// Returns the owner's fresh info if the change advanced it (so references
    /// to the owner must be re-resolved), or `None` if the change does not
    /// affect anything downstream.
    fn advance_owner(&self, owner: &NodeId) -> PropagateResult<Option<TreeNodeInfo>>;
}

/// A [`ReferenceGraph`] over a bare [`ReferenceStore`].
///
/// Updated records never advance their owners, so a pass stops after the
/// direct references of the advanced node.
pub struct StoreGraph<S> {
    store: S,
}

impl<S: ReferenceStore> StoreGraph<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ReferenceStore> ReferenceGraph for StoreGraph<S> {
    fn references_to(&self, target: &NodeId) -> PropagateResult<Vec<StoredReference>> {
        Ok(self.store.list_references_to(target)?)
    }

    fn apply_update(
        &self,
        referrer: &Referrer,
        update: TrackingUpdate,
    ) -> PropagateResult<TreeNodeReferenceTracking> {
        Ok(self.store.apply_update(referrer, update)?)
    }

    fn advance_owner(&self, _owner: &NodeId) -> PropagateResult<Option<TreeNodeInfo>> {
        Ok(None)
    }
}
