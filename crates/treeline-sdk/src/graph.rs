//! Ledger-backed reference graph.

use std::sync::Arc;

use tracing::debug;
use treeline_ledger::{InMemoryLedger, InfoSource, NodeCatalog, VersionLedger, VersionPayload};
use treeline_propagate::{PropagateResult, ReferenceGraph};
use treeline_refs::{
    InMemoryReferenceStore, ReferenceStore, Referrer, StoredReference, TrackingUpdate,
    TreeNodeReferenceTracking,
};
use treeline_types::{NodeId, Owner, TreeNodeInfo};

/// Owner recorded on versions saved by propagation.
pub fn propagation_owner() -> Owner {
    Owner::new("treeline", "reference propagation")
}

/// [`ReferenceGraph`] over the engine's ledger and reference store.
///
/// With cascading enabled, a registered tree node whose references changed
/// saves a new version, which makes it an advanced node for the rest of the
/// pass. Referrers that are not registered tree nodes never advance.
pub struct LedgerGraph {
    ledger: Arc<InMemoryLedger>,
    references: Arc<InMemoryReferenceStore>,
    cascade: bool,
}

impl LedgerGraph {
    pub fn new(
        ledger: Arc<InMemoryLedger>,
        references: Arc<InMemoryReferenceStore>,
        cascade: bool,
    ) -> Self {
        Self {
            ledger,
            references,
            cascade,
        }
    }
}

impl ReferenceGraph for LedgerGraph {
    fn references_to(&self, target: &NodeId) -> PropagateResult<Vec<StoredReference>> {
        Ok(self.references.list_references_to(target)?)
    }

    fn apply_update(
        &self,
        referrer: &Referrer,
        update: TrackingUpdate,
    ) -> PropagateResult<TreeNodeReferenceTracking> {
        Ok(self.references.apply_update(referrer, update)?)
    }

    fn advance_owner(&self, owner: &NodeId) -> PropagateResult<Option<TreeNodeInfo>> {
        if !self.cascade {
            return Ok(None);
        }
        let Some(node) = self.ledger.node(owner)? else {
            return Ok(None);
        };

        let payload = VersionPayload::new(
            propagation_owner(),
            "tracked references updated",
            node.node_type.is_releasable(),
        );
        let version = self.ledger.record_version(owner, &payload)?;
        debug!(node = %owner, version = %version.version_nr, "saved version after reference update");
        Ok(Some(self.ledger.load_info(owner)?))
    }
}
