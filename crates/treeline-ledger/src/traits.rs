use treeline_types::{NodeId, ReleaseNr, TreeNode, TreeNodeInfo, VersionNr};

use crate::error::Result;
use crate::records::{ReleasePayload, TreeNodeRelease, TreeNodeVersion, VersionPayload};

/// Structural registry of tree nodes known to a ledger.
pub trait NodeCatalog: Send + Sync {
    /// Register a node. Registering the same id twice is an invalid argument.
    fn register_node(&self, node: TreeNode) -> Result<()>;

    fn node(&self, id: &NodeId) -> Result<Option<TreeNode>>;

    /// Replace the graph models that `id`'s processes depend on.
    fn set_process_dependencies(&self, id: &NodeId, deps: Vec<NodeId>) -> Result<()>;

    fn process_dependencies(&self, id: &NodeId) -> Result<Vec<NodeId>>;

    /// All registered node ids, sorted.
    fn node_ids(&self) -> Result<Vec<NodeId>>;
}

/// Write and read boundary for per-node version sequences.
pub trait VersionLedger: Send + Sync {
    /// Append a version numbered `current max + 1`.
    fn record_version(&self, node: &NodeId, payload: &VersionPayload) -> Result<TreeNodeVersion>;

    fn latest_version(&self, node: &NodeId) -> Result<Option<TreeNodeVersion>>;

    fn version(&self, node: &NodeId, nr: VersionNr) -> Result<Option<TreeNodeVersion>>;

    /// Full version history in ascending order.
    fn versions(&self, node: &NodeId) -> Result<Vec<TreeNodeVersion>>;
}

/// Write and read boundary for per-node release sequences.
pub trait ReleaseLedger: Send + Sync {
    /// Promote `version` to a release numbered `current max + 1`.
    ///
    /// Fails with `InvalidArgument` if the version does not exist for the
    /// node or is not releasable.
    fn cut_release(
        &self,
        node: &NodeId,
        version: VersionNr,
        payload: &ReleasePayload,
    ) -> Result<TreeNodeRelease>;

    fn latest_release(&self, node: &NodeId) -> Result<Option<TreeNodeRelease>>;

    fn release(&self, node: &NodeId, nr: ReleaseNr) -> Result<Option<TreeNodeRelease>>;

    /// Releases in ascending order; with `all == false` only the latest one.
    fn releases(&self, node: &NodeId, all: bool) -> Result<Vec<TreeNodeRelease>>;
}

/// Source of [`TreeNodeInfo`] snapshots for reconciliation.
pub trait InfoSource: Send + Sync {
    fn load_info(&self, node: &NodeId) -> Result<TreeNodeInfo>;
}
