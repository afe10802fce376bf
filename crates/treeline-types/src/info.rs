use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, ReleaseNr, VersionNr};
use crate::node::{TreeNode, TreeNodeType};

/// Read-model snapshot of a node's reconciliation-relevant state.
///
/// This is the only view of a *target* node the resolver consumes; it never
/// walks the full ledgers.
///
/// # Invariants
///
/// - `release_nr` is `None` exactly when the node has never been released.
/// - When present, `release_nr` is the number of the most recently created
///   release and `released_version_nr` is the version that release pins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeInfo {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: TreeNodeType,
    pub current_version_nr: VersionNr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_nr: Option<ReleaseNr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_version_nr: Option<VersionNr>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub path_name: String,
    /// Graph models this node's processes depend on.
    #[serde(default)]
    pub process_dependencies: Vec<NodeId>,
}

impl TreeNodeInfo {
    /// Snapshot for a node that has versions but no releases.
    pub fn unreleased(node: &TreeNode, current_version_nr: VersionNr) -> Self {
        Self {
            id: node.id.clone(),
            node_type: node.node_type,
            current_version_nr,
            release_nr: None,
            released_version_nr: None,
            name: node.name.clone(),
            parent_id: node.parent_id.clone(),
            path_name: node.path_name.clone(),
            process_dependencies: Vec::new(),
        }
    }

    pub fn with_release(mut self, release_nr: ReleaseNr, pinned_version: VersionNr) -> Self {
        self.release_nr = Some(release_nr);
        self.released_version_nr = Some(pinned_version);
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<NodeId>) -> Self {
        self.process_dependencies = deps;
        self
    }

    /// Returns `true` if the node has ever been released.
    pub fn is_released(&self) -> bool {
        self.release_nr.is_some()
    }

    /// Returns `true` if the node's processes reference other graph models.
    pub fn has_dependencies(&self) -> bool {
        !self.process_dependencies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> TreeNode {
        TreeNode::new(NodeId::new("fc-1").unwrap(), TreeNodeType::ForecastSheet, "Demand")
    }

    #[test]
    fn unreleased_snapshot_has_no_release() {
        let info = TreeNodeInfo::unreleased(&node(), VersionNr::new(3));
        assert!(!info.is_released());
        assert!(!info.has_dependencies());

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("releaseNr").is_none());
        assert_eq!(json["currentVersionNr"], 3);
    }

    #[test]
    fn released_snapshot_round_trips() {
        let info = TreeNodeInfo::unreleased(&node(), VersionNr::new(5))
            .with_release(ReleaseNr::new(2), VersionNr::new(4));
        let json = serde_json::to_string(&info).unwrap();
        let back: TreeNodeInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.release_nr, Some(ReleaseNr::new(2)));
        assert_eq!(back.released_version_nr, Some(VersionNr::new(4)));
    }
}
