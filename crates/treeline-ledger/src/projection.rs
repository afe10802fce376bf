use treeline_types::{NodeId, ReleaseNr, TemporalAnchor, TreeNodeInfo, VersionNr};

use crate::error::{LedgerError, Result};
use crate::memory::InMemoryLedger;
use crate::traits::{InfoSource, NodeCatalog, ReleaseLedger, VersionLedger};

/// One row of a node's history: a version plus every release that pins it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub version_nr: VersionNr,
    pub owner_name: String,
    pub timestamp: TemporalAnchor,
    pub description: String,
    pub releasable: bool,
    pub releases: Vec<ReleaseNr>,
}

impl HistoryEntry {
    pub fn is_released(&self) -> bool {
        !self.releases.is_empty()
    }
}

/// Deterministic read models built from ledger state.
pub struct ProjectionBuilder;

impl ProjectionBuilder {
    /// Build the reconciliation snapshot of `node`.
    ///
    /// A node without versions has no `currentVersionNr` and cannot be
    /// projected; that is reported as `InvalidState`.
    pub fn tracking_info<L>(ledger: &L, node: &NodeId) -> Result<TreeNodeInfo>
    where
        L: NodeCatalog + VersionLedger + ReleaseLedger + ?Sized,
    {
        let tree_node = ledger
            .node(node)?
            .ok_or_else(|| LedgerError::NotFound(node.clone()))?;
        let current = ledger
            .latest_version(node)?
            .ok_or_else(|| LedgerError::InvalidState {
                node: node.clone(),
                reason: "node has no versions".into(),
            })?;

        let mut info = TreeNodeInfo::unreleased(&tree_node, current.version_nr)
            .with_dependencies(ledger.process_dependencies(node)?);
        if let Some(release) = ledger.latest_release(node)? {
            info = info.with_release(release.release_nr, release.version_nr);
        }
        Ok(info)
    }

    /// Version history, newest first, annotated with pinning releases.
    pub fn history<L>(ledger: &L, node: &NodeId) -> Result<Vec<HistoryEntry>>
    where
        L: VersionLedger + ReleaseLedger + ?Sized,
    {
        let releases = ledger.releases(node, true)?;
        let mut entries: Vec<HistoryEntry> = ledger
            .versions(node)?
            .into_iter()
            .map(|v| HistoryEntry {
                version_nr: v.version_nr,
                releases: releases
                    .iter()
                    .filter(|r| r.version_nr == v.version_nr)
                    .map(|r| r.release_nr)
                    .collect(),
                owner_name: v.owner.name,
                timestamp: v.timestamp,
                description: v.description,
                releasable: v.releasable,
            })
            .collect();
        entries.reverse();
        Ok(entries)
    }
}

impl InfoSource for InMemoryLedger {
    fn load_info(&self, node: &NodeId) -> Result<TreeNodeInfo> {
        ProjectionBuilder::tracking_info(self, node)
    }
}
