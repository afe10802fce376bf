//! In-memory ledger implementation.
//!
//! Each registered node owns one stream holding its versions and releases in
//! number order. Appends assign the next number under the node's lock;
//! imports keep their own numbers but must stay positive and increasing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};
use treeline_types::{NodeId, RecordId, ReleaseNr, TemporalAnchor, TreeNode, VersionNr};

use crate::error::{LedgerError, Result};
use crate::records::{ReleasePayload, TreeNodeRelease, TreeNodeVersion, VersionPayload};
use crate::tags::validate_release_tag;
use crate::traits::{NodeCatalog, ReleaseLedger, VersionLedger};

/// In-memory ledger for tests, local tools, and embedding.
///
/// Writers are serialized per node: every node owns one `Mutex<NodeStream>`
/// guarding both its version and release sequences, so concurrent appends to
/// the same node are mutually exclusive while appends to different nodes
/// never contend. The outer `RwLock` is only write-locked when a node is
/// registered.
pub struct InMemoryLedger {
    node_id: u16,
    catalog: RwLock<HashMap<NodeId, CatalogEntry>>,
    streams: RwLock<HashMap<NodeId, Arc<Mutex<NodeStream>>>>,
}

struct CatalogEntry {
    node: TreeNode,
    dependencies: Vec<NodeId>,
}

#[derive(Default)]
struct NodeStream {
    versions: Vec<TreeNodeVersion>,
    releases: Vec<TreeNodeRelease>,
}

impl NodeStream {
    fn last_anchor(&self) -> Option<TemporalAnchor> {
        let v = self.versions.last().map(|v| v.timestamp);
        let r = self.releases.last().map(|r| r.timestamp);
        v.max(r)
    }

    fn find_version(&self, nr: VersionNr) -> Option<&TreeNodeVersion> {
        self.versions
            .binary_search_by_key(&nr, |v| v.version_nr)
            .ok()
            .map(|idx| &self.versions[idx])
    }

    fn find_release(&self, nr: ReleaseNr) -> Option<&TreeNodeRelease> {
        self.releases
            .binary_search_by_key(&nr, |r| r.release_nr)
            .ok()
            .map(|idx| &self.releases[idx])
    }

    fn next_version_nr(&self, node: &NodeId) -> Result<VersionNr> {
        match self.versions.last() {
            None => Ok(VersionNr::FIRST),
            Some(last) => last.version_nr.next().ok_or_else(|| LedgerError::InvalidState {
                node: node.clone(),
                reason: format!("version numbers exhausted after {}", last.version_nr),
            }),
        }
    }

    fn next_release_nr(&self, node: &NodeId) -> Result<ReleaseNr> {
        match self.releases.last() {
            None => Ok(ReleaseNr::FIRST),
            Some(last) => last.release_nr.next().ok_or_else(|| LedgerError::InvalidState {
                node: node.clone(),
                reason: format!("release numbers exhausted after {}", last.release_nr),
            }),
        }
    }

    fn push_version(&mut self, node: &NodeId, version: TreeNodeVersion) -> Result<()> {
        if !version.version_nr.is_valid() {
            return Err(LedgerError::InvalidState {
                node: node.clone(),
                reason: format!("version {} is below {}", version.version_nr, VersionNr::FIRST),
            });
        }
        if let Some(last) = self.versions.last() {
            if version.version_nr <= last.version_nr {
                return Err(LedgerError::InvalidState {
                    node: node.clone(),
                    reason: format!(
                        "version {} does not follow latest version {}",
                        version.version_nr, last.version_nr
                    ),
                });
            }
        }
        self.versions.push(version);
        Ok(())
    }

    fn push_release(&mut self, node: &NodeId, release: TreeNodeRelease) -> Result<()> {
        if !release.release_nr.is_valid() {
            return Err(LedgerError::InvalidState {
                node: node.clone(),
                reason: format!("release {} is below {}", release.release_nr, ReleaseNr::FIRST),
            });
        }
        if let Some(last) = self.releases.last() {
            if release.release_nr <= last.release_nr {
                return Err(LedgerError::InvalidState {
                    node: node.clone(),
                    reason: format!(
                        "release {} does not follow latest release {}",
                        release.release_nr, last.release_nr
                    ),
                });
            }
        }
        self.releases.push(release);
        Ok(())
    }

    /// The version a new release may pin, or the reason it may not.
    fn releasable_version(&self, node: &NodeId, nr: VersionNr) -> Result<&TreeNodeVersion> {
        let version = self
            .find_version(nr)
            .ok_or_else(|| LedgerError::InvalidArgument {
                node: node.clone(),
                reason: format!("version {nr} does not exist"),
            })?;
        if !version.releasable {
            return Err(LedgerError::InvalidArgument {
                node: node.clone(),
                reason: format!("version {nr} is not releasable"),
            });
        }
        Ok(version)
    }
}

impl InMemoryLedger {
    /// Create an empty ledger. `node_id` breaks timestamp ties between
    /// writers sharing a clock.
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            catalog: RwLock::new(HashMap::new()),
            streams: RwLock::new(HashMap::new()),
        }
    }

    fn stream(&self, node: &NodeId) -> Result<Arc<Mutex<NodeStream>>> {
        let streams = self
            .streams
            .read()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))?;
        streams
            .get(node)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(node.clone()))
    }

    /// Run `f` while holding the node's writer lock.
    fn with_stream<T>(
        &self,
        node: &NodeId,
        f: impl FnOnce(&mut NodeStream) -> Result<T>,
    ) -> Result<T> {
        let stream = self.stream(node)?;
        let mut guard = stream
            .lock()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))?;
        f(&mut guard)
    }

    /// Import a version produced elsewhere (e.g. loaded from persistence).
    ///
    /// Imported numbers may skip values but must stay strictly increasing;
    /// anything else is `InvalidState`.
    pub fn restore_version(&self, version: TreeNodeVersion) -> Result<()> {
        let node = version.object_id.clone();
        self.with_stream(&node, |stream| stream.push_version(&node, version))
    }

    /// Import a release produced elsewhere.
    ///
    /// The pinned version must already be present and releasable.
    pub fn restore_release(&self, release: TreeNodeRelease) -> Result<()> {
        let node = release.object_id.clone();
        self.with_stream(&node, |stream| {
            stream.releasable_version(&node, release.version_nr)?;
            stream.push_release(&node, release)
        })
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(0)
    }
}

impl NodeCatalog for InMemoryLedger {
    fn register_node(&self, node: TreeNode) -> Result<()> {
        let mut catalog = self
            .catalog
            .write()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))?;
        if catalog.contains_key(&node.id) {
            return Err(LedgerError::InvalidArgument {
                node: node.id.clone(),
                reason: "node is already registered".into(),
            });
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))?;
        streams.insert(node.id.clone(), Arc::default());

        debug!(node = %node.id, kind = %node.node_type, "registered tree node");
        catalog.insert(
            node.id.clone(),
            CatalogEntry {
                node,
                dependencies: Vec::new(),
            },
        );
        Ok(())
    }

    fn node(&self, id: &NodeId) -> Result<Option<TreeNode>> {
        let catalog = self
            .catalog
            .read()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))?;
        Ok(catalog.get(id).map(|entry| entry.node.clone()))
    }

    fn set_process_dependencies(&self, id: &NodeId, deps: Vec<NodeId>) -> Result<()> {
        let mut catalog = self
            .catalog
            .write()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))?;
        let entry = catalog
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;
        entry.dependencies = deps;
        Ok(())
    }

    fn process_dependencies(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        let catalog = self
            .catalog
            .read()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))?;
        catalog
            .get(id)
            .map(|entry| entry.dependencies.clone())
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    fn node_ids(&self) -> Result<Vec<NodeId>> {
        let catalog = self
            .catalog
            .read()
            .map_err(|e| LedgerError::LockPoisoned(e.to_string()))?;
        let mut ids: Vec<_> = catalog.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl VersionLedger for InMemoryLedger {
    fn record_version(&self, node: &NodeId, payload: &VersionPayload) -> Result<TreeNodeVersion> {
        self.with_stream(node, |stream| {
            let version_nr = stream.next_version_nr(node)?;

            let version = TreeNodeVersion {
                id: RecordId::new(),
                version_nr,
                object_id: node.clone(),
                owner: payload.owner.clone(),
                timestamp: TemporalAnchor::following(stream.last_anchor().as_ref(), self.node_id),
                description: payload.description.clone(),
                releasable: payload.releasable,
            };
            stream.push_version(node, version.clone())?;

            debug!(node = %node, version = %version_nr, releasable = payload.releasable, "recorded version");
            Ok(version)
        })
    }

    fn latest_version(&self, node: &NodeId) -> Result<Option<TreeNodeVersion>> {
        self.with_stream(node, |stream| Ok(stream.versions.last().cloned()))
    }

    fn version(&self, node: &NodeId, nr: VersionNr) -> Result<Option<TreeNodeVersion>> {
        self.with_stream(node, |stream| Ok(stream.find_version(nr).cloned()))
    }

    fn versions(&self, node: &NodeId) -> Result<Vec<TreeNodeVersion>> {
        self.with_stream(node, |stream| Ok(stream.versions.clone()))
    }
}

impl ReleaseLedger for InMemoryLedger {
    fn cut_release(
        &self,
        node: &NodeId,
        version: VersionNr,
        payload: &ReleasePayload,
    ) -> Result<TreeNodeRelease> {
        for tag in &payload.tags {
            validate_release_tag(node, tag)?;
        }

        self.with_stream(node, |stream| {
            stream.releasable_version(node, version)?;

            let release_nr = stream.next_release_nr(node)?;

            let release = TreeNodeRelease {
                id: RecordId::new(),
                release_nr,
                object_id: node.clone(),
                version_nr: version,
                owner: payload.owner.clone(),
                timestamp: TemporalAnchor::following(stream.last_anchor().as_ref(), self.node_id),
                description: payload.description.clone(),
                tags: payload.tags.clone(),
            };
            stream.push_release(node, release.clone())?;

            info!(node = %node, release = %release_nr, version = %version, "release cut");
            Ok(release)
        })
    }

    fn latest_release(&self, node: &NodeId) -> Result<Option<TreeNodeRelease>> {
        self.with_stream(node, |stream| Ok(stream.releases.last().cloned()))
    }

    fn release(&self, node: &NodeId, nr: ReleaseNr) -> Result<Option<TreeNodeRelease>> {
        self.with_stream(node, |stream| Ok(stream.find_release(nr).cloned()))
    }

    fn releases(&self, node: &NodeId, all: bool) -> Result<Vec<TreeNodeRelease>> {
        self.with_stream(node, |stream| {
            if all {
                Ok(stream.releases.clone())
            } else {
                Ok(stream.releases.last().cloned().into_iter().collect())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use treeline_types::{Owner, TreeNodeType};

    fn node_id(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    fn ledger_with(ids: &[&str]) -> InMemoryLedger {
        let ledger = InMemoryLedger::default();
        for id in ids {
            ledger
                .register_node(TreeNode::new(node_id(id), TreeNodeType::GraphModel, *id))
                .unwrap();
        }
        ledger
    }

    fn payload(releasable: bool) -> VersionPayload {
        VersionPayload::new(Owner::new("u1", "Ada"), "edit", releasable)
    }

    fn release_payload() -> ReleasePayload {
        ReleasePayload::by(Owner::new("u1", "Ada"))
    }

    #[test]
    fn versions_are_numbered_from_one() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");

        let v1 = ledger.record_version(&gm, &payload(true)).unwrap();
        let v2 = ledger.record_version(&gm, &payload(false)).unwrap();

        assert_eq!(v1.version_nr, VersionNr::new(1));
        assert_eq!(v2.version_nr, VersionNr::new(2));
        assert!(v2.timestamp.is_after(&v1.timestamp));
        assert_eq!(ledger.latest_version(&gm).unwrap().unwrap(), v2);
        assert_eq!(ledger.versions(&gm).unwrap().len(), 2);
    }

    #[test]
    fn unknown_node_is_not_found() {
        let ledger = InMemoryLedger::default();
        let err = ledger.record_version(&node_id("ghost"), &payload(true)).unwrap_err();
        assert_eq!(err, LedgerError::NotFound(node_id("ghost")));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let ledger = ledger_with(&["gm"]);
        let err = ledger
            .register_node(TreeNode::new(node_id("gm"), TreeNodeType::GraphModel, "again"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn cut_release_pins_releasable_version() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");
        ledger.record_version(&gm, &payload(true)).unwrap();
        ledger.record_version(&gm, &payload(true)).unwrap();

        let r1 = ledger.cut_release(&gm, VersionNr::new(1), &release_payload()).unwrap();
        let r2 = ledger
            .cut_release(&gm, VersionNr::new(2), &release_payload().with_tags(["final"]))
            .unwrap();

        assert_eq!(r1.release_nr, ReleaseNr::new(1));
        assert_eq!(r2.release_nr, ReleaseNr::new(2));
        assert_eq!(r2.version_nr, VersionNr::new(2));
        assert!(r2.has_tag("final"));
        assert_eq!(ledger.release(&gm, ReleaseNr::new(1)).unwrap().unwrap(), r1);
    }

    #[test]
    fn cut_release_of_non_releasable_version_fails() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");
        ledger.record_version(&gm, &payload(false)).unwrap();

        let err = ledger
            .cut_release(&gm, VersionNr::new(1), &release_payload())
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidArgument { reason, .. } if reason == "version v1 is not releasable"
        ));
        assert!(ledger.latest_release(&gm).unwrap().is_none());
    }

    #[test]
    fn cut_release_of_missing_version_fails() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");
        ledger.record_version(&gm, &payload(true)).unwrap();

        let err = ledger
            .cut_release(&gm, VersionNr::new(2), &release_payload())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn cut_release_rejects_bad_tags() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");
        ledger.record_version(&gm, &payload(true)).unwrap();

        let err = ledger
            .cut_release(&gm, VersionNr::new(1), &release_payload().with_tags(["two words"]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn releases_lists_latest_or_all() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");
        ledger.record_version(&gm, &payload(true)).unwrap();
        for _ in 0..3 {
            ledger.cut_release(&gm, VersionNr::new(1), &release_payload()).unwrap();
        }

        assert_eq!(ledger.releases(&gm, true).unwrap().len(), 3);
        let latest = ledger.releases(&gm, false).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].release_nr, ReleaseNr::new(3));
    }

    #[test]
    fn restore_allows_gaps_but_not_regressions() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");
        let mut version = ledger.record_version(&gm, &payload(true)).unwrap();

        version.id = RecordId::new();
        version.version_nr = VersionNr::new(5);
        ledger.restore_version(version.clone()).unwrap();

        version.version_nr = VersionNr::new(5);
        let err = ledger.restore_version(version.clone()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));

        // Regular appends continue after the gap.
        let next = ledger.record_version(&gm, &payload(true)).unwrap();
        assert_eq!(next.version_nr, VersionNr::new(6));
    }

    fn imported_version(node: &NodeId, nr: u64) -> TreeNodeVersion {
        TreeNodeVersion {
            id: RecordId::new(),
            version_nr: VersionNr::new(nr),
            object_id: node.clone(),
            owner: Owner::new("u1", "Ada"),
            timestamp: TemporalAnchor::zero(),
            description: String::new(),
            releasable: true,
        }
    }

    fn imported_release(node: &NodeId, nr: u64, version: u64) -> TreeNodeRelease {
        TreeNodeRelease {
            id: RecordId::new(),
            release_nr: ReleaseNr::new(nr),
            object_id: node.clone(),
            version_nr: VersionNr::new(version),
            owner: Owner::new("u1", "Ada"),
            timestamp: TemporalAnchor::zero(),
            description: None,
            tags: vec![],
        }
    }

    #[test]
    fn restore_rejects_number_zero() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");

        let err = ledger.restore_version(imported_version(&gm, 0)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
        assert!(ledger.latest_version(&gm).unwrap().is_none());

        ledger.restore_version(imported_version(&gm, 1)).unwrap();
        let err = ledger.restore_release(imported_release(&gm, 0, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
        assert!(ledger.latest_release(&gm).unwrap().is_none());
    }

    #[test]
    fn exhausted_numbering_is_invalid_state() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");
        ledger.restore_version(imported_version(&gm, u64::MAX)).unwrap();

        let err = ledger.record_version(&gm, &payload(true)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
        assert_eq!(ledger.versions(&gm).unwrap().len(), 1);

        ledger.restore_release(imported_release(&gm, u64::MAX, u64::MAX)).unwrap();
        let err = ledger
            .cut_release(&gm, VersionNr::new(u64::MAX), &release_payload())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
    }

    #[test]
    fn restore_release_requires_releasable_pin() {
        let ledger = ledger_with(&["gm"]);
        let gm = node_id("gm");
        ledger.record_version(&gm, &payload(false)).unwrap();
        let template = TreeNodeRelease {
            id: RecordId::new(),
            release_nr: ReleaseNr::new(1),
            object_id: gm.clone(),
            version_nr: VersionNr::new(1),
            owner: Owner::new("u1", "Ada"),
            timestamp: TemporalAnchor::zero(),
            description: None,
            tags: vec![],
        };
        let err = ledger.restore_release(template).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn dependencies_are_tracked_per_node() {
        let ledger = ledger_with(&["parent", "child"]);
        ledger
            .set_process_dependencies(&node_id("parent"), vec![node_id("child")])
            .unwrap();
        assert_eq!(
            ledger.process_dependencies(&node_id("parent")).unwrap(),
            vec![node_id("child")]
        );
        assert_eq!(
            ledger.node_ids().unwrap(),
            vec![node_id("child"), node_id("parent")]
        );
    }

    #[test]
    fn concurrent_appends_to_one_node_never_collide() {
        use std::thread;

        let ledger = Arc::new(ledger_with(&["gm"]));
        let gm = node_id("gm");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let gm = gm.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        ledger.record_version(&gm, &payload(true)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let numbers: Vec<u64> = ledger
            .versions(&gm)
            .unwrap()
            .iter()
            .map(|v| v.version_nr.get())
            .collect();
        assert_eq!(numbers, (1..=200).collect::<Vec<_>>());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Version { node: usize, releasable: bool },
        Release { node: usize, version: u64 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, any::<bool>()).prop_map(|(node, releasable)| Op::Version { node, releasable }),
            (0usize..3, 1u64..12).prop_map(|(node, version)| Op::Release { node, version }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn numbering_stays_strictly_increasing(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let names = ["a", "b", "c"];
            let ledger = ledger_with(&names);

            for op in ops {
                match op {
                    Op::Version { node, releasable } => {
                        ledger.record_version(&node_id(names[node]), &payload(releasable)).unwrap();
                    }
                    Op::Release { node, version } => {
                        // Rejections are expected for missing or non-releasable versions.
                        let _ = ledger.cut_release(&node_id(names[node]), VersionNr::new(version), &release_payload());
                    }
                }
            }

            for name in names {
                let id = node_id(name);
                let versions = ledger.versions(&id).unwrap();
                for (idx, v) in versions.iter().enumerate() {
                    prop_assert_eq!(v.version_nr.get(), idx as u64 + 1);
                }
                let releases = ledger.releases(&id, true).unwrap();
                for pair in releases.windows(2) {
                    prop_assert!(pair[0].release_nr < pair[1].release_nr);
                }
                for release in &releases {
                    let pinned = ledger.version(&id, release.version_nr).unwrap();
                    prop_assert!(pinned.map(|v| v.releasable).unwrap_or(false));
                }
            }
        }
    }
}
