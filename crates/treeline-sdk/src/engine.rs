use std::sync::Arc;

use tracing::{info, warn};
use treeline_ledger::{
    HistoryEntry, InMemoryLedger, InfoSource, NodeCatalog, ProjectionBuilder, ReleaseLedger,
    ReleasePayload, StreamValidator, ValidationReport, VersionLedger, VersionPayload,
};
use treeline_propagate::{PropagationDriver, PropagationQueue, PropagationReport};
use treeline_refs::{
    resolve, select_fixed, select_tracking_mode, EffectiveSource, InMemoryPinningStore,
    InMemoryReferenceStore, PinningStore, ReferenceStore, Referrer, ReleasePlan, ReleasePreparer,
    ReleaseProcessPinning, TrackingMode, TrackingUpdate, TreeNodeReferenceTracking,
};
use treeline_types::{NodeId, ProcessId, ReleaseNr, TreeNode, TreeNodeInfo, TreeNodeType, VersionNr};

use crate::config::EngineConfig;
use crate::error::{SdkError, SdkResult};
use crate::graph::LedgerGraph;
use crate::outcome::{ReleaseOutcome, VersionOutcome};

/// High-level Treeline engine.
///
/// Owns the ledgers, the reference store, and the pinning store, and runs
/// propagation after every advancement. The ledger append is committed first;
/// propagation then applies updates per reference and reports failures in the
/// returned outcome instead of undoing the append.
pub struct Treeline {
    config: EngineConfig,
    ledger: Arc<InMemoryLedger>,
    references: Arc<InMemoryReferenceStore>,
    pins: InMemoryPinningStore,
    driver: Arc<PropagationDriver<LedgerGraph>>,
}

impl Treeline {
    /// Create an empty engine.
    pub fn new(config: EngineConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new(config.node_id));
        Self::with_stores(
            config,
            ledger,
            Arc::new(InMemoryReferenceStore::new()),
            InMemoryPinningStore::new(),
        )
    }

    /// Create an engine over existing stores, e.g. restored from a snapshot.
    pub fn with_stores(
        config: EngineConfig,
        ledger: Arc<InMemoryLedger>,
        references: Arc<InMemoryReferenceStore>,
        pins: InMemoryPinningStore,
    ) -> Self {
        let graph = LedgerGraph::new(
            Arc::clone(&ledger),
            Arc::clone(&references),
            config.propagation.cascade_versions,
        );
        let driver = Arc::new(PropagationDriver::new(graph).with_max_depth(config.propagation.max_depth));
        info!(node_id = config.node_id, max_depth = config.propagation.max_depth, "treeline engine ready");
        Self {
            config,
            ledger,
            references,
            pins,
            driver,
        }
    }

    // ---- Nodes and ledgers ----

    pub fn create_node(&self, node: TreeNode) -> SdkResult<()> {
        self.ledger.register_node(node)?;
        Ok(())
    }

    /// Declare the graph models `node`'s processes depend on.
    pub fn set_dependencies(&self, node: &NodeId, deps: Vec<NodeId>) -> SdkResult<()> {
        for dep in &deps {
            self.require_node(dep)?;
        }
        self.ledger.set_process_dependencies(node, deps)?;
        Ok(())
    }

    pub fn info(&self, node: &NodeId) -> SdkResult<TreeNodeInfo> {
        Ok(self.ledger.load_info(node)?)
    }

    /// Version history, newest first.
    pub fn history(&self, node: &NodeId) -> SdkResult<Vec<HistoryEntry>> {
        Ok(ProjectionBuilder::history(self.ledger.as_ref(), node)?)
    }

    /// Save a new version of `node` and propagate it.
    pub fn record_version(&self, node: &NodeId, payload: &VersionPayload) -> SdkResult<VersionOutcome> {
        let version = self.ledger.record_version(node, payload)?;
        let propagation = self.propagate(node)?;
        Ok(VersionOutcome {
            version,
            propagation,
        })
    }

    /// Promote `version` of `node` to a release without pinning checks, and
    /// propagate it.
    pub fn cut_release(
        &self,
        node: &NodeId,
        version: VersionNr,
        payload: &ReleasePayload,
    ) -> SdkResult<ReleaseOutcome> {
        let release = self.ledger.cut_release(node, version, payload)?;
        let propagation = self.propagate(node)?;
        Ok(ReleaseOutcome::new(release, None, propagation))
    }

    /// Prepare and release the current version of `node`.
    ///
    /// Graph models must pass release preparation first. The resulting pins
    /// are written before the release is cut and put back if the cut fails,
    /// so an error leaves neither a release nor pins behind.
    pub fn release(
        &self,
        node: &NodeId,
        payload: &ReleasePayload,
        decisions: &[ReleaseProcessPinning],
    ) -> SdkResult<ReleaseOutcome> {
        let preparer = self.preparer();
        let plan = preparer.plan(&self.info(node)?, decisions)?;
        let applied = preparer.apply(&plan)?;
        let release = match self.ledger.cut_release(node, plan.version_nr, payload) {
            Ok(release) => release,
            Err(error) => {
                warn!(node = %node, %error, pins = applied.len(), "release cut failed, restoring process pins");
                if let Err(restore) = preparer.restore(applied) {
                    warn!(node = %node, error = %restore, "restoring process pins failed");
                }
                return Err(error.into());
            }
        };
        let propagation = self.propagate(node)?;
        Ok(ReleaseOutcome::new(release, Some(&plan), propagation))
    }

    /// Check whether `node` can be released, without writing anything.
    pub fn prepare_release(
        &self,
        node: &NodeId,
        decisions: &[ReleaseProcessPinning],
    ) -> SdkResult<ReleasePlan> {
        Ok(self.preparer().plan(&self.info(node)?, decisions)?)
    }

    /// Re-resolve every reference to `node` against its current state.
    pub fn propagate(&self, node: &NodeId) -> SdkResult<PropagationReport> {
        let info = self.info(node)?;
        Ok(self.driver.node_advanced(node, info))
    }

    /// Start an async worker that propagates submitted advancements in order.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_queue(&self) -> PropagationQueue {
        PropagationQueue::spawn(Arc::clone(&self.driver), self.config.propagation.queue_capacity)
    }

    pub fn validate(&self) -> SdkResult<Vec<ValidationReport>> {
        Ok(StreamValidator::validate_all(self.ledger.as_ref())?)
    }

    // ---- References ----

    /// Store the reference held by `referrer`.
    ///
    /// The target must exist, and a recorded release must not be newer than
    /// the target's latest release.
    pub fn track(&self, referrer: &Referrer, tracking: &TreeNodeReferenceTracking) -> SdkResult<()> {
        self.require_node(&tracking.node_id)?;
        if tracking.tracking == TrackingMode::Fixed && tracking.release_nr.is_none() {
            return Err(SdkError::InvalidArgument(format!(
                "fixed reference to {} needs a release number",
                tracking.node_id
            )));
        }
        if let Some(release_nr) = tracking.release_nr {
            self.require_release(&tracking.node_id, release_nr)?;
        }
        self.references.write(referrer, tracking)?;
        Ok(())
    }

    pub fn untrack(&self, referrer: &Referrer) -> SdkResult<bool> {
        Ok(self.references.remove(referrer)?)
    }

    pub fn tracking(&self, referrer: &Referrer) -> SdkResult<TreeNodeReferenceTracking> {
        self.references
            .read(referrer)?
            .ok_or_else(|| SdkError::NotFound(format!("reference held by {referrer}")))
    }

    /// Resolve the reference held by `referrer` against its target's current
    /// state. Without `known_version_nr` the version stored on the record is
    /// used.
    pub fn resolve(
        &self,
        referrer: &Referrer,
        known_version_nr: Option<VersionNr>,
    ) -> SdkResult<Option<TrackingUpdate>> {
        let record = self.tracking(referrer)?;
        let target = self.info(&record.node_id)?;
        Ok(resolve(&target, &record, known_version_nr.or(record.version_nr)))
    }

    pub fn select_tracking_mode(
        &self,
        referrer: &Referrer,
        mode: TrackingMode,
    ) -> SdkResult<TreeNodeReferenceTracking> {
        let record = self.tracking(referrer)?;
        let selected = select_tracking_mode(&record, &self.info(&record.node_id)?, mode)?;
        self.references.write(referrer, &selected)?;
        Ok(selected)
    }

    pub fn select_fixed(
        &self,
        referrer: &Referrer,
        release_nr: ReleaseNr,
    ) -> SdkResult<TreeNodeReferenceTracking> {
        let record = self.tracking(referrer)?;
        let selected = select_fixed(&record, &self.info(&record.node_id)?, release_nr)?;
        self.references.write(referrer, &selected)?;
        Ok(selected)
    }

    pub fn effective_source(&self, referrer: &Referrer) -> SdkResult<Option<EffectiveSource>> {
        let record = self.tracking(referrer)?;
        Ok(treeline_refs::effective_source(&record, &self.info(&record.node_id)?))
    }

    // ---- Pins ----

    /// Pin `process` to `release_nr` of graph model `model`.
    pub fn pin(
        &self,
        process: &ProcessId,
        model: &NodeId,
        release_nr: ReleaseNr,
    ) -> SdkResult<Option<ReleaseProcessPinning>> {
        let node = self.require_node(model)?;
        if node.node_type != TreeNodeType::GraphModel {
            return Err(SdkError::InvalidArgument(format!("{model} is not a graph model")));
        }
        self.require_release(model, release_nr)?;
        Ok(self.pins.pin(process, model, release_nr)?)
    }

    pub fn resolve_pin(&self, process: &ProcessId) -> SdkResult<ReleaseProcessPinning> {
        self.pins
            .resolve_pin(process)?
            .ok_or_else(|| SdkError::NotFound(format!("pin for process {process}")))
    }

    pub fn unpin(&self, process: &ProcessId) -> SdkResult<bool> {
        Ok(self.pins.unpin(process)?)
    }

    // ---- Accessors ----

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub fn references(&self) -> &InMemoryReferenceStore {
        &self.references
    }

    pub fn pins(&self) -> &InMemoryPinningStore {
        &self.pins
    }

    fn preparer(&self) -> ReleasePreparer<'_> {
        ReleasePreparer::new(self.references.as_ref(), &self.pins, self.ledger.as_ref())
    }

    fn require_node(&self, node: &NodeId) -> SdkResult<TreeNode> {
        self.ledger
            .node(node)?
            .ok_or_else(|| SdkError::NotFound(format!("tree node {node}")))
    }

    fn require_release(&self, node: &NodeId, release_nr: ReleaseNr) -> SdkResult<()> {
        match self.ledger.release(node, release_nr)? {
            Some(_) => Ok(()),
            None => Err(SdkError::InvalidArgument(format!(
                "{node} has no release {release_nr}"
            ))),
        }
    }
}

impl Default for Treeline {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use treeline_ledger::LedgerError;
    use treeline_types::Owner;

    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn pid(s: &str) -> ProcessId {
        ProcessId::new(s).unwrap()
    }

    fn owner() -> Owner {
        Owner::new("u1", "Ada")
    }

    fn save(engine: &Treeline, node: &str) -> VersionOutcome {
        engine
            .record_version(&id(node), &VersionPayload::new(owner(), "edit", true))
            .unwrap()
    }

    fn engine_with(nodes: &[(&str, TreeNodeType)]) -> Treeline {
        let engine = Treeline::default();
        for (name, kind) in nodes {
            engine.create_node(TreeNode::new(id(name), *kind, *name)).unwrap();
            save(&engine, name);
        }
        engine
    }

    #[test]
    fn saving_a_version_advances_tracking_references() {
        let engine = engine_with(&[("fc", TreeNodeType::ForecastSheet)]);
        let sim = Referrer::node(id("sim"));
        engine
            .track(&sim, &TreeNodeReferenceTracking::current_version(id("fc")).with_version(VersionNr::new(1)))
            .unwrap();

        let outcome = save(&engine, "fc");
        assert_eq!(outcome.version.version_nr, VersionNr::new(2));
        assert_eq!(outcome.propagation.applied.len(), 1);
        assert_eq!(engine.tracking(&sim).unwrap().version_nr, Some(VersionNr::new(2)));
        assert_eq!(engine.resolve(&sim, None).unwrap(), None);
    }

    #[test]
    fn reference_updates_cascade_through_models() {
        let engine = engine_with(&[
            ("lib", TreeNodeType::GraphModel),
            ("top", TreeNodeType::GraphModel),
        ]);
        engine
            .track(
                &Referrer::process(id("top"), pid("p1")),
                &TreeNodeReferenceTracking::current_version(id("lib")).with_version(VersionNr::new(1)),
            )
            .unwrap();
        let sim = Referrer::node(id("sim"));
        engine
            .track(&sim, &TreeNodeReferenceTracking::current_version(id("top")).with_version(VersionNr::new(1)))
            .unwrap();

        let outcome = save(&engine, "lib");
        assert_eq!(outcome.propagation.advanced, vec![id("top")]);
        assert_eq!(engine.info(&id("top")).unwrap().current_version_nr, VersionNr::new(2));
        assert_eq!(engine.tracking(&sim).unwrap().version_nr, Some(VersionNr::new(2)));
    }

    #[test]
    fn cascading_can_be_disabled() {
        let mut config = EngineConfig::default();
        config.propagation.cascade_versions = false;
        let engine = Treeline::new(config);
        for name in ["lib", "top"] {
            engine.create_node(TreeNode::new(id(name), TreeNodeType::GraphModel, name)).unwrap();
            save(&engine, name);
        }
        engine
            .track(
                &Referrer::process(id("top"), pid("p1")),
                &TreeNodeReferenceTracking::current_version(id("lib")),
            )
            .unwrap();

        let outcome = save(&engine, "lib");
        assert_eq!(outcome.propagation.applied.len(), 1);
        assert!(outcome.propagation.advanced.is_empty());
        assert_eq!(engine.info(&id("top")).unwrap().current_version_nr, VersionNr::new(1));
    }

    #[test]
    fn releasing_a_model_pins_its_processes() {
        let engine = engine_with(&[
            ("lib", TreeNodeType::GraphModel),
            ("top", TreeNodeType::GraphModel),
        ]);
        engine.cut_release(&id("lib"), VersionNr::new(1), &ReleasePayload::by(owner())).unwrap();
        let process = Referrer::process(id("top"), pid("p1"));
        engine
            .track(&process, &TreeNodeReferenceTracking::latest_release(id("lib"), Some(ReleaseNr::new(1))))
            .unwrap();

        let err = engine.release(&id("top"), &ReleasePayload::by(owner()), &[]).unwrap_err();
        assert!(matches!(
            err,
            SdkError::ReleasePrep(treeline_refs::ReleasePrepError::NeedsPinning { .. })
        ));
        assert!(engine.ledger().latest_release(&id("top")).unwrap().is_none());

        engine.pin(&pid("p1"), &id("lib"), ReleaseNr::new(1)).unwrap();
        let outcome = engine.release(&id("top"), &ReleasePayload::by(owner()), &[]).unwrap();
        assert_eq!(outcome.release.release_nr, ReleaseNr::new(1));
        assert_eq!(outcome.pinned, 1);
        assert_eq!(engine.tracking(&process).unwrap().tracking, TrackingMode::Fixed);
    }

    #[test]
    fn failed_release_cut_keeps_processes_unpinned() {
        let engine = engine_with(&[
            ("lib", TreeNodeType::GraphModel),
            ("top", TreeNodeType::GraphModel),
        ]);
        engine.cut_release(&id("lib"), VersionNr::new(1), &ReleasePayload::by(owner())).unwrap();
        let process = Referrer::process(id("top"), pid("p1"));
        let tracking = TreeNodeReferenceTracking::latest_release(id("lib"), Some(ReleaseNr::new(1)));
        engine.track(&process, &tracking).unwrap();
        engine.pin(&pid("p1"), &id("lib"), ReleaseNr::new(1)).unwrap();

        let payload = ReleasePayload::by(owner()).with_tags(["not..valid"]);
        let err = engine.release(&id("top"), &payload, &[]).unwrap_err();
        assert!(matches!(err, SdkError::Ledger(LedgerError::InvalidArgument { .. })));
        assert!(engine.ledger().latest_release(&id("top")).unwrap().is_none());
        assert_eq!(engine.tracking(&process).unwrap(), tracking);

        let outcome = engine.release(&id("top"), &ReleasePayload::by(owner()), &[]).unwrap();
        assert_eq!(outcome.release.release_nr, ReleaseNr::new(1));
        assert_eq!(engine.tracking(&process).unwrap().tracking, TrackingMode::Fixed);
    }

    #[test]
    fn release_propagates_to_release_trackers() {
        let engine = engine_with(&[("fc", TreeNodeType::ForecastSheet)]);
        let sim = Referrer::node(id("sim"));
        engine
            .track(&sim, &TreeNodeReferenceTracking::latest_release(id("fc"), None))
            .unwrap();

        let outcome = engine.release(&id("fc"), &ReleasePayload::by(owner()), &[]).unwrap();
        assert_eq!(outcome.propagation.applied.len(), 1);
        assert_eq!(engine.tracking(&sim).unwrap().release_nr, Some(ReleaseNr::new(1)));
        assert_eq!(
            engine.effective_source(&sim).unwrap(),
            Some(EffectiveSource::Release(ReleaseNr::new(1)))
        );
    }

    #[test]
    fn pin_validation() {
        let engine = engine_with(&[
            ("lib", TreeNodeType::GraphModel),
            ("fc", TreeNodeType::ForecastSheet),
        ]);
        let err = engine.pin(&pid("p1"), &id("ghost"), ReleaseNr::new(1)).unwrap_err();
        assert!(matches!(err, SdkError::NotFound(_)));

        let err = engine.pin(&pid("p1"), &id("lib"), ReleaseNr::new(1)).unwrap_err();
        assert!(matches!(err, SdkError::InvalidArgument(_)));

        let err = engine.pin(&pid("p1"), &id("fc"), ReleaseNr::new(1)).unwrap_err();
        assert!(matches!(err, SdkError::InvalidArgument(_)));

        assert!(matches!(engine.resolve_pin(&pid("p1")).unwrap_err(), SdkError::NotFound(_)));
    }

    #[test]
    fn track_rejects_unknown_targets_and_future_releases() {
        let engine = engine_with(&[("lib", TreeNodeType::GraphModel)]);
        let sim = Referrer::node(id("sim"));

        let err = engine
            .track(&sim, &TreeNodeReferenceTracking::current_version(id("ghost")))
            .unwrap_err();
        assert!(matches!(err, SdkError::NotFound(_)));

        let err = engine
            .track(&sim, &TreeNodeReferenceTracking::latest_release(id("lib"), Some(ReleaseNr::new(1))))
            .unwrap_err();
        assert!(matches!(err, SdkError::InvalidArgument(_)));
    }

    #[test]
    fn resolve_with_explicit_known_version() {
        let engine = engine_with(&[("fc", TreeNodeType::ForecastSheet)]);
        save(&engine, "fc");
        let sim = Referrer::node(id("sim"));
        engine
            .track(&sim, &TreeNodeReferenceTracking::current_version(id("fc")).with_version(VersionNr::new(2)))
            .unwrap();

        assert_eq!(engine.resolve(&sim, None).unwrap(), None);
        assert_eq!(
            engine.resolve(&sim, Some(VersionNr::new(1))).unwrap(),
            Some(TrackingUpdate::Version(VersionNr::new(2)))
        );
    }

    #[test]
    fn selecting_modes_rewrites_the_record() {
        let engine = engine_with(&[("fc", TreeNodeType::ForecastSheet)]);
        engine.cut_release(&id("fc"), VersionNr::new(1), &ReleasePayload::by(owner())).unwrap();
        let sim = Referrer::node(id("sim"));
        engine
            .track(&sim, &TreeNodeReferenceTracking::current_version(id("fc")))
            .unwrap();

        let record = engine.select_tracking_mode(&sim, TrackingMode::LatestRelease).unwrap();
        assert_eq!(record.release_nr, Some(ReleaseNr::new(1)));
        let record = engine.select_fixed(&sim, ReleaseNr::new(1)).unwrap();
        assert_eq!(engine.tracking(&sim).unwrap(), record);
    }

    #[test]
    fn ledger_stays_valid() {
        let engine = engine_with(&[("fc", TreeNodeType::ForecastSheet)]);
        engine.cut_release(&id("fc"), VersionNr::new(1), &ReleasePayload::by(owner())).unwrap();
        let reports = engine.validate().unwrap();
        assert!(reports.iter().all(|r| r.is_valid()));
        assert_eq!(engine.history(&id("fc")).unwrap()[0].releases, vec![ReleaseNr::new(1)]);
    }

    #[tokio::test]
    async fn queue_propagates_submitted_advancements() {
        let engine = engine_with(&[("fc", TreeNodeType::ForecastSheet)]);
        let sim = Referrer::node(id("sim"));
        engine
            .track(&sim, &TreeNodeReferenceTracking::current_version(id("fc")))
            .unwrap();

        let queue = engine.start_queue();
        engine
            .ledger()
            .record_version(&id("fc"), &VersionPayload::new(owner(), "", true))
            .unwrap();
        queue
            .submit(treeline_propagate::AdvancementEvent::new(engine.info(&id("fc")).unwrap()))
            .await
            .unwrap();
        let reports = queue.shutdown().await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(engine.tracking(&sim).unwrap().version_nr, Some(VersionNr::new(2)));
    }
}
