//! Release preparation.
//!
//! Before a graph model can be released, every process that embeds another
//! graph model must be pinned to an exact release of it, so the released
//! model's interface cannot drift. Preparation checks that:
//!
//! - no process follows `CURRENT_VERSION` (or an unrecognized mode)
//! - no process follows `LATEST_RELEASE` of a model that was never released
//! - every `LATEST_RELEASE` process has a pinning decision
//!
//! and then turns each decided process into a `FIXED` reference.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};
use treeline_ledger::InfoSource;
use treeline_types::{NodeId, ProcessId, TreeNodeInfo, TreeNodeType, VersionNr};

use crate::error::{ReleasePrepError, UnpinnableProcess};
use crate::pinning::{PinningStore, ReleaseProcessPinning};
use crate::traits::ReferenceStore;
use crate::types::{Referrer, StoredReference, TrackingMode, TreeNodeReferenceTracking};

/// The outcome of a successful preparation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    pub node: NodeId,
    /// The version the release will pin.
    pub version_nr: VersionNr,
    /// Process records to rewrite as `FIXED` before cutting the release.
    pub pins: Vec<StoredReference>,
}

/// The records a [`ReleasePreparer::apply`] replaced, oldest first.
#[derive(Debug, Default)]
pub struct AppliedPins {
    previous: Vec<(Referrer, Option<TreeNodeReferenceTracking>)>,
}

impl AppliedPins {
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

/// Checks and applies pinning decisions ahead of a release.
pub struct ReleasePreparer<'a> {
    references: &'a dyn ReferenceStore,
    pins: &'a dyn PinningStore,
    infos: &'a dyn InfoSource,
}

impl<'a> ReleasePreparer<'a> {
    pub fn new(
        references: &'a dyn ReferenceStore,
        pins: &'a dyn PinningStore,
        infos: &'a dyn InfoSource,
    ) -> Self {
        Self {
            references,
            pins,
            infos,
        }
    }

    /// Check `node` for release and compute the pins to apply.
    ///
    /// Explicit `decisions` take precedence over pins already held by the
    /// pinning store. Nothing is written.
    pub fn plan(
        &self,
        node: &TreeNodeInfo,
        decisions: &[ReleaseProcessPinning],
    ) -> Result<ReleasePlan, ReleasePrepError> {
        match node.node_type {
            TreeNodeType::ForecastSheet => Ok(ReleasePlan {
                node: node.id.clone(),
                version_nr: node.current_version_nr,
                pins: Vec::new(),
            }),
            TreeNodeType::GraphModel => self.plan_graph_model(node, decisions),
            _ => Err(ReleasePrepError::NotReleasable {
                node: node.id.clone(),
            }),
        }
    }

    /// Plan, then write the resulting `FIXED` records.
    pub fn prepare(
        &self,
        node: &TreeNodeInfo,
        decisions: &[ReleaseProcessPinning],
    ) -> Result<ReleasePlan, ReleasePrepError> {
        let plan = self.plan(node, decisions)?;
        self.apply(&plan)?;
        Ok(plan)
    }

    /// Write the `FIXED` records of a plan computed earlier.
    ///
    /// Either every pin is written or none is: if a write fails, the records
    /// already replaced are put back before the error is returned. The
    /// returned [`AppliedPins`] can undo a successful apply.
    pub fn apply(&self, plan: &ReleasePlan) -> Result<AppliedPins, ReleasePrepError> {
        let mut applied = AppliedPins::default();
        for pin in &plan.pins {
            let written = self
                .references
                .read(&pin.referrer)
                .and_then(|previous| self.references.write(&pin.referrer, &pin.tracking).map(|()| previous));
            match written {
                Ok(previous) => applied.previous.push((pin.referrer.clone(), previous)),
                Err(error) => {
                    warn!(node = %plan.node, referrer = %pin.referrer, %error, "writing release pin failed");
                    if let Err(restore) = self.restore(applied) {
                        warn!(node = %plan.node, error = %restore, "restoring release pins failed");
                    }
                    return Err(error.into());
                }
            }
        }
        info!(node = %plan.node, version = %plan.version_nr, pinned = plan.pins.len(), "release pins applied");
        Ok(applied)
    }

    /// Put back the records replaced by an earlier [`apply`](Self::apply).
    pub fn restore(&self, applied: AppliedPins) -> Result<(), ReleasePrepError> {
        for (referrer, previous) in applied.previous.into_iter().rev() {
            match previous {
                Some(tracking) => self.references.write(&referrer, &tracking)?,
                None => {
                    self.references.remove(&referrer)?;
                }
            }
            debug!(referrer = %referrer, "release pin restored");
        }
        Ok(())
    }

    fn plan_graph_model(
        &self,
        node: &TreeNodeInfo,
        decisions: &[ReleaseProcessPinning],
    ) -> Result<ReleasePlan, ReleasePrepError> {
        let processes: Vec<(ProcessId, StoredReference)> = self
            .references
            .list_references_from(&node.id)?
            .into_iter()
            .filter_map(|r| r.referrer.process_id().cloned().map(|p| (p, r)))
            .collect();

        let mut targets: HashMap<NodeId, TreeNodeInfo> = HashMap::new();
        for (_, reference) in &processes {
            let target = &reference.tracking.node_id;
            if !targets.contains_key(target) {
                targets.insert(target.clone(), self.infos.load_info(target)?);
            }
        }

        let unpinnable: Vec<UnpinnableProcess> = processes
            .iter()
            .filter(|(_, r)| {
                let released = targets
                    .get(&r.tracking.node_id)
                    .is_some_and(TreeNodeInfo::is_released);
                match r.tracking.tracking {
                    TrackingMode::CurrentVersion | TrackingMode::Unknown => true,
                    TrackingMode::LatestRelease => !released,
                    TrackingMode::Fixed => false,
                }
            })
            .map(|(_, r)| UnpinnableProcess {
                referrer: r.referrer.clone(),
                target: r.tracking.node_id.clone(),
                tracking: r.tracking.tracking,
            })
            .collect();
        if !unpinnable.is_empty() {
            warn!(node = %node.id, count = unpinnable.len(), "release blocked by unpinnable processes");
            return Err(ReleasePrepError::NotPinnable {
                node: node.id.clone(),
                processes: unpinnable,
            });
        }

        let mut decided: HashMap<ProcessId, ReleaseProcessPinning> = HashMap::new();
        for (process, _) in &processes {
            if let Some(pin) = self.pins.resolve_pin(process)? {
                decided.insert(process.clone(), pin);
            }
        }
        for decision in decisions {
            decided.insert(decision.process_id.clone(), decision.clone());
        }

        let suggestions: Vec<ReleaseProcessPinning> = processes
            .iter()
            .filter(|(p, r)| {
                r.tracking.tracking == TrackingMode::LatestRelease && !decided.contains_key(p)
            })
            .filter_map(|(p, r)| {
                let target = targets.get(&r.tracking.node_id)?;
                let latest = target.release_nr?;
                Some(ReleaseProcessPinning::new(p.clone(), target.id.clone(), latest))
            })
            .collect();
        if !suggestions.is_empty() {
            debug!(node = %node.id, count = suggestions.len(), "release needs pinning decisions");
            return Err(ReleasePrepError::NeedsPinning {
                node: node.id.clone(),
                suggestions,
            });
        }

        let mut pins = Vec::new();
        for (process, reference) in &processes {
            let Some(decision) = decided.get(process) else {
                continue;
            };
            let target = &reference.tracking.node_id;
            let latest = targets.get(target).and_then(|t| t.release_nr);
            let valid = &decision.graph_model_id == target
                && latest.is_some_and(|latest| decision.release_nr <= latest)
                && decision.release_nr.get() >= 1;
            if !valid {
                return Err(ReleasePrepError::InvalidPin {
                    process: reference.referrer.to_string(),
                    model: decision.graph_model_id.clone(),
                    release_nr: decision.release_nr,
                });
            }
            pins.push(StoredReference {
                referrer: reference.referrer.clone(),
                tracking: TreeNodeReferenceTracking::fixed(target.clone(), decision.release_nr),
            });
        }

        Ok(ReleasePlan {
            node: node.id.clone(),
            version_nr: node.current_version_nr,
            pins,
        })
    }
}
