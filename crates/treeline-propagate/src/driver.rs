//! Dependency propagation driver.
//!
//! [`PropagationDriver`] re-resolves every reference to a node after that node
//! advances, applies the resulting updates, and follows owners that advance
//! in turn. The pass is level-synchronous: all references into one frontier
//! are processed before the owners they touched are advanced, and each owner
//! is advanced at most once per pass.
//!
//! # Invariants
//!
//! - A node is advanced at most once per pass (the origin counts as advanced).
//! - The pass terminates on cyclic reference graphs.
//! - A failure on one reference never prevents its siblings from updating.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use treeline_refs::resolve_stored;
use treeline_types::{NodeId, TreeNodeInfo};

use crate::graph::ReferenceGraph;
use crate::report::{AppliedUpdate, PropagationFailure, PropagationReport};

/// Default bound on how many levels of owners one pass may advance.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Synchronous propagation over a [`ReferenceGraph`].
pub struct PropagationDriver<G> {
    graph: G,
    max_depth: usize,
}

impl<G: ReferenceGraph> PropagationDriver<G> {
    pub fn new(graph: G) -> Self {
        Self {
            graph,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit the number of frontier levels one pass processes.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Propagate the advancement of `node` (now described by `info`).
    pub fn node_advanced(&self, node: &NodeId, info: TreeNodeInfo) -> PropagationReport {
        self.node_advanced_until(node, info, || false)
    }

    /// Like [`node_advanced`](Self::node_advanced), checking `cancelled`
    /// before each reference. A cancelled pass keeps what it already applied.
    pub fn node_advanced_until(
        &self,
        node: &NodeId,
        info: TreeNodeInfo,
        cancelled: impl Fn() -> bool,
    ) -> PropagationReport {
        let mut report = PropagationReport::for_origin(node.clone());
        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(node.clone());
        let mut frontier: Vec<TreeNodeInfo> = vec![info];

        info!(node = %node, max_depth = self.max_depth, "propagation started");

        for depth in 0..self.max_depth {
            if frontier.is_empty() {
                break;
            }

            let mut touched: Vec<NodeId> = Vec::new();
            for target in &frontier {
                let references = match self.graph.references_to(&target.id) {
                    Ok(references) => references,
                    Err(error) => {
                        warn!(node = %target.id, %error, "listing references failed");
                        report.failures.push(PropagationFailure {
                            node: target.id.clone(),
                            referrer: None,
                            error,
                        });
                        continue;
                    }
                };

                for reference in references {
                    if cancelled() {
                        info!(node = %node, "propagation cancelled");
                        report.cancelled = true;
                        return report;
                    }

                    let Some(update) = resolve_stored(target, &reference.tracking) else {
                        report.unchanged += 1;
                        continue;
                    };

                    match self.graph.apply_update(&reference.referrer, update) {
                        // Switched to a mode that takes no updates since it was listed.
                        Ok(record) if !record.accepts(update) => {
                            debug!(referrer = %reference.referrer, tracking = %record.tracking, "reference no longer tracks");
                            report.unchanged += 1;
                        }
                        Ok(_) => {
                            debug!(referrer = %reference.referrer, target = %target.id, %update, depth, "reference updated");
                            let owner = reference.referrer.owner().clone();
                            if !touched.contains(&owner) {
                                touched.push(owner);
                            }
                            report.applied.push(AppliedUpdate {
                                referrer: reference.referrer,
                                target: target.id.clone(),
                                update,
                            });
                        }
                        Err(error) => {
                            warn!(referrer = %reference.referrer, target = %target.id, %error, "reference update failed");
                            report.failures.push(PropagationFailure {
                                node: target.id.clone(),
                                referrer: Some(reference.referrer),
                                error,
                            });
                        }
                    }
                }
            }

            frontier = self.advance_owners(touched, &mut visited, &mut report);
        }

        report.truncated = frontier.into_iter().map(|info| info.id).collect();
        if !report.truncated.is_empty() {
            warn!(node = %node, truncated = report.truncated.len(), "propagation hit depth limit");
        }
        info!(
            node = %node,
            applied = report.applied.len(),
            failures = report.failures.len(),
            "propagation finished"
        );
        report
    }

    fn advance_owners(
        &self,
        owners: Vec<NodeId>,
        visited: &mut HashSet<NodeId>,
        report: &mut PropagationReport,
    ) -> Vec<TreeNodeInfo> {
        let mut next = Vec::new();
        for owner in owners {
            if !visited.insert(owner.clone()) {
                debug!(node = %owner, "already advanced in this pass");
                report.skipped_revisits.push(owner);
                continue;
            }
            match self.graph.advance_owner(&owner) {
                Ok(Some(info)) => {
                    report.advanced.push(owner);
                    next.push(info);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(node = %owner, %error, "advancing owner failed");
                    report.failures.push(PropagationFailure {
                        node: owner,
                        referrer: None,
                        error,
                    });
                }
            }
        }
        next
    }
}
