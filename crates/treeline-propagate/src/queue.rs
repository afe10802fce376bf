//! Asynchronous advancement queue.
//!
//! [`PropagationQueue`] feeds advancement events to a [`PropagationDriver`]
//! from a bounded channel. Events are processed one at a time in submission
//! order, so two advancements of the same node are never reordered. Each pass
//! runs on tokio's blocking pool. A cancellation signal stops the current
//! pass between references and skips any events still queued.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};
use treeline_types::{NodeId, TreeNodeInfo};

use crate::driver::PropagationDriver;
use crate::error::{PropagateError, PropagateResult};
use crate::graph::ReferenceGraph;
use crate::report::{PropagationFailure, PropagationReport};

/// Default capacity of the event channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A node advanced and its references must be re-resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvancementEvent {
    pub node: NodeId,
    pub info: TreeNodeInfo,
}

impl AdvancementEvent {
    pub fn new(info: TreeNodeInfo) -> Self {
        Self {
            node: info.id.clone(),
            info,
        }
    }
}

/// Handle to a running propagation worker.
pub struct PropagationQueue {
    sender: mpsc::Sender<AdvancementEvent>,
    cancel: watch::Sender<bool>,
    worker: JoinHandle<Vec<PropagationReport>>,
}

impl PropagationQueue {
    /// Spawn a worker on the current tokio runtime.
    pub fn spawn<G>(driver: Arc<PropagationDriver<G>>, capacity: usize) -> Self
    where
        G: ReferenceGraph + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (cancel, cancelled) = watch::channel(false);
        let worker = tokio::spawn(run_worker(driver, receiver, cancelled));
        info!(capacity, "propagation queue started");
        Self {
            sender,
            cancel,
            worker,
        }
    }

    /// Enqueue an event, waiting for room if the channel is full.
    pub async fn submit(&self, event: AdvancementEvent) -> PropagateResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| PropagateError::QueueClosed)
    }

    /// Stop the running pass and skip everything still queued.
    pub fn cancel(&self) {
        // send_replace never fails, even with no receiver left.
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Close the queue, wait for queued events, and return one report per
    /// event in submission order.
    pub async fn shutdown(self) -> PropagateResult<Vec<PropagationReport>> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| PropagateError::Collaborator(format!("propagation worker failed: {e}")))
    }
}

async fn run_worker<G>(
    driver: Arc<PropagationDriver<G>>,
    mut receiver: mpsc::Receiver<AdvancementEvent>,
    cancelled: watch::Receiver<bool>,
) -> Vec<PropagationReport>
where
    G: ReferenceGraph + 'static,
{
    let mut reports = Vec::new();
    while let Some(event) = receiver.recv().await {
        if *cancelled.borrow() {
            debug!(node = %event.node, "skipping event after cancellation");
            let mut report = PropagationReport::for_origin(event.node);
            report.cancelled = true;
            reports.push(report);
            continue;
        }

        // A pass takes blocking locks and may write to the ledger.
        let node = event.node.clone();
        let pass_driver = Arc::clone(&driver);
        let pass_cancelled = cancelled.clone();
        let pass = task::spawn_blocking(move || {
            pass_driver.node_advanced_until(&event.node, event.info, || *pass_cancelled.borrow())
        });
        let report = match pass.await {
            Ok(report) => report,
            Err(e) => {
                warn!(node = %node, error = %e, "propagation pass aborted");
                let mut report = PropagationReport::for_origin(node.clone());
                report.failures.push(PropagationFailure {
                    node,
                    referrer: None,
                    error: PropagateError::Collaborator(format!("propagation pass aborted: {e}")),
                });
                report
            }
        };
        reports.push(report);
    }
    info!(events = reports.len(), "propagation queue drained");
    reports
}
