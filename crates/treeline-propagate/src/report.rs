//! Outcome of one propagation pass.

use serde::Serialize;
use treeline_refs::{Referrer, TrackingUpdate};
use treeline_types::NodeId;

use crate::error::PropagateError;

/// An update written to a referrer's tracking record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedUpdate {
    pub referrer: Referrer,
    pub target: NodeId,
    pub update: TrackingUpdate,
}

/// A step of the pass that failed. Siblings are unaffected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropagationFailure {
    /// The advanced node whose references were being processed.
    pub node: NodeId,
    /// The reference being updated, or `None` if the failure concerned the
    /// node itself (listing its references, advancing it).
    pub referrer: Option<Referrer>,
    #[serde(serialize_with = "display")]
    pub error: PropagateError,
}

fn display<S: serde::Serializer>(error: &PropagateError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Batch result of propagating one advancement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    /// The node whose advancement started the pass.
    pub origin: Option<NodeId>,
    pub applied: Vec<AppliedUpdate>,
    /// References that were already current.
    pub unchanged: usize,
    /// Owners advanced because their references changed, in pass order.
    pub advanced: Vec<NodeId>,
    /// Owners reached again after they had already advanced in this pass.
    pub skipped_revisits: Vec<NodeId>,
    /// Advanced nodes whose references were not processed because the pass
    /// hit its depth limit.
    pub truncated: Vec<NodeId>,
    pub failures: Vec<PropagationFailure>,
    pub cancelled: bool,
}

impl PropagationReport {
    pub fn for_origin(origin: NodeId) -> Self {
        Self {
            origin: Some(origin),
            ..Self::default()
        }
    }

    /// Returns `true` if every step succeeded and the pass ran to completion.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled && self.truncated.is_empty()
    }

    /// Number of updates applied to references held by `owner`.
    pub fn updates_for(&self, owner: &NodeId) -> usize {
        self.applied
            .iter()
            .filter(|a| a.referrer.owner() == owner)
            .count()
    }
}
