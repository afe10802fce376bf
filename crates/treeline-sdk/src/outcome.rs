use serde::Serialize;
use treeline_ledger::{TreeNodeRelease, TreeNodeVersion};
use treeline_propagate::PropagationReport;
use treeline_refs::ReleasePlan;

/// Result of saving a version: the ledger record plus the propagation it
/// triggered.
#[derive(Clone, Debug, Serialize)]
pub struct VersionOutcome {
    pub version: TreeNodeVersion,
    pub propagation: PropagationReport,
}

/// Result of cutting a release.
#[derive(Clone, Debug, Serialize)]
pub struct ReleaseOutcome {
    pub release: TreeNodeRelease,
    /// Process records rewritten as `FIXED` before the release was cut.
    pub pinned: usize,
    pub propagation: PropagationReport,
}

impl ReleaseOutcome {
    pub(crate) fn new(
        release: TreeNodeRelease,
        plan: Option<&ReleasePlan>,
        propagation: PropagationReport,
    ) -> Self {
        Self {
            release,
            pinned: plan.map(|p| p.pins.len()).unwrap_or(0),
            propagation,
        }
    }
}
