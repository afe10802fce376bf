//! Reference-side types.
//!
//! A reference is held by a *referrer* (a tree node, or a process inside a
//! graph model) and points at a target tree node under some tracking mode.

use std::fmt;

use serde::{Deserialize, Serialize};
use treeline_types::{NodeId, ProcessId, ReleaseNr, VersionNr};

/// Policy by which a reference stays current.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingMode {
    /// Follow the target's newest version.
    CurrentVersion,
    /// Follow the target's newest release, or its newest version while the
    /// target has never been released.
    LatestRelease,
    /// Stay on one explicit release. Never advanced by reconciliation.
    Fixed,
    /// A mode this build does not recognize. Never advanced.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackingMode::CurrentVersion => "CURRENT_VERSION",
            TrackingMode::LatestRelease => "LATEST_RELEASE",
            TrackingMode::Fixed => "FIXED",
            TrackingMode::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// What a stale reference should be advanced to.
///
/// Serialized as `{"releaseNr": n}` or `{"versionNr": n}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingUpdate {
    #[serde(rename = "releaseNr")]
    Release(ReleaseNr),
    #[serde(rename = "versionNr")]
    Version(VersionNr),
}

impl fmt::Display for TrackingUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingUpdate::Release(r) => write!(f, "release {r}"),
            TrackingUpdate::Version(v) => write!(f, "version {v}"),
        }
    }
}

/// The stored tracking record of one reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeReferenceTracking {
    /// The referenced (target) node.
    pub node_id: NodeId,
    pub tracking: TrackingMode,
    /// The release the reference believes it is on. `None` means not yet
    /// resolved to any release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_nr: Option<ReleaseNr>,
    /// The version the reference last resolved to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_nr: Option<VersionNr>,
}

impl TreeNodeReferenceTracking {
    pub fn current_version(node_id: NodeId) -> Self {
        Self {
            node_id,
            tracking: TrackingMode::CurrentVersion,
            release_nr: None,
            version_nr: None,
        }
    }

    pub fn latest_release(node_id: NodeId, release_nr: Option<ReleaseNr>) -> Self {
        Self {
            node_id,
            tracking: TrackingMode::LatestRelease,
            release_nr,
            version_nr: None,
        }
    }

    pub fn fixed(node_id: NodeId, release_nr: ReleaseNr) -> Self {
        Self {
            node_id,
            tracking: TrackingMode::Fixed,
            release_nr: Some(release_nr),
            version_nr: None,
        }
    }

    /// Record the version this reference is known to be on.
    pub fn with_version(mut self, version_nr: VersionNr) -> Self {
        self.version_nr = Some(version_nr);
        self
    }

    /// Whether an update of this kind can land on a record in this mode.
    ///
    /// Only `LATEST_RELEASE` moves between releases; `FIXED` and unknown
    /// modes never take updates.
    pub fn accepts(&self, update: TrackingUpdate) -> bool {
        match (self.tracking, update) {
            (TrackingMode::CurrentVersion, TrackingUpdate::Version(_)) => true,
            (TrackingMode::CurrentVersion, TrackingUpdate::Release(_)) => false,
            (TrackingMode::LatestRelease, _) => true,
            (TrackingMode::Fixed, _) => false,
            (TrackingMode::Unknown, _) => false,
        }
    }

    /// Write a resolver update into this record.
    pub fn apply(&mut self, update: TrackingUpdate) {
        match update {
            TrackingUpdate::Release(r) => self.release_nr = Some(r),
            TrackingUpdate::Version(v) => self.version_nr = Some(v),
        }
    }

    /// Owned variant of [`apply`](Self::apply).
    pub fn applied(mut self, update: TrackingUpdate) -> Self {
        self.apply(update);
        self
    }
}

/// The entity that holds a reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Referrer {
    /// A tree node referencing another one, e.g. a forecast sheet consumed
    /// by a simulation.
    Node { node: NodeId },
    /// A process inside graph model `model` that embeds another graph model.
    Process { model: NodeId, process: ProcessId },
}

impl Referrer {
    pub fn node(node: NodeId) -> Self {
        Referrer::Node { node }
    }

    pub fn process(model: NodeId, process: ProcessId) -> Self {
        Referrer::Process { model, process }
    }

    /// The tree node whose content contains the reference.
    pub fn owner(&self) -> &NodeId {
        match self {
            Referrer::Node { node } => node,
            Referrer::Process { model, .. } => model,
        }
    }

    pub fn process_id(&self) -> Option<&ProcessId> {
        match self {
            Referrer::Node { .. } => None,
            Referrer::Process { process, .. } => Some(process),
        }
    }
}

impl fmt::Display for Referrer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referrer::Node { node } => write!(f, "{node}"),
            Referrer::Process { model, process } => write!(f, "{model}/{process}"),
        }
    }
}

/// A tracking record together with the entity holding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReference {
    pub referrer: Referrer,
    pub tracking: TreeNodeReferenceTracking,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gm() -> NodeId {
        NodeId::new("gm-1").unwrap()
    }

    #[test]
    fn tracking_modes_use_wire_names() {
        let json = serde_json::to_string(&TrackingMode::LatestRelease).unwrap();
        assert_eq!(json, "\"LATEST_RELEASE\"");
        let mode: TrackingMode = serde_json::from_str("\"FIXED\"").unwrap();
        assert_eq!(mode, TrackingMode::Fixed);
    }

    #[test]
    fn unrecognized_mode_decodes_as_unknown() {
        let record: TreeNodeReferenceTracking =
            serde_json::from_str(r#"{"nodeId":"gm-1","tracking":"PINNED_BY_POLICY","releaseNr":2}"#)
                .unwrap();
        assert_eq!(record.tracking, TrackingMode::Unknown);
        assert_eq!(record.release_nr, Some(ReleaseNr::new(2)));
    }

    #[test]
    fn update_serializes_as_single_field_object() {
        let json = serde_json::to_value(TrackingUpdate::Release(ReleaseNr::new(3))).unwrap();
        assert_eq!(json, serde_json::json!({ "releaseNr": 3 }));
        let json = serde_json::to_value(TrackingUpdate::Version(VersionNr::new(7))).unwrap();
        assert_eq!(json, serde_json::json!({ "versionNr": 7 }));
    }

    #[test]
    fn only_tracking_modes_accept_updates() {
        let release = TrackingUpdate::Release(ReleaseNr::new(2));
        let version = TrackingUpdate::Version(VersionNr::new(2));
        let latest = TreeNodeReferenceTracking::latest_release(gm(), None);
        assert!(latest.accepts(release) && latest.accepts(version));
        let current = TreeNodeReferenceTracking::current_version(gm());
        assert!(current.accepts(version));
        assert!(!current.accepts(release));
        let fixed = TreeNodeReferenceTracking::fixed(gm(), ReleaseNr::new(1));
        assert!(!fixed.accepts(release) && !fixed.accepts(version));
    }

    #[test]
    fn apply_touches_only_the_updated_field() {
        let mut record = TreeNodeReferenceTracking::latest_release(gm(), Some(ReleaseNr::new(1)))
            .with_version(VersionNr::new(4));
        record.apply(TrackingUpdate::Release(ReleaseNr::new(2)));
        assert_eq!(record.release_nr, Some(ReleaseNr::new(2)));
        assert_eq!(record.version_nr, Some(VersionNr::new(4)));

        let record = record.applied(TrackingUpdate::Version(VersionNr::new(9)));
        assert_eq!(record.version_nr, Some(VersionNr::new(9)));
        assert_eq!(record.tracking, TrackingMode::LatestRelease);
    }

    #[test]
    fn referrer_owner_and_display() {
        let p = Referrer::process(gm(), ProcessId::new("p-7").unwrap());
        assert_eq!(p.owner(), &gm());
        assert_eq!(p.to_string(), "gm-1/p-7");
        assert!(Referrer::node(gm()).process_id().is_none());

        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["kind"], "process");
        assert_eq!(json["model"], "gm-1");
    }
}
