//! Tracking mode editing and effective source computation.

use std::fmt;

use serde::{Deserialize, Serialize};
use treeline_types::{ReleaseNr, TreeNodeInfo, VersionNr};

use crate::error::{RefError, Result};
use crate::types::{TrackingMode, TreeNodeReferenceTracking};

/// Release numbers a reference may select, newest first.
pub fn available_release_nrs(target: &TreeNodeInfo) -> Vec<ReleaseNr> {
    match target.release_nr {
        Some(latest) => (1..=latest.get()).rev().map(ReleaseNr::new).collect(),
        None => Vec::new(),
    }
}

/// Switch `reference` to `mode`, resolving it against `target` immediately.
///
/// Switching to `FIXED` pins the latest release and fails on a never-released
/// target. `UNKNOWN` cannot be selected.
pub fn select_tracking_mode(
    reference: &TreeNodeReferenceTracking,
    target: &TreeNodeInfo,
    mode: TrackingMode,
) -> Result<TreeNodeReferenceTracking> {
    ensure_same_target(reference, target)?;
    let node_id = reference.node_id.clone();

    let selected = match mode {
        TrackingMode::CurrentVersion => TreeNodeReferenceTracking::current_version(node_id)
            .with_version(target.current_version_nr),
        TrackingMode::LatestRelease => {
            let version = target
                .released_version_nr
                .unwrap_or(target.current_version_nr);
            TreeNodeReferenceTracking::latest_release(node_id, target.release_nr).with_version(version)
        }
        TrackingMode::Fixed => {
            let latest = target.release_nr.ok_or_else(|| {
                RefError::InvalidArgument(format!("{} has no release to fix to", target.id))
            })?;
            return select_fixed(reference, target, latest);
        }
        TrackingMode::Unknown => {
            return Err(RefError::InvalidArgument(
                "tracking mode UNKNOWN cannot be selected".into(),
            ))
        }
    };
    Ok(selected)
}

/// Fix `reference` to one explicit release of `target`.
pub fn select_fixed(
    reference: &TreeNodeReferenceTracking,
    target: &TreeNodeInfo,
    release_nr: ReleaseNr,
) -> Result<TreeNodeReferenceTracking> {
    ensure_same_target(reference, target)?;
    match target.release_nr {
        Some(latest) if release_nr.get() >= 1 && release_nr <= latest => {}
        _ => {
            return Err(RefError::InvalidArgument(format!(
                "{} has no release {release_nr}",
                target.id
            )))
        }
    }
    Ok(TreeNodeReferenceTracking::fixed(
        reference.node_id.clone(),
        release_nr,
    ))
}

fn ensure_same_target(reference: &TreeNodeReferenceTracking, target: &TreeNodeInfo) -> Result<()> {
    if reference.node_id != target.id {
        return Err(RefError::InvalidArgument(format!(
            "reference targets {} but info describes {}",
            reference.node_id, target.id
        )));
    }
    Ok(())
}

/// The content a reference currently materializes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectiveSource {
    Version(VersionNr),
    Release(ReleaseNr),
}

impl fmt::Display for EffectiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectiveSource::Version(v) => write!(f, "{v}"),
            EffectiveSource::Release(r) => write!(f, "{r}"),
        }
    }
}

/// What `reference` resolves to against `target`. `None` for modes this
/// build does not recognize.
pub fn effective_source(
    reference: &TreeNodeReferenceTracking,
    target: &TreeNodeInfo,
) -> Option<EffectiveSource> {
    let current = EffectiveSource::Version(target.current_version_nr);
    match reference.tracking {
        TrackingMode::CurrentVersion => Some(current),
        TrackingMode::LatestRelease => Some(
            target
                .release_nr
                .map(EffectiveSource::Release)
                .unwrap_or(current),
        ),
        TrackingMode::Fixed => Some(
            reference
                .release_nr
                .map(EffectiveSource::Release)
                .unwrap_or(current),
        ),
        TrackingMode::Unknown => None,
    }
}

/// Dependency token used when fetching referenced content: `latest` for
/// version tracking or an unresolved release, `r<N>` otherwise.
pub fn dependency_token(reference: &TreeNodeReferenceTracking) -> String {
    match (reference.tracking, reference.release_nr) {
        (TrackingMode::CurrentVersion, _) | (_, None) => "latest".to_string(),
        (_, Some(r)) => format!("r{}", r.get()),
    }
}

#[cfg(test)]
mod tests {
    use treeline_types::{NodeId, TreeNode, TreeNodeType};

    use super::*;

    fn id() -> NodeId {
        NodeId::new("gm").unwrap()
    }

    fn info(current: u64, release: Option<(u64, u64)>) -> TreeNodeInfo {
        let node = TreeNode::new(id(), TreeNodeType::GraphModel, "Plant");
        let info = TreeNodeInfo::unreleased(&node, VersionNr::new(current));
        match release {
            Some((r, v)) => info.with_release(ReleaseNr::new(r), VersionNr::new(v)),
            None => info,
        }
    }

    #[test]
    fn available_releases_are_descending() {
        assert!(available_release_nrs(&info(3, None)).is_empty());
        assert_eq!(
            available_release_nrs(&info(9, Some((3, 8)))),
            vec![ReleaseNr::new(3), ReleaseNr::new(2), ReleaseNr::new(1)]
        );
    }

    #[test]
    fn switching_to_latest_release_pins_current_latest() {
        let reference = TreeNodeReferenceTracking::current_version(id());
        let selected =
            select_tracking_mode(&reference, &info(9, Some((2, 7))), TrackingMode::LatestRelease)
                .unwrap();
        assert_eq!(selected.tracking, TrackingMode::LatestRelease);
        assert_eq!(selected.release_nr, Some(ReleaseNr::new(2)));
        assert_eq!(selected.version_nr, Some(VersionNr::new(7)));
    }

    #[test]
    fn switching_to_current_version_drops_release() {
        let reference = TreeNodeReferenceTracking::fixed(id(), ReleaseNr::new(1));
        let selected =
            select_tracking_mode(&reference, &info(4, Some((1, 1))), TrackingMode::CurrentVersion)
                .unwrap();
        assert_eq!(selected.release_nr, None);
        assert_eq!(selected.version_nr, Some(VersionNr::new(4)));
    }

    #[test]
    fn fixed_requires_an_existing_release() {
        let reference = TreeNodeReferenceTracking::current_version(id());
        assert!(select_tracking_mode(&reference, &info(4, None), TrackingMode::Fixed).is_err());
        assert!(select_fixed(&reference, &info(4, Some((2, 3))), ReleaseNr::new(3)).is_err());
        assert!(select_fixed(&reference, &info(4, Some((2, 3))), ReleaseNr::new(0)).is_err());

        let fixed = select_fixed(&reference, &info(4, Some((2, 3))), ReleaseNr::new(1)).unwrap();
        assert_eq!(fixed.tracking, TrackingMode::Fixed);
        assert_eq!(fixed.release_nr, Some(ReleaseNr::new(1)));
    }

    #[test]
    fn mismatched_target_is_rejected() {
        let reference = TreeNodeReferenceTracking::current_version(NodeId::new("other").unwrap());
        let err = select_tracking_mode(&reference, &info(1, None), TrackingMode::CurrentVersion)
            .unwrap_err();
        assert!(matches!(err, RefError::InvalidArgument(_)));
    }

    #[test]
    fn effective_source_per_mode() {
        let released = info(9, Some((2, 7)));
        let unreleased = info(9, None);

        let current = TreeNodeReferenceTracking::current_version(id());
        assert_eq!(
            effective_source(&current, &released),
            Some(EffectiveSource::Version(VersionNr::new(9)))
        );

        let latest = TreeNodeReferenceTracking::latest_release(id(), None);
        assert_eq!(
            effective_source(&latest, &released),
            Some(EffectiveSource::Release(ReleaseNr::new(2)))
        );
        assert_eq!(
            effective_source(&latest, &unreleased),
            Some(EffectiveSource::Version(VersionNr::new(9)))
        );

        let fixed = TreeNodeReferenceTracking::fixed(id(), ReleaseNr::new(1));
        assert_eq!(
            effective_source(&fixed, &released),
            Some(EffectiveSource::Release(ReleaseNr::new(1)))
        );

        let mut unknown = current.clone();
        unknown.tracking = TrackingMode::Unknown;
        assert_eq!(effective_source(&unknown, &released), None);
    }

    #[test]
    fn dependency_tokens() {
        assert_eq!(dependency_token(&TreeNodeReferenceTracking::current_version(id())), "latest");
        assert_eq!(
            dependency_token(&TreeNodeReferenceTracking::latest_release(id(), None)),
            "latest"
        );
        assert_eq!(
            dependency_token(&TreeNodeReferenceTracking::latest_release(id(), Some(ReleaseNr::new(3)))),
            "r3"
        );
        assert_eq!(
            dependency_token(&TreeNodeReferenceTracking::fixed(id(), ReleaseNr::new(5))),
            "r5"
        );
    }
}
