//! Reference tracking resolver.
//!
//! Decides whether a reference is stale with respect to its target's
//! [`TreeNodeInfo`] and, if so, what it should be advanced to. The resolver is
//! a pure function: it never touches storage and never fails.
//!
//! Decision order:
//!
//! 1. `CURRENT_VERSION`, or `LATEST_RELEASE` on a never-released target:
//!    compare `known_version_nr` with the target's current version.
//! 2. `LATEST_RELEASE` on a released target: compare release numbers only.
//! 3. Any other mode: no update.

use treeline_types::{TreeNodeInfo, VersionNr};

use crate::types::{TrackingMode, TrackingUpdate, TreeNodeReferenceTracking};

/// Resolve `reference` against `target`.
///
/// `known_version_nr` is the version the caller believes the reference is on.
/// It is deliberately independent of the stored record so call sites can
/// check drift against an older cached value. Release tracking on a released
/// target ignores it entirely.
///
/// # Examples
///
/// ```
/// use treeline_refs::{resolve, TrackingUpdate, TreeNodeReferenceTracking};
/// use treeline_types::{NodeId, TreeNode, TreeNodeInfo, TreeNodeType, VersionNr};
///
/// let id = NodeId::new("gm-1").unwrap();
/// let node = TreeNode::new(id.clone(), TreeNodeType::GraphModel, "Plant");
/// let target = TreeNodeInfo::unreleased(&node, VersionNr::new(5));
/// let reference = TreeNodeReferenceTracking::current_version(id);
///
/// assert_eq!(resolve(&target, &reference, Some(VersionNr::new(5))), None);
/// assert_eq!(
///     resolve(&target, &reference, Some(VersionNr::new(3))),
///     Some(TrackingUpdate::Version(VersionNr::new(5)))
/// );
/// ```
pub fn resolve(
    target: &TreeNodeInfo,
    reference: &TreeNodeReferenceTracking,
    known_version_nr: Option<VersionNr>,
) -> Option<TrackingUpdate> {
    match (reference.tracking, target.release_nr) {
        (TrackingMode::CurrentVersion, _) | (TrackingMode::LatestRelease, None) => {
            match known_version_nr {
                Some(known) if known >= target.current_version_nr => None,
                _ => Some(TrackingUpdate::Version(target.current_version_nr)),
            }
        }
        (TrackingMode::LatestRelease, Some(latest)) => {
            if reference.release_nr == Some(latest) {
                None
            } else {
                Some(TrackingUpdate::Release(latest))
            }
        }
        (TrackingMode::Fixed, _) => None,
        (TrackingMode::Unknown, _) => None,
    }
}

/// Resolve using the version stored on the record as the known version.
pub fn resolve_stored(
    target: &TreeNodeInfo,
    reference: &TreeNodeReferenceTracking,
) -> Option<TrackingUpdate> {
    resolve(target, reference, reference.version_nr)
}
