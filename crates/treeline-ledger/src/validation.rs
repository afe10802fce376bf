use treeline_types::{NodeId, ReleaseNr, VersionNr};

use crate::error::Result;
use crate::records::{TreeNodeRelease, TreeNodeVersion};
use crate::traits::{NodeCatalog, ReleaseLedger, VersionLedger};

/// Result of validating one node's version and release streams.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub node: NodeId,
    pub version_count: u64,
    pub release_count: u64,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// Version numbers are below 1 or not strictly increasing.
    VersionOrder,
    /// Release numbers are below 1 or not strictly increasing.
    ReleaseOrder,
    /// A release pins a version that does not exist.
    DanglingRelease,
    /// A release pins a version that was not releasable.
    UnreleasableRelease,
    /// A record is timestamped before its predecessor in the same stream.
    TimestampRegression,
}

/// Stream integrity validator.
pub struct StreamValidator;

impl StreamValidator {
    /// Validate one node's streams as held by `ledger`.
    pub fn validate_node<L>(ledger: &L, node: &NodeId) -> Result<ValidationReport>
    where
        L: VersionLedger + ReleaseLedger + ?Sized,
    {
        let versions = ledger.versions(node)?;
        let releases = ledger.releases(node, true)?;
        Ok(Self::validate_records(node, &versions, &releases))
    }

    /// Validate every registered node.
    pub fn validate_all<L>(ledger: &L) -> Result<Vec<ValidationReport>>
    where
        L: NodeCatalog + VersionLedger + ReleaseLedger + ?Sized,
    {
        ledger
            .node_ids()?
            .iter()
            .map(|id| Self::validate_node(ledger, id))
            .collect()
    }

    /// Check raw records, e.g. before importing them.
    pub fn validate_records(
        node: &NodeId,
        versions: &[TreeNodeVersion],
        releases: &[TreeNodeRelease],
    ) -> ValidationReport {
        let mut violations = Vec::new();

        for version in versions.iter().filter(|v| !v.version_nr.is_valid()) {
            violations.push(Violation {
                kind: ViolationKind::VersionOrder,
                description: format!("{} is below {}", version.version_nr, VersionNr::FIRST),
            });
        }
        for release in releases.iter().filter(|r| !r.release_nr.is_valid()) {
            violations.push(Violation {
                kind: ViolationKind::ReleaseOrder,
                description: format!("{} is below {}", release.release_nr, ReleaseNr::FIRST),
            });
        }

        for pair in versions.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.version_nr <= prev.version_nr {
                violations.push(Violation {
                    kind: ViolationKind::VersionOrder,
                    description: format!("{} follows {}", next.version_nr, prev.version_nr),
                });
            }
            if next.timestamp.is_before(&prev.timestamp) {
                violations.push(Violation {
                    kind: ViolationKind::TimestampRegression,
                    description: format!("{} is older than {}", next.version_nr, prev.version_nr),
                });
            }
        }

        for pair in releases.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.release_nr <= prev.release_nr {
                violations.push(Violation {
                    kind: ViolationKind::ReleaseOrder,
                    description: format!("{} follows {}", next.release_nr, prev.release_nr),
                });
            }
            if next.timestamp.is_before(&prev.timestamp) {
                violations.push(Violation {
                    kind: ViolationKind::TimestampRegression,
                    description: format!("{} is older than {}", next.release_nr, prev.release_nr),
                });
            }
        }

        for release in releases {
            match versions.iter().find(|v| v.version_nr == release.version_nr) {
                None => violations.push(Violation {
                    kind: ViolationKind::DanglingRelease,
                    description: format!(
                        "{} pins missing version {}",
                        release.release_nr, release.version_nr
                    ),
                }),
                Some(v) if !v.releasable => violations.push(Violation {
                    kind: ViolationKind::UnreleasableRelease,
                    description: format!(
                        "{} pins non-releasable version {}",
                        release.release_nr, release.version_nr
                    ),
                }),
                Some(_) => {}
            }
        }

        ValidationReport {
            node: node.clone(),
            version_count: versions.len() as u64,
            release_count: releases.len() as u64,
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use treeline_types::{Owner, RecordId, TemporalAnchor, TreeNode, TreeNodeType};

    use crate::memory::InMemoryLedger;
    use crate::records::{ReleasePayload, VersionPayload};

    use super::*;

    fn node() -> NodeId {
        NodeId::new("fc").unwrap()
    }

    fn version(nr: u64, ms: u64, releasable: bool) -> TreeNodeVersion {
        TreeNodeVersion {
            id: RecordId::new(),
            version_nr: VersionNr::new(nr),
            object_id: node(),
            owner: Owner::new("u1", "Ada"),
            timestamp: TemporalAnchor::new(ms, 0, 0),
            description: String::new(),
            releasable,
        }
    }

    fn release(nr: u64, version: u64, ms: u64) -> TreeNodeRelease {
        TreeNodeRelease {
            id: RecordId::new(),
            release_nr: ReleaseNr::new(nr),
            object_id: node(),
            version_nr: VersionNr::new(version),
            owner: Owner::new("u1", "Ada"),
            timestamp: TemporalAnchor::new(ms, 0, 0),
            description: None,
            tags: vec![],
        }
    }

    fn kinds(report: &ValidationReport) -> Vec<ViolationKind> {
        report.violations.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn ledger_streams_are_valid() {
        let ledger = InMemoryLedger::default();
        ledger
            .register_node(TreeNode::new(node(), TreeNodeType::ForecastSheet, "Demand"))
            .unwrap();
        let payload = VersionPayload::new(Owner::new("u1", "Ada"), "", true);
        ledger.record_version(&node(), &payload).unwrap();
        ledger.record_version(&node(), &payload).unwrap();
        ledger
            .cut_release(&node(), VersionNr::new(2), &ReleasePayload::by(Owner::new("u1", "Ada")))
            .unwrap();

        let reports = StreamValidator::validate_all(&ledger).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_valid());
        assert_eq!(reports[0].version_count, 2);
        assert_eq!(reports[0].release_count, 1);
    }

    #[test]
    fn gaps_are_allowed() {
        let versions = [version(1, 10, true), version(4, 20, true)];
        let report = StreamValidator::validate_records(&node(), &versions, &[release(3, 4, 30)]);
        assert!(report.is_valid());
    }

    #[test]
    fn detects_order_and_timestamp_problems() {
        let versions = [version(2, 20, true), version(2, 10, true)];
        let releases = [release(2, 2, 30), release(1, 2, 40)];
        let report = StreamValidator::validate_records(&node(), &versions, &releases);
        assert_eq!(
            kinds(&report),
            vec![
                ViolationKind::VersionOrder,
                ViolationKind::TimestampRegression,
                ViolationKind::ReleaseOrder,
            ]
        );
    }

    #[test]
    fn detects_bad_release_pins() {
        let versions = [version(1, 10, false)];
        let releases = [release(1, 1, 20), release(2, 9, 30)];
        let report = StreamValidator::validate_records(&node(), &versions, &releases);
        assert_eq!(
            kinds(&report),
            vec![ViolationKind::UnreleasableRelease, ViolationKind::DanglingRelease]
        );
    }

    #[test]
    fn detects_numbers_below_one() {
        let versions = [version(0, 10, true), version(1, 20, true)];
        let releases = [release(0, 1, 30)];
        let report = StreamValidator::validate_records(&node(), &versions, &releases);
        assert_eq!(
            kinds(&report),
            vec![ViolationKind::VersionOrder, ViolationKind::ReleaseOrder]
        );
    }
}
