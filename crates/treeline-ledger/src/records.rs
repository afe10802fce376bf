use serde::{Deserialize, Serialize};
use treeline_types::{NodeId, Owner, RecordId, ReleaseNr, TemporalAnchor, VersionNr};

/// Caller-supplied content of a new version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPayload {
    #[serde(flatten)]
    pub owner: Owner,
    #[serde(default)]
    pub description: String,
    /// Whether the new version may later be promoted to a release.
    pub releasable: bool,
}

impl VersionPayload {
    pub fn new(owner: Owner, description: impl Into<String>, releasable: bool) -> Self {
        Self {
            owner,
            description: description.into(),
            releasable,
        }
    }
}

/// Immutable snapshot of a node's content, numbered per node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeVersion {
    pub id: RecordId,
    #[serde(rename = "versionId")]
    pub version_nr: VersionNr,
    pub object_id: NodeId,
    #[serde(flatten)]
    pub owner: Owner,
    pub timestamp: TemporalAnchor,
    #[serde(default)]
    pub description: String,
    pub releasable: bool,
}

/// Caller-supplied content of a new release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePayload {
    #[serde(flatten)]
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ReleasePayload {
    pub fn by(owner: Owner) -> Self {
        Self {
            owner,
            description: None,
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Immutable, citable pin of one version of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeRelease {
    pub id: RecordId,
    pub release_nr: ReleaseNr,
    pub object_id: NodeId,
    /// The pinned version. Always an existing, releasable version of
    /// `object_id`.
    #[serde(rename = "versionId")]
    pub version_nr: VersionNr,
    #[serde(flatten)]
    pub owner: Owner,
    pub timestamp: TemporalAnchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TreeNodeRelease {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
