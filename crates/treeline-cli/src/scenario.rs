//! JSON scenario files.
//!
//! A scenario describes a set of tree nodes with their version and release
//! history, the references between them and the process pins, and is loaded
//! into a fresh in-memory engine.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use treeline_ledger::{TreeNodeRelease, TreeNodeVersion};
use treeline_sdk::{
    EngineConfig, NodeId, Owner, ReleaseNr, ReleaseProcessPinning, TreeNode, Treeline, VersionNr,
};
use treeline_refs::StoredReference;
use treeline_types::{RecordId, TemporalAnchor};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub nodes: Vec<ScenarioNode>,
    #[serde(default)]
    pub references: Vec<StoredReference>,
    #[serde(default)]
    pub pins: Vec<ReleaseProcessPinning>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioNode {
    #[serde(flatten)]
    pub node: TreeNode,
    #[serde(default)]
    pub versions: Vec<ScenarioVersion>,
    #[serde(default)]
    pub releases: Vec<ScenarioRelease>,
    /// Graph models this node's processes depend on.
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioVersion {
    pub version_nr: VersionNr,
    #[serde(default = "releasable_by_default")]
    pub releasable: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRelease {
    pub release_nr: ReleaseNr,
    pub version_nr: VersionNr,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn releasable_by_default() -> bool {
    true
}

fn import_owner() -> Owner {
    Owner::new("scenario", "scenario import")
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("loading scenario {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build an engine holding this scenario's state.
    ///
    /// Histories are imported as-is, so version and release numbers may skip
    /// values. References and pins go through the engine's validation.
    pub fn build(&self, config: EngineConfig) -> anyhow::Result<Treeline> {
        let writer = config.node_id;
        let engine = Treeline::new(config);
        for entry in &self.nodes {
            engine.create_node(entry.node.clone())?;
        }

        for entry in &self.nodes {
            let id = &entry.node.id;
            let mut last: Option<TemporalAnchor> = None;
            for version in &entry.versions {
                let timestamp = TemporalAnchor::following(last.as_ref(), writer);
                last = Some(timestamp);
                engine
                    .ledger()
                    .restore_version(TreeNodeVersion {
                        id: RecordId::new(),
                        version_nr: version.version_nr,
                        object_id: id.clone(),
                        owner: import_owner(),
                        timestamp,
                        description: version.description.clone(),
                        releasable: version.releasable,
                    })
                    .with_context(|| format!("importing {id} {}", version.version_nr))?;
            }
            for release in &entry.releases {
                let timestamp = TemporalAnchor::following(last.as_ref(), writer);
                last = Some(timestamp);
                engine
                    .ledger()
                    .restore_release(TreeNodeRelease {
                        id: RecordId::new(),
                        release_nr: release.release_nr,
                        object_id: id.clone(),
                        version_nr: release.version_nr,
                        owner: import_owner(),
                        timestamp,
                        description: None,
                        tags: release.tags.clone(),
                    })
                    .with_context(|| format!("importing {id} {}", release.release_nr))?;
            }
        }

        for entry in self.nodes.iter().filter(|n| !n.dependencies.is_empty()) {
            engine.set_dependencies(&entry.node.id, entry.dependencies.clone())?;
        }
        for reference in &self.references {
            engine
                .track(&reference.referrer, &reference.tracking)
                .with_context(|| format!("reference held by {}", reference.referrer))?;
        }
        for pin in &self.pins {
            engine.pin(&pin.process_id, &pin.graph_model_id, pin.release_nr)?;
        }
        info!(
            nodes = self.nodes.len(),
            references = self.references.len(),
            pins = self.pins.len(),
            "scenario loaded"
        );
        Ok(engine)
    }
}
