use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::NodeId;

/// Structural kind of a tree node.
///
/// Wire names follow the persisted representation (`MODEL`, `FC_SHEET`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreeNodeType {
    Folder,
    /// A graph model; the only kind whose processes may be pinned.
    #[serde(rename = "MODEL")]
    GraphModel,
    #[serde(rename = "MODELTEMPLATE")]
    ModelTemplate,
    Simulation,
    #[serde(rename = "SIMULATIONRESULT")]
    SimulationResult,
    /// A forecast sheet feeding simulations.
    #[serde(rename = "FC_SHEET")]
    ForecastSheet,
    Process,
    Meta,
}

impl TreeNodeType {
    /// Whether versions of this kind can be promoted to releases.
    ///
    /// Only graph models and forecast sheets are citable artifacts.
    pub fn is_releasable(&self) -> bool {
        matches!(self, Self::GraphModel | Self::ForecastSheet)
    }

    fn wire_name(&self) -> &'static str {
        match self {
            Self::Folder => "FOLDER",
            Self::GraphModel => "MODEL",
            Self::ModelTemplate => "MODELTEMPLATE",
            Self::Simulation => "SIMULATION",
            Self::SimulationResult => "SIMULATIONRESULT",
            Self::ForecastSheet => "FC_SHEET",
            Self::Process => "PROCESS",
            Self::Meta => "META",
        }
    }
}

impl fmt::Display for TreeNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for TreeNodeType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FOLDER" => Ok(Self::Folder),
            "MODEL" | "GRAPH_MODEL" => Ok(Self::GraphModel),
            "MODELTEMPLATE" => Ok(Self::ModelTemplate),
            "SIMULATION" => Ok(Self::Simulation),
            "SIMULATIONRESULT" => Ok(Self::SimulationResult),
            "FC_SHEET" => Ok(Self::ForecastSheet),
            "PROCESS" => Ok(Self::Process),
            "META" => Ok(Self::Meta),
            _ => Err(TypeError::UnknownNodeType(s.to_string())),
        }
    }
}

/// Author of a version or release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    #[serde(rename = "ownerId")]
    pub id: String,
    #[serde(rename = "ownerName")]
    pub name: String,
}

impl Owner {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Conceptual identity of a versioned object in the hierarchy.
///
/// A `TreeNode` never owns its versions; those live in the version ledger
/// keyed by [`TreeNode::id`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: TreeNodeType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub path_name: String,
}

impl TreeNode {
    pub fn new(id: NodeId, node_type: TreeNodeType, name: impl Into<String>) -> Self {
        Self {
            id,
            node_type,
            name: name.into(),
            parent_id: None,
            path_name: String::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: NodeId, path_name: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id);
        self.path_name = path_name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_models_and_sheets_are_releasable() {
        assert!(TreeNodeType::GraphModel.is_releasable());
        assert!(TreeNodeType::ForecastSheet.is_releasable());
        assert!(!TreeNodeType::Simulation.is_releasable());
        assert!(!TreeNodeType::Folder.is_releasable());
    }

    #[test]
    fn node_type_uses_persisted_names() {
        let json = serde_json::to_string(&TreeNodeType::ForecastSheet).unwrap();
        assert_eq!(json, "\"FC_SHEET\"");
        let parsed: TreeNodeType = serde_json::from_str("\"MODEL\"").unwrap();
        assert_eq!(parsed, TreeNodeType::GraphModel);
        assert_eq!("fc_sheet".parse::<TreeNodeType>().unwrap(), TreeNodeType::ForecastSheet);
        assert!("WIDGET".parse::<TreeNodeType>().is_err());
    }

    #[test]
    fn tree_node_json_shape() {
        let node = TreeNode::new(NodeId::new("gm-1").unwrap(), TreeNodeType::GraphModel, "Core")
            .with_parent(NodeId::new("root").unwrap(), "/models");
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "MODEL");
        assert_eq!(value["parentId"], "root");
        assert_eq!(value["pathName"], "/models");
    }
}
