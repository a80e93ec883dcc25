// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted graph shape.
//!
//! A [`GraphAsset`] holds what must survive a save: node types, IDs,
//! positions and field values, edge endpoints and exposed parameters. Ports
//! are not stored; they are rebuilt from the fields and edges on load.

use crate::compute_order::ComputeOrderStrategy;
use crate::edge::{Edge, EdgeId};
use crate::error::{GraphError, Result};
use crate::field::Fields;
use crate::graph::Graph;
use crate::node::{NodeId, NodeRect, NodeRegistry};
use crate::parameter::ExposedParameter;
use crate::port::PortRef;
use crate::types::TypeRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Current asset format version
pub const GRAPH_ASSET_VERSION: u32 = 1;

/// Persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAsset {
    /// Registered type name
    pub type_name: String,
    /// Node ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Editor rect
    #[serde(default)]
    pub position: NodeRect,
    /// Declared field values
    #[serde(default)]
    pub fields: Fields,
}

/// Persisted edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAsset {
    /// Edge ID
    pub id: EdgeId,
    /// Node owning the input port
    pub input_node: NodeId,
    /// Field of the input port
    pub input_field: String,
    /// Identifier of the input port
    #[serde(default)]
    pub input_port: Option<String>,
    /// Node owning the output port
    pub output_node: NodeId,
    /// Field of the output port
    pub output_field: String,
    /// Identifier of the output port
    #[serde(default)]
    pub output_port: Option<String>,
}

impl From<&Edge> for EdgeAsset {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id,
            input_node: edge.input_node,
            input_field: edge.input_field.clone(),
            input_port: edge.input_port.clone(),
            output_node: edge.output_node,
            output_field: edge.output_field.clone(),
            output_port: edge.output_port.clone(),
        }
    }
}

impl EdgeAsset {
    fn to_edge(&self) -> Edge {
        Edge::with_id(
            self.id,
            &PortRef::new(self.input_node, self.input_field.clone(), self.input_port.clone()),
            &PortRef::new(self.output_node, self.output_field.clone(), self.output_port.clone()),
        )
    }
}

/// Persisted graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAsset {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Graph name
    pub name: String,
    /// Compute order strategy
    #[serde(default)]
    pub compute_order: ComputeOrderStrategy,
    /// Nodes, in graph order
    #[serde(default)]
    pub nodes: Vec<NodeAsset>,
    /// Edges, in graph order
    #[serde(default)]
    pub edges: Vec<EdgeAsset>,
    /// Exposed parameters
    #[serde(default)]
    pub exposed_parameters: Vec<ExposedParameter>,
}

fn default_version() -> u32 {
    GRAPH_ASSET_VERSION
}

impl GraphAsset {
    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self> {
        let asset: Self = ron::from_str(s)?;
        if asset.version > GRAPH_ASSET_VERSION {
            return Err(GraphError::UnsupportedVersion {
                found: asset.version,
                supported: GRAPH_ASSET_VERSION,
            });
        }
        Ok(asset)
    }

    /// Load an asset file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save to an asset file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

impl Graph {
    /// Capture the persisted shape of the graph
    pub fn to_asset(&self) -> GraphAsset {
        GraphAsset {
            version: GRAPH_ASSET_VERSION,
            name: self.name.clone(),
            compute_order: self.compute_order_strategy,
            nodes: self
                .nodes()
                .map(|node| NodeAsset {
                    type_name: node.type_name().to_string(),
                    id: node.id,
                    name: node.name.clone(),
                    position: node.position,
                    fields: node.fields().clone(),
                })
                .collect(),
            edges: self.edges().map(EdgeAsset::from).collect(),
            exposed_parameters: self.exposed_parameters().to_vec(),
        }
    }

    /// Rebuild a graph from its persisted shape.
    ///
    /// Nodes of unknown type are skipped, as are nodes refusing to enable.
    /// Edges are reconnected without evicting existing ones; edges whose
    /// endpoints cannot be resolved are dropped by the integrity pass.
    /// Compute order is up to date on return.
    pub fn from_asset(asset: &GraphAsset, registry: &NodeRegistry, types: Arc<TypeRegistry>) -> Self {
        let mut graph = Graph::with_types(asset.name.clone(), types);
        graph.compute_order_strategy = asset.compute_order;

        for parameter in &asset.exposed_parameters {
            graph.insert_exposed_parameter(parameter.clone());
        }

        for saved in &asset.nodes {
            let Some(node) = registry.create_node(&saved.type_name) else {
                tracing::warn!(node = %saved.id, "Unknown node type `{}`, skipping", saved.type_name);
                continue;
            };
            let mut node = node.with_id(saved.id).with_name(saved.name.clone());
            node.position = saved.position;
            for (name, value) in saved.fields.iter() {
                if node.fields().contains(name) {
                    node.set_field(name, value.clone());
                } else {
                    tracing::debug!(node = %saved.id, "Dropping unknown field `{name}`");
                }
            }
            if let Err(err) = graph.add_node(node) {
                tracing::warn!("{err}");
            }
        }

        // Dynamic ports only appear once their own inputs are wired, so
        // edges that miss a port are retried until no more can be placed
        let mut pending: Vec<&EdgeAsset> = asset.edges.iter().collect();
        loop {
            let before = pending.len();
            pending.retain(|saved| match graph.connect_edge(saved.to_edge(), false) {
                Ok(_) => false,
                Err(GraphError::PortNotFound(_)) => true,
                Err(err) => {
                    tracing::warn!(edge = ?saved.id, "Dropping edge: {err}");
                    false
                }
            });
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }
        for saved in pending {
            tracing::warn!(
                edge = ?saved.id,
                "Dropping dangling edge {}.{} -> {}.{}",
                saved.output_node, saved.output_field, saved.input_node, saved.input_field
            );
        }

        graph.prune_dangling_edges();
        graph.update_compute_order();
        graph
    }
}
