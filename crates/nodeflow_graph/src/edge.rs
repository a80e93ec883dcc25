// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.

use crate::node::NodeId;
use crate::port::PortRef;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    /// Create a new random edge ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A directed connection from one output port to one input port.
///
/// Endpoints are stored as node ids plus field name and port identifier and
/// are resolved through the owning graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge ID
    pub id: EdgeId,
    /// Node owning the input port
    pub input_node: NodeId,
    /// Field of the input port
    pub input_field: String,
    /// Identifier of the input port
    pub input_port: Option<String>,
    /// Node owning the output port
    pub output_node: NodeId,
    /// Field of the output port
    pub output_field: String,
    /// Identifier of the output port
    pub output_port: Option<String>,
    /// Value handed over by custom I/O handlers, valid for the current run
    #[serde(skip)]
    pub pass_through_buffer: Option<Value>,
}

impl Edge {
    /// Create a new edge between two ports
    pub fn new(input: &PortRef, output: &PortRef) -> Self {
        Self::with_id(EdgeId::new(), input, output)
    }

    /// Create an edge with a known ID (used when loading assets)
    pub fn with_id(id: EdgeId, input: &PortRef, output: &PortRef) -> Self {
        Self {
            id,
            input_node: input.node,
            input_field: input.field.clone(),
            input_port: input.identifier.clone(),
            output_node: output.node,
            output_field: output.field.clone(),
            output_port: output.identifier.clone(),
            pass_through_buffer: None,
        }
    }

    /// Address of the input endpoint
    pub fn input_ref(&self) -> PortRef {
        PortRef::new(self.input_node, self.input_field.clone(), self.input_port.clone())
    }

    /// Address of the output endpoint
    pub fn output_ref(&self) -> PortRef {
        PortRef::new(self.output_node, self.output_field.clone(), self.output_port.clone())
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.input_node == node_id || self.output_node == node_id
    }

    /// Endpoint opposite to the given side: `(node, field)`
    pub fn other_end(&self, from_input_side: bool) -> (NodeId, &str) {
        if from_input_side {
            (self.output_node, &self.output_field)
        } else {
            (self.input_node, &self.input_field)
        }
    }
}
