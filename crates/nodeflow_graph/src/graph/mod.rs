// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and edges.
//!
//! The graph is the sole owner of its nodes and edges. Edges refer to their
//! endpoints by node ID, field name and port identifier, and every lookup
//! goes through the graph's maps, so removing a node can never leave an edge
//! pointing at freed state: edges are torn down first, and any edge that
//! still fails to resolve is dropped by [`Graph::prune_dangling_edges`].

mod connect;
mod parameters;
mod ports;
mod process;

pub use process::RunReport;

use crate::compute_order::ComputeOrderStrategy;
use crate::edge::{Edge, EdgeId};
use crate::error::{GraphError, Result};
use crate::events::{GraphChange, GraphEvents};
use crate::node::{BaseNode, EdgeView, EnableContext, NodeId};
use crate::parameter::ExposedParameter;
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use std::sync::Arc;

/// A node graph
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Strategy used by [`Graph::update_compute_order`]
    pub compute_order_strategy: ComputeOrderStrategy,
    /// Subscribers
    pub events: GraphEvents,
    nodes: IndexMap<NodeId, BaseNode>,
    edges: IndexMap<EdgeId, Edge>,
    exposed_parameters: Vec<ExposedParameter>,
    types: Arc<TypeRegistry>,
}

impl Graph {
    /// Create a new empty graph using the default type adapters
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_types(name, Arc::new(TypeRegistry::with_default_adapters()))
    }

    /// Create a new empty graph sharing a type registry
    pub fn with_types(name: impl Into<String>, types: Arc<TypeRegistry>) -> Self {
        Self {
            name: name.into(),
            compute_order_strategy: ComputeOrderStrategy::default(),
            events: GraphEvents::default(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            exposed_parameters: Vec::new(),
            types,
        }
    }

    /// Type rules used by this graph
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Shared handle to the type rules
    pub fn types_handle(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.types)
    }

    /// Add a node, build its ports and enable it.
    ///
    /// A node whose logic refuses to enable (for instance a parameter node
    /// whose parameter does not exist) is removed again and reported as
    /// [`GraphError::NodeRejected`].
    pub fn add_node(&mut self, node: BaseNode) -> Result<NodeId> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        self.initialize_ports(id);

        if let Err(source) = self.enable_node(id) {
            tracing::warn!(node = %id, "Removing node: {source}");
            self.remove_node(id);
            return Err(GraphError::NodeRejected { node: id, source });
        }

        self.events.graph_changes.emit(&GraphChange::NodeAdded(id));
        Ok(id)
    }

    /// Remove a node and its edges.
    ///
    /// Every edge is disconnected first (notifying the nodes at the other
    /// end), then the node is destroyed.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<BaseNode> {
        let edges = self.nodes.get(&node_id)?.all_edges();
        for edge in edges {
            self.disconnect(edge);
        }

        let mut node = self.nodes.shift_remove(&node_id)?;
        node.destroy();
        self.events.graph_changes.emit(&GraphChange::NodeRemoved(node_id));
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&BaseNode> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut BaseNode> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &BaseNode> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get an edge by ID
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.get(&edge_id)
    }

    /// Get all edges
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges involving a node
    pub fn edges_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(move |e| e.involves_node(node_id))
    }

    /// Nodes feeding `node_id`, without duplicates, in edge order
    pub fn input_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for edge in self.edges.values().filter(|e| e.input_node == node_id) {
            if !nodes.contains(&edge.output_node) {
                nodes.push(edge.output_node);
            }
        }
        nodes
    }

    /// Nodes fed by `node_id`, without duplicates, in edge order
    pub fn output_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for edge in self.edges.values().filter(|e| e.output_node == node_id) {
            if !nodes.contains(&edge.input_node) {
                nodes.push(edge.input_node);
            }
        }
        nodes
    }

    /// Snapshot of the edges attached to a field's ports, seen from that
    /// field, in port order then connection order
    pub fn edge_views(&self, node_id: NodeId, field: &str) -> Vec<EdgeView> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        let Some(input) = node.is_field_input(field) else {
            return Vec::new();
        };
        node.container(input)
            .of_field(field)
            .flat_map(|p| p.edges().iter().copied())
            .filter_map(|e| self.edge_view(e, input))
            .collect()
    }

    /// Snapshot of one edge seen from its input side (`from_input_side`) or
    /// its output side
    pub fn edge_view(&self, edge_id: EdgeId, from_input_side: bool) -> Option<EdgeView> {
        let edge = self.edges.get(&edge_id)?;
        let (other_node, other_field) = edge.other_end(from_input_side);
        let other_identifier = if from_input_side { &edge.output_port } else { &edge.input_port };
        let node = self.nodes.get(&other_node)?;
        let port = node
            .container(!from_input_side)
            .get(other_field, other_identifier.as_deref())?;

        Some(EdgeView {
            id: edge_id,
            other_node,
            other_node_type: node.type_name().to_string(),
            other_field: other_field.to_string(),
            other_port: port.port_data.clone(),
            other_type: port.display_type().clone(),
            buffer: edge.pass_through_buffer.clone(),
        })
    }

    /// Re-run [`NodeLogic::enable`](crate::node::NodeLogic::enable) on every
    /// node and remove the ones that refuse
    pub fn revalidate_nodes(&mut self) -> Vec<NodeId> {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        let mut removed = Vec::new();
        for id in ids {
            if let Err(err) = self.enable_node(id) {
                tracing::warn!(node = %id, "Removing node: {err}");
                self.remove_node(id);
                removed.push(id);
            }
        }
        removed
    }

    /// Disable every node (host is unloading the graph)
    pub fn disable(&mut self) {
        for node in self.nodes.values_mut() {
            node.disable();
        }
    }

    fn enable_node(&mut self, node_id: NodeId) -> std::result::Result<(), crate::error::ProcessError> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Ok(());
        };
        let ctx = EnableContext { graph: self, node: node_id, fields: node.fields() };
        node.logic().enable(&ctx)?;
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.set_enabled(true);
        }
        Ok(())
    }

    /// Build the initial ports of a freshly added node
    fn initialize_ports(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        let descriptors = node.descriptors().to_vec();
        for descriptor in descriptors.iter().filter(|d| d.has_ports()) {
            if descriptor.has_custom_behavior() {
                self.update_ports_for_field_local(node_id, &descriptor.name, false);
            } else if let Some(node) = self.nodes.get_mut(&node_id) {
                node.add_port(&descriptor.name, descriptor.default_port_data());
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{AddNode, ConstantNode, ParameterNode};
    use crate::port::PortRef;
    use crate::value::{Value, ValueType};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_add_node_builds_static_ports() {
        let mut graph = Graph::default();
        let id = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
        let node = graph.node(id).unwrap();

        assert!(node.is_enabled());
        assert_eq!(node.inputs().len(), 2);
        assert_eq!(node.outputs().len(), 1);
        assert!(node.port("a", None).is_some());
        assert!(node.port("sum", None).unwrap().accepts_multiple_edges());
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = Graph::default();
        let node = BaseNode::from_logic(AddNode);
        let id = node.id;
        graph.add_node(node).unwrap();
        let again = BaseNode::from_logic(AddNode).with_id(id);
        assert!(matches!(graph.add_node(again), Err(GraphError::DuplicateNode(_))));
    }

    #[test]
    fn test_remove_node_disconnects_edges() {
        let mut graph = Graph::default();
        let a = graph.add_node(BaseNode::from_logic(ConstantNode::new(ValueType::Float))).unwrap();
        let b = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
        graph
            .connect(PortRef::field(b, "a"), PortRef::field(a, "value"))
            .unwrap();

        let changes = Rc::new(RefCell::new(Vec::new()));
        {
            let changes = changes.clone();
            graph.events.graph_changes.subscribe(move |c| changes.borrow_mut().push(*c));
        }

        assert!(graph.remove_node(a).is_some());
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.node(b).unwrap().inputs().edges().next().is_none());
        assert!(matches!(changes.borrow()[0], GraphChange::EdgeRemoved(_)));
        assert_eq!(changes.borrow().last(), Some(&GraphChange::NodeRemoved(a)));
    }

    #[test]
    fn test_unresolved_parameter_node_removes_itself() {
        let mut graph = Graph::default();
        let node = BaseNode::from_logic(ParameterNode::get())
            .with_field(ParameterNode::GUID_FIELD, Value::String(uuid::Uuid::new_v4().to_string()));
        let result = graph.add_node(node);

        assert!(matches!(result, Err(GraphError::NodeRejected { .. })));
        assert_eq!(graph.node_count(), 0);
    }
}
