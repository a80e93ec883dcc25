// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge lifecycle: connect, disconnect, port removal and the integrity pass.

use super::Graph;
use crate::edge::{Edge, EdgeId};
use crate::error::{GraphError, Result};
use crate::events::GraphChange;
use crate::node::NodeId;
use crate::port::{PortRef, PushDelegate};
use crate::value::ValueType;

/// What the graph needs to know about one endpoint before wiring an edge
struct Endpoint {
    display_type: ValueType,
    field_type: ValueType,
    custom_io: bool,
    accepts_multiple: bool,
    edges: Vec<EdgeId>,
}

impl Graph {
    /// Connect an output port to an input port, replacing the existing edges
    /// of single-edge ports
    pub fn connect(&mut self, input: PortRef, output: PortRef) -> Result<EdgeId> {
        self.connect_with(input, output, true)
    }

    /// Connect an output port to an input port.
    ///
    /// With `auto_disconnect_inputs`, a port that does not accept multiple
    /// edges loses its current edges first (input side, then output side).
    /// Refused connections leave the graph untouched.
    pub fn connect_with(&mut self, input: PortRef, output: PortRef, auto_disconnect_inputs: bool) -> Result<EdgeId> {
        self.connect_edge(Edge::new(&input, &output), auto_disconnect_inputs)
    }

    /// Wire a prepared edge, keeping its ID
    pub fn connect_edge(&mut self, edge: Edge, auto_disconnect_inputs: bool) -> Result<EdgeId> {
        let (input, output) = (edge.input_ref(), edge.output_ref());
        let input_end = self.endpoint(&input, true)?;
        let output_end = self.endpoint(&output, false)?;

        if !self
            .types
            .types_are_connectable(&output_end.display_type, &input_end.display_type)
        {
            tracing::warn!(
                "Refusing to connect {}.{} ({}) to {}.{} ({})",
                output.node, output.field, output_end.display_type,
                input.node, input.field, input_end.display_type
            );
            return Err(GraphError::IncompatiblePorts {
                output: output_end.display_type,
                input: input_end.display_type,
            });
        }

        if auto_disconnect_inputs {
            if !input_end.accepts_multiple {
                for existing in input_end.edges {
                    self.disconnect(existing);
                }
            }
            if !output_end.accepts_multiple {
                for existing in output_end.edges {
                    self.disconnect(existing);
                }
            }
        }

        self.attach_edge(edge)
    }

    /// Register an edge in the graph and in both ports, then notify both
    /// nodes
    pub(crate) fn attach_edge(&mut self, edge: Edge) -> Result<EdgeId> {
        // Endpoints may have changed shape while older edges were removed
        let input_end = self.endpoint(&edge.input_ref(), true)?;
        let output_end = self.endpoint(&edge.output_ref(), false)?;

        let remote_custom_io = input_end.custom_io || output_end.custom_io;
        let delegate = if remote_custom_io {
            None
        } else {
            PushDelegate::compile(&self.types, &edge, &output_end.field_type, &input_end.field_type)
        };

        let id = edge.id;
        if let Some(port) = self
            .nodes
            .get_mut(&edge.input_node)
            .and_then(|n| n.container_mut(true).get_mut(&edge.input_field, edge.input_port.as_deref()))
        {
            port.add(id, remote_custom_io, None);
        }
        if let Some(port) = self
            .nodes
            .get_mut(&edge.output_node)
            .and_then(|n| n.container_mut(false).get_mut(&edge.output_field, edge.output_port.as_deref()))
        {
            port.add(id, remote_custom_io, delegate);
        }
        self.edges.insert(id, edge.clone());

        tracing::debug!(
            edge = ?id,
            "Connected {}.{} -> {}.{}",
            edge.output_node, edge.output_field, edge.input_node, edge.input_field
        );

        self.on_edge_connected(edge.input_node, &edge);
        if edge.output_node != edge.input_node {
            self.on_edge_connected(edge.output_node, &edge);
        }
        self.events.graph_changes.emit(&GraphChange::EdgeAdded(id));
        Ok(id)
    }

    fn on_edge_connected(&mut self, node_id: NodeId, edge: &Edge) {
        self.update_all_ports(node_id);
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.events.after_edge_connected.emit(edge);
        }
    }

    /// Remove an edge, notify both nodes (input side first) and re-derive
    /// their ports
    pub fn disconnect(&mut self, edge_id: EdgeId) -> Option<Edge> {
        self.detach_edge(edge_id, true)
    }

    /// Remove every edge attached to a port
    pub fn disconnect_port(&mut self, port: &PortRef) -> Vec<Edge> {
        let edges = self
            .nodes
            .get(&port.node)
            .and_then(|n| n.port(&port.field, port.identifier.as_deref()))
            .map(|p| p.edges().to_vec())
            .unwrap_or_default();
        edges.into_iter().filter_map(|e| self.disconnect(e)).collect()
    }

    /// Remove an edge.
    ///
    /// The last edge leaving an input field resets that field to its
    /// default. With `update_ports` false the endpoint nodes keep their
    /// current port shapes; callers are then responsible for re-deriving
    /// them.
    pub(crate) fn detach_edge(&mut self, edge_id: EdgeId, update_ports: bool) -> Option<Edge> {
        let edge = self.edges.shift_remove(&edge_id)?;

        let mut sides = vec![(edge.input_node, true)];
        if edge.output_node != edge.input_node {
            sides.push((edge.output_node, false));
        }

        for (node_id, input_side) in sides {
            let Some(node) = self.nodes.get_mut(&node_id) else {
                continue;
            };
            let self_loop = edge.output_node == edge.input_node;
            if input_side || self_loop {
                if let Some(port) = node.container_mut(true).with_edge_mut(edge_id) {
                    port.remove(edge_id);
                }
            }
            if !input_side || self_loop {
                if let Some(port) = node.container_mut(false).with_edge_mut(edge_id) {
                    port.remove(edge_id);
                }
            }
            if node_id == edge.input_node {
                let still_connected = node
                    .inputs()
                    .of_field(&edge.input_field)
                    .any(|p| !p.edges().is_empty());
                if !still_connected {
                    node.reset_to_default(&edge.input_field);
                }
            }
            if update_ports {
                self.update_all_ports(node_id);
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.events.after_edge_disconnected.emit(&edge);
            }
        }

        tracing::debug!(
            edge = ?edge_id,
            "Disconnected {}.{} -> {}.{}",
            edge.output_node, edge.output_field, edge.input_node, edge.input_field
        );
        self.events.graph_changes.emit(&GraphChange::EdgeRemoved(edge_id));
        Some(edge)
    }

    /// Remove a port and tear down its edges
    pub fn remove_port(&mut self, port: &PortRef) -> Result<()> {
        let node = self.nodes.get(&port.node).ok_or(GraphError::NodeNotFound(port.node))?;
        let input = node
            .is_field_input(&port.field)
            .ok_or_else(|| GraphError::PortNotFound(port.clone()))?;
        if node.container(input).get(&port.field, port.identifier.as_deref()).is_none() {
            return Err(GraphError::PortNotFound(port.clone()));
        }

        self.disconnect_port(port);
        if let Some(node) = self.nodes.get_mut(&port.node) {
            node.remove_port_unchecked(input, &port.field, port.identifier.as_deref());
        }
        Ok(())
    }

    /// Drop every edge whose endpoints no longer resolve to a live node and
    /// port. Returns the pruned edges.
    pub fn prune_dangling_edges(&mut self) -> Vec<EdgeId> {
        let dangling: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| !self.resolves(&e.input_ref(), true) || !self.resolves(&e.output_ref(), false))
            .map(|e| e.id)
            .collect();

        for id in &dangling {
            tracing::warn!(edge = ?id, "Pruning dangling edge");
            self.detach_edge(*id, false);
        }
        dangling
    }

    fn resolves(&self, port: &PortRef, input: bool) -> bool {
        self.nodes
            .get(&port.node)
            .is_some_and(|n| n.container(input).get(&port.field, port.identifier.as_deref()).is_some())
    }

    fn endpoint(&self, port: &PortRef, input: bool) -> Result<Endpoint> {
        let node = self.nodes.get(&port.node).ok_or(GraphError::NodeNotFound(port.node))?;
        let Some(node_port) = node.container(input).get(&port.field, port.identifier.as_deref()) else {
            if node.container(!input).get(&port.field, port.identifier.as_deref()).is_some() {
                return Err(GraphError::WrongDirection { port: port.clone(), expected_input: input });
            }
            return Err(GraphError::PortNotFound(port.clone()));
        };

        Ok(Endpoint {
            display_type: node_port.display_type().clone(),
            field_type: node_port.field_type().clone(),
            custom_io: node_port.has_custom_io(),
            accepts_multiple: node_port.accepts_multiple_edges(),
            edges: node_port.edges().to_vec(),
        })
    }
}
