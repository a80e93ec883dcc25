// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node processing: pull inputs, run the logic, push outputs.

use super::Graph;
use crate::edge::EdgeId;
use crate::error::{GraphError, Result};
use crate::node::{NodeId, NodeMessageType, ProcessContext};
use crate::port_data::PortData;
use crate::value::ValueType;

/// Prefix of the messages attached to nodes whose processing failed
const PROCESS_ERROR_PREFIX: &str = "Process failed: ";

/// Outcome of [`Graph::run`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Nodes processed successfully, in execution order
    pub processed: Vec<NodeId>,
    /// Nodes whose processing failed, with the error text
    pub failed: Vec<(NodeId, String)>,
}

impl RunReport {
    /// Whether every node processed successfully
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What pushing or pulling one port needs, captured before mutating the graph
struct PortSnapshot {
    field: String,
    port_data: PortData,
    field_type: ValueType,
    custom_io: bool,
    edges: Vec<EdgeId>,
    remote_custom_io: Vec<EdgeId>,
}

impl Graph {
    /// Process every node with a valid compute order, in ascending order.
    ///
    /// Pass-through buffers are cleared first. A failing node is logged,
    /// gets an error message attached and the run carries on with the
    /// remaining nodes. Call [`Graph::update_compute_order`] after structural
    /// changes so the order is current.
    pub fn run(&mut self) -> RunReport {
        for edge in self.edges.values_mut() {
            edge.pass_through_buffer = None;
        }

        let mut report = RunReport::default();
        for node_id in self.execution_order() {
            match self.process_node(node_id) {
                Ok(()) => report.processed.push(node_id),
                Err(err) => {
                    tracing::error!(node = %node_id, "{err}");
                    if let (GraphError::Process { source, .. }, Some(node)) = (&err, self.nodes.get_mut(&node_id)) {
                        node.add_message(format!("{PROCESS_ERROR_PREFIX}{source}"), NodeMessageType::Error);
                    }
                    report.failed.push((node_id, err.to_string()));
                }
            }
        }

        tracing::debug!(
            processed = report.processed.len(),
            failed = report.failed.len(),
            "Graph `{}` run finished",
            self.name
        );
        report
    }

    /// Process one node: pull its inputs, run its logic, apply the exposed
    /// parameter writes it requested, notify subscribers, then push its
    /// outputs.
    ///
    /// Outputs are not pushed when the logic fails.
    pub fn process_node(&mut self, node_id: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::NodeNotFound(node_id));
        }

        self.pull_inputs(node_id);

        let Some(node) = self.nodes.get_mut(&node_id) else {
            return Err(GraphError::NodeNotFound(node_id));
        };
        node.remove_message_contains(PROCESS_ERROR_PREFIX);

        let (logic, fields) = node.logic_and_fields_mut();
        let mut ctx = ProcessContext::new(node_id, fields, &self.exposed_parameters);
        let result = logic.process(&mut ctx);
        let writes = ctx.into_parameter_writes();

        if let Err(source) = result {
            return Err(GraphError::Process { node: node_id, source });
        }

        for (guid, value) in writes {
            if let Err(err) = self.update_exposed_parameter(guid, value) {
                tracing::warn!(node = %node_id, "Parameter write ignored: {err}");
            }
        }

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.events.processed.emit(&node_id);
        }

        self.push_outputs(node_id);
        Ok(())
    }

    fn port_snapshots(&self, node_id: NodeId, input: bool) -> Vec<PortSnapshot> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        node.container(input)
            .iter()
            .map(|port| PortSnapshot {
                field: port.field_name.clone(),
                port_data: port.port_data.clone(),
                field_type: port.field_type().clone(),
                custom_io: port.has_custom_io(),
                edges: port.edges().to_vec(),
                remote_custom_io: port.remote_custom_io_edges().to_vec(),
            })
            .collect()
    }

    /// Fill input fields from their edges, in port order
    fn pull_inputs(&mut self, node_id: NodeId) {
        let mut pulled_custom: Vec<String> = Vec::new();

        for port in self.port_snapshots(node_id, true) {
            if port.custom_io {
                // Custom handlers see every edge of the field at once
                if pulled_custom.contains(&port.field) {
                    continue;
                }
                let views = self.edge_views(node_id, &port.field);
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    let (logic, fields) = node.logic_and_fields_mut();
                    logic.pull_custom(&port.field, fields, &views);
                }
                pulled_custom.push(port.field);
                continue;
            }

            // Data handed over by a custom handler on the other side
            let Some(first) = port.edges.first() else {
                continue;
            };
            if !port.remote_custom_io.contains(first) {
                continue;
            }
            let Some(buffer) = self.edges.get(first).and_then(|e| e.pass_through_buffer.clone()) else {
                continue;
            };
            let value = self.types.convert(buffer, &port.field_type);
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.set_field(&port.field, value);
            }
        }
    }

    /// Propagate output fields along their edges, in port order
    fn push_outputs(&mut self, node_id: NodeId) {
        for port in self.port_snapshots(node_id, false) {
            if port.custom_io {
                let mut views: Vec<_> = port
                    .edges
                    .iter()
                    .filter_map(|e| self.edge_view(*e, false))
                    .collect();
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    let (logic, fields) = node.logic_and_fields_mut();
                    logic.push_custom(&port.field, fields, &port.port_data, &mut views);
                }
                for view in views {
                    if let Some(edge) = self.edges.get_mut(&view.id) {
                        edge.pass_through_buffer = view.buffer;
                    }
                }
                continue;
            }

            let Some(node) = self.nodes.get(&node_id) else {
                return;
            };
            let value = node.fields().value(&port.field);
            let pushes = node
                .outputs()
                .get(&port.field, port.port_data.identifier())
                .map(|p| p.delegate_pushes(&value, &self.types))
                .unwrap_or_default();

            for (target, field, converted) in pushes {
                if let Some(target) = self.nodes.get_mut(&target) {
                    target.set_field(&field, converted);
                }
            }
            for edge_id in &port.remote_custom_io {
                if let Some(edge) = self.edges.get_mut(edge_id) {
                    edge.pass_through_buffer = Some(value.clone());
                }
            }
        }
    }
}
