// SPDX-License-Identifier: MIT OR Apache-2.0
//! Relay node: fan-in and fan-out of arbitrary edges.
//!
//! Every edge entering a relay is packed into a [`PackedRecord`] (values,
//! display names and types, in edge order). On the way out the record is
//! either forwarded whole, or, with `unpack_output`, split into one typed
//! output port per packed entry plus a `Pack` port carrying the record for
//! further relays.
//!
//! Port shapes are derived from the upstream edges, looking through chains
//! of single-edge relays, so they change whenever connectivity changes.

use crate::error::ProcessError;
use crate::field::{FieldDescriptor, Fields, PortBehavior};
use crate::graph::Graph;
use crate::node::{EdgeView, NodeId, NodeLogic, PortBehaviorContext, ProcessContext};
use crate::port_data::PortData;
use crate::value::{PackedRecord, Value, ValueType};
use std::collections::HashSet;

/// Type name of relay nodes
pub const RELAY_TYPE_NAME: &str = "Relay";
/// Identifier of the port exposing the whole record in unpacked mode
pub const PACK_PORT_IDENTIFIER: &str = "_Pack";

const PORT_SIZE_PER_EDGE: u32 = 8;
const MAX_PORT_SIZE: u32 = 14 * PORT_SIZE_PER_EDGE;

/// Pass-through node packing several edges into one and unpacking them
#[derive(Debug, Clone, Default)]
pub struct RelayNode {
    /// Next packed entry handed to an unpacked output port
    output_index: usize,
}

impl RelayNode {
    /// Setting: split the record into one output port per entry
    pub const UNPACK_OUTPUT: &'static str = "unpack_output";
    /// Setting: wrap a record coming from a single upstream relay instead of
    /// passing it through
    pub const PACK_INPUT: &'static str = "pack_input";

    fn is_relay(edge: &EdgeView) -> bool {
        edge.other_node_type == RELAY_TYPE_NAME
    }

    /// Whether the edge carries another relay's whole record, as opposed to
    /// a single unpacked entry
    fn carries_record(edge: &EdgeView) -> bool {
        Self::is_relay(edge) && edge.other_type == ValueType::Packed
    }

    /// Edges whose values end up in this relay's record: a single edge
    /// carrying another relay's record is looked through
    fn underlying_edges(graph: &Graph, node: NodeId) -> Vec<EdgeView> {
        let mut visited = HashSet::from([node]);
        let mut current = node;
        let mut edges = graph.edge_views(node, "input");

        loop {
            let [edge] = edges.as_slice() else {
                return edges;
            };
            let packs_input = graph
                .node(current)
                .and_then(|n| n.fields().get_bool(Self::PACK_INPUT))
                .unwrap_or(false);
            if packs_input || !Self::carries_record(edge) || !visited.insert(edge.other_node) {
                return edges;
            }
            let upstream = edge.other_node;
            let upstream_edges = graph.edge_views(upstream, "input");
            if upstream_edges.is_empty() {
                return edges;
            }
            current = upstream;
            edges = upstream_edges;
        }
    }

    fn output_ports(ctx: &PortBehaviorContext<'_>) -> Vec<PortData> {
        let direct = ctx.graph.edge_views(ctx.node, "input");
        let underlying = Self::underlying_edges(ctx.graph, ctx.node);
        let unpack = ctx.fields.get_bool(Self::UNPACK_OUTPUT).unwrap_or(false);

        if unpack && !underlying.is_empty() {
            let mut ports = vec![PortData::new("Pack", ValueType::Packed)
                .with_identifier(PACK_PORT_IDENTIFIER)
                .multiple()];
            for (index, edge) in underlying.iter().enumerate() {
                let name = if edge.other_port.display_name.is_empty() {
                    format!("Item {index}")
                } else {
                    edge.other_port.display_name.clone()
                };
                ports.push(
                    PortData::new(name, edge.other_type.clone())
                        .with_identifier(index.to_string())
                        .multiple(),
                );
            }
            return ports;
        }

        let value_type = match direct.as_slice() {
            [] => ValueType::Any,
            [edge] if !Self::carries_record(edge) => edge.other_type.clone(),
            _ => ValueType::Packed,
        };
        let count = u32::try_from(underlying.len()).unwrap_or(u32::MAX);
        vec![PortData::new("", value_type)
            .with_identifier("0")
            .multiple()
            .with_size(count.saturating_mul(PORT_SIZE_PER_EDGE).min(MAX_PORT_SIZE))]
    }
}

impl NodeLogic for RelayNode {
    fn type_name(&self) -> &'static str {
        RELAY_TYPE_NAME
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::input("input", ValueType::Any)
                .allow_multiple(true)
                .with_behavior(PortBehavior::Custom)
                .custom_io(),
            FieldDescriptor::output("output", ValueType::Any)
                .with_behavior(PortBehavior::Custom)
                .custom_io(),
            FieldDescriptor::setting(Self::UNPACK_OUTPUT, ValueType::Bool),
            FieldDescriptor::setting(Self::PACK_INPUT, ValueType::Bool),
        ]
    }

    fn port_behavior(&self, field: &str, ctx: &PortBehaviorContext<'_>) -> Option<Vec<PortData>> {
        match field {
            "input" => Some(vec![PortData::new("", ValueType::Any).multiple()]),
            "output" => Some(Self::output_ports(ctx)),
            _ => None,
        }
    }

    fn pull_custom(&mut self, field: &str, fields: &mut Fields, edges: &[EdgeView]) {
        if field != "input" {
            return;
        }
        let pack_input = fields.get_bool(Self::PACK_INPUT).unwrap_or(false);

        let passthrough = match edges {
            [edge] if !pack_input && Self::carries_record(edge) => edge.buffer.as_ref().and_then(Value::as_packed),
            _ => None,
        };
        if let Some(record) = passthrough {
            fields.set("input", Value::Packed(record.clone()));
            return;
        }

        let mut record = PackedRecord::default();
        for edge in edges {
            record.push(
                edge.buffer.clone().unwrap_or_default(),
                edge.other_port.display_name.clone(),
                edge.other_type.clone(),
            );
        }
        fields.set("input", record);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let input = ctx.input("input")?.clone();
        ctx.set("output", input);
        self.output_index = 0;
        Ok(())
    }

    fn push_custom(&mut self, field: &str, fields: &Fields, port: &PortData, edges: &mut [EdgeView]) {
        if field != "output" {
            return;
        }
        let record = fields
            .get("output")
            .and_then(Value::as_packed)
            .cloned()
            .unwrap_or_default();

        if port.identifier() == Some(PACK_PORT_IDENTIFIER) {
            for edge in edges.iter_mut() {
                edge.buffer = Some(Value::Packed(record.clone()));
            }
            return;
        }

        if fields.get_bool(Self::UNPACK_OUTPUT).unwrap_or(false) {
            let value = record.values.get(self.output_index).cloned().unwrap_or_default();
            self.output_index += 1;
            for edge in edges.iter_mut() {
                edge.buffer = Some(value.clone());
            }
            return;
        }

        if record.is_empty() {
            // nothing came in, consumers keep their current value
            for edge in edges.iter_mut() {
                edge.buffer = None;
            }
            return;
        }

        let value = match record.values.as_slice() {
            [single] if port.display_type.as_ref() != Some(&ValueType::Packed) => single.clone(),
            _ => Value::Packed(record),
        };
        for edge in edges.iter_mut() {
            edge.buffer = Some(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BaseNode;
    use crate::nodes::{AddNode, ConstantNode, LogNode};
    use crate::port::PortRef;

    fn constant(graph: &mut Graph, value: impl Into<Value>, value_type: ValueType) -> NodeId {
        graph
            .add_node(BaseNode::from_logic(ConstantNode::new(value_type)).with_field("value", value))
            .unwrap()
    }

    fn relay(graph: &mut Graph, unpack: bool) -> NodeId {
        graph
            .add_node(BaseNode::from_logic(RelayNode::default()).with_field(RelayNode::UNPACK_OUTPUT, unpack))
            .unwrap()
    }

    fn output_types(graph: &Graph, node: NodeId) -> Vec<(Option<String>, ValueType)> {
        graph
            .node(node)
            .unwrap()
            .outputs()
            .iter()
            .map(|p| (p.identifier().map(str::to_string), p.display_type().clone()))
            .collect()
    }

    #[test]
    fn test_output_type_follows_single_edge() {
        let mut graph = Graph::default();
        let r = relay(&mut graph, false);
        assert_eq!(output_types(&graph, r), vec![(Some("0".into()), ValueType::Any)]);

        let a = constant(&mut graph, 1, ValueType::Int);
        graph.connect(PortRef::field(r, "input"), PortRef::field(a, "value")).unwrap();
        assert_eq!(output_types(&graph, r), vec![(Some("0".into()), ValueType::Int)]);

        let b = constant(&mut graph, 2.0, ValueType::Float);
        graph.connect(PortRef::field(r, "input"), PortRef::field(b, "value")).unwrap();
        assert_eq!(output_types(&graph, r), vec![(Some("0".into()), ValueType::Packed)]);
    }

    #[test]
    fn test_incompatible_downstream_edge_dropped_on_retype() {
        let mut graph = Graph::default();
        let r = relay(&mut graph, false);
        let a = constant(&mut graph, 1, ValueType::Int);
        let add = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
        graph.connect(PortRef::field(r, "input"), PortRef::field(a, "value")).unwrap();
        graph
            .connect(PortRef::field(add, "a"), PortRef::with_identifier(r, "output", "0"))
            .unwrap();
        assert_eq!(graph.edge_count(), 2);

        // the relay now outputs a packed record, which Add cannot take
        let b = constant(&mut graph, 2, ValueType::Int);
        graph.connect(PortRef::field(r, "input"), PortRef::field(b, "value")).unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.node(add).unwrap().port("a", None).unwrap().edges().is_empty());
    }

    #[test]
    fn test_single_value_passes_through() {
        let mut graph = Graph::default();
        let a = constant(&mut graph, 4, ValueType::Int);
        let r = relay(&mut graph, false);
        let add = graph.add_node(BaseNode::from_logic(AddNode).with_field("b", 0.5)).unwrap();
        graph.connect(PortRef::field(r, "input"), PortRef::field(a, "value")).unwrap();
        graph
            .connect(PortRef::field(add, "a"), PortRef::with_identifier(r, "output", "0"))
            .unwrap();
        graph.update_compute_order();

        assert!(graph.run().is_success());
        // Int buffer converted to the Float field on pull
        assert_eq!(graph.node(add).unwrap().field("sum"), Some(&Value::Float(4.5)));
    }

    #[test]
    fn test_unpack_through_relay_chain() {
        let mut graph = Graph::default();
        let a = constant(&mut graph, 1, ValueType::Int);
        let b = constant(&mut graph, "two", ValueType::String);
        let packer = relay(&mut graph, false);
        let unpacker = relay(&mut graph, true);
        let log_a = graph.add_node(BaseNode::from_logic(LogNode)).unwrap();
        let log_b = graph.add_node(BaseNode::from_logic(LogNode)).unwrap();

        graph.connect(PortRef::field(packer, "input"), PortRef::field(a, "value")).unwrap();
        graph.connect(PortRef::field(packer, "input"), PortRef::field(b, "value")).unwrap();
        graph
            .connect(PortRef::field(unpacker, "input"), PortRef::with_identifier(packer, "output", "0"))
            .unwrap();

        assert_eq!(
            output_types(&graph, unpacker),
            vec![
                (Some(PACK_PORT_IDENTIFIER.into()), ValueType::Packed),
                (Some("0".into()), ValueType::Int),
                (Some("1".into()), ValueType::String),
            ]
        );

        graph
            .connect(PortRef::field(log_a, "input"), PortRef::with_identifier(unpacker, "output", "0"))
            .unwrap();
        graph
            .connect(PortRef::field(log_b, "input"), PortRef::with_identifier(unpacker, "output", "1"))
            .unwrap();
        graph.update_compute_order();
        assert!(graph.run().is_success());

        assert_eq!(graph.node(log_a).unwrap().field("input"), Some(&Value::Int(1)));
        assert_eq!(graph.node(log_b).unwrap().field("input"), Some(&Value::from("two")));

        // a third upstream edge reaches the unpacker through the chain
        let c = constant(&mut graph, true, ValueType::Bool);
        graph.connect(PortRef::field(packer, "input"), PortRef::field(c, "value")).unwrap();
        assert_eq!(graph.node(unpacker).unwrap().outputs().len(), 4);
        assert_eq!(graph.edge_count(), 6);
    }

    #[test]
    fn test_unpacked_entry_is_not_looked_through() {
        let mut graph = Graph::default();
        let a = constant(&mut graph, 1, ValueType::Int);
        let b = constant(&mut graph, "two", ValueType::String);
        let splitter = relay(&mut graph, true);
        let unpacker = relay(&mut graph, true);
        let log = graph.add_node(BaseNode::from_logic(LogNode)).unwrap();

        graph.connect(PortRef::field(splitter, "input"), PortRef::field(a, "value")).unwrap();
        graph.connect(PortRef::field(splitter, "input"), PortRef::field(b, "value")).unwrap();
        graph
            .connect(PortRef::field(unpacker, "input"), PortRef::with_identifier(splitter, "output", "1"))
            .unwrap();

        // only the String entry flows in
        assert_eq!(
            output_types(&graph, unpacker),
            vec![
                (Some(PACK_PORT_IDENTIFIER.into()), ValueType::Packed),
                (Some("0".into()), ValueType::String),
            ]
        );

        graph
            .connect(PortRef::field(log, "input"), PortRef::with_identifier(unpacker, "output", "0"))
            .unwrap();
        graph.update_compute_order();
        assert!(graph.run().is_success());
        assert_eq!(graph.node(log).unwrap().field("input"), Some(&Value::from("two")));
    }

    #[test]
    fn test_single_entry_chain_keeps_its_type() {
        let mut graph = Graph::default();
        let a = constant(&mut graph, 3, ValueType::Int);
        let first = relay(&mut graph, false);
        let second = relay(&mut graph, false);
        let add = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();

        graph.connect(PortRef::field(first, "input"), PortRef::field(a, "value")).unwrap();
        graph
            .connect(PortRef::field(second, "input"), PortRef::with_identifier(first, "output", "0"))
            .unwrap();
        graph
            .connect(PortRef::field(add, "a"), PortRef::with_identifier(second, "output", "0"))
            .unwrap();
        assert_eq!(output_types(&graph, second), vec![(Some("0".into()), ValueType::Int)]);

        graph.update_compute_order();
        assert!(graph.run().is_success());
        assert_eq!(graph.node(add).unwrap().field("sum"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_empty_relay_leaves_consumer_value() {
        let mut graph = Graph::default();
        let r = relay(&mut graph, false);
        let add = graph.add_node(BaseNode::from_logic(AddNode).with_field("b", 2.0)).unwrap();
        graph
            .connect(PortRef::field(add, "a"), PortRef::with_identifier(r, "output", "0"))
            .unwrap();
        graph.update_compute_order();

        let report = graph.run();
        assert!(report.is_success(), "{:?}", report.failed);
        assert_eq!(graph.node(add).unwrap().field("a"), Some(&Value::Float(0.0)));
        assert_eq!(graph.node(add).unwrap().field("sum"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn test_pack_input_wraps_upstream_record() {
        let mut graph = Graph::default();
        let a = constant(&mut graph, 1, ValueType::Int);
        let b = constant(&mut graph, 2, ValueType::Int);
        let packer = relay(&mut graph, false);
        let wrapper = graph
            .add_node(
                BaseNode::from_logic(RelayNode::default())
                    .with_field(RelayNode::PACK_INPUT, true)
                    .with_field(RelayNode::UNPACK_OUTPUT, true),
            )
            .unwrap();
        graph.connect(PortRef::field(packer, "input"), PortRef::field(a, "value")).unwrap();
        graph.connect(PortRef::field(packer, "input"), PortRef::field(b, "value")).unwrap();
        graph
            .connect(PortRef::field(wrapper, "input"), PortRef::with_identifier(packer, "output", "0"))
            .unwrap();

        // one entry: the upstream record itself
        assert_eq!(
            output_types(&graph, wrapper),
            vec![
                (Some(PACK_PORT_IDENTIFIER.into()), ValueType::Packed),
                (Some("0".into()), ValueType::Packed),
            ]
        );

        graph.update_compute_order();
        assert!(graph.run().is_success());
        let record = graph.node(wrapper).unwrap().field("output").and_then(Value::as_packed).cloned().unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.values[0].as_packed().map(PackedRecord::len), Some(2));
    }
}
