// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dynamic port reconciliation.
//!
//! Fields with a custom port behavior get their ports re-derived from the
//! current edges whenever connectivity changes. Existing ports are patched
//! in place, never replaced wholesale, so edges on unaffected ports survive.
//! A shape change is propagated to the nodes at the other end of the
//! field's edges, which matters when dynamically typed nodes (chained relays)
//! are connected to each other. Propagation runs over a work stack with a
//! visited set keyed by `(node, fields)`, so it always settles in one bounded
//! pass.

use super::Graph;
use crate::field::PortBehavior;
use crate::node::{NodeId, PortBehaviorContext};
use crate::port_data::PortData;
use std::collections::HashSet;

/// Outcome of re-deriving the ports of one field
#[derive(Debug, Default)]
pub(crate) struct FieldUpdate {
    /// Ports were added, removed, patched or reordered
    pub changed: bool,
    /// Nodes that lost an edge while ports were patched or removed
    pub detached: Vec<NodeId>,
}

impl Graph {
    /// Re-derive the ports of every field of a node
    pub fn update_all_ports(&mut self, node_id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&node_id) else {
            return false;
        };
        let fields: Vec<String> = node
            .descriptors()
            .iter()
            .filter(|d| d.has_ports())
            .map(|d| d.name.clone())
            .collect();

        let mut changed = false;
        for field in fields {
            changed |= self.update_ports_for_field(node_id, &field);
        }
        changed
    }

    /// Re-derive the ports of one field and propagate the change to
    /// connected dynamic nodes until nothing changes anymore.
    ///
    /// Returns whether any port changed. Static fields never change.
    pub fn update_ports_for_field(&mut self, node_id: NodeId, field: &str) -> bool {
        let mut stack: Vec<(NodeId, Vec<String>)> = vec![(node_id, vec![field.to_string()])];
        let mut visited: HashSet<(NodeId, Vec<String>)> = HashSet::new();
        let mut changed = false;

        while let Some((node, fields)) = stack.pop() {
            if !visited.insert((node, fields.clone())) {
                continue;
            }

            for field in &fields {
                let update = self.update_ports_for_field_local(node, field, true);
                let mut neighbours = update.detached;
                if update.changed {
                    changed = true;
                    neighbours.extend(self.field_neighbours(node, field));
                }

                for other in neighbours {
                    let Some(other_node) = self.nodes.get(&other) else {
                        continue;
                    };
                    let with_behavior = other_node.fields_with_behavior();
                    if !with_behavior.is_empty() {
                        stack.push((other, with_behavior));
                    }
                }
            }
        }

        changed
    }

    /// Nodes at the other end of the edges of a field
    fn field_neighbours(&self, node_id: NodeId, field: &str) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        let Some(input) = node.is_field_input(field) else {
            return Vec::new();
        };

        let mut neighbours = Vec::new();
        for edge_id in node.container(input).of_field(field).flat_map(|p| p.edges().iter()) {
            if let Some(edge) = self.edges.get(edge_id) {
                let (other, _) = edge.other_end(input);
                if !neighbours.contains(&other) {
                    neighbours.push(other);
                }
            }
        }
        neighbours
    }

    /// Derive the port list of a dynamic field from its behavior
    fn behavior_ports(&self, node_id: NodeId, field: &str) -> Option<Vec<PortData>> {
        let node = self.nodes.get(&node_id)?;
        let descriptor = node.descriptor(field)?;

        match descriptor.behavior {
            PortBehavior::Static => None,
            PortBehavior::Custom => {
                let edges = self.edge_views(node_id, field);
                let ctx = PortBehaviorContext {
                    graph: self,
                    node: node_id,
                    field: descriptor,
                    fields: node.fields(),
                    edges: &edges,
                };
                let ports = node.logic().port_behavior(field, &ctx);
                if ports.is_none() {
                    tracing::error!(
                        node = %node_id,
                        "{} declares a custom port behavior for `{field}` but provides none",
                        node.type_name()
                    );
                }
                Some(ports.unwrap_or_default())
            }
            PortBehavior::FieldTypeDriven => match self.types.port_behavior(&descriptor.value_type) {
                Some(behavior) => Some(behavior(descriptor, &node.fields().value(field))),
                None => {
                    tracing::error!(
                        node = %node_id,
                        "No port behavior registered for type {} (field `{field}`)",
                        descriptor.value_type
                    );
                    Some(Vec::new())
                }
            },
        }
    }

    /// Reconcile the ports of one field with its behavior's latest output,
    /// without propagating to other nodes
    pub(crate) fn update_ports_for_field_local(&mut self, node_id: NodeId, field: &str, send_event: bool) -> FieldUpdate {
        let mut update = FieldUpdate::default();

        let Some(descriptor) = self.nodes.get(&node_id).and_then(|n| n.descriptor(field)).cloned() else {
            return update;
        };
        if !descriptor.has_ports() {
            return update;
        }
        let Some(new_ports) = self.behavior_ports(node_id, field) else {
            return update;
        };
        let input = descriptor.is_input();

        let order_before: Vec<Option<String>> = self.port_identifiers(node_id, field, input);
        let mut final_ids: Vec<Option<String>> = Vec::with_capacity(new_ports.len());

        for data in new_ports {
            let identifier = data.identifier().map(str::to_string);
            if final_ids.contains(&identifier) {
                tracing::warn!(
                    node = %node_id,
                    "Duplicate port identifier {identifier:?} for field `{field}`, ignoring"
                );
                continue;
            }

            let existing = self
                .nodes
                .get(&node_id)
                .and_then(|n| n.container(input).get(field, identifier.as_deref()))
                .map(|p| (p.port_data.clone(), p.edges().to_vec()));

            match existing {
                None => {
                    if let Some(node) = self.nodes.get_mut(&node_id) {
                        node.add_port(field, data);
                    }
                    update.changed = true;
                }
                Some((current, edges)) => {
                    let new_type = data
                        .display_type
                        .clone()
                        .unwrap_or_else(|| descriptor.value_type.clone());

                    for edge_id in edges {
                        let Some(view) = self.edge_view(edge_id, input) else {
                            continue;
                        };
                        let connectable = if input {
                            self.types.types_are_connectable(&view.other_type, &new_type)
                        } else {
                            self.types.types_are_connectable(&new_type, &view.other_type)
                        };
                        if !connectable {
                            tracing::debug!(
                                node = %node_id,
                                "Port `{field}` changed to {new_type}, dropping incompatible edge"
                            );
                            self.detach_edge(edge_id, false);
                            update.detached.push(view.other_node);
                        }
                    }

                    if current != data {
                        if let Some(port) = self
                            .nodes
                            .get_mut(&node_id)
                            .and_then(|n| n.container_mut(input).get_mut(field, identifier.as_deref()))
                        {
                            port.port_data.copy_from(&data);
                        }
                        update.changed = true;
                    }
                }
            }

            final_ids.push(identifier);
        }

        let stale: Vec<(Option<String>, Vec<crate::edge::EdgeId>)> = self
            .nodes
            .get(&node_id)
            .map(|n| {
                n.container(input)
                    .of_field(field)
                    .filter(|p| !final_ids.iter().any(|id| p.port_data.has_identifier(id.as_deref())))
                    .map(|p| (p.identifier().map(str::to_string), p.edges().to_vec()))
                    .collect()
            })
            .unwrap_or_default();

        for (identifier, edges) in stale {
            for edge_id in edges {
                if let Some(edge) = self.detach_edge(edge_id, false) {
                    update.detached.push(edge.other_end(input).0);
                }
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.remove_port_unchecked(input, field, identifier.as_deref());
            }
            update.changed = true;
        }

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.container_mut(input).reorder_field(field, &final_ids);
        }
        if self.port_identifiers(node_id, field, input) != order_before {
            update.changed = true;
        }

        update.detached.retain(|n| *n != node_id);

        if send_event {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.events.ports_updated.emit(field);
            }
        }
        if update.changed {
            tracing::debug!(node = %node_id, "Ports of `{field}` updated: {final_ids:?}");
        }

        update
    }

    fn port_identifiers(&self, node_id: NodeId, field: &str, input: bool) -> Vec<Option<String>> {
        self.nodes
            .get(&node_id)
            .map(|n| {
                n.container(input)
                    .of_field(field)
                    .map(|p| p.identifier().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::field::{FieldDescriptor, Fields, PortBehavior};
    use crate::graph::Graph;
    use crate::node::{BaseNode, NodeLogic, PortBehaviorContext, ProcessContext};
    use crate::nodes::ConstantNode;
    use crate::port::PortRef;
    use crate::port_data::PortData;
    use crate::types::TypeRegistry;
    use crate::value::{Value, ValueType};
    use crate::ProcessError;
    use std::sync::Arc;

    /// One input port per connected edge, plus a free one
    #[derive(Debug)]
    struct GrowingInputs;

    impl NodeLogic for GrowingInputs {
        fn type_name(&self) -> &'static str {
            "GrowingInputs"
        }

        fn fields(&self) -> Vec<FieldDescriptor> {
            vec![FieldDescriptor::input("items", ValueType::Float).with_behavior(PortBehavior::Custom)]
        }

        fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
            Ok(())
        }

        fn port_behavior(&self, _field: &str, ctx: &PortBehaviorContext<'_>) -> Option<Vec<PortData>> {
            Some(
                (0..=ctx.edges.len())
                    .map(|i| PortData::new(format!("Item {i}"), ValueType::Float).with_identifier(i.to_string()))
                    .collect(),
            )
        }
    }

    #[derive(Debug)]
    struct NoBehavior;

    impl NodeLogic for NoBehavior {
        fn type_name(&self) -> &'static str {
            "NoBehavior"
        }

        fn fields(&self) -> Vec<FieldDescriptor> {
            vec![FieldDescriptor::input("items", ValueType::Float).with_behavior(PortBehavior::Custom)]
        }

        fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct ListNode;

    impl NodeLogic for ListNode {
        fn type_name(&self) -> &'static str {
            "List"
        }

        fn fields(&self) -> Vec<FieldDescriptor> {
            vec![FieldDescriptor::output("values", ValueType::List(Box::new(ValueType::Int)))
                .with_default(Value::List(vec![Value::Int(1), Value::Int(2)]))
                .with_behavior(PortBehavior::FieldTypeDriven)]
        }

        fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    #[test]
    fn test_custom_behavior_grows_with_edges() {
        let mut graph = Graph::default();
        let node = graph.add_node(BaseNode::from_logic(GrowingInputs)).unwrap();
        let source = graph.add_node(BaseNode::from_logic(ConstantNode::new(ValueType::Float))).unwrap();
        assert_eq!(graph.node(node).unwrap().inputs().len(), 1);

        graph
            .connect(PortRef::with_identifier(node, "items", "0"), PortRef::field(source, "value"))
            .unwrap();
        assert_eq!(graph.node(node).unwrap().inputs().len(), 2);

        // the original edge is still attached to port "0"
        let port = graph.node(node).unwrap().port("items", Some("0")).unwrap();
        assert_eq!(port.edges().len(), 1);
    }

    #[test]
    fn test_second_update_is_idempotent() {
        let mut graph = Graph::default();
        let node = graph.add_node(BaseNode::from_logic(GrowingInputs)).unwrap();
        let source = graph.add_node(BaseNode::from_logic(ConstantNode::new(ValueType::Float))).unwrap();
        graph
            .connect(PortRef::with_identifier(node, "items", "0"), PortRef::field(source, "value"))
            .unwrap();

        assert!(!graph.update_ports_for_field(node, "items"));
        assert!(!graph.update_ports_for_field(node, "items"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_missing_custom_behavior_yields_no_ports() {
        let mut graph = Graph::default();
        let node = graph.add_node(BaseNode::from_logic(NoBehavior)).unwrap();
        assert!(graph.node(node).unwrap().inputs().is_empty());
    }

    #[test]
    fn test_field_type_driven_behavior() {
        let mut types = TypeRegistry::with_default_adapters();
        types.register_port_behavior(ValueType::List(Box::new(ValueType::Int)), |field, value| {
            let count = value.as_list().map_or(0, <[Value]>::len);
            (0..count)
                .map(|i| {
                    PortData::new(format!("{} {i}", field.display_name), ValueType::Int)
                        .with_identifier(i.to_string())
                        .multiple()
                })
                .collect()
        });
        let mut graph = Graph::with_types("typed", Arc::new(types));
        let node = graph.add_node(BaseNode::from_logic(ListNode)).unwrap();
        assert_eq!(graph.node(node).unwrap().outputs().len(), 2);

        let mut fields = Fields::new();
        fields.set("values", Value::List(vec![Value::Int(1); 3]));
        graph.node_mut(node).unwrap().set_field("values", fields.value("values"));
        assert!(graph.update_ports_for_field(node, "values"));
        assert_eq!(graph.node(node).unwrap().outputs().len(), 3);
    }

    #[test]
    fn test_field_type_driven_without_registration() {
        let mut graph = Graph::with_types("bare", Arc::new(TypeRegistry::new()));
        let node = graph.add_node(BaseNode::from_logic(ListNode)).unwrap();
        assert!(graph.node(node).unwrap().outputs().is_empty());
    }
}
