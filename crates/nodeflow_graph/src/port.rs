// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concrete ports and compiled value propagation.
//!
//! A [`NodePort`] is one port instance generated for a `(node, field)` pair.
//! Output ports carry one [`PushDelegate`] per plain edge: the conversion
//! between the two field types is resolved once, when the edge is added,
//! and replayed every time the node pushes its outputs. Edges touching a
//! field with a custom I/O handler get no delegate; values travel through
//! the edge's pass-through buffer instead.

use crate::edge::{Edge, EdgeId};
use crate::field::FieldDescriptor;
use crate::node::NodeId;
use crate::port_data::PortData;
use crate::types::{AdapterFn, TypeRegistry};
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Address of a port: node, field and port identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Owning node
    pub node: NodeId,
    /// Field the port was generated for
    pub field: String,
    /// Port identifier, `None` for the default port
    pub identifier: Option<String>,
}

impl PortRef {
    /// Create a port address, normalizing empty identifiers
    pub fn new(node: NodeId, field: impl Into<String>, identifier: Option<String>) -> Self {
        Self {
            node,
            field: field.into(),
            identifier: identifier.filter(|id| !id.is_empty()),
        }
    }

    /// Address of the default (identifier-less) port of a field
    pub fn field(node: NodeId, field: impl Into<String>) -> Self {
        Self::new(node, field, None)
    }

    /// Address of a port with an identifier
    pub fn with_identifier(node: NodeId, field: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::new(node, field, Some(identifier.into()))
    }
}

/// How a value is converted on its way from an output field to an input field
#[derive(Clone)]
pub enum Conversion {
    /// Plain assignment
    Identity,
    /// Registered type adapter
    Adapter(AdapterFn),
    /// Untyped source, converted against the target type when the value flows
    Dynamic(ValueType),
}

impl Conversion {
    /// Apply the conversion
    pub fn apply(&self, value: Value, types: &TypeRegistry) -> Value {
        match self {
            Self::Identity => value,
            Self::Adapter(adapter) => adapter(&value),
            Self::Dynamic(target) => types.convert(value, target),
        }
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("Identity"),
            Self::Adapter(_) => f.write_str("Adapter"),
            Self::Dynamic(target) => f.debug_tuple("Dynamic").field(target).finish(),
        }
    }
}

/// Compiled assignment from an output field into the input field of an edge
#[derive(Debug, Clone)]
pub struct PushDelegate {
    /// Node receiving the value
    pub target_node: NodeId,
    /// Field receiving the value
    pub target_field: String,
    /// Conversion applied on the way
    pub conversion: Conversion,
}

impl PushDelegate {
    /// Compile the delegate for an edge given both declared field types.
    ///
    /// Returns `None` when the field types are not connectable; such an edge
    /// stays in the graph but never propagates data.
    pub fn compile(
        types: &TypeRegistry,
        edge: &Edge,
        output_type: &ValueType,
        input_type: &ValueType,
    ) -> Option<Self> {
        if !types.types_are_connectable(output_type, input_type) {
            tracing::error!(
                edge = ?edge.id,
                "Invalid edge {}.{} -> {}.{}: cannot assign {} to {}",
                edge.output_node, edge.output_field, edge.input_node, edge.input_field,
                output_type, input_type
            );
            return None;
        }

        let conversion = if input_type.is_assignable_from(output_type) {
            Conversion::Identity
        } else if let Some(adapter) = types.adapter(output_type, input_type) {
            Conversion::Adapter(adapter.clone())
        } else {
            Conversion::Dynamic(input_type.clone())
        };

        Some(Self {
            target_node: edge.input_node,
            target_field: edge.input_field.clone(),
            conversion,
        })
    }
}

/// A port instance on a node
#[derive(Debug, Clone)]
pub struct NodePort {
    /// Owning node
    pub owner: NodeId,
    /// Field the port was generated for
    pub field_name: String,
    /// Direction
    pub direction: PortDirection,
    /// Current shape
    pub port_data: PortData,
    field_type: ValueType,
    custom_io: bool,
    keep_value_on_disconnect: bool,
    edges: Vec<EdgeId>,
    push_delegates: IndexMap<EdgeId, PushDelegate>,
    remote_custom_io: Vec<EdgeId>,
}

impl NodePort {
    /// Create a port for a declared field
    pub fn new(owner: NodeId, field: &FieldDescriptor, port_data: PortData) -> Self {
        Self {
            owner,
            field_name: field.name.clone(),
            direction: if field.is_input() { PortDirection::Input } else { PortDirection::Output },
            port_data,
            field_type: field.value_type.clone(),
            custom_io: field.custom_io,
            keep_value_on_disconnect: field.keep_value_on_disconnect,
            edges: Vec::new(),
            push_delegates: IndexMap::new(),
            remote_custom_io: Vec::new(),
        }
    }

    /// Port identifier
    pub fn identifier(&self) -> Option<&str> {
        self.port_data.identifier()
    }

    /// Address of this port
    pub fn port_ref(&self) -> PortRef {
        PortRef::new(self.owner, self.field_name.clone(), self.identifier().map(str::to_string))
    }

    /// Type used for compatibility checks
    pub fn display_type(&self) -> &ValueType {
        self.port_data.display_type.as_ref().unwrap_or(&self.field_type)
    }

    /// Declared type of the underlying field
    pub fn field_type(&self) -> &ValueType {
        &self.field_type
    }

    /// Whether the owning field has a custom I/O handler
    pub fn has_custom_io(&self) -> bool {
        self.custom_io
    }

    /// Whether the field may be reset when its last edge goes away
    pub fn can_reset(&self) -> bool {
        self.direction == PortDirection::Input && !self.keep_value_on_disconnect
    }

    /// Whether several edges may be attached
    pub fn accepts_multiple_edges(&self) -> bool {
        self.port_data.accept_multiple_edges
    }

    /// Edges attached to this port, in connection order
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Compiled delegates, keyed by edge
    pub fn push_delegates(&self) -> impl Iterator<Item = (&EdgeId, &PushDelegate)> {
        self.push_delegates.iter()
    }

    /// Edges whose values travel through the pass-through buffer
    pub fn remote_custom_io_edges(&self) -> &[EdgeId] {
        &self.remote_custom_io
    }

    /// Register an edge.
    ///
    /// `remote_custom_io` marks edges where either endpoint has a custom
    /// handler; those never get a delegate.
    pub(crate) fn add(&mut self, edge: EdgeId, remote_custom_io: bool, delegate: Option<PushDelegate>) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        if remote_custom_io {
            if !self.remote_custom_io.contains(&edge) {
                self.remote_custom_io.push(edge);
            }
        } else if let Some(delegate) = delegate {
            self.push_delegates.insert(edge, delegate);
        }
    }

    /// Unregister an edge and drop its delegate
    pub(crate) fn remove(&mut self, edge: EdgeId) {
        self.edges.retain(|e| *e != edge);
        self.remote_custom_io.retain(|e| *e != edge);
        self.push_delegates.shift_remove(&edge);
    }

    /// Values this output port pushes along its compiled delegates
    pub(crate) fn delegate_pushes(&self, value: &Value, types: &TypeRegistry) -> Vec<(NodeId, String, Value)> {
        self.push_delegates
            .values()
            .map(|d| {
                (d.target_node, d.target_field.clone(), d.conversion.apply(value.clone(), types))
            })
            .collect()
    }
}

/// Ordered collection of the ports of one direction on a node
#[derive(Debug, Clone, Default)]
pub struct PortContainer {
    ports: Vec<NodePort>,
}

impl PortContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over ports in order
    pub fn iter(&self) -> impl Iterator<Item = &NodePort> {
        self.ports.iter()
    }

    /// Number of ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether the container is empty
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Port at position
    pub fn at(&self, index: usize) -> Option<&NodePort> {
        self.ports.get(index)
    }

    /// Find a port by field and identifier
    pub fn get(&self, field: &str, identifier: Option<&str>) -> Option<&NodePort> {
        self.ports
            .iter()
            .find(|p| p.field_name == field && p.port_data.has_identifier(identifier))
    }

    /// Find a mutable port by field and identifier
    pub fn get_mut(&mut self, field: &str, identifier: Option<&str>) -> Option<&mut NodePort> {
        self.ports
            .iter_mut()
            .find(|p| p.field_name == field && p.port_data.has_identifier(identifier))
    }

    /// Ports generated for a field
    pub fn of_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a NodePort> + 'a {
        self.ports.iter().filter(move |p| p.field_name == field)
    }

    /// Port holding an edge
    pub fn with_edge_mut(&mut self, edge: EdgeId) -> Option<&mut NodePort> {
        self.ports.iter_mut().find(|p| p.edges.contains(&edge))
    }

    /// All edges attached to ports of this container
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.ports.iter().flat_map(|p| p.edges.iter().copied())
    }

    pub(crate) fn push(&mut self, port: NodePort) {
        self.ports.push(port);
    }

    pub(crate) fn remove(&mut self, field: &str, identifier: Option<&str>) -> Option<NodePort> {
        let index = self
            .ports
            .iter()
            .position(|p| p.field_name == field && p.port_data.has_identifier(identifier))?;
        Some(self.ports.remove(index))
    }

    /// Reorder the ports of one field to follow `order` (identifiers).
    ///
    /// Ports of other fields keep their positions.
    pub(crate) fn reorder_field(&mut self, field: &str, order: &[Option<String>]) {
        let slots: Vec<usize> = self
            .ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.field_name == field)
            .map(|(i, _)| i)
            .collect();

        let mut field_ports: Vec<NodePort> = slots.iter().map(|&i| self.ports[i].clone()).collect();
        field_ports.sort_by_key(|p| {
            order
                .iter()
                .position(|id| p.port_data.has_identifier(id.as_deref()))
                .unwrap_or(usize::MAX)
        });

        for (slot, port) in slots.into_iter().zip(field_ports) {
            self.ports[slot] = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(owner: NodeId, field: &str, identifier: &str) -> NodePort {
        let descriptor = FieldDescriptor::output(field, ValueType::Int);
        NodePort::new(owner, &descriptor, descriptor.default_port_data().with_identifier(identifier))
    }

    #[test]
    fn test_reorder_field_keeps_other_fields_in_place() {
        let owner = NodeId::new();
        let mut container = PortContainer::new();
        container.push(port(owner, "a", "1"));
        container.push(port(owner, "b", ""));
        container.push(port(owner, "a", "2"));

        container.reorder_field("a", &[Some("2".into()), Some("1".into())]);

        let order: Vec<_> = container.iter().map(|p| (p.field_name.as_str(), p.identifier())).collect();
        assert_eq!(order, vec![("a", Some("2")), ("b", None), ("a", Some("1"))]);
    }

    #[test]
    fn test_remote_custom_io_edges_get_no_delegate() {
        let owner = NodeId::new();
        let mut p = port(owner, "out", "");
        let delegate = PushDelegate {
            target_node: NodeId::new(),
            target_field: "in".into(),
            conversion: Conversion::Identity,
        };

        let plain = EdgeId::new();
        let custom = EdgeId::new();
        p.add(plain, false, Some(delegate.clone()));
        p.add(custom, true, Some(delegate));

        assert_eq!(p.edges().len(), 2);
        assert_eq!(p.push_delegates().count(), 1);
        assert_eq!(p.remote_custom_io_edges(), &[custom]);

        p.remove(plain);
        assert_eq!(p.push_delegates().count(), 0);
        assert_eq!(p.edges(), &[custom]);
    }

    #[test]
    fn test_delegate_applies_conversion() {
        let types = TypeRegistry::with_default_adapters();
        let input = PortRef::field(NodeId::new(), "in");
        let output = PortRef::field(NodeId::new(), "out");
        let edge = Edge::new(&input, &output);

        let delegate = PushDelegate::compile(&types, &edge, &ValueType::Int, &ValueType::Float).unwrap();
        assert!(matches!(delegate.conversion, Conversion::Adapter(_)));
        assert_eq!(delegate.conversion.apply(Value::Int(2), &types), Value::Float(2.0));

        assert!(PushDelegate::compile(&types, &edge, &ValueType::Bool, &ValueType::Int).is_none());
    }
}
