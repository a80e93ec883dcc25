// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! A [`BaseNode`] pairs the engine-side state of a node (field values, port
//! containers, compute order, messages, subscribers) with a boxed
//! [`NodeLogic`] implementing the node type's behavior.

use crate::edge::EdgeId;
use crate::error::ProcessError;
use crate::events::NodeEvents;
use crate::field::{FieldDescriptor, Fields};
use crate::graph::Graph;
use crate::parameter::ExposedParameter;
use crate::port::{NodePort, PortContainer};
use crate::port_data::PortData;
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Compute order of nodes excluded from execution (cannot process, or a
/// dependency failed to rank)
pub const INVALID_COMPUTE_ORDER: i32 = -1;

/// Compute order of nodes caught in (or fed by) a cycle
pub const LOOP_COMPUTE_ORDER: i32 = -2;

/// Position and size of a node in an editor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeRect {
    /// Left
    pub x: f32,
    /// Top
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

/// Severity of a node message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeMessageType {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
}

/// Message attached to a node for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMessage {
    /// Message text
    pub text: String,
    /// Severity
    pub message_type: NodeMessageType,
}

/// Snapshot of an edge seen from one of its endpoints
#[derive(Debug, Clone)]
pub struct EdgeView {
    /// Edge ID
    pub id: EdgeId,
    /// Node at the other end
    pub other_node: NodeId,
    /// Type name of the node at the other end
    pub other_node_type: String,
    /// Field at the other end
    pub other_field: String,
    /// Port shape at the other end
    pub other_port: PortData,
    /// Effective type of the port at the other end
    pub other_type: ValueType,
    /// Pass-through buffer
    pub buffer: Option<Value>,
}

/// Context given to custom port behaviors
pub struct PortBehaviorContext<'a> {
    /// Graph owning the node
    pub graph: &'a Graph,
    /// Node whose ports are derived
    pub node: NodeId,
    /// Field whose ports are derived
    pub field: &'a FieldDescriptor,
    /// Field values of the node
    pub fields: &'a Fields,
    /// Edges currently attached to the field's ports
    pub edges: &'a [EdgeView],
}

/// Context given to [`NodeLogic::enable`]
pub struct EnableContext<'a> {
    /// Graph owning the node
    pub graph: &'a Graph,
    /// Node being enabled
    pub node: NodeId,
    /// Field values of the node
    pub fields: &'a Fields,
}

/// Context given to [`NodeLogic::process`]
pub struct ProcessContext<'a> {
    /// Node being processed
    pub node: NodeId,
    /// Field values of the node
    pub fields: &'a mut Fields,
    parameters: &'a [ExposedParameter],
    parameter_writes: Vec<(Uuid, Value)>,
}

impl<'a> ProcessContext<'a> {
    /// Create a context
    pub fn new(node: NodeId, fields: &'a mut Fields, parameters: &'a [ExposedParameter]) -> Self {
        Self {
            node,
            fields,
            parameters,
            parameter_writes: Vec::new(),
        }
    }

    /// Read a field, failing when it does not exist
    pub fn input(&self, name: &str) -> Result<&Value, ProcessError> {
        self.fields
            .get(name)
            .ok_or_else(|| ProcessError::MissingField(name.to_string()))
    }

    /// Read a numeric field as float
    pub fn float(&self, name: &str) -> Result<f64, ProcessError> {
        let value = self.input(name)?;
        value.as_float().ok_or_else(|| ProcessError::TypeMismatch {
            field: name.to_string(),
            expected: ValueType::Float,
            found: value.value_type(),
        })
    }

    /// Write a field
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.set(name, value);
    }

    /// Look up an exposed parameter
    pub fn parameter(&self, guid: Uuid) -> Option<&ExposedParameter> {
        self.parameters.iter().find(|p| p.guid == guid)
    }

    /// Request an exposed parameter update, applied once `process` returns
    pub fn set_parameter(&mut self, guid: Uuid, value: Value) {
        self.parameter_writes.push((guid, value));
    }

    pub(crate) fn into_parameter_writes(self) -> Vec<(Uuid, Value)> {
        self.parameter_writes
    }
}

/// Behavior of a node type.
///
/// Field values are owned by the engine ([`Fields`]); the logic reads and
/// writes them through the contexts it is handed.
pub trait NodeLogic: fmt::Debug {
    /// Stable type name, used by registries and assets
    fn type_name(&self) -> &'static str;

    /// Declared fields, in port order
    fn fields(&self) -> Vec<FieldDescriptor>;

    /// Run the node. Inputs have been pulled already, outputs are pushed after.
    ///
    /// Failures must be returned as [`ProcessError`]: [`Graph::run`] records
    /// them against this node and carries on with the others. A panic is not
    /// caught and aborts the whole run.
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError>;

    /// Whether the node takes part in execution
    fn can_process(&self) -> bool {
        true
    }

    /// Derive the ports of a `Custom` field from the current edges.
    ///
    /// `None` means the behavior is missing; the field then gets no ports.
    fn port_behavior(&self, _field: &str, _ctx: &PortBehaviorContext<'_>) -> Option<Vec<PortData>> {
        None
    }

    /// Custom pull for a `custom_io` input field
    fn pull_custom(&mut self, _field: &str, _fields: &mut Fields, _edges: &[EdgeView]) {}

    /// Custom push for one port of a `custom_io` output field: fill each
    /// edge's buffer
    fn push_custom(&mut self, _field: &str, _fields: &Fields, _port: &PortData, _edges: &mut [EdgeView]) {}

    /// Validate the node against its graph; an error removes the node
    fn enable(&self, _ctx: &EnableContext<'_>) -> Result<(), ProcessError> {
        Ok(())
    }

    /// Called when the node is disabled
    fn disable(&mut self) {}

    /// Called when the node is destroyed
    fn destroy(&mut self) {}
}

/// A node instance in the graph
#[derive(Debug)]
pub struct BaseNode {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name (can be customized)
    pub name: String,
    /// Position in an editor
    pub position: NodeRect,
    /// Rank in the execution order, see [`LOOP_COMPUTE_ORDER`] and
    /// [`INVALID_COMPUTE_ORDER`]
    pub compute_order: i32,
    /// Subscribers
    pub events: NodeEvents,
    fields: Fields,
    descriptors: Vec<FieldDescriptor>,
    inputs: PortContainer,
    outputs: PortContainer,
    logic: Box<dyn NodeLogic>,
    messages: Vec<NodeMessage>,
    enabled: bool,
}

impl BaseNode {
    /// Create a node from boxed logic
    pub fn new(logic: Box<dyn NodeLogic>) -> Self {
        let descriptors = logic.fields();
        Self {
            id: NodeId::new(),
            name: logic.type_name().to_string(),
            position: NodeRect::default(),
            compute_order: 0,
            events: NodeEvents::default(),
            fields: Fields::from_descriptors(&descriptors),
            descriptors,
            inputs: PortContainer::new(),
            outputs: PortContainer::new(),
            logic,
            messages: Vec::new(),
            enabled: false,
        }
    }

    /// Create a node from logic
    pub fn from_logic(logic: impl NodeLogic + 'static) -> Self {
        Self::new(Box::new(logic))
    }

    /// Set the ID
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position.x = x;
        self.position.y = y;
        self
    }

    /// Set a field value
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.set(name, value);
        self
    }

    /// Node type name
    pub fn type_name(&self) -> &'static str {
        self.logic.type_name()
    }

    /// Node logic
    pub fn logic(&self) -> &dyn NodeLogic {
        self.logic.as_ref()
    }

    pub(crate) fn logic_mut(&mut self) -> &mut dyn NodeLogic {
        self.logic.as_mut()
    }

    /// Field values
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Mutable field values
    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    pub(crate) fn logic_and_fields_mut(&mut self) -> (&mut dyn NodeLogic, &mut Fields) {
        (self.logic.as_mut(), &mut self.fields)
    }

    /// Read a field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Write a field
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.set(name, value);
    }

    /// Declared fields
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    /// Declaration of a field
    pub fn descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Whether a field produces input ports, `None` for unknown fields
    pub fn is_field_input(&self, name: &str) -> Option<bool> {
        self.descriptor(name).map(FieldDescriptor::is_input)
    }

    /// Names of the fields whose ports are derived dynamically
    pub fn fields_with_behavior(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .filter(|d| d.has_ports() && d.has_custom_behavior())
            .map(|d| d.name.clone())
            .collect()
    }

    /// Input ports
    pub fn inputs(&self) -> &PortContainer {
        &self.inputs
    }

    /// Output ports
    pub fn outputs(&self) -> &PortContainer {
        &self.outputs
    }

    /// Container holding the ports of one direction
    pub fn container(&self, input: bool) -> &PortContainer {
        if input { &self.inputs } else { &self.outputs }
    }

    pub(crate) fn container_mut(&mut self, input: bool) -> &mut PortContainer {
        if input { &mut self.inputs } else { &mut self.outputs }
    }

    /// Find a port by field and identifier
    pub fn port(&self, field: &str, identifier: Option<&str>) -> Option<&NodePort> {
        self.inputs
            .get(field, identifier)
            .or_else(|| self.outputs.get(field, identifier))
    }

    /// Every port, inputs first
    pub fn all_ports(&self) -> impl Iterator<Item = &NodePort> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Every edge attached to the node, without duplicates
    pub fn all_edges(&self) -> Vec<EdgeId> {
        let mut edges: Vec<EdgeId> = Vec::new();
        for edge in self.inputs.edges().chain(self.outputs.edges()) {
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
        edges
    }

    /// Add a port to a declared field.
    ///
    /// Returns `false` if the field is unknown, is a setting, or already has
    /// a port with the same identifier.
    pub fn add_port(&mut self, field: &str, port_data: PortData) -> bool {
        let Some(descriptor) = self.descriptor(field) else {
            return false;
        };
        if !descriptor.has_ports() {
            return false;
        }
        let input = descriptor.is_input();
        let port = NodePort::new(self.id, descriptor, port_data);
        let container = self.container_mut(input);
        if container.get(field, port.identifier()).is_some() {
            return false;
        }
        container.push(port);
        true
    }

    /// Remove a port that has no edges left.
    ///
    /// Use [`Graph::remove_port`] to tear down attached edges as well.
    pub fn remove_port(&mut self, field: &str, identifier: Option<&str>) -> Option<NodePort> {
        let input = self.is_field_input(field)?;
        let container = self.container_mut(input);
        if container.get(field, identifier).is_some_and(|p| !p.edges().is_empty()) {
            return None;
        }
        container.remove(field, identifier)
    }

    pub(crate) fn remove_port_unchecked(&mut self, input: bool, field: &str, identifier: Option<&str>) {
        self.container_mut(input).remove(field, identifier);
    }

    /// Reset an input field to its type's default value.
    ///
    /// Fields that keep their value on disconnect are left alone.
    pub fn reset_to_default(&mut self, field: &str) {
        let Some(descriptor) = self.descriptor(field) else {
            return;
        };
        if descriptor.keep_value_on_disconnect || !descriptor.is_input() {
            return;
        }
        let value = descriptor.value_type.default_value();
        self.fields.set(field, value);
    }

    /// Whether the node takes part in execution
    pub fn can_process(&self) -> bool {
        self.logic.can_process()
    }

    /// Messages attached to the node
    pub fn messages(&self) -> &[NodeMessage] {
        &self.messages
    }

    /// Attach a message; returns `false` if it is already present
    pub fn add_message(&mut self, text: impl Into<String>, message_type: NodeMessageType) -> bool {
        let message = NodeMessage { text: text.into(), message_type };
        if self.messages.contains(&message) {
            return false;
        }
        self.events.message_added.emit(&message);
        self.messages.push(message);
        true
    }

    /// Remove every message with this exact text
    pub fn remove_message(&mut self, text: &str) {
        self.remove_messages_where(|m| m.text == text);
    }

    /// Remove every message whose text contains `fragment`
    pub fn remove_message_contains(&mut self, fragment: &str) {
        self.remove_messages_where(|m| m.text.contains(fragment));
    }

    /// Remove all messages
    pub fn clear_messages(&mut self) {
        self.remove_messages_where(|_| true);
    }

    fn remove_messages_where(&mut self, predicate: impl Fn(&NodeMessage) -> bool) {
        let (removed, kept): (Vec<_>, Vec<_>) = self.messages.drain(..).partition(|m| predicate(m));
        self.messages = kept;
        for message in &removed {
            self.events.message_removed.emit(message);
        }
    }

    /// Whether the node is initialized and enabled in a graph
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Disable the node
    pub fn disable(&mut self) {
        if self.enabled {
            self.logic.disable();
            self.enabled = false;
        }
    }

    /// Destroy the node, dropping every subscriber
    pub fn destroy(&mut self) {
        self.disable();
        self.logic.destroy();
        self.events.clear();
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Output nodes (logging, sinks)
    Output,
    /// Math operations
    Math,
    /// Utility nodes (relays)
    Utility,
    /// Custom/user-defined
    Custom,
}

type NodeFactory = Arc<dyn Fn() -> Box<dyn NodeLogic> + Send + Sync>;

/// Registered node type
#[derive(Clone)]
pub struct NodeTypeInfo {
    /// Type name
    pub type_name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    factory: NodeFactory,
}

impl fmt::Debug for NodeTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeInfo")
            .field("type_name", &self.type_name)
            .field("category", &self.category)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registry of available node types
#[derive(Debug, Default)]
pub struct NodeRegistry {
    types: indexmap::IndexMap<String, NodeTypeInfo>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type. The type name is taken from the logic built by
    /// the factory.
    pub fn register<F, L>(&mut self, category: NodeCategory, description: impl Into<String>, factory: F)
    where
        F: Fn() -> L + Send + Sync + 'static,
        L: NodeLogic + 'static,
    {
        let type_name = factory().type_name().to_string();
        let factory: NodeFactory = Arc::new(move || Box::new(factory()));
        self.types.insert(
            type_name.clone(),
            NodeTypeInfo {
                type_name,
                category,
                description: description.into(),
                factory,
            },
        );
    }

    /// Get a node type by name
    pub fn get(&self, type_name: &str) -> Option<&NodeTypeInfo> {
        self.types.get(type_name)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeTypeInfo> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeTypeInfo> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a type name
    pub fn create_node(&self, type_name: &str) -> Option<BaseNode> {
        self.get(type_name).map(|info| BaseNode::new((info.factory)()))
    }
}
