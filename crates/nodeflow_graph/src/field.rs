// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declared node fields.
//!
//! A node type declares its fields once through
//! [`NodeLogic::fields`](crate::node::NodeLogic::fields). Input and output
//! fields become ports, setting fields only hold configuration. Field values
//! live in a [`Fields`] store owned by the node, which is what the engine
//! reads and writes when values move along edges.

use crate::port_data::PortData;
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Role of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Produces input ports
    Input,
    /// Produces output ports
    Output,
    /// Node configuration, no ports
    Setting,
}

/// How the ports of a field are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PortBehavior {
    /// Exactly one port built from the descriptor
    #[default]
    Static,
    /// Ports come from the behavior registered for the field's declared type
    FieldTypeDriven,
    /// Ports come from [`NodeLogic::port_behavior`](crate::node::NodeLogic::port_behavior)
    Custom,
}

/// Declaration of one node field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name, unique per node type
    pub name: String,
    /// Display name used for the default port
    pub display_name: String,
    /// Role
    pub kind: FieldKind,
    /// Declared type
    pub value_type: ValueType,
    /// Initial value
    pub default_value: Value,
    /// Whether the default port accepts several edges
    pub allow_multiple: bool,
    /// Port derivation
    pub behavior: PortBehavior,
    /// Values are moved by the node's custom push/pull handler instead of
    /// compiled assignments
    pub custom_io: bool,
    /// Keep the current value when the last input edge goes away
    pub keep_value_on_disconnect: bool,
    /// Layout hint for the default port
    pub vertical: bool,
    /// Tooltip for the default port
    pub tooltip: Option<String>,
}

impl FieldDescriptor {
    fn new(name: impl Into<String>, kind: FieldKind, value_type: ValueType) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            kind,
            default_value: value_type.default_value(),
            value_type,
            allow_multiple: kind == FieldKind::Output,
            behavior: PortBehavior::Static,
            custom_io: false,
            keep_value_on_disconnect: false,
            vertical: false,
            tooltip: None,
        }
    }

    /// Declare an input field
    pub fn input(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, FieldKind::Input, value_type)
    }

    /// Declare an output field
    pub fn output(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, FieldKind::Output, value_type)
    }

    /// Declare a setting field
    pub fn setting(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, FieldKind::Setting, value_type)
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the initial value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Set whether the default port accepts several edges
    pub fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    /// Set the port behavior
    pub fn with_behavior(mut self, behavior: PortBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Mark the field as driven by the node's custom I/O handler
    pub fn custom_io(mut self) -> Self {
        self.custom_io = true;
        self
    }

    /// Keep the value when disconnected (inspector-editable inputs)
    pub fn keep_value_on_disconnect(mut self) -> Self {
        self.keep_value_on_disconnect = true;
        self
    }

    /// Lay the default port out vertically
    pub fn vertical(mut self) -> Self {
        self.vertical = true;
        self
    }

    /// Set the tooltip
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Whether ports are derived dynamically
    pub fn has_custom_behavior(&self) -> bool {
        self.behavior != PortBehavior::Static
    }

    /// Whether the field produces input ports
    pub fn is_input(&self) -> bool {
        self.kind == FieldKind::Input
    }

    /// Whether the field produces ports at all
    pub fn has_ports(&self) -> bool {
        self.kind != FieldKind::Setting
    }

    /// Port data of the single port a static field gets
    pub fn default_port_data(&self) -> PortData {
        PortData {
            identifier: None,
            display_name: self.display_name.clone(),
            display_type: Some(self.value_type.clone()),
            accept_multiple_edges: self.allow_multiple,
            size_in_pixel: 0,
            vertical: self.vertical,
            tooltip: self.tooltip.clone(),
        }
    }
}

/// Values of a node's declared fields, in declaration order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields {
    values: IndexMap<String, Value>,
}

impl Fields {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the store from declarations, using each declared default
    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a FieldDescriptor>) -> Self {
        Self {
            values: descriptors
                .into_iter()
                .map(|d| (d.name.clone(), d.default_value.clone()))
                .collect(),
        }
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Get a mutable field value
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    /// Get a field value, `Null` when absent
    pub fn value(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or_default()
    }

    /// Set a field value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Whether a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Get a bool field
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Get an integer field
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// Get a float field (integers widen)
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    /// Get a string field
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Iterate over fields in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let input = FieldDescriptor::input("a", ValueType::Int);
        assert!(!input.allow_multiple);
        assert!(input.is_input());
        assert_eq!(input.default_value, Value::Int(0));

        let output = FieldDescriptor::output("out", ValueType::Float).with_display_name("Out");
        assert!(output.allow_multiple);
        let port = output.default_port_data();
        assert_eq!(port.display_name, "Out");
        assert_eq!(port.display_type, Some(ValueType::Float));
        assert!(port.identifier().is_none());
    }

    #[test]
    fn test_fields_from_descriptors() {
        let descriptors = [
            FieldDescriptor::input("a", ValueType::Int).with_default(4),
            FieldDescriptor::setting("flag", ValueType::Bool),
        ];
        let mut fields = Fields::from_descriptors(&descriptors);
        assert_eq!(fields.get_int("a"), Some(4));
        assert_eq!(fields.get_bool("flag"), Some(false));

        fields.set("a", 9);
        assert_eq!(fields.value("a"), Value::Int(9));
        assert_eq!(fields.value("missing"), Value::Null);
    }
}
