// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value model for node fields and ports.
//!
//! Every declared node field has a [`ValueType`] and stores a [`Value`].
//! Ports advertise a display type which is also a [`ValueType`] and may
//! differ from the field's declared type (the relay node is the main user
//! of that freedom).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type of a field or port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Any type (top type, everything is assignable to it)
    Any,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// String value
    String,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// Homogeneous list
    List(Box<ValueType>),
    /// Relay payload, see [`PackedRecord`]
    Packed,
    /// Named host object type (reference-like, defaults to null)
    Object(String),
}

impl ValueType {
    /// Whether a value of type `other` can be stored in a field of this type
    /// without conversion.
    pub fn is_assignable_from(&self, other: &ValueType) -> bool {
        if self == other {
            return true;
        }

        match (self, other) {
            (Self::Any, _) => true,
            (Self::List(inner), Self::List(other_inner)) => inner.is_assignable_from(other_inner),
            _ => false,
        }
    }

    /// Whether this type behaves like a value type (has a zero value rather
    /// than null).
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int
                | Self::Float
                | Self::String
                | Self::Vector2
                | Self::Vector3
                | Self::Vector4
                | Self::Color
                | Self::Packed
        )
    }

    /// The value a disconnected input of this type is reset to.
    ///
    /// Lists become empty, reference-like types become [`Value::Null`] and
    /// value types get their zero value.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Any | Self::Object(_) => Value::Null,
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::String => Value::String(String::new()),
            Self::Vector2 => Value::Vector2([0.0; 2]),
            Self::Vector3 => Value::Vector3([0.0; 3]),
            Self::Vector4 => Value::Vector4([0.0; 4]),
            Self::Color => Value::Color([0.0, 0.0, 0.0, 1.0]),
            Self::List(_) => Value::List(Vec::new()),
            Self::Packed => Value::Packed(PackedRecord::default()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::Vector2 => f.write_str("vector2"),
            Self::Vector3 => f.write_str("vector3"),
            Self::Vector4 => f.write_str("vector4"),
            Self::Color => f.write_str("color"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Packed => f.write_str("packed"),
            Self::Object(name) => f.write_str(name),
        }
    }
}

/// Value stored in a node field or carried by an edge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// No value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// List of values
    List(Vec<Value>),
    /// Relay payload
    Packed(PackedRecord),
    /// Host object, opaque to the engine
    Object {
        /// Host type name
        type_name: String,
        /// Serialized payload
        data: String,
    },
}

impl Value {
    /// Get the runtime type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Any,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::Vector2(_) => ValueType::Vector2,
            Self::Vector3(_) => ValueType::Vector3,
            Self::Vector4(_) => ValueType::Vector4,
            Self::Color(_) => ValueType::Color,
            Self::List(items) => ValueType::List(Box::new(
                items.first().map_or(ValueType::Any, Value::value_type),
            )),
            Self::Packed(_) => ValueType::Packed,
            Self::Object { type_name, .. } => ValueType::Object(type_name.clone()),
        }
    }

    /// Whether this is [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float, widening integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as packed relay record
    pub fn as_packed(&self) -> Option<&PackedRecord> {
        match self {
            Self::Packed(record) => Some(record),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<PackedRecord> for Value {
    fn from(value: PackedRecord) -> Self {
        Self::Packed(value)
    }
}

/// Fan-in payload built by a relay node: parallel lists of values, display
/// names and declared types, one entry per packed edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackedRecord {
    /// Packed values
    pub values: Vec<Value>,
    /// Display name of the port each value came from
    pub names: Vec<String>,
    /// Declared type of the port each value came from
    pub types: Vec<ValueType>,
}

impl PackedRecord {
    /// Append one entry
    pub fn push(&mut self, value: Value, name: impl Into<String>, value_type: ValueType) {
        self.values.push(value);
        self.names.push(name.into());
        self.types.push(value_type);
    }

    /// Number of packed entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
