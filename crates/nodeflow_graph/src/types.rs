// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type compatibility, type adapters and type-driven port behaviors.

use crate::field::FieldDescriptor;
use crate::port_data::PortData;
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Conversion function between two field types
pub type AdapterFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Port behavior shared by every field of a given declared type.
///
/// Receives the field descriptor and the field's current value.
pub type TypeBehaviorFn = Arc<dyn Fn(&FieldDescriptor, &Value) -> Vec<PortData> + Send + Sync>;

/// Registry of type rules consulted when connecting ports and moving values
#[derive(Clone, Default)]
pub struct TypeRegistry {
    adapters: IndexMap<(ValueType, ValueType), AdapterFn>,
    incompatible: HashSet<(ValueType, ValueType)>,
    custom_io: HashSet<(ValueType, ValueType)>,
    behaviors: IndexMap<ValueType, TypeBehaviorFn>,
}

impl TypeRegistry {
    /// Create an empty registry (no adapters)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry carrying the implicit numeric, vector and color
    /// conversions
    pub fn with_default_adapters() -> Self {
        let mut registry = Self::new();

        registry.register_adapter(ValueType::Int, ValueType::Float, |v| match v {
            Value::Int(i) => Value::Float(*i as f64),
            other => other.clone(),
        });
        registry.register_adapter(ValueType::Float, ValueType::Int, |v| match v {
            Value::Float(f) => Value::Int(f.trunc() as i64),
            other => other.clone(),
        });

        registry.register_adapter(ValueType::Float, ValueType::Vector2, |v| {
            v.as_float().map_or_else(|| v.clone(), |f| Value::Vector2([f as f32; 2]))
        });
        registry.register_adapter(ValueType::Float, ValueType::Vector3, |v| {
            v.as_float().map_or_else(|| v.clone(), |f| Value::Vector3([f as f32; 3]))
        });
        registry.register_adapter(ValueType::Float, ValueType::Vector4, |v| {
            v.as_float().map_or_else(|| v.clone(), |f| Value::Vector4([f as f32; 4]))
        });
        registry.register_adapter(ValueType::Vector2, ValueType::Vector3, |v| match v {
            Value::Vector2([x, y]) => Value::Vector3([*x, *y, 0.0]),
            other => other.clone(),
        });
        registry.register_adapter(ValueType::Vector2, ValueType::Vector4, |v| match v {
            Value::Vector2([x, y]) => Value::Vector4([*x, *y, 0.0, 0.0]),
            other => other.clone(),
        });
        registry.register_adapter(ValueType::Vector3, ValueType::Vector4, |v| match v {
            Value::Vector3([x, y, z]) => Value::Vector4([*x, *y, *z, 0.0]),
            other => other.clone(),
        });
        registry.register_adapter(ValueType::Color, ValueType::Vector4, |v| match v {
            Value::Color(c) => Value::Vector4(*c),
            other => other.clone(),
        });
        registry.register_adapter(ValueType::Vector4, ValueType::Color, |v| match v {
            Value::Vector4(c) => Value::Color(*c),
            other => other.clone(),
        });

        for from in [ValueType::Bool, ValueType::Int, ValueType::Float] {
            registry.register_adapter(from, ValueType::String, |v| match v {
                Value::Bool(b) => Value::String(b.to_string()),
                Value::Int(i) => Value::String(i.to_string()),
                Value::Float(f) => Value::String(f.to_string()),
                other => other.clone(),
            });
        }

        registry
    }

    /// Register a conversion from one type to another
    pub fn register_adapter<F>(&mut self, from: ValueType, to: ValueType, adapter: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.adapters.insert((from, to), Arc::new(adapter));
    }

    /// Forbid connecting `from` outputs to `to` inputs, whatever other rules say
    pub fn register_incompatible(&mut self, from: ValueType, to: ValueType) {
        self.incompatible.insert((from, to));
    }

    /// Declare that a custom I/O handler moves values from `from` to `to`
    pub fn register_custom_io(&mut self, from: ValueType, to: ValueType) {
        self.custom_io.insert((from, to));
    }

    /// Register the port behavior used by `FieldTypeDriven` fields of `value_type`
    pub fn register_port_behavior<F>(&mut self, value_type: ValueType, behavior: F)
    where
        F: Fn(&FieldDescriptor, &Value) -> Vec<PortData> + Send + Sync + 'static,
    {
        self.behaviors.insert(value_type, Arc::new(behavior));
    }

    /// Port behavior registered for a declared type
    pub fn port_behavior(&self, value_type: &ValueType) -> Option<&TypeBehaviorFn> {
        self.behaviors.get(value_type)
    }

    /// Adapter converting `from` into `to`
    pub fn adapter(&self, from: &ValueType, to: &ValueType) -> Option<&AdapterFn> {
        self.adapters.get(&(from.clone(), to.clone()))
    }

    /// Whether an adapter exists for the pair
    pub fn are_assignable(&self, from: &ValueType, to: &ValueType) -> bool {
        self.adapter(from, to).is_some()
    }

    /// Whether the pair was explicitly forbidden
    pub fn are_incompatible(&self, from: &ValueType, to: &ValueType) -> bool {
        self.incompatible.contains(&(from.clone(), to.clone()))
    }

    /// Whether an output of type `output` may feed an input of type `input`.
    ///
    /// Evaluated in the output to input direction only; the reverse pair may
    /// give a different answer.
    pub fn types_are_connectable(&self, output: &ValueType, input: &ValueType) -> bool {
        if self.are_incompatible(output, input) {
            return false;
        }
        if self.custom_io.contains(&(output.clone(), input.clone())) {
            return true;
        }
        if input.is_assignable_from(output) {
            return true;
        }
        // Untyped outputs are checked when the value actually flows
        if matches!(output, ValueType::Any) {
            return true;
        }
        self.are_assignable(output, input)
    }

    /// Convert a value so it can be stored in a field of type `to`.
    ///
    /// Values already assignable (and nulls) are returned unchanged, as are
    /// values with no registered adapter.
    pub fn convert(&self, value: Value, to: &ValueType) -> Value {
        if value.is_null() {
            return value;
        }
        let from = value.value_type();
        if to.is_assignable_from(&from) {
            return value;
        }
        match self.adapter(&from, to) {
            Some(adapter) => adapter(&value),
            None => value,
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("incompatible", &self.incompatible)
            .field("custom_io", &self.custom_io)
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectable_rules() {
        let types = TypeRegistry::with_default_adapters();
        assert!(types.types_are_connectable(&ValueType::Int, &ValueType::Int));
        assert!(types.types_are_connectable(&ValueType::Int, &ValueType::Any));
        assert!(types.types_are_connectable(&ValueType::Int, &ValueType::Float));
        assert!(types.types_are_connectable(&ValueType::Float, &ValueType::Vector3));
        assert!(!types.types_are_connectable(&ValueType::Vector3, &ValueType::Float));
        assert!(!types.types_are_connectable(&ValueType::Bool, &ValueType::Int));
    }

    #[test]
    fn test_incompatibility_overrides_everything() {
        let mut types = TypeRegistry::with_default_adapters();
        types.register_incompatible(ValueType::Int, ValueType::Float);
        types.register_incompatible(ValueType::Int, ValueType::Any);
        assert!(!types.types_are_connectable(&ValueType::Int, &ValueType::Float));
        assert!(!types.types_are_connectable(&ValueType::Int, &ValueType::Any));
        assert!(types.types_are_connectable(&ValueType::Float, &ValueType::Int));
    }

    #[test]
    fn test_custom_io_claims_pair() {
        let mut types = TypeRegistry::new();
        let mesh = ValueType::Object("Mesh".into());
        assert!(!types.types_are_connectable(&mesh, &ValueType::String));
        types.register_custom_io(mesh.clone(), ValueType::String);
        assert!(types.types_are_connectable(&mesh, &ValueType::String));
    }

    #[test]
    fn test_convert_uses_adapters() {
        let types = TypeRegistry::with_default_adapters();
        assert_eq!(types.convert(Value::Int(3), &ValueType::Float), Value::Float(3.0));
        assert_eq!(types.convert(Value::Float(2.9), &ValueType::Int), Value::Int(2));
        assert_eq!(types.convert(Value::Int(3), &ValueType::Int), Value::Int(3));
        assert_eq!(types.convert(Value::Int(7), &ValueType::String), Value::String("7".into()));
        assert_eq!(types.convert(Value::Null, &ValueType::Int), Value::Null);
    }
}
