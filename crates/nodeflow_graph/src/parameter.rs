// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exposed (graph-level) parameters.

use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Editor settings of a parameter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSettings {
    /// Hidden from the host's parameter list
    pub is_hidden: bool,
    /// Expanded in the host's parameter list
    pub expanded: bool,
    /// Tooltip
    pub tooltip: Option<String>,
}

/// Named, typed value owned by a graph and referenced by parameter nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposedParameter {
    /// Unique ID, referenced by parameter nodes
    pub guid: Uuid,
    /// Name
    pub name: String,
    /// Declared type
    pub value_type: ValueType,
    /// Current value
    pub value: Value,
    /// Editor settings
    #[serde(default)]
    pub settings: ParameterSettings,
}

impl ExposedParameter {
    /// Create a parameter.
    ///
    /// A null value for a value type is replaced by the type's default.
    pub fn new(name: impl Into<String>, value_type: ValueType, value: Value) -> Self {
        let value = if value.is_null() && value_type.is_value_type() {
            value_type.default_value()
        } else {
            value
        };
        Self {
            guid: Uuid::new_v4(),
            name: name.into(),
            value_type,
            value,
            settings: ParameterSettings::default(),
        }
    }

    /// Whether `value` may be stored in this parameter
    pub fn accepts(&self, value: &Value) -> bool {
        value.is_null() || self.value_type.is_assignable_from(&value.value_type())
    }
}
