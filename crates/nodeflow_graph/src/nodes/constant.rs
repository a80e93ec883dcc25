// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant value node.

use crate::error::ProcessError;
use crate::field::FieldDescriptor;
use crate::node::{NodeLogic, ProcessContext};
use crate::value::ValueType;

/// Outputs the value stored in its `value` field
#[derive(Debug, Clone)]
pub struct ConstantNode {
    value_type: ValueType,
}

impl ConstantNode {
    /// Create a constant of the given type
    pub fn new(value_type: ValueType) -> Self {
        Self { value_type }
    }

    /// Type of the constant
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }
}

impl NodeLogic for ConstantNode {
    fn type_name(&self) -> &'static str {
        match self.value_type {
            ValueType::Bool => "BoolConstant",
            ValueType::Int => "IntConstant",
            ValueType::Float => "FloatConstant",
            ValueType::String => "StringConstant",
            ValueType::Vector2 => "Vector2Constant",
            ValueType::Vector3 => "Vector3Constant",
            ValueType::Vector4 => "Vector4Constant",
            ValueType::Color => "ColorConstant",
            _ => "Constant",
        }
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::output("value", self.value_type.clone()).with_display_name("Value")]
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let value = ctx.input("value")?;
        if !value.is_null() && !self.value_type.is_assignable_from(&value.value_type()) {
            return Err(ProcessError::TypeMismatch {
                field: "value".to_string(),
                expected: self.value_type.clone(),
                found: value.value_type(),
            });
        }
        Ok(())
    }
}
