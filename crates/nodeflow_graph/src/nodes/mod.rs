// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node types.

mod constant;
mod debug;
mod math;
mod parameter;
mod relay;

pub use constant::ConstantNode;
pub use debug::LogNode;
pub use math::AddNode;
pub use parameter::{ParameterAccessor, ParameterNode};
pub use relay::RelayNode;

use crate::node::{NodeCategory, NodeRegistry};
use crate::value::ValueType;

/// Create a registry holding every built-in node type
pub fn create_builtin_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // Constants
    for value_type in [
        ValueType::Bool,
        ValueType::Int,
        ValueType::Float,
        ValueType::String,
        ValueType::Vector2,
        ValueType::Vector3,
        ValueType::Vector4,
        ValueType::Color,
    ] {
        let description = format!("Constant {value_type} value");
        registry.register(NodeCategory::Input, description, move || ConstantNode::new(value_type.clone()));
    }
    registry.register(NodeCategory::Input, "Read or write an exposed parameter", ParameterNode::get);

    registry.register(NodeCategory::Math, "Sum of two numbers", || AddNode);
    registry.register(NodeCategory::Output, "Log the incoming value", || LogNode);
    registry.register(NodeCategory::Utility, "Pack several edges into one, or unpack them again", RelayNode::default);

    registry
}
