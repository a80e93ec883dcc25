// SPDX-License-Identifier: MIT OR Apache-2.0
//! Math nodes.

use crate::error::ProcessError;
use crate::field::FieldDescriptor;
use crate::node::{NodeLogic, ProcessContext};
use crate::value::ValueType;

/// `sum = a + b`
#[derive(Debug, Clone, Copy, Default)]
pub struct AddNode;

impl NodeLogic for AddNode {
    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::input("a", ValueType::Float).with_display_name("A"),
            // editable in place, keeps its value when unplugged
            FieldDescriptor::input("b", ValueType::Float)
                .with_display_name("B")
                .keep_value_on_disconnect(),
            FieldDescriptor::output("sum", ValueType::Float).with_display_name("Sum"),
        ]
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let sum = ctx.float("a")? + ctx.float("b")?;
        ctx.set("sum", sum);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Fields;
    use crate::node::NodeId;
    use crate::value::Value;

    #[test]
    fn test_add() {
        let mut fields = Fields::from_descriptors(&AddNode.fields());
        fields.set("a", 1.5);
        fields.set("b", Value::Int(2));
        let mut ctx = ProcessContext::new(NodeId::new(), &mut fields, &[]);
        AddNode.process(&mut ctx).unwrap();
        assert_eq!(fields.get_float("sum"), Some(3.5));
    }

    #[test]
    fn test_add_rejects_strings() {
        let mut fields = Fields::from_descriptors(&AddNode.fields());
        fields.set("a", "one");
        let mut ctx = ProcessContext::new(NodeId::new(), &mut fields, &[]);
        assert!(matches!(AddNode.process(&mut ctx), Err(ProcessError::TypeMismatch { .. })));
    }
}
