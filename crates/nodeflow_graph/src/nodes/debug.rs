// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debug output node.

use crate::error::ProcessError;
use crate::field::FieldDescriptor;
use crate::node::{NodeLogic, ProcessContext};
use crate::value::ValueType;

/// Logs whatever reaches its input
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNode;

impl NodeLogic for LogNode {
    fn type_name(&self) -> &'static str {
        "Log"
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::input("input", ValueType::Any).with_display_name("Input")]
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let value = ctx.input("input")?;
        tracing::info!(node = %ctx.node, "{value:?}");
        Ok(())
    }
}
