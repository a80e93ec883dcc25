// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exposed parameter access node.

use crate::error::ProcessError;
use crate::field::{FieldDescriptor, Fields, PortBehavior};
use crate::graph::Graph;
use crate::node::{EnableContext, NodeLogic, PortBehaviorContext, ProcessContext};
use crate::parameter::ExposedParameter;
use crate::port_data::PortData;
use crate::value::ValueType;
use uuid::Uuid;

/// Whether a parameter node reads or writes its parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterAccessor {
    /// Output the parameter's value
    Get,
    /// Store the input into the parameter
    Set,
}

impl ParameterAccessor {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
        }
    }

    fn from_fields(fields: &Fields) -> Self {
        match fields.get_str(ParameterNode::ACCESSOR_FIELD) {
            Some("set") => Self::Set,
            _ => Self::Get,
        }
    }
}

/// Reads or writes an exposed parameter of the graph.
///
/// The parameter is referenced by GUID. Its single port mirrors the
/// parameter's type. A node whose parameter cannot be found refuses to
/// enable and is removed from the graph.
#[derive(Debug, Clone)]
pub struct ParameterNode {
    accessor: ParameterAccessor,
}

impl ParameterNode {
    /// Setting holding the parameter GUID
    pub const GUID_FIELD: &'static str = "parameter_guid";
    /// Setting holding the accessor, `get` or `set`
    pub const ACCESSOR_FIELD: &'static str = "accessor";

    /// Node reading its parameter
    pub fn get() -> Self {
        Self { accessor: ParameterAccessor::Get }
    }

    /// Node writing its parameter
    pub fn set() -> Self {
        Self { accessor: ParameterAccessor::Set }
    }

    fn guid(fields: &Fields) -> Option<Uuid> {
        fields.get_str(Self::GUID_FIELD).and_then(|s| Uuid::parse_str(s).ok())
    }

    fn resolve<'g>(graph: &'g Graph, fields: &Fields) -> Option<&'g ExposedParameter> {
        Self::guid(fields).and_then(|guid| graph.get_exposed_parameter_from_guid(guid))
    }
}

impl NodeLogic for ParameterNode {
    fn type_name(&self) -> &'static str {
        "Parameter"
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::setting(Self::GUID_FIELD, ValueType::String),
            FieldDescriptor::setting(Self::ACCESSOR_FIELD, ValueType::String).with_default(self.accessor.as_str()),
            FieldDescriptor::input("input", ValueType::Any).with_behavior(PortBehavior::Custom),
            FieldDescriptor::output("output", ValueType::Any).with_behavior(PortBehavior::Custom),
        ]
    }

    fn port_behavior(&self, field: &str, ctx: &PortBehaviorContext<'_>) -> Option<Vec<PortData>> {
        let accessor = ParameterAccessor::from_fields(ctx.fields);
        let parameter = Self::resolve(ctx.graph, ctx.fields);
        let (name, value_type) = parameter
            .map(|p| (p.name.clone(), p.value_type.clone()))
            .unwrap_or_else(|| ("Value".to_string(), ValueType::Any));

        let ports = match (field, accessor) {
            ("output", ParameterAccessor::Get) => vec![PortData::new(name, value_type).multiple()],
            ("input", ParameterAccessor::Set) => vec![PortData::new(name, value_type)],
            _ => Vec::new(),
        };
        Some(ports)
    }

    fn enable(&self, ctx: &EnableContext<'_>) -> Result<(), ProcessError> {
        if Self::resolve(ctx.graph, ctx.fields).is_none() {
            let guid = ctx.fields.get_str(Self::GUID_FIELD).unwrap_or_default();
            return Err(ProcessError::ParameterNotFound(guid.to_string()));
        }
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let guid = Self::guid(ctx.fields).ok_or_else(|| ProcessError::MissingField(Self::GUID_FIELD.to_string()))?;

        match ParameterAccessor::from_fields(ctx.fields) {
            ParameterAccessor::Get => {
                let value = ctx
                    .parameter(guid)
                    .map(|p| p.value.clone())
                    .ok_or_else(|| ProcessError::ParameterNotFound(guid.to_string()))?;
                ctx.set("output", value);
            }
            ParameterAccessor::Set => {
                let value = ctx.input("input")?.clone();
                ctx.set_parameter(guid, value);
            }
        }
        Ok(())
    }
}
