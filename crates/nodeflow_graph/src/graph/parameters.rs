// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exposed parameter management.

use super::Graph;
use crate::error::{GraphError, Result};
use crate::parameter::ExposedParameter;
use crate::value::{Value, ValueType};
use uuid::Uuid;

impl Graph {
    /// Exposed parameters, in declaration order
    pub fn exposed_parameters(&self) -> &[ExposedParameter] {
        &self.exposed_parameters
    }

    /// Add an exposed parameter and return its GUID
    pub fn add_exposed_parameter(&mut self, name: impl Into<String>, value_type: ValueType, value: Value) -> Uuid {
        self.insert_exposed_parameter(ExposedParameter::new(name, value_type, value))
    }

    /// Add a fully built parameter (keeps its GUID and settings)
    pub fn insert_exposed_parameter(&mut self, parameter: ExposedParameter) -> Uuid {
        let guid = parameter.guid;
        tracing::debug!(%guid, "Exposed parameter `{}` added", parameter.name);
        self.exposed_parameters.push(parameter);
        self.events.exposed_parameter_list_changed.emit(&());
        guid
    }

    /// Remove an exposed parameter.
    ///
    /// Nodes are re-validated afterwards, so parameter nodes referencing it
    /// remove themselves.
    pub fn remove_exposed_parameter(&mut self, guid: Uuid) -> Option<ExposedParameter> {
        let index = self.exposed_parameters.iter().position(|p| p.guid == guid)?;
        let parameter = self.exposed_parameters.remove(index);
        self.events.exposed_parameter_list_changed.emit(&());
        self.revalidate_nodes();
        Some(parameter)
    }

    /// Replace the value of a parameter.
    ///
    /// The value must match the declared type; `Null` is always accepted.
    pub fn update_exposed_parameter(&mut self, guid: Uuid, value: Value) -> Result<()> {
        let parameter = self
            .exposed_parameters
            .iter_mut()
            .find(|p| p.guid == guid)
            .ok_or(GraphError::ParameterNotFound(guid))?;

        if !parameter.accepts(&value) {
            return Err(GraphError::ParameterTypeMismatch {
                name: parameter.name.clone(),
                expected: parameter.value_type.clone(),
                found: value.value_type(),
            });
        }

        parameter.value = value;
        self.events.exposed_parameter_modified.emit(parameter);
        Ok(())
    }

    /// Rename a parameter
    pub fn update_exposed_parameter_name(&mut self, guid: Uuid, name: impl Into<String>) -> Result<()> {
        let parameter = self
            .exposed_parameters
            .iter_mut()
            .find(|p| p.guid == guid)
            .ok_or(GraphError::ParameterNotFound(guid))?;
        parameter.name = name.into();
        self.events.exposed_parameter_modified.emit(parameter);
        Ok(())
    }

    /// Show or hide a parameter in the host's parameter list
    pub fn update_exposed_parameter_visibility(&mut self, guid: Uuid, hidden: bool) -> Result<()> {
        let parameter = self
            .exposed_parameters
            .iter_mut()
            .find(|p| p.guid == guid)
            .ok_or(GraphError::ParameterNotFound(guid))?;
        parameter.settings.is_hidden = hidden;
        self.events.exposed_parameter_modified.emit(parameter);
        Ok(())
    }

    /// Ask listeners to refresh their copy of a parameter's value
    pub fn notify_exposed_parameter_value_changed(&mut self, guid: Uuid) -> Result<()> {
        let parameter = self
            .exposed_parameters
            .iter()
            .find(|p| p.guid == guid)
            .ok_or(GraphError::ParameterNotFound(guid))?;
        self.events.exposed_parameter_value_changed.emit(parameter);
        Ok(())
    }

    /// First parameter with this name
    pub fn get_exposed_parameter(&self, name: &str) -> Option<&ExposedParameter> {
        self.exposed_parameters.iter().find(|p| p.name == name)
    }

    /// Parameter with this GUID
    pub fn get_exposed_parameter_from_guid(&self, guid: Uuid) -> Option<&ExposedParameter> {
        self.exposed_parameters.iter().find(|p| p.guid == guid)
    }

    /// Set a parameter's value by name; returns `false` if the parameter is
    /// missing or the value has the wrong type
    pub fn set_parameter_value(&mut self, name: &str, value: Value) -> bool {
        let Some(guid) = self.get_exposed_parameter(name).map(|p| p.guid) else {
            return false;
        };
        match self.update_exposed_parameter(guid, value) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{err}");
                false
            }
        }
    }

    /// Value of a parameter by name
    pub fn get_parameter_value(&self, name: &str) -> Option<&Value> {
        self.get_exposed_parameter(name).map(|p| &p.value)
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::Graph;
    use crate::node::BaseNode;
    use crate::nodes::ParameterNode;
    use crate::value::{Value, ValueType};
    use crate::GraphError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_parameter_crud() {
        let mut graph = Graph::default();
        let guid = graph.add_exposed_parameter("speed", ValueType::Float, Value::Null);

        assert_eq!(graph.get_parameter_value("speed"), Some(&Value::Float(0.0)));
        assert!(graph.set_parameter_value("speed", Value::Float(2.5)));
        assert!(!graph.set_parameter_value("speed", Value::from("fast")));
        assert!(!graph.set_parameter_value("missing", Value::Float(1.0)));
        assert_eq!(graph.get_exposed_parameter_from_guid(guid).unwrap().value, Value::Float(2.5));

        graph.update_exposed_parameter_name(guid, "velocity").unwrap();
        assert!(graph.get_exposed_parameter("speed").is_none());
        graph.update_exposed_parameter_visibility(guid, true).unwrap();
        assert!(graph.get_exposed_parameter("velocity").unwrap().settings.is_hidden);

        assert!(graph.remove_exposed_parameter(guid).is_some());
        assert!(graph.exposed_parameters().is_empty());
    }

    #[test]
    fn test_update_rejects_wrong_type() {
        let mut graph = Graph::default();
        let guid = graph.add_exposed_parameter("count", ValueType::Int, Value::Int(1));
        let result = graph.update_exposed_parameter(guid, Value::Bool(true));
        assert!(matches!(result, Err(GraphError::ParameterTypeMismatch { .. })));

        let result = graph.update_exposed_parameter(uuid::Uuid::new_v4(), Value::Int(2));
        assert!(matches!(result, Err(GraphError::ParameterNotFound(_))));
    }

    #[test]
    fn test_parameter_events() {
        let mut graph = Graph::default();
        let list = Rc::new(RefCell::new(0));
        let modified = Rc::new(RefCell::new(Vec::new()));
        {
            let list = list.clone();
            graph
                .events
                .exposed_parameter_list_changed
                .subscribe(move |_| *list.borrow_mut() += 1);
            let modified = modified.clone();
            graph
                .events
                .exposed_parameter_modified
                .subscribe(move |p| modified.borrow_mut().push(p.value.clone()));
        }

        let guid = graph.add_exposed_parameter("count", ValueType::Int, Value::Int(1));
        graph.update_exposed_parameter(guid, Value::Int(3)).unwrap();
        graph.remove_exposed_parameter(guid);

        assert_eq!(*list.borrow(), 2);
        assert_eq!(*modified.borrow(), vec![Value::Int(3)]);
    }

    #[test]
    fn test_removing_parameter_removes_its_nodes() {
        let mut graph = Graph::default();
        let guid = graph.add_exposed_parameter("count", ValueType::Int, Value::Int(1));
        let node = BaseNode::from_logic(ParameterNode::get())
            .with_field(ParameterNode::GUID_FIELD, Value::String(guid.to_string()));
        let id = graph.add_node(node).unwrap();

        graph.remove_exposed_parameter(guid);
        assert!(graph.node(id).is_none());
    }
}
