// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types.

use crate::edge::EdgeId;
use crate::node::NodeId;
use crate::port::PortRef;
use crate::value::ValueType;
use uuid::Uuid;

/// Error raised by a graph operation
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node with this ID is already in the graph
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// Port not found
    #[error("Port not found: {}.{} ({:?})", .0.node, .0.field, .0.identifier)]
    PortNotFound(PortRef),

    /// The port exists but on the other side of the node
    #[error("Port {}.{} is not an {}", .port.node, .port.field, side_name(.expected_input))]
    WrongDirection {
        /// Requested port
        port: PortRef,
        /// Whether an input port was expected
        expected_input: bool,
    },

    /// Edge not found
    #[error("Edge not found: {0:?}")]
    EdgeNotFound(EdgeId),

    /// Incompatible port types
    #[error("Incompatible port types: cannot connect {output} to {input}")]
    IncompatiblePorts {
        /// Output port type
        output: ValueType,
        /// Input port type
        input: ValueType,
    },

    /// Node rejected during initialization
    #[error("Node {node} rejected: {source}")]
    NodeRejected {
        /// Rejected node
        node: NodeId,
        /// Cause
        source: ProcessError,
    },

    /// Node processing failed
    #[error("Node {node} failed: {source}")]
    Process {
        /// Failing node
        node: NodeId,
        /// Cause
        source: ProcessError,
    },

    /// Exposed parameter not found
    #[error("Exposed parameter not found: {0}")]
    ParameterNotFound(Uuid),

    /// Value does not match the exposed parameter's type
    #[error("Type mismatch when updating parameter {name}: expected {expected}, found {found}")]
    ParameterTypeMismatch {
        /// Parameter name
        name: String,
        /// Parameter type
        expected: ValueType,
        /// Type of the rejected value
        found: ValueType,
    },

    /// Asset written by a newer version of the format
    #[error("Graph asset version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the asset
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// Reading or writing an asset file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Asset serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// Asset parsing failed
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

fn side_name(input: &bool) -> &'static str {
    if *input {
        "input"
    } else {
        "output"
    }
}

/// Error raised by node logic
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessError {
    /// A field the logic needs is missing
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A field holds a value of the wrong type
    #[error("Field {field}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Expected type
        expected: ValueType,
        /// Actual type
        found: ValueType,
    },

    /// Exposed parameter reference does not resolve
    #[error("Exposed parameter {0} can't be found")]
    ParameterNotFound(String),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
