// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph dataflow engine.
//!
//! A mutable graph of typed nodes joined by directional edges, with:
//! - Ports derived from declared node fields, optionally re-derived from the
//!   current edges by custom port behaviors
//! - Edge type compatibility checking and type adapters
//! - Compiled value propagation between connected fields
//! - Dependency-ordered execution with cycle handling
//! - Relay nodes packing and unpacking arbitrary edges
//!
//! ## Architecture
//!
//! The [`Graph`] owns every node and edge. Edges address their endpoints by
//! node ID, field name and port identifier, and are resolved through the
//! graph. Node types implement [`NodeLogic`]; the engine keeps their field
//! values, ports and subscribers in a [`BaseNode`].
//!
//! Everything runs on the caller's thread. Failures are local: mutation
//! entry points return [`GraphError`], and non-fatal conditions are logged
//! through `tracing` and reflected in graph state.

pub mod asset;
pub mod compute_order;
pub mod edge;
pub mod error;
pub mod events;
pub mod field;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod parameter;
pub mod port;
pub mod port_data;
pub mod types;
pub mod value;

pub use asset::{EdgeAsset, GraphAsset, NodeAsset};
pub use compute_order::ComputeOrderStrategy;
pub use edge::{Edge, EdgeId};
pub use error::{GraphError, ProcessError, Result};
pub use events::{EventHandlers, GraphChange, SubscriptionId};
pub use field::{FieldDescriptor, FieldKind, Fields, PortBehavior};
pub use graph::{Graph, RunReport};
pub use node::{
    BaseNode, EdgeView, NodeCategory, NodeId, NodeLogic, NodeMessage, NodeMessageType, NodeRegistry,
    ProcessContext, INVALID_COMPUTE_ORDER, LOOP_COMPUTE_ORDER,
};
pub use parameter::{ExposedParameter, ParameterSettings};
pub use port::{NodePort, PortDirection, PortRef};
pub use port_data::PortData;
pub use types::TypeRegistry;
pub use value::{PackedRecord, Value, ValueType};
