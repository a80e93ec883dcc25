// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications.
//!
//! Nodes and graphs expose one subscriber list per event. Any number of
//! independent listeners (editors, diagnostics, tests) may subscribe; each
//! gets a [`SubscriptionId`] it can later use to unsubscribe.

use crate::edge::{Edge, EdgeId};
use crate::node::{NodeId, NodeMessage};
use crate::parameter::ExposedParameter;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type Handler<T> = Box<dyn FnMut(&T)>;

/// Subscriber list for one event
pub struct EventHandlers<T: ?Sized> {
    handlers: Vec<(SubscriptionId, Handler<T>)>,
}

impl<T: ?Sized> EventHandlers<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Add a subscriber
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = SubscriptionId::next();
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a subscriber, returns whether it was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        before != self.handlers.len()
    }

    /// Notify every subscriber in subscription order
    pub fn emit(&mut self, event: &T) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }

    /// Number of subscribers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Drop every subscriber
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl<T: ?Sized> Default for EventHandlers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for EventHandlers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers").field("subscribers", &self.handlers.len()).finish()
    }
}

/// Per-node notifications
#[derive(Debug, Default)]
pub struct NodeEvents {
    /// Ports of a field were re-derived (payload: field name)
    pub ports_updated: EventHandlers<str>,
    /// An edge was attached to one of the node's ports
    pub after_edge_connected: EventHandlers<Edge>,
    /// An edge was detached from one of the node's ports
    pub after_edge_disconnected: EventHandlers<Edge>,
    /// A message was attached to the node
    pub message_added: EventHandlers<NodeMessage>,
    /// A message was removed from the node
    pub message_removed: EventHandlers<NodeMessage>,
    /// The node finished `process`
    pub processed: EventHandlers<NodeId>,
}

impl NodeEvents {
    /// Drop every subscriber
    pub fn clear(&mut self) {
        self.ports_updated.clear();
        self.after_edge_connected.clear();
        self.after_edge_disconnected.clear();
        self.message_added.clear();
        self.message_removed.clear();
        self.processed.clear();
    }
}

/// Structural change to a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphChange {
    /// Node added
    NodeAdded(NodeId),
    /// Node removed
    NodeRemoved(NodeId),
    /// Node settings or ports changed
    NodeChanged(NodeId),
    /// Edge added
    EdgeAdded(EdgeId),
    /// Edge removed
    EdgeRemoved(EdgeId),
}

/// Per-graph notifications
#[derive(Debug, Default)]
pub struct GraphEvents {
    /// Structural changes
    pub graph_changes: EventHandlers<GraphChange>,
    /// A parameter was added or removed
    pub exposed_parameter_list_changed: EventHandlers<()>,
    /// A parameter's value, name or settings changed
    pub exposed_parameter_modified: EventHandlers<ExposedParameter>,
    /// A host asked listeners to refresh a parameter's value
    pub exposed_parameter_value_changed: EventHandlers<ExposedParameter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut handlers: EventHandlers<str> = EventHandlers::new();

        let first = {
            let seen = seen.clone();
            handlers.subscribe(move |field: &str| seen.borrow_mut().push(format!("a:{field}")))
        };
        {
            let seen = seen.clone();
            handlers.subscribe(move |field: &str| seen.borrow_mut().push(format!("b:{field}")));
        }

        handlers.emit("input");
        assert!(handlers.unsubscribe(first));
        assert!(!handlers.unsubscribe(first));
        handlers.emit("output");

        assert_eq!(*seen.borrow(), vec!["a:input", "b:input", "b:output"]);
    }
}
