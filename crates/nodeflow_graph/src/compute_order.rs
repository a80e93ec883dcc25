// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution ordering of graph nodes.
//!
//! Both strategies rank nodes so that every edge goes from a lower compute
//! order to a higher one. They disagree on how a cycle is reported:
//!
//! - [`ComputeOrderStrategy::DepthFirst`] marks cycle members, and every node
//!   fed by them, with [`LOOP_COMPUTE_ORDER`] (-2).
//! - [`ComputeOrderStrategy::BreadthFirst`] reports cycles with
//!   [`INVALID_COMPUTE_ORDER`] (-1), the same value it uses for nodes that
//!   cannot process.
//!
//! Hosts already tell "looping" and "disabled" nodes apart with the
//! depth-first values, so both sentinels are kept as they are. Either way a
//! negative compute order means the node is left out of [`Graph::run`].

use crate::graph::Graph;
use crate::node::{NodeId, INVALID_COMPUTE_ORDER, LOOP_COMPUTE_ORDER};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Maximum dependency depth followed by the breadth-first strategy
pub const MAX_COMPUTE_ORDER_DEPTH: usize = 1000;

/// Compute order strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComputeOrderStrategy {
    /// Cycle detection, then dependency-first linearization
    #[default]
    DepthFirst,
    /// Memoized rank: one more than the sum of the dependencies' ranks
    BreadthFirst,
}

/// Dependencies (input nodes) of every node, in node order
type Dependencies = IndexMap<NodeId, Vec<NodeId>>;

impl Graph {
    /// Recompute every node's compute order with the graph's strategy
    pub fn update_compute_order(&mut self) {
        self.update_compute_order_with(self.compute_order_strategy);
    }

    /// Recompute every node's compute order with an explicit strategy
    pub fn update_compute_order_with(&mut self, strategy: ComputeOrderStrategy) {
        let orders = match strategy {
            ComputeOrderStrategy::DepthFirst => self.depth_first_orders(),
            ComputeOrderStrategy::BreadthFirst => self.breadth_first_orders(),
        };
        for (id, order) in orders {
            if let Some(node) = self.node_mut(id) {
                node.compute_order = order;
            }
        }
        tracing::debug!(?strategy, "Compute order updated for `{}`", self.name);
    }

    /// Nodes with a valid compute order, ascending; ties keep node order
    pub fn execution_order(&self) -> Vec<NodeId> {
        let mut nodes: Vec<(i32, NodeId)> = self
            .nodes()
            .filter(|n| n.compute_order >= 0)
            .map(|n| (n.compute_order, n.id))
            .collect();
        nodes.sort_by_key(|(order, _)| *order);
        nodes.into_iter().map(|(_, id)| id).collect()
    }

    fn dependencies(&self) -> Dependencies {
        let mut deps: Dependencies = self.node_ids().map(|id| (id, Vec::new())).collect();
        for edge in self.edges() {
            if let Some(inputs) = deps.get_mut(&edge.input_node) {
                if !inputs.contains(&edge.output_node) {
                    inputs.push(edge.output_node);
                }
            }
        }
        deps
    }

    fn depth_first_orders(&self) -> HashMap<NodeId, i32> {
        let deps = self.dependencies();
        let looping = nodes_in_or_after_loops(&deps);

        let mut orders: HashMap<NodeId, i32> = HashMap::new();
        for id in &looping {
            orders.insert(*id, LOOP_COMPUTE_ORDER);
        }

        let mut next = 0;
        let mut visited: HashSet<NodeId> = looping.clone();
        for &root in deps.keys() {
            if visited.contains(&root) {
                continue;
            }
            // post-order walk over dependencies
            visited.insert(root);
            let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
            while let Some((node, child)) = stack.pop() {
                let inputs = deps.get(&node).map_or(&[][..], Vec::as_slice);
                if let Some(&dep) = inputs.get(child) {
                    stack.push((node, child + 1));
                    if visited.insert(dep) {
                        stack.push((dep, 0));
                    }
                    continue;
                }

                let processable = self.node(node).is_some_and(|n| n.can_process());
                if processable {
                    orders.insert(node, next);
                    next += 1;
                } else {
                    orders.insert(node, INVALID_COMPUTE_ORDER);
                }
            }
        }

        if !looping.is_empty() {
            tracing::warn!(nodes = looping.len(), "Graph `{}` contains loops", self.name);
        }
        orders
    }

    fn breadth_first_orders(&self) -> HashMap<NodeId, i32> {
        let deps = self.dependencies();
        let mut memo: HashMap<NodeId, i32> = HashMap::new();
        let mut in_progress: HashSet<NodeId> = HashSet::new();

        for &id in deps.keys() {
            self.breadth_first_rank(id, 0, &deps, &mut memo, &mut in_progress);
        }
        memo
    }

    fn breadth_first_rank(
        &self,
        node: NodeId,
        depth: usize,
        deps: &Dependencies,
        memo: &mut HashMap<NodeId, i32>,
        in_progress: &mut HashSet<NodeId>,
    ) -> i32 {
        if depth > MAX_COMPUTE_ORDER_DEPTH {
            tracing::error!(node = %node, "Compute order depth limit ({MAX_COMPUTE_ORDER_DEPTH}) exceeded");
            return INVALID_COMPUTE_ORDER;
        }
        if let Some(order) = memo.get(&node) {
            return *order;
        }
        if !in_progress.insert(node) {
            // revisited while still being ranked: cycle
            return INVALID_COMPUTE_ORDER;
        }

        let mut order = if self.node(node).is_some_and(|n| n.can_process()) { 0 } else { INVALID_COMPUTE_ORDER };
        let inputs = deps.get(&node).map_or(&[][..], Vec::as_slice);
        if order == 0 && !inputs.is_empty() {
            order = 1;
            for dep in inputs {
                let rank = self.breadth_first_rank(*dep, depth + 1, deps, memo, in_progress);
                if rank < 0 {
                    order = INVALID_COMPUTE_ORDER;
                    break;
                }
                order = order.saturating_add(rank);
            }
        }

        in_progress.remove(&node);
        memo.insert(node, order);
        order
    }
}

/// Nodes taking part in a cycle, plus every node downstream of one.
///
/// Strongly connected components are found with an iterative Tarjan walk
/// over the dependency edges.
fn nodes_in_or_after_loops(deps: &Dependencies) -> HashSet<NodeId> {
    let mut index: HashMap<NodeId, usize> = HashMap::new();
    let mut lowlink: HashMap<NodeId, usize> = HashMap::new();
    let mut on_stack: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut next_index = 0;
    let mut looping: HashSet<NodeId> = HashSet::new();

    for &root in deps.keys() {
        if index.contains_key(&root) {
            continue;
        }
        let mut work: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some((node, child)) = work.pop() {
            if child == 0 {
                index.insert(node, next_index);
                lowlink.insert(node, next_index);
                next_index += 1;
                stack.push(node);
                on_stack.insert(node);
            }

            let inputs = deps.get(&node).map_or(&[][..], Vec::as_slice);
            if let Some(&dep) = inputs.get(child) {
                work.push((node, child + 1));
                if !index.contains_key(&dep) {
                    work.push((dep, 0));
                } else if on_stack.contains(&dep) {
                    let low = lowlink[&node].min(index[&dep]);
                    lowlink.insert(node, low);
                }
                continue;
            }

            if lowlink[&node] == index[&node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack.remove(&member);
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                if component.len() > 1 || inputs.contains(&node) {
                    looping.extend(component);
                }
            }
            if let Some(&(parent, _)) = work.last() {
                let low = lowlink[&parent].min(lowlink[&node]);
                lowlink.insert(parent, low);
            }
        }
    }

    // everything fed by a loop cannot be ranked either
    let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (node, inputs) in deps {
        for dep in inputs {
            dependents.entry(*dep).or_default().push(*node);
        }
    }
    let mut pending: Vec<NodeId> = looping.iter().copied().collect();
    while let Some(node) = pending.pop() {
        for next in dependents.get(&node).into_iter().flatten() {
            if looping.insert(*next) {
                pending.push(*next);
            }
        }
    }

    looping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BaseNode;
    use crate::nodes::{AddNode, ConstantNode, LogNode};
    use crate::port::PortRef;
    use crate::value::ValueType;

    fn chain(graph: &mut Graph) -> (NodeId, NodeId, NodeId) {
        let log = graph.add_node(BaseNode::from_logic(LogNode)).unwrap();
        let add = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
        let source = graph.add_node(BaseNode::from_logic(ConstantNode::new(ValueType::Float))).unwrap();
        graph.connect(PortRef::field(add, "a"), PortRef::field(source, "value")).unwrap();
        graph.connect(PortRef::field(add, "b"), PortRef::field(source, "value")).unwrap();
        graph.connect(PortRef::field(log, "input"), PortRef::field(add, "sum")).unwrap();
        (source, add, log)
    }

    #[test]
    fn test_depth_first_respects_dependencies() {
        let mut graph = Graph::default();
        let (source, add, log) = chain(&mut graph);
        graph.update_compute_order();

        assert_eq!(graph.node(source).unwrap().compute_order, 0);
        assert_eq!(graph.node(add).unwrap().compute_order, 1);
        assert_eq!(graph.node(log).unwrap().compute_order, 2);
        assert_eq!(graph.execution_order(), vec![source, add, log]);
    }

    #[test]
    fn test_breadth_first_respects_dependencies() {
        let mut graph = Graph::default();
        let (source, add, log) = chain(&mut graph);
        graph.update_compute_order_with(ComputeOrderStrategy::BreadthFirst);

        let order = |id| graph.node(id).unwrap().compute_order;
        assert_eq!(order(source), 0);
        assert!(order(source) < order(add));
        assert!(order(add) < order(log));
    }

    #[test]
    fn test_self_loop_is_detected() {
        let mut graph = Graph::default();
        let add = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
        let log = graph.add_node(BaseNode::from_logic(LogNode)).unwrap();
        graph.connect(PortRef::field(add, "a"), PortRef::field(add, "sum")).unwrap();
        graph.connect(PortRef::field(log, "input"), PortRef::field(add, "sum")).unwrap();

        graph.update_compute_order();
        assert_eq!(graph.node(add).unwrap().compute_order, LOOP_COMPUTE_ORDER);
        // downstream of the loop
        assert_eq!(graph.node(log).unwrap().compute_order, LOOP_COMPUTE_ORDER);
        assert!(graph.execution_order().is_empty());

        graph.update_compute_order_with(ComputeOrderStrategy::BreadthFirst);
        assert_eq!(graph.node(add).unwrap().compute_order, INVALID_COMPUTE_ORDER);
        assert_eq!(graph.node(log).unwrap().compute_order, INVALID_COMPUTE_ORDER);
    }

    #[test]
    fn test_loops_leave_independent_nodes_ranked() {
        let mut graph = Graph::default();
        let a = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
        let b = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
        let free = graph.add_node(BaseNode::from_logic(ConstantNode::new(ValueType::Float))).unwrap();
        graph.connect(PortRef::field(b, "a"), PortRef::field(a, "sum")).unwrap();
        graph.connect(PortRef::field(a, "a"), PortRef::field(b, "sum")).unwrap();

        graph.update_compute_order();
        assert_eq!(graph.node(a).unwrap().compute_order, LOOP_COMPUTE_ORDER);
        assert_eq!(graph.node(b).unwrap().compute_order, LOOP_COMPUTE_ORDER);
        assert_eq!(graph.node(free).unwrap().compute_order, 0);
        assert_eq!(graph.execution_order(), vec![free]);
    }

    #[test]
    fn test_breadth_first_depth_guard() {
        let mut graph = Graph::default();
        // the sink comes first in node order, so ranking starts at the far end
        let sink = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
        let mut upstream = sink;
        for _ in 0..MAX_COMPUTE_ORDER_DEPTH + 5 {
            let next = graph.add_node(BaseNode::from_logic(AddNode)).unwrap();
            graph.connect(PortRef::field(upstream, "a"), PortRef::field(next, "sum")).unwrap();
            upstream = next;
        }

        graph.update_compute_order_with(ComputeOrderStrategy::BreadthFirst);
        assert_eq!(graph.node(sink).unwrap().compute_order, INVALID_COMPUTE_ORDER);
        assert_eq!(graph.node(upstream).unwrap().compute_order, 0);

        // depth-first has no depth limit
        graph.update_compute_order();
        assert_eq!(graph.node(sink).unwrap().compute_order, MAX_COMPUTE_ORDER_DEPTH as i32 + 5);
    }
}
