//! Bookkeeping shared by the vertex and arrow graph builders.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::cycles::find_strong_circular_dependencies;
use super::types::{Edge, Graph, GraphError, GraphId, Identifiable, Node, NodeType};
use crate::models::CircularDependency;

/// Caller-supplied source of fresh identifiers.
pub type IdGenerator<T> = Box<dyn FnMut() -> T>;

/// Node and edge registries plus dependency bookkeeping.
///
/// Adjacency is stored as id sets on each node, with separate tail/head
/// lookups per edge, so no node ever holds a reference to another.
pub struct GraphBuilderCore<T, E, N> {
    pub(crate) nodes: BTreeMap<T, Node<T, N>>,
    pub(crate) edges: BTreeMap<T, Edge<T, E>>,
    pub(crate) edge_tails: BTreeMap<T, T>,
    pub(crate) edge_heads: BTreeMap<T, T>,
    /// Declared dependencies per activity id.
    pub(crate) dependencies: BTreeMap<T, BTreeSet<T>>,
    /// Missing dependency id -> activities waiting for it.
    pub(crate) unsatisfied_successors: BTreeMap<T, BTreeSet<T>>,
    event_id_generator: IdGenerator<T>,
}

impl<T, E, N> GraphBuilderCore<T, E, N>
where
    T: GraphId,
    E: Identifiable<T>,
    N: Identifiable<T>,
{
    pub fn new(event_id_generator: IdGenerator<T>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            edge_tails: BTreeMap::new(),
            edge_heads: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            unsatisfied_successors: BTreeMap::new(),
            event_id_generator,
        }
    }

    pub fn next_event_id(&mut self) -> T {
        (self.event_id_generator)()
    }

    pub fn node(&self, id: T) -> Option<&Node<T, N>> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: T) -> Option<&mut Node<T, N>> {
        self.nodes.get_mut(&id)
    }

    pub fn edge(&self, id: T) -> Option<&Edge<T, E>> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: T) -> Option<&mut Edge<T, E>> {
        self.edges.get_mut(&id)
    }

    pub fn edge_tail_node(&self, edge_id: T) -> Option<&Node<T, N>> {
        self.edge_tails.get(&edge_id).and_then(|id| self.nodes.get(id))
    }

    pub fn edge_head_node(&self, edge_id: T) -> Option<&Node<T, N>> {
        self.edge_heads.get(&edge_id).and_then(|id| self.nodes.get(id))
    }

    pub fn node_ids(&self) -> Vec<T> {
        self.nodes.keys().copied().collect()
    }

    pub fn edge_ids(&self) -> Vec<T> {
        self.edges.keys().copied().collect()
    }

    /// True when every dependency referenced so far has itself been added.
    pub fn all_dependencies_satisfied(&self) -> bool {
        self.unsatisfied_successors.is_empty()
    }

    /// Ids referenced as dependencies that were never added.
    pub fn missing_dependencies(&self) -> BTreeSet<T> {
        self.unsatisfied_successors.keys().copied().collect()
    }

    pub fn strong_circular_dependencies(&self) -> Vec<CircularDependency<T>> {
        find_strong_circular_dependencies(&self.dependencies)
    }

    pub(crate) fn insert_node(&mut self, node: Node<T, N>) -> Result<(), GraphError<T>> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::IdCollision(id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Register `edge` running from `tail` to `head`.
    pub(crate) fn connect(&mut self, edge: Edge<T, E>, tail: T, head: T) -> Result<(), GraphError<T>> {
        let id = edge.id();
        if self.edges.contains_key(&id) {
            return Err(GraphError::IdCollision(id));
        }
        if !self.nodes.contains_key(&tail) {
            return Err(GraphError::NodeNotFound(tail));
        }
        if !self.nodes.contains_key(&head) {
            return Err(GraphError::NodeNotFound(head));
        }
        if let Some(node) = self.nodes.get_mut(&tail) {
            node.outgoing.insert(id);
        }
        if let Some(node) = self.nodes.get_mut(&head) {
            node.incoming.insert(id);
        }
        self.edge_tails.insert(id, tail);
        self.edge_heads.insert(id, head);
        self.edges.insert(id, edge);
        Ok(())
    }

    /// Remove an edge and every reference to it.
    pub(crate) fn disconnect(&mut self, edge_id: T) -> Option<Edge<T, E>> {
        let edge = self.edges.remove(&edge_id)?;
        if let Some(tail) = self.edge_tails.remove(&edge_id) {
            if let Some(node) = self.nodes.get_mut(&tail) {
                node.outgoing.remove(&edge_id);
            }
        }
        if let Some(head) = self.edge_heads.remove(&edge_id) {
            if let Some(node) = self.nodes.get_mut(&head) {
                node.incoming.remove(&edge_id);
            }
        }
        Some(edge)
    }

    /// Move the tail of an existing edge onto another node.
    pub(crate) fn retail(&mut self, edge_id: T, new_tail: T) {
        if let Some(old_tail) = self.edge_tails.insert(edge_id, new_tail) {
            if let Some(node) = self.nodes.get_mut(&old_tail) {
                node.outgoing.remove(&edge_id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&new_tail) {
            node.outgoing.insert(edge_id);
        }
    }

    /// Move the head of an existing edge onto another node.
    pub(crate) fn rehead(&mut self, edge_id: T, new_head: T) {
        if let Some(old_head) = self.edge_heads.insert(edge_id, new_head) {
            if let Some(node) = self.nodes.get_mut(&old_head) {
                node.incoming.remove(&edge_id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&new_head) {
            node.incoming.insert(edge_id);
        }
    }

    /// Recompute a node's role from its edge sets.
    pub(crate) fn reclassify(&mut self, node_id: T) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.node_type = NodeType::from_degrees(!node.incoming.is_empty(), !node.outgoing.is_empty());
        }
    }

    pub(crate) fn predecessor_nodes(&self, node_id: T) -> BTreeSet<T> {
        self.nodes
            .get(&node_id)
            .map(|node| {
                node.incoming
                    .iter()
                    .filter_map(|edge_id| self.edge_tails.get(edge_id).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn successor_nodes(&self, node_id: T) -> BTreeSet<T> {
        self.nodes
            .get(&node_id)
            .map(|node| {
                node.outgoing
                    .iter()
                    .filter_map(|edge_id| self.edge_heads.get(edge_id).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `to` can be reached from `from` without travelling `skip_edge`.
    pub(crate) fn is_reachable(&self, from: T, to: T, skip_edge: Option<T>) -> bool {
        let mut queue: VecDeque<T> = VecDeque::from([from]);
        let mut visited: BTreeSet<T> = BTreeSet::from([from]);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for edge_id in &node.outgoing {
                if Some(*edge_id) == skip_edge {
                    continue;
                }
                let Some(&next) = self.edge_heads.get(edge_id) else {
                    continue;
                };
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        false
    }

    /// Node ids ordered so every edge runs forward (Kahn's algorithm).
    pub(crate) fn node_topological_order(&self) -> Result<Vec<T>, GraphError<T>> {
        let mut in_degree: BTreeMap<T, usize> = self
            .nodes
            .iter()
            .map(|(&id, node)| (id, node.incoming.len()))
            .collect();

        let mut ready: VecDeque<T> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node_id) = ready.pop_front() {
            order.push(node_id);
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            for edge_id in &node.outgoing {
                let Some(head) = self.edge_heads.get(edge_id) else {
                    continue;
                };
                if let Some(degree) = in_degree.get_mut(head) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*head);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(GraphError::Cyclic);
        }
        Ok(order)
    }

    /// For every node, the set of all nodes that transitively precede it.
    pub fn ancestor_nodes_lookup(&self) -> Result<BTreeMap<T, BTreeSet<T>>, GraphError<T>> {
        let order = self.node_topological_order()?;
        let mut ancestors: BTreeMap<T, BTreeSet<T>> = BTreeMap::new();

        for node_id in order {
            let mut node_ancestors = BTreeSet::new();
            for predecessor in self.predecessor_nodes(node_id) {
                node_ancestors.insert(predecessor);
                if let Some(upstream) = ancestors.get(&predecessor) {
                    node_ancestors.extend(upstream.iter().copied());
                }
            }
            ancestors.insert(node_id, node_ancestors);
        }

        Ok(ancestors)
    }

    /// Edges whose removal leaves their head reachable from their tail,
    /// judged against the ancestor lookup taken before any removal.
    pub(crate) fn transitively_implied_edges(
        &self,
        candidates: impl IntoIterator<Item = T>,
    ) -> Result<Vec<T>, GraphError<T>> {
        let ancestors = self.ancestor_nodes_lookup()?;
        let mut implied = Vec::new();

        for edge_id in candidates {
            let (Some(&tail), Some(&head)) = (self.edge_tails.get(&edge_id), self.edge_heads.get(&edge_id)) else {
                continue;
            };
            let Some(head_node) = self.nodes.get(&head) else {
                continue;
            };
            let bypassed = head_node
                .incoming
                .iter()
                .filter(|&&other| other != edge_id)
                .filter_map(|other| self.edge_tails.get(other))
                .any(|other_tail| ancestors.get(other_tail).is_some_and(|set| set.contains(&tail)));
            if bypassed {
                implied.push(edge_id);
            }
        }

        Ok(implied)
    }

    /// Export the registries as a persisted graph.
    pub fn to_graph(&self) -> Graph<T, E, N>
    where
        E: Clone,
        N: Clone,
    {
        Graph::new(
            self.edges.values().cloned().collect(),
            self.nodes.values().cloned().collect(),
        )
    }

    /// Rebuild registries from a persisted graph, validating its structure.
    ///
    /// Every edge must be referenced exactly once as outgoing and once as
    /// incoming, every referenced edge must exist, and each node's role must
    /// agree with which of its edge sets are populated.
    pub fn from_graph(graph: Graph<T, E, N>, event_id_generator: IdGenerator<T>) -> Result<Self, GraphError<T>> {
        let mut core = Self::new(event_id_generator);

        for node in graph.nodes {
            let id = node.id();
            if core.nodes.insert(id, node).is_some() {
                return Err(GraphError::InvalidGraph(format!("duplicate node {id:?}")));
            }
        }
        for edge in graph.edges {
            let id = edge.id();
            if core.edges.insert(id, edge).is_some() {
                return Err(GraphError::InvalidGraph(format!("duplicate edge {id:?}")));
            }
        }

        for (&node_id, node) in &core.nodes {
            let roles_agree = match node.node_type {
                NodeType::Start => node.incoming.is_empty(),
                NodeType::End => node.outgoing.is_empty(),
                NodeType::Isolated => node.incoming.is_empty() && node.outgoing.is_empty(),
                NodeType::Normal => true,
            };
            if !roles_agree {
                return Err(GraphError::InvalidGraph(format!(
                    "node {node_id:?} of type {:?} has edges its role forbids",
                    node.node_type
                )));
            }
            for &edge_id in &node.outgoing {
                if core.edge_tails.insert(edge_id, node_id).is_some() {
                    return Err(GraphError::InvalidGraph(format!(
                        "edge {edge_id:?} has more than one tail node"
                    )));
                }
            }
            for &edge_id in &node.incoming {
                if core.edge_heads.insert(edge_id, node_id).is_some() {
                    return Err(GraphError::InvalidGraph(format!(
                        "edge {edge_id:?} has more than one head node"
                    )));
                }
            }
        }

        let referenced: BTreeSet<T> = core.edge_tails.keys().chain(core.edge_heads.keys()).copied().collect();
        if referenced.len() != core.edges.len() || referenced.iter().any(|id| !core.edges.contains_key(id)) {
            return Err(GraphError::InvalidGraph(format!(
                "{} edges present but {} referenced by nodes",
                core.edges.len(),
                referenced.len()
            )));
        }
        for edge_id in core.edges.keys() {
            match (core.edge_tails.get(edge_id), core.edge_heads.get(edge_id)) {
                (Some(tail), Some(head)) if tail == head => {
                    return Err(GraphError::InvalidGraph(format!("edge {edge_id:?} is a self loop")));
                }
                (Some(_), Some(_)) => {}
                _ => {
                    return Err(GraphError::InvalidGraph(format!(
                        "edge {edge_id:?} is missing a tail or head node"
                    )));
                }
            }
        }

        Ok(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Event;

    type TestCore = GraphBuilderCore<i32, Event<i32>, Event<i32>>;

    fn counter(start: i32) -> IdGenerator<i32> {
        let mut next = start;
        Box::new(move || {
            next += 1;
            next
        })
    }

    fn diamond() -> TestCore {
        // 1 -> 2 -> 4, 1 -> 3 -> 4, plus shortcut 1 -> 4
        let mut core = TestCore::new(counter(100));
        for id in 1..=4 {
            core.insert_node(Node::new(NodeType::Normal, Event::new(id))).unwrap();
        }
        for (edge, tail, head) in [(12, 1, 2), (13, 1, 3), (24, 2, 4), (34, 3, 4), (14, 1, 4)] {
            core.connect(Edge::new(Event::new(edge)), tail, head).unwrap();
        }
        core
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut core = diamond();
        assert_eq!(core.edge_tail_node(12).map(|n| n.id()), Some(1));
        assert_eq!(core.edge_head_node(12).map(|n| n.id()), Some(2));
        assert_eq!(core.successor_nodes(1), BTreeSet::from([2, 3, 4]));

        assert!(core.disconnect(14).is_some());
        assert!(core.edge(14).is_none());
        assert_eq!(core.successor_nodes(1), BTreeSet::from([2, 3]));
        assert_eq!(core.predecessor_nodes(4), BTreeSet::from([2, 3]));
        assert!(core.disconnect(14).is_none());
    }

    #[test]
    fn test_connect_rejects_collisions() {
        let mut core = diamond();
        assert_eq!(
            core.connect(Edge::new(Event::new(12)), 2, 3),
            Err(GraphError::IdCollision(12))
        );
        assert_eq!(
            core.connect(Edge::new(Event::new(99)), 2, 42),
            Err(GraphError::NodeNotFound(42))
        );
    }

    #[test]
    fn test_generator_is_used() {
        let mut core = TestCore::new(counter(100));
        assert_eq!(core.next_event_id(), 101);
        assert_eq!(core.next_event_id(), 102);
    }

    #[test]
    fn test_ancestor_lookup() {
        let core = diamond();
        let ancestors = core.ancestor_nodes_lookup().unwrap();
        assert!(ancestors[&1].is_empty());
        assert_eq!(ancestors[&2], BTreeSet::from([1]));
        assert_eq!(ancestors[&4], BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn test_ancestor_lookup_rejects_cycle() {
        let mut core = diamond();
        core.connect(Edge::new(Event::new(41)), 4, 1).unwrap();
        assert_eq!(core.ancestor_nodes_lookup(), Err(GraphError::Cyclic));
    }

    #[test]
    fn test_reachability_skipping_edge() {
        let core = diamond();
        assert!(core.is_reachable(1, 4, Some(14)));
        assert!(!core.is_reachable(2, 3, None));
        assert!(!core.is_reachable(4, 1, None));
    }

    #[test]
    fn test_transitively_implied_edges() {
        let core = diamond();
        let implied = core.transitively_implied_edges(core.edge_ids()).unwrap();
        assert_eq!(implied, vec![14]);
    }

    #[test]
    fn test_round_trip_through_graph() {
        let mut core = diamond();
        for id in [1, 2, 3, 4] {
            core.reclassify(id);
        }
        let graph = core.to_graph();
        let rebuilt = TestCore::from_graph(graph.clone(), counter(200)).unwrap();
        assert_eq!(rebuilt.to_graph(), graph);
        assert_eq!(rebuilt.edge_tail_node(24).map(|n| n.id()), Some(2));
    }

    #[test]
    fn test_from_graph_rejects_dangling_reference() {
        let graph: Graph<i32, Event<i32>, Event<i32>> = Graph::new(
            vec![],
            vec![
                Node::with_edges(NodeType::Start, Event::new(1), [], [10]),
                Node::with_edges(NodeType::End, Event::new(2), [10], []),
            ],
        );
        assert!(matches!(
            TestCore::from_graph(graph, counter(0)),
            Err(GraphError::InvalidGraph(_))
        ));
    }

    #[test]
    fn test_from_graph_rejects_role_mismatch() {
        let graph: Graph<i32, Event<i32>, Event<i32>> = Graph::new(
            vec![Edge::new(Event::new(10))],
            vec![
                Node::with_edges(NodeType::Start, Event::new(1), [], [10]),
                Node::with_edges(NodeType::Isolated, Event::new(2), [10], []),
            ],
        );
        assert!(matches!(
            TestCore::from_graph(graph, counter(0)),
            Err(GraphError::InvalidGraph(_))
        ));
    }
}
