//! Activity-on-arrow network builder.
//!
//! Activities are edges between event nodes. A single start node and a
//! single end node anchor the network; precedence that cannot be expressed
//! by sharing events is carried by zero-duration dummy activities, which the
//! simplification passes later prune and contract.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::core::{GraphBuilderCore, IdGenerator};
use super::types::{Edge, Graph, GraphError, GraphId, Node, NodeType};
use super::ActivityGraph;
use crate::log_debug;
use crate::models::{Activity, CircularDependency, Event};

pub struct ArrowGraphBuilder<T, R = T, W = T> {
    core: GraphBuilderCore<T, Activity<T, R, W>, Event<T>>,
    dummy_activity_id_generator: IdGenerator<T>,
    /// Ids minted by the builder for precedence-only dummies.
    dummy_activities: BTreeSet<T>,
    start_node: T,
    end_node: T,
    verbosity: u8,
}

impl<T: GraphId, R: GraphId, W: GraphId> ArrowGraphBuilder<T, R, W> {
    /// Create an empty network holding only its start and end events.
    pub fn new(
        event_id_generator: IdGenerator<T>,
        dummy_activity_id_generator: IdGenerator<T>,
    ) -> Result<Self, GraphError<T>> {
        let mut core = GraphBuilderCore::new(event_id_generator);
        let start_node = core.next_event_id();
        core.insert_node(Node::new(NodeType::Start, Event::new(start_node)))?;
        let end_node = core.next_event_id();
        core.insert_node(Node::new(NodeType::End, Event::new(end_node)))?;

        Ok(Self {
            core,
            dummy_activity_id_generator,
            dummy_activities: BTreeSet::new(),
            start_node,
            end_node,
            verbosity: 0,
        })
    }

    /// Emit simplification details through the logging macros.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Rebuild a builder from a persisted graph.
    ///
    /// The graph must have exactly one start and one end event, and every
    /// event must be reachable from the start. A persisted graph carries no
    /// record of which edges the builder minted, so removable zero-duration
    /// edges are taken to be dummies. Declared dependencies are recovered as
    /// the nearest real activities upstream of each activity.
    pub fn from_graph(
        graph: Graph<T, Activity<T, R, W>, Event<T>>,
        event_id_generator: IdGenerator<T>,
        dummy_activity_id_generator: IdGenerator<T>,
    ) -> Result<Self, GraphError<T>> {
        let core = GraphBuilderCore::from_graph(graph, event_id_generator)?;

        let single = |node_type: NodeType| -> Result<T, GraphError<T>> {
            let found: Vec<T> = core
                .nodes
                .iter()
                .filter(|(_, node)| node.node_type == node_type)
                .map(|(&id, _)| id)
                .collect();
            match found.as_slice() {
                [id] => Ok(*id),
                _ => Err(GraphError::InvalidGraph(format!(
                    "expected exactly one {node_type:?} node, found {}",
                    found.len()
                ))),
            }
        };
        let start_node = single(NodeType::Start)?;
        let end_node = single(NodeType::End)?;

        let dummy_activities = core
            .edges
            .iter()
            .filter(|(_, edge)| edge.content().is_removable_dummy())
            .map(|(&id, _)| id)
            .collect();

        let mut builder = Self {
            core,
            dummy_activity_id_generator,
            dummy_activities,
            start_node,
            end_node,
            verbosity: 0,
        };

        let unreachable = builder.unreachable_nodes();
        if !unreachable.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "nodes not reachable from start: {unreachable:?}"
            )));
        }

        let dependencies: BTreeMap<T, BTreeSet<T>> = builder
            .real_activity_ids()
            .into_iter()
            .map(|id| (id, builder.real_activity_predecessors(id)))
            .collect();
        builder.core.dependencies = dependencies;

        Ok(builder)
    }

    pub fn to_graph(&self) -> Graph<T, Activity<T, R, W>, Event<T>> {
        self.core.to_graph()
    }

    pub fn start_node(&self) -> T {
        self.start_node
    }

    pub fn end_node(&self) -> T {
        self.end_node
    }

    pub fn node(&self, id: T) -> Option<&Node<T, Event<T>>> {
        self.core.node(id)
    }

    pub fn edge(&self, id: T) -> Option<&Edge<T, Activity<T, R, W>>> {
        self.core.edge(id)
    }

    pub fn edge_tail_node(&self, id: T) -> Option<&Node<T, Event<T>>> {
        self.core.edge_tail_node(id)
    }

    pub fn edge_head_node(&self, id: T) -> Option<&Node<T, Event<T>>> {
        self.core.edge_head_node(id)
    }

    /// Ids referenced as dependencies that were never added.
    pub fn missing_dependencies(&self) -> BTreeSet<T> {
        self.core.missing_dependencies()
    }

    /// Declared dependencies of an activity.
    pub fn dependencies(&self, id: T) -> Option<&BTreeSet<T>> {
        self.core.dependencies.get(&id)
    }

    /// Activity ids excluding the builder's dummies.
    pub fn real_activity_ids(&self) -> Vec<T> {
        self.core
            .edges
            .keys()
            .copied()
            .filter(|id| !self.dummy_activities.contains(id))
            .collect()
    }

    pub fn dummy_activity_ids(&self) -> Vec<T> {
        self.dummy_activities.iter().copied().collect()
    }

    fn add_dummy_activity(&mut self, tail: T, head: T) -> Result<T, GraphError<T>> {
        let id = (self.dummy_activity_id_generator)();
        self.core.connect(Edge::new(Activity::dummy(id)), tail, head)?;
        self.dummy_activities.insert(id);
        Ok(id)
    }

    fn discard_dummy_activity(&mut self, id: T) {
        self.core.disconnect(id);
        self.dummy_activities.remove(&id);
    }

    fn add_event(&mut self) -> Result<T, GraphError<T>> {
        let id = self.core.next_event_id();
        self.core.insert_node(Node::new(NodeType::Normal, Event::new(id)))?;
        Ok(id)
    }

    fn single_edge(edges: &BTreeSet<T>) -> Option<T> {
        match edges.len() {
            1 => edges.first().copied(),
            _ => None,
        }
    }

    /// Whether `tail -> head` already exists, ignoring `except`.
    fn has_edge_between(&self, tail: T, head: T, except: T) -> bool {
        self.core.node(tail).is_some_and(|node| {
            node.outgoing
                .iter()
                .any(|&edge| edge != except && self.core.edge_heads.get(&edge) == Some(&head))
        })
    }

    /// Contract a dummy activity minted by this builder, folding its tail and
    /// head events together. Caller-supplied activities are never contracted,
    /// whatever their duration.
    ///
    /// Returns `Ok(false)` and leaves the network untouched when the dummy is
    /// load-bearing, i.e. contracting it would add precedence, create parallel
    /// edges or disturb the start/end events.
    pub fn remove_dummy_activity(&mut self, id: T) -> Result<bool, GraphError<T>> {
        if self.core.edge(id).is_none() {
            return Err(GraphError::ActivityNotFound(id));
        }
        if !self.dummy_activities.contains(&id) {
            return Err(GraphError::NotDummy(id));
        }
        let tail = self.core.edge_tails.get(&id).copied().ok_or(GraphError::ActivityNotFound(id))?;
        let head = self.core.edge_heads.get(&id).copied().ok_or(GraphError::ActivityNotFound(id))?;
        let tail_node = self.core.node(tail).ok_or(GraphError::NodeNotFound(tail))?;
        let head_node = self.core.node(head).ok_or(GraphError::NodeNotFound(head))?;

        // Tail only feeds this dummy: everything entering the tail can enter the head instead.
        if tail != self.start_node && Self::single_edge(&tail_node.outgoing) == Some(id) {
            let moved: Vec<T> = tail_node.incoming.iter().copied().collect();
            let clashes = moved.iter().any(|edge| {
                self.core
                    .edge_tails
                    .get(edge)
                    .is_some_and(|&from| self.has_edge_between(from, head, id))
            });
            if !clashes {
                self.discard_dummy_activity(id);
                for edge in moved {
                    self.core.rehead(edge, head);
                }
                self.core.nodes.remove(&tail);
                log_debug!(self.verbosity, "Merged event {:?} into {:?} via dummy {:?}", tail, head, id);
                return Ok(true);
            }
        }

        // Head is only reached through this dummy: everything leaving the head can leave the tail.
        if head != self.end_node && Self::single_edge(&head_node.incoming) == Some(id) {
            let moved: Vec<T> = head_node.outgoing.iter().copied().collect();
            let clashes = moved.iter().any(|edge| {
                self.core
                    .edge_heads
                    .get(edge)
                    .is_some_and(|&to| self.has_edge_between(tail, to, id))
            });
            if !clashes {
                self.discard_dummy_activity(id);
                for edge in moved {
                    self.core.retail(edge, tail);
                }
                self.core.nodes.remove(&head);
                log_debug!(self.verbosity, "Merged event {:?} into {:?} via dummy {:?}", head, tail, id);
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Contract every dummy that can be folded away, until none can.
    pub fn redirect_edges(&mut self) -> Result<bool, GraphError<T>> {
        let mut changed = false;
        loop {
            let mut contracted = false;
            for id in self.dummy_activity_ids() {
                if self.core.edge(id).is_some() && self.remove_dummy_activity(id)? {
                    contracted = true;
                }
            }
            if !contracted {
                break;
            }
            changed = true;
        }
        Ok(changed)
    }

    /// Alternate transitive reduction and dummy contraction until the network
    /// stops changing, then check it is still well formed.
    pub fn remove_redundant_edges(&mut self) -> bool {
        loop {
            let reduced = match self.transitive_reduction() {
                Ok(reduced) => reduced,
                Err(_) => return false,
            };
            let redirected = match self.redirect_edges() {
                Ok(redirected) => redirected,
                Err(_) => return false,
            };
            if !reduced && !redirected {
                break;
            }
        }
        self.validate_structure().is_ok()
    }

    /// Check the network is complete: every dependency present, a single
    /// start and end, no cycles, and every event on a start-to-end path.
    pub fn validate_structure(&self) -> Result<(), GraphError<T>> {
        if let Some(missing) = self.core.missing_dependencies().first() {
            return Err(GraphError::ActivityNotFound(*missing));
        }
        let starts = self.core.nodes.values().filter(|n| n.node_type == NodeType::Start).count();
        let ends = self.core.nodes.values().filter(|n| n.node_type == NodeType::End).count();
        if starts != 1 || ends != 1 {
            return Err(GraphError::InvalidGraph(format!(
                "expected one start and one end node, found {starts} and {ends}"
            )));
        }
        self.core.node_topological_order()?;

        let unreachable = self.unreachable_nodes();
        if !unreachable.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "nodes not reachable from start: {unreachable:?}"
            )));
        }
        let dead_ends: Vec<T> = self
            .core
            .nodes
            .keys()
            .copied()
            .filter(|&id| id != self.end_node && !self.core.is_reachable(id, self.end_node, None))
            .collect();
        if !dead_ends.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "nodes that cannot reach the end: {dead_ends:?}"
            )));
        }
        Ok(())
    }

    fn unreachable_nodes(&self) -> Vec<T> {
        let mut visited = BTreeSet::from([self.start_node]);
        let mut queue = VecDeque::from([self.start_node]);
        while let Some(current) = queue.pop_front() {
            for next in self.core.successor_nodes(current) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        self.core
            .nodes
            .keys()
            .copied()
            .filter(|id| !visited.contains(id))
            .collect()
    }
}

impl<T: GraphId, R: GraphId, W: GraphId> ActivityGraph<T, R, W> for ArrowGraphBuilder<T, R, W> {
    /// The activity runs from the start event when it has no dependencies,
    /// otherwise from a fresh event joined by dummies to each dependency's
    /// finish event. Its own finish event gets a dummy to the end event.
    fn add_activity(
        &mut self,
        activity: Activity<T, R, W>,
        dependencies: BTreeSet<T>,
    ) -> Result<(), GraphError<T>> {
        let id = activity.id;
        if self.core.edges.contains_key(&id) {
            return Err(GraphError::DuplicateActivity(id));
        }
        if dependencies.contains(&id) {
            return Err(GraphError::SelfDependency(id));
        }

        let tail = if dependencies.is_empty() {
            self.start_node
        } else {
            self.add_event()?
        };
        let head = self.add_event()?;
        self.core.connect(Edge::new(activity), tail, head)?;
        self.add_dummy_activity(head, self.end_node)?;

        for &dependency in &dependencies {
            match self.core.edge_heads.get(&dependency).copied() {
                Some(dependency_head) => {
                    self.add_dummy_activity(dependency_head, tail)?;
                }
                None => {
                    self.core
                        .unsatisfied_successors
                        .entry(dependency)
                        .or_default()
                        .insert(id);
                }
            }
        }
        self.core.dependencies.insert(id, dependencies);

        if let Some(waiting) = self.core.unsatisfied_successors.remove(&id) {
            for successor in waiting {
                if let Some(successor_tail) = self.core.edge_tails.get(&successor).copied() {
                    self.add_dummy_activity(head, successor_tail)?;
                }
            }
        }

        Ok(())
    }

    fn activity(&self, id: T) -> Option<&Activity<T, R, W>> {
        self.core.edge(id).map(Edge::content)
    }

    fn activity_mut(&mut self, id: T) -> Option<&mut Activity<T, R, W>> {
        self.core.edge_mut(id).map(Edge::content_mut)
    }

    fn activity_ids(&self) -> Vec<T> {
        self.core.edge_ids()
    }

    fn is_dummy_activity(&self, id: T) -> bool {
        self.dummy_activities.contains(&id)
    }

    fn activity_predecessors(&self, id: T) -> BTreeSet<T> {
        self.core
            .edge_tail_node(id)
            .map(|node| node.incoming.clone())
            .unwrap_or_default()
    }

    fn activity_successors(&self, id: T) -> BTreeSet<T> {
        self.core
            .edge_head_node(id)
            .map(|node| node.outgoing.clone())
            .unwrap_or_default()
    }

    fn all_dependencies_satisfied(&self) -> bool {
        self.core.all_dependencies_satisfied()
    }

    fn node_ids(&self) -> Vec<T> {
        self.core.node_ids()
    }

    fn edge_ids(&self) -> Vec<T> {
        self.core.edge_ids()
    }

    fn ancestor_nodes_lookup(&self) -> Result<BTreeMap<T, BTreeSet<T>>, GraphError<T>> {
        self.core.ancestor_nodes_lookup()
    }

    /// Only the builder's dummies are candidates; supplied activities always stay.
    fn transitive_reduction(&mut self) -> Result<bool, GraphError<T>> {
        let implied = self.core.transitively_implied_edges(self.dummy_activity_ids())?;
        for &edge_id in &implied {
            self.discard_dummy_activity(edge_id);
            log_debug!(self.verbosity, "Removed redundant dummy {:?}", edge_id);
        }
        Ok(!implied.is_empty())
    }

    fn strong_circular_dependencies(&self) -> Vec<CircularDependency<T>> {
        self.core.strong_circular_dependencies()
    }

    fn refresh_event_times(&mut self) {
        let timings: Vec<(T, Option<i32>, Option<i32>)> = self
            .core
            .nodes
            .iter()
            .map(|(&id, node)| {
                let activities = |edges: &BTreeSet<T>| -> Vec<&Activity<T, R, W>> {
                    edges
                        .iter()
                        .filter_map(|edge| self.core.edge(*edge).map(Edge::content))
                        .collect()
                };
                let incoming = activities(&node.incoming);
                let outgoing = activities(&node.outgoing);

                let earliest = incoming
                    .iter()
                    .filter_map(|a| a.earliest_finish_time())
                    .max()
                    .or_else(|| outgoing.iter().filter_map(|a| a.earliest_start_time).min());
                let latest = outgoing
                    .iter()
                    .filter_map(|a| a.latest_start_time())
                    .min()
                    .or_else(|| incoming.iter().filter_map(|a| a.latest_finish_time).max());
                (id, earliest, latest)
            })
            .collect();

        for (id, earliest, latest) in timings {
            if let Some(node) = self.core.node_mut(id) {
                node.content_mut().earliest_finish_time = earliest;
                node.content_mut().latest_finish_time = latest;
            }
        }
    }

    fn clear_critical_path_variables(&mut self) {
        for edge in self.core.edges.values_mut() {
            edge.content_mut().clear_critical_path_variables();
        }
        for node in self.core.nodes.values_mut() {
            node.content_mut().clear_critical_path_variables();
        }
    }
}
