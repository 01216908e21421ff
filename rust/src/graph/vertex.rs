//! Activity-on-node network builder.

use std::collections::{BTreeMap, BTreeSet};

use super::core::{GraphBuilderCore, IdGenerator};
use super::types::{Edge, Graph, GraphError, GraphId, Node, NodeType};
use super::ActivityGraph;
use crate::models::{Activity, CircularDependency, Event};

/// Activities are nodes; each precedence link is an event edge running
/// from the dependency to the dependent.
pub struct VertexGraphBuilder<T, R = T, W = T> {
    core: GraphBuilderCore<T, Event<T>, Activity<T, R, W>>,
}

impl<T: GraphId, R: GraphId, W: GraphId> VertexGraphBuilder<T, R, W> {
    pub fn new(event_id_generator: IdGenerator<T>) -> Self {
        Self {
            core: GraphBuilderCore::new(event_id_generator),
        }
    }

    /// Rebuild a builder from a persisted graph.
    ///
    /// Declared dependencies are recovered from the event edges.
    pub fn from_graph(
        graph: Graph<T, Event<T>, Activity<T, R, W>>,
        event_id_generator: IdGenerator<T>,
    ) -> Result<Self, GraphError<T>> {
        let mut core = GraphBuilderCore::from_graph(graph, event_id_generator)?;

        for (id, node) in &core.nodes {
            let expected = NodeType::from_degrees(!node.incoming.is_empty(), !node.outgoing.is_empty());
            if node.node_type != expected {
                return Err(GraphError::InvalidGraph(format!(
                    "node {id:?} is {:?} but its edges make it {expected:?}",
                    node.node_type
                )));
            }
        }

        let dependencies: BTreeMap<T, BTreeSet<T>> = core
            .node_ids()
            .into_iter()
            .map(|id| (id, core.predecessor_nodes(id)))
            .collect();
        core.dependencies = dependencies;

        Ok(Self { core })
    }

    pub fn to_graph(&self) -> Graph<T, Event<T>, Activity<T, R, W>> {
        self.core.to_graph()
    }

    pub fn node(&self, id: T) -> Option<&Node<T, Activity<T, R, W>>> {
        self.core.node(id)
    }

    pub fn edge(&self, id: T) -> Option<&Edge<T, Event<T>>> {
        self.core.edge(id)
    }

    pub fn edge_tail_node(&self, id: T) -> Option<&Node<T, Activity<T, R, W>>> {
        self.core.edge_tail_node(id)
    }

    pub fn edge_head_node(&self, id: T) -> Option<&Node<T, Activity<T, R, W>>> {
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

    /// Remove a removable activity along with its incident edges.
    pub fn remove_activity(&mut self, id: T) -> Result<(), GraphError<T>> {
        let node = self.core.node(id).ok_or(GraphError::ActivityNotFound(id))?;
        if !node.content().can_be_removed {
            return Err(GraphError::NotRemovable(id));
        }

        let incident: Vec<T> = node.incoming.iter().chain(node.outgoing.iter()).copied().collect();
        let mut neighbours = self.core.predecessor_nodes(id);
        neighbours.extend(self.core.successor_nodes(id));

        for edge_id in incident {
            self.core.disconnect(edge_id);
        }
        self.core.nodes.remove(&id);
        for neighbour in neighbours {
            self.core.reclassify(neighbour);
        }

        self.core.dependencies.remove(&id);
        for deps in self.core.dependencies.values_mut() {
            deps.remove(&id);
        }
        for waiting in self.core.unsatisfied_successors.values_mut() {
            waiting.remove(&id);
        }
        self.core.unsatisfied_successors.retain(|_, waiting| !waiting.is_empty());

        Ok(())
    }

    fn connect_dependency(&mut self, dependency: T, dependent: T) -> Result<(), GraphError<T>> {
        let event_id = self.core.next_event_id();
        self.core
            .connect(Edge::new(Event::new(event_id)), dependency, dependent)?;
        self.core.reclassify(dependency);
        self.core.reclassify(dependent);
        Ok(())
    }
}

impl<T: GraphId, R: GraphId, W: GraphId> ActivityGraph<T, R, W> for VertexGraphBuilder<T, R, W> {
    fn add_activity(
        &mut self,
        activity: Activity<T, R, W>,
        dependencies: BTreeSet<T>,
    ) -> Result<(), GraphError<T>> {
        let id = activity.id;
        if self.core.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateActivity(id));
        }
        if dependencies.contains(&id) {
            return Err(GraphError::SelfDependency(id));
        }

        self.core.insert_node(Node::new(NodeType::Isolated, activity))?;
        self.core.dependencies.insert(id, dependencies.clone());

        for dependency in dependencies {
            if self.core.nodes.contains_key(&dependency) {
                self.connect_dependency(dependency, id)?;
            } else {
                self.core
                    .unsatisfied_successors
                    .entry(dependency)
                    .or_default()
                    .insert(id);
            }
        }

        if let Some(waiting) = self.core.unsatisfied_successors.remove(&id) {
            for successor in waiting {
                self.connect_dependency(id, successor)?;
            }
        }

        Ok(())
    }

    fn activity(&self, id: T) -> Option<&Activity<T, R, W>> {
        self.core.node(id).map(Node::content)
    }

    fn activity_mut(&mut self, id: T) -> Option<&mut Activity<T, R, W>> {
        self.core.node_mut(id).map(Node::content_mut)
    }

    fn activity_ids(&self) -> Vec<T> {
        self.core.node_ids()
    }

    /// Precedence is carried by event edges, so there are no dummy activities.
    fn is_dummy_activity(&self, _id: T) -> bool {
        false
    }

    fn activity_predecessors(&self, id: T) -> BTreeSet<T> {
        self.core.predecessor_nodes(id)
    }

    fn activity_successors(&self, id: T) -> BTreeSet<T> {
        self.core.successor_nodes(id)
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

    fn transitive_reduction(&mut self) -> Result<bool, GraphError<T>> {
        let implied = self.core.transitively_implied_edges(self.core.edge_ids())?;

        for &edge_id in &implied {
            let tail = self.core.edge_tails.get(&edge_id).copied();
            let head = self.core.edge_heads.get(&edge_id).copied();
            self.core.disconnect(edge_id);
            if let (Some(tail), Some(head)) = (tail, head) {
                self.core.reclassify(tail);
                self.core.reclassify(head);
                if let Some(deps) = self.core.dependencies.get_mut(&head) {
                    deps.remove(&tail);
                }
            }
        }

        Ok(!implied.is_empty())
    }

    fn strong_circular_dependencies(&self) -> Vec<CircularDependency<T>> {
        self.core.strong_circular_dependencies()
    }

    fn refresh_event_times(&mut self) {
        let timings: Vec<(T, Option<i32>, Option<i32>)> = self
            .core
            .edge_ids()
            .into_iter()
            .map(|edge_id| {
                let earliest = self
                    .core
                    .edge_tail_node(edge_id)
                    .and_then(|node| node.content().earliest_finish_time());
                let latest = self
                    .core
                    .edge_head_node(edge_id)
                    .and_then(|node| node.content().latest_start_time());
                (edge_id, earliest, latest)
            })
            .collect();

        for (edge_id, earliest, latest) in timings {
            if let Some(edge) = self.core.edge_mut(edge_id) {
                edge.content_mut().earliest_finish_time = earliest;
                edge.content_mut().latest_finish_time = latest;
            }
        }
    }

    fn clear_critical_path_variables(&mut self) {
        for node in self.core.nodes.values_mut() {
            node.content_mut().clear_critical_path_variables();
        }
        for edge in self.core.edges.values_mut() {
            edge.content_mut().clear_critical_path_variables();
        }
    }
}
