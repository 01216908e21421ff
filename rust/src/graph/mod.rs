//! Activity network builders.
//!
//! Two representations are supported:
//! - [`VertexGraphBuilder`]: activity-on-node, activities are nodes joined by event edges
//! - [`ArrowGraphBuilder`]: activity-on-arrow, activities are edges between event nodes,
//!   with zero-duration dummy activities carrying extra precedence
//!
//! Both implement [`ActivityGraph`], which is all the critical path engine needs.

mod arrow;
mod core;
mod cycles;
mod types;
mod vertex;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub use arrow::ArrowGraphBuilder;
pub use self::core::{GraphBuilderCore, IdGenerator};
pub use cycles::find_strong_circular_dependencies;
pub use types::{Edge, EdgeDirection, Graph, GraphError, GraphId, Identifiable, Node, NodeType};
pub use vertex::VertexGraphBuilder;

use crate::models::{Activity, CircularDependency};

/// Capabilities shared by both network representations.
///
/// Activity ids returned here include dummy activities where the
/// representation has them.
pub trait ActivityGraph<T: GraphId, R: GraphId, W: GraphId> {
    /// Add an activity depending on the given activity ids.
    ///
    /// Dependencies that have not been added yet are remembered and
    /// connected when those activities arrive.
    fn add_activity(
        &mut self,
        activity: Activity<T, R, W>,
        dependencies: BTreeSet<T>,
    ) -> Result<(), GraphError<T>>;

    fn activity(&self, id: T) -> Option<&Activity<T, R, W>>;

    fn activity_mut(&mut self, id: T) -> Option<&mut Activity<T, R, W>>;

    fn activity_ids(&self) -> Vec<T>;

    /// Whether `id` is a dummy the builder inserted to carry precedence.
    ///
    /// Supplied activities are never dummies in this sense, even with zero
    /// duration; they are milestones and keep their timings.
    fn is_dummy_activity(&self, id: T) -> bool;

    /// Activities that must finish immediately before `id` may start.
    fn activity_predecessors(&self, id: T) -> BTreeSet<T>;

    /// Activities that may start immediately after `id` finishes.
    fn activity_successors(&self, id: T) -> BTreeSet<T>;

    fn all_dependencies_satisfied(&self) -> bool;

    fn node_ids(&self) -> Vec<T>;

    fn edge_ids(&self) -> Vec<T>;

    fn ancestor_nodes_lookup(&self) -> Result<BTreeMap<T, BTreeSet<T>>, GraphError<T>>;

    /// Remove edges already implied by a longer path; true if anything changed.
    fn transitive_reduction(&mut self) -> Result<bool, GraphError<T>>;

    fn strong_circular_dependencies(&self) -> Vec<CircularDependency<T>>;

    /// Recompute event timings from the current activity timings.
    fn refresh_event_times(&mut self);

    /// Reset activity and event timings.
    fn clear_critical_path_variables(&mut self);

    /// Activity ids ordered so every predecessor comes first.
    fn activity_topological_order(&self) -> Result<Vec<T>, GraphError<T>> {
        let ids = self.activity_ids();
        let mut in_degree: BTreeMap<T, usize> = ids
            .iter()
            .map(|&id| (id, self.activity_predecessors(id).len()))
            .collect();
        let mut ready: VecDeque<T> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(ids.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for successor in self.activity_successors(id) {
                if let Some(degree) = in_degree.get_mut(&successor) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(successor);
                    }
                }
            }
        }

        if order.len() != ids.len() {
            return Err(GraphError::Cyclic);
        }
        Ok(order)
    }

    /// Nearest predecessors that are not dummies, looking through dummy chains.
    fn real_activity_predecessors(&self, id: T) -> BTreeSet<T> {
        look_through_dummies(self, id, |graph, current| graph.activity_predecessors(current))
    }

    /// Nearest successors that are not dummies, looking through dummy chains.
    fn real_activity_successors(&self, id: T) -> BTreeSet<T> {
        look_through_dummies(self, id, |graph, current| graph.activity_successors(current))
    }
}

fn look_through_dummies<G, T, R, W>(graph: &G, id: T, step: impl Fn(&G, T) -> BTreeSet<T>) -> BTreeSet<T>
where
    G: ActivityGraph<T, R, W> + ?Sized,
    T: GraphId,
    R: GraphId,
    W: GraphId,
{
    let mut found = BTreeSet::new();
    let mut visited = BTreeSet::from([id]);
    let mut queue: VecDeque<T> = step(graph, id).into_iter().collect();

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        if graph.activity(current).is_none() {
            continue;
        }
        if graph.is_dummy_activity(current) {
            queue.extend(step(graph, current));
        } else {
            found.insert(current);
        }
    }

    found
}
