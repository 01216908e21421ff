//! Strongly-connected-component search over declared dependencies.
//!
//! Edges run `activity -> dependency`. The search works on ids alone, so it
//! does not need the event/edge network to be complete or consistent.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use super::types::GraphId;
use crate::models::CircularDependency;

/// Build the `activity -> dependency` relation as a petgraph map.
fn dependency_graph<T: GraphId>(dependencies: &BTreeMap<T, BTreeSet<T>>) -> DiGraphMap<T, ()> {
    let mut graph = DiGraphMap::new();
    for (&activity, deps) in dependencies {
        graph.add_node(activity);
        for &dependency in deps {
            graph.add_edge(activity, dependency, ());
        }
    }
    graph
}

/// Every dependency cycle, one entry per strongly connected component.
///
/// Components are returned in the order the traversal closes them.
/// Singletons are reported only when the activity depends on itself.
#[must_use]
pub fn find_strong_circular_dependencies<T: GraphId>(
    dependencies: &BTreeMap<T, BTreeSet<T>>,
) -> Vec<CircularDependency<T>> {
    let graph = dependency_graph(dependencies);

    tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || component.first().is_some_and(|&node| graph.contains_edge(node, node))
        })
        .map(CircularDependency::new)
        .collect()
}
