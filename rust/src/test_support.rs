//! Shared fixtures for unit tests.

use std::collections::BTreeSet;

use crate::graph::{ActivityGraph, ArrowGraphBuilder, IdGenerator, VertexGraphBuilder};
use crate::models::{Activity, DependentActivity};

/// Monotonic generator yielding `start + 1`, `start + 2`, ...
pub(crate) fn id_generator(start: i32) -> IdGenerator<i32> {
    let mut next = start;
    Box::new(move || {
        next += 1;
        next
    })
}

pub(crate) fn make_activity(id: i32, duration: i32) -> Activity<i32> {
    let mut activity = Activity::new(id, duration);
    activity.name = format!("Activity {id}");
    activity
}

pub(crate) fn make_dependent(id: i32, duration: i32, dependencies: &[i32]) -> DependentActivity<i32> {
    DependentActivity::new(make_activity(id, duration), dependencies.iter().copied())
}

/// Nine activities with a single critical chain 3 -> 5 -> 9 finishing at 26.
pub(crate) fn nine_activity_fixture() -> Vec<DependentActivity<i32>> {
    vec![
        make_dependent(1, 6, &[]),
        make_dependent(2, 7, &[]),
        make_dependent(3, 8, &[]),
        make_dependent(4, 11, &[2]),
        make_dependent(5, 8, &[1, 2, 3]),
        make_dependent(6, 7, &[3]),
        make_dependent(7, 4, &[4]),
        make_dependent(8, 4, &[4, 6]),
        make_dependent(9, 10, &[5]),
    ]
}

/// Nine activities containing the cycles {2, 4, 7} and {5, 8, 9}.
pub(crate) fn cyclic_fixture(duration: i32) -> Vec<DependentActivity<i32>> {
    vec![
        make_dependent(1, duration, &[]),
        make_dependent(2, duration, &[7]),
        make_dependent(3, duration, &[]),
        make_dependent(4, duration, &[2]),
        make_dependent(5, duration, &[1, 2, 3, 8]),
        make_dependent(6, duration, &[3]),
        make_dependent(7, duration, &[4]),
        make_dependent(8, duration, &[9, 6]),
        make_dependent(9, duration, &[5]),
    ]
}

fn add_all<G: ActivityGraph<i32, i32, i32>>(graph: &mut G, activities: Vec<DependentActivity<i32>>) {
    for activity in activities {
        let dependencies: BTreeSet<i32> = activity.dependencies;
        graph.add_activity(activity.activity, dependencies).unwrap();
    }
}

pub(crate) fn build_vertex(activities: Vec<DependentActivity<i32>>) -> VertexGraphBuilder<i32> {
    let mut graph = VertexGraphBuilder::new(id_generator(100));
    add_all(&mut graph, activities);
    graph
}

pub(crate) fn build_arrow(activities: Vec<DependentActivity<i32>>) -> ArrowGraphBuilder<i32> {
    let mut graph = ArrowGraphBuilder::new(id_generator(100), id_generator(1000)).unwrap();
    add_all(&mut graph, activities);
    graph
}
