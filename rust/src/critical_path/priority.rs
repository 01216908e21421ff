//! Minimum-slack priority ordering of activities.

use std::collections::{BTreeMap, BTreeSet};

use super::calculation::CriticalPathError;
use crate::graph::{ActivityGraph, GraphId};

/// Order activities for list scheduling.
///
/// The result is a topological order of the non-dummy activities. Whenever
/// several activities are ready, the one with the smallest latest start is
/// taken first, then the smallest total slack, then the smallest id.
/// Requires a completed critical path pass.
pub fn calculate_critical_path_priority_list<G, T, R, W>(graph: &G) -> Result<Vec<T>, CriticalPathError<T>>
where
    G: ActivityGraph<T, R, W>,
    T: GraphId,
    R: GraphId,
    W: GraphId,
{
    let mut keys: BTreeMap<T, (i32, i32)> = BTreeMap::new();
    for id in graph.activity_ids() {
        let Some(activity) = graph.activity(id) else {
            continue;
        };
        if graph.is_dummy_activity(id) {
            continue;
        }
        match (activity.latest_start_time(), activity.total_slack()) {
            (Some(latest_start), Some(total_slack)) => {
                keys.insert(id, (latest_start, total_slack));
            }
            _ => return Err(CriticalPathError::MissingTimings(id)),
        }
    }

    let mut remaining: BTreeMap<T, usize> = keys
        .keys()
        .map(|&id| (id, graph.real_activity_predecessors(id).len()))
        .collect();
    let mut ready: BTreeSet<(i32, i32, T)> = remaining
        .iter()
        .filter(|(_, &count)| count == 0)
        .filter_map(|(id, _)| keys.get(id).map(|&(latest_start, slack)| (latest_start, slack, *id)))
        .collect();

    let mut order = Vec::with_capacity(keys.len());
    while let Some((_, _, id)) = ready.pop_first() {
        order.push(id);
        for successor in graph.real_activity_successors(id) {
            let Some(count) = remaining.get_mut(&successor) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                if let Some(&(latest_start, slack)) = keys.get(&successor) {
                    ready.insert((latest_start, slack, successor));
                }
            }
        }
    }

    if order.len() != keys.len() {
        return Err(CriticalPathError::CircularDependency);
    }
    Ok(order)
}
