//! Critical path calculation using forward and backward passes.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::graph::{ActivityGraph, GraphId};

/// Error types for critical path calculation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CriticalPathError<T: GraphId> {
    #[error("Circular dependency detected in activity graph")]
    CircularDependency,
    #[error(
        "Activity {activity:?} cannot start at {minimum_earliest_start_time} and finish by \
         {maximum_latest_finish_time} with duration {duration}"
    )]
    InvalidConstraint {
        activity: T,
        minimum_earliest_start_time: i32,
        maximum_latest_finish_time: i32,
        duration: i32,
    },
    #[error("Critical path has not been calculated for activity {0:?}")]
    MissingTimings(T),
}

/// Network-wide figures from a critical path pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CriticalPathResult<T> {
    /// Latest earliest finish over all activities.
    pub project_finish_time: i32,
    /// Finish time the backward pass anchors to; later than
    /// `project_finish_time` when minimum free slack pushes it out.
    pub latest_project_finish_time: i32,
    /// Non-dummy activities with no total slack, in dependency order.
    pub critical_activities: Vec<T>,
}

/// Reject activities whose start and finish bounds cannot both hold.
pub fn check_timing_constraints<G, T, R, W>(graph: &G) -> Result<(), CriticalPathError<T>>
where
    G: ActivityGraph<T, R, W>,
    T: GraphId,
    R: GraphId,
    W: GraphId,
{
    for id in graph.activity_ids() {
        let Some(activity) = graph.activity(id) else {
            continue;
        };
        if let (Some(start), Some(finish)) = (
            activity.minimum_earliest_start_time,
            activity.maximum_latest_finish_time,
        ) {
            if start + activity.duration > finish {
                return Err(CriticalPathError::InvalidConstraint {
                    activity: id,
                    minimum_earliest_start_time: start,
                    maximum_latest_finish_time: finish,
                    duration: activity.duration,
                });
            }
        }
    }
    Ok(())
}

/// Populate earliest start, latest finish and free slack on every activity.
///
/// Earlier results are cleared first. Slack may come out negative when
/// maximum latest finish bounds are tighter than the network allows; only a
/// contradiction between the bounds of a single activity is an error.
pub fn calculate_critical_path<G, T, R, W>(graph: &mut G) -> Result<CriticalPathResult<T>, CriticalPathError<T>>
where
    G: ActivityGraph<T, R, W>,
    T: GraphId,
    R: GraphId,
    W: GraphId,
{
    let order = graph
        .activity_topological_order()
        .map_err(|_| CriticalPathError::CircularDependency)?;
    check_timing_constraints(graph)?;
    graph.clear_critical_path_variables();

    let capacity = order.len();
    let mut durations: FxHashMap<T, i32> = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
    let mut earliest_start: FxHashMap<T, i32> = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
    let mut earliest_finish: FxHashMap<T, i32> = FxHashMap::with_capacity_and_hasher(capacity, Default::default());

    // Forward pass
    for &id in &order {
        let Some(activity) = graph.activity(id) else {
            continue;
        };
        let duration = activity.duration;
        let start = graph
            .activity_predecessors(id)
            .iter()
            .filter_map(|predecessor| earliest_finish.get(predecessor).copied())
            .chain(activity.minimum_earliest_start_time)
            .fold(0, i32::max);

        durations.insert(id, duration);
        earliest_start.insert(id, start);
        earliest_finish.insert(id, start + duration);
    }

    let project_finish_time = earliest_finish.values().copied().max().unwrap_or(0);

    // Longest run of work still to come after each activity finishes.
    let mut downstream: FxHashMap<T, i32> = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
    for &id in order.iter().rev() {
        let tail = graph
            .activity_successors(id)
            .iter()
            .filter_map(|s| Some(durations.get(s)? + downstream.get(s)?))
            .max()
            .unwrap_or(0);
        downstream.insert(id, tail);
    }

    // A minimum free slack floor is honoured by pushing the finish anchor out
    // far enough for the activity and everything after it.
    let latest_project_finish_time = order
        .iter()
        .filter_map(|&id| {
            let floor = graph.activity(id)?.minimum_free_slack?;
            Some(earliest_finish.get(&id)? + floor + downstream.get(&id)?)
        })
        .fold(project_finish_time, i32::max);

    // Backward pass
    let mut latest_start: FxHashMap<T, i32> = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
    let mut latest_finish: FxHashMap<T, i32> = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
    for &id in order.iter().rev() {
        let bound = graph
            .activity_successors(id)
            .iter()
            .filter_map(|s| latest_start.get(s).copied())
            .min()
            .unwrap_or(latest_project_finish_time);
        let finish = graph
            .activity(id)
            .and_then(|a| a.maximum_latest_finish_time)
            .map_or(bound, |maximum| bound.min(maximum));
        latest_finish.insert(id, finish);
        latest_start.insert(id, finish - durations.get(&id).copied().unwrap_or(0));
    }

    // When a dummy is reached, look through it to the next real start.
    let mut next_start: FxHashMap<T, i32> = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
    for &id in order.iter().rev() {
        let value = if graph.is_dummy_activity(id) {
            graph
                .activity_successors(id)
                .iter()
                .filter_map(|s| next_start.get(s).copied())
                .min()
                .unwrap_or(project_finish_time)
        } else {
            earliest_start.get(&id).copied().unwrap_or(0)
        };
        next_start.insert(id, value);
    }

    for &id in &order {
        let (Some(&start), Some(&finish), Some(&late_finish)) =
            (earliest_start.get(&id), earliest_finish.get(&id), latest_finish.get(&id))
        else {
            continue;
        };
        let naive_free_slack = graph
            .activity_successors(id)
            .iter()
            .filter_map(|s| next_start.get(s).copied())
            .min()
            .unwrap_or(project_finish_time)
            - finish;
        let total_slack = late_finish - finish;

        if let Some(activity) = graph.activity_mut(id) {
            let free_slack = match activity.minimum_free_slack {
                Some(floor) => total_slack.min(naive_free_slack.max(floor)),
                None => total_slack.min(naive_free_slack),
            };
            activity.earliest_start_time = Some(start);
            activity.latest_finish_time = Some(late_finish);
            activity.free_slack = Some(free_slack);
        }
    }

    graph.refresh_event_times();

    let critical_activities = order
        .iter()
        .copied()
        .filter(|&id| !graph.is_dummy_activity(id) && graph.activity(id).is_some_and(|a| a.is_critical()))
        .collect();

    Ok(CriticalPathResult {
        project_finish_time,
        latest_project_finish_time,
        critical_activities,
    })
}
