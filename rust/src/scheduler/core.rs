//! Greedy resource-constrained list scheduler.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::critical_path::{calculate_critical_path_priority_list, CriticalPathError};
use crate::graph::{ActivityGraph, GraphId};
use crate::models::{Activity, InterActivityAllocationType, LogicalOperator, Resource};
use crate::{log_changes, log_checks, log_debug};

use super::resource_schedule::ResourceScheduleBuilder;

/// Errors that can occur during scheduling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError<T: GraphId> {
    #[error("No eligible resource for activity {0:?}")]
    NoEligibleResource(T),
    #[error("Failed to schedule activities: {0:?}")]
    Unschedulable(Vec<T>),
    #[error(transparent)]
    CriticalPath(#[from] CriticalPathError<T>),
}

/// Everything the list scheduler decided.
#[derive(Clone, Debug)]
pub struct ScheduleOutcome<T, R, W> {
    /// One builder per active resource in allocation order, or one per
    /// unlimited-pool worker when no resources were supplied.
    pub resource_schedules: Vec<ResourceScheduleBuilder<T, R, W>>,
    pub start_times: BTreeMap<T, i32>,
    /// Activity that ran immediately before, per resource occupied.
    pub resource_dependencies: BTreeMap<T, BTreeSet<T>>,
    pub allocations: BTreeMap<T, BTreeSet<R>>,
    pub finish_time: i32,
}

/// Serial list scheduler over a timed activity network.
///
/// Activities are taken in critical path priority order. Each one starts
/// once its predecessors have finished and its resources are free, on the
/// eligible resource that frees up soonest.
pub struct ListScheduler<R, W> {
    resources: Vec<Resource<R, W>>,
    verbosity: u8,
}

impl<R: GraphId, W: GraphId> ListScheduler<R, W> {
    /// Inactive resources are dropped; the rest are ordered by allocation order, then id.
    pub fn new(resources: impl IntoIterator<Item = Resource<R, W>>, verbosity: u8) -> Self {
        let mut resources: Vec<Resource<R, W>> = resources.into_iter().filter(|r| !r.is_inactive).collect();
        resources.sort_by_key(|r| (r.allocation_order, r.id));
        Self { resources, verbosity }
    }

    pub fn resources(&self) -> &[Resource<R, W>] {
        &self.resources
    }

    pub fn schedule<G, T>(&self, graph: &G) -> Result<ScheduleOutcome<T, R, W>, SchedulerError<T>>
    where
        G: ActivityGraph<T, R, W>,
        T: GraphId,
    {
        let verbosity = self.verbosity;
        let mut pending = calculate_critical_path_priority_list(graph)?;
        let unlimited = self.resources.is_empty();

        let mut builders: Vec<ResourceScheduleBuilder<T, R, W>> = self
            .resources
            .iter()
            .cloned()
            .map(|resource| ResourceScheduleBuilder::new(Some(resource)))
            .collect();
        let mut finish_times: FxHashMap<T, i32> = FxHashMap::with_capacity_and_hasher(pending.len(), Default::default());
        let mut start_times = BTreeMap::new();
        let mut resource_dependencies: BTreeMap<T, BTreeSet<T>> = BTreeMap::new();
        let mut allocations: BTreeMap<T, BTreeSet<R>> = BTreeMap::new();

        log_changes!(
            verbosity,
            "Scheduling {} activities on {} resources",
            pending.len(),
            if unlimited { "unlimited".to_string() } else { self.resources.len().to_string() }
        );

        while !pending.is_empty() {
            let next = pending.iter().position(|&id| {
                graph
                    .real_activity_predecessors(id)
                    .iter()
                    .all(|predecessor| finish_times.contains_key(predecessor))
            });
            let Some(position) = next else {
                return Err(SchedulerError::Unschedulable(pending));
            };
            let id = pending.remove(position);
            let Some(activity) = graph.activity(id) else {
                continue;
            };

            let ready = graph
                .real_activity_predecessors(id)
                .iter()
                .filter_map(|predecessor| finish_times.get(predecessor).copied())
                .chain(activity.earliest_start_time)
                .fold(0, i32::max);

            log_checks!(verbosity, "  Considering activity {:?} (ready at {})", id, ready);

            if activity.is_dummy() {
                start_times.insert(id, ready);
                finish_times.insert(id, ready);
                continue;
            }

            let (chosen, start) = if unlimited {
                let index = builders
                    .iter()
                    .position(|builder| builder.last_activity_finish_time() <= ready)
                    .unwrap_or_else(|| {
                        builders.push(ResourceScheduleBuilder::new(None));
                        builders.len() - 1
                    });
                (vec![index], ready)
            } else {
                self.choose_resources(activity, &builders, ready)?
            };

            for &index in &chosen {
                let builder = &mut builders[index];
                if let Some(resource) = builder.resource() {
                    let resource_id = resource.id;
                    allocations.entry(id).or_default().insert(resource_id);
                    if let Some(previous) = builder.last_activity_id() {
                        resource_dependencies.entry(id).or_default().insert(previous);
                    }
                    log_changes!(
                        verbosity,
                        "  Assigned activity {:?} to resource {:?} at {}",
                        id,
                        resource_id,
                        start
                    );
                } else {
                    log_debug!(verbosity, "  Assigned activity {:?} to pool worker {} at {}", id, index, start);
                }
                builder.append_activity(activity, start);
            }

            start_times.insert(id, start);
            finish_times.insert(id, start + activity.duration);
        }

        let finish_time = finish_times.values().copied().max().unwrap_or(0);
        Ok(ScheduleOutcome {
            resource_schedules: builders,
            start_times,
            resource_dependencies,
            allocations,
            finish_time,
        })
    }

    /// Builders to occupy and the start time they allow.
    fn choose_resources<T: GraphId>(
        &self,
        activity: &Activity<T, R, W>,
        builders: &[ResourceScheduleBuilder<T, R, W>],
        ready: i32,
    ) -> Result<(Vec<usize>, i32), SchedulerError<T>> {
        let available = |index: usize| ready.max(builders[index].last_activity_finish_time());
        let resource_of = |index: usize| builders[index].resource();

        if !activity.target_resources.is_empty() {
            let targeted: Vec<usize> = (0..builders.len())
                .filter(|&index| resource_of(index).is_some_and(|r| activity.target_resources.contains(&r.id)))
                .collect();

            return match activity.target_resource_operator {
                LogicalOperator::And => {
                    if targeted.len() != activity.target_resources.len() {
                        return Err(SchedulerError::NoEligibleResource(activity.id));
                    }
                    let start = targeted.iter().map(|&index| available(index)).fold(ready, i32::max);
                    Ok((targeted, start))
                }
                LogicalOperator::Or => targeted
                    .iter()
                    .copied()
                    .min_by_key(|&index| (available(index), index))
                    .map(|index| (vec![index], available(index)))
                    .ok_or(SchedulerError::NoEligibleResource(activity.id)),
            };
        }

        (0..builders.len())
            .filter(|&index| {
                resource_of(index).is_some_and(|r| {
                    !r.is_explicit_target && r.inter_activity_allocation_type != InterActivityAllocationType::Indirect
                })
            })
            .min_by_key(|&index| (available(index), index))
            .map(|index| (vec![index], available(index)))
            .ok_or(SchedulerError::NoEligibleResource(activity.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical_path::calculate_critical_path;
    use crate::graph::VertexGraphBuilder;
    use crate::test_support::{build_vertex, make_dependent, nine_activity_fixture};

    fn make_resource(id: i32) -> Resource<i32> {
        Resource::new(id, format!("Resource {id}"))
    }

    fn timed(activities: Vec<crate::models::DependentActivity<i32>>) -> VertexGraphBuilder<i32> {
        let mut graph = build_vertex(activities);
        calculate_critical_path(&mut graph).unwrap();
        graph
    }

    fn order_and_finishes(builder: &ResourceScheduleBuilder<i32, i32, i32>) -> (Vec<i32>, Vec<i32>) {
        builder
            .scheduled_activities()
            .iter()
            .map(|scheduled| (scheduled.id, scheduled.finish_time))
            .unzip()
    }

    #[test]
    fn test_single_resource_fixture() {
        let graph = timed(nine_activity_fixture());
        let scheduler = ListScheduler::new([make_resource(1)], 0);
        let outcome = scheduler.schedule(&graph).unwrap();

        assert_eq!(outcome.resource_schedules.len(), 1);
        let (order, finishes) = order_and_finishes(&outcome.resource_schedules[0]);
        assert_eq!(order, vec![3, 2, 1, 5, 4, 6, 9, 7, 8]);
        assert_eq!(finishes, vec![8, 15, 21, 29, 40, 47, 57, 61, 65]);
        assert_eq!(outcome.finish_time, 65);

        assert_eq!(outcome.resource_dependencies.get(&3), None);
        assert_eq!(outcome.resource_dependencies[&2], BTreeSet::from([3]));
        assert_eq!(outcome.allocations[&5], BTreeSet::from([1]));
    }

    #[test]
    fn test_unlimited_pool_keeps_critical_path_timings() {
        let graph = timed(nine_activity_fixture());
        let scheduler: ListScheduler<i32, i32> = ListScheduler::new([], 0);
        let outcome = scheduler.schedule(&graph).unwrap();

        assert_eq!(outcome.finish_time, 26);
        for id in 1..=9 {
            assert_eq!(
                outcome.start_times.get(&id).copied(),
                graph.activity(id).unwrap().earliest_start_time,
                "activity {id}"
            );
        }
        assert!(outcome.resource_schedules.iter().all(|b| b.resource().is_none()));
        assert!(outcome.resource_dependencies.is_empty());
        assert!(outcome.allocations.is_empty());
    }

    #[test]
    fn test_inactive_resources_fall_back_to_pool() {
        let graph = timed(nine_activity_fixture());
        let mut resource = make_resource(1);
        resource.is_inactive = true;
        let scheduler = ListScheduler::new([resource], 0);
        assert!(scheduler.resources().is_empty());
        assert_eq!(scheduler.schedule(&graph).unwrap().finish_time, 26);
    }

    #[test]
    fn test_two_resources_by_allocation_order() {
        let graph = timed(vec![make_dependent(1, 5, &[]), make_dependent(2, 5, &[])]);
        let mut first = make_resource(1);
        first.allocation_order = 2;
        let mut second = make_resource(2);
        second.allocation_order = 1;
        let scheduler = ListScheduler::new([first, second], 0);
        let outcome = scheduler.schedule(&graph).unwrap();

        assert_eq!(outcome.resource_schedules[0].resource().unwrap().id, 2);
        assert_eq!(outcome.allocations[&1], BTreeSet::from([2]));
        assert_eq!(outcome.allocations[&2], BTreeSet::from([1]));
        assert_eq!(outcome.finish_time, 5);
    }

    #[test]
    fn test_and_targets_wait_for_all() {
        let mut fixture = vec![
            make_dependent(1, 4, &[]),
            make_dependent(2, 2, &[]),
            make_dependent(3, 3, &[]),
        ];
        fixture[0].activity.target_resources.insert(1);
        fixture[1].activity.target_resources.insert(2);
        fixture[2].activity.target_resources.extend([1, 2]);
        let graph = timed(fixture);

        let outcome = ListScheduler::new([make_resource(1), make_resource(2)], 0)
            .schedule(&graph)
            .unwrap();
        // Priority order is 1, 3, 2: activity 3 holds both resources from 4 to 7.
        assert_eq!(outcome.start_times[&3], 4);
        assert_eq!(outcome.allocations[&3], BTreeSet::from([1, 2]));
        assert_eq!(outcome.resource_dependencies[&3], BTreeSet::from([1]));
        assert_eq!(outcome.start_times[&2], 7);
        assert_eq!(outcome.resource_dependencies[&2], BTreeSet::from([3]));
        assert_eq!(outcome.finish_time, 9);
    }

    #[test]
    fn test_or_targets_take_soonest() {
        let mut fixture = vec![make_dependent(1, 4, &[]), make_dependent(2, 3, &[])];
        fixture[0].activity.target_resources.insert(1);
        fixture[1].activity.target_resources.extend([1, 2]);
        fixture[1].activity.target_resource_operator = LogicalOperator::Or;
        let graph = timed(fixture);

        let outcome = ListScheduler::new([make_resource(1), make_resource(2)], 0)
            .schedule(&graph)
            .unwrap();
        assert_eq!(outcome.allocations[&2], BTreeSet::from([2]));
        assert_eq!(outcome.start_times[&2], 0);
    }

    #[test]
    fn test_explicit_target_only_resources() {
        let graph = timed(vec![make_dependent(1, 4, &[])]);
        let mut resource = make_resource(1);
        resource.is_explicit_target = true;

        assert_eq!(
            ListScheduler::new([resource], 0).schedule(&graph).unwrap_err(),
            SchedulerError::NoEligibleResource(1)
        );
    }

    #[test]
    fn test_milestone_takes_no_resource() {
        let graph = timed(vec![make_dependent(1, 4, &[]), make_dependent(2, 0, &[1])]);
        let outcome = ListScheduler::new([make_resource(1)], 0).schedule(&graph).unwrap();

        assert_eq!(outcome.start_times[&2], 4);
        assert!(!outcome.allocations.contains_key(&2));
        assert_eq!(outcome.resource_schedules[0].scheduled_activities().len(), 1);
    }
}
