//! Per-resource schedules and their busy/idle allocation sequences.

use std::collections::BTreeSet;

use crate::graph::GraphId;
use crate::models::{Activity, InterActivityAllocationType, Resource, ScheduledActivity};

/// Accumulates the activities placed on one resource.
///
/// A builder without a resource stands for one worker of the unlimited pool.
#[derive(Clone, Debug)]
pub struct ResourceScheduleBuilder<T, R, W> {
    resource: Option<Resource<R, W>>,
    scheduled_activities: Vec<ScheduledActivity<T>>,
    last_activity_finish_time: i32,
}

impl<T: GraphId, R: GraphId, W: GraphId> ResourceScheduleBuilder<T, R, W> {
    pub fn new(resource: Option<Resource<R, W>>) -> Self {
        Self {
            resource,
            scheduled_activities: Vec::new(),
            last_activity_finish_time: 0,
        }
    }

    pub fn resource(&self) -> Option<&Resource<R, W>> {
        self.resource.as_ref()
    }

    pub fn scheduled_activities(&self) -> &[ScheduledActivity<T>] {
        &self.scheduled_activities
    }

    /// Time from which the resource is free again.
    pub fn last_activity_finish_time(&self) -> i32 {
        self.last_activity_finish_time
    }

    pub fn last_activity_id(&self) -> Option<T> {
        self.scheduled_activities.last().map(|scheduled| scheduled.id)
    }

    /// Place an activity on this resource starting at `start_time`.
    pub fn append_activity(&mut self, activity: &Activity<T, R, W>, start_time: i32) -> &ScheduledActivity<T> {
        let finish_time = start_time + activity.duration;
        self.last_activity_finish_time = self.last_activity_finish_time.max(finish_time);
        self.scheduled_activities.push(ScheduledActivity {
            id: activity.id,
            name: activity.name.clone(),
            has_no_cost: activity.has_no_cost,
            has_no_effort: activity.has_no_effort,
            duration: activity.duration,
            start_time,
            finish_time,
        });
        &self.scheduled_activities[self.scheduled_activities.len() - 1]
    }

    /// Freeze into a schedule with one allocation entry per time unit in `[0, finish_time)`.
    ///
    /// The schedule's own finish time is the allocation length, so it is
    /// zero when nothing was ever busy.
    ///
    /// Entries before `start_time` are always idle. An `Indirect` resource is
    /// also busy across the whole span of every phase it tracks, measured
    /// over `all_activities` rather than only its own.
    pub fn to_resource_schedule<'a>(
        &self,
        all_activities: impl IntoIterator<Item = &'a Activity<T, R, W>>,
        start_time: i32,
        finish_time: i32,
    ) -> ResourceSchedule<T, R, W>
    where
        T: 'a,
        R: 'a,
        W: 'a,
    {
        let mut windows: Vec<(i32, i32)> = self
            .scheduled_activities
            .iter()
            .map(|scheduled| (scheduled.start_time, scheduled.finish_time))
            .collect();

        if let Some(resource) = &self.resource {
            if resource.inter_activity_allocation_type == InterActivityAllocationType::Indirect {
                windows.extend(phase_windows(resource, all_activities));
            }
        }

        let activity_allocation = if finish_time <= 0 || windows.is_empty() {
            Vec::new()
        } else {
            allocation_from_windows(&windows, start_time, finish_time)
        };

        ResourceSchedule {
            resource: self.resource.clone(),
            scheduled_activities: self.scheduled_activities.clone(),
            finish_time: activity_allocation.len() as i32,
            activity_allocation,
        }
    }
}

/// Span from first start to last finish of the activities in each phase.
fn phase_windows<'a, T, R, W>(
    resource: &Resource<R, W>,
    all_activities: impl IntoIterator<Item = &'a Activity<T, R, W>>,
) -> Vec<(i32, i32)>
where
    T: GraphId + 'a,
    R: GraphId + 'a,
    W: GraphId + 'a,
{
    let activities: Vec<&Activity<T, R, W>> = all_activities.into_iter().collect();

    resource
        .inter_activity_phases
        .iter()
        .filter_map(|phase| {
            let in_phase = activities
                .iter()
                .filter(|activity| activity.target_work_streams.contains(phase));
            let (mut first_start, mut last_finish) = (None::<i32>, None::<i32>);
            for activity in in_phase {
                if let (Some(start), Some(finish)) = (activity.earliest_start_time, activity.earliest_finish_time()) {
                    first_start = Some(first_start.map_or(start, |s| s.min(start)));
                    last_finish = Some(last_finish.map_or(finish, |f| f.max(finish)));
                }
            }
            Some((first_start?, last_finish?))
        })
        .collect()
}

fn allocation_from_windows(windows: &[(i32, i32)], start_time: i32, finish_time: i32) -> Vec<bool> {
    let length = finish_time.max(0) as usize;
    let mut allocation = vec![false; length];
    let floor = start_time.max(0);
    for &(start, finish) in windows {
        let from = start.max(floor).min(finish_time) as usize;
        let to = finish.clamp(0, finish_time) as usize;
        for slot in allocation.iter_mut().take(to).skip(from) {
            *slot = true;
        }
    }
    allocation
}

/// Immutable schedule of one resource, or of one worker of the unlimited pool.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSchedule<T, R, W> {
    /// `None` for the unlimited pool.
    pub resource: Option<Resource<R, W>>,
    pub scheduled_activities: Vec<ScheduledActivity<T>>,
    pub finish_time: i32,
    /// Busy flag per time unit.
    pub activity_allocation: Vec<bool>,
}

impl<T: GraphId, R: GraphId, W: GraphId> ResourceSchedule<T, R, W> {
    fn is_indirect(&self) -> bool {
        self.resource
            .as_ref()
            .is_some_and(|r| r.inter_activity_allocation_type == InterActivityAllocationType::Indirect)
    }

    /// Busy time units; for activity-bound resources only units covered by an
    /// activity passing `include` count.
    fn busy_units(&self, include: impl Fn(&ScheduledActivity<T>) -> bool) -> i32 {
        if self.is_indirect() {
            return self.activity_allocation.iter().filter(|&&busy| busy).count() as i32;
        }
        let counted: BTreeSet<usize> = self
            .scheduled_activities
            .iter()
            .filter(|scheduled| include(scheduled))
            .flat_map(|scheduled| scheduled.start_time.max(0)..scheduled.finish_time.max(0))
            .map(|slot| slot as usize)
            .filter(|&slot| self.activity_allocation.get(slot).copied().unwrap_or(false))
            .collect();
        counted.len() as i32
    }

    /// Unit cost times busy units, skipping activities that carry no cost.
    pub fn cost(&self) -> f64 {
        let unit_cost = self.resource.as_ref().map_or(0.0, |r| r.unit_cost);
        unit_cost * f64::from(self.busy_units(|scheduled| !scheduled.has_no_cost))
    }

    /// Busy units, skipping activities that carry no effort.
    pub fn effort(&self) -> i32 {
        self.busy_units(|scheduled| !scheduled.has_no_effort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_activity;

    fn make_resource(id: i32, allocation: InterActivityAllocationType) -> Resource<i32> {
        let mut resource = Resource::new(id, format!("Resource {id}"));
        resource.inter_activity_allocation_type = allocation;
        resource.unit_cost = 10.0;
        resource
    }

    fn make_timed(id: i32, start: i32, duration: i32, phase: Option<i32>) -> Activity<i32> {
        let mut activity = make_activity(id, duration);
        activity.earliest_start_time = Some(start);
        activity.target_work_streams.extend(phase);
        activity
    }

    #[test]
    fn test_direct_allocation() {
        let mut builder = ResourceScheduleBuilder::new(Some(make_resource(1, InterActivityAllocationType::Direct)));
        let first = make_timed(1, 0, 2, None);
        let second = make_timed(2, 4, 3, None);
        builder.append_activity(&first, 0);
        let scheduled = builder.append_activity(&second, 4).clone();
        assert_eq!(scheduled.finish_time, 7);
        assert_eq!(builder.last_activity_id(), Some(2));

        let schedule = builder.to_resource_schedule([&first, &second], 0, 9);
        assert_eq!(
            schedule.activity_allocation,
            vec![true, true, false, false, true, true, true, false, false]
        );
        assert_eq!(schedule.finish_time, 9);
        assert_eq!(schedule.activity_allocation.len(), schedule.finish_time as usize);
        assert_eq!(schedule.effort(), 5);
        assert_eq!(schedule.cost(), 50.0);
    }

    #[test]
    fn test_indirect_allocation_spans_phase() {
        let mut resource = make_resource(1, InterActivityAllocationType::Indirect);
        resource.inter_activity_phases.insert(100);
        let builder: ResourceScheduleBuilder<i32, i32, i32> = ResourceScheduleBuilder::new(Some(resource));

        // Phase 100 runs 6..10 and 12..16, with a gap between.
        let activities = [
            make_timed(1, 6, 4, Some(100)),
            make_timed(2, 12, 4, Some(100)),
            make_timed(3, 0, 20, Some(200)),
        ];
        let schedule = builder.to_resource_schedule(activities.iter(), 0, 20);

        let expected: Vec<bool> = (0..20).map(|t| (6..16).contains(&t)).collect();
        assert_eq!(schedule.activity_allocation, expected);
        assert_eq!(schedule.effort(), 10);
        assert_eq!(schedule.cost(), 100.0);
    }

    #[test]
    fn test_phase_without_activities_contributes_nothing() {
        let mut resource = make_resource(1, InterActivityAllocationType::Indirect);
        resource.inter_activity_phases.insert(300);
        let builder: ResourceScheduleBuilder<i32, i32, i32> = ResourceScheduleBuilder::new(Some(resource));
        let activities = [make_timed(1, 0, 5, Some(100))];

        let schedule = builder.to_resource_schedule(activities.iter(), 0, 5);
        assert!(schedule.activity_allocation.is_empty());
        assert_eq!(schedule.finish_time, 0);
    }

    #[test]
    fn test_empty_allocation_cases() {
        let mut builder: ResourceScheduleBuilder<i32, i32, i32> = ResourceScheduleBuilder::new(None);
        let none: [&Activity<i32>; 0] = [];
        assert!(builder.to_resource_schedule(none, 0, 10).activity_allocation.is_empty());

        let activity = make_timed(1, 0, 3, None);
        builder.append_activity(&activity, 0);
        assert!(builder.to_resource_schedule([&activity], 0, 0).activity_allocation.is_empty());
    }

    #[test]
    fn test_start_time_masks_early_units() {
        let mut builder: ResourceScheduleBuilder<i32, i32, i32> = ResourceScheduleBuilder::new(None);
        let activity = make_timed(1, 0, 4, None);
        builder.append_activity(&activity, 0);

        let schedule = builder.to_resource_schedule([&activity], 2, 5);
        assert_eq!(schedule.activity_allocation, vec![false, false, true, true, false]);
        assert_eq!(schedule.cost(), 0.0);
    }

    #[test]
    fn test_no_cost_and_no_effort_flags() {
        let mut builder = ResourceScheduleBuilder::new(Some(make_resource(1, InterActivityAllocationType::None)));
        let mut free = make_timed(1, 0, 2, None);
        free.has_no_cost = true;
        let mut unattended = make_timed(2, 2, 3, None);
        unattended.has_no_effort = true;
        builder.append_activity(&free, 0);
        builder.append_activity(&unattended, 2);

        let schedule = builder.to_resource_schedule([&free, &unattended], 0, 5);
        assert_eq!(schedule.cost(), 30.0);
        assert_eq!(schedule.effort(), 2);
    }
}
