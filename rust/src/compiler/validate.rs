//! Input and output checks run around the compilation stages.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::GraphId;
use crate::models::{Activity, DependentActivity, InterActivityAllocationType, Resource, WorkStream};

use super::errors::{GraphCompilationErrorCode, GraphCompilationErrors};

/// Record every activity id supplied more than once.
pub(crate) fn check_duplicate_activities<T, R, W>(
    activities: &[DependentActivity<T, R, W>],
    errors: &mut GraphCompilationErrors<T>,
) where
    T: GraphId,
    R: GraphId,
    W: GraphId,
{
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for activity in activities {
        *counts.entry(activity.id()).or_default() += 1;
    }
    for (id, count) in counts.into_iter().filter(|&(_, count)| count > 1) {
        errors.push(
            GraphCompilationErrorCode::P0030,
            format!("Activity {id:?} is defined {count} times"),
        );
    }
}

/// Record dependencies that name no supplied activity.
pub(crate) fn check_missing_dependencies<T, R, W>(
    activities: &[DependentActivity<T, R, W>],
    errors: &mut GraphCompilationErrors<T>,
) where
    T: GraphId,
    R: GraphId,
    W: GraphId,
{
    let known: BTreeSet<T> = activities.iter().map(DependentActivity::id).collect();
    for activity in activities {
        for dependency in activity.dependencies.difference(&known) {
            errors.missing_dependencies.insert(*dependency);
            errors.push(
                GraphCompilationErrorCode::P0010,
                format!(
                    "Activity {:?} depends on missing activity {:?}",
                    activity.id(),
                    dependency
                ),
            );
        }
    }
}

/// Check durations, timing bounds, resource targets and work streams.
///
/// Reports `P0030` for malformed input and `P0040` when every active
/// resource is an explicit target yet some real activity targets none.
pub(crate) fn check_precompilation<T, R, W>(
    activities: &[DependentActivity<T, R, W>],
    resources: &[Resource<R, W>],
    work_streams: &[WorkStream<W>],
    errors: &mut GraphCompilationErrors<T>,
) where
    T: GraphId,
    R: GraphId,
    W: GraphId,
{
    let resource_lookup: BTreeMap<R, &Resource<R, W>> = resources.iter().map(|r| (r.id, r)).collect();
    let work_stream_lookup: BTreeMap<W, &WorkStream<W>> = work_streams.iter().map(|w| (w.id, w)).collect();

    for activity in activities.iter().map(|a| &a.activity) {
        check_activity(activity, &resource_lookup, &work_stream_lookup, errors);
    }

    for resource in resources {
        if resource.inter_activity_allocation_type != InterActivityAllocationType::Indirect {
            continue;
        }
        for phase in &resource.inter_activity_phases {
            match work_stream_lookup.get(phase) {
                None => errors.push(
                    GraphCompilationErrorCode::P0030,
                    format!("Resource {:?} tracks unknown work stream {:?}", resource.id, phase),
                ),
                Some(work_stream) if !work_stream.is_phase => errors.push(
                    GraphCompilationErrorCode::P0030,
                    format!("Resource {:?} tracks work stream {:?} which is not a phase", resource.id, phase),
                ),
                Some(_) => {}
            }
        }
    }

    let active: Vec<&Resource<R, W>> = resources.iter().filter(|r| !r.is_inactive).collect();
    let all_explicit = !active.is_empty() && active.iter().all(|r| r.is_explicit_target);
    if all_explicit {
        let untargeted: Vec<T> = activities
            .iter()
            .map(|a| &a.activity)
            .filter(|a| !a.is_dummy() && a.target_resources.is_empty())
            .map(|a| a.id)
            .collect();
        if !untargeted.is_empty() {
            errors.all_resources_explicit_target_and_not_all_activities_targeted = true;
            errors.push(
                GraphCompilationErrorCode::P0040,
                format!(
                    "All resources are explicit targets but activities {untargeted:?} target no resource"
                ),
            );
        }
    }
}

fn check_activity<T, R, W>(
    activity: &Activity<T, R, W>,
    resource_lookup: &BTreeMap<R, &Resource<R, W>>,
    work_stream_lookup: &BTreeMap<W, &WorkStream<W>>,
    errors: &mut GraphCompilationErrors<T>,
) where
    T: GraphId,
    R: GraphId,
    W: GraphId,
{
    let id = activity.id;
    if activity.duration < 0 {
        errors.invalid_constraints.insert(id);
        errors.push(
            GraphCompilationErrorCode::P0030,
            format!("Activity {id:?} has negative duration {}", activity.duration),
        );
    }
    if let (Some(start), Some(finish)) = (
        activity.minimum_earliest_start_time,
        activity.maximum_latest_finish_time,
    ) {
        if start + activity.duration > finish {
            errors.invalid_constraints.insert(id);
            errors.push(
                GraphCompilationErrorCode::P0030,
                format!(
                    "Activity {id:?} cannot start at {start} and finish by {finish} with duration {}",
                    activity.duration
                ),
            );
        }
    }
    if activity.minimum_free_slack.is_some_and(|slack| slack < 0) {
        errors.invalid_constraints.insert(id);
        errors.push(
            GraphCompilationErrorCode::P0030,
            format!("Activity {id:?} has negative minimum free slack"),
        );
    }
    for target in &activity.target_resources {
        match resource_lookup.get(target) {
            None => errors.push(
                GraphCompilationErrorCode::P0030,
                format!("Activity {id:?} targets unknown resource {target:?}"),
            ),
            Some(resource) if resource.is_inactive => errors.push(
                GraphCompilationErrorCode::P0030,
                format!("Activity {id:?} targets inactive resource {target:?}"),
            ),
            Some(_) => {}
        }
    }
    for work_stream in &activity.target_work_streams {
        if !work_stream_lookup.contains_key(work_stream) {
            errors.push(
                GraphCompilationErrorCode::P0030,
                format!("Activity {id:?} belongs to unknown work stream {work_stream:?}"),
            );
        }
    }
}

/// Flag timed activities that end up with negative total slack or less
/// total slack than the minimum free slack they ask for.
pub(crate) fn check_postcompilation<'a, T, R, W>(
    activities: impl IntoIterator<Item = &'a Activity<T, R, W>>,
    errors: &mut GraphCompilationErrors<T>,
) where
    T: GraphId + 'a,
    R: GraphId + 'a,
    W: GraphId + 'a,
{
    for activity in activities {
        let Some(total_slack) = activity.total_slack() else {
            continue;
        };
        let id = activity.id;
        if total_slack < 0 {
            errors.invalid_constraints.insert(id);
            errors.push(
                GraphCompilationErrorCode::C0010,
                format!("Activity {id:?} has negative total slack {total_slack}"),
            );
        } else if let Some(minimum) = activity.minimum_free_slack.filter(|&minimum| minimum > total_slack) {
            errors.invalid_constraints.insert(id);
            errors.push(
                GraphCompilationErrorCode::C0010,
                format!("Activity {id:?} needs free slack {minimum} but has total slack {total_slack}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_activity, make_dependent};

    fn make_resource(id: i32, explicit: bool) -> Resource<i32> {
        let mut resource = Resource::new(id, format!("Resource {id}"));
        resource.is_explicit_target = explicit;
        resource
    }

    fn make_work_stream(id: i32, is_phase: bool) -> WorkStream<i32> {
        WorkStream {
            id,
            name: format!("Stream {id}"),
            is_phase,
        }
    }

    #[test]
    fn test_missing_dependencies_recorded() {
        let activities = vec![make_dependent(1, 2, &[]), make_dependent(2, 3, &[1, 9, 8])];
        let mut errors = GraphCompilationErrors::default();
        check_missing_dependencies(&activities, &mut errors);

        assert_eq!(errors.missing_dependencies, BTreeSet::from([8, 9]));
        assert_eq!(errors.compilation_errors.len(), 2);
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::P0010]));
    }

    #[test]
    fn test_duplicate_activities_recorded() {
        let activities = vec![make_dependent(1, 2, &[]), make_dependent(1, 3, &[])];
        let mut errors = GraphCompilationErrors::default();
        check_duplicate_activities(&activities, &mut errors);
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::P0030]));
    }

    #[test]
    fn test_precompilation_reports_bad_input() {
        let mut negative = make_dependent(1, -1, &[]);
        negative.activity.name = "negative".into();
        let mut bounded = make_dependent(2, 5, &[]);
        bounded.activity.minimum_earliest_start_time = Some(10);
        bounded.activity.maximum_latest_finish_time = Some(12);
        let mut targeted = make_dependent(3, 1, &[]);
        targeted.activity.target_resources.extend([7, 8]);
        targeted.activity.target_work_streams.insert(50);

        let mut inactive = make_resource(8, false);
        inactive.is_inactive = true;
        let mut indirect = make_resource(9, false);
        indirect.inter_activity_allocation_type = InterActivityAllocationType::Indirect;
        indirect.inter_activity_phases.insert(40);

        let mut errors = GraphCompilationErrors::default();
        check_precompilation(
            &[negative, bounded, targeted],
            &[inactive, indirect],
            &[make_work_stream(40, false)],
            &mut errors,
        );

        assert_eq!(errors.invalid_constraints, BTreeSet::from([1, 2]));
        // Negative duration, bounds, unknown resource, inactive resource,
        // unknown work stream and non-phase work stream.
        assert_eq!(errors.compilation_errors.len(), 6);
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::P0030]));
        assert!(!errors.all_resources_explicit_target_and_not_all_activities_targeted);
    }

    #[test]
    fn test_all_explicit_targets_require_targeted_activities() {
        let mut targeted = make_dependent(1, 2, &[]);
        targeted.activity.target_resources.insert(1);
        let untargeted = make_dependent(2, 2, &[]);
        let milestone = make_dependent(3, 0, &[]);
        let resources = [make_resource(1, true)];

        let mut errors = GraphCompilationErrors::default();
        check_precompilation(&[targeted.clone(), untargeted, milestone.clone()], &resources, &[], &mut errors);
        assert!(errors.all_resources_explicit_target_and_not_all_activities_targeted);
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::P0040]));

        let mut errors = GraphCompilationErrors::default();
        check_precompilation(&[targeted, milestone], &resources, &[], &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_postcompilation_slack_checks() {
        let mut late = make_activity(1, 5);
        late.earliest_start_time = Some(4);
        late.latest_finish_time = Some(8);
        let mut tight = make_activity(2, 5);
        tight.earliest_start_time = Some(0);
        tight.latest_finish_time = Some(7);
        tight.minimum_free_slack = Some(3);
        let mut fine = make_activity(3, 5);
        fine.earliest_start_time = Some(0);
        fine.latest_finish_time = Some(9);
        fine.minimum_free_slack = Some(3);
        let untimed = make_activity(4, 5);

        let mut errors = GraphCompilationErrors::default();
        check_postcompilation([&late, &tight, &fine, &untimed], &mut errors);
        assert_eq!(errors.invalid_constraints, BTreeSet::from([1, 2]));
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::C0010]));
    }
}
