//! Compilation pipeline.
//!
//! Sequences input validation, network construction, critical path timing
//! and resource scheduling into a single result. Every stage can stop the
//! run with typed errors; nothing from a failed run is returned.

mod errors;
mod validate;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

pub use errors::{GraphCompilationError, GraphCompilationErrorCode, GraphCompilationErrors};

use crate::calendar::{DatedActivity, ProjectCalendar};
use crate::config::CompilationConfig;
use crate::critical_path::{calculate_critical_path, CriticalPathError, CriticalPathResult};
use crate::graph::{find_strong_circular_dependencies, ActivityGraph, ArrowGraphBuilder, Graph, GraphId, IdGenerator};
use crate::models::{Activity, CircularDependency, DependentActivity, Event, Resource, WorkStream};
use crate::scheduler::{ListScheduler, ResourceSchedule, SchedulerError};
use crate::{log_changes, log_checks};

use validate::{check_duplicate_activities, check_missing_dependencies, check_postcompilation, check_precompilation};

/// Successful output of [`GraphCompiler::compile`].
#[derive(Clone, Debug)]
pub struct GraphCompilation<T, R = T, W = T> {
    /// Input activities with timings, resource dependencies and allocations filled in.
    pub dependent_activities: Vec<DependentActivity<T, R, W>>,
    pub resource_schedules: Vec<ResourceSchedule<T, R, W>>,
    pub work_streams: Vec<WorkStream<W>>,
    pub critical_path: CriticalPathResult<T>,
    /// Finish of the last scheduled activity.
    pub finish_time: i32,
    /// The timed activity-on-arrow network.
    pub arrow_graph: Graph<T, Activity<T, R, W>, Event<T>>,
}

impl<T: GraphId, R: GraphId, W: GraphId> GraphCompilation<T, R, W> {
    pub fn activity(&self, id: T) -> Option<&Activity<T, R, W>> {
        self.dependent_activities
            .iter()
            .map(|dependent| &dependent.activity)
            .find(|activity| activity.id == id)
    }

    /// Edges minus nodes plus two, over the arrow network.
    pub fn cyclomatic_complexity(&self) -> i32 {
        self.arrow_graph.edges.len() as i32 - self.arrow_graph.nodes.len() as i32 + 2
    }

    pub fn total_cost(&self) -> f64 {
        self.resource_schedules.iter().map(ResourceSchedule::cost).sum()
    }

    pub fn total_effort(&self) -> i32 {
        self.resource_schedules.iter().map(ResourceSchedule::effort).sum()
    }

    /// Calendar dates of every timed activity, in input order.
    pub fn dated_activities(&self, calendar: &ProjectCalendar) -> Vec<DatedActivity<T>> {
        self.dependent_activities
            .iter()
            .filter_map(|dependent| calendar.dated_activity(&dependent.activity))
            .collect()
    }
}

/// Turns activities, resources and work streams into a timed, resourced schedule.
///
/// The id generators are shared by every network the compiler builds, so
/// event and dummy ids stay unique across rebuilds.
pub struct GraphCompiler<T> {
    event_id_generator: Rc<RefCell<IdGenerator<T>>>,
    dummy_activity_id_generator: Rc<RefCell<IdGenerator<T>>>,
    config: CompilationConfig,
}

impl<T: GraphId> GraphCompiler<T> {
    pub fn new(
        event_id_generator: IdGenerator<T>,
        dummy_activity_id_generator: IdGenerator<T>,
        config: CompilationConfig,
    ) -> Self {
        Self {
            event_id_generator: Rc::new(RefCell::new(event_id_generator)),
            dummy_activity_id_generator: Rc::new(RefCell::new(dummy_activity_id_generator)),
            config,
        }
    }

    pub fn config(&self) -> &CompilationConfig {
        &self.config
    }

    pub fn compile<R: GraphId, W: GraphId>(
        &self,
        activities: Vec<DependentActivity<T, R, W>>,
        resources: Vec<Resource<R, W>>,
        work_streams: Vec<WorkStream<W>>,
    ) -> Result<GraphCompilation<T, R, W>, GraphCompilationErrors<T>> {
        let verbosity = self.config.verbosity;
        log_changes!(
            verbosity,
            "Compiling {} activities with {} resources and {} work streams",
            activities.len(),
            resources.len(),
            work_streams.len()
        );

        let mut errors = GraphCompilationErrors::default();
        check_duplicate_activities(&activities, &mut errors);
        check_missing_dependencies(&activities, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        log_changes!(verbosity, "Checking for circular dependencies");
        let dependency_map: BTreeMap<T, BTreeSet<T>> = activities
            .iter()
            .map(|dependent| (dependent.id(), dependent.dependencies.clone()))
            .collect();
        let circular_dependencies = find_strong_circular_dependencies(&dependency_map);
        if !circular_dependencies.is_empty() {
            return Err(circular_dependency_errors(circular_dependencies));
        }

        log_changes!(verbosity, "Validating precompilation constraints");
        check_precompilation(&activities, &resources, &work_streams, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut network = self.build_network(activities.iter().map(|d| (&d.activity, &d.dependencies)))?;
        let mut critical_path = self.time_network(&mut network)?;

        log_changes!(verbosity, "Scheduling resources");
        let outcome = ListScheduler::new(resources.iter().cloned(), verbosity)
            .schedule(&network)
            .map_err(scheduling_errors)?;

        let mut dependent_activities = activities;
        for dependent in &mut dependent_activities {
            let id = dependent.id();
            dependent.resource_dependencies = outcome.resource_dependencies.get(&id).cloned().unwrap_or_default();
            dependent.activity.allocated_to_resources = outcome.allocations.get(&id).cloned().unwrap_or_default();
            log_checks!(
                verbosity,
                "  Activity {:?} allocated to {:?} after {:?}",
                id,
                dependent.activity.allocated_to_resources,
                dependent.resource_dependencies
            );
        }

        let leveled = self.config.level_resources
            && dependent_activities.iter().any(|d| !d.resource_dependencies.is_empty());
        if leveled {
            log_changes!(verbosity, "Re-timing network with resource dependencies");
            let all_dependencies: Vec<BTreeSet<T>> =
                dependent_activities.iter().map(DependentActivity::all_dependencies).collect();
            network = self.build_network(
                dependent_activities
                    .iter()
                    .zip(&all_dependencies)
                    .map(|(d, dependencies)| (&d.activity, dependencies)),
            )?;
            critical_path = self.time_network(&mut network)?;
        }

        for dependent in &mut dependent_activities {
            if let Some(timed) = network.activity(dependent.id()) {
                let allocated = std::mem::take(&mut dependent.activity.allocated_to_resources);
                dependent.activity = timed.clone();
                dependent.activity.allocated_to_resources = allocated;
            }
        }

        log_changes!(verbosity, "Validating postcompilation constraints");
        check_postcompilation(dependent_activities.iter().map(|d| &d.activity), &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        // Phase spans follow the schedule, which only matches the network
        // timings when the network was re-timed with resource dependencies.
        let as_scheduled: Vec<Activity<T, R, W>> = dependent_activities
            .iter()
            .map(|dependent| {
                let mut activity = dependent.activity.clone();
                if let Some(&start) = outcome.start_times.get(&activity.id) {
                    activity.earliest_start_time = Some(start);
                }
                activity
            })
            .collect();

        let finish_time = outcome.finish_time.max(critical_path.project_finish_time);
        let resource_schedules = outcome
            .resource_schedules
            .iter()
            .map(|builder| builder.to_resource_schedule(&as_scheduled, 0, finish_time))
            .collect();

        log_changes!(verbosity, "Compilation finished at time {}", finish_time);

        Ok(GraphCompilation {
            dependent_activities,
            resource_schedules,
            work_streams,
            critical_path,
            finish_time,
            arrow_graph: network.to_graph(),
        })
    }

    fn shared_generator(generator: &Rc<RefCell<IdGenerator<T>>>) -> IdGenerator<T> {
        let generator = Rc::clone(generator);
        Box::new(move || (&mut *generator.borrow_mut())())
    }

    /// Build an arrow network over the given activities, simplifying it when configured.
    fn build_network<'a, R, W>(
        &self,
        activities: impl IntoIterator<Item = (&'a Activity<T, R, W>, &'a BTreeSet<T>)>,
    ) -> Result<ArrowGraphBuilder<T, R, W>, GraphCompilationErrors<T>>
    where
        R: GraphId,
        W: GraphId,
    {
        let verbosity = self.config.verbosity;
        log_changes!(verbosity, "Building arrow network");

        let mut network = ArrowGraphBuilder::new(
            Self::shared_generator(&self.event_id_generator),
            Self::shared_generator(&self.dummy_activity_id_generator),
        )
        .map_err(|e| GraphCompilationErrors::single(GraphCompilationErrorCode::P0050, e.to_string()))?
        .with_verbosity(verbosity);

        for (activity, dependencies) in activities {
            network
                .add_activity(activity.clone(), dependencies.clone())
                .map_err(|e| GraphCompilationErrors::single(GraphCompilationErrorCode::P0050, e.to_string()))?;
        }

        let circular_dependencies = network.strong_circular_dependencies();
        if !circular_dependencies.is_empty() {
            return Err(circular_dependency_errors(circular_dependencies));
        }

        if self.config.simplify_graph {
            log_changes!(verbosity, "Simplifying arrow network");
            if !network.remove_redundant_edges() {
                return Err(GraphCompilationErrors::single(
                    GraphCompilationErrorCode::P0050,
                    "Arrow network could not be simplified",
                ));
            }
        }
        Ok(network)
    }

    fn time_network<R, W>(
        &self,
        network: &mut ArrowGraphBuilder<T, R, W>,
    ) -> Result<CriticalPathResult<T>, GraphCompilationErrors<T>>
    where
        R: GraphId,
        W: GraphId,
    {
        log_changes!(self.config.verbosity, "Calculating critical path");
        let result = calculate_critical_path(network).map_err(critical_path_errors)?;
        log_changes!(
            self.config.verbosity,
            "Critical path finishes at {} through {:?}",
            result.project_finish_time,
            result.critical_activities
        );
        Ok(result)
    }
}

fn circular_dependency_errors<T: GraphId>(circular_dependencies: Vec<CircularDependency<T>>) -> GraphCompilationErrors<T> {
    let mut errors = GraphCompilationErrors::default();
    for cycle in &circular_dependencies {
        errors.push(
            GraphCompilationErrorCode::P0020,
            format!("Circular dependency between activities {:?}", cycle.dependencies),
        );
    }
    errors.circular_dependencies = circular_dependencies;
    errors
}

fn critical_path_errors<T: GraphId>(error: CriticalPathError<T>) -> GraphCompilationErrors<T> {
    let mut errors = GraphCompilationErrors::default();
    match &error {
        CriticalPathError::CircularDependency => errors.push(GraphCompilationErrorCode::P0020, error.to_string()),
        CriticalPathError::InvalidConstraint { activity, .. } => {
            errors.invalid_constraints.insert(*activity);
            errors.push(GraphCompilationErrorCode::P0030, error.to_string());
        }
        CriticalPathError::MissingTimings(_) => errors.push(GraphCompilationErrorCode::C0010, error.to_string()),
    }
    errors
}

fn scheduling_errors<T: GraphId>(error: SchedulerError<T>) -> GraphCompilationErrors<T> {
    match error {
        SchedulerError::CriticalPath(inner) => critical_path_errors(inner),
        other => {
            let code = match other {
                SchedulerError::NoEligibleResource(_) => GraphCompilationErrorCode::P0030,
                _ => GraphCompilationErrorCode::P0020,
            };
            GraphCompilationErrors::single(code, other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InterActivityAllocationType;
    use crate::test_support::{cyclic_fixture, id_generator, make_dependent, nine_activity_fixture};

    fn make_compiler(config: CompilationConfig) -> GraphCompiler<i32> {
        GraphCompiler::new(id_generator(100), id_generator(1000), config)
    }

    fn make_resource(id: i32) -> Resource<i32> {
        let mut resource = Resource::new(id, format!("Resource {id}"));
        resource.unit_cost = 2.0;
        resource
    }

    fn compile(
        config: CompilationConfig,
        activities: Vec<DependentActivity<i32>>,
        resources: Vec<Resource<i32>>,
    ) -> Result<GraphCompilation<i32>, GraphCompilationErrors<i32>> {
        make_compiler(config).compile(activities, resources, Vec::new())
    }

    fn start_of(compilation: &GraphCompilation<i32>, id: i32) -> Option<i32> {
        compilation.activity(id).and_then(|a| a.earliest_start_time)
    }

    #[test]
    fn test_unlimited_resources_match_critical_path() {
        let compilation = compile(CompilationConfig::default(), nine_activity_fixture(), Vec::new()).unwrap();

        assert_eq!(compilation.finish_time, 26);
        assert_eq!(compilation.critical_path.critical_activities, vec![3, 5, 9]);
        assert!(compilation.dependent_activities.iter().all(|d| d.resource_dependencies.is_empty()));
        assert_eq!(start_of(&compilation, 9), Some(16));
        assert_eq!(compilation.total_cost(), 0.0);
        assert!(compilation.cyclomatic_complexity() >= 1);
    }

    #[test]
    fn test_unsimplified_network_times_identically() {
        let config = CompilationConfig {
            simplify_graph: false,
            ..CompilationConfig::default()
        };
        let compilation = compile(config, nine_activity_fixture(), Vec::new()).unwrap();
        assert_eq!(compilation.finish_time, 26);
        assert_eq!(start_of(&compilation, 5), Some(8));

        let calendar = ProjectCalendar::new(chrono::NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        let dated = compilation.dated_activities(&calendar);
        assert_eq!(dated.len(), 9);
        let nine = dated.iter().find(|d| d.id == 9).unwrap();
        assert_eq!(nine.start, chrono::NaiveDate::from_ymd_opt(2024, 3, 20).unwrap());
    }

    #[test]
    fn test_single_resource_leveling() {
        let compilation = compile(CompilationConfig::default(), nine_activity_fixture(), vec![make_resource(1)]).unwrap();

        assert_eq!(compilation.finish_time, 65);
        let expected_starts = [(3, 0), (2, 8), (1, 15), (5, 21), (4, 29), (6, 40), (9, 47), (7, 57), (8, 61)];
        for (id, start) in expected_starts {
            assert_eq!(start_of(&compilation, id), Some(start), "activity {id}");
        }
        let five = compilation.dependent_activities.iter().find(|d| d.id() == 5).unwrap();
        assert_eq!(five.resource_dependencies, BTreeSet::from([1]));
        assert_eq!(five.activity.allocated_to_resources, BTreeSet::from([1]));

        let schedule = &compilation.resource_schedules[0];
        assert_eq!(schedule.activity_allocation.len(), 65);
        assert_eq!(schedule.finish_time, 65);
        assert!(schedule.activity_allocation.iter().all(|&busy| busy));
        assert_eq!(schedule.effort(), 65);
        assert_eq!(compilation.total_cost(), 130.0);
    }

    #[test]
    fn test_without_leveling_keeps_critical_path_timings() {
        let config = CompilationConfig {
            level_resources: false,
            ..CompilationConfig::default()
        };
        let compilation = compile(config, nine_activity_fixture(), vec![make_resource(1)]).unwrap();

        assert_eq!(compilation.finish_time, 65);
        assert_eq!(start_of(&compilation, 9), Some(16));
        let nine = compilation.dependent_activities.iter().find(|d| d.id() == 9).unwrap();
        assert_eq!(nine.resource_dependencies, BTreeSet::from([6]));
    }

    #[test]
    fn test_missing_dependencies_stop_compilation() {
        let activities = vec![make_dependent(1, 2, &[]), make_dependent(2, 2, &[1, 7])];
        let errors = compile(CompilationConfig::default(), activities, Vec::new()).unwrap_err();
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::P0010]));
        assert_eq!(errors.missing_dependencies, BTreeSet::from([7]));
    }

    #[test]
    fn test_circular_dependencies_stop_compilation() {
        let errors = compile(CompilationConfig::default(), cyclic_fixture(1), Vec::new()).unwrap_err();
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::P0020]));
        let cycles: BTreeSet<CircularDependency<i32>> = errors.circular_dependencies.into_iter().collect();
        assert_eq!(
            cycles,
            BTreeSet::from([CircularDependency::new([2, 4, 7]), CircularDependency::new([5, 8, 9])])
        );
    }

    #[test]
    fn test_invalid_constraints_stop_compilation() {
        let mut activities = nine_activity_fixture();
        activities[3].activity.minimum_earliest_start_time = Some(20);
        activities[3].activity.maximum_latest_finish_time = Some(25);
        let errors = compile(CompilationConfig::default(), activities, Vec::new()).unwrap_err();
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::P0030]));
        assert_eq!(errors.invalid_constraints, BTreeSet::from([4]));
    }

    #[test]
    fn test_explicit_target_mismatch_stops_compilation() {
        let mut resource = make_resource(1);
        resource.is_explicit_target = true;
        let errors = compile(CompilationConfig::default(), nine_activity_fixture(), vec![resource]).unwrap_err();
        assert!(errors.all_resources_explicit_target_and_not_all_activities_targeted);
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::P0040]));
    }

    #[test]
    fn test_unreachable_finish_bound_is_postcompilation_error() {
        let mut activities = nine_activity_fixture();
        // Activity 9 cannot start before 16, so finishing by 20 is impossible.
        activities[8].activity.maximum_latest_finish_time = Some(20);
        let errors = compile(CompilationConfig::default(), activities, Vec::new()).unwrap_err();
        assert_eq!(errors.codes(), BTreeSet::from([GraphCompilationErrorCode::C0010]));
        assert!(errors.invalid_constraints.contains(&9));
    }

    #[test]
    fn test_removable_milestone_keeps_timings() {
        let mut milestone = make_dependent(2, 0, &[1]);
        milestone.activity.can_be_removed = true;
        let activities = vec![make_dependent(1, 5, &[]), milestone, make_dependent(3, 5, &[2])];
        let compilation = compile(CompilationConfig::default(), activities, Vec::new()).unwrap();

        let milestone = compilation.activity(2).unwrap();
        assert_eq!(milestone.earliest_start_time, Some(5));
        assert_eq!(milestone.latest_finish_time, Some(5));
        assert_eq!(start_of(&compilation, 3), Some(5));
        assert_eq!(compilation.finish_time, 10);
        assert!(compilation.arrow_graph.edges.iter().any(|edge| edge.id() == 2));
    }

    #[test]
    fn test_phase_span_follows_schedule_without_leveling() {
        // On one resource 2 runs 0..4 and 1 runs 4..7, although the network
        // alone would start both at 0.
        let mut first = make_dependent(1, 3, &[]);
        first.activity.target_work_streams.insert(10);
        let mut second = make_dependent(2, 4, &[]);
        second.activity.target_work_streams.insert(10);

        let mut manager = make_resource(2);
        manager.is_explicit_target = true;
        manager.inter_activity_allocation_type = InterActivityAllocationType::Indirect;
        manager.inter_activity_phases.insert(10);

        let work_streams = vec![WorkStream {
            id: 10,
            name: "Build".into(),
            is_phase: true,
        }];
        let config = CompilationConfig {
            level_resources: false,
            ..CompilationConfig::default()
        };
        let compilation = make_compiler(config)
            .compile(vec![first, second], vec![make_resource(1), manager], work_streams)
            .unwrap();

        assert_eq!(compilation.finish_time, 7);
        assert_eq!(start_of(&compilation, 1), Some(0));
        for schedule in &compilation.resource_schedules {
            assert_eq!(schedule.activity_allocation, vec![true; 7]);
            assert_eq!(schedule.activity_allocation.len(), schedule.finish_time as usize);
        }
    }

    #[test]
    fn test_indirect_resource_spans_phase() {
        let mut first = make_dependent(1, 3, &[]);
        first.activity.target_work_streams.insert(10);
        let mut second = make_dependent(2, 4, &[1]);
        second.activity.target_work_streams.insert(10);
        let third = make_dependent(3, 2, &[2]);

        let mut manager = make_resource(2);
        manager.is_explicit_target = true;
        manager.inter_activity_allocation_type = InterActivityAllocationType::Indirect;
        manager.inter_activity_phases.insert(10);

        let work_streams = vec![WorkStream {
            id: 10,
            name: "Design".into(),
            is_phase: true,
        }];
        let compilation = make_compiler(CompilationConfig::default())
            .compile(vec![first, second, third], vec![make_resource(1), manager], work_streams)
            .unwrap();

        assert_eq!(compilation.finish_time, 9);
        let manager_schedule = compilation
            .resource_schedules
            .iter()
            .find(|s| s.resource.as_ref().is_some_and(|r| r.id == 2))
            .unwrap();
        assert!(manager_schedule.scheduled_activities.is_empty());
        let expected: Vec<bool> = (0..9).map(|t| t < 7).collect();
        assert_eq!(manager_schedule.activity_allocation, expected);
        assert_eq!(manager_schedule.effort(), 7);
    }
}
