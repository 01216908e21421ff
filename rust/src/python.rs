//! Python bindings over the compilation pipeline, using `i32` ids.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::calendar::ProjectCalendar;
use crate::compiler::{GraphCompilation, GraphCompiler};
use crate::config::CompilationConfig;
use crate::graph::IdGenerator;
use crate::models::{Activity, DependentActivity, InterActivityAllocationType, LogicalOperator, Resource, WorkStream};

fn parse_operator(operator: &str) -> PyResult<LogicalOperator> {
    match operator.to_ascii_lowercase().as_str() {
        "and" => Ok(LogicalOperator::And),
        "or" => Ok(LogicalOperator::Or),
        other => Err(PyValueError::new_err(format!("Unknown resource operator '{other}'"))),
    }
}

fn parse_allocation_type(allocation_type: &str) -> PyResult<InterActivityAllocationType> {
    match allocation_type.to_ascii_lowercase().as_str() {
        "none" => Ok(InterActivityAllocationType::None),
        "direct" => Ok(InterActivityAllocationType::Direct),
        "indirect" => Ok(InterActivityAllocationType::Indirect),
        other => Err(PyValueError::new_err(format!("Unknown allocation type '{other}'"))),
    }
}

/// Activity input record.
#[pyclass(name = "Activity")]
#[derive(Clone, Debug)]
pub struct PyActivity {
    #[pyo3(get, set)]
    pub id: i32,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub duration: i32,
    #[pyo3(get, set)]
    pub dependencies: Vec<i32>,
    #[pyo3(get, set)]
    pub target_resources: Vec<i32>,
    #[pyo3(get, set)]
    pub target_resource_operator: String,
    #[pyo3(get, set)]
    pub target_work_streams: Vec<i32>,
    #[pyo3(get, set)]
    pub has_no_cost: bool,
    #[pyo3(get, set)]
    pub has_no_effort: bool,
    #[pyo3(get, set)]
    pub minimum_free_slack: Option<i32>,
    #[pyo3(get, set)]
    pub minimum_earliest_start_time: Option<i32>,
    #[pyo3(get, set)]
    pub maximum_latest_finish_time: Option<i32>,
}

#[pymethods]
impl PyActivity {
    #[new]
    #[pyo3(signature = (
        id,
        name,
        duration,
        dependencies=Vec::new(),
        target_resources=Vec::new(),
        target_resource_operator="and".to_string(),
        target_work_streams=Vec::new(),
        has_no_cost=false,
        has_no_effort=false,
        minimum_free_slack=None,
        minimum_earliest_start_time=None,
        maximum_latest_finish_time=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: i32,
        name: String,
        duration: i32,
        dependencies: Vec<i32>,
        target_resources: Vec<i32>,
        target_resource_operator: String,
        target_work_streams: Vec<i32>,
        has_no_cost: bool,
        has_no_effort: bool,
        minimum_free_slack: Option<i32>,
        minimum_earliest_start_time: Option<i32>,
        maximum_latest_finish_time: Option<i32>,
    ) -> Self {
        Self {
            id,
            name,
            duration,
            dependencies,
            target_resources,
            target_resource_operator,
            target_work_streams,
            has_no_cost,
            has_no_effort,
            minimum_free_slack,
            minimum_earliest_start_time,
            maximum_latest_finish_time,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Activity(id={}, name='{}', duration={}, dependencies={:?})",
            self.id, self.name, self.duration, self.dependencies
        )
    }
}

impl PyActivity {
    fn to_dependent(&self) -> PyResult<DependentActivity<i32>> {
        let mut activity = Activity::new(self.id, self.duration);
        activity.name = self.name.clone();
        activity.has_no_cost = self.has_no_cost;
        activity.has_no_effort = self.has_no_effort;
        activity.target_resources = self.target_resources.iter().copied().collect();
        activity.target_resource_operator = parse_operator(&self.target_resource_operator)?;
        activity.target_work_streams = self.target_work_streams.iter().copied().collect();
        activity.minimum_free_slack = self.minimum_free_slack;
        activity.minimum_earliest_start_time = self.minimum_earliest_start_time;
        activity.maximum_latest_finish_time = self.maximum_latest_finish_time;
        Ok(DependentActivity::new(activity, self.dependencies.iter().copied()))
    }
}

/// Resource input record.
#[pyclass(name = "Resource")]
#[derive(Clone, Debug)]
pub struct PyResource {
    #[pyo3(get, set)]
    pub id: i32,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub is_explicit_target: bool,
    #[pyo3(get, set)]
    pub is_inactive: bool,
    #[pyo3(get, set)]
    pub allocation_type: String,
    #[pyo3(get, set)]
    pub unit_cost: f64,
    #[pyo3(get, set)]
    pub allocation_order: i32,
    #[pyo3(get, set)]
    pub phases: Vec<i32>,
}

#[pymethods]
impl PyResource {
    #[new]
    #[pyo3(signature = (
        id,
        name,
        is_explicit_target=false,
        is_inactive=false,
        allocation_type="none".to_string(),
        unit_cost=0.0,
        allocation_order=0,
        phases=Vec::new()
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: i32,
        name: String,
        is_explicit_target: bool,
        is_inactive: bool,
        allocation_type: String,
        unit_cost: f64,
        allocation_order: i32,
        phases: Vec<i32>,
    ) -> Self {
        Self {
            id,
            name,
            is_explicit_target,
            is_inactive,
            allocation_type,
            unit_cost,
            allocation_order,
            phases,
        }
    }

    fn __repr__(&self) -> String {
        format!("Resource(id={}, name='{}')", self.id, self.name)
    }
}

impl PyResource {
    fn to_resource(&self) -> PyResult<Resource<i32>> {
        let mut resource = Resource::new(self.id, self.name.clone());
        resource.is_explicit_target = self.is_explicit_target;
        resource.is_inactive = self.is_inactive;
        resource.inter_activity_allocation_type = parse_allocation_type(&self.allocation_type)?;
        resource.unit_cost = self.unit_cost;
        resource.allocation_order = self.allocation_order;
        resource.inter_activity_phases = self.phases.iter().copied().collect();
        Ok(resource)
    }
}

/// Work stream input record.
#[pyclass(name = "WorkStream")]
#[derive(Clone, Debug)]
pub struct PyWorkStream {
    #[pyo3(get, set)]
    pub id: i32,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub is_phase: bool,
}

#[pymethods]
impl PyWorkStream {
    #[new]
    #[pyo3(signature = (id, name, is_phase=false))]
    fn new(id: i32, name: String, is_phase: bool) -> Self {
        Self { id, name, is_phase }
    }
}

/// Timed activity in a compilation result.
#[pyclass(name = "CompiledActivity", get_all)]
#[derive(Clone, Debug)]
pub struct PyCompiledActivity {
    pub id: i32,
    pub name: String,
    pub duration: i32,
    pub earliest_start_time: Option<i32>,
    pub earliest_finish_time: Option<i32>,
    pub latest_finish_time: Option<i32>,
    pub free_slack: Option<i32>,
    pub total_slack: Option<i32>,
    pub resource_dependencies: Vec<i32>,
    pub allocated_to_resources: Vec<i32>,
    pub start_date: Option<NaiveDate>,
    pub finish_date: Option<NaiveDate>,
}

/// Busy/idle sequence of one resource in a compilation result.
#[pyclass(name = "ResourceSchedule", get_all)]
#[derive(Clone, Debug)]
pub struct PyResourceSchedule {
    /// `None` for a worker of the unlimited pool.
    pub resource_id: Option<i32>,
    pub activity_ids: Vec<i32>,
    pub activity_allocation: Vec<bool>,
    pub cost: f64,
    pub effort: i32,
}

#[pyclass(name = "GraphCompilation", get_all)]
#[derive(Clone, Debug)]
pub struct PyGraphCompilation {
    pub activities: Vec<PyCompiledActivity>,
    pub resource_schedules: Vec<PyResourceSchedule>,
    pub critical_activities: Vec<i32>,
    pub finish_time: i32,
    pub cyclomatic_complexity: i32,
}

impl PyGraphCompilation {
    fn from_compilation(compilation: GraphCompilation<i32>, calendar: Option<ProjectCalendar>) -> Self {
        let activities = compilation
            .dependent_activities
            .iter()
            .map(|dependent| {
                let activity = &dependent.activity;
                let dated = calendar.and_then(|calendar| calendar.dated_activity(activity));
                PyCompiledActivity {
                    id: activity.id,
                    name: activity.name.clone(),
                    duration: activity.duration,
                    earliest_start_time: activity.earliest_start_time,
                    earliest_finish_time: activity.earliest_finish_time(),
                    latest_finish_time: activity.latest_finish_time,
                    free_slack: activity.free_slack,
                    total_slack: activity.total_slack(),
                    resource_dependencies: dependent.resource_dependencies.iter().copied().collect(),
                    allocated_to_resources: activity.allocated_to_resources.iter().copied().collect(),
                    start_date: dated.as_ref().map(|d| d.start),
                    finish_date: dated.as_ref().map(|d| d.finish),
                }
            })
            .collect();

        let resource_schedules = compilation
            .resource_schedules
            .iter()
            .map(|schedule| PyResourceSchedule {
                resource_id: schedule.resource.as_ref().map(|r| r.id),
                activity_ids: schedule.scheduled_activities.iter().map(|s| s.id).collect(),
                activity_allocation: schedule.activity_allocation.clone(),
                cost: schedule.cost(),
                effort: schedule.effort(),
            })
            .collect();

        Self {
            activities,
            resource_schedules,
            critical_activities: compilation.critical_path.critical_activities.clone(),
            finish_time: compilation.finish_time,
            cyclomatic_complexity: compilation.cyclomatic_complexity(),
        }
    }
}

fn counter(start: i32) -> IdGenerator<i32> {
    let mut next = start;
    Box::new(move || {
        next += 1;
        next
    })
}

/// Compile activities, resources and work streams into a timed schedule.
///
/// # Raises
/// * ValueError listing every compilation error code and message
#[pyfunction]
#[pyo3(signature = (activities, resources=Vec::new(), work_streams=Vec::new(), config=None))]
fn compile_graph(
    activities: Vec<PyActivity>,
    resources: Vec<PyResource>,
    work_streams: Vec<PyWorkStream>,
    config: Option<CompilationConfig>,
) -> PyResult<PyGraphCompilation> {
    let config = config.unwrap_or_default();
    let calendar = config.project_start.map(ProjectCalendar::new);

    let dependent_activities = activities
        .iter()
        .map(PyActivity::to_dependent)
        .collect::<PyResult<Vec<_>>>()?;
    let resources = resources
        .iter()
        .map(PyResource::to_resource)
        .collect::<PyResult<Vec<_>>>()?;
    let work_streams = work_streams
        .into_iter()
        .map(|w| WorkStream {
            id: w.id,
            name: w.name,
            is_phase: w.is_phase,
        })
        .collect();

    // Dummy activities share the activity id space, so they start above it.
    let highest_activity_id = activities.iter().map(|a| a.id).max().unwrap_or(0).max(0);
    let compiler = GraphCompiler::new(counter(0), counter(highest_activity_id), config);

    compiler
        .compile(dependent_activities, resources, work_streams)
        .map(|compilation| PyGraphCompilation::from_compilation(compilation, calendar))
        .map_err(|errors| PyValueError::new_err(errors.to_string()))
}

/// The netplan.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Input records
    m.add_class::<PyActivity>()?;
    m.add_class::<PyResource>()?;
    m.add_class::<PyWorkStream>()?;
    m.add_class::<CompilationConfig>()?;

    // Results
    m.add_class::<PyCompiledActivity>()?;
    m.add_class::<PyResourceSchedule>()?;
    m.add_class::<PyGraphCompilation>()?;

    m.add_function(wrap_pyfunction!(compile_graph, m)?)?;

    Ok(())
}
