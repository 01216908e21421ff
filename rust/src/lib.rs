//! Project network scheduling engine.
//!
//! Builds activity networks in either activity-on-node or activity-on-arrow
//! form, times them with the critical path method and schedules them onto
//! limited resources. [`compiler::GraphCompiler`] runs the whole pipeline.

pub mod calendar;
pub mod compiler;
pub mod config;
pub mod critical_path;
pub mod graph;
pub mod logging;
pub mod models;
pub mod scheduler;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod test_support;

pub use calendar::{DatedActivity, ProjectCalendar};
pub use compiler::{
    GraphCompilation, GraphCompilationError, GraphCompilationErrorCode, GraphCompilationErrors, GraphCompiler,
};
pub use config::CompilationConfig;
pub use critical_path::{
    calculate_critical_path, calculate_critical_path_priority_list, CriticalPathError, CriticalPathResult,
};
pub use graph::{ActivityGraph, ArrowGraphBuilder, Graph, GraphError, GraphId, IdGenerator, VertexGraphBuilder};
pub use models::{
    Activity, CircularDependency, DependentActivity, Event, InterActivityAllocationType, LogicalOperator, Resource,
    ScheduledActivity, WorkStream,
};
pub use scheduler::{ListScheduler, ResourceSchedule, ResourceScheduleBuilder, ScheduleOutcome, SchedulerError};
