//! Resource-constrained scheduling.
//!
//! The list scheduler places activities on resources in critical path
//! priority order; resource schedule builders turn the placements into
//! per-time-unit allocation sequences.

mod core;
mod resource_schedule;

pub use self::core::{ListScheduler, ScheduleOutcome, SchedulerError};
pub use resource_schedule::{ResourceSchedule, ResourceScheduleBuilder};
