//! Critical path method over either network representation.
//!
//! The forward pass fills earliest starts, the backward pass latest finishes,
//! and free slack is derived from both. The priority list built from the
//! results drives the resource-constrained scheduler.

mod calculation;
mod priority;

pub use calculation::{calculate_critical_path, check_timing_constraints, CriticalPathError, CriticalPathResult};
pub use priority::calculate_critical_path_priority_list;

