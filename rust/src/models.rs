//! Core data types for activities, resources and scheduling output.

use std::collections::BTreeSet;

use crate::graph::{GraphId, Identifiable};

/// How an activity combines its targeted resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    /// Every targeted resource is required at the same time.
    #[default]
    And,
    /// Any one of the targeted resources is enough.
    Or,
}

/// How a resource is occupied between the activities it works on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InterActivityAllocationType {
    #[default]
    None,
    Direct,
    /// Busy across whole work-stream phases rather than per activity.
    Indirect,
}

/// A unit of work in the network.
///
/// Timing fields are `None` until a critical path pass populates them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activity<T, R = T, W = T> {
    pub id: T,
    pub name: String,
    /// Duration in time units; zero or negative marks a dummy activity.
    pub duration: i32,
    pub can_be_removed: bool,
    pub has_no_cost: bool,
    pub has_no_effort: bool,
    pub target_resources: BTreeSet<R>,
    pub target_resource_operator: LogicalOperator,
    pub target_work_streams: BTreeSet<W>,
    pub allocated_to_resources: BTreeSet<R>,
    pub minimum_free_slack: Option<i32>,
    pub minimum_earliest_start_time: Option<i32>,
    pub maximum_latest_finish_time: Option<i32>,
    pub earliest_start_time: Option<i32>,
    pub latest_finish_time: Option<i32>,
    pub free_slack: Option<i32>,
}

impl<T: GraphId, R: GraphId, W: GraphId> Activity<T, R, W> {
    pub fn new(id: T, duration: i32) -> Self {
        Self {
            id,
            name: String::new(),
            duration,
            can_be_removed: false,
            has_no_cost: false,
            has_no_effort: false,
            target_resources: BTreeSet::new(),
            target_resource_operator: LogicalOperator::default(),
            target_work_streams: BTreeSet::new(),
            allocated_to_resources: BTreeSet::new(),
            minimum_free_slack: None,
            minimum_earliest_start_time: None,
            maximum_latest_finish_time: None,
            earliest_start_time: None,
            latest_finish_time: None,
            free_slack: None,
        }
    }

    /// Zero-duration, removable activity used only to carry precedence.
    pub fn dummy(id: T) -> Self {
        Self {
            can_be_removed: true,
            ..Self::new(id, 0)
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.duration <= 0
    }

    /// Dummy activities the graph builders are allowed to delete or merge.
    pub fn is_removable_dummy(&self) -> bool {
        self.is_dummy() && self.can_be_removed
    }

    pub fn earliest_finish_time(&self) -> Option<i32> {
        self.earliest_start_time.map(|es| es + self.duration)
    }

    pub fn latest_start_time(&self) -> Option<i32> {
        self.latest_finish_time.map(|lf| lf - self.duration)
    }

    pub fn total_slack(&self) -> Option<i32> {
        Some(self.latest_finish_time? - self.earliest_finish_time()?)
    }

    pub fn interfering_slack(&self) -> Option<i32> {
        Some(self.total_slack()? - self.free_slack?)
    }

    pub fn is_critical(&self) -> bool {
        self.total_slack().is_some_and(|slack| slack <= 0)
    }

    /// Reset every value computed by a critical path pass.
    pub fn clear_critical_path_variables(&mut self) {
        self.earliest_start_time = None;
        self.latest_finish_time = None;
        self.free_slack = None;
    }
}

impl<T: GraphId, R, W> Identifiable<T> for Activity<T, R, W> {
    fn id(&self) -> T {
        self.id
    }
}

/// An activity together with the precedence it declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependentActivity<T, R = T, W = T> {
    pub activity: Activity<T, R, W>,
    pub dependencies: BTreeSet<T>,
    /// Ordering imposed by resource scheduling (previous activity on a shared resource).
    pub resource_dependencies: BTreeSet<T>,
}

impl<T: GraphId, R: GraphId, W: GraphId> DependentActivity<T, R, W> {
    pub fn new(activity: Activity<T, R, W>, dependencies: impl IntoIterator<Item = T>) -> Self {
        Self {
            activity,
            dependencies: dependencies.into_iter().collect(),
            resource_dependencies: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> T {
        self.activity.id
    }

    /// Declared dependencies plus resource dependencies.
    pub fn all_dependencies(&self) -> BTreeSet<T> {
        self.dependencies
            .union(&self.resource_dependencies)
            .copied()
            .collect()
    }
}

/// A point in time joining activities in an arrow network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event<T> {
    pub id: T,
    pub earliest_finish_time: Option<i32>,
    pub latest_finish_time: Option<i32>,
}

impl<T: GraphId> Event<T> {
    pub fn new(id: T) -> Self {
        Self {
            id,
            earliest_finish_time: None,
            latest_finish_time: None,
        }
    }

    pub fn clear_critical_path_variables(&mut self) {
        self.earliest_finish_time = None;
        self.latest_finish_time = None;
    }
}

impl<T: GraphId> Identifiable<T> for Event<T> {
    fn id(&self) -> T {
        self.id
    }
}

/// A resource that activities can be scheduled onto.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource<R, W = R> {
    pub id: R,
    pub name: String,
    /// Only activities that target this resource may use it.
    pub is_explicit_target: bool,
    pub is_inactive: bool,
    pub inter_activity_allocation_type: InterActivityAllocationType,
    pub unit_cost: f64,
    /// Lower values are considered first when assigning work.
    pub allocation_order: i32,
    /// Work-stream phases an `Indirect` resource spans.
    pub inter_activity_phases: BTreeSet<W>,
}

impl<R: GraphId, W: GraphId> Resource<R, W> {
    pub fn new(id: R, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_explicit_target: false,
            is_inactive: false,
            inter_activity_allocation_type: InterActivityAllocationType::None,
            unit_cost: 0.0,
            allocation_order: 0,
            inter_activity_phases: BTreeSet::new(),
        }
    }
}

/// A named stream of work; phases are tracked by `Indirect` resources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkStream<W> {
    pub id: W,
    pub name: String,
    pub is_phase: bool,
}

/// Immutable projection of an activity placed on a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledActivity<T> {
    pub id: T,
    pub name: String,
    pub has_no_cost: bool,
    pub has_no_effort: bool,
    pub duration: i32,
    pub start_time: i32,
    pub finish_time: i32,
}

/// A set of activity ids forming one dependency cycle.
///
/// Equality and hashing ignore the order in which members were found.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CircularDependency<T> {
    pub dependencies: BTreeSet<T>,
}

impl<T: GraphId> CircularDependency<T> {
    pub fn new(dependencies: impl IntoIterator<Item = T>) -> Self {
        Self {
            dependencies: dependencies.into_iter().collect(),
        }
    }
}
