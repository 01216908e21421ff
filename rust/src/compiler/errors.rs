//! Typed compilation errors.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::graph::GraphId;
use crate::models::CircularDependency;

/// Error codes reported by the compilation pipeline.
///
/// `P` codes are raised before the network is timed, `C` codes after.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GraphCompilationErrorCode {
    /// A dependency references an activity that was never supplied.
    P0010,
    /// The dependency relation contains cycles.
    P0020,
    /// Precompilation constraints are invalid.
    P0030,
    /// Every resource is an explicit target but some activity targets none.
    P0040,
    /// The network could not be simplified without breaking its structure.
    P0050,
    /// Timing bounds cannot all be met once the network is timed.
    C0010,
}

impl fmt::Display for GraphCompilationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::P0010 => "P0010",
            Self::P0020 => "P0020",
            Self::P0030 => "P0030",
            Self::P0040 => "P0040",
            Self::P0050 => "P0050",
            Self::C0010 => "C0010",
        };
        f.write_str(code)
    }
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct GraphCompilationError {
    pub code: GraphCompilationErrorCode,
    pub message: String,
}

impl GraphCompilationError {
    pub fn new(code: GraphCompilationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Everything that stopped a compilation, returned instead of a result.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("Graph compilation failed: {}", joined_messages(.compilation_errors))]
pub struct GraphCompilationErrors<T: GraphId> {
    pub all_resources_explicit_target_and_not_all_activities_targeted: bool,
    pub circular_dependencies: Vec<CircularDependency<T>>,
    pub missing_dependencies: BTreeSet<T>,
    /// Activities whose timing bounds contradict each other or the network.
    pub invalid_constraints: BTreeSet<T>,
    pub compilation_errors: Vec<GraphCompilationError>,
}

impl<T: GraphId> Default for GraphCompilationErrors<T> {
    fn default() -> Self {
        Self {
            all_resources_explicit_target_and_not_all_activities_targeted: false,
            circular_dependencies: Vec::new(),
            missing_dependencies: BTreeSet::new(),
            invalid_constraints: BTreeSet::new(),
            compilation_errors: Vec::new(),
        }
    }
}

impl<T: GraphId> GraphCompilationErrors<T> {
    pub fn is_empty(&self) -> bool {
        self.compilation_errors.is_empty()
    }

    pub fn push(&mut self, code: GraphCompilationErrorCode, message: impl Into<String>) {
        self.compilation_errors.push(GraphCompilationError::new(code, message));
    }

    /// Distinct codes present, in code order.
    pub fn codes(&self) -> BTreeSet<GraphCompilationErrorCode> {
        self.compilation_errors.iter().map(|e| e.code).collect()
    }

    pub(crate) fn single(code: GraphCompilationErrorCode, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(code, message);
        errors
    }
}

fn joined_messages(errors: &[GraphCompilationError]) -> String {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    messages.join("; ")
}
