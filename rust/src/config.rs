//! Configuration types for the compilation pipeline.

use chrono::NaiveDate;
#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Configuration for a graph compilation run.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilationConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub verbosity: u8,
    /// Remove redundant dummy activities before timing the network.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub simplify_graph: bool,
    /// Feed resource ordering back into the network and re-time it.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub level_resources: bool,
    /// Calendar anchor for dated output (time unit 0).
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub project_start: Option<NaiveDate>,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            simplify_graph: true,
            level_resources: true,
            project_start: None,
        }
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl CompilationConfig {
    #[new]
    #[pyo3(signature = (
        verbosity=None,
        simplify_graph=None,
        level_resources=None,
        project_start=None
    ))]
    fn py_new(
        verbosity: Option<u8>,
        simplify_graph: Option<bool>,
        level_resources: Option<bool>,
        project_start: Option<NaiveDate>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            simplify_graph: simplify_graph.unwrap_or(defaults.simplify_graph),
            level_resources: level_resources.unwrap_or(defaults.level_resources),
            project_start,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "CompilationConfig(verbosity={}, simplify_graph={}, level_resources={}, project_start={:?})",
            self.verbosity, self.simplify_graph, self.level_resources, self.project_start
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CompilationConfig::default();
        assert_eq!(config.verbosity, 0);
        assert!(config.simplify_graph);
        assert!(config.level_resources);
        assert!(config.project_start.is_none());
    }
}
