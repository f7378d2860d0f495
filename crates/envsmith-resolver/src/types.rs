//! Analysis result types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::graph::DependencyGraph;

/// Overall complexity of a resolution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Nothing to resolve.
    Low,
    /// A couple of issues.
    Medium,
    /// Several interacting issues.
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

/// One path towards resolving the graph's issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionPath {
    /// Ordered, human-readable resolution steps.
    pub steps: Vec<String>,
    /// Estimated hands-on time in minutes.
    pub estimated_minutes: u64,
    /// Plan complexity.
    pub complexity: Complexity,
    /// Probability the plan succeeds without surprises.
    pub success_probability: f64,
    /// Concrete actions the caller must take.
    pub required_actions: Vec<String>,
}

/// Complete result of a dependency analysis run.
#[derive(Debug)]
pub struct DependencyAnalysisResult {
    /// The analysed graph, including conflicts and cycles.
    pub graph: DependencyGraph,
    /// Number of components in the graph.
    pub total_components: usize,
    /// Edges whose constraint holds.
    pub satisfied_dependencies: usize,
    /// Edges whose constraint does not hold (or cannot be checked).
    pub unsatisfied_dependencies: usize,
    /// Number of version conflicts found.
    pub conflicts_found: usize,
    /// Number of circular dependencies found.
    pub cycles_found: usize,
    /// Ordered resolution paths (cycle breaks first).
    pub resolution_paths: Vec<ResolutionPath>,
    /// Wall-clock analysis time.
    pub analysis_duration: Duration,
}

impl DependencyAnalysisResult {
    /// Percentage of satisfied dependency edges.
    #[must_use]
    pub fn satisfaction_rate(&self) -> f64 {
        let total = self.satisfied_dependencies + self.unsatisfied_dependencies;
        if total == 0 {
            return 100.0;
        }
        (self.satisfied_dependencies as f64 / total as f64) * 100.0
    }

    /// Whether issues exist that block installation.
    #[must_use]
    pub const fn has_critical_issues(&self) -> bool {
        self.conflicts_found > 0 || self.cycles_found > 0
    }
}
