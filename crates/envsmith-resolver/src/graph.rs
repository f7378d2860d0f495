//! Arena-backed dependency graph.
//!
//! The graph is intentionally cyclic at the domain level, so nodes live in
//! a petgraph arena and edges reference endpoints by index; names cross
//! the API boundary, indices never do. Node identity is
//! `(name, declared_version)`.

use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Utc};
use envsmith_core::component::{ComponentType, DependencyKind, MetadataValue};
use envsmith_core::version::{Constraint, Version};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Issue severity, lowest first so `max` picks the worst.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or easily resolved.
    Low,
    /// Needs attention before installing.
    Medium,
    /// Blocks installation.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

/// A component in the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    /// Component name.
    pub name: String,
    /// Declared (target) version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_version: Option<Version>,
    /// Version currently installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<Version>,
    /// Constraint the requesting side asks for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_version: Option<Constraint>,
    /// Kind of component.
    #[serde(default)]
    pub component_type: ComponentType,
    /// Whether the component is installed.
    #[serde(default)]
    pub is_installed: bool,
    /// Installation path, when installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl DependencyNode {
    /// Placeholder node for a component the catalogue does not know.
    #[must_use]
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_version: None,
            installed_version: None,
            required_version: None,
            component_type: ComponentType::Unknown,
            is_installed: false,
            install_path: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Version dependency constraints should be evaluated against.
    #[must_use]
    pub const fn effective_version(&self) -> Option<&Version> {
        match self.installed_version {
            Some(ref v) => Some(v),
            None => self.declared_version.as_ref(),
        }
    }
}

/// A dependency relationship between two components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Component that depends on `target`.
    pub source: String,
    /// Component being depended upon.
    pub target: String,
    /// Relationship kind.
    pub kind: DependencyKind,
    /// Version constraint, when one is declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    /// Whether the constraint holds against the target's effective version.
    pub satisfied: bool,
}

/// A version conflict on one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConflict {
    /// Component the conflicting constraints target.
    pub component: String,
    /// The conflicting constraints, as declared.
    pub required_versions: Vec<String>,
    /// Installed version of the component, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<Version>,
    /// Components declaring the conflicting constraints.
    pub conflicting_dependents: Vec<String>,
    /// How severe the conflict is.
    pub severity: Severity,
    /// Suggested way out, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_resolution: Option<String>,
}

/// A circular dependency cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularDependency {
    /// The cycle, each component once, in traversal order.
    pub cycle_path: Vec<String>,
    /// Number of components in the cycle.
    pub length: usize,
    /// How severe the cycle is: short cycles are the hardest to break.
    pub severity: Severity,
}

impl CircularDependency {
    /// Build from a path, deriving length and severity.
    #[must_use]
    pub fn from_path(cycle_path: Vec<String>) -> Self {
        let length = cycle_path.len();
        let severity = if length <= 3 {
            Severity::High
        } else if length <= 5 {
            Severity::Medium
        } else {
            Severity::Low
        };
        Self {
            cycle_path,
            length,
            severity,
        }
    }

    /// Human-readable `a -> b -> a` description.
    #[must_use]
    pub fn description(&self) -> String {
        let mut parts: Vec<&str> = self.cycle_path.iter().map(String::as_str).collect();
        if let Some(first) = self.cycle_path.first() {
            parts.push(first);
        }
        parts.join(" -> ")
    }
}

/// Dependency graph over an arena of nodes.
#[derive(Debug)]
pub struct DependencyGraph {
    arena: DiGraph<String, ()>,
    index: AHashMap<String, NodeIndex>,
    nodes: AHashMap<String, DependencyNode>,
    edges: Vec<DependencyEdge>,
    /// Transitive closure of direct dependencies, minus the node itself.
    pub transitive_deps: AHashMap<String, AHashSet<String>>,
    /// Version conflicts found by analysis.
    pub conflicts: Vec<VersionConflict>,
    /// Cycles found by analysis.
    pub cycles: Vec<CircularDependency>,
    /// When the graph was analysed.
    pub analysed_at: DateTime<Utc>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            arena: DiGraph::new(),
            index: AHashMap::new(),
            nodes: AHashMap::new(),
            edges: Vec::new(),
            transitive_deps: AHashMap::new(),
            conflicts: Vec::new(),
            cycles: Vec::new(),
            analysed_at: Utc::now(),
        }
    }

    /// Add a node, replacing any placeholder with the same name.
    pub fn add_node(&mut self, node: DependencyNode) {
        let name = node.name.clone();
        if !self.index.contains_key(&name) {
            let idx = self.arena.add_node(name.clone());
            self.index.insert(name.clone(), idx);
        }
        self.nodes.insert(name, node);
    }

    /// Ensure a node exists, adding a placeholder if needed.
    pub fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        self.add_node(DependencyNode::placeholder(name));
        self.index[name]
    }

    /// Add an edge, creating placeholder endpoints as needed.
    pub fn add_edge(&mut self, edge: DependencyEdge) {
        let source = self.ensure_node(&edge.source);
        let target = self.ensure_node(&edge.target);
        if !self.arena.contains_edge(source, target) {
            self.arena.add_edge(source, target, ());
        }
        self.edges.push(edge);
    }

    /// Look up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&DependencyNode> {
        self.nodes.get(name)
    }

    /// Mutable node lookup.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut DependencyNode> {
        self.nodes.get_mut(name)
    }

    /// All node names.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// All edges, in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Edges targeting `name`.
    pub fn incoming_edges(&self, name: &str) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(move |e| e.target == name)
    }

    /// Direct dependencies of `name`.
    #[must_use]
    pub fn direct_deps(&self, name: &str) -> AHashSet<String> {
        self.index.get(name).map_or_else(AHashSet::new, |&idx| {
            self.arena
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|n| self.arena[n].clone())
                .collect()
        })
    }

    /// Components that directly depend on `name`.
    #[must_use]
    pub fn dependents(&self, name: &str) -> AHashSet<String> {
        self.index.get(name).map_or_else(AHashSet::new, |&idx| {
            self.arena
                .neighbors_directed(idx, Direction::Incoming)
                .map(|n| self.arena[n].clone())
                .collect()
        })
    }

    /// Transitive dependencies of `name` (empty when unknown).
    #[must_use]
    pub fn transitive_deps_of(&self, name: &str) -> AHashSet<String> {
        self.transitive_deps.get(name).cloned().unwrap_or_default()
    }

    /// Whether analysis found any conflicts or cycles.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty() || !self.cycles.is_empty()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether a topological order over direct dependencies exists.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        petgraph::algo::toposort(&self.arena, None).is_ok()
    }

    /// Compute the transitive closure over direct dependencies.
    ///
    /// One depth-first reachability sweep per node; a per-root visited
    /// set keeps cycles from looping and keeps the closure exact even
    /// when the graph is cyclic.
    pub fn compute_transitive_deps(&mut self) {
        let mut closure: AHashMap<String, AHashSet<String>> = AHashMap::new();

        for name in self.nodes.keys() {
            let mut reachable: AHashSet<String> = AHashSet::new();
            let mut stack: Vec<String> = self.direct_deps(name).into_iter().collect();

            while let Some(next) = stack.pop() {
                if reachable.insert(next.clone()) {
                    stack.extend(self.direct_deps(&next));
                }
            }

            // The closure is reflexive-transitive minus the node itself.
            reachable.remove(name);
            closure.insert(name.clone(), reachable);
        }

        self.transitive_deps = closure;
    }

    /// Detect all cycles via colour-marking depth-first search.
    ///
    /// Self-loops are reported as length-1 cycles with high severity.
    /// Each cycle is reported once regardless of entry point.
    #[must_use]
    pub fn detect_cycles(&self) -> Vec<CircularDependency> {
        #[derive(Clone, Copy, PartialEq)]
        enum Colour {
            White,
            Grey,
            Black,
        }

        let mut colour = vec![Colour::White; self.arena.node_count()];
        let mut path: Vec<NodeIndex> = Vec::new();
        let mut cycles = Vec::new();
        let mut seen: AHashSet<Vec<String>> = AHashSet::new();

        fn visit(
            graph: &DiGraph<String, ()>,
            node: NodeIndex,
            colour: &mut [Colour],
            path: &mut Vec<NodeIndex>,
            cycles: &mut Vec<CircularDependency>,
            seen: &mut AHashSet<Vec<String>>,
        ) {
            colour[node.index()] = Colour::Grey;
            path.push(node);

            for next in graph.neighbors_directed(node, Direction::Outgoing) {
                match colour[next.index()] {
                    Colour::Grey => {
                        // The slice of the current path from `next` is a cycle.
                        let pos = path.iter().position(|&n| n == next).unwrap_or(0);
                        let cycle: Vec<String> =
                            path[pos..].iter().map(|&n| graph[n].clone()).collect();

                        let mut signature = cycle.clone();
                        signature.sort();
                        if seen.insert(signature) {
                            cycles.push(CircularDependency::from_path(cycle));
                        }
                    }
                    Colour::White => {
                        visit(graph, next, colour, path, cycles, seen);
                    }
                    Colour::Black => {}
                }
            }

            path.pop();
            colour[node.index()] = Colour::Black;
        }

        for node in self.arena.node_indices() {
            if colour[node.index()] == Colour::White {
                visit(
                    &self.arena,
                    node,
                    &mut colour,
                    &mut path,
                    &mut cycles,
                    &mut seen,
                );
            }
        }

        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn edge(source: &str, target: &str) -> DependencyEdge {
        DependencyEdge {
            source: source.to_string(),
            target: target.to_string(),
            kind: DependencyKind::Required,
            constraint: None,
            satisfied: true,
        }
    }

    #[test]
    fn add_edge_creates_placeholder_endpoints() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge("a", "b"));

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node("b").unwrap().component_type, ComponentType::Unknown);
        assert!(graph.direct_deps("a").contains("b"));
    }

    #[test]
    fn transitive_closure_excludes_self() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge("a", "b"));
        graph.add_edge(edge("b", "c"));
        graph.compute_transitive_deps();

        let a_deps = graph.transitive_deps_of("a");
        assert!(a_deps.contains("b"));
        assert!(a_deps.contains("c"));
        assert!(!a_deps.contains("a"));
        // Closure is a superset of direct dependencies.
        assert!(graph.direct_deps("a").is_subset(&a_deps));
    }

    #[test]
    fn transitive_closure_handles_cycles() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge("a", "b"));
        graph.add_edge(edge("b", "a"));
        graph.compute_transitive_deps();

        assert!(graph.transitive_deps_of("a").contains("b"));
        assert!(!graph.transitive_deps_of("a").contains("a"));
    }

    #[test]
    fn transitive_closure_is_complete_inside_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge("a", "b"));
        graph.add_edge(edge("b", "c"));
        graph.add_edge(edge("c", "a"));
        graph.compute_transitive_deps();

        // Every member reaches both others, never itself.
        for name in ["a", "b", "c"] {
            let deps = graph.transitive_deps_of(name);
            assert_eq!(deps.len(), 2, "{name}: {deps:?}");
            assert!(!deps.contains(name));
        }
    }

    #[test]
    fn detect_three_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge("a", "b"));
        graph.add_edge(edge("b", "c"));
        graph.add_edge(edge("c", "a"));

        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].length, 3);
        assert_eq!(cycles[0].severity, Severity::High);

        let members: AHashSet<&str> =
            cycles[0].cycle_path.iter().map(String::as_str).collect();
        assert_eq!(members, ["a", "b", "c"].into_iter().collect());
        assert!(!graph.is_acyclic());
    }

    #[test]
    fn detect_self_loop() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge("a", "a"));

        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].length, 1);
        assert_eq!(cycles[0].severity, Severity::High);
    }

    #[test]
    fn acyclic_graph_reports_no_cycles() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge("a", "b"));
        graph.add_edge(edge("a", "c"));
        graph.add_edge(edge("b", "c"));

        assert!(graph.detect_cycles().is_empty());
        assert!(graph.is_acyclic());
    }

    #[test]
    fn long_cycle_severity_decreases() {
        let mut graph = DependencyGraph::new();
        let names = ["a", "b", "c", "d", "e", "f"];
        for window in names.windows(2) {
            graph.add_edge(edge(window[0], window[1]));
        }
        graph.add_edge(edge("f", "a"));

        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].length, 6);
        assert_eq!(cycles[0].severity, Severity::Low);
    }

    #[test]
    fn cycle_description_closes_the_loop() {
        let cycle = CircularDependency::from_path(vec!["a".into(), "b".into()]);
        assert_eq!(cycle.description(), "a -> b -> a");
    }

    #[test]
    fn dependents_are_incoming_neighbours() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge("app-a", "shared"));
        graph.add_edge(edge("app-b", "shared"));

        let dependents = graph.dependents("shared");
        assert_eq!(dependents.len(), 2);
        assert!(dependents.contains("app-a"));
        assert!(dependents.contains("app-b"));
    }
}
