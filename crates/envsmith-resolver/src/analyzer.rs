//! Graph construction and analysis.
//!
//! The analyzer builds a [`DependencyGraph`] from registered component
//! metadata, then runs cycle detection, conflict detection and resolution
//! planning over it. Conflicts and cycles are reported as part of the
//! result, never as errors.

use ahash::AHashMap;
use chrono::Utc;
use envsmith_core::component::{ComponentSpec, DependencyKind};
use envsmith_core::version::VersionScorer;
use parking_lot::RwLock;
use std::time::Instant;
use tracing::{debug, info};

use crate::graph::{
    CircularDependency, DependencyEdge, DependencyGraph, DependencyNode, Severity, VersionConflict,
};
use crate::types::{Complexity, DependencyAnalysisResult, ResolutionPath};

/// Minutes budgeted per component in a cycle break.
const CYCLE_MINUTES_PER_COMPONENT: u64 = 15;
/// Minutes budgeted per dependent in a version-conflict resolution.
const CONFLICT_MINUTES_PER_DEPENDENT: u64 = 10;

/// Builds and analyses dependency graphs from a component registry.
#[derive(Debug, Default)]
pub struct GraphAnalyzer {
    registry: RwLock<AHashMap<String, ComponentSpec>>,
    scorer: VersionScorer,
}

impl GraphAnalyzer {
    /// Create an analyzer with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register component metadata; later registrations replace earlier ones.
    pub fn register_component(&self, spec: ComponentSpec) {
        self.registry.write().insert(spec.name.clone(), spec);
    }

    /// Register a batch of components.
    pub fn register_components(&self, specs: impl IntoIterator<Item = ComponentSpec>) {
        let mut registry = self.registry.write();
        for spec in specs {
            registry.insert(spec.name.clone(), spec);
        }
    }

    /// Drop all registered metadata and memoised scores.
    pub fn clear_registry(&self) {
        self.registry.write().clear();
        self.scorer.clear_cache();
    }

    /// Number of registered components.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Build the dependency graph reachable from the requested components.
    ///
    /// Components missing from the registry become placeholder nodes of
    /// unknown type; their edges are marked unsatisfied when constrained.
    #[must_use]
    pub fn create_graph(&self, components: &[String]) -> DependencyGraph {
        let registry = self.registry.read();
        let mut graph = DependencyGraph::new();
        let mut pending: Vec<String> = components.to_vec();
        let mut visited = ahash::AHashSet::new();

        while let Some(name) = pending.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            let Some(spec) = registry.get(&name) else {
                graph.add_node(DependencyNode::placeholder(&name));
                continue;
            };

            graph.add_node(node_from_spec(spec));

            for dep in &spec.dependencies {
                let satisfied = dep.constraint.as_ref().is_none_or(|constraint| {
                    registry
                        .get(&dep.name)
                        .and_then(|target| target.effective_version())
                        .is_some_and(|version| constraint.satisfies(version))
                });

                graph.add_edge(DependencyEdge {
                    source: name.clone(),
                    target: dep.name.clone(),
                    kind: dep.kind,
                    constraint: dep.constraint.clone(),
                    satisfied,
                });
                pending.push(dep.name.clone());
            }
        }

        graph.compute_transitive_deps();
        graph.analysed_at = Utc::now();
        graph
    }

    /// Analyse an already-built graph in place.
    #[must_use]
    pub fn analyze_graph(&self, mut graph: DependencyGraph) -> DependencyAnalysisResult {
        let start = Instant::now();

        graph.cycles = graph.detect_cycles();
        graph.conflicts = self.detect_version_conflicts(&graph);

        let satisfied = graph.edges().iter().filter(|e| e.satisfied).count();
        let unsatisfied = graph.edge_count() - satisfied;
        let resolution_paths = self.generate_resolution_paths(&graph);

        let result = DependencyAnalysisResult {
            total_components: graph.node_count(),
            satisfied_dependencies: satisfied,
            unsatisfied_dependencies: unsatisfied,
            conflicts_found: graph.conflicts.len(),
            cycles_found: graph.cycles.len(),
            resolution_paths,
            analysis_duration: start.elapsed(),
            graph,
        };

        info!(
            components = result.total_components,
            conflicts = result.conflicts_found,
            cycles = result.cycles_found,
            elapsed_ms = result.analysis_duration.as_millis() as u64,
            "dependency analysis complete"
        );

        result
    }

    /// Build the graph for `components` and analyse it.
    #[must_use]
    pub fn analyze_components(&self, components: &[String]) -> DependencyAnalysisResult {
        let graph = self.create_graph(components);
        self.analyze_graph(graph)
    }

    /// Detect version conflicts: for each target, the constraints arriving
    /// over incoming edges must be pairwise satisfiable.
    fn detect_version_conflicts(&self, graph: &DependencyGraph) -> Vec<VersionConflict> {
        let mut conflicts = Vec::new();

        let names: Vec<String> = graph.node_names().map(str::to_string).collect();
        for target in names {
            let incoming: Vec<&DependencyEdge> = graph
                .incoming_edges(&target)
                .filter(|e| e.constraint.is_some())
                .collect();
            if incoming.len() < 2 {
                continue;
            }

            let mut compatible = true;
            'outer: for (i, a) in incoming.iter().enumerate() {
                for b in &incoming[i + 1..] {
                    let (Some(ca), Some(cb)) = (&a.constraint, &b.constraint) else {
                        continue;
                    };
                    if !ca.intersects(cb) {
                        compatible = false;
                        break 'outer;
                    }
                }
            }
            if compatible {
                continue;
            }

            let required_versions: Vec<String> = incoming
                .iter()
                .filter_map(|e| e.constraint.as_ref().map(ToString::to_string))
                .collect();
            let mut dependents: Vec<String> =
                incoming.iter().map(|e| e.source.clone()).collect();
            dependents.sort();
            dependents.dedup();

            let severity = if incoming.iter().any(|e| e.kind == DependencyKind::Runtime) {
                Severity::High
            } else if dependents.len() > 2 {
                Severity::Medium
            } else {
                Severity::Low
            };

            let suggestion = self.scorer.suggest_resolution(&required_versions, None);
            let suggested_resolution = suggestion
                .recommended
                .map(|v| format!("pin {target} to {v}"))
                .or_else(|| suggestion.actions.first().cloned());

            debug!(component = %target, dependents = dependents.len(), "version conflict");

            conflicts.push(VersionConflict {
                component: target.clone(),
                required_versions,
                installed_version: graph
                    .node(&target)
                    .and_then(|n| n.installed_version.clone()),
                conflicting_dependents: dependents,
                severity,
                suggested_resolution,
            });
        }

        conflicts.sort_by(|a, b| a.component.cmp(&b.component));
        conflicts
    }

    /// Produce ordered resolution paths: cycle breaks first, then
    /// conflict resolutions.
    fn generate_resolution_paths(&self, graph: &DependencyGraph) -> Vec<ResolutionPath> {
        let issue_count = graph.cycles.len() + graph.conflicts.len();
        if issue_count == 0 {
            return Vec::new();
        }

        let complexity = if issue_count <= 2 {
            Complexity::Medium
        } else {
            Complexity::High
        };
        let success_probability = success_probability(graph);

        let mut paths = Vec::with_capacity(issue_count);

        for cycle in &graph.cycles {
            paths.push(ResolutionPath {
                steps: vec![
                    format!("break circular dependency: {}", cycle.description()),
                    format!(
                        "extract a shared interface or make one of {} edges optional",
                        cycle.length
                    ),
                ],
                estimated_minutes: CYCLE_MINUTES_PER_COMPONENT * cycle.length as u64,
                complexity,
                success_probability,
                required_actions: vec![format!(
                    "review the dependency declarations of {}",
                    cycle.cycle_path.join(", ")
                )],
            });
        }

        for conflict in &graph.conflicts {
            let mut steps = vec![format!(
                "resolve version conflict on '{}' required as [{}] by {}",
                conflict.component,
                conflict.required_versions.join(", "),
                conflict.conflicting_dependents.join(", ")
            )];
            if let Some(ref suggestion) = conflict.suggested_resolution {
                steps.push(suggestion.clone());
            }

            paths.push(ResolutionPath {
                steps,
                estimated_minutes: CONFLICT_MINUTES_PER_DEPENDENT
                    * conflict.conflicting_dependents.len() as u64,
                complexity,
                success_probability,
                required_actions: vec![format!(
                    "align the constraints declared by {}",
                    conflict.conflicting_dependents.join(", ")
                )],
            });
        }

        paths
    }
}

fn node_from_spec(spec: &ComponentSpec) -> DependencyNode {
    DependencyNode {
        name: spec.name.clone(),
        declared_version: spec.version.clone(),
        installed_version: spec.installed_version.clone(),
        required_version: None,
        component_type: spec.component_type,
        is_installed: spec.is_installed,
        install_path: spec.install_path.clone(),
        metadata: spec.metadata.clone(),
    }
}

/// Success probability: start at 0.9, subtract 0.1 per conflict and 0.15
/// per cycle, floored at 0.1.
fn success_probability(graph: &DependencyGraph) -> f64 {
    let penalty = 0.1 * graph.conflicts.len() as f64 + 0.15 * graph.cycles.len() as f64;
    (0.9 - penalty).max(0.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsmith_core::component::{ComponentType, DependencyDecl};
    use envsmith_core::version::{Constraint, Version};
    use pretty_assertions::assert_eq;

    fn spec(
        name: &str,
        version: &str,
        deps: Vec<(&str, &str, DependencyKind)>,
    ) -> ComponentSpec {
        let mut spec = ComponentSpec::named(name);
        spec.version = Some(Version::parse(version).unwrap());
        spec.component_type = ComponentType::Tool;
        spec.dependencies = deps
            .into_iter()
            .map(|(dep, constraint, kind)| DependencyDecl {
                name: dep.to_string(),
                constraint: Some(Constraint::parse(constraint).unwrap()),
                kind,
            })
            .collect();
        spec
    }

    #[test]
    fn unknown_component_becomes_placeholder() {
        let analyzer = GraphAnalyzer::new();
        let graph = analyzer.create_graph(&["ghost".to_string()]);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            graph.node("ghost").unwrap().component_type,
            ComponentType::Unknown
        );
    }

    #[test]
    fn satisfied_edges_checked_against_target_version() {
        let analyzer = GraphAnalyzer::new();
        analyzer.register_component(spec(
            "app",
            "1.0.0",
            vec![("lib", "^2.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec("lib", "2.3.1", vec![]));

        let result = analyzer.analyze_components(&["app".to_string()]);
        assert_eq!(result.satisfied_dependencies, 1);
        assert_eq!(result.unsatisfied_dependencies, 0);
        assert_eq!(result.satisfaction_rate(), 100.0);
    }

    #[test]
    fn missing_metadata_marks_edge_unsatisfied() {
        let analyzer = GraphAnalyzer::new();
        analyzer.register_component(spec(
            "app",
            "1.0.0",
            vec![("ghost", "^1.0.0", DependencyKind::Required)],
        ));

        let result = analyzer.analyze_components(&["app".to_string()]);
        assert_eq!(result.satisfied_dependencies, 0);
        assert_eq!(result.unsatisfied_dependencies, 1);
    }

    #[test]
    fn conflicting_exact_pins_are_reported() {
        // S2: app-a wants ==1.0.0, app-b wants ==2.0.0, shared-lib at 1.5.0.
        let analyzer = GraphAnalyzer::new();
        analyzer.register_component(spec(
            "app-a",
            "1.0.0",
            vec![("shared-lib", "==1.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec(
            "app-b",
            "1.0.0",
            vec![("shared-lib", "==2.0.0", DependencyKind::Required)],
        ));
        let mut shared = spec("shared-lib", "1.5.0", vec![]);
        shared.installed_version = Some(Version::new(1, 5, 0));
        shared.is_installed = true;
        analyzer.register_component(shared);

        let result =
            analyzer.analyze_components(&["app-a".to_string(), "app-b".to_string()]);

        assert!(result.conflicts_found >= 1);
        assert!(result.has_critical_issues());

        let conflict = &result.graph.conflicts[0];
        assert_eq!(conflict.component, "shared-lib");
        assert_eq!(conflict.installed_version, Some(Version::new(1, 5, 0)));
        assert_eq!(
            conflict.conflicting_dependents,
            vec!["app-a".to_string(), "app-b".to_string()]
        );
        assert!(conflict.required_versions.contains(&"==1.0.0".to_string()));
        assert!(conflict.required_versions.contains(&"==2.0.0".to_string()));
    }

    #[test]
    fn runtime_edge_escalates_conflict_severity() {
        let analyzer = GraphAnalyzer::new();
        analyzer.register_component(spec(
            "app-a",
            "1.0.0",
            vec![("shared", "==1.0.0", DependencyKind::Runtime)],
        ));
        analyzer.register_component(spec(
            "app-b",
            "1.0.0",
            vec![("shared", "==2.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec("shared", "1.0.0", vec![]));

        let result =
            analyzer.analyze_components(&["app-a".to_string(), "app-b".to_string()]);
        assert_eq!(result.graph.conflicts[0].severity, Severity::High);
    }

    #[test]
    fn compatible_constraints_do_not_conflict() {
        let analyzer = GraphAnalyzer::new();
        analyzer.register_component(spec(
            "app-a",
            "1.0.0",
            vec![("shared", ">=1.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec(
            "app-b",
            "1.0.0",
            vec![("shared", "<=1.5.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec("shared", "1.2.0", vec![]));

        let result =
            analyzer.analyze_components(&["app-a".to_string(), "app-b".to_string()]);
        assert_eq!(result.conflicts_found, 0);
    }

    #[test]
    fn three_cycle_detected_with_plan() {
        // S3: A -> B -> C -> A.
        let analyzer = GraphAnalyzer::new();
        analyzer.register_component(spec(
            "a",
            "1.0.0",
            vec![("b", ">=1.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec(
            "b",
            "1.0.0",
            vec![("c", ">=1.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec(
            "c",
            "1.0.0",
            vec![("a", ">=1.0.0", DependencyKind::Required)],
        ));

        let result = analyzer.analyze_components(&["a".to_string()]);
        assert_eq!(result.cycles_found, 1);

        let cycle = &result.graph.cycles[0];
        assert_eq!(cycle.length, 3);
        assert_eq!(cycle.severity, Severity::High);

        // Cycle breaks come first and carry the 15-minute-per-component estimate.
        let path = &result.resolution_paths[0];
        assert_eq!(path.estimated_minutes, 45);
        assert!(path.steps[0].contains("circular"));
    }

    #[test]
    fn clean_graph_has_low_complexity_and_no_paths() {
        let analyzer = GraphAnalyzer::new();
        analyzer.register_component(spec(
            "app",
            "1.0.0",
            vec![("lib", "^1.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec("lib", "1.4.0", vec![]));

        let result = analyzer.analyze_components(&["app".to_string()]);
        assert!(result.resolution_paths.is_empty());
        assert!(!result.has_critical_issues());
    }

    #[test]
    fn success_probability_floors_at_one_tenth() {
        let analyzer = GraphAnalyzer::new();
        // Six exact-pin conflicts push the probability to the floor.
        for i in 0..6 {
            analyzer.register_component(spec(
                &format!("x{i}"),
                "1.0.0",
                vec![(&format!("t{i}"), "==1.0.0", DependencyKind::Required)],
            ));
            analyzer.register_component(spec(
                &format!("y{i}"),
                "1.0.0",
                vec![(&format!("t{i}"), "==2.0.0", DependencyKind::Required)],
            ));
            analyzer.register_component(spec(&format!("t{i}"), "1.0.0", vec![]));
        }

        let requested: Vec<String> = (0..6)
            .flat_map(|i| [format!("x{i}"), format!("y{i}")])
            .collect();
        let result = analyzer.analyze_components(&requested);
        assert_eq!(result.conflicts_found, 6);

        let path = &result.resolution_paths[0];
        assert!(path.success_probability >= 0.1);
        assert!(path.success_probability <= 0.3 + f64::EPSILON);
        assert_eq!(path.complexity, Complexity::High);
    }

    #[test]
    fn transitive_closure_invariant_holds() {
        let analyzer = GraphAnalyzer::new();
        analyzer.register_component(spec(
            "root",
            "1.0.0",
            vec![("mid", ">=1.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec(
            "mid",
            "1.0.0",
            vec![("leaf", ">=1.0.0", DependencyKind::Required)],
        ));
        analyzer.register_component(spec("leaf", "1.0.0", vec![]));

        let result = analyzer.analyze_components(&["root".to_string()]);
        let graph = &result.graph;

        for name in ["root", "mid", "leaf"] {
            let direct = graph.direct_deps(name);
            let transitive = graph.transitive_deps_of(name);
            assert!(direct.is_subset(&transitive) || direct.is_empty());
            assert!(!transitive.contains(name));
        }
        assert!(graph.transitive_deps_of("root").contains("leaf"));
    }
}
