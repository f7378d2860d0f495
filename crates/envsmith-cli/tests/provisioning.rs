//! Cross-engine integration tests: catalogue → resolution → storage
//! planning → ledger → export, without touching the network.

use envsmith_core::component::{ArtifactSpec, ComponentSpec, DependencyDecl, InstallPriority};
use envsmith_core::version::{Constraint, Version};
use envsmith_ledger::{
    OperationKind, OperationLedger, OperationProgress, ReportFormat, SqliteStore, SummaryPeriod,
    TimelineGranularity, export_records, import_json,
};
use envsmith_resolver::GraphAnalyzer;
use envsmith_storage::{
    DistributionPlanner, DriveInfo, DriveType, StaticDrives, StorageAnalyzer,
};
use std::sync::Arc;

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

fn component(name: &str, version: &str, size_mib: u64, priority: InstallPriority) -> ComponentSpec {
    let mut spec = ComponentSpec::named(name);
    spec.version = Some(Version::parse(version).unwrap());
    spec.priority = priority;
    spec.install_size = Some(size_mib * MIB);
    spec.artifact = Some(ArtifactSpec {
        url: format!("https://mirrors.example.com/{name}.tar.zst")
            .parse()
            .unwrap(),
        sha256: "6c76f7bd4b84eb68c26d2e8f48ea76f90b9bdf8836e27235a0ca4325f8fe4ce5".into(),
        mirrors: Vec::new(),
        download_size: Some(size_mib * MIB / 2),
    });
    spec
}

fn drive(mount: &str, free_gib: u64, system: bool) -> DriveInfo {
    DriveInfo {
        mount: mount.to_string(),
        total_bytes: free_gib * GIB * 2,
        available_bytes: free_gib * GIB,
        used_bytes: free_gib * GIB,
        filesystem: "ext4".to_string(),
        drive_type: DriveType::Fixed,
        is_system_drive: system,
        is_read_only: false,
        device: Some("/dev/nvme0n1".to_string()),
        performance_score: 0.0,
    }
}

#[test]
fn resolve_plan_and_record_full_flow() {
    // Catalogue: git is critical, nodejs depends on it.
    let git = component("git", "2.44.0", 100, InstallPriority::Critical);
    let mut nodejs = component("nodejs", "20.10.0", 200, InstallPriority::High);
    nodejs.dependencies.push(DependencyDecl::required(
        "git",
        Some(Constraint::parse(">=2.0.0").unwrap()),
    ));

    let analyzer = GraphAnalyzer::new();
    analyzer.register_components([git.clone(), nodejs.clone()]);
    let analysis = analyzer.analyze_components(&["nodejs".to_string()]);

    assert!(!analysis.has_critical_issues());
    assert_eq!(analysis.satisfaction_rate(), 100.0);
    assert!(
        analysis
            .graph
            .transitive_deps_of("nodejs")
            .contains("git")
    );

    // Storage planning over declared drives.
    let drives = vec![drive("/", 500, true), drive("/data", 1800, false)];
    let storage = StorageAnalyzer::new(Arc::new(StaticDrives::new(drives)));
    let ranked = storage.analyze_system_storage();
    assert_eq!(ranked.len(), 2);

    let requirements = storage.calculate_space_requirements(&[git.clone(), nodejs.clone()]);
    assert!(requirements.total_required_space > 0);
    assert!(requirements.recommended_free_space > requirements.total_required_space);

    let plan = DistributionPlanner::new().distribute(&[git, nodejs], &ranked);
    assert!(plan.distribution_feasible);
    assert_eq!(plan.plans.len(), 2);
    for placement in &plan.plans {
        let target = ranked.iter().find(|d| d.mount == placement.drive).unwrap();
        assert!(placement.space_required <= target.available_bytes);
    }

    // Every phase lands in the ledger.
    let ledger = OperationLedger::with_defaults(SqliteStore::in_memory().unwrap());
    for placement in &plan.plans {
        let mut progress = OperationProgress::begin(
            format!("install-{}", placement.component),
            OperationKind::Install,
            format!("install {}", placement.component),
        );
        progress.component_name = Some(placement.component.clone());
        progress.is_completed = true;
        ledger.track(&progress);
    }

    let history = ledger.get_history(usize::MAX, 0, None);
    assert_eq!(history.len(), 2);

    let summary = ledger.get_operation_summary(SummaryPeriod::Day, None);
    assert_eq!(summary.total_operations, 2);
    assert_eq!(summary.success_rate, 100.0);
}

#[test]
fn ledger_timeline_and_export_round_trip() {
    let ledger = OperationLedger::with_defaults(SqliteStore::in_memory().unwrap());

    for i in 0..4 {
        let mut progress = OperationProgress::begin(
            format!("op-{i}"),
            OperationKind::Download,
            format!("download artifact {i}"),
        );
        progress.component_name = Some("git".into());
        progress.is_completed = i % 2 == 0;
        if i % 2 == 1 {
            progress.errors.push("HTTP 503".into());
        }
        ledger.track(&progress);
    }

    // Timeline buckets respect their windows.
    let buckets = ledger.timeline(None, TimelineGranularity::Hour, None);
    assert!(!buckets.is_empty());
    for bucket in &buckets {
        for event in &bucket.events {
            assert!(bucket.start_time <= event.timestamp);
            assert!(event.timestamp < bucket.end_time);
        }
    }

    // JSON export of N records re-imports as N equal records.
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("history.json");
    let records = ledger.get_history(usize::MAX, 0, None);
    let result = export_records(&records, ReportFormat::Json, Some(&out));
    assert!(result.success);
    assert_eq!(result.records_exported, 4);

    let imported = import_json(&out).unwrap();
    assert_eq!(imported.len(), records.len());
    for (a, b) in imported.iter().zip(&records) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.status, b.status);
        assert_eq!(a.start_time, b.start_time);
    }
}

#[test]
fn storage_shortfall_produces_suggestions_not_errors() {
    let tiny = vec![drive("/small", 1, true)];
    let storage = StorageAnalyzer::new(Arc::new(StaticDrives::new(tiny.clone())));
    let ranked = storage.analyze_system_storage();

    let huge = component("monolith", "1.0.0", 50 * 1024, InstallPriority::Medium);
    let plan = DistributionPlanner::new().distribute(&[huge], &ranked);
    assert!(!plan.distribution_feasible);
    assert!(!plan.warnings.is_empty());

    let mut installed = component("old-sdk", "0.9.0", 40 * 1024, InstallPriority::Optional);
    installed.is_installed = true;
    let removals = DistributionPlanner::new().suggest_removals(&[installed], 10 * GIB);
    assert!(!removals.suggestions.is_empty());
    assert!(removals.recommended.contains(&"old-sdk".to_string()));
}
