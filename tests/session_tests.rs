#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use satilp::domain::coordinator::{CoordinatorConfig, RunCoordinator};
use satilp::domain::load::ProblemInput;
use satilp::domain::outcome::RunStatus;
use satilp::domain::registry::{CommandDialect, LibraryBackend, SolverDescriptor, SolverRegistry};
use satilp::domain::solve::solve_inputs;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn inputs() -> Vec<ProblemInput> {
    vec![
        ProblemInput::new("foo.cnf", "p cnf 2 2\n1 -2 0\n-1 2 0\n"),
        ProblemInput::new(
            "foo.lpt",
            "Maximize\n Obj: x1\nSubject To\n C1: - x1 + x2 >= 0\nBinary\n x1\n x2\nEnd\n",
        ),
        ProblemInput::new("bar.cnf", "p cnf 1 1\n0\n"),
        ProblemInput::new("garbage.cnf", "hello\n"),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_with_mixed_backends() {
    let dir = tempfile::tempdir().unwrap();
    let optimal = script(dir.path(), "cbc.sh", r#"echo "Result - Optimal solution found""#);
    let hanging = script(dir.path(), "glpsol.sh", "exec sleep 30");

    let mut registry = SolverRegistry::new();
    registry
        .register(SolverDescriptor::library("glpk", LibraryBackend::Glpk))
        .unwrap();
    registry
        .register(SolverDescriptor::executable("cbc", CommandDialect::Cbc, optimal))
        .unwrap();
    registry
        .register(SolverDescriptor::executable("glpsol", CommandDialect::Glpsol, hanging))
        .unwrap();
    registry
        .register(SolverDescriptor::executable(
            "highs",
            CommandDialect::Highs,
            dir.path().join("missing"),
        ))
        .unwrap();

    let coordinator = RunCoordinator::new(CoordinatorConfig {
        time_limit: Some(Duration::from_millis(500)),
        max_concurrent: 4,
    });

    let start = Instant::now();
    let result = solve_inputs(&coordinator, &inputs(), &registry).await;
    assert!(start.elapsed() < Duration::from_secs(20));

    let summary = &result.summary;
    // 3 loaded problems x 4 solvers + 1 load failure
    assert_eq!(summary.len(), 13);
    assert_eq!(summary.load_failures().count(), 1);
    assert_eq!(summary.count(RunStatus::Timeout), 2);
    assert_eq!(summary.count(RunStatus::Error), 2);
    assert_eq!(summary.count(RunStatus::Infeasible), 4);

    for outcome in summary.runs() {
        // an empty clause is infeasible whatever the backend
        if outcome.source == "bar.cnf" {
            assert_eq!(outcome.status, RunStatus::Infeasible);
            continue;
        }
        match outcome.solver.name.as_str() {
            "glpsol" => assert_eq!(outcome.status, RunStatus::Timeout),
            "highs" => assert_eq!(outcome.status, RunStatus::Error),
            "cbc" | "glpk" => assert_eq!(outcome.status, RunStatus::Feasible),
            other => panic!("unexpected solver {}", other),
        }
    }

    // foo.cnf and foo.lpt share one identity
    assert_eq!(result.series.identities().count(), 2);
    let foo_glpk = result
        .histogram
        .bars
        .iter()
        .find(|bar| bar.problem.as_str() == "foo" && bar.solver == "glpk")
        .unwrap();
    assert_eq!(foo_glpk.samples, 2);

    let report_path = dir.path().join("report.txt");
    result.persist(&report_path).unwrap();
    let report = fs::read_to_string(&report_path).unwrap();
    assert_eq!(report.lines().count(), 3 + 13);
    assert!(report.contains("foo (foo.lpt) | glpsol | Timeout"));
    assert!(report.contains("bar (bar.cnf) | highs | Infeasible"));
    assert!(report.contains("garbage (garbage.cnf) | - | LoadFailure | - |"));
}

#[tokio::test]
async fn test_registry_changes_apply_to_next_session() {
    let mut registry = SolverRegistry::new();
    registry
        .register(SolverDescriptor::library("glpk", LibraryBackend::Glpk))
        .unwrap();
    let coordinator = RunCoordinator::new(CoordinatorConfig {
        time_limit: None,
        max_concurrent: 1,
    });
    let batch = vec![ProblemInput::new("a.cnf", "p cnf 1 1\n1 0\n")];

    let first = solve_inputs(&coordinator, &batch, &registry).await;
    registry.disable("glpk").unwrap();
    let second = solve_inputs(&coordinator, &batch, &registry).await;

    assert_eq!(first.summary.runs().count(), 1);
    assert_eq!(second.summary.runs().count(), 0);
}
