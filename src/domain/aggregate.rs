use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;

use crate::domain::identity::ProblemIdentity;
use crate::domain::load::LoadFailure;
use crate::domain::outcome::{RunOutcome, RunStatus};

/// One line of the session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryEntry {
    Run(RunOutcome),
    LoadFailure(LoadFailure),
}

impl SummaryEntry {
    pub fn identity(&self) -> &ProblemIdentity {
        match self {
            SummaryEntry::Run(outcome) => &outcome.identity,
            SummaryEntry::LoadFailure(failure) => &failure.identity,
        }
    }
}

/// Append-only record of a solving session, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSummary {
    entries: Vec<SummaryEntry>,
}

impl ResultSummary {
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    pub fn runs(&self) -> impl Iterator<Item = &RunOutcome> {
        self.entries.iter().filter_map(|entry| match entry {
            SummaryEntry::Run(outcome) => Some(outcome),
            SummaryEntry::LoadFailure(_) => None,
        })
    }

    pub fn load_failures(&self) -> impl Iterator<Item = &LoadFailure> {
        self.entries.iter().filter_map(|entry| match entry {
            SummaryEntry::LoadFailure(failure) => Some(failure),
            SummaryEntry::Run(_) => None,
        })
    }

    pub fn count(&self, status: RunStatus) -> usize {
        self.runs().filter(|outcome| outcome.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Human-readable report: a header with counts, then one line per entry.
    pub fn render_report(&self) -> String {
        let problems: HashSet<&str> = self.entries.iter().map(|e| e.identity().as_str()).collect();

        let mut report = String::new();
        let _ = writeln!(report, "# SAT/ILP solving report");
        let _ = writeln!(
            report,
            "# problems: {}, runs: {}, load failures: {}",
            problems.len(),
            self.runs().count(),
            self.load_failures().count()
        );
        let _ = writeln!(
            report,
            "# feasible: {}, infeasible: {}, timeout: {}, error: {}",
            self.count(RunStatus::Feasible),
            self.count(RunStatus::Infeasible),
            self.count(RunStatus::Timeout),
            self.count(RunStatus::Error)
        );

        for entry in &self.entries {
            match entry {
                SummaryEntry::Run(outcome) => {
                    let _ = write!(
                        report,
                        "{} ({}) | {} | {} | {:.3}s",
                        outcome.identity,
                        outcome.source,
                        outcome.solver.name,
                        outcome.status,
                        outcome.elapsed.as_secs_f64()
                    );
                    if let Some(message) = &outcome.message {
                        let _ = write!(report, " | {}", message);
                    }
                    report.push('\n');
                }
                SummaryEntry::LoadFailure(failure) => {
                    let _ = writeln!(
                        report,
                        "{} ({}) | - | LoadFailure | - | {}",
                        failure.identity, failure.source, failure.reason
                    );
                }
            }
        }

        report
    }

    pub fn write_report(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.render_report())?;
        info!("Wrote report with {} entries to {}", self.len(), path.display());
        Ok(())
    }
}

/// Single writer of a [`ResultSummary`].
///
/// Each (source, solver) pair is accepted once; a second outcome for the same pair is
/// dropped.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    summary: ResultSummary,
    seen: HashSet<(String, String)>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        ResultAggregator::default()
    }

    /// Append a finalized outcome. Returns `false` if it was rejected.
    pub fn record(&mut self, outcome: RunOutcome) -> bool {
        if !outcome.status.is_terminal() {
            warn!(
                "Ignoring non-final outcome {} for {} on {}",
                outcome.status, outcome.source, outcome.solver.name
            );
            return false;
        }

        let key = (outcome.source.clone(), outcome.solver.name.clone());
        if !self.seen.insert(key) {
            warn!(
                "Ignoring duplicate outcome for {} on {}",
                outcome.source, outcome.solver.name
            );
            return false;
        }

        self.summary.entries.push(SummaryEntry::Run(outcome));
        true
    }

    pub fn record_load_failure(&mut self, failure: LoadFailure) {
        self.summary.entries.push(SummaryEntry::LoadFailure(failure));
    }

    pub fn summary(&self) -> &ResultSummary {
        &self.summary
    }

    pub fn into_summary(self) -> ResultSummary {
        self.summary
    }
}

/// Elapsed durations per problem identity and solver name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingSeries {
    series: BTreeMap<ProblemIdentity, BTreeMap<String, Vec<Duration>>>,
}

impl TimingSeries {
    /// Fold every run of the summary. Runs of `foo.cnf` and `foo.lpt` land under `foo`.
    pub fn from_summary(summary: &ResultSummary) -> Self {
        let mut series: BTreeMap<ProblemIdentity, BTreeMap<String, Vec<Duration>>> = BTreeMap::new();
        for outcome in summary.runs() {
            series
                .entry(outcome.identity.clone())
                .or_default()
                .entry(outcome.solver.name.clone())
                .or_default()
                .push(outcome.elapsed);
        }
        TimingSeries { series }
    }

    pub fn get(&self, identity: &ProblemIdentity, solver: &str) -> Option<&[Duration]> {
        self.series
            .get(identity)
            .and_then(|by_solver| by_solver.get(solver))
            .map(Vec::as_slice)
    }

    pub fn identities(&self) -> impl Iterator<Item = &ProblemIdentity> {
        self.series.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProblemIdentity, &BTreeMap<String, Vec<Duration>>)> {
        self.series.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBar {
    pub problem: ProblemIdentity,
    pub solver: String,
    pub mean_secs: f64,
    pub samples: usize,
}

/// Bars of the timing histogram, one per (problem, solver), ordered by problem then solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramData {
    pub bars: Vec<HistogramBar>,
}

impl HistogramData {
    pub fn from_series(series: &TimingSeries) -> Self {
        let bars = series
            .iter()
            .flat_map(|(problem, by_solver)| {
                by_solver.iter().map(move |(solver, durations)| {
                    let total: f64 = durations.iter().map(Duration::as_secs_f64).sum();
                    let mean = if durations.is_empty() {
                        0.0
                    } else {
                        total / durations.len() as f64
                    };
                    HistogramBar {
                        problem: problem.clone(),
                        solver: solver.clone(),
                        mean_secs: (mean * 100.0).round() / 100.0,
                        samples: durations.len(),
                    }
                })
            })
            .collect();

        HistogramData { bars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Origin;
    use crate::domain::registry::{LibraryBackend, SolverDescriptor};

    fn outcome(source: &str, solver: &str, status: RunStatus, millis: u64) -> RunOutcome {
        RunOutcome {
            identity: ProblemIdentity::from_file_name(source),
            source: source.to_string(),
            solver: SolverDescriptor::library(solver, LibraryBackend::Glpk),
            status,
            elapsed: Duration::from_millis(millis),
            message: None,
            assignment: None,
        }
    }

    fn failure(source: &str) -> LoadFailure {
        LoadFailure {
            identity: ProblemIdentity::from_file_name(source),
            source: source.to_string(),
            origin: Origin::Dimacs,
            reason: "line 1: missing header".to_string(),
        }
    }

    #[test]
    fn test_record_should_keep_completion_order() {
        let mut aggregator = ResultAggregator::new();
        aggregator.record(outcome("b.cnf", "glpk", RunStatus::Feasible, 5));
        aggregator.record(outcome("a.cnf", "glpk", RunStatus::Infeasible, 3));

        let sources: Vec<&str> = aggregator.summary().runs().map(|o| o.source.as_str()).collect();
        assert_eq!(sources, vec!["b.cnf", "a.cnf"]);
    }

    #[test]
    fn test_record_given_duplicate_pair_should_reject() {
        let mut aggregator = ResultAggregator::new();

        assert!(aggregator.record(outcome("a.cnf", "glpk", RunStatus::Feasible, 5)));
        assert!(!aggregator.record(outcome("a.cnf", "glpk", RunStatus::Error, 7)));
        assert!(aggregator.record(outcome("a.lpt", "glpk", RunStatus::Feasible, 7)));

        assert_eq!(aggregator.summary().len(), 2);
        assert_eq!(aggregator.summary().count(RunStatus::Error), 0);
    }

    #[test]
    fn test_record_given_non_final_status_should_reject() {
        let mut aggregator = ResultAggregator::new();
        assert!(!aggregator.record(outcome("a.cnf", "glpk", RunStatus::Running, 1)));
        assert!(aggregator.summary().is_empty());
    }

    #[test]
    fn test_timing_series_should_merge_by_identity() {
        let mut aggregator = ResultAggregator::new();
        aggregator.record(outcome("foo.cnf", "glpk", RunStatus::Feasible, 100));
        aggregator.record(outcome("foo.lpt", "glpk", RunStatus::Feasible, 300));
        aggregator.record(outcome("bar.cnf", "glpk", RunStatus::Timeout, 50));
        aggregator.record_load_failure(failure("baz.cnf"));

        let series = TimingSeries::from_summary(aggregator.summary());

        let foo = ProblemIdentity::from_file_name("foo");
        let bar = ProblemIdentity::from_file_name("bar");
        assert_eq!(
            series.get(&foo, "glpk"),
            Some(&[Duration::from_millis(100), Duration::from_millis(300)][..])
        );
        assert_eq!(series.get(&bar, "glpk"), Some(&[Duration::from_millis(50)][..]));
        assert_eq!(series.identities().count(), 2);
    }

    #[test]
    fn test_histogram_should_average_and_round() {
        let mut aggregator = ResultAggregator::new();
        aggregator.record(outcome("foo.cnf", "glpk", RunStatus::Feasible, 100));
        aggregator.record(outcome("foo.lpt", "glpk", RunStatus::Feasible, 333));
        aggregator.record(outcome("foo.cnf", "cbc", RunStatus::Feasible, 20));
        let summary_before = aggregator.summary().clone();

        let histogram = HistogramData::from_series(&TimingSeries::from_summary(aggregator.summary()));

        assert_eq!(histogram.bars.len(), 2);
        assert_eq!(histogram.bars[0].solver, "cbc");
        assert_eq!(histogram.bars[0].mean_secs, 0.02);
        assert_eq!(histogram.bars[1].solver, "glpk");
        assert_eq!(histogram.bars[1].mean_secs, 0.22);
        assert_eq!(histogram.bars[1].samples, 2);
        assert_eq!(aggregator.summary(), &summary_before);
    }

    #[test]
    fn test_render_report_should_list_every_entry() {
        let mut aggregator = ResultAggregator::new();
        aggregator.record(outcome("foo.cnf", "glpk", RunStatus::Feasible, 1500));
        let mut timed_out = outcome("bar.cnf", "cbc", RunStatus::Timeout, 2000);
        timed_out.message = Some("time limit expired after 2.00s".to_string());
        aggregator.record(timed_out);
        aggregator.record_load_failure(failure("baz.cnf"));

        let report = aggregator.summary().render_report();
        let lines: Vec<&str> = report.lines().collect();

        assert!(lines[1].contains("problems: 3, runs: 2, load failures: 1"));
        assert!(lines[2].contains("feasible: 1, infeasible: 0, timeout: 1, error: 0"));
        assert_eq!(lines[3], "foo (foo.cnf) | glpk | Feasible | 1.500s");
        assert_eq!(
            lines[4],
            "bar (bar.cnf) | cbc | Timeout | 2.000s | time limit expired after 2.00s"
        );
        assert_eq!(lines[5], "baz (baz.cnf) | - | LoadFailure | - | line 1: missing header");
    }

    #[test]
    fn test_write_report_should_persist_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let mut aggregator = ResultAggregator::new();
        aggregator.record(outcome("foo.cnf", "glpk", RunStatus::Error, 10));

        aggregator.summary().write_report(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, aggregator.summary().render_report());
        assert!(written.contains("foo (foo.cnf) | glpk | Error"));
    }
}
