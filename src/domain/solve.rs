use std::collections::HashSet;
use std::io;
use std::path::Path;

use log::{info, warn};

use crate::domain::aggregate::{HistogramData, ResultAggregator, ResultSummary, TimingSeries};
use crate::domain::coordinator::{RunCoordinator, SolverBinding};
use crate::domain::load::{load_batch, LoadFailure, LoadedProblem, ProblemInput};
use crate::domain::registry::{SolverDescriptor, SolverRegistry};

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub summary: ResultSummary,
    pub series: TimingSeries,
    pub histogram: HistogramData,
}

impl SessionResult {
    /// Write the textual report of this session.
    pub fn persist(&self, path: &Path) -> io::Result<()> {
        self.summary.write_report(path)
    }
}

/// Solve a batch whose problems are already loaded.
///
/// Load failures enter the summary first, so every submitted problem is accounted for;
/// the remaining problems are run against `solvers`. A source name seen earlier in the
/// batch is reported as a load failure and not run.
pub async fn solve_loaded(
    coordinator: &RunCoordinator,
    loaded: Vec<Result<LoadedProblem, LoadFailure>>,
    solvers: Vec<SolverDescriptor>,
) -> SessionResult {
    let mut aggregator = ResultAggregator::new();
    let mut problems = Vec::with_capacity(loaded.len());
    let mut sources: HashSet<String> = HashSet::with_capacity(loaded.len());

    for result in loaded {
        let (identity, source, origin) = match &result {
            Ok(p) => (&p.identity, &p.source, p.origin),
            Err(f) => (&f.identity, &f.source, f.origin),
        };
        if !sources.insert(source.clone()) {
            warn!("Input {} appears more than once in the batch", source);
            aggregator.record_load_failure(LoadFailure {
                identity: identity.clone(),
                source: source.clone(),
                origin,
                reason: "duplicate input name".to_string(),
            });
            continue;
        }

        match result {
            Ok(problem) => problems.push(problem),
            Err(failure) => aggregator.record_load_failure(failure),
        }
    }

    let bindings = solvers.into_iter().map(SolverBinding::from_descriptor).collect();
    coordinator.run_with(&problems, bindings, &mut aggregator).await;

    let summary = aggregator.into_summary();
    let series = TimingSeries::from_summary(&summary);
    let histogram = HistogramData::from_series(&series);
    info!(
        "Session summary: {} entries over {} problems",
        summary.len(),
        series.identities().count()
    );

    SessionResult {
        summary,
        series,
        histogram,
    }
}

/// Load `inputs` and solve them with the solvers enabled in `registry` right now.
pub async fn solve_inputs(
    coordinator: &RunCoordinator,
    inputs: &[ProblemInput],
    registry: &SolverRegistry,
) -> SessionResult {
    solve_loaded(coordinator, load_batch(inputs), registry.enabled()).await
}
