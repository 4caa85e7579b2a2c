use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::domain::aggregate::ResultAggregator;
use crate::domain::load::LoadedProblem;
use crate::domain::outcome::{Completion, PendingRun, ProgressEvent, RunOutcome, RunStatus};
use crate::domain::program::LinearProgram;
use crate::domain::registry::{SolverDescriptor, SolverRegistry};
use crate::domain::solver::{SolveOptions, Solver, Verdict};
use crate::domain::solver_factory::create_solver;
use crate::error::SolverError;

/// Progress events buffered per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Per-run limit, measured from dispatch.
    pub time_limit: Option<Duration>,
    /// Runs allowed to be in the `Running` state at once.
    pub max_concurrent: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            time_limit: None,
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// A descriptor paired with its backend, or with the reason no backend could be created.
#[derive(Clone)]
pub struct SolverBinding {
    pub descriptor: SolverDescriptor,
    backend: Result<Arc<dyn Solver>, String>,
}

impl SolverBinding {
    pub fn new(descriptor: SolverDescriptor, solver: Arc<dyn Solver>) -> Self {
        SolverBinding {
            descriptor,
            backend: Ok(solver),
        }
    }

    /// Build the backend named by the descriptor's handle. A failure here is reported on
    /// every run of this solver instead of aborting the session.
    pub fn from_descriptor(descriptor: SolverDescriptor) -> Self {
        let backend = create_solver(&descriptor).map_err(|e| {
            warn!("Solver {} cannot be created: {}", descriptor.name, e);
            e.to_string()
        });
        SolverBinding { descriptor, backend }
    }
}

/// Runs every (problem, solver) pair of a session.
///
/// Each run executes as its own task; the solver call itself happens on a blocking thread
/// under the run's timer. When the timer fires the run's cancellation token is triggered and
/// the run is finalized as `Timeout` without waiting for the backend to stop. Finalized
/// outcomes flow through one channel to the caller's aggregator, which is the only writer
/// of the summary.
pub struct RunCoordinator {
    config: CoordinatorConfig,
    events: broadcast::Sender<ProgressEvent>,
}

impl RunCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        RunCoordinator { config, events }
    }

    /// Same subscribers, different per-run limit.
    pub fn with_time_limit(&self, time_limit: Option<Duration>) -> Self {
        RunCoordinator {
            config: CoordinatorConfig {
                time_limit,
                ..self.config.clone()
            },
            events: self.events.clone(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Receive a [`ProgressEvent`] for every state transition from now on.
    ///
    /// Slow subscribers lose the oldest events; runs never wait on them.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Run all problems against the solvers currently enabled in `registry`.
    ///
    /// Returns the number of outcomes recorded.
    pub async fn run(
        &self,
        problems: &[LoadedProblem],
        registry: &SolverRegistry,
        aggregator: &mut ResultAggregator,
    ) -> usize {
        let bindings: Vec<SolverBinding> = registry
            .enabled()
            .into_iter()
            .map(SolverBinding::from_descriptor)
            .collect();
        self.run_with(problems, bindings, aggregator).await
    }

    pub async fn run_with(
        &self,
        problems: &[LoadedProblem],
        bindings: Vec<SolverBinding>,
        aggregator: &mut ResultAggregator,
    ) -> usize {
        info!(
            "Session started: {} problems x {} solvers, time limit {:?}, {} concurrent",
            problems.len(),
            bindings.len(),
            self.config.time_limit,
            self.config.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let (outcomes_tx, mut outcomes_rx) = mpsc::unbounded_channel::<RunOutcome>();

        for problem in problems {
            for binding in &bindings {
                let pending = PendingRun::new(
                    problem.identity.clone(),
                    problem.source.clone(),
                    binding.descriptor.clone(),
                );
                publish(&self.events, pending.event());

                let task = RunTask {
                    pending,
                    program: Arc::clone(&problem.program),
                    backend: binding.backend.clone(),
                    time_limit: self.config.time_limit,
                    semaphore: Arc::clone(&semaphore),
                    events: self.events.clone(),
                    outcomes: outcomes_tx.clone(),
                };
                tokio::spawn(task.execute());
            }
        }
        drop(outcomes_tx);

        let mut recorded = 0;
        while let Some(outcome) = outcomes_rx.recv().await {
            match outcome.status {
                RunStatus::Timeout | RunStatus::Error => warn!(
                    "{} on {}: {} after {:.3}s ({})",
                    outcome.source,
                    outcome.solver.name,
                    outcome.status,
                    outcome.elapsed.as_secs_f64(),
                    outcome.message.as_deref().unwrap_or("-")
                ),
                _ => info!(
                    "{} on {}: {} after {:.3}s",
                    outcome.source,
                    outcome.solver.name,
                    outcome.status,
                    outcome.elapsed.as_secs_f64()
                ),
            }
            if aggregator.record(outcome) {
                recorded += 1;
            }
        }

        info!("Session finished: {} outcomes recorded", recorded);
        recorded
    }
}

fn publish(events: &broadcast::Sender<ProgressEvent>, event: ProgressEvent) {
    // No subscribers is fine
    let _ = events.send(event);
}

struct RunTask {
    pending: PendingRun,
    program: Arc<LinearProgram>,
    backend: Result<Arc<dyn Solver>, String>,
    time_limit: Option<Duration>,
    semaphore: Arc<Semaphore>,
    events: broadcast::Sender<ProgressEvent>,
    outcomes: mpsc::UnboundedSender<RunOutcome>,
}

impl RunTask {
    async fn execute(self) {
        // Hold permit for the duration of the run
        let _permit = self.semaphore.acquire_owned().await.ok();

        let running = self.pending.start();
        publish(&self.events, running.event());
        debug!("Dispatched {:?}", running);

        let completion = match self.backend {
            Err(message) => Completion::Failed(message),
            Ok(solver) => invoke(solver, self.program, self.time_limit).await,
        };

        let outcome = running.finish(completion);
        publish(&self.events, outcome.event());
        if self.outcomes.send(outcome).is_err() {
            warn!("Outcome dropped: session no longer collecting");
        }
    }
}

async fn invoke(solver: Arc<dyn Solver>, program: Arc<LinearProgram>, time_limit: Option<Duration>) -> Completion {
    let cancel = CancellationToken::new();
    let options = SolveOptions {
        time_limit,
        cancel: cancel.clone(),
    };
    let handle = tokio::task::spawn_blocking(move || solver.solve(&program, &options));

    match time_limit {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => completion_from_join(joined),
            Err(_) => {
                // The blocking call is abandoned; interruptible backends stop on the token
                cancel.cancel();
                Completion::Expired
            }
        },
        None => completion_from_join(handle.await),
    }
}

fn completion_from_join(joined: Result<Result<Verdict, SolverError>, JoinError>) -> Completion {
    match joined {
        Ok(result) => result.into(),
        Err(e) => Completion::Failed(format!("solver task failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    use crate::domain::load::{load, ProblemInput};
    use crate::domain::registry::{CommandDialect, LibraryBackend};
    use crate::domain::solver::Assignment;

    struct FixedSolver(Verdict);

    impl Solver for FixedSolver {
        fn solve(&self, _: &LinearProgram, _: &SolveOptions) -> Result<Verdict, SolverError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingSolver;

    impl Solver for FailingSolver {
        fn solve(&self, _: &LinearProgram, _: &SolveOptions) -> Result<Verdict, SolverError> {
            Err(SolverError::Backend("exploded".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Works for `duration` unless cancelled first.
    struct SlowSolver {
        duration: Duration,
        saw_cancel: Arc<AtomicBool>,
    }

    impl Solver for SlowSolver {
        fn solve(&self, _: &LinearProgram, options: &SolveOptions) -> Result<Verdict, SolverError> {
            let start = Instant::now();
            while start.elapsed() < self.duration {
                if options.cancel.is_cancelled() {
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    return Err(SolverError::Interrupted);
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(Verdict::Infeasible)
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn problems(names: &[&str]) -> Vec<LoadedProblem> {
        names
            .iter()
            .map(|name| load(&ProblemInput::new(*name, "p cnf 2 2\n1 -2 0\n-1 2 0\n")).unwrap())
            .collect()
    }

    fn binding(name: &str, solver: impl Solver + 'static) -> SolverBinding {
        SolverBinding::new(
            SolverDescriptor::executable(name, CommandDialect::Cbc, format!("/opt/{}", name)),
            Arc::new(solver),
        )
    }

    fn coordinator(time_limit: Option<Duration>, max_concurrent: usize) -> RunCoordinator {
        RunCoordinator::new(CoordinatorConfig {
            time_limit,
            max_concurrent,
        })
    }

    #[tokio::test]
    async fn test_run_should_finalize_each_pair_exactly_once() {
        let problems = problems(&["a.cnf", "b.cnf", "c.cnf"]);
        let bindings = vec![
            binding("sat", FixedSolver(Verdict::Feasible(Assignment::new()))),
            binding("unsat", FixedSolver(Verdict::Infeasible)),
            binding("broken", FailingSolver),
        ];
        let mut aggregator = ResultAggregator::new();

        let recorded = coordinator(None, 2).run_with(&problems, bindings, &mut aggregator).await;

        assert_eq!(recorded, 9);
        let pairs: HashSet<(String, String)> = aggregator
            .summary()
            .runs()
            .map(|o| (o.source.clone(), o.solver.name.clone()))
            .collect();
        assert_eq!(pairs.len(), 9);
        assert_eq!(aggregator.summary().count(RunStatus::Feasible), 3);
        assert_eq!(aggregator.summary().count(RunStatus::Infeasible), 3);
        assert_eq!(aggregator.summary().count(RunStatus::Error), 3);
    }

    #[tokio::test]
    async fn test_run_given_error_should_capture_message() {
        let mut aggregator = ResultAggregator::new();

        coordinator(None, 1)
            .run_with(&problems(&["a.cnf"]), vec![binding("broken", FailingSolver)], &mut aggregator)
            .await;

        let outcome = aggregator.summary().runs().next().unwrap();
        assert_eq!(outcome.status, RunStatus::Error);
        assert_eq!(outcome.message.as_deref(), Some("solver backend failed: exploded"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_given_slow_solver_should_time_out_without_blocking_others() {
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let bindings = vec![
            binding(
                "slow",
                SlowSolver {
                    duration: Duration::from_secs(30),
                    saw_cancel: Arc::clone(&saw_cancel),
                },
            ),
            binding("fast", FixedSolver(Verdict::Infeasible)),
        ];
        let mut aggregator = ResultAggregator::new();

        let start = Instant::now();
        coordinator(Some(Duration::from_millis(200)), 4)
            .run_with(&problems(&["a.cnf"]), bindings, &mut aggregator)
            .await;

        assert!(start.elapsed() < Duration::from_secs(10));
        let summary = aggregator.summary();
        let slow = summary.runs().find(|o| o.solver.name == "slow").unwrap();
        let fast = summary.runs().find(|o| o.solver.name == "fast").unwrap();
        assert_eq!(slow.status, RunStatus::Timeout);
        assert!(slow.elapsed >= Duration::from_millis(200));
        assert_eq!(fast.status, RunStatus::Infeasible);

        // the abandoned call observes the cancellation shortly after
        let deadline = Instant::now() + Duration::from_secs(5);
        while !saw_cancel.load(Ordering::SeqCst) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(saw_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_should_publish_transitions_in_order() {
        let coordinator = coordinator(None, 2);
        let mut events = coordinator.subscribe();
        let mut aggregator = ResultAggregator::new();

        coordinator
            .run_with(
                &problems(&["a.cnf", "b.lpt.cnf"]),
                vec![binding("unsat", FixedSolver(Verdict::Infeasible))],
                &mut aggregator,
            )
            .await;

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 6);

        for source in ["a.cnf", "b.lpt.cnf"] {
            let states: Vec<RunStatus> = received
                .iter()
                .filter(|e| e.source == source)
                .map(|e| e.state)
                .collect();
            assert_eq!(
                states,
                vec![RunStatus::Pending, RunStatus::Running, RunStatus::Infeasible]
            );
        }
    }

    #[tokio::test]
    async fn test_run_given_unavailable_backend_should_record_error() {
        let mut registry = SolverRegistry::new();
        registry
            .register(SolverDescriptor::executable(
                "missing",
                CommandDialect::Cbc,
                "/nonexistent/cbc",
            ))
            .unwrap();
        registry
            .register(SolverDescriptor::library("off", LibraryBackend::Glpk))
            .unwrap();
        registry.disable("off").unwrap();
        let mut aggregator = ResultAggregator::new();

        let recorded = coordinator(Some(Duration::from_secs(5)), 2)
            .run(&problems(&["a.cnf"]), &registry, &mut aggregator)
            .await;

        assert_eq!(recorded, 1);
        let outcome = aggregator.summary().runs().next().unwrap();
        assert_eq!(outcome.solver.name, "missing");
        assert_eq!(outcome.status, RunStatus::Error);
        assert!(outcome.message.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_with_time_limit_should_share_subscribers() {
        let base = coordinator(None, 1);
        let mut events = base.subscribe();
        let limited = base.with_time_limit(Some(Duration::from_secs(1)));
        let mut aggregator = ResultAggregator::new();

        limited
            .run_with(
                &problems(&["a.cnf"]),
                vec![binding("unsat", FixedSolver(Verdict::Infeasible))],
                &mut aggregator,
            )
            .await;

        assert_eq!(limited.config().time_limit, Some(Duration::from_secs(1)));
        assert_eq!(events.try_recv().unwrap().state, RunStatus::Pending);
    }

    #[tokio::test]
    async fn test_run_given_no_solvers_should_record_nothing() {
        let mut aggregator = ResultAggregator::new();
        let recorded = coordinator(None, 1)
            .run_with(&problems(&["a.cnf"]), Vec::new(), &mut aggregator)
            .await;
        assert_eq!(recorded, 0);
        assert!(aggregator.summary().is_empty());
    }
}
