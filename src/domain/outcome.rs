use std::fmt;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::domain::identity::ProblemIdentity;
use crate::domain::registry::SolverDescriptor;
use crate::domain::solver::{Assignment, Verdict};
use crate::error::SolverError;

/// Lifecycle state of one (problem, solver) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunStatus {
    Pending,
    Running,
    Feasible,
    Infeasible,
    Timeout,
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Feasible => "Feasible",
            RunStatus::Infeasible => "Infeasible",
            RunStatus::Timeout => "Timeout",
            RunStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// A state transition, published to progress subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub problem: ProblemIdentity,
    pub source: String,
    pub solver: String,
    pub state: RunStatus,
    pub timestamp: SystemTime,
}

/// How a running run ended.
#[derive(Debug)]
pub enum Completion {
    Solved(Verdict),
    /// The coordinator's timer fired first.
    Expired,
    /// Backend error or a backend that could not be created, with its message.
    Failed(String),
}

impl From<Result<Verdict, SolverError>> for Completion {
    fn from(result: Result<Verdict, SolverError>) -> Self {
        match result {
            Ok(verdict) => Completion::Solved(verdict),
            Err(error) => Completion::Failed(error.to_string()),
        }
    }
}

/// A run that has been scheduled but not dispatched.
#[derive(Debug, Clone)]
pub struct PendingRun {
    identity: ProblemIdentity,
    source: String,
    solver: SolverDescriptor,
}

impl PendingRun {
    pub fn new(identity: ProblemIdentity, source: impl Into<String>, solver: SolverDescriptor) -> Self {
        PendingRun {
            identity,
            source: source.into(),
            solver,
        }
    }

    pub fn event(&self) -> ProgressEvent {
        event(&self.identity, &self.source, &self.solver, RunStatus::Pending)
    }

    /// Dispatch. The run's timer starts here.
    pub fn start(self) -> RunningRun {
        RunningRun {
            identity: self.identity,
            source: self.source,
            solver: self.solver,
            started: Instant::now(),
        }
    }
}

/// A dispatched run. Consumed exactly once by [`RunningRun::finish`].
#[derive(Debug)]
pub struct RunningRun {
    identity: ProblemIdentity,
    source: String,
    solver: SolverDescriptor,
    started: Instant,
}

impl RunningRun {
    pub fn event(&self) -> ProgressEvent {
        event(&self.identity, &self.source, &self.solver, RunStatus::Running)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn finish(self, completion: Completion) -> RunOutcome {
        let elapsed = self.started.elapsed();
        let (status, message, assignment) = match completion {
            Completion::Solved(Verdict::Feasible(assignment)) => (RunStatus::Feasible, None, Some(assignment)),
            Completion::Solved(Verdict::Infeasible) => (RunStatus::Infeasible, None, None),
            Completion::Solved(Verdict::TimedOut) => (
                RunStatus::Timeout,
                Some("solver stopped at its own time limit".to_string()),
                None,
            ),
            Completion::Expired => (
                RunStatus::Timeout,
                Some(format!("time limit expired after {:.2}s", elapsed.as_secs_f64())),
                None,
            ),
            Completion::Failed(message) => (RunStatus::Error, Some(message), None),
        };

        RunOutcome {
            identity: self.identity,
            source: self.source,
            solver: self.solver,
            status,
            elapsed,
            message,
            assignment,
        }
    }
}

/// The finalized result of one (problem, solver) attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub identity: ProblemIdentity,
    /// The submitted file name, e.g. `foo.cnf`.
    pub source: String,
    pub solver: SolverDescriptor,
    pub status: RunStatus,
    pub elapsed: Duration,
    pub message: Option<String>,
    pub assignment: Option<Assignment>,
}

impl RunOutcome {
    pub fn event(&self) -> ProgressEvent {
        event(&self.identity, &self.source, &self.solver, self.status)
    }
}

fn event(identity: &ProblemIdentity, source: &str, solver: &SolverDescriptor, state: RunStatus) -> ProgressEvent {
    ProgressEvent {
        problem: identity.clone(),
        source: source.to_string(),
        solver: solver.name.clone(),
        state,
        timestamp: SystemTime::now(),
    }
}
