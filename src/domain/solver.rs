use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::program::LinearProgram;
use crate::error::SolverError;

/// Variable id to value, as reported by a backend for a feasible program.
pub type Assignment = BTreeMap<String, i64>;

/// Per-invocation settings handed to a backend.
#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    /// Hint passed on to backends with their own time limit. The coordinator enforces
    /// the limit independently.
    pub time_limit: Option<Duration>,
    /// Fired when the run's outcome has already been decided elsewhere (e.g. timeout).
    /// Backends that can be interrupted must stop and return promptly.
    pub cancel: CancellationToken,
}

/// Definitive answer of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Feasible(Assignment),
    Infeasible,
    /// The backend stopped on its own time limit without a definitive answer.
    TimedOut,
}

/// Common interface for ILP solver backends
pub trait Solver: Send + Sync {
    /// Decide feasibility of `program`.
    ///
    /// Called on a blocking thread; implementations may block until done.
    fn solve(&self, program: &LinearProgram, options: &SolveOptions) -> Result<Verdict, SolverError>;

    /// Get the solver name for logging/debugging
    fn name(&self) -> &str;
}
