use std::sync::Arc;

use crate::domain::registry::{LibraryBackend, SolverDescriptor, SolverHandle};
use crate::domain::solver::Solver;
use crate::domain::solvers::{CommandSolver, GlpkSolver};
use crate::error::SolverError;

#[cfg(feature = "highs-solver")]
use crate::domain::solvers::HighsSolver;

#[cfg(feature = "gurobi-solver")]
use crate::domain::solvers::GurobiSolver;

/// Create a solver instance for the descriptor's invocation handle
///
/// Library backends that were not compiled in yield [`SolverError::Unavailable`].
pub fn create_solver(descriptor: &SolverDescriptor) -> Result<Arc<dyn Solver>, SolverError> {
    match &descriptor.handle {
        SolverHandle::Library { backend } => create_library_solver(*backend),
        SolverHandle::Executable { dialect, path } => Ok(Arc::new(CommandSolver::new(
            descriptor.name.clone(),
            *dialect,
            path.clone(),
        ))),
    }
}

fn create_library_solver(backend: LibraryBackend) -> Result<Arc<dyn Solver>, SolverError> {
    match backend {
        LibraryBackend::Glpk => Ok(Arc::new(GlpkSolver::new())),
        #[cfg(feature = "highs-solver")]
        LibraryBackend::Highs => Ok(Arc::new(HighsSolver::new())),
        #[cfg(feature = "gurobi-solver")]
        LibraryBackend::Gurobi => Ok(Arc::new(GurobiSolver::new())),
        #[allow(unreachable_patterns)]
        other => Err(SolverError::Unavailable(other.as_str().to_string())),
    }
}
