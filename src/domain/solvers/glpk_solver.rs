use log::debug;

use crate::convert::{to_borrowed_objective, to_glpk_polyhedron};
use crate::domain::program::{LinearProgram, Sense};
use crate::domain::solver::{Assignment, SolveOptions, Solver, Verdict};
use crate::domain::validate::validate_program;
use crate::error::SolverError;

use glpk_rust::{solve_ilps as glpk_solve_ilps, Solution, Status as GlpkStatus};

const NO_TERMINAL_OUTPUT: bool = false;

/// GLPK solver implementation
///
/// Runs in-process and cannot be interrupted once started; on timeout the coordinator
/// abandons the call.
pub struct GlpkSolver;

impl GlpkSolver {
    pub fn new() -> Self {
        GlpkSolver
    }

    fn convert_solution(solution: Solution) -> Result<Verdict, SolverError> {
        match solution.status {
            GlpkStatus::Optimal | GlpkStatus::Feasible => {
                let assignment: Assignment = solution
                    .solution
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v as i64))
                    .collect();
                Ok(Verdict::Feasible(assignment))
            }
            GlpkStatus::Infeasible | GlpkStatus::NoFeasible => Ok(Verdict::Infeasible),
            ref other => {
                let status = Self::status_name(other);
                Err(SolverError::Backend(
                    solution
                        .error
                        .unwrap_or_else(|| format!("GLPK finished with status {}", status)),
                ))
            }
        }
    }

    fn status_name(status: &GlpkStatus) -> &'static str {
        match status {
            GlpkStatus::Undefined => "Undefined",
            GlpkStatus::Feasible => "Feasible",
            GlpkStatus::Infeasible => "Infeasible",
            GlpkStatus::NoFeasible => "NoFeasible",
            GlpkStatus::Optimal => "Optimal",
            GlpkStatus::Unbounded => "Unbounded",
            GlpkStatus::SimplexFailed => "SimplexFailed",
            GlpkStatus::MIPFailed => "MIPFailed",
            GlpkStatus::EmptySpace => "EmptySpace",
        }
    }
}

impl Default for GlpkSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for GlpkSolver {
    fn solve(&self, program: &LinearProgram, options: &SolveOptions) -> Result<Verdict, SolverError> {
        validate_program(program)?;

        if let Some(constraint) = program.contradiction() {
            debug!("{}: constraint {} is unsatisfiable", program.name, constraint.name);
            return Ok(Verdict::Infeasible);
        }
        if options.cancel.is_cancelled() {
            return Err(SolverError::Interrupted);
        }

        let mut polyhedron = to_glpk_polyhedron(program);
        let objectives = vec![to_borrowed_objective(program)];
        let maximize = program.sense == Sense::Maximize;

        let solutions: Vec<Solution> =
            glpk_solve_ilps(&mut polyhedron, objectives, maximize, NO_TERMINAL_OUTPUT);

        match solutions.into_iter().next() {
            Some(solution) => Self::convert_solution(solution),
            None => Err(SolverError::Backend("GLPK returned no solution".to_string())),
        }
    }

    fn name(&self) -> &str {
        "GLPK"
    }
}
