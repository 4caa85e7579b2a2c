use crate::domain::program::{LinearProgram, Relation, Sense};
use crate::domain::solver::{Assignment, SolveOptions, Solver, Verdict};
use crate::domain::validate::validate_program;
use crate::error::SolverError;

use grb::prelude::*;

fn backend_error(context: &str, error: grb::Error) -> SolverError {
    SolverError::Backend(format!("{}: {}", context, error))
}

/// Gurobi solver implementation
pub struct GurobiSolver;

impl GurobiSolver {
    pub fn new() -> Self {
        GurobiSolver
    }

    fn convert_status(status: grb::Status) -> Option<Verdict> {
        match status {
            grb::Status::Optimal | grb::Status::SubOptimal => Some(Verdict::Feasible(Assignment::new())),
            grb::Status::Infeasible => Some(Verdict::Infeasible),
            grb::Status::TimeLimit => Some(Verdict::TimedOut),
            _ => None,
        }
    }
}

impl Default for GurobiSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for GurobiSolver {
    fn solve(&self, program: &LinearProgram, options: &SolveOptions) -> Result<Verdict, SolverError> {
        validate_program(program)?;

        if program.contradiction().is_some() {
            return Ok(Verdict::Infeasible);
        }
        if options.cancel.is_cancelled() {
            return Err(SolverError::Interrupted);
        }

        let mut env = Env::new("").map_err(|e| backend_error("Failed to create Gurobi environment", e))?;

        // Set to 1 for verbose solver logging
        env.set(param::OutputFlag, 0)
            .map_err(|e| backend_error("Failed to set Gurobi output flag", e))?;

        if let Some(limit) = options.time_limit {
            env.set(param::TimeLimit, limit.as_secs_f64())
                .map_err(|e| backend_error("Failed to set Gurobi time limit", e))?;
        }

        let mut model = Model::with_env(&program.name, &env)
            .map_err(|e| backend_error("Failed to create Gurobi model", e))?;

        let mut vars: Vec<Var> = Vec::with_capacity(program.variables.len());
        for var in &program.variables {
            let (lower, upper) = var.bound;

            let gurobi_var = if lower == 0 && upper == 1 {
                add_binvar!(model, name: &var.id)
                    .map_err(|e| backend_error("Failed to add binary variable", e))?
            } else {
                add_intvar!(model, name: &var.id, bounds: lower as f64..upper as f64)
                    .map_err(|e| backend_error("Failed to add integer variable", e))?
            };

            vars.push(gurobi_var);
        }

        model
            .update()
            .map_err(|e| backend_error("Failed to update model after adding variables", e))?;

        for constraint in &program.constraints {
            let (coefficients, rhs) = constraint.linear_form();
            if coefficients.is_empty() {
                // satisfied by every assignment, contradictions were handled above
                continue;
            }

            let expr = coefficients
                .iter()
                .fold(Expr::Constant(0.0), |acc, &(column, coeff)| acc + (coeff as f64) * vars[column]);
            let rhs = rhs as f64;

            let added = match constraint.relation {
                Relation::Ge => model.add_constr(&constraint.name, c!(expr >= rhs)),
                Relation::Le => model.add_constr(&constraint.name, c!(expr <= rhs)),
                Relation::Eq => model.add_constr(&constraint.name, c!(expr == rhs)),
            };
            added.map_err(|e| backend_error("Failed to add constraint", e))?;
        }

        let objective = program
            .objective
            .iter()
            .fold(Expr::Constant(0.0), |acc, &(column, coeff)| acc + (coeff as f64) * vars[column]);
        let sense = match program.sense {
            Sense::Maximize => ModelSense::Maximize,
            Sense::Minimize => ModelSense::Minimize,
        };
        model
            .set_objective(objective, sense)
            .map_err(|e| backend_error("Failed to set objective", e))?;

        model
            .optimize()
            .map_err(|e| backend_error("Failed to optimize", e))?;

        let status = model
            .status()
            .map_err(|e| backend_error("Failed to get model status", e))?;

        match Self::convert_status(status) {
            Some(Verdict::Feasible(_)) => {
                let mut assignment = Assignment::new();
                for (idx, var) in program.variables.iter().enumerate() {
                    let (lower, upper) = var.bound;

                    // Variables eliminated by presolve report no value; fixed ones keep their bound
                    let value = model.get_obj_attr(attr::X, &vars[idx]).unwrap_or_else(|_| {
                        if lower == upper {
                            lower as f64
                        } else {
                            0.0
                        }
                    });

                    assignment.insert(var.id.clone(), value.round() as i64);
                }
                Ok(Verdict::Feasible(assignment))
            }
            Some(verdict) => Ok(verdict),
            None => Err(SolverError::Backend(format!(
                "Gurobi finished with status {:?}",
                status
            ))),
        }
    }

    fn name(&self) -> &str {
        "Gurobi"
    }
}
