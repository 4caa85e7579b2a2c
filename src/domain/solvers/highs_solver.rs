use crate::domain::program::{LinearProgram, Relation, Sense as ProgramSense};
use crate::domain::solver::{Assignment, SolveOptions, Solver, Verdict};
use crate::domain::validate::validate_program;
use crate::error::SolverError;

use ::highs::{ColProblem, HighsModelStatus, Sense};

/// HiGHS solver implementation
pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        HighsSolver
    }

    /// `None` for statuses that carry no usable answer.
    fn convert_status(model_status: &HighsModelStatus) -> Option<Verdict> {
        match model_status {
            HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => {
                Some(Verdict::Feasible(Assignment::new()))
            }
            HighsModelStatus::Infeasible => Some(Verdict::Infeasible),
            HighsModelStatus::ReachedTimeLimit => Some(Verdict::TimedOut),
            _ => None,
        }
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for HighsSolver {
    fn solve(&self, program: &LinearProgram, options: &SolveOptions) -> Result<Verdict, SolverError> {
        validate_program(program)?;

        if program.contradiction().is_some() {
            return Ok(Verdict::Infeasible);
        }
        if options.cancel.is_cancelled() {
            return Err(SolverError::Interrupted);
        }

        let sense = match program.sense {
            ProgramSense::Maximize => Sense::Maximise,
            ProgramSense::Minimize => Sense::Minimise,
        };

        let mut problem = ColProblem::new();

        // Constraint rows first, then the columns that reference them
        let mut column_entries: Vec<Vec<(usize, f64)>> = vec![Vec::new(); program.variables.len()];
        let mut rows = Vec::with_capacity(program.constraints.len());
        for (row_idx, constraint) in program.constraints.iter().enumerate() {
            let (coefficients, rhs) = constraint.linear_form();
            let rhs = rhs as f64;
            let row = match constraint.relation {
                Relation::Ge => problem.add_row(rhs..),
                Relation::Le => problem.add_row(..=rhs),
                Relation::Eq => problem.add_row(rhs..=rhs),
            };
            rows.push(row);

            for (column, value) in coefficients {
                column_entries[column].push((row_idx, value as f64));
            }
        }

        for (col_idx, variable) in program.variables.iter().enumerate() {
            let cost = program
                .objective
                .iter()
                .filter(|(column, _)| *column == col_idx)
                .map(|(_, coefficient)| *coefficient as f64)
                .sum::<f64>();
            let (lower, upper) = variable.bound;

            let row_factors: Vec<_> = column_entries[col_idx]
                .iter()
                .map(|(row_idx, value)| (rows[*row_idx], *value))
                .collect();

            problem.add_integer_column(cost, lower as f64..=upper as f64, &row_factors);
        }

        let mut model = problem.optimise(sense);
        if let Some(limit) = options.time_limit {
            model.set_option("time_limit", limit.as_secs_f64());
        }
        let solved = model.solve();

        let model_status = solved.status();
        match Self::convert_status(&model_status) {
            Some(Verdict::Feasible(_)) => {
                let values = solved.get_solution();
                let assignment: Assignment = program
                    .variables
                    .iter()
                    .enumerate()
                    .map(|(col_idx, var)| {
                        let value = values.columns().get(col_idx).copied().unwrap_or(0.0);
                        (var.id.clone(), value.round() as i64)
                    })
                    .collect();
                Ok(Verdict::Feasible(assignment))
            }
            Some(verdict) => Ok(verdict),
            None => Err(SolverError::Backend(format!(
                "HiGHS finished with status {:?}",
                model_status
            ))),
        }
    }

    fn name(&self) -> &str {
        "HiGHS"
    }
}
