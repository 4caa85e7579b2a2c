use std::collections::HashSet;

use crate::domain::program::LinearProgram;
use crate::error::ProgramError;

/// Check that every column a program refers to exists and that bounds are sane.
pub fn validate_program(program: &LinearProgram) -> Result<(), ProgramError> {
    let column_count = program.variables.len();

    let mut ids: HashSet<&str> = HashSet::with_capacity(column_count);
    for variable in &program.variables {
        if !ids.insert(variable.id.as_str()) {
            return Err(ProgramError {
                details: format!("Variable {} is declared twice", variable.id),
            });
        }

        let (lower, upper) = variable.bound;
        if lower > upper {
            return Err(ProgramError {
                details: format!(
                    "Variable {} has empty bound [{}, {}]",
                    variable.id, lower, upper
                ),
            });
        }
    }

    for (column, _) in &program.objective {
        if *column >= column_count {
            return Err(ProgramError {
                details: format!("Objective contains missing column {}", column),
            });
        }
    }

    for constraint in &program.constraints {
        for term in &constraint.terms {
            if term.variable >= column_count {
                return Err(ProgramError {
                    details: format!(
                        "Constraint {} contains missing column {}",
                        constraint.name, term.variable
                    ),
                });
            }
        }

        if constraint.checked_linear_form().is_none() {
            return Err(ProgramError {
                details: format!(
                    "Constraint {} has a coefficient or constant outside the i32 range",
                    constraint.name
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::program::{Constraint, Relation, Term, Variable};

    fn program() -> LinearProgram {
        LinearProgram {
            name: "p".to_string(),
            variables: vec![Variable::binary("x1"), Variable::binary("x2")],
            constraints: vec![Constraint {
                name: "c1".to_string(),
                terms: vec![Term::positive(0), Term::negated(1)],
                relation: Relation::Ge,
                rhs: 1,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_program_given_valid_program_should_return_ok() {
        assert!(validate_program(&program()).is_ok());
    }

    #[test]
    fn test_validate_program_given_missing_column_should_return_error() {
        let mut program = program();
        program.constraints[0].terms.push(Term::positive(7));

        let error = validate_program(&program).unwrap_err();

        assert!(error.details.contains("missing column 7"));
    }

    #[test]
    fn test_validate_program_given_missing_objective_column_should_return_error() {
        let mut program = program();
        program.objective.push((2, 1));
        assert!(validate_program(&program).is_err());
    }

    #[test]
    fn test_validate_program_given_duplicate_variable_should_return_error() {
        let mut program = program();
        program.variables.push(Variable::binary("x1"));
        assert!(validate_program(&program).is_err());
    }

    #[test]
    fn test_validate_program_given_inverted_bound_should_return_error() {
        let mut program = program();
        program.variables[0].bound = (1, 0);
        assert!(validate_program(&program).is_err());
    }

    #[test]
    fn test_validate_program_given_overflowing_constraint_should_return_error() {
        let mut program = program();
        program.constraints[0].terms.push(Term {
            coefficient: i32::MAX,
            variable: 0,
            complemented: false,
        });

        let error = validate_program(&program).unwrap_err();

        assert!(error.details.contains("outside the i32 range"));
    }
}
