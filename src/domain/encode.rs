use log::error;

use crate::domain::formula::Formula;
use crate::domain::program::{Constraint, LinearProgram, Relation, Term, Variable};
use crate::error::EncodingInvariantError;

/// Prefix of the 0/1 variable standing for boolean variable `v`.
pub const VARIABLE_PREFIX: &str = "x";

pub fn variable_name(variable: usize) -> String {
    format!("{}{}", VARIABLE_PREFIX, variable)
}

/// Encode a CNF formula as a 0/1 feasibility program.
///
/// Variable `v` becomes column `v - 1` named `x<v>`. Clause `i` becomes constraint `c<i>`:
/// the sum of `x` for positive and `(1 - x)` for negative literals must reach 1. An empty
/// clause yields `0 >= 1`, so the program is infeasible by construction.
pub fn encode(formula: &Formula, name: &str) -> Result<LinearProgram, EncodingInvariantError> {
    let variable_count = formula.variable_count();

    let variables: Vec<Variable> = (1..=variable_count)
        .map(|v| Variable::binary(variable_name(v)))
        .collect();

    let mut constraints = Vec::with_capacity(formula.clause_count());
    for (index, clause) in formula.clauses().iter().enumerate() {
        let mut terms = Vec::with_capacity(clause.literals().len());

        for literal in clause.literals() {
            let variable = literal.variable();
            if variable == 0 || variable > variable_count {
                let violation = EncodingInvariantError {
                    clause: index + 1,
                    literal: literal.value(),
                    variable_count,
                };
                error!("refusing to encode {}: {}", name, violation);
                return Err(violation);
            }

            let column = variable - 1;
            terms.push(if literal.is_positive() {
                Term::positive(column)
            } else {
                Term::negated(column)
            });
        }

        constraints.push(Constraint {
            name: format!("c{}", index + 1),
            terms,
            relation: Relation::Ge,
            rhs: 1,
        });
    }

    Ok(LinearProgram {
        name: name.to_string(),
        variables,
        constraints,
        ..Default::default()
    })
}
