use std::collections::HashMap;

use glpk_rust::{
    Bound, IntegerSparseMatrix as GlpkMatrix, SparseLEIntegerPolyhedron as GlpkPoly,
    Variable as GlpkVar,
};

use crate::domain::program::{LinearProgram, Relation};

/// Convert a program to a GLPK LE polyhedron (A x <= b) borrowing the variable ids.
///
/// `>=` rows are flipped by negating coefficients and right-hand side; `=` rows become
/// one row in each direction.
pub fn to_glpk_polyhedron(program: &LinearProgram) -> GlpkPoly<'_> {
    let mut rows: Vec<i32> = Vec::new();
    let mut cols: Vec<i32> = Vec::new();
    let mut vals: Vec<i32> = Vec::new();
    let mut b: Vec<Bound> = Vec::with_capacity(program.constraints.len());

    let mut push_row = |coefficients: &[(usize, i32)], sign: i32, rhs: i32, b: &mut Vec<Bound>| {
        let row = b.len() as i32;
        for &(column, value) in coefficients {
            rows.push(row);
            cols.push(column as i32);
            vals.push(sign * value);
        }
        b.push((0, sign * rhs));
    };

    for constraint in &program.constraints {
        let (coefficients, rhs) = constraint.linear_form();
        match constraint.relation {
            Relation::Le => push_row(&coefficients, 1, rhs, &mut b),
            Relation::Ge => push_row(&coefficients, -1, rhs, &mut b),
            Relation::Eq => {
                push_row(&coefficients, 1, rhs, &mut b);
                push_row(&coefficients, -1, rhs, &mut b);
            }
        }
    }

    let variables: Vec<GlpkVar<'_>> = program
        .variables
        .iter()
        .map(|v| GlpkVar {
            id: v.id.as_str(),
            bound: v.bound,
        })
        .collect();

    GlpkPoly {
        a: GlpkMatrix { rows, cols, vals },
        b,
        variables,
        double_bound: false,
    }
}

/// The program's objective keyed by borrowed variable id; empty for pure feasibility.
pub fn to_borrowed_objective(program: &LinearProgram) -> HashMap<&str, f64> {
    program
        .objective
        .iter()
        .filter_map(|&(column, coefficient)| {
            program
                .variables
                .get(column)
                .map(|v| (v.id.as_str(), coefficient as f64))
        })
        .collect()
}
