use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive (lower, upper) bound, same shape as `glpk_rust::Bound`.
pub type Bound = (i32, i32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub bound: Bound,
}

impl Variable {
    pub fn binary(id: impl Into<String>) -> Self {
        Variable {
            id: id.into(),
            bound: (0, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Relation::Ge => ">=",
            Relation::Le => "<=",
            Relation::Eq => "=",
        };
        f.write_str(symbol)
    }
}

/// `coefficient * x` or, when complemented, `coefficient * (1 - x)`.
///
/// `variable` is an index into [`LinearProgram::variables`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub coefficient: i32,
    pub variable: usize,
    pub complemented: bool,
}

impl Term {
    pub fn positive(variable: usize) -> Self {
        Term {
            coefficient: 1,
            variable,
            complemented: false,
        }
    }

    pub fn negated(variable: usize) -> Self {
        Term {
            coefficient: 1,
            variable,
            complemented: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<Term>,
    pub relation: Relation,
    pub rhs: i32,
}

impl Constraint {
    /// Rewrite as `sum(a_j * x_j) <rel> b` with complemented terms expanded.
    ///
    /// Coefficients of a repeated variable are summed and zero coefficients dropped; variables
    /// keep their first-appearance order.
    ///
    /// Saturates on `i32` overflow; [`Constraint::checked_linear_form`] reports it instead.
    pub fn linear_form(&self) -> (Vec<(usize, i32)>, i32) {
        let (coefficients, rhs, _) = self.normalise();
        (coefficients, rhs)
    }

    /// As [`Constraint::linear_form`], or `None` when a coefficient or the right-hand side
    /// leaves the `i32` range.
    pub fn checked_linear_form(&self) -> Option<(Vec<(usize, i32)>, i32)> {
        match self.normalise() {
            (coefficients, rhs, false) => Some((coefficients, rhs)),
            (_, _, true) => None,
        }
    }

    fn normalise(&self) -> (Vec<(usize, i32)>, i32, bool) {
        let mut overflowed = false;
        let mut rhs = self.rhs;
        let mut coefficients: Vec<(usize, i32)> = Vec::with_capacity(self.terms.len());

        for term in &self.terms {
            let coefficient = if term.complemented {
                // c * (1 - x) = c - c * x
                rhs = clamp(rhs as i64 - term.coefficient as i64, &mut overflowed);
                clamp(-(term.coefficient as i64), &mut overflowed)
            } else {
                term.coefficient
            };

            match coefficients.iter_mut().find(|(v, _)| *v == term.variable) {
                Some((_, existing)) => {
                    *existing = clamp(*existing as i64 + coefficient as i64, &mut overflowed)
                }
                None => coefficients.push((term.variable, coefficient)),
            }
        }

        coefficients.retain(|&(_, c)| c != 0);
        (coefficients, rhs, overflowed)
    }

    /// No variables remain after normalisation and the constant side is violated,
    /// as for the encoding of an empty clause.
    pub fn is_contradiction(&self) -> bool {
        let (coefficients, rhs) = self.linear_form();
        coefficients.is_empty()
            && match self.relation {
                Relation::Ge => 0 < rhs,
                Relation::Le => 0 > rhs,
                Relation::Eq => rhs != 0,
            }
    }
}

/// Clamp to the `i32` range, flagging when clamping happened.
fn clamp(exact: i64, overflowed: &mut bool) -> i32 {
    i32::try_from(exact).unwrap_or_else(|_| {
        *overflowed = true;
        exact.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

/// A 0/1 integer program. Feasibility is what matters; the objective is zero unless the
/// program was loaded from a file that declares one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearProgram {
    pub name: String,
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
    pub sense: Sense,
    pub objective: Vec<(usize, i32)>,
}

impl LinearProgram {
    /// The first constraint no assignment can satisfy on its own, if any.
    pub fn contradiction(&self) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.is_contradiction())
    }

    pub fn variable_index(&self, id: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.id == id)
    }

    /// Human-readable form of one constraint, e.g. `x1 + (1 - x2) >= 1`.
    pub fn display_constraint(&self, constraint: &Constraint) -> String {
        let mut text = String::new();

        for (position, term) in constraint.terms.iter().enumerate() {
            let id = self
                .variables
                .get(term.variable)
                .map(|v| v.id.as_str())
                .unwrap_or("?");
            let magnitude = term.coefficient.unsigned_abs();

            if position == 0 {
                if term.coefficient < 0 {
                    text.push_str("- ");
                }
            } else if term.coefficient < 0 {
                text.push_str(" - ");
            } else {
                text.push_str(" + ");
            }

            if magnitude != 1 {
                text.push_str(&format!("{} ", magnitude));
            }

            if term.complemented {
                text.push_str(&format!("(1 - {})", id));
            } else {
                text.push_str(id);
            }
        }

        if constraint.terms.is_empty() {
            text.push('0');
        }

        format!("{} {} {}", text, constraint.relation, constraint.rhs)
    }
}
