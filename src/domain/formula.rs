use std::fmt;

/// Signed DIMACS literal: magnitude is the variable id, sign the polarity. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal(i32);

impl Literal {
    pub fn new(value: i32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Literal(value))
        }
    }

    pub fn variable(&self) -> usize {
        self.0.unsigned_abs() as usize
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clause {
    literals: Vec<Literal>,
}

impl Clause {
    pub fn new(literals: Vec<Literal>) -> Self {
        Clause { literals }
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    /// The empty clause can never be satisfied.
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}

/// A CNF formula with the variable count declared by its header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formula {
    variable_count: usize,
    clauses: Vec<Clause>,
}

impl Formula {
    pub fn new(variable_count: usize, clauses: Vec<Clause>) -> Self {
        Formula {
            variable_count,
            clauses,
        }
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

/// Serializes back to DIMACS, one clause per line.
impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "p cnf {} {}", self.variable_count, self.clauses.len())?;
        for clause in &self.clauses {
            for literal in clause.literals() {
                write!(f, "{} ", literal)?;
            }
            writeln!(f, "0")?;
        }
        Ok(())
    }
}
