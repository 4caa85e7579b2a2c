use crate::domain::formula::{Clause, Formula, Literal};
use crate::error::MalformedInputError;

#[derive(Debug, Clone, Copy)]
struct Header {
    variable_count: usize,
    clause_count: usize,
}

impl Header {
    fn parse(number: usize, line: &str) -> Result<Self, MalformedInputError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() != 4 || words[0] != "p" || words[1] != "cnf" {
            return Err(MalformedInputError::new(
                number,
                line,
                "problem line must read `p cnf <variables> <clauses>`",
            ));
        }

        let count = |word: &str, what: &str| {
            word.parse::<usize>().map_err(|_| {
                MalformedInputError::new(number, line, format!("{} count `{}` is not a number", what, word))
            })
        };
        let variable_count = count(words[2], "variable")?;
        let clause_count = count(words[3], "clause")?;

        if variable_count > i32::MAX as usize {
            return Err(MalformedInputError::new(
                number,
                line,
                format!("variable count {} does not fit a literal", variable_count),
            ));
        }

        Ok(Header {
            variable_count,
            clause_count,
        })
    }
}

/// Parse DIMACS CNF text into a [`Formula`].
///
/// The header must precede all clause data and the observed clause count must match the
/// declared one exactly. A clause may span several lines and a line may hold several clauses.
/// A line holding only `%` ends the clause data.
pub fn parse(text: &str) -> Result<Formula, MalformedInputError> {
    let mut header: Option<Header> = None;
    let mut clauses: Vec<Clause> = Vec::new();
    let mut current: Vec<Literal> = Vec::new();
    // Where the clause under construction started, for unterminated-clause errors
    let mut pending: Option<(usize, &str)> = None;
    let mut last_line = 1;

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        last_line = number;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }
        if trimmed == "%" {
            break;
        }
        if trimmed.starts_with('p') {
            if header.is_some() {
                return Err(MalformedInputError::new(number, line, "duplicate problem line"));
            }
            header = Some(Header::parse(number, trimmed)?);
            continue;
        }

        let declared = match header {
            Some(declared) => declared,
            None => {
                return Err(MalformedInputError::new(
                    number,
                    line,
                    "clause data before the `p cnf` header",
                ))
            }
        };

        for word in trimmed.split_whitespace() {
            let value = word.parse::<i32>().map_err(|_| {
                MalformedInputError::new(number, line, format!("`{}` is not an integer literal", word))
            })?;

            if clauses.len() == declared.clause_count {
                return Err(MalformedInputError::new(
                    number,
                    line,
                    format!("clause data beyond the {} declared clauses", declared.clause_count),
                ));
            }

            match Literal::new(value) {
                // 0 terminates the clause under construction, possibly an empty one
                None => {
                    clauses.push(Clause::new(std::mem::take(&mut current)));
                    pending = None;
                }
                Some(literal) => {
                    if literal.variable() > declared.variable_count {
                        return Err(MalformedInputError::new(
                            number,
                            line,
                            format!(
                                "variable {} outside [1, {}]",
                                literal.variable(),
                                declared.variable_count
                            ),
                        ));
                    }
                    if pending.is_none() {
                        pending = Some((number, line));
                    }
                    current.push(literal);
                }
            }
        }
    }

    let declared = match header {
        Some(declared) => declared,
        None => {
            return Err(MalformedInputError::new(
                last_line,
                "",
                "missing `p cnf <variables> <clauses>` header",
            ))
        }
    };

    if let Some((number, line)) = pending {
        return Err(MalformedInputError::new(number, line, "clause is not terminated by 0"));
    }

    if clauses.len() < declared.clause_count {
        return Err(MalformedInputError::new(
            last_line,
            "",
            format!(
                "expected {} clauses, found {}",
                declared.clause_count,
                clauses.len()
            ),
        ));
    }

    Ok(Formula::new(declared.variable_count, clauses))
}
