//! CPLEX-LP text for linear programs.
//!
//! [`render`] writes the form handed to external solver executables and saved as `.lpt`
//! files; [`parse`] loads such files back without going through DIMACS again.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use crate::domain::program::{Bound, Constraint, LinearProgram, Relation, Sense, Term, Variable};
use crate::error::MalformedInputError;

const UNBOUNDED: i32 = i32::MAX;

/// Render `program` as CPLEX-LP text.
pub fn render(program: &LinearProgram) -> String {
    let mut out = String::new();
    let placeholder = program.variables.first().map(|v| v.id.as_str());

    let _ = writeln!(out, "\\ {}", program.name);
    let _ = writeln!(
        out,
        "{}",
        match program.sense {
            Sense::Minimize => "Minimize",
            Sense::Maximize => "Maximize",
        }
    );
    let _ = writeln!(
        out,
        " obj: {}",
        render_expression(program, &program.objective, placeholder)
    );

    let _ = writeln!(out, "Subject To");
    for constraint in &program.constraints {
        let (coefficients, rhs) = constraint.linear_form();
        let _ = writeln!(
            out,
            " {}: {} {} {}",
            constraint.name,
            render_expression(program, &coefficients, placeholder),
            constraint.relation,
            rhs
        );
    }

    let (binaries, generals): (Vec<&Variable>, Vec<&Variable>) =
        program.variables.iter().partition(|v| v.bound == (0, 1));

    if !generals.is_empty() {
        let _ = writeln!(out, "Bounds");
        for variable in &generals {
            let (lower, upper) = variable.bound;
            if upper == UNBOUNDED {
                let _ = writeln!(out, " {} >= {}", variable.id, lower);
            } else {
                let _ = writeln!(out, " {} <= {} <= {}", lower, variable.id, upper);
            }
        }
    }

    if !binaries.is_empty() {
        let _ = writeln!(out, "Binary");
        for variable in &binaries {
            let _ = writeln!(out, " {}", variable.id);
        }
    }

    if !generals.is_empty() {
        let _ = writeln!(out, "General");
        for variable in &generals {
            let _ = writeln!(out, " {}", variable.id);
        }
    }

    out.push_str("End\n");
    out
}

fn render_expression(
    program: &LinearProgram,
    coefficients: &[(usize, i32)],
    placeholder: Option<&str>,
) -> String {
    if coefficients.is_empty() {
        // LP readers want at least one variable per row
        return match placeholder {
            Some(id) => format!("0 {}", id),
            None => "0".to_string(),
        };
    }

    let mut text = String::new();
    for (position, &(variable, coefficient)) in coefficients.iter().enumerate() {
        let id = program
            .variables
            .get(variable)
            .map(|v| v.id.as_str())
            .unwrap_or("?");

        match (position, coefficient < 0) {
            (0, true) => text.push_str("- "),
            (0, false) => {}
            (_, true) => text.push_str(" - "),
            (_, false) => text.push_str(" + "),
        }
        let magnitude = coefficient.unsigned_abs();
        if magnitude != 1 {
            let _ = write!(text, "{} ", magnitude);
        }
        text.push_str(id);
    }
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Objective,
    Constraints,
    Bounds,
    Binary,
    General,
    End,
}

fn section_keyword(line: &str) -> Option<(Section, Option<Sense>)> {
    let normalized = line
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    match normalized.as_str() {
        "minimize" | "minimise" | "minimum" | "min" => Some((Section::Objective, Some(Sense::Minimize))),
        "maximize" | "maximise" | "maximum" | "max" => Some((Section::Objective, Some(Sense::Maximize))),
        "subject to" | "such that" | "st" | "s.t." => Some((Section::Constraints, None)),
        "bounds" | "bound" => Some((Section::Bounds, None)),
        "binary" | "binaries" | "bin" => Some((Section::Binary, None)),
        "general" | "generals" | "gen" => Some((Section::General, None)),
        "end" => Some((Section::End, None)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Plus,
    Minus,
    Number(i64),
    Name(String),
    Rel(Relation),
}

fn tokenize(number: usize, line: &str, text: &str) -> Result<Vec<Token>, MalformedInputError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '+' {
            tokens.push(Token::Plus);
            i += 1;
        } else if c == '-' {
            tokens.push(Token::Minus);
            i += 1;
        } else if matches!(c, '<' | '>' | '=') {
            let start = i;
            while i < chars.len() && matches!(chars[i], '<' | '>' | '=') {
                i += 1;
            }
            let symbol: String = chars[start..i].iter().collect();
            let relation = match symbol.as_str() {
                "<=" | "=<" | "<" => Relation::Le,
                ">=" | "=>" | ">" => Relation::Ge,
                "=" => Relation::Eq,
                _ => {
                    return Err(MalformedInputError::new(
                        number,
                        line,
                        format!("unknown relation `{}`", symbol),
                    ))
                }
            };
            tokens.push(Token::Rel(relation));
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal.parse::<i64>().map_err(|_| {
                MalformedInputError::new(
                    number,
                    line,
                    format!("`{}` is not an integer coefficient", literal),
                )
            })?;
            tokens.push(Token::Number(value));
        } else {
            let start = i;
            while i < chars.len()
                && !chars[i].is_whitespace()
                && !matches!(chars[i], '+' | '-' | '<' | '>' | '=' | ':')
            {
                i += 1;
            }
            if i == start {
                return Err(MalformedInputError::new(
                    number,
                    line,
                    format!("unexpected character `{}`", c),
                ));
            }
            tokens.push(Token::Name(chars[start..i].iter().collect()));
        }
    }

    Ok(tokens)
}

fn to_i32(number: usize, line: &str, value: i64) -> Result<i32, MalformedInputError> {
    i32::try_from(value).map_err(|_| {
        MalformedInputError::new(number, line, format!("coefficient {} is out of range", value))
    })
}

fn out_of_range(number: usize, line: &str) -> MalformedInputError {
    MalformedInputError::new(number, line, "constant out of range")
}

/// A linear expression over variable names plus a constant part.
type Expression = (Vec<(String, i32)>, i32);

fn parse_expression(
    number: usize,
    line: &str,
    tokens: &[Token],
) -> Result<Expression, MalformedInputError> {
    let mut terms = Vec::new();
    let mut constant: i32 = 0;
    let mut i = 0;

    while i < tokens.len() {
        let mut sign: i32 = 1;
        let mut signed = false;
        while let Some(token @ (Token::Plus | Token::Minus)) = tokens.get(i) {
            if *token == Token::Minus {
                sign = -sign;
            }
            signed = true;
            i += 1;
        }

        let coefficient = match tokens.get(i) {
            Some(Token::Number(value)) => {
                i += 1;
                Some(to_i32(number, line, *value)?)
            }
            _ => None,
        };

        match tokens.get(i) {
            Some(Token::Name(name)) => {
                terms.push((name.clone(), sign * coefficient.unwrap_or(1)));
                i += 1;
            }
            _ => match coefficient {
                Some(value) => {
                    constant = constant
                        .checked_add(sign * value)
                        .ok_or_else(|| out_of_range(number, line))?
                }
                None if signed => {
                    return Err(MalformedInputError::new(number, line, "sign without a term"))
                }
                None => {
                    return Err(MalformedInputError::new(
                        number,
                        line,
                        "expected a variable or a coefficient",
                    ))
                }
            },
        }
    }

    Ok((terms, constant))
}

fn split_label<'a>(text: &'a str) -> (Option<&'a str>, &'a str) {
    match text.split_once(':') {
        Some((label, rest)) if !label.trim().is_empty() => (Some(label.trim()), rest),
        Some((_, rest)) => (None, rest),
        None => (None, text),
    }
}

struct RawConstraint {
    name: String,
    terms: Vec<(String, i32)>,
    relation: Relation,
    rhs: i32,
}

fn parse_constraint(
    number: usize,
    line: &str,
    default_name: String,
) -> Result<RawConstraint, MalformedInputError> {
    let (label, body) = split_label(line.trim());
    let tokens = tokenize(number, line, body)?;

    let (split, relation) = tokens
        .iter()
        .enumerate()
        .find_map(|(i, t)| match t {
            Token::Rel(relation) => Some((i, *relation)),
            _ => None,
        })
        .ok_or_else(|| MalformedInputError::new(number, line, "constraint has no relation"))?;

    let (terms, constant) = parse_expression(number, line, &tokens[..split])?;
    let (rhs_terms, rhs_constant) = parse_expression(number, line, &tokens[split + 1..])?;
    if !rhs_terms.is_empty() || tokens.len() == split + 1 {
        return Err(MalformedInputError::new(
            number,
            line,
            "right-hand side must be a single integer",
        ));
    }

    Ok(RawConstraint {
        name: label.map(str::to_string).unwrap_or(default_name),
        terms,
        relation,
        rhs: rhs_constant
            .checked_sub(constant)
            .ok_or_else(|| out_of_range(number, line))?,
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct BoundUpdate {
    lower: Option<i32>,
    upper: Option<i32>,
}

fn parse_bound(number: usize, line: &str) -> Result<(String, BoundUpdate), MalformedInputError> {
    let tokens = tokenize(number, line, line)?;

    // Fold signs into numbers: bounds only contain signed constants and one name
    let mut items: Vec<Token> = Vec::new();
    let mut negate = false;
    for token in tokens {
        match token {
            Token::Minus => negate = !negate,
            Token::Plus => {}
            Token::Number(value) => {
                items.push(Token::Number(if negate { -value } else { value }));
                negate = false;
            }
            other => items.push(other),
        }
    }

    let num = |value: &i64| to_i32(number, line, *value);
    let invalid = || MalformedInputError::new(number, line, "unsupported bound");

    let update = match items.as_slice() {
        [Token::Number(lo), Token::Rel(Relation::Le), Token::Name(name), Token::Rel(Relation::Le), Token::Number(hi)] => {
            (name.clone(), BoundUpdate { lower: Some(num(lo)?), upper: Some(num(hi)?) })
        }
        [Token::Number(hi), Token::Rel(Relation::Ge), Token::Name(name), Token::Rel(Relation::Ge), Token::Number(lo)] => {
            (name.clone(), BoundUpdate { lower: Some(num(lo)?), upper: Some(num(hi)?) })
        }
        [Token::Name(name), Token::Rel(relation), Token::Number(value)] => {
            let value = num(value)?;
            let update = match relation {
                Relation::Le => BoundUpdate { lower: None, upper: Some(value) },
                Relation::Ge => BoundUpdate { lower: Some(value), upper: None },
                Relation::Eq => BoundUpdate { lower: Some(value), upper: Some(value) },
            };
            (name.clone(), update)
        }
        [Token::Number(value), Token::Rel(relation), Token::Name(name)] => {
            let value = num(value)?;
            let update = match relation {
                Relation::Le => BoundUpdate { lower: Some(value), upper: None },
                Relation::Ge => BoundUpdate { lower: None, upper: Some(value) },
                Relation::Eq => BoundUpdate { lower: Some(value), upper: Some(value) },
            };
            (name.clone(), update)
        }
        _ => return Err(invalid()),
    };

    Ok(update)
}

/// Keeps variables in a stable order while resolving names to column indices.
#[derive(Default)]
struct Columns {
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    fn intern(&mut self, id: &str) -> usize {
        if let Some(&column) = self.index.get(id) {
            return column;
        }
        let column = self.ids.len();
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), column);
        column
    }
}

/// Load a CPLEX-LP text as a [`LinearProgram`] named `name`.
///
/// Variables listed under `Binary`/`General` come first in listed order, then any other
/// variable in order of first appearance.
pub fn parse(name: &str, text: &str) -> Result<LinearProgram, MalformedInputError> {
    let mut section = Section::Preamble;
    let mut sense = Sense::Minimize;
    let mut objective_text = String::new();
    let mut objective_line = (0, String::new());
    let mut constraints: Vec<RawConstraint> = Vec::new();
    let mut constraint_names: HashSet<String> = HashSet::new();
    let mut bounds: Vec<(String, BoundUpdate)> = Vec::new();
    let mut declared: Vec<(String, bool)> = Vec::new();
    let mut seen_end = false;

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('\\') {
            continue;
        }
        if let Some((next, declared_sense)) = section_keyword(trimmed) {
            section = next;
            if let Some(declared_sense) = declared_sense {
                sense = declared_sense;
            }
            if section == Section::End {
                seen_end = true;
                break;
            }
            continue;
        }

        match section {
            Section::Preamble => {
                return Err(MalformedInputError::new(
                    number,
                    line,
                    "expected a section keyword such as `Minimize` or `Subject To`",
                ))
            }
            Section::Objective => {
                if objective_text.is_empty() {
                    objective_line = (number, line.to_string());
                }
                objective_text.push(' ');
                objective_text.push_str(trimmed);
            }
            Section::Constraints => {
                let raw = parse_constraint(number, line, format!("c{}", constraints.len() + 1))?;
                if !constraint_names.insert(raw.name.clone()) {
                    return Err(MalformedInputError::new(
                        number,
                        line,
                        format!("duplicate constraint name `{}`", raw.name),
                    ));
                }
                constraints.push(raw);
            }
            Section::Bounds => bounds.push(parse_bound(number, line)?),
            Section::Binary | Section::General => {
                for word in trimmed.split_whitespace() {
                    declared.push((word.to_string(), section == Section::Binary));
                }
            }
            Section::End => break,
        }
    }

    if !seen_end {
        let last = text.lines().count().max(1);
        return Err(MalformedInputError::new(last, "", "missing `End`"));
    }

    let (objective_number, objective_source) = objective_line;
    let (_, objective_body) = split_label(objective_text.trim());
    let objective_tokens = tokenize(objective_number, &objective_source, objective_body)?;
    let (objective_terms, _) =
        parse_expression(objective_number, &objective_source, &objective_tokens)?;

    let mut columns = Columns::default();
    for (id, _) in &declared {
        columns.intern(id);
    }
    let objective: Vec<(usize, i32)> = objective_terms
        .iter()
        .filter(|(_, coefficient)| *coefficient != 0)
        .map(|(id, coefficient)| (columns.intern(id), *coefficient))
        .collect();
    let constraints: Vec<Constraint> = constraints
        .into_iter()
        .map(|raw| Constraint {
            terms: raw
                .terms
                .iter()
                .map(|(id, coefficient)| Term {
                    coefficient: *coefficient,
                    variable: columns.intern(id),
                    complemented: false,
                })
                .collect(),
            name: raw.name,
            relation: raw.relation,
            rhs: raw.rhs,
        })
        .collect();
    for (id, _) in &bounds {
        columns.intern(id);
    }

    let mut variable_bounds: Vec<Bound> = vec![(0, UNBOUNDED); columns.ids.len()];
    for (id, binary) in &declared {
        if *binary {
            variable_bounds[columns.index[id]] = (0, 1);
        }
    }
    for (id, update) in &bounds {
        let bound = &mut variable_bounds[columns.index[id]];
        if let Some(lower) = update.lower {
            bound.0 = lower;
        }
        if let Some(upper) = update.upper {
            bound.1 = upper;
        }
    }

    let variables = columns
        .ids
        .into_iter()
        .zip(variable_bounds)
        .map(|(id, bound)| Variable { id, bound })
        .collect();

    Ok(LinearProgram {
        name: name.to_string(),
        variables,
        constraints,
        sense,
        objective,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{dimacs, encode};

    fn encoded(text: &str) -> LinearProgram {
        encode::encode(&dimacs::parse(text).unwrap(), "example").unwrap()
    }

    #[test]
    fn test_render_given_example_should_normalize_complements() {
        let text = render(&encoded("p cnf 2 2\n1 -2 0\n-1 2 0\n"));

        assert!(text.contains("Minimize\n obj: 0 x1\n"));
        assert!(text.contains(" c1: x1 - x2 >= 0\n"));
        assert!(text.contains(" c2: - x1 + x2 >= 0\n"));
        assert!(text.contains("Binary\n x1\n x2\n"));
        assert!(text.ends_with("End\n"));
    }

    #[test]
    fn test_render_given_empty_clause_should_keep_row() {
        let text = render(&encoded("p cnf 1 1\n0\n"));
        assert!(text.contains(" c1: 0 x1 >= 1\n"));
    }

    #[test]
    fn test_parse_given_rendered_program_should_preserve_constraints() {
        let program = encoded("p cnf 3 3\n1 -2 3 0\n0\n-3 -1 0\n");

        let reloaded = parse("example", &render(&program)).unwrap();

        assert_eq!(reloaded.variables, program.variables);
        assert_eq!(reloaded.constraints.len(), program.constraints.len());
        for (left, right) in reloaded.constraints.iter().zip(&program.constraints) {
            assert_eq!(left.name, right.name);
            assert_eq!(left.relation, right.relation);
            assert_eq!(left.linear_form(), right.linear_form());
        }
    }

    #[test]
    fn test_parse_given_legacy_layout_should_load() {
        let text = "Maximize\n  Obj: z\nSubject To\n  C1: - z1 + z2 >= 0\n  C2: z1 + z2 >= 1\nBinary\n  z\n  z1\n  z2\nEnd";

        let program = parse("legacy", text).unwrap();

        let ids: Vec<&str> = program.variables.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "z1", "z2"]);
        assert_eq!(program.sense, Sense::Maximize);
        assert_eq!(program.objective, vec![(0, 1)]);
        assert_eq!(program.constraints[0].name, "C1");
        assert_eq!(program.constraints[0].linear_form(), (vec![(1, -1), (2, 1)], 0));
        assert_eq!(program.constraints[1].rhs, 1);
    }

    #[test]
    fn test_parse_given_bounds_and_generals_should_apply_them() {
        let text = "Minimize\n obj: 2 y\nSubject To\n y + x >= 3\nBounds\n 1 <= y <= 5\n x <= 4\nBinary\n b\nGeneral\n y\nEnd\n";

        let program = parse("bounded", text).unwrap();

        let y = program.variable_index("y").unwrap();
        let x = program.variable_index("x").unwrap();
        assert_eq!(program.variables[y].bound, (1, 5));
        assert_eq!(program.variables[x].bound, (0, 4));
        assert_eq!(program.variables[program.variable_index("b").unwrap()].bound, (0, 1));
        assert_eq!(program.constraints[0].name, "c1");
    }

    #[test]
    fn test_parse_given_missing_relation_should_report_line() {
        let error = parse("bad", "Minimize\n obj: x\nSubject To\n c1: x + y\nEnd\n").unwrap_err();
        assert_eq!(error.line, 4);
    }

    #[test]
    fn test_parse_given_fractional_coefficient_should_fail() {
        let error = parse("bad", "Minimize\n obj: x\nSubject To\n c1: 0.5 x >= 1\nEnd\n").unwrap_err();
        assert!(error.reason.contains("integer"));
    }

    #[test]
    fn test_parse_given_text_before_sections_should_fail() {
        assert!(parse("bad", "x + y >= 1\nEnd\n").is_err());
    }

    #[test]
    fn test_parse_given_no_end_should_fail() {
        let error = parse("bad", "Minimize\n obj: x\nSubject To\n c1: x >= 1\n").unwrap_err();
        assert!(error.reason.contains("End"));
    }

    #[test]
    fn test_parse_given_constant_out_of_range_should_fail() {
        let text = "Minimize\n obj: x1\nSubject To\n c1: x1 + 2147483647 >= -2\nEnd\n";

        let error = parse("big", text).unwrap_err();

        assert_eq!(error.line, 4);
        assert!(error.reason.contains("out of range"));
    }

    #[test]
    fn test_parse_given_duplicate_constraint_name_should_fail() {
        let text = "Minimize\n obj: x\nSubject To\n c1: x >= 0\n c1: x <= 1\nEnd\n";

        let error = parse("twice", text).unwrap_err();

        assert_eq!(error.line, 5);
        assert!(error.reason.contains("duplicate constraint name"));
    }
}
