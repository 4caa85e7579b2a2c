use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::Serialize;

use crate::domain::identity::{Origin, ProblemIdentity};
use crate::domain::program::LinearProgram;
use crate::domain::validate::validate_program;
use crate::domain::{dimacs, encode, lp_format};
use crate::error::LoadError;

/// One submitted input: a file name and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemInput {
    pub name: String,
    pub content: String,
}

impl ProblemInput {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        ProblemInput {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A problem ready to be dispatched: its identity and the program to solve.
#[derive(Debug, Clone)]
pub struct LoadedProblem {
    pub identity: ProblemIdentity,
    pub source: String,
    pub origin: Origin,
    pub program: Arc<LinearProgram>,
    /// Time spent parsing and encoding (or reading the program text).
    pub load_time: Duration,
}

/// A problem that never reached the solvers, kept so it shows up in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    pub identity: ProblemIdentity,
    pub source: String,
    pub origin: Origin,
    pub reason: String,
}

fn build_program(identity: &ProblemIdentity, origin: Origin, text: &str) -> Result<LinearProgram, LoadError> {
    let program = match origin {
        Origin::Dimacs => {
            let formula = dimacs::parse(text)?;
            encode::encode(&formula, identity.as_str())?
        }
        Origin::Ilp => lp_format::parse(identity.as_str(), text)?,
    };
    validate_program(&program)?;
    Ok(program)
}

/// Parse and encode one input. The file extension picks DIMACS or LP text.
pub fn load(input: &ProblemInput) -> Result<LoadedProblem, LoadFailure> {
    let identity = ProblemIdentity::from_file_name(&input.name);
    let origin = Origin::from_file_name(&input.name);
    let start = Instant::now();

    match build_program(&identity, origin, &input.content) {
        Ok(program) => {
            debug!(
                "Loaded {} as {:?}: {} variables, {} constraints",
                input.name,
                origin,
                program.variables.len(),
                program.constraints.len()
            );
            Ok(LoadedProblem {
                identity,
                source: input.name.clone(),
                origin,
                program: Arc::new(program),
                load_time: start.elapsed(),
            })
        }
        Err(error) => {
            warn!("Rejected {}: {}", input.name, error);
            Err(LoadFailure {
                identity,
                source: input.name.clone(),
                origin,
                reason: error.to_string(),
            })
        }
    }
}

/// Read a file from disk and [`load`] it under its file name.
pub fn load_file(path: &Path) -> Result<LoadedProblem, LoadFailure> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match std::fs::read_to_string(path) {
        Ok(content) => load(&ProblemInput::new(name, content)),
        Err(source) => {
            let error = LoadError::Io {
                path: path.to_path_buf(),
                source,
            };
            warn!("Rejected {}: {}", name, error);
            Err(LoadFailure {
                identity: ProblemIdentity::from_file_name(&name),
                origin: Origin::from_file_name(&name),
                source: name,
                reason: error.to_string(),
            })
        }
    }
}

/// Load every input independently; a bad input never stops the others.
pub fn load_batch(inputs: &[ProblemInput]) -> Vec<Result<LoadedProblem, LoadFailure>> {
    inputs.iter().map(load).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_given_dimacs_should_encode() {
        let loaded = load(&ProblemInput::new("foo.cnf", "p cnf 2 2\n1 -2 0\n-1 2 0\n")).unwrap();

        assert_eq!(loaded.identity.as_str(), "foo");
        assert_eq!(loaded.origin, Origin::Dimacs);
        assert_eq!(loaded.program.variables.len(), 2);
        assert_eq!(loaded.program.constraints.len(), 2);
    }

    #[test]
    fn test_load_given_lp_text_should_not_reencode() {
        let text = "Minimize\n obj: 0 x1\nSubject To\n c1: x1 >= 1\nBinary\n x1\nEnd\n";

        let loaded = load(&ProblemInput::new("foo.lpt", text)).unwrap();

        assert_eq!(loaded.identity.as_str(), "foo");
        assert_eq!(loaded.origin, Origin::Ilp);
        assert_eq!(loaded.program.constraints.len(), 1);
    }

    #[test]
    fn test_load_batch_should_collect_failures_per_problem() {
        let inputs = vec![
            ProblemInput::new("good.cnf", "p cnf 1 1\n1 0\n"),
            ProblemInput::new("bad.cnf", "p cnf 1 2\n1 0\n"),
            ProblemInput::new("also_good.cnf", "p cnf 1 1\n-1 0\n"),
        ];

        let results = load_batch(&inputs);

        assert!(results[0].is_ok());
        let failure = results[1].as_ref().unwrap_err();
        assert_eq!(failure.identity.as_str(), "bad");
        assert!(failure.reason.contains("expected 2 clauses"));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_load_file_given_missing_file_should_fail() {
        let dir = tempfile::tempdir().unwrap();
        let failure = load_file(&dir.path().join("missing.cnf")).unwrap_err();
        assert_eq!(failure.source, "missing.cnf");
    }

    #[test]
    fn test_load_file_should_use_file_name() {
        let mut file = tempfile::Builder::new().suffix(".cnf").tempfile().unwrap();
        write!(file, "p cnf 1 1\n1 0\n").unwrap();

        let loaded = load_file(file.path()).unwrap();

        assert!(loaded.source.ends_with(".cnf"));
        assert_eq!(loaded.origin, Origin::Dimacs);
    }
}
