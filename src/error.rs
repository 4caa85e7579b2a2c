use std::path::PathBuf;

use thiserror::Error;

/// Rejected input text, pointing at the offending line (1-based).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct MalformedInputError {
    pub line: usize,
    pub content: String,
    pub reason: String,
}

impl MalformedInputError {
    pub fn new(line: usize, content: &str, reason: impl Into<String>) -> Self {
        MalformedInputError {
            line,
            content: content.trim().to_string(),
            reason: reason.into(),
        }
    }
}

/// A formula that should have been rejected by the parser reached the encoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("clause {clause} references literal {literal} outside [1, {variable_count}]")]
pub struct EncodingInvariantError {
    pub clause: usize,
    pub literal: i32,
    pub variable_count: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("solver `{name}` is already registered with handle {existing}, refusing {requested}")]
pub struct DuplicateNameError {
    pub name: String,
    pub existing: String,
    pub requested: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateNameError),

    #[error("no solver named `{0}` is registered")]
    UnknownSolver(String),

    #[error("invalid solver handle `{0}`")]
    InvalidHandle(String),
}

/// Structural problem with a linear program handed to a backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{details}")]
pub struct ProgramError {
    pub details: String,
}

/// Failure of a single solver invocation. Recorded on the run, never fatal to a session.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("solver executable not found: {}", .0.display())]
    MissingExecutable(PathBuf),

    #[error("solver invocation interrupted")]
    Interrupted,

    #[error("invalid program: {0}")]
    InvalidProgram(#[from] ProgramError),

    #[error("solver backend failed: {0}")]
    Backend(String),

    #[error("solver backend `{0}` is not compiled into this build")]
    Unavailable(String),

    #[error("I/O error while running solver: {0}")]
    Io(#[from] std::io::Error),
}

/// Why one problem of a batch could not be turned into a linear program.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInputError),

    #[error("encoding invariant violated: {0}")]
    Encoding(#[from] EncodingInvariantError),

    #[error("invalid program: {0}")]
    Program(#[from] ProgramError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid SOLVERS entry `{entry}`: {reason}")]
    InvalidSolverEntry { entry: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
