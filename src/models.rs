use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::aggregate::{HistogramData, SummaryEntry};
use crate::domain::identity::Origin;
use crate::domain::load::ProblemInput;
use crate::domain::outcome::RunStatus;
use crate::domain::registry::SolverDescriptor;

// ---------- API (wire) types: owned & serde-friendly ----------

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiProblem {
    /// File name; the extension picks DIMACS (`.cnf`, anything else) or LP text (`.lp`, `.lpt`).
    pub name: String,
    pub content: String,
}

impl From<ApiProblem> for ProblemInput {
    fn from(p: ApiProblem) -> Self {
        ProblemInput::new(p.name, p.content)
    }
}

pub type EncodeRequest = ApiProblem;

#[derive(Serialize, Deserialize, Debug)]
pub struct EncodeResponse {
    pub identity: String,
    pub origin: Origin,
    pub variables: usize,
    pub constraints: usize,
    pub lp: String,
}

#[derive(Deserialize, Debug)]
pub struct SolveRequest {
    pub problems: Vec<ApiProblem>,
    /// Overrides the configured per-run limit for this session.
    pub time_limit_secs: Option<f64>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiEntry {
    Run {
        problem: String,
        source: String,
        solver: String,
        status: RunStatus,
        elapsed_secs: f64,
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        assignment: Option<BTreeMap<String, i64>>,
    },
    LoadFailure {
        problem: String,
        source: String,
        reason: String,
    },
}

impl From<&SummaryEntry> for ApiEntry {
    fn from(entry: &SummaryEntry) -> Self {
        match entry {
            SummaryEntry::Run(o) => ApiEntry::Run {
                problem: o.identity.to_string(),
                source: o.source.clone(),
                solver: o.solver.name.clone(),
                status: o.status,
                elapsed_secs: o.elapsed.as_secs_f64(),
                message: o.message.clone(),
                assignment: o.assignment.clone(),
            },
            SummaryEntry::LoadFailure(f) => ApiEntry::LoadFailure {
                problem: f.identity.to_string(),
                source: f.source.clone(),
                reason: f.reason.clone(),
            },
        }
    }
}

#[derive(Serialize, Debug)]
pub struct SolveResponse {
    pub entries: Vec<ApiEntry>,
    pub histogram: HistogramData,
    pub report: String,
}

#[derive(Deserialize, Debug)]
pub struct RegisterSolverRequest {
    pub name: String,
    /// `glpk`, `highs`, `gurobi` or `<dialect>:<path>`.
    pub handle: String,
    pub enabled: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ApiSolver {
    pub name: String,
    pub handle: String,
    pub enabled: bool,
}

impl From<&SolverDescriptor> for ApiSolver {
    fn from(d: &SolverDescriptor) -> Self {
        ApiSolver {
            name: d.name.clone(),
            handle: d.handle.to_string(),
            enabled: d.enabled,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl ToString) -> Self {
        ApiError {
            error: error.to_string(),
        }
    }
}
