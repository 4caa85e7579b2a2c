//! Decide satisfiability of CNF formulas by encoding them as 0/1 integer programs and
//! running them against a configurable set of ILP solvers.

pub mod cache;
pub mod config;
pub mod convert;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod models;
