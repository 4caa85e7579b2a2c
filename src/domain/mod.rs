pub mod aggregate;
pub mod coordinator;
pub mod dimacs;
pub mod encode;
pub mod formula;
pub mod identity;
pub mod load;
pub mod lp_format;
pub mod outcome;
pub mod program;
pub mod registry;
pub mod solve;
pub mod solver;
pub mod solver_factory;
pub mod solvers;
pub mod validate;
