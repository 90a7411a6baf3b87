//! Blitsat is a [CDCL][cdcl] based SAT solver core. Given a boolean formula in
//! [conjunctive normal form][cnf], it either finds a variable assignment that makes the formula
//! true or derives the empty clause, proving that this is impossible.
//!
//! Binary and ternary clauses exist only as entries of the watch lists. Larger clauses are kept in
//! flat arenas, one for irredundant clauses and one per glue level for learned clauses. The solver
//! is incremental: clauses can be added between calls to [`Solver::solve`](solver::Solver::solve),
//! and every call can use a different set of assumptions.
//!
//! [cdcl]: https://en.wikipedia.org/wiki/Conflict-Driven_Clause_Learning
//! [cnf]: https://en.wikipedia.org/wiki/Conjunctive_normal_form

pub mod config;
pub mod exchange;
pub mod inprocess;
pub mod solver;

mod analyze_conflict;
mod assumptions;
mod cdcl;
mod clause;
mod context;
mod decision;
mod glue;
mod load;
mod model;
mod prop;
mod schedule;
mod simplify;
mod state;
mod tmp;
mod variables;

pub use blitsat_formula::{cnf, lit, CnfFormula, ExtendFormula, Lit, Var};

pub use clause::{Bucket, ClauseHandle, LongRef};
pub use config::{SolverConfig, SolverConfigUpdate};
pub use exchange::Exchange;
pub use inprocess::{InprocessingAccess, Inprocessor};
pub use prop::Watch;
pub use solver::{SolveResult, Solver, SolverError};
pub use variables::VarType;

pub mod dimacs {
    //! DIMCAS CNF parser and writer.
    pub use blitsat_dimacs::*;
}
