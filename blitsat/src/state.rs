//! Miscellaneous solver state.
use blitsat_formula::Lit;

use crate::solver::SolverError;

/// Satisfiability state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
    UnsatUnderAssumptions,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a separate
/// part of [`Context`](crate::context::Context).
#[derive(Clone)]
pub struct SolverState {
    pub sat_state: SatState,
    /// Set when a resource limit was hit while the solver state was modified.
    pub solver_error: Option<SolverError>,
    /// Root level units found since they were last handed to an exchange.
    pub new_units: Vec<Lit>,
    /// Substitutions `(var, lit)` made since they were last handed to an exchange.
    pub new_equivalences: Vec<(Lit, Lit)>,
    /// Conflicts since the solver was created.
    pub conflicts: u64,
}

impl Default for SolverState {
    fn default() -> SolverState {
        SolverState {
            sat_state: SatState::Unknown,
            solver_error: None,
            new_units: vec![],
            new_equivalences: vec![],
            conflicts: 0,
        }
    }
}
