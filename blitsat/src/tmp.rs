//! Temporary data.
use blitsat_formula::{Lit, Var};

/// Temporary data used by various parts of the solver.
///
/// Make sure to check any documented invariants when using this. Also make sure to check all
/// existing users when adding invariants.
#[derive(Default, Clone)]
pub struct TmpData {
    pub lits: Vec<Lit>,
    pub lits_2: Vec<Lit>,
    pub vars: Vec<Var>,
    /// A boolean for each literal.
    ///
    /// Reset to all-false, keep size. Also indexed by decision level, which never exceeds the
    /// variable count.
    pub flags: Vec<bool>,
}

impl TmpData {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.flags.resize(count * 2 + 1, false);
    }
}
