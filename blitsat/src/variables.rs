//! Per variable metadata.
//!
//! Values, levels and reasons live in [`Assignment`](crate::prop::Assignment) and
//! [`ImplGraph`](crate::prop::ImplGraph). This holds the remaining per variable state: the variable
//! type, the freeze count and scratch marks used by graph algorithms.

use blitsat_formula::{Lit, Var};

/// How a variable is represented in the current formula.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VarType {
    /// Unassigned or assigned during search.
    Free,
    /// Permanently assigned at the root level and removed from all clauses.
    Fixed,
    /// Removed by an inprocessor, its value is reconstructed from the extension stack.
    Eliminated,
    /// Replaced by an equivalent literal.
    Substituted(Lit),
}

impl Default for VarType {
    fn default() -> VarType {
        VarType::Free
    }
}

/// Scratch mark bits of a variable.
///
/// All marks must be cleared again by the algorithm setting them.
pub mod mark {
    /// Part of the clause under construction.
    pub const SEEN: u8 = 1;
    /// Known to not be implied by the learned clause.
    pub const POISON: u8 = 1 << 1;
    /// Known to be implied by the learned clause.
    pub const REMOVABLE: u8 = 1 << 2;
}

/// Data associated with a variable.
#[derive(Copy, Clone, Default)]
pub struct VarData {
    pub var_type: VarType,
    /// Number of outstanding `freeze` calls.
    pub frozen: u32,
    pub marks: u8,
}

/// Per variable metadata.
#[derive(Default, Clone)]
pub struct Variables {
    data: Vec<VarData>,
}

impl Variables {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.data.resize(count, VarData::default());
    }

    pub fn var_count(&self) -> usize {
        self.data.len()
    }

    pub fn var_data(&self, var: Var) -> &VarData {
        &self.data[var.index()]
    }

    pub fn var_data_mut(&mut self, var: Var) -> &mut VarData {
        &mut self.data[var.index()]
    }

    pub fn var_type(&self, var: Var) -> VarType {
        self.data[var.index()].var_type
    }

    pub fn is_frozen(&self, var: Var) -> bool {
        self.data[var.index()].frozen > 0
    }

    /// Whether a given mark is set.
    #[inline]
    pub fn marked(&self, var: Var, mark: u8) -> bool {
        self.data[var.index()].marks & mark != 0
    }

    #[inline]
    pub fn set_mark(&mut self, var: Var, mark: u8) {
        self.data[var.index()].marks |= mark;
    }

    #[inline]
    pub fn unset_mark(&mut self, var: Var, mark: u8) {
        self.data[var.index()].marks &= !mark;
    }

    /// Clear all marks of a variable.
    #[inline]
    pub fn clear_marks(&mut self, var: Var) {
        self.data[var.index()].marks = 0;
    }

    /// Whether no variable has any marks set.
    ///
    /// Linear in the number of variables, used for debug assertions.
    pub fn all_marks_clear(&self) -> bool {
        self.data.iter().all(|data| data.marks == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use blitsat_formula::var;

    #[test]
    fn marks_are_independent() {
        let mut variables = Variables::default();
        variables.set_var_count(3);

        variables.set_mark(var!(2), mark::SEEN);
        variables.set_mark(var!(2), mark::REMOVABLE);

        assert!(variables.marked(var!(2), mark::SEEN));
        assert!(!variables.marked(var!(2), mark::POISON));
        assert!(!variables.marked(var!(1), mark::SEEN));
        assert!(!variables.all_marks_clear());

        variables.clear_marks(var!(2));
        assert!(variables.all_marks_clear());
    }
}
