//! Model reconstruction.
//!
//! Inprocessors may remove clauses of a variable when eliminating or substituting it. Those
//! clauses are recorded on an extension stack together with the pivot literal. After the search
//! found a satisfying assignment for the remaining clauses, the stack is replayed in reverse: each
//! recorded clause that is not satisfied gets satisfied by flipping its pivot.

use partial_ref::{partial, PartialRef};

use blitsat_formula::Lit;

use crate::context::{parts::*, Context};

/// A clause removed from the formula, satisfied by setting the pivot if necessary.
#[derive(Clone, Debug)]
struct ExtensionClause {
    pivot: Lit,
    clause: Vec<Lit>,
}

/// Extension stack and reconstructed model.
#[derive(Default, Clone)]
pub struct Extension {
    stack: Vec<ExtensionClause>,
    /// Whenever the solver state is SAT this is a model of all clauses ever added.
    model: Vec<Option<bool>>,
}

impl Extension {
    /// Record a removed clause containing the pivot literal.
    pub fn push(&mut self, pivot: Lit, clause: &[Lit]) {
        debug_assert!(clause.contains(&pivot));
        self.stack.push(ExtensionClause {
            pivot,
            clause: clause.to_vec(),
        });
    }

    /// Number of recorded clauses.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// The reconstructed model, only valid if the solver state is SAT.
    pub fn model(&self) -> &[Option<bool>] {
        &self.model
    }

    /// Value of a literal in the reconstructed model.
    ///
    /// Returns `None` for variables unknown to the solver.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.model
            .get(lit.index())
            .cloned()
            .flatten()
            .map(|value| value ^ lit.is_negative())
    }
}

/// Extend the current full assignment to a model of all clauses.
pub fn reconstruct_model(mut ctx: partial!(Context, mut ExtensionP, AssignmentP)) {
    let (extension, ctx) = ctx.split_part_mut(ExtensionP);
    let Extension { stack, model } = extension;

    model.clear();
    // Variables without value were removed from all clauses, any value works for them.
    model.extend(
        ctx.part(AssignmentP)
            .assignment()
            .iter()
            .map(|value| Some(value.unwrap_or(false))),
    );

    for entry in stack.iter().rev() {
        let satisfied = entry
            .clause
            .iter()
            .any(|&lit| model[lit.index()] == Some(lit.is_positive()));
        if !satisfied {
            model[entry.pivot.index()] = Some(entry.pivot.is_positive());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use blitsat_formula::{lit, lits};

    use crate::context::set_var_count;
    use crate::prop::{enqueue_assignment, Reason};

    #[test]
    fn replay_in_reverse() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 4);

        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Unit);
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Unit);

        // 4 was substituted by -3, then 3 was eliminated from (3 v 2) and (-3 v -1 v 2)
        let extension = ctx.part_mut(ExtensionP);
        extension.push(lit!(4), &lits![4, 3]);
        extension.push(lit!(-4), &lits![-4, -3]);
        extension.push(lit!(3), &lits![3, 2]);
        extension.push(lit!(-3), &lits![-3, -1, 2]);

        reconstruct_model(ctx.borrow());

        let extension = ctx.part(ExtensionP);
        assert_eq!(extension.lit_value(lit!(1)), Some(false));
        assert_eq!(extension.lit_value(lit!(3)), Some(true));
        assert_eq!(extension.lit_value(lit!(4)), Some(false));
        assert_eq!(extension.lit_value(lit!(7)), None);
        assert_eq!(extension.len(), 4);
    }
}
