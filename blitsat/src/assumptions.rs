//! Solving under assumptions.
//!
//! Assumptions are enqueued one per decision level, starting at level 1, before any decision is
//! made. An assumption that is already implied gets an empty decision level, so the assumption at
//! index `i` always belongs to level `i + 1`.
use partial_ref::{partial, PartialRef};
use rustc_hash::FxHashSet;

use blitsat_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};
use crate::variables::VarType;

/// Assumptions of the current solve call and the failed core of the last one.
#[derive(Default, Clone)]
pub struct Assumptions {
    /// Assumptions with substituted variables replaced by their representative.
    assumptions: Vec<Lit>,
    /// Assumptions as given by the user, in the same order.
    user_assumptions: Vec<Lit>,
    failed_core: Vec<Lit>,
    failed: FxHashSet<Lit>,
}

impl Assumptions {
    /// Number of decision levels reserved for assumptions.
    pub fn assumption_levels(&self) -> usize {
        self.assumptions.len()
    }

    /// Whether a variable occurs in the current assumptions.
    ///
    /// Substituted variables are represented by their representative here.
    pub fn is_assumed(&self, var: Var) -> bool {
        self.assumptions.iter().any(|lit| lit.var() == var)
    }

    /// Subset of the assumptions that made the formula unsatisfiable.
    pub fn failed_core(&self) -> &[Lit] {
        &self.failed_core
    }

    /// Whether an assumption is part of the failed core.
    pub fn failed(&self, lit: Lit) -> bool {
        self.failed.contains(&lit)
    }

    /// Remove all assumptions, keeping the failed core.
    pub fn clear(&mut self) {
        self.assumptions.clear();
        self.user_assumptions.clear();
    }

    /// Forget the failed core.
    pub fn clear_failed(&mut self) {
        self.failed_core.clear();
        self.failed.clear();
    }
}

/// Return type of [`enqueue_assumption`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EnqueueAssumption {
    Done,
    Enqueued,
    Conflict,
}

/// Change the currently active assumptions.
///
/// Must be called at level 0. None of the variables may be eliminated.
pub fn set_assumptions(
    mut ctx: partial!(Context, mut AssumptionsP, VariablesP, TrailP),
    user_assumptions: &[Lit],
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    let (assumptions, ctx) = ctx.split_part_mut(AssumptionsP);
    let variables = ctx.part(VariablesP);

    assumptions.user_assumptions.clear();
    assumptions
        .user_assumptions
        .extend_from_slice(user_assumptions);

    assumptions.assumptions.clear();
    assumptions
        .assumptions
        .extend(user_assumptions.iter().map(|&lit| match variables.var_type(lit.var()) {
            VarType::Substituted(repr) => repr ^ lit.is_negative(),
            var_type => {
                debug_assert_ne!(var_type, VarType::Eliminated);
                lit
            }
        }));
}

/// Enqueue another assumption if possible.
///
/// Returns whether an assumption was enqueued, whether no assumptions are left or whether the
/// assumptions result in a conflict. The failed core is computed on conflict.
pub fn enqueue_assumption(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut AssumptionsP,
        mut ImplGraphP,
        mut TmpDataP,
        mut TrailP,
        ClauseDbP,
    ),
) -> EnqueueAssumption {
    while let Some(&assumption) = ctx
        .part(AssumptionsP)
        .assumptions
        .get(ctx.part(TrailP).current_level())
    {
        match ctx.part(AssignmentP).lit_value(assumption) {
            Some(false) => {
                analyze_assumption_conflict(ctx.borrow(), assumption);
                return EnqueueAssumption::Conflict;
            }
            Some(true) => ctx.part_mut(TrailP).new_decision_level(),
            None => {
                ctx.part_mut(TrailP).new_decision_level();
                enqueue_assignment(ctx.borrow(), assumption, Reason::Unit);
                return EnqueueAssumption::Enqueued;
            }
        }
    }
    EnqueueAssumption::Done
}

/// Compute a set of incompatible assumptions.
///
/// Given an assumption that is false under the assumptions enqueued so far, the implication graph
/// is walked back from its negation. Every assumption reached is part of the failed core.
fn analyze_assumption_conflict(
    mut ctx: partial!(Context, mut AssumptionsP, mut TmpDataP, ClauseDbP, ImplGraphP, TrailP),
    assumption: Lit,
) {
    let (assumptions, mut ctx) = ctx.split_part_mut(AssumptionsP);
    let (tmp, ctx) = ctx.split_part_mut(TmpDataP);
    let impl_graph = ctx.part(ImplGraphP);
    let db = ctx.part(ClauseDbP);

    let flags = &mut tmp.flags;

    let mut core = vec![assumption];

    // Root level assignments don't depend on any assumption and may be gone from the trail
    let mut flag_count = 0;
    if impl_graph.level(assumption.var()) > 0 {
        flags[assumption.index()] = true;
        flag_count += 1;
    }

    for &lit in ctx.part(TrailP).trail().iter().rev() {
        if flag_count == 0 {
            break;
        }
        if !flags[lit.index()] {
            continue;
        }
        flags[lit.index()] = false;
        flag_count -= 1;

        match impl_graph.reason(lit.var()) {
            Reason::Unit => core.push(lit),
            reason => {
                for &reason_lit in reason.lits(db) {
                    let var = reason_lit.var();
                    if impl_graph.level(var) > 0 && !flags[var.index()] {
                        flags[var.index()] = true;
                        flag_count += 1;
                    }
                }
            }
        }
    }

    core.sort_unstable();
    core.dedup();

    assumptions.failed_core.clear();
    assumptions.failed.clear();
    for (&user_lit, lit) in assumptions
        .user_assumptions
        .iter()
        .zip(assumptions.assumptions.iter())
    {
        if core.binary_search(lit).is_ok() && assumptions.failed.insert(user_lit) {
            assumptions.failed_core.push(user_lit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use blitsat_formula::{lit, lits};

    use crate::clause::add_clause;
    use crate::context::set_var_count;
    use crate::prop::propagate;

    #[test]
    fn implied_assumptions_get_empty_levels() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 4);

        add_clause(ctx.borrow(), &lits![-1, 2], false, 0).unwrap();

        set_assumptions(ctx.borrow(), &lits![1, 2, 3]);

        assert_eq!(
            enqueue_assumption(ctx.borrow()),
            EnqueueAssumption::Enqueued
        );
        propagate(ctx.borrow()).unwrap();
        assert_eq!(
            enqueue_assumption(ctx.borrow()),
            EnqueueAssumption::Enqueued
        );
        assert_eq!(ctx.part(TrailP).current_level(), 3);
        assert_eq!(ctx.part(TrailP).decision(2), None);
        assert_eq!(ctx.part(TrailP).decision(3), Some(lit!(3)));
        propagate(ctx.borrow()).unwrap();
        assert_eq!(enqueue_assumption(ctx.borrow()), EnqueueAssumption::Done);
        assert_eq!(ctx.part(AssumptionsP).assumption_levels(), 3);
    }

    #[test]
    fn failed_core_skips_unrelated_assumptions() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 5);

        add_clause(ctx.borrow(), &lits![-1, 3], false, 0).unwrap();
        add_clause(ctx.borrow(), &lits![-2, -3, 4], false, 0).unwrap();

        set_assumptions(ctx.borrow(), &lits![1, 5, 2, -4]);

        let result = loop {
            match enqueue_assumption(ctx.borrow()) {
                EnqueueAssumption::Enqueued => propagate(ctx.borrow()).unwrap(),
                result => break result,
            }
        };

        assert_eq!(result, EnqueueAssumption::Conflict);

        let assumptions = ctx.part(AssumptionsP);
        let mut core = assumptions.failed_core().to_vec();
        core.sort();
        assert_eq!(core, lits![-4, 1, 2]);
        assert!(assumptions.failed(lit!(-4)));
        assert!(!assumptions.failed(lit!(5)));
        assert!(ctx.part(TmpDataP).flags.iter().all(|&flag| !flag));
    }
}
