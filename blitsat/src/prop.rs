//! Unit propagation.
use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};

pub mod assignment;
pub mod binary;
pub mod graph;
pub mod hbr;
pub mod long;
pub mod watch;

pub use assignment::{backtrack, enqueue_assignment, Assignment, Trail};
pub use graph::{Conflict, ImplGraph, Reason};
pub use watch::{Watch, Watchlists};

/// Propagate enqueued assignments.
///
/// Binary clauses are propagated for all pending assignments before any ternary or long clause is
/// visited. Returns when all enqueued assignments are propagated, including newly propagated
/// assignments, or if there is a conflict.
///
/// On conflict the first propagation that would assign the opposite value to an already assigned
/// literal is returned.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> Result<(), Conflict> {
    loop {
        while let Some(lit) = ctx.part(TrailP).binary_queue_head() {
            ctx.part_mut(TrailP).pop_binary_queue();
            binary::propagate_binary(ctx.borrow(), lit)?;
        }

        match ctx.part(TrailP).long_queue_head() {
            Some(lit) => {
                ctx.part_mut(TrailP).pop_long_queue();
                long::propagate_long(ctx.borrow(), lit)?;
            }
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;
    use proptest::{prelude::*, *};

    use rand::{distributions::Bernoulli, seq::SliceRandom, Rng};

    use blitsat_formula::{cnf::strategy::*, lit, lits, CnfFormula, Lit};

    use crate::clause::{add_clause, ClauseHandle};
    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::state::SatState;

    /// Generate a random formula and list of implied literals.
    pub fn prop_formula(
        vars: impl Strategy<Value = usize>,
        extra_vars: impl Strategy<Value = usize>,
        extra_clauses: impl Strategy<Value = usize>,
        density: impl Strategy<Value = f64>,
    ) -> impl Strategy<Value = (Vec<Lit>, CnfFormula)> {
        (vars, extra_vars, extra_clauses, density).prop_flat_map(
            |(vars, extra_vars, extra_clauses, density)| {
                let polarity = collection::vec(bool::ANY, vars + extra_vars);

                let dist = Bernoulli::new(density).unwrap();

                let lits = polarity
                    .prop_map(|polarity| {
                        polarity
                            .into_iter()
                            .enumerate()
                            .map(|(index, polarity)| Lit::from_index(index, polarity))
                            .collect::<Vec<_>>()
                    })
                    .prop_shuffle();

                lits.prop_perturb(move |mut lits, mut rng| {
                    let assigned_lits = &lits[..vars];

                    let mut clauses: Vec<Vec<Lit>> = vec![];
                    for (i, &lit) in assigned_lits.iter().enumerate() {
                        // Build a clause that implies lit
                        let mut clause = vec![lit];
                        for &reason_lit in assigned_lits[..i].iter() {
                            if rng.sample(dist) {
                                clause.push(!reason_lit);
                            }
                        }
                        clause.shuffle(&mut rng);
                        clauses.push(clause);
                    }

                    for _ in 0..extra_clauses {
                        // Build a clause that is satisfied
                        let &true_lit = assigned_lits.choose(&mut rng).unwrap();
                        let mut clause = vec![true_lit];
                        for &other_lit in lits.iter() {
                            if other_lit != true_lit && rng.sample(dist) {
                                clause.push(other_lit ^ rng.gen::<bool>());
                            }
                        }
                        clause.shuffle(&mut rng);
                        clauses.push(clause);
                    }

                    clauses.shuffle(&mut rng);

                    // Only return implied lits
                    lits.drain(vars..);

                    (lits, CnfFormula::from(clauses))
                })
            },
        )
    }

    /// Check that no clause in the formula is falsified or unit under the current assignment.
    fn assert_fixpoint(
        ctx: &partial!(Context, AssignmentP),
        formula: &CnfFormula,
    ) -> Result<(), TestCaseError> {
        let assignment = ctx.part(AssignmentP);
        for clause in formula.iter() {
            if clause.iter().any(|&lit| assignment.lit_is_true(lit)) {
                continue;
            }
            let unassigned = clause
                .iter()
                .filter(|&&lit| assignment.lit_is_unk(lit))
                .count();
            prop_assert!(unassigned >= 2, "clause {:?} is not at a fixpoint", clause);
        }
        Ok(())
    }

    #[test]
    fn hyper_binary_learned_and_subsuming() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 6);

        // 1 implies 2 and 3 via binary clauses, so 1 dominates the ternary's false literals
        add_clause(ctx.borrow(), &lits![-1, 2], false, 0).unwrap();
        add_clause(ctx.borrow(), &lits![-1, 3], false, 0).unwrap();
        add_clause(ctx.borrow(), &lits![-2, -3, 4], false, 0).unwrap();
        // Redundant clause containing -1, subsumed by the learned binary
        let subsumed = add_clause(ctx.borrow(), &lits![-1, 5, -3, -2], true, 2).unwrap();
        // Redundant clause implying 6, dominated by 1 but not subsumed
        add_clause(ctx.borrow(), &lits![-2, 6, -3], true, 0).unwrap();

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Decision);

        assert_eq!(propagate(ctx.borrow()), Ok(()));

        let graph = ctx.part(ImplGraphP);
        assert_eq!(graph.reason(lit!(4).var()), &Reason::Binary([lit!(-1)]));
        assert_eq!(graph.reason(lit!(5).var()), &Reason::Binary([lit!(-1)]));
        assert_eq!(graph.reason(lit!(6).var()), &Reason::Binary([lit!(-1)]));

        let db = ctx.part(ClauseDbP);
        assert_eq!(db.binary_count(true), 3);
        assert_eq!(db.ternary_count(true), 1);
        assert_eq!(db.long_count(true), 0);
        match subsumed {
            ClauseHandle::Long(cref) => assert!(!db.is_live(cref)),
            _ => panic!("expected a long clause"),
        }
    }

    proptest! {
        #[test]
        fn propagation_no_conflict(
            (mut lits, formula) in prop_formula(
                2..30usize,
                0..10usize,
                0..20usize,
                0.1..0.9
            ),
            hbr in bool::ANY,
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();
            ctx.part_mut(SolverConfigP).hyper_binary_resolution = hbr;

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause).unwrap();
            }

            prop_assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);

            let prop_result = propagate(ctx.borrow());

            prop_assert_eq!(prop_result, Ok(()));

            lits.sort();

            let mut prop_lits = ctx.part(TrailP).trail().to_owned();
            prop_lits.sort();

            prop_assert_eq!(prop_lits, lits);
        }

        #[test]
        fn propagation_conflict(
            (lits, formula) in prop_formula(
                2..30usize,
                0..10usize,
                0..20usize,
                0.1..0.9
            ),
            conflict_size in any::<sample::Index>(),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            // We add the conflict clause first to make sure that it isn't simplified during loading

            let conflict_size = conflict_size.index(lits.len() - 1) + 2;

            let conflict_clause: Vec<_> = lits[..conflict_size].iter().map(|&lit| !lit).collect();

            set_var_count(ctx.borrow(), formula.var_count());

            load_clause(ctx.borrow(), &conflict_clause).unwrap();

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause).unwrap();
            }

            let prop_result = propagate(ctx.borrow());

            prop_assert!(prop_result.is_err());

            let conflict = prop_result.unwrap_err();

            let conflict_lits = conflict.lits(ctx.part(ClauseDbP)).to_owned();

            for &lit in conflict_lits.iter() {
                prop_assert!(ctx.part(AssignmentP).lit_is_false(lit));
            }
        }

        #[test]
        fn propagation_at_decision_levels(
            formula in cnf_formula(3..40usize, 10..120, 2..7),
            decisions in collection::vec(any::<sample::Index>(), 1..8),
            hbr in bool::ANY,
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();
            ctx.part_mut(SolverConfigP).hyper_binary_resolution = hbr;

            set_var_count(ctx.borrow(), formula.var_count());

            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause).unwrap();
            }

            if ctx.part(SolverStateP).sat_state == SatState::Unsat {
                return Ok(());
            }

            if propagate(ctx.borrow()).is_err() {
                return Ok(());
            }

            for index in decisions {
                let var_count = formula.var_count();
                let lit = Lit::from_index(index.index(var_count), index.index(2) == 0);
                if !ctx.part(AssignmentP).lit_is_unk(lit) {
                    continue;
                }
                ctx.part_mut(TrailP).new_decision_level();
                enqueue_assignment(ctx.borrow(), lit, Reason::Decision);

                match propagate(ctx.borrow()) {
                    Ok(()) => assert_fixpoint(&ctx.borrow(), &formula)?,
                    Err(conflict) => {
                        for &lit in conflict.lits(ctx.part(ClauseDbP)) {
                            prop_assert!(ctx.part(AssignmentP).lit_is_false(lit));
                        }
                        break;
                    }
                }

                // Every reason consists of false literals assigned before the implied literal
                let (graph, ctx_rest) = ctx.split_part(ImplGraphP);
                for &lit in ctx_rest.part(TrailP).trail() {
                    let reason = *graph.reason(lit.var());
                    for &reason_lit in reason.lits(ctx_rest.part(ClauseDbP)) {
                        prop_assert!(ctx_rest.part(AssignmentP).lit_is_false(reason_lit));
                        prop_assert!(graph.depth(reason_lit.var()) < graph.depth(lit.var()));
                    }
                    if let Reason::Long(cref) = reason {
                        prop_assert_eq!(ctx_rest.part(ClauseDbP).lits(cref)[0], lit);
                    }
                }
            }
        }
    }
}
