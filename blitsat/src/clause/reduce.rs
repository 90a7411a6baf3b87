//! Learned clause database reduction.
use std::cmp::Reverse;

use log::debug;
use ordered_float::OrderedFloat;
use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::prop::{Assignment, ImplGraph, Reason};

use super::db::{remove_clause, Bucket, ClauseDb, ClauseHandle, LongRef};

/// Whether a long clause is the reason of an assignment.
pub fn is_locked(
    db: &ClauseDb,
    assignment: &Assignment,
    impl_graph: &ImplGraph,
    cref: LongRef,
) -> bool {
    // Reasons keep the propagated literal at position 0
    let lit = db.lits(cref)[0];
    assignment.lit_is_true(lit) && impl_graph.reason(lit.var()) == &Reason::Long(cref)
}

/// Whether a reduction may delete clauses of a bucket.
fn is_reducible(bucket: Bucket, keep_glue: usize) -> bool {
    match bucket {
        Bucket::Red(glue) => glue as usize > keep_glue,
        Bucket::Irred => false,
    }
}

/// Number of learned long clauses that a reduction may delete.
pub fn reducible_count(
    ctx: partial!(Context, ClauseDbP, ImplGraphP, SolverConfigP, TrailP),
) -> usize {
    let keep_glue = ctx.part(SolverConfigP).reduce_keep_glue;
    let db = ctx.part(ClauseDbP);
    let impl_graph = ctx.part(ImplGraphP);

    let stored: usize = Bucket::all()
        .filter(|&bucket| is_reducible(bucket, keep_glue))
        .map(|bucket| db.arena(bucket).clause_count())
        .sum();

    let locked = ctx
        .part(TrailP)
        .trail()
        .iter()
        .filter(|lit| match impl_graph.reason(lit.var()) {
            Reason::Long(cref) => is_reducible(cref.bucket(), keep_glue),
            _ => false,
        })
        .count();

    stored.saturating_sub(locked)
}

/// Delete half of the reducible learned long clauses.
///
/// Clauses in buckets with a glue up to `reduce_keep_glue` and clauses that are reasons are kept.
/// The remaining clauses are ordered by glue or, when `reduce_by_activity` is set, by activity and
/// the less useful half is deleted.
pub fn reduce_learned(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut WatchlistsP,
        AssignmentP,
        ImplGraphP,
        SolverConfigP,
    ),
) {
    let config = ctx.part(SolverConfigP);
    let keep_glue = config.reduce_keep_glue;
    let by_activity = config.reduce_by_activity;

    let mut candidates = vec![];

    {
        let db = ctx.part(ClauseDbP);
        let assignment = ctx.part(AssignmentP);
        let impl_graph = ctx.part(ImplGraphP);

        for bucket in Bucket::all() {
            let glue = match bucket {
                Bucket::Red(glue) if is_reducible(bucket, keep_glue) => glue,
                _ => continue,
            };
            for cref in db.refs(bucket) {
                if !is_locked(db, assignment, impl_graph, cref) {
                    candidates.push((glue, OrderedFloat(db.activity(cref)), cref));
                }
            }
        }
    }

    // Least useful first
    if by_activity {
        candidates.sort_unstable_by_key(|&(_, activity, _)| activity);
    } else {
        candidates.sort_unstable_by_key(|&(glue, activity, _)| (Reverse(glue), activity));
    }

    let to_delete = candidates.len() / 2;

    for &(_, _, cref) in candidates[..to_delete].iter() {
        remove_clause(ctx.borrow(), ClauseHandle::Long(cref));
    }

    debug!(
        "reduced {} of {} learned long clauses",
        to_delete,
        ctx.part(ClauseDbP).long_count(true) + to_delete
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use blitsat_formula::{lit, Lit};

    use crate::clause::add_clause;
    use crate::context::set_var_count;
    use crate::prop::{enqueue_assignment, propagate};

    fn long_clause(first: isize) -> Vec<Lit> {
        (0..4).map(|offset| Lit::from_dimacs(first + offset)).collect()
    }

    #[test]
    fn keeps_low_glue_and_locked_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        ctx.part_mut(SolverConfigP).hyper_binary_resolution = false;
        set_var_count(ctx.borrow(), 40);

        let mut handles = vec![];
        for index in 0..8 {
            let glue = if index < 2 { 2 } else { 3 + index };
            let lits = long_clause(1 + 4 * index as isize);
            handles.push(add_clause(ctx.borrow(), &lits, true, glue).unwrap());
        }

        // Make the clause with the highest glue propagate
        let locked = long_clause(29);
        for &lit in locked[1..].iter() {
            ctx.part_mut(TrailP).new_decision_level();
            enqueue_assignment(ctx.borrow(), !lit, Reason::Decision);
        }
        assert_eq!(propagate(ctx.borrow()), Ok(()));
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(29)));
        assert_eq!(reducible_count(ctx.borrow()), 5);

        reduce_learned(ctx.borrow());
        assert_eq!(reducible_count(ctx.borrow()), 3);

        let db = ctx.part(ClauseDbP);
        let live: Vec<bool> = handles
            .iter()
            .map(|handle| match *handle {
                ClauseHandle::Long(cref) => db.is_live(cref),
                _ => unreachable!(),
            })
            .collect();

        // Five candidates besides the locked clause, the two with the highest glue are deleted
        assert_eq!(
            live,
            vec![true, true, true, true, true, false, false, true]
        );
    }

    #[test]
    fn reduce_by_activity() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        ctx.part_mut(SolverConfigP).reduce_by_activity = true;
        set_var_count(ctx.borrow(), 16);

        let mut crefs = vec![];
        for index in 0..4 {
            let lits = long_clause(1 + 4 * index as isize);
            match add_clause(ctx.borrow(), &lits, true, 5).unwrap() {
                ClauseHandle::Long(cref) => crefs.push(cref),
                _ => unreachable!(),
            }
        }

        for (&cref, &activity) in crefs.iter().zip([3.0, 1.0, 4.0, 0.5].iter()) {
            ctx.part_mut(ClauseDbP).set_activity(cref, activity);
        }

        reduce_learned(ctx.borrow());

        let db = ctx.part(ClauseDbP);
        let live: Vec<bool> = crefs.iter().map(|&cref| db.is_live(cref)).collect();
        assert_eq!(live, vec![true, false, true, false]);
    }
}
