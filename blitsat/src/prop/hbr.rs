//! Lazy hyper-binary resolution.
//!
//! When a ternary or long clause becomes unit and all of its false literals were assigned on the
//! current decision level, the negations of these literals might all be implied by a single literal
//! via binary clauses. The closest such literal is the least common ancestor (dominator) of them in
//! the tree formed by binary clause reasons. The dominator on its own implies the propagated
//! literal, so the binary clause of the negated dominator and the propagated literal can be
//! learned. Using it as reason keeps implication chains short.
//!
//! If the negated dominator is contained in the propagating clause, the new binary clause subsumes
//! it.
//!
//! See ["Lazy Hyper Binary Resolution" by Armin Biere](https://fmv.jku.at/papers/Biere-TR-2009.pdf).

use partial_ref::{partial, PartialRef};

use blitsat_formula::Lit;

use crate::context::{parts::*, Context};

use super::{enqueue_assignment, ImplGraph, Reason};

/// Find the dominator of the negations of a unit clause's false literals.
///
/// Returns `None` when hyper-binary resolution doesn't apply.
pub fn find_dominator(
    ctx: &partial!(Context, ImplGraphP, SolverConfigP, TrailP),
    false_lits: &[Lit],
) -> Option<Lit> {
    let level = ctx.part(TrailP).current_level();
    if level == 0 || !ctx.part(SolverConfigP).hyper_binary_resolution {
        return None;
    }
    let graph = ctx.part(ImplGraphP);

    let mut dominator: Option<Lit> = None;
    for &false_lit in false_lits {
        if graph.level(false_lit.var()) != level {
            return None;
        }
        let lit = !false_lit;
        dominator = Some(match dominator {
            None => lit,
            Some(dominator) => common_ancestor(graph, dominator, lit)?,
        });
    }
    dominator
}

/// Least common ancestor of two true literals in the binary implication tree.
fn common_ancestor(graph: &ImplGraph, mut a: Lit, mut b: Lit) -> Option<Lit> {
    while a != b {
        // Parents are always assigned before their children
        if graph.depth(a.var()) > graph.depth(b.var()) {
            a = graph.binary_parent(a)?;
        } else {
            b = graph.binary_parent(b)?;
        }
    }
    Some(a)
}

/// Learn the binary clause `!dominator | implied` and assign `implied` with it as reason.
pub fn learn_hyper_binary(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
    ),
    dominator: Lit,
    implied: Lit,
) {
    ctx.part_mut(WatchlistsP)
        .watch_binary([!dominator, implied], true);
    ctx.part_mut(ClauseDbP).count_short(2, true, 1);
    enqueue_assignment(ctx.borrow(), implied, Reason::Binary([!dominator]));
}
