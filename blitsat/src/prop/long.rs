//! Propagation of ternary and long clauses.
use std::mem::replace;

use partial_ref::{partial, PartialRef};
use vec_mut_scan::VecMutScan;

use blitsat_formula::Lit;

use crate::clause::{remove_clause, ClauseHandle};
use crate::context::{parts::*, Context};

use super::hbr::{find_dominator, learn_hyper_binary};
use super::{enqueue_assignment, Conflict, Reason, Watch};

/// Outcome of visiting the watch of a long clause.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum LongStep {
    /// The blocking literal is true, nothing changed.
    Blocked,
    /// The other watched literal is true.
    Satisfied,
    /// The watch moved to a different literal.
    Moved,
    /// The clause is unit and propagates its first literal.
    Unit,
    /// All literals of the clause are false.
    Conflict,
}

/// Propagate all literals implied by ternary and long clauses containing the negation of the given
/// literal.
///
/// On conflict return the clause propagating the conflicting assignment.
///
/// See [`prop::watch`](crate::prop::watch) for the invariants that this has to uphold.
#[inline(never)]
pub fn propagate_long(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    let false_lit = !lit;

    // Temporarily move watches out of the watchlists struct, so we are free to add watches to other
    // lists during propagation.
    let mut watches = replace(ctx.part_mut(WatchlistsP).watches_mut(false_lit), vec![]);

    // Clauses subsumed by learned hyper-binary clauses, removed after the scan
    let mut subsumed = vec![];

    let mut scan = VecMutScan::new(&mut watches);

    let mut result = Ok(());

    while let Some(watch) = scan.next() {
        let current = *watch;
        match current {
            Watch::Binary { .. } => continue,
            Watch::Ternary {
                others: [a, b],
                redundant,
            } => {
                let assignment = ctx.part(AssignmentP);
                let (implied, other_false) =
                    match (assignment.lit_value(a), assignment.lit_value(b)) {
                        (Some(true), _) | (_, Some(true)) | (None, None) => continue,
                        (Some(false), Some(false)) => {
                            result = Err(Conflict::Ternary([false_lit, a, b]));
                            break;
                        }
                        (Some(false), None) => (b, a),
                        (None, Some(false)) => (a, b),
                    };

                let false_lits = [false_lit, other_false];

                match find_dominator(&ctx.borrow(), &false_lits) {
                    Some(dominator) => {
                        learn_hyper_binary(ctx.borrow(), dominator, implied);
                        if redundant && false_lits.contains(&!dominator) {
                            subsumed.push(ClauseHandle::Ternary([false_lit, a, b], true));
                        }
                    }
                    None => {
                        enqueue_assignment(ctx.borrow(), implied, Reason::Ternary(false_lits));
                    }
                }
            }
            Watch::Long { cref, blocking } => {
                let (step, first) = {
                    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
                    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
                    let watchlists = ctx.part_mut(WatchlistsP);
                    long_step(
                        db.lits_mut(cref),
                        false_lit,
                        blocking,
                        |lit| assignment.lit_value(lit),
                        |lit, blocking| watchlists.add_watch(lit, Watch::Long { cref, blocking }),
                    )
                };

                // The other watched literal becomes the blocking literal.
                let new_watch = Watch::Long {
                    cref,
                    blocking: first,
                };

                match step {
                    LongStep::Blocked => continue,
                    LongStep::Satisfied => {
                        watch.replace(new_watch);
                        continue;
                    }
                    LongStep::Moved => {
                        watch.remove();
                        continue;
                    }
                    LongStep::Conflict => {
                        watch.replace(new_watch);
                        result = Err(Conflict::Long(cref));
                        break;
                    }
                    LongStep::Unit => {
                        watch.replace(new_watch);
                    }
                }

                let (dominator, is_subsumed) = {
                    let (db, mut ctx) = ctx.split_part(ClauseDbP);
                    let false_lits = &db.lits(cref)[1..];
                    let dominator = find_dominator(&ctx.borrow(), false_lits);
                    let is_subsumed = dominator.map_or(false, |dominator| {
                        cref.is_redundant() && false_lits.contains(&!dominator)
                    });
                    (dominator, is_subsumed)
                };

                match dominator {
                    Some(dominator) => {
                        learn_hyper_binary(ctx.borrow(), dominator, first);
                        if is_subsumed {
                            subsumed.push(ClauseHandle::Long(cref));
                        }
                    }
                    None => enqueue_assignment(ctx.borrow(), first, Reason::Long(cref)),
                }
            }
        }
    }

    // This keeps all unprocessed watches in the current watchlist.
    drop(scan);

    // Learned hyper-binary clauses can add watches to the list we moved out.
    let watchlist = ctx.part_mut(WatchlistsP).watches_mut(false_lit);
    let added = replace(watchlist, watches);
    watchlist.extend(added);

    for handle in subsumed {
        remove_clause(ctx.borrow(), handle);
    }

    result
}

/// Restore the watch invariant for a long clause after one of its watched literals became false.
///
/// Returns the outcome and the literal now in position 0.
fn long_step(
    lits: &mut [Lit],
    false_lit: Lit,
    blocking: Lit,
    value: impl Fn(Lit) -> Option<bool>,
    mut add_watch: impl FnMut(Lit, Lit),
) -> (LongStep, Lit) {
    // If the blocking literal (which is part of the watched clause) is already true, the watched
    // clause is satisfied and we don't even have to look at it.
    if value(blocking) == Some(true) {
        return (LongStep::Blocked, blocking);
    }

    // First we ensure that the false literal is at index 1. This prepares the literal order for
    // further propagations, as the propagating literal has to be at index 0.
    let mut first = lits[0];
    if first == false_lit {
        lits.swap(0, 1);
        first = lits[0];
    }

    // If the other watched literal isn't the blocking literal, check whether that one is true.
    if first != blocking && value(first) == Some(true) {
        return (LongStep::Satisfied, first);
    }

    // Try to find a non-false unwatched literal to replace the false literal as watched literal.
    let (initial, rest) = lits.split_at_mut(2);

    for rest_lit_ref in rest.iter_mut() {
        let rest_lit = *rest_lit_ref;
        if value(rest_lit) != Some(false) {
            initial[1] = rest_lit;
            *rest_lit_ref = false_lit;
            add_watch(rest_lit, first);
            return (LongStep::Moved, first);
        }
    }

    // We didn't find a non-false unwatched literal, so either we're propagating or we have a
    // conflict.
    if value(first) == Some(false) {
        (LongStep::Conflict, first)
    } else {
        (LongStep::Unit, first)
    }
}
