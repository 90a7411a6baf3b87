//! Propagation of binary clauses.
use partial_ref::{partial, PartialRef};

use blitsat_formula::Lit;

use crate::context::{parts::*, Context};

use super::enqueue_assignment;
use super::{Conflict, Reason, Watch};

/// Propagate all literals implied by the given literal via binary clauses.
///
/// On conflict return the binary clause propagating the conflicting assignment.
pub fn propagate_binary(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        WatchlistsP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    let (watchlists, mut ctx) = ctx.split_part(WatchlistsP);

    for watch in watchlists.watches(!lit) {
        if let &Watch::Binary { other: implied, .. } = watch {
            let assignment = ctx.part(AssignmentP);

            if assignment.lit_is_false(implied) {
                return Err(Conflict::Binary([implied, !lit]));
            } else if !assignment.lit_is_true(implied) {
                enqueue_assignment(ctx.borrow(), implied, Reason::Binary([!lit]));
            }
        }
    }

    Ok(())
}
