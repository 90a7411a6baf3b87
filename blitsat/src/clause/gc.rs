//! Garbage collection of long clauses.
use log::debug;
use partial_ref::{partial, PartialRef};
use rustc_hash::FxHashMap;

use crate::context::{parts::*, Context};
use crate::prop::watch::watch_long_clauses;
use crate::prop::Reason;

/// Perform a garbage collection of long clauses if necessary.
pub fn collect_garbage(
    mut ctx: partial!(Context, mut ClauseDbP, mut ImplGraphP, mut WatchlistsP, TrailP),
) {
    let db = ctx.part(ClauseDbP);

    // Collecting when a fixed fraction of the arenas is garbage amortizes collection costs.
    if db.garbage_words() * 2 > db.total_words() {
        collect_garbage_now(ctx.borrow());
    }
}

/// Unconditionally compact all clause arenas.
///
/// Long clause watches are rebuilt and the reasons of assigned variables are relocated. The watched
/// literals of each clause stay the same, so this can be done at any decision level.
pub fn collect_garbage_now(
    mut ctx: partial!(Context, mut ClauseDbP, mut ImplGraphP, mut WatchlistsP, TrailP),
) {
    let garbage = ctx.part(ClauseDbP).garbage_words();

    ctx.part_mut(WatchlistsP).clear_long();

    let mut relocated = FxHashMap::default();
    ctx.part_mut(ClauseDbP).compact(|old, new| {
        if old != new {
            relocated.insert(old, new);
        }
    });

    let (trail, mut ctx) = ctx.split_part(TrailP);
    let impl_graph = ctx.part_mut(ImplGraphP);

    for &lit in trail.trail().iter() {
        if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
            if let Some(&new_cref) = relocated.get(&cref) {
                impl_graph.update_reason(lit.var(), Reason::Long(new_cref));
            }
        }
    }

    watch_long_clauses(ctx.borrow());

    debug!(
        "collected {} garbage words, {} clauses moved",
        garbage,
        relocated.len()
    );
}
