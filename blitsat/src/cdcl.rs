//! Conflict driven clause learning.

use log::trace;
use partial_ref::{partial, PartialRef};

use crate::analyze_conflict::{analyze_conflict, Analysis};
use crate::assumptions::{enqueue_assumption, EnqueueAssumption};
use crate::clause::{
    add_clause, bump_clause_activity, decay_clause_activities, Bucket, ClauseHandle, LongRef,
};
use crate::context::{parts::*, Context};
use crate::decision::make_decision;
use crate::model::reconstruct_model;
use crate::prop::{backtrack, enqueue_assignment, propagate, Conflict, Reason, Watch};
use crate::simplify::simplify;
use crate::solver::SolverError;
use crate::state::SatState;

/// Find a conflict, learn a clause and backtrack.
///
/// Sets the solver state when the search finishes. Fails only when a learned clause can't be
/// stored.
pub fn conflict_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ExtensionP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> Result<(), SolverError> {
    let conflict = find_conflict(ctx.borrow());

    let conflict = match conflict {
        Ok(()) => {
            reconstruct_model(ctx.borrow());
            ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
            return Ok(());
        }
        Err(FoundConflict::Assumptions) => {
            ctx.part_mut(SolverStateP).sat_state = SatState::UnsatUnderAssumptions;
            return Ok(());
        }
        Err(FoundConflict::Conflict(conflict)) => conflict,
    };

    ctx.part_mut(SolverStateP).conflicts += 1;

    // Analysis expects a conflict involving the current level
    let conflict_level = {
        let (db, ctx) = ctx.split_part(ClauseDbP);
        let impl_graph = ctx.part(ImplGraphP);
        conflict
            .lits(db)
            .iter()
            .map(|lit| impl_graph.level(lit.var()))
            .max()
            .unwrap_or(0)
    };
    backtrack(ctx.borrow(), conflict_level);

    let analysis = analyze_conflict(ctx.borrow(), conflict);

    match analysis {
        Analysis::Unsat => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return Ok(());
        }
        Analysis::Learned { backtrack_to, glue } => {
            backtrack(ctx.borrow(), backtrack_to);

            let (analyze, mut ctx) = ctx.split_part(AnalyzeConflictP);
            let clause = analyze.clause();

            let reason = match clause.len() {
                1 => Reason::Unit,
                _ => match add_clause(ctx.borrow(), clause, true, glue)? {
                    ClauseHandle::Binary(..) => Reason::Binary([clause[1]]),
                    ClauseHandle::Ternary(..) => Reason::Ternary([clause[1], clause[2]]),
                    ClauseHandle::Long(cref) => Reason::Long(cref),
                },
            };

            enqueue_assignment(ctx.borrow(), clause[0], reason);
        }
        Analysis::Strengthened {
            backtrack_to,
            lit,
            reason,
        } => {
            backtrack(ctx.borrow(), backtrack_to);
            enqueue_assignment(ctx.borrow(), lit, reason);
        }
    }

    update_involved(ctx.borrow());

    {
        let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
        let (assignment, mut ctx) = ctx.split_part(AssignmentP);
        ctx.part_mut(VmtfP)
            .bump_all(analyze.seen_mut(), |var| assignment.var_value(var).is_some());
    }

    decay_clause_activities(ctx.borrow());

    Ok(())
}

/// Bump the redundant clauses used in the last analysis and move them to their glue's bucket.
///
/// Only moves into a lower glue bucket are made.
fn update_involved(
    mut ctx: partial!(
        Context,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        AnalyzeConflictP,
        AssignmentP,
    ),
) {
    let (analyze, mut ctx) = ctx.split_part(AnalyzeConflictP);
    for &(cref, glue) in analyze.involved() {
        if !ctx.part(ClauseDbP).is_live(cref) {
            continue;
        }
        bump_clause_activity(ctx.borrow(), cref);

        if let (Bucket::Red(new_glue), Bucket::Red(old_glue)) =
            (Bucket::for_glue(glue), cref.bucket())
        {
            if new_glue < old_glue {
                promote_clause(ctx.borrow(), cref, Bucket::Red(new_glue));
            }
        }
    }
}

/// Move a long clause into another bucket, updating its watches and its reason.
fn promote_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ImplGraphP, mut WatchlistsP, AssignmentP),
    cref: LongRef,
    bucket: Bucket,
) {
    let new_cref = match ctx.part_mut(ClauseDbP).try_move(cref, bucket) {
        Some(new_cref) => new_cref,
        None => return,
    };

    trace!("moved {:?} to {:?}", cref, new_cref);

    let (db, mut ctx) = ctx.split_part(ClauseDbP);
    let lits = db.lits(new_cref);

    let watchlists = ctx.part_mut(WatchlistsP);
    for &lit in lits[..2].iter() {
        watchlists.remove_first(lit, |watch| match watch {
            Watch::Long { cref: watched, .. } => watched == cref,
            _ => false,
        });
    }
    watchlists.watch_long(new_cref, [lits[0], lits[1]]);

    let (impl_graph, ctx) = ctx.split_part_mut(ImplGraphP);
    if ctx.part(AssignmentP).lit_is_true(lits[0])
        && impl_graph.reason(lits[0].var()) == &Reason::Long(cref)
    {
        impl_graph.update_reason(lits[0].var(), Reason::Long(new_cref));
    }
}

/// Return type of [`find_conflict`].
enum FoundConflict {
    Conflict(Conflict),
    Assumptions,
}

impl From<Conflict> for FoundConflict {
    fn from(conflict: Conflict) -> FoundConflict {
        FoundConflict::Conflict(conflict)
    }
}

/// Find a conflict.
///
/// Returns `Err` if a conflict was found and `Ok` if a satisfying assignment was found instead.
fn find_conflict(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> Result<(), FoundConflict> {
    loop {
        propagate(ctx.borrow())?;

        if ctx.part(TrailP).current_level() == 0 && !ctx.part(TrailP).trail().is_empty() {
            simplify(ctx.borrow());
        }

        match enqueue_assumption(ctx.borrow()) {
            EnqueueAssumption::Enqueued => continue,
            EnqueueAssumption::Conflict => return Err(FoundConflict::Assumptions),
            EnqueueAssumption::Done => (),
        }

        if !make_decision(ctx.borrow()) {
            return Ok(());
        }
    }
}
