//! Scheduling of processing and solving steps.
//!
//! Restarts follow the Luby sequence scaled by `luby_restart_interval_scale`. Learned long clauses
//! are reduced whenever the number of deletable ones, those that are no reasons and have a glue
//! above `reduce_keep_glue`, exceeds a limit that grows by `reduce_inc` after each reduction. The growth is reset after a number of reductions that follows an outer Luby sequence.
use log::debug;

use partial_ref::{partial, PartialRef};

use crate::cdcl::conflict_step;
use crate::clause::{collect_garbage, reduce_learned, reducible_count};
use crate::context::{parts::*, Context};
use crate::decision::next_decision_var;
use crate::prop::backtrack;
use crate::solver::SolverError;

mod luby;

use luby::Luby;

/// Scheduling of processing and solving steps.
#[derive(Default, Clone)]
pub struct Schedule {
    next_restart: u64,
    restarts: u64,
    restart_luby: Luby,
    reductions: u64,
    /// Reductions since the learned clause limit was reset.
    reductions_since_reset: u64,
    /// Reductions between the last and the next reset.
    reset_interval: u64,
    reset_luby: Luby,
    next_inprocess: u64,
}

impl Schedule {
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn reductions(&self) -> u64 {
        self.reductions
    }

    /// Make inprocessing due at the next step.
    pub fn request_inprocessing(&mut self) {
        self.next_inprocess = 0;
    }
}

/// Perform one step of the schedule.
pub fn schedule_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut AssumptionsP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ExtensionP,
        mut ImplGraphP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> Result<(), SolverError> {
    let (schedule, mut ctx) = ctx.split_part_mut(ScheduleP);
    let conflicts = ctx.part(SolverStateP).conflicts;
    let (restart_scale, reduce_init, reduce_inc, outer_scale) = {
        let config = ctx.part(SolverConfigP);
        (
            config.luby_restart_interval_scale,
            config.reduce_init as u64,
            config.reduce_inc as u64,
            config.reduce_outer_scale,
        )
    };

    if conflicts >= schedule.next_restart {
        if schedule.next_restart > 0 {
            restart(ctx.borrow());
            schedule.restarts += 1;
        }
        schedule.next_restart = conflicts + restart_scale * schedule.restart_luby.advance();
    }

    if schedule.reset_interval == 0 {
        schedule.reset_interval = outer_scale * schedule.reset_luby.advance();
    }

    let limit = reduce_init + reduce_inc * schedule.reductions_since_reset;

    if reducible_count(ctx.borrow()) as u64 > limit {
        reduce_learned(ctx.borrow());
        collect_garbage(ctx.borrow());

        schedule.reductions += 1;
        schedule.reductions_since_reset += 1;

        if schedule.reductions_since_reset >= schedule.reset_interval {
            debug!("resetting learned clause limit");
            schedule.reductions_since_reset = 0;
            schedule.reset_interval = outer_scale * schedule.reset_luby.advance();
        }
    }

    conflict_step(ctx.borrow())
}

/// Whether inprocessing is due.
///
/// Advances the inprocessing schedule when it returns true.
pub fn inprocessing_due(
    mut ctx: partial!(Context, mut ScheduleP, SolverConfigP, SolverStateP),
) -> bool {
    let conflicts = ctx.part(SolverStateP).conflicts;
    let interval = ctx.part(SolverConfigP).inprocess_interval;
    let schedule = ctx.part_mut(ScheduleP);
    if conflicts >= schedule.next_inprocess {
        schedule.next_inprocess = conflicts + interval;
        true
    } else {
        false
    }
}

/// Backtrack for a restart.
///
/// Assumption levels are always kept. With trail reuse, every further level whose decision would be
/// made again before the current next decision is kept too.
fn restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut TrailP,
        mut VmtfP,
        AssumptionsP,
        SolverConfigP,
    ),
) {
    let current_level = ctx.part(TrailP).current_level();
    let mut target = ctx.part(AssumptionsP).assumption_levels().min(current_level);

    if ctx.part(SolverConfigP).restart_reuse_trail {
        match next_decision_var(ctx.borrow()) {
            Some(next) => {
                let vmtf = ctx.part(VmtfP);
                let trail = ctx.part(TrailP);
                let next_stamp = vmtf.stamp(next);
                while target < current_level {
                    match trail.decision(target + 1) {
                        Some(decision) if vmtf.stamp(decision.var()) > next_stamp => target += 1,
                        _ => break,
                    }
                }
            }
            None => target = current_level,
        }
    }

    debug!("restart keeping {} of {} levels", target, current_level);

    backtrack(ctx.borrow(), target);
}
