//! Central solver data structure.
use partial_ref::{part, partial, PartialRef, PartialRefTarget};

use crate::analyze_conflict::AnalyzeConflict;
use crate::assumptions::Assumptions;
use crate::clause::{ClauseActivity, ClauseDb};
use crate::config::SolverConfig;
use crate::decision::vmtf::Vmtf;
use crate::model::Extension;
use crate::prop::{Assignment, ImplGraph, Trail, Watchlists};
use crate::schedule::Schedule;
use crate::state::SolverState;
use crate::tmp::TmpData;
use crate::variables::Variables;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub AnalyzeConflictP: AnalyzeConflict);
    part!(pub AssignmentP: Assignment);
    part!(pub AssumptionsP: Assumptions);
    part!(pub ClauseActivityP: ClauseActivity);
    part!(pub ClauseDbP: ClauseDb);
    part!(pub ExtensionP: Extension);
    part!(pub ImplGraphP: ImplGraph);
    part!(pub ScheduleP: Schedule);
    part!(pub SolverConfigP: SolverConfig);
    part!(pub SolverStateP: SolverState);
    part!(pub TmpDataP: TmpData);
    part!(pub TrailP: Trail);
    part!(pub VariablesP: Variables);
    part!(pub VmtfP: Vmtf);
    part!(pub WatchlistsP: Watchlists);
}

pub use parts::*;

/// Central solver data structure.
///
/// This struct contains all data kept by the solver. Most functions operating on multiple fields of
/// the context use partial references provided by the `partial_ref` crate. This documents the data
/// dependencies and makes the borrow checker happy without the overhead of passing individual
/// references.
///
/// Cloning the context produces an independent solver with the same clauses, assignment and
/// heuristic state.
#[derive(PartialRefTarget, Default, Clone)]
pub struct Context {
    #[part = "AnalyzeConflictP"]
    pub(crate) analyze_conflict: AnalyzeConflict,
    #[part = "AssignmentP"]
    pub(crate) assignment: Assignment,
    #[part = "AssumptionsP"]
    pub(crate) assumptions: Assumptions,
    #[part = "ClauseActivityP"]
    pub(crate) clause_activity: ClauseActivity,
    #[part = "ClauseDbP"]
    pub(crate) clause_db: ClauseDb,
    #[part = "ExtensionP"]
    pub(crate) extension: Extension,
    #[part = "ImplGraphP"]
    pub(crate) impl_graph: ImplGraph,
    #[part = "ScheduleP"]
    pub(crate) schedule: Schedule,
    #[part = "SolverConfigP"]
    pub(crate) solver_config: SolverConfig,
    #[part = "SolverStateP"]
    pub(crate) solver_state: SolverState,
    #[part = "TmpDataP"]
    pub(crate) tmp_data: TmpData,
    #[part = "TrailP"]
    pub(crate) trail: Trail,
    #[part = "VariablesP"]
    pub(crate) variables: Variables,
    #[part = "VmtfP"]
    pub(crate) vmtf: Vmtf,
    #[part = "WatchlistsP"]
    pub(crate) watchlists: Watchlists,
}

/// Update structures for a new variable count.
pub fn set_var_count(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TmpDataP,
        mut VariablesP,
        mut VmtfP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    count: usize,
) {
    let initial_phase = ctx.part(SolverConfigP).initial_phase;
    ctx.part_mut(AssignmentP).set_var_count(count, initial_phase);
    ctx.part_mut(ImplGraphP).set_var_count(count);
    ctx.part_mut(TmpDataP).set_var_count(count);
    ctx.part_mut(VariablesP).set_var_count(count);
    ctx.part_mut(VmtfP).set_var_count(count);
    ctx.part_mut(WatchlistsP).set_var_count(count);
}

/// Increases the variable count to at least the given value.
pub fn ensure_var_count(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TmpDataP,
        mut VariablesP,
        mut VmtfP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    count: usize,
) {
    if count > ctx.part(AssignmentP).assignment().len() {
        set_var_count(ctx.borrow(), count)
    }
}
