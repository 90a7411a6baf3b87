//! Decision heuristics.

use partial_ref::{partial, PartialRef};

use blitsat_formula::Var;

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};

pub mod vmtf;

/// The next decision variable, if any variable is unassigned.
pub fn next_decision_var(mut ctx: partial!(Context, mut VmtfP, AssignmentP)) -> Option<Var> {
    let (vmtf, ctx) = ctx.split_part_mut(VmtfP);
    let assignment = ctx.part(AssignmentP);
    vmtf.next_unassigned(|var| assignment.var_value(var).is_some())
}

/// Make a decision and enqueue it.
///
/// The decision uses the saved phase of the variable. Returns `false` if no decision was made
/// because all variables are assigned.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        mut VmtfP
    ),
) -> bool {
    if let Some(decision_var) = next_decision_var(ctx.borrow()) {
        let decision = decision_var.lit(ctx.part(AssignmentP).last_var_value(decision_var));

        ctx.part_mut(TrailP).new_decision_level();

        enqueue_assignment(ctx.borrow(), decision, Reason::Decision);

        true
    } else {
        false
    }
}

/// Remove a variable from the decision heuristics.
pub fn remove_var(mut ctx: partial!(Context, mut VmtfP), var: Var) {
    ctx.part_mut(VmtfP).remove(var);
}
