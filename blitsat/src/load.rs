//! Loading a formula into the solver.
use partial_ref::{partial, PartialRef};

use blitsat_formula::Lit;

use crate::clause::{add_clause, GLUE_BUCKETS};
use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};
use crate::solver::SolverError;
use crate::state::SatState;
use crate::variables::VarType;

/// Adds a clause to the current formula.
///
/// Must be called at the root level. Substituted variables are replaced by their representative.
///
/// Removes duplicated literals, ignores tautological clauses (eg. x v -x v y), handles empty
/// clauses and dispatches among unit, binary, ternary and long clauses. Literals that are false at
/// the root level are dropped and satisfied clauses are ignored.
pub fn load_clause(
    ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
    clause: &[Lit],
) -> Result<(), SolverError> {
    load(ctx, clause, false)
}

/// Adds a clause implied by the current formula.
///
/// Like [`load_clause`] but the clause is stored as redundant. Redundant long clauses get the
/// highest glue.
pub fn load_redundant_clause(
    ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
    clause: &[Lit],
) -> Result<(), SolverError> {
    load(ctx, clause, true)
}

fn load(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
        VariablesP,
    ),
    clause: &[Lit],
    redundant: bool,
) -> Result<(), SolverError> {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    match ctx.part(SolverStateP).sat_state {
        SatState::Unsat => return Ok(()),
        SatState::Sat | SatState::UnsatUnderAssumptions => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unknown;
        }
        SatState::Unknown => (),
    }

    let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);
    let lits = &mut tmp_data.lits;

    lits.clear();
    {
        let variables = ctx.part(VariablesP);
        lits.extend(clause.iter().map(|&lit| match variables.var_type(lit.var()) {
            VarType::Substituted(repr) => repr ^ lit.is_negative(),
            var_type => {
                debug_assert_ne!(var_type, VarType::Eliminated);
                lit
            }
        }));
    }

    // Sorting by code places a literal next to its negation
    lits.sort_unstable_by_key(|lit| lit.code());
    lits.dedup();

    // Detect tautological clauses
    let mut last = None;

    for &lit in lits.iter() {
        if last == Some(!lit) {
            return Ok(());
        }
        last = Some(lit);
    }

    let assignment = ctx.part(AssignmentP);
    if lits.iter().any(|&lit| assignment.lit_is_true(lit)) {
        return Ok(());
    }
    lits.retain(|&lit| !assignment.lit_is_false(lit));

    match lits[..] {
        [] => ctx.part_mut(SolverStateP).sat_state = SatState::Unsat,
        [lit] => enqueue_assignment(ctx.borrow(), lit, Reason::Unit),
        _ => {
            add_clause(ctx.borrow(), lits, redundant, GLUE_BUCKETS - 1)?;
        }
    }

    Ok(())
}
