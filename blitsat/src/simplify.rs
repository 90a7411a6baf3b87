//! Simplification using root level assignments.
use log::debug;
use partial_ref::{partial, PartialRef};

use crate::clause::{add_short_clause, LongRef};
use crate::context::{parts::*, Context};
use crate::prop::watch::{short_clauses, watch_long_clauses};
use crate::prop::Reason;
use crate::variables::VarType;

/// Make root level assignments permanent, remove satisfied clauses and false literals.
///
/// Must be called at the root level with all assignments propagated. Afterwards the trail is empty
/// and the assigned variables are fixed. Their literals don't occur in any clause and they are no
/// longer decision candidates.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    {
        let (trail, mut ctx) = ctx.split_part(TrailP);
        let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);
        let (variables, mut ctx) = ctx.split_part_mut(VariablesP);
        let (vmtf, mut ctx) = ctx.split_part_mut(VmtfP);
        let state = ctx.part_mut(SolverStateP);

        for &lit in trail.trail().iter() {
            impl_graph.update_reason(lit.var(), Reason::Unit);
            variables.var_data_mut(lit.var()).var_type = VarType::Fixed;
            vmtf.remove(lit.var());
            state.new_units.push(lit);
        }

        debug!("fixed {} variables", trail.trail().len());
    }

    ctx.part_mut(TrailP).clear();

    let (assignment, mut ctx) = ctx.split_part(AssignmentP);

    let short = short_clauses(&ctx.borrow());
    ctx.part_mut(WatchlistsP).clear();

    for mut clause in short {
        ctx.part_mut(ClauseDbP)
            .count_short(clause.lits.len(), clause.redundant, -1);
        if clause.lits.iter().any(|&lit| assignment.lit_is_true(lit)) {
            continue;
        }
        clause.lits.retain(|&lit| !assignment.lit_is_false(lit));
        // A short clause with a false literal and no true literal would have propagated
        debug_assert!(clause.lits.len() >= 2);
        add_short_clause(ctx.borrow(), &clause.lits, clause.redundant);
    }

    let crefs: Vec<LongRef> = ctx.part(ClauseDbP).all_refs().collect();

    for cref in crefs {
        let db = ctx.part_mut(ClauseDbP);
        let lits = db.lits_mut(cref);

        if lits.iter().any(|&lit| assignment.lit_is_true(lit)) {
            db.remove(cref);
            continue;
        }

        let mut len = 0;
        for pos in 0..lits.len() {
            let lit = lits[pos];
            if !assignment.lit_is_false(lit) {
                lits[len] = lit;
                len += 1;
            }
        }

        if len <= 3 {
            debug_assert!(len >= 2);
            let remaining = lits[..len].to_vec();
            db.remove(cref);
            add_short_clause(ctx.borrow(), &remaining, cref.is_redundant());
        } else if len < lits.len() {
            db.shrink(cref, len);
        }
    }

    watch_long_clauses(ctx.borrow());
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use blitsat_formula::{lit, lits, var};

    use crate::clause::add_clause;
    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prop::propagate;

    #[test]
    fn root_units_are_removed_from_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 8);

        for clause in [
            &lits![1, 2, 3][..],
            &lits![-1, 4, 5],
            &lits![-1, 4, 5, 6, 7],
            &lits![-1, 2, 5, 6, 7, 8],
            &lits![2, 3, 4, 5],
        ]
        .iter()
        {
            load_clause(ctx.borrow(), clause).unwrap();
        }
        add_clause(ctx.borrow(), &lits![-1, 6, 7], true, 0).unwrap();

        load_clause(ctx.borrow(), &lits![1]).unwrap();
        load_clause(ctx.borrow(), &lits![-8]).unwrap();
        assert_eq!(propagate(ctx.borrow()), Ok(()));

        simplify(ctx.borrow());

        assert!(ctx.part(TrailP).trail().is_empty());
        assert_eq!(ctx.part(VariablesP).var_type(var!(1)), VarType::Fixed);
        assert_eq!(ctx.part(VariablesP).var_type(var!(2)), VarType::Free);
        assert!(!ctx.part(VmtfP).is_enqueued(var!(8)));
        assert_eq!(ctx.part(SolverStateP).new_units, lits![1, -8]);
        assert_eq!(ctx.part(AssignmentP).lit_value(lit!(1)), Some(true));

        let db = ctx.part(ClauseDbP);
        assert_eq!(db.binary_count(false), 1);
        assert_eq!(db.binary_count(true), 1);
        assert_eq!(db.ternary_count(false), 0);
        assert_eq!(db.long_count(false), 3);

        for code in 0..16 {
            let lit = blitsat_formula::Lit::from_code(code);
            if lit.var() == var!(1) || lit.var() == var!(8) {
                assert!(ctx.part(WatchlistsP).watches(lit).is_empty());
            }
        }
    }
}
