//! Interface for inprocessing passes.
//!
//! The solver core contains no simplification passes beyond removing root level assignments.
//! Passes like variable elimination or equivalent literal substitution are implemented outside of
//! it as an [`Inprocessor`]. The solver calls each inprocessor periodically at the root level,
//! handing it an [`InprocessingAccess`] to the clause database.
use log::debug;
use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use blitsat_formula::{Lit, Var};

use crate::clause::{remove_clause, ClauseHandle, LongRef};
use crate::context::{ensure_var_count, parts::*, Context};
use crate::decision::remove_var;
use crate::load::{load_clause, load_redundant_clause};
use crate::prop::watch::short_clauses;
use crate::prop::{backtrack, propagate, Reason, Watch};
use crate::solver::SolverError;
use crate::state::SatState;
use crate::variables::VarType;

/// A simplification pass run between search phases.
pub trait Inprocessor {
    fn inprocess(&mut self, access: &mut InprocessingAccess<'_>) -> Result<(), SolverError>;
}

impl<F> Inprocessor for F
where
    F: FnMut(&mut InprocessingAccess<'_>) -> Result<(), SolverError>,
{
    fn inprocess(&mut self, access: &mut InprocessingAccess<'_>) -> Result<(), SolverError> {
        self(access)
    }
}

/// Access to the solver's clauses at the root level.
///
/// All root level assignments are propagated whenever control is handed to an inprocessor, and
/// clauses added through this access are propagated immediately.
pub struct InprocessingAccess<'a> {
    ctx: &'a mut Context,
}

impl<'a> InprocessingAccess<'a> {
    pub(crate) fn new(ctx: &'a mut Context) -> InprocessingAccess<'a> {
        let mut access = InprocessingAccess { ctx };
        backtrack(access.context().into_partial_ref_mut().borrow(), 0);
        access.propagate();
        access
    }

    fn context(&mut self) -> &mut Context {
        self.ctx
    }

    /// Propagate root level assignments and turn them into units.
    ///
    /// Clauses may be removed afterwards without leaving dangling reasons.
    fn propagate(&mut self) {
        let mut ctx = self.context().into_partial_ref_mut();
        if ctx.part(SolverStateP).sat_state == SatState::Unsat {
            return;
        }
        if propagate(ctx.borrow()).is_err() {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return;
        }
        let (trail, mut ctx) = ctx.split_part(TrailP);
        let impl_graph = ctx.part_mut(ImplGraphP);
        for &lit in trail.trail().iter() {
            impl_graph.update_reason(lit.var(), Reason::Unit);
        }
    }

    /// Whether the formula is known to be unsatisfiable.
    pub fn is_unsat(&self) -> bool {
        let ctx = (&*self.ctx).into_partial_ref();
        ctx.part(SolverStateP).sat_state == SatState::Unsat
    }

    pub fn var_count(&self) -> usize {
        let ctx = (&*self.ctx).into_partial_ref();
        ctx.part(VariablesP).var_count()
    }

    pub fn var_type(&self, var: Var) -> VarType {
        let ctx = (&*self.ctx).into_partial_ref();
        ctx.part(VariablesP).var_type(var)
    }

    /// Whether a variable may not be eliminated or substituted.
    ///
    /// This includes variables used as assumptions of the running solve call.
    pub fn is_frozen(&self, var: Var) -> bool {
        let ctx = (&*self.ctx).into_partial_ref();
        ctx.part(VariablesP).is_frozen(var) || ctx.part(AssumptionsP).is_assumed(var)
    }

    /// Root level value of a literal.
    pub fn value(&self, lit: Lit) -> Option<bool> {
        let ctx = (&*self.ctx).into_partial_ref();
        ctx.part(AssignmentP).lit_value(lit)
    }

    /// Root level assignments that were not yet removed from the clauses.
    ///
    /// Variables assigned earlier are [`VarType::Fixed`] and don't occur in any clause.
    pub fn trail(&self) -> &[Lit] {
        self.ctx.trail.trail()
    }

    /// Clauses watched by a literal.
    ///
    /// Binary and ternary clauses are watched by all their literals, long clauses by their first two
    /// literals.
    pub fn watches(&self, lit: Lit) -> &[Watch] {
        self.ctx.watchlists.watches(lit)
    }

    /// Literals of a long clause.
    pub fn long_clause(&self, cref: LongRef) -> &[Lit] {
        self.ctx.clause_db.lits(cref)
    }

    /// All clauses with their handles.
    pub fn clauses(&self) -> Vec<(ClauseHandle, Vec<Lit>)> {
        let mut ctx = (&*self.ctx).into_partial_ref();
        let mut clauses: Vec<_> = short_clauses(&ctx.borrow())
            .into_iter()
            .map(|clause| {
                let handle = match clause.lits[..] {
                    [a, b] => ClauseHandle::Binary([a, b], clause.redundant),
                    [a, b, c] => ClauseHandle::Ternary([a, b, c], clause.redundant),
                    _ => unreachable!(),
                };
                (handle, clause.lits)
            })
            .collect();

        let db = ctx.part(ClauseDbP);
        clauses.extend(
            db.all_refs()
                .map(|cref| (ClauseHandle::Long(cref), db.lits(cref).to_vec())),
        );
        clauses
    }

    /// Add a clause.
    ///
    /// Redundant clauses have to be implied by the irredundant clauses.
    pub fn add_clause(&mut self, clause: &[Lit], redundant: bool) -> Result<(), SolverError> {
        let result = {
            let mut ctx = self.context().into_partial_ref_mut();
            if let Some(max_index) = clause.iter().map(|lit| lit.index()).max() {
                ensure_var_count(ctx.borrow(), max_index + 1);
            }
            for &lit in clause.iter() {
                if ctx.part(VariablesP).var_type(lit.var()) == VarType::Eliminated {
                    return Err(SolverError::EliminatedVar { var: lit.var() });
                }
            }

            let result = if redundant {
                load_redundant_clause(ctx.borrow(), clause)
            } else {
                load_clause(ctx.borrow(), clause)
            };

            if let Err(error @ SolverError::ResourceExhausted { .. }) = &result {
                ctx.part_mut(SolverStateP).solver_error = Some(error.clone());
            }
            result
        };
        self.propagate();
        result
    }

    /// Remove a clause.
    ///
    /// Removing irredundant clauses that are not implied by the remaining clauses may make the
    /// formula satisfiable. Models then aren't models of the removed clauses.
    pub fn remove_clause(&mut self, handle: ClauseHandle) {
        let mut ctx = self.context().into_partial_ref_mut();
        if let ClauseHandle::Long(cref) = handle {
            debug_assert!(ctx.part(ClauseDbP).is_live(cref));
        }
        remove_clause(ctx.borrow(), handle);
    }

    /// Check that a variable can be eliminated or substituted.
    fn check_removable(&self, var: Var) -> Result<(), SolverError> {
        if self.is_frozen(var) {
            return Err(SolverError::FrozenVar { var });
        }
        if self.value(var.positive()).is_some() {
            return Err(SolverError::AssignedVar { var });
        }
        if self.var_type(var) != VarType::Free {
            return Err(SolverError::EliminatedVar { var });
        }
        Ok(())
    }

    /// Handles of all clauses containing a variable.
    fn clauses_of_var(&self, var: Var) -> Vec<ClauseHandle> {
        let ctx = (&*self.ctx).into_partial_ref();
        let watchlists = ctx.part(WatchlistsP);
        let db = ctx.part(ClauseDbP);

        let mut handles = vec![];
        for &lit in [var.positive(), var.negative()].iter() {
            for &watch in watchlists.watches(lit) {
                match watch {
                    Watch::Binary { other, redundant } => {
                        handles.push(ClauseHandle::Binary([lit, other], redundant))
                    }
                    Watch::Ternary { others, redundant } => handles.push(ClauseHandle::Ternary(
                        [lit, others[0], others[1]],
                        redundant,
                    )),
                    Watch::Long { .. } => (),
                }
            }
        }

        handles.extend(
            db.all_refs()
                .filter(|&cref| db.lits(cref).iter().any(|lit| lit.var() == var))
                .map(ClauseHandle::Long),
        );
        handles
    }

    fn handle_lits(&self, handle: ClauseHandle) -> Vec<Lit> {
        match handle {
            ClauseHandle::Binary(lits, _) => lits.to_vec(),
            ClauseHandle::Ternary(lits, _) => lits.to_vec(),
            ClauseHandle::Long(cref) => self.long_clause(cref).to_vec(),
        }
    }

    /// Remove all clauses of a variable and mark it as eliminated.
    ///
    /// The caller has to add all resolvents on the variable first. The removed irredundant clauses
    /// are used to assign the variable when a model is found.
    pub fn eliminate_var(&mut self, var: Var) -> Result<(), SolverError> {
        ensure_var_count(self.context().into_partial_ref_mut().borrow(), var.index() + 1);
        self.check_removable(var)?;

        let handles = self.clauses_of_var(var);
        let mut extension_clauses = vec![];

        for &handle in handles.iter() {
            let lits = self.handle_lits(handle);
            if !handle.is_redundant() {
                extension_clauses.push(lits);
            }
            self.remove_clause(handle);
        }

        let mut ctx = self.context().into_partial_ref_mut();
        let extension = ctx.part_mut(ExtensionP);
        for clause in extension_clauses.iter() {
            let pivot = clause
                .iter()
                .cloned()
                .find(|lit| lit.var() == var)
                .unwrap_or_else(|| var.positive());
            extension.push(pivot, clause);
        }

        ctx.part_mut(VariablesP).var_data_mut(var).var_type = VarType::Eliminated;
        remove_var(ctx.borrow(), var);

        debug!(
            "eliminated variable {} with {} irredundant clauses",
            var,
            extension_clauses.len()
        );

        Ok(())
    }

    /// Replace a variable by an equivalent literal.
    ///
    /// The caller has to make sure that the formula implies `var` to be equivalent to `repr`. All
    /// clauses of `var` are rewritten to use `repr` instead.
    pub fn substitute_var(&mut self, var: Var, repr: Lit) -> Result<(), SolverError> {
        debug_assert_ne!(var, repr.var());
        let count = var.index().max(repr.index()) + 1;
        ensure_var_count(self.context().into_partial_ref_mut().borrow(), count);

        self.check_removable(var)?;
        if self.var_type(repr.var()) != VarType::Free {
            return Err(SolverError::EliminatedVar { var: repr.var() });
        }

        let handles = self.clauses_of_var(var);
        let mut rewritten = vec![];

        for &handle in handles.iter() {
            rewritten.push((self.handle_lits(handle), handle.is_redundant()));
            self.remove_clause(handle);
        }

        {
            let mut ctx = self.context().into_partial_ref_mut();

            let lit = var.positive();
            let extension = ctx.part_mut(ExtensionP);
            extension.push(lit, &[lit, !repr]);
            extension.push(!lit, &[!lit, repr]);

            let variables = ctx.part_mut(VariablesP);
            for index in 0..variables.var_count() {
                let other = Var::from_index(index);
                if let VarType::Substituted(other_repr) = variables.var_type(other) {
                    if other_repr.var() == var {
                        variables.var_data_mut(other).var_type =
                            VarType::Substituted(repr ^ other_repr.is_negative());
                    }
                }
            }
            variables.var_data_mut(var).var_type = VarType::Substituted(repr);

            remove_var(ctx.borrow(), var);
            ctx.part_mut(SolverStateP)
                .new_equivalences
                .push((lit, repr));
        }

        // Loading maps the substituted variable to its representative
        for (lits, redundant) in rewritten.iter() {
            self.add_clause(lits, *redundant)?;
        }

        debug!(
            "substituted variable {} by {}, rewrote {} clauses",
            var,
            repr,
            rewritten.len()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use blitsat_formula::{lit, lits, var};

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::model::reconstruct_model;
    use crate::prop::enqueue_assignment;

    fn load(ctx: &mut Context, clauses: &[&[Lit]]) {
        let mut ctx = ctx.into_partial_ref_mut();
        let var_count = clauses
            .iter()
            .flat_map(|clause| clause.iter())
            .map(|lit| lit.index() + 1)
            .max()
            .unwrap_or(0);
        set_var_count(ctx.borrow(), var_count);
        for clause in clauses {
            load_clause(ctx.borrow(), clause).unwrap();
        }
    }

    fn sorted(mut clauses: Vec<(ClauseHandle, Vec<Lit>)>) -> Vec<Vec<Lit>> {
        let mut clauses: Vec<Vec<Lit>> = clauses
            .drain(..)
            .map(|(_, mut lits)| {
                lits.sort();
                lits
            })
            .collect();
        clauses.sort();
        clauses
    }

    #[test]
    fn propagates_on_creation() {
        let mut ctx = Context::default();
        load(&mut ctx, &[&lits![1][..], &lits![-1, 2], &lits![-2, 3, 4]]);

        let access = InprocessingAccess::new(&mut ctx);
        assert_eq!(access.trail(), &lits![1, 2]);
        assert_eq!(access.value(lit!(-2)), Some(false));
        assert_eq!(access.value(lit!(3)), None);
        assert_eq!(access.watches(lit!(3)).len(), 1);
        assert!(!access.is_unsat());
    }

    #[test]
    fn add_and_remove_clauses() {
        let mut ctx = Context::default();
        load(&mut ctx, &[&lits![1, 2, 3, 4][..], &lits![-1, 2]]);

        let mut access = InprocessingAccess::new(&mut ctx);
        access.add_clause(&lits![2, 5, 6], true).unwrap();

        assert_eq!(
            sorted(access.clauses()),
            vec![lits![-1, 2].to_vec(), lits![1, 2, 3, 4].to_vec(), lits![2, 5, 6].to_vec()]
        );

        for (handle, _) in access.clauses() {
            if handle.is_redundant() || matches!(handle, ClauseHandle::Long(_)) {
                access.remove_clause(handle);
            }
        }

        assert_eq!(sorted(access.clauses()), vec![lits![-1, 2].to_vec()]);

        access.add_clause(&lits![-2], false).unwrap();
        assert_eq!(access.value(lit!(1)), Some(false));
        access.add_clause(&lits![1], false).unwrap();
        assert!(access.is_unsat());
    }

    #[test]
    fn eliminated_var_is_reconstructed() {
        let mut ctx = Context::default();
        load(&mut ctx, &[&lits![1, 2][..], &lits![-1, 3], &lits![-2, -3, 4]]);

        {
            let mut access = InprocessingAccess::new(&mut ctx);
            // The only resolvent on 1
            access.add_clause(&lits![2, 3], false).unwrap();
            access.eliminate_var(var!(1)).unwrap();

            assert_eq!(access.var_type(var!(1)), VarType::Eliminated);
            assert_eq!(
                access.eliminate_var(var!(1)),
                Err(SolverError::EliminatedVar { var: var!(1) })
            );
            assert_eq!(
                access.add_clause(&lits![1, 4], false),
                Err(SolverError::EliminatedVar { var: var!(1) })
            );
            assert_eq!(
                sorted(access.clauses()),
                vec![lits![-3, -2, 4].to_vec(), lits![2, 3].to_vec()]
            );
        }

        let mut ctx = ctx.into_partial_ref_mut();
        for &lit in lits![-2, 3, 4].iter() {
            enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
        }
        reconstruct_model(ctx.borrow());

        // 1 v 2 forces 1, -1 v 3 allows it
        assert_eq!(ctx.part(ExtensionP).lit_value(lit!(1)), Some(true));
    }

    #[test]
    fn frozen_and_assigned_vars_are_kept() {
        let mut ctx = Context::default();
        load(&mut ctx, &[&lits![1, 2][..], &lits![3]]);
        ctx.into_partial_ref_mut()
            .part_mut(VariablesP)
            .var_data_mut(var!(1))
            .frozen = 1;

        let mut access = InprocessingAccess::new(&mut ctx);
        assert!(access.is_frozen(var!(1)));
        assert_eq!(
            access.eliminate_var(var!(1)),
            Err(SolverError::FrozenVar { var: var!(1) })
        );
        assert_eq!(
            access.substitute_var(var!(2), lit!(-1)),
            Ok(())
        );
        assert_eq!(
            access.substitute_var(var!(3), lit!(1)),
            Err(SolverError::AssignedVar { var: var!(3) })
        );
    }

    #[test]
    fn substitution_rewrites_clauses() {
        let mut ctx = Context::default();
        load(
            &mut ctx,
            &[
                &lits![1, -2][..],
                &lits![-1, 2],
                &lits![2, 3, 4],
                &lits![-2, 5, 6, 7],
                &lits![1, 2, 5],
            ],
        );

        {
            let mut access = InprocessingAccess::new(&mut ctx);
            access.substitute_var(var!(2), lit!(1)).unwrap();

            assert_eq!(access.var_type(var!(2)), VarType::Substituted(lit!(1)));
            assert_eq!(
                sorted(access.clauses()),
                vec![lits![-1, 5, 6, 7].to_vec(), lits![1, 3, 4].to_vec(), lits![1, 5].to_vec()]
            );

            access.substitute_var(var!(1), lit!(-8)).unwrap();
            assert_eq!(access.var_type(var!(2)), VarType::Substituted(lit!(-8)));
        }

        let mut ctx = ctx.into_partial_ref_mut();
        assert_eq!(
            ctx.part(SolverStateP).new_equivalences,
            vec![(lit!(2), lit!(1)), (lit!(1), lit!(-8))]
        );

        for &lit in lits![-8, -3, 4, 5, -6, -7].iter() {
            enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
        }
        reconstruct_model(ctx.borrow());
        let extension = ctx.part(ExtensionP);
        assert_eq!(extension.lit_value(lit!(1)), Some(true));
        assert_eq!(extension.lit_value(lit!(2)), Some(true));
    }
}
