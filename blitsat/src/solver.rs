//! Boolean satisfiability solver.
use std::io;

use anyhow::Error;
use log::{debug, info};
use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};
use thiserror::Error;

use blitsat_dimacs::DimacsParser;
use blitsat_formula::{CnfFormula, Lit, Var};

use crate::assumptions::{set_assumptions, Assumptions};
use crate::clause::Bucket;
use crate::config::SolverConfigUpdate;
use crate::context::{ensure_var_count, parts::*, Context};
use crate::exchange::{exchange, Exchange};
use crate::inprocess::{InprocessingAccess, Inprocessor};
use crate::load::load_clause;
use crate::prop::backtrack;
use crate::schedule::{inprocessing_due, schedule_step};
use crate::state::SatState;
use crate::variables::VarType;

/// Possible errors while solving a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    /// A clause arena reached its maximal size.
    ///
    /// The solver can't continue after this error, every further call returns it again.
    #[error("the {bucket} clause storage is exhausted at {limit} words")]
    ResourceExhausted { bucket: Bucket, limit: usize },
    #[error("literal {value} is out of range")]
    LitOutOfRange { value: isize },
    #[error("variable {var} was eliminated")]
    EliminatedVar { var: Var },
    #[error("variable {var} is assigned")]
    AssignedVar { var: Var },
    #[error("variable {var} is not frozen")]
    NotFrozen { var: Var },
    #[error("variable {var} is frozen")]
    FrozenVar { var: Var },
    #[error("no model available, the last solve call did not find one")]
    NoModel,
    #[error("no failed assumptions available, the last solve call did not find a conflict")]
    NoFailedCore,
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
}

/// Result of a [`Solver::solve`] call.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// The search was interrupted by the termination callback or the conflict limit.
    Unknown,
}

/// A boolean satisfiability solver.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
    /// Literals of the clause added with [`add_literal`](Solver::add_literal) so far.
    clause: Vec<Lit>,
    /// Assumptions for the next solve call.
    assumptions: Vec<Lit>,
    inprocessors: Vec<Box<dyn Inprocessor>>,
    exchange: Option<Box<dyn Exchange>>,
    terminate: Option<Box<dyn FnMut() -> bool>>,
    conflict_limit: Option<u64>,
}

impl Solver {
    /// Create a new solver.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Change the solver configuration.
    ///
    /// The update is validated as a whole, on error the configuration stays unchanged.
    pub fn config(&mut self, update: &SolverConfigUpdate) -> Result<(), SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let mut config = ctx.part(SolverConfigP).clone();
        update.apply(&mut config);
        config.validate()?;

        ctx.part_mut(ClauseActivityP)
            .set_decay(config.clause_activity_decay);
        ctx.part_mut(ClauseDbP)
            .set_limits(config.bucket_words, config.max_bucket_words);
        *ctx.part_mut(SolverConfigP) = config;
        Ok(())
    }

    /// Add a literal to the clause under construction.
    ///
    /// A value of 0 terminates the clause and adds it to the formula. Other values are literals in
    /// DIMACS numbering.
    pub fn add_literal(&mut self, value: isize) -> Result<(), SolverError> {
        if value == 0 {
            let clause = std::mem::replace(&mut self.clause, vec![]);
            return self.add_clause(&clause);
        }
        let max = Var::max_count() as isize;
        if value < -max || value > max {
            return Err(SolverError::LitOutOfRange { value });
        }
        self.clause.push(Lit::from_dimacs(value));
        Ok(())
    }

    /// Add a clause to the formula.
    pub fn add_clause(&mut self, clause: &[Lit]) -> Result<(), SolverError> {
        self.check_error()?;

        let result = {
            let mut ctx = self.ctx.into_partial_ref_mut();

            if let Some(max_index) = clause.iter().map(|lit| lit.index()).max() {
                ensure_var_count(ctx.borrow(), max_index + 1);
            }

            for &lit in clause.iter() {
                if ctx.part(VariablesP).var_type(lit.var()) == VarType::Eliminated {
                    return Err(SolverError::EliminatedVar { var: lit.var() });
                }
            }

            backtrack(ctx.borrow(), 0);
            load_clause(ctx.borrow(), clause)
        };

        self.record_error(result)
    }

    /// Add a formula to the solver.
    pub fn add_formula(&mut self, formula: &CnfFormula) -> Result<(), SolverError> {
        ensure_var_count(self.ctx.into_partial_ref_mut().borrow(), formula.var_count());
        for clause in formula.iter() {
            self.add_clause(clause)?;
        }
        Ok(())
    }

    /// Reads and adds a formula in DIMACS CNF format.
    pub fn add_dimacs_cnf(&mut self, input: impl io::Read) -> Result<(), Error> {
        let formula = DimacsParser::parse(input)?;

        info!(
            "Parsed formula with {} variables and {} clauses",
            formula.var_count(),
            formula.len()
        );

        self.add_formula(&formula)?;
        Ok(())
    }

    /// Assume a literal for the next solve call.
    pub fn assume(&mut self, lit: Lit) -> Result<(), SolverError> {
        self.check_error()?;
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), lit.index() + 1);
        if ctx.part(VariablesP).var_type(lit.var()) == VarType::Eliminated {
            return Err(SolverError::EliminatedVar { var: lit.var() });
        }
        self.assumptions.push(lit);
        Ok(())
    }

    /// Check the satisfiability of the current formula under the current assumptions.
    ///
    /// Every call starts with an inprocessing round. Assumptions are cleared afterwards. Returns [`SolveResult::Unknown`] when the termination
    /// callback or the conflict limit stopped the search.
    pub fn solve(&mut self) -> Result<SolveResult, SolverError> {
        self.check_error()?;

        let assumptions = std::mem::replace(&mut self.assumptions, vec![]);

        let start_conflicts = {
            let mut ctx = self.ctx.into_partial_ref_mut();
            backtrack(ctx.borrow(), 0);
            ctx.part_mut(AssumptionsP).clear_failed();
            set_assumptions(ctx.borrow(), &assumptions);
            ctx.part_mut(ScheduleP).request_inprocessing();

            let state = ctx.part_mut(SolverStateP);
            if state.sat_state != SatState::Unsat {
                state.sat_state = SatState::Unknown;
            }
            state.conflicts
        };

        let result = self.search(start_conflicts);

        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(AssumptionsP).clear();
        let result = result?;

        info!(
            "Solve result {:?} after {} conflicts",
            result,
            ctx.part(SolverStateP).conflicts - start_conflicts
        );

        Ok(result)
    }

    fn search(&mut self, start_conflicts: u64) -> Result<SolveResult, SolverError> {
        loop {
            let inprocess = {
                let mut ctx = self.ctx.into_partial_ref_mut();

                match ctx.part(SolverStateP).sat_state {
                    SatState::Unknown => (),
                    SatState::Sat => return Ok(SolveResult::Sat),
                    SatState::Unsat | SatState::UnsatUnderAssumptions => {
                        return Ok(SolveResult::Unsat)
                    }
                }

                let conflicts = ctx.part(SolverStateP).conflicts - start_conflicts;
                if self.conflict_limit.map_or(false, |limit| conflicts >= limit) {
                    debug!("conflict limit reached");
                    return Ok(SolveResult::Unknown);
                }

                if let Some(terminate) = self.terminate.as_mut() {
                    if terminate() {
                        debug!("search terminated by callback");
                        return Ok(SolveResult::Unknown);
                    }
                }

                inprocessing_due(ctx.borrow())
            };

            if inprocess {
                self.inprocess()?;
            } else {
                let result = schedule_step(self.ctx.into_partial_ref_mut().borrow());
                self.record_error(result)?;
            }
        }
    }

    /// Run the exchange and all inprocessors at the root level.
    fn inprocess(&mut self) -> Result<(), SolverError> {
        backtrack(self.ctx.into_partial_ref_mut().borrow(), 0);

        let result = match self.exchange.as_mut() {
            Some(hooks) => exchange(&mut self.ctx, hooks.as_mut()),
            None => {
                let mut ctx = self.ctx.into_partial_ref_mut();
                let state = ctx.part_mut(SolverStateP);
                state.new_units.clear();
                state.new_equivalences.clear();
                Ok(())
            }
        };
        self.record_error(result)?;

        if self.inprocessors.is_empty() {
            return Ok(());
        }

        debug!("running {} inprocessors", self.inprocessors.len());

        let mut access = InprocessingAccess::new(&mut self.ctx);
        for inprocessor in self.inprocessors.iter_mut() {
            if access.is_unsat() {
                break;
            }
            inprocessor.inprocess(&mut access)?;
        }

        Ok(())
    }

    /// Value of a literal in the model found by the last solve call.
    ///
    /// Returns `None` for variables that never occurred in the formula.
    pub fn value(&self, lit: Lit) -> Result<Option<bool>, SolverError> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state != SatState::Sat {
            return Err(SolverError::NoModel);
        }
        Ok(ctx.part(ExtensionP).lit_value(lit))
    }

    /// Set of literals that satisfy the formula.
    pub fn model(&self) -> Result<Vec<Lit>, SolverError> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state != SatState::Sat {
            return Err(SolverError::NoModel);
        }
        Ok(ctx
            .part(ExtensionP)
            .model()
            .iter()
            .enumerate()
            .flat_map(|(index, value)| value.map(|polarity| Lit::from_index(index, polarity)))
            .collect())
    }

    /// Whether an assumption of the last solve call is part of the failed core.
    pub fn failed(&self, lit: Lit) -> Result<bool, SolverError> {
        Ok(self.failed_assumptions()?.failed(lit))
    }

    /// Subset of the assumptions of the last solve call that made the formula unsatisfiable.
    ///
    /// Empty when the formula is unsatisfiable without assumptions.
    pub fn failed_core(&self) -> Result<&[Lit], SolverError> {
        Ok(self.failed_assumptions()?.failed_core())
    }

    fn failed_assumptions(&self) -> Result<&Assumptions, SolverError> {
        let ctx = self.ctx.into_partial_ref();
        match ctx.part(SolverStateP).sat_state {
            SatState::Unsat | SatState::UnsatUnderAssumptions => Ok(&self.ctx.assumptions),
            _ => Err(SolverError::NoFailedCore),
        }
    }

    /// Protect a variable from elimination and substitution by inprocessors.
    ///
    /// Freezing is reference counted, each call has to be matched by a call to
    /// [`melt`](Solver::melt).
    pub fn freeze(&mut self, var: Var) -> Result<(), SolverError> {
        self.check_error()?;
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), var.index() + 1);
        let data = ctx.part_mut(VariablesP).var_data_mut(var);
        if data.var_type == VarType::Eliminated {
            return Err(SolverError::EliminatedVar { var });
        }
        data.frozen += 1;
        Ok(())
    }

    /// Undo one call to [`freeze`](Solver::freeze).
    pub fn melt(&mut self, var: Var) -> Result<(), SolverError> {
        self.check_error()?;
        let mut ctx = self.ctx.into_partial_ref_mut();
        let variables = ctx.part_mut(VariablesP);
        if var.index() >= variables.var_count() || !variables.is_frozen(var) {
            return Err(SolverError::NotFrozen { var });
        }
        variables.var_data_mut(var).frozen -= 1;
        Ok(())
    }

    pub fn is_frozen(&self, var: Var) -> bool {
        let ctx = self.ctx.into_partial_ref();
        let variables = ctx.part(VariablesP);
        var.index() < variables.var_count() && variables.is_frozen(var)
    }

    /// Add an inprocessor, run periodically at the root level.
    pub fn add_inprocessor(&mut self, inprocessor: impl Inprocessor + 'static) {
        self.inprocessors.push(Box::new(inprocessor));
    }

    /// Set the exchange used to share units and equivalences with other solvers.
    pub fn set_exchange(&mut self, exchange: impl Exchange + 'static) {
        self.exchange = Some(Box::new(exchange));
    }

    /// Set a callback that is polled once per conflict and stops the search when it returns true.
    pub fn set_terminate(&mut self, terminate: impl FnMut() -> bool + 'static) {
        self.terminate = Some(Box::new(terminate));
    }

    /// Limit the number of conflicts of each solve call.
    pub fn set_conflict_limit(&mut self, limit: Option<u64>) {
        self.conflict_limit = limit;
    }

    /// Total number of conflicts.
    pub fn conflicts(&self) -> u64 {
        self.ctx.into_partial_ref().part(SolverStateP).conflicts
    }

    /// An independent copy of this solver.
    ///
    /// The copy shares no state with this solver. Inprocessors, the exchange and the termination
    /// callback are not copied.
    pub fn fork(&self) -> Solver {
        Solver {
            ctx: self.ctx.clone(),
            clause: self.clause.clone(),
            assumptions: self.assumptions.clone(),
            conflict_limit: self.conflict_limit,
            ..Solver::default()
        }
    }

    fn check_error(&self) -> Result<(), SolverError> {
        match &self.ctx.into_partial_ref().part(SolverStateP).solver_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Keep resource exhaustion errors, the solver state is incomplete after them.
    fn record_error<T>(&mut self, result: Result<T, SolverError>) -> Result<T, SolverError> {
        if let Err(error @ SolverError::ResourceExhausted { .. }) = &result {
            self.ctx
                .into_partial_ref_mut()
                .part_mut(SolverStateP)
                .solver_error = Some(error.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use blitsat_dimacs::write_dimacs;
    use blitsat_formula::{cnf_formula, lit, lits, test::*, var, ExtendFormula};

    use crate::clause::ClauseHandle;

    fn check_model(solver: &Solver, formula: &CnfFormula) -> Result<(), TestCaseError> {
        let model = solver.model().unwrap();
        for clause in formula.iter() {
            prop_assert!(clause.iter().any(|lit| model.contains(lit)));
        }
        Ok(())
    }

    #[test]
    fn add_literal_builds_clauses() {
        let mut solver = Solver::new();

        for &value in [1, 2, 0, -1, 0, -2, 0].iter() {
            solver.add_literal(value).unwrap();
        }

        assert_eq!(solver.solve(), Ok(SolveResult::Unsat));
        assert_eq!(solver.failed_core(), Ok(&[][..]));
    }

    #[test]
    fn lit_out_of_range() {
        let mut solver = Solver::new();
        let value = Var::max_count() as isize + 1;
        assert_eq!(
            solver.add_literal(-value),
            Err(SolverError::LitOutOfRange { value: -value })
        );
    }

    #[test]
    fn queries_before_solve() {
        let mut solver = Solver::new();
        solver.add_clause(&lits![1, 2]).unwrap();

        assert_eq!(solver.value(lit!(1)), Err(SolverError::NoModel));
        assert_eq!(solver.model(), Err(SolverError::NoModel));
        assert_eq!(solver.failed(lit!(1)), Err(SolverError::NoFailedCore));

        assert_eq!(solver.solve(), Ok(SolveResult::Sat));
        assert_eq!(solver.failed_core(), Err(SolverError::NoFailedCore));
        assert_eq!(solver.value(lit!(7)), Ok(None));
    }

    #[test]
    fn assumptions_are_cleared() {
        let mut solver = Solver::new();
        solver.add_clause(&lits![1, 2]).unwrap();
        solver.add_clause(&lits![-1, 2]).unwrap();

        solver.assume(lit!(-2)).unwrap();
        assert_eq!(solver.solve(), Ok(SolveResult::Unsat));
        assert_eq!(solver.failed_core(), Ok(&lits![-2][..]));
        assert_eq!(solver.failed(lit!(-2)), Ok(true));

        assert_eq!(solver.solve(), Ok(SolveResult::Sat));
        assert_eq!(solver.value(lit!(2)), Ok(Some(true)));
    }

    #[test]
    fn freeze_and_melt() {
        let mut solver = Solver::new();

        assert!(!solver.is_frozen(var!(3)));
        solver.freeze(var!(3)).unwrap();
        solver.freeze(var!(3)).unwrap();
        solver.melt(var!(3)).unwrap();
        assert!(solver.is_frozen(var!(3)));
        solver.melt(var!(3)).unwrap();
        assert!(!solver.is_frozen(var!(3)));
        assert_eq!(
            solver.melt(var!(3)),
            Err(SolverError::NotFrozen { var: var!(3) })
        );
        assert_eq!(
            solver.melt(var!(9)),
            Err(SolverError::NotFrozen { var: var!(9) })
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut solver = Solver::new();
        let mut update = SolverConfigUpdate::new();
        update.luby_restart_interval_scale = Some(0);

        assert!(matches!(
            solver.config(&update),
            Err(SolverError::InvalidConfig(_))
        ));

        let mut update = SolverConfigUpdate::new();
        update.reduce_init = Some(10);
        update.reduce_inc = Some(5);
        solver.config(&update).unwrap();
    }

    #[test]
    fn resource_exhaustion_is_sticky() {
        let mut solver = Solver::new();
        let mut update = SolverConfigUpdate::new();
        update.bucket_words = Some(8);
        update.max_bucket_words = Some(8);
        solver.config(&update).unwrap();

        solver.add_clause(&lits![1, 2, 3, 4, 5]).unwrap();
        let error = solver.add_clause(&lits![-1, -2, -3, -4, -5]).unwrap_err();
        assert!(matches!(error, SolverError::ResourceExhausted { .. }));

        assert_eq!(solver.solve(), Err(error.clone()));
        assert_eq!(solver.add_clause(&lits![1]), Err(error.clone()));
        assert_eq!(solver.assume(lit!(2)), Err(error.clone()));
        assert_eq!(solver.freeze(var!(3)), Err(error));
    }

    /// Replaces all long clauses by a single one on the first call.
    struct ReplaceLong {
        done: bool,
    }

    impl Inprocessor for ReplaceLong {
        fn inprocess(&mut self, access: &mut InprocessingAccess) -> Result<(), SolverError> {
            if self.done {
                return Ok(());
            }
            self.done = true;
            for (handle, _) in access.clauses() {
                if let ClauseHandle::Long(_) = handle {
                    access.remove_clause(handle);
                }
            }
            access.add_clause(&lits![1, 2, 3, 4, 5], false)
        }
    }

    #[test]
    fn removed_clauses_free_bucket_space() {
        let mut solver = Solver::new();
        let mut update = SolverConfigUpdate::new();
        update.bucket_words = Some(12);
        update.max_bucket_words = Some(12);
        solver.config(&update).unwrap();

        solver.add_clause(&lits![1, 2, 3, 4, 5]).unwrap();
        solver.add_clause(&lits![-1, -2, -3, -4, -5]).unwrap();
        solver.add_inprocessor(ReplaceLong { done: false });

        assert_eq!(solver.solve(), Ok(SolveResult::Sat));
        assert_eq!(solver.ctx.clause_db.long_count(false), 1);

        solver.add_clause(&lits![-1, 2, -3, 4, -5]).unwrap();
        assert_eq!(solver.solve(), Ok(SolveResult::Sat));
    }

    #[test]
    fn conflict_limit_and_termination() {
        let formula = pigeon_hole(7);

        let mut solver = Solver::new();
        solver.add_formula(&formula).unwrap();
        solver.set_conflict_limit(Some(10));
        assert_eq!(solver.solve(), Ok(SolveResult::Unknown));
        assert_eq!(solver.conflicts(), 10);

        solver.set_conflict_limit(None);
        let mut polls = 0;
        solver.set_terminate(move || {
            polls += 1;
            polls > 5
        });
        assert_eq!(solver.solve(), Ok(SolveResult::Unknown));
    }

    #[test]
    fn fork_is_independent() {
        let mut solver = Solver::new();
        solver
            .add_formula(&cnf_formula![
                1, 2, 3;
                -1, -2;
                -2, -3;
            ])
            .unwrap();

        let mut fork = solver.fork();
        fork.add_clause(&lits![-3]).unwrap();
        fork.add_clause(&lits![-1]).unwrap();
        assert_eq!(fork.solve(), Ok(SolveResult::Sat));
        assert_eq!(fork.value(lit!(2)), Ok(Some(true)));

        solver.add_clause(&lits![-2]).unwrap();
        assert_eq!(solver.solve(), Ok(SolveResult::Sat));
        assert_eq!(fork.value(lit!(2)), Ok(Some(true)));
        assert_eq!(solver.value(lit!(2)), Ok(Some(false)));
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula).unwrap();

            prop_assert_eq!(solver.solve(), Ok(SolveResult::Unsat));
            prop_assert_eq!(solver.solve(), Ok(SolveResult::Unsat));
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula).unwrap();

            prop_assert_eq!(solver.solve(), Ok(SolveResult::Sat));
            check_model(&solver, &formula)?;
        }

        #[test]
        fn sat_via_dimacs(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            let mut dimacs = vec![];

            write_dimacs(&mut dimacs, &formula).unwrap();

            solver.add_dimacs_cnf(&mut &dimacs[..]).unwrap();

            prop_assert_eq!(solver.solve(), Ok(SolveResult::Sat));
            check_model(&solver, &formula)?;
        }

        #[test]
        fn sat_via_add_literal(
            formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0),
        ) {
            let mut solver = Solver::new();

            for clause in formula.iter() {
                for &lit in clause.iter() {
                    solver.add_literal(lit.to_dimacs()).unwrap();
                }
                solver.add_literal(0).unwrap();
            }

            prop_assert_eq!(solver.solve(), Ok(SolveResult::Sat));
            check_model(&solver, &formula)?;
        }

        #[test]
        fn failed_core(
            (enable_row, columns, formula) in conditional_pigeon_hole(1..5usize, 1..5usize),
        ) {
            let mut solver = Solver::new();
            solver.add_formula(&formula).unwrap();

            for &lit in enable_row.iter() {
                solver.assume(lit).unwrap();
            }

            prop_assert_eq!(solver.solve(), Ok(SolveResult::Unsat));

            let core = solver.failed_core().unwrap().to_vec();
            prop_assert!(core.len() > columns);
            for &lit in core.iter() {
                prop_assert!(enable_row.contains(&lit));
                prop_assert_eq!(solver.failed(lit), Ok(true));
            }

            // The core alone is enough for the conflict
            let mut core_formula = formula.clone();
            for &lit in core.iter() {
                core_formula.add_clause(&[lit]);
            }
            let mut check = Solver::new();
            check.add_formula(&core_formula).unwrap();
            prop_assert_eq!(check.solve(), Ok(SolveResult::Unsat));

            // Without assumptions the formula is satisfiable
            prop_assert_eq!(solver.solve(), Ok(SolveResult::Sat));
            check_model(&solver, &formula)?;
        }
    }
}
