//! Sharing of root level facts between solvers.
//!
//! Solvers running on the same formula can speed each other up by exchanging the units and
//! equivalences they derived. An [`Exchange`] is called at the root level between inprocessing
//! rounds. The solver never blocks on it; any synchronization between threads is up to the
//! implementation.
use log::debug;
use partial_ref::{IntoPartialRefMut, PartialRef};

use blitsat_formula::Lit;

use crate::context::{ensure_var_count, parts::*, Context};
use crate::load::{load_clause, load_redundant_clause};
use crate::solver::SolverError;
use crate::variables::VarType;

/// Producer and consumer of root level units and equivalences.
///
/// All methods have empty default implementations.
pub trait Exchange {
    /// Called with the root level units found since the last call.
    fn export_units(&mut self, units: &[Lit]) {
        let _ = units;
    }

    /// Called with the substitutions made since the last call.
    ///
    /// Each pair `(lit, repr)` states that `lit` is equivalent to `repr`.
    fn export_equivalences(&mut self, equivalences: &[(Lit, Lit)]) {
        let _ = equivalences;
    }

    /// Units derived elsewhere.
    fn import_units(&mut self) -> Vec<Lit> {
        vec![]
    }

    /// Equivalences derived elsewhere.
    fn import_equivalences(&mut self) -> Vec<(Lit, Lit)> {
        vec![]
    }
}

/// Export new facts and import those of other solvers.
///
/// Must be called at the root level. Imported facts mentioning eliminated variables are skipped,
/// imported equivalences are added as a pair of redundant binary clauses.
pub(crate) fn exchange(ctx: &mut Context, exchange: &mut dyn Exchange) -> Result<(), SolverError> {
    let mut ctx = ctx.into_partial_ref_mut();

    let (units, equivalences) = {
        let state = ctx.part_mut(SolverStateP);
        (
            std::mem::replace(&mut state.new_units, vec![]),
            std::mem::replace(&mut state.new_equivalences, vec![]),
        )
    };

    if !units.is_empty() {
        exchange.export_units(&units);
    }
    if !equivalences.is_empty() {
        exchange.export_equivalences(&equivalences);
    }

    let imported_units = exchange.import_units();
    let imported_equivalences = exchange.import_equivalences();

    if let Some(max_index) = imported_units
        .iter()
        .chain(imported_equivalences.iter().flat_map(|(a, b)| vec![a, b]))
        .map(|lit| lit.index())
        .max()
    {
        ensure_var_count(ctx.borrow(), max_index + 1);
    }

    let mut skipped = 0;

    for &unit in imported_units.iter() {
        if ctx.part(VariablesP).var_type(unit.var()) == VarType::Eliminated {
            skipped += 1;
            continue;
        }
        load_clause(ctx.borrow(), &[unit])?;
    }

    for &(a, b) in imported_equivalences.iter() {
        let variables = ctx.part(VariablesP);
        if variables.var_type(a.var()) == VarType::Eliminated
            || variables.var_type(b.var()) == VarType::Eliminated
        {
            skipped += 1;
            continue;
        }
        load_redundant_clause(ctx.borrow(), &[!a, b])?;
        load_redundant_clause(ctx.borrow(), &[a, !b])?;
    }

    debug!(
        "exchanged {} units and {} equivalences, imported {} units and {} equivalences, skipped {}",
        units.len(),
        equivalences.len(),
        imported_units.len(),
        imported_equivalences.len(),
        skipped
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use blitsat_formula::{lit, lits};

    use crate::state::SatState;

    #[derive(Default)]
    struct Recording {
        exported: Vec<Lit>,
        units: Vec<Lit>,
        equivalences: Vec<(Lit, Lit)>,
    }

    impl Exchange for Recording {
        fn export_units(&mut self, units: &[Lit]) {
            self.exported.extend_from_slice(units);
        }

        fn import_units(&mut self) -> Vec<Lit> {
            std::mem::replace(&mut self.units, vec![])
        }

        fn import_equivalences(&mut self) -> Vec<(Lit, Lit)> {
            std::mem::replace(&mut self.equivalences, vec![])
        }
    }

    #[test]
    fn import_and_export() {
        let mut ctx = Context::default();
        ctx.into_partial_ref_mut()
            .part_mut(SolverStateP)
            .new_units
            .push(lit!(2));

        let mut recording = Recording {
            units: lits![-3].to_vec(),
            equivalences: vec![(lit!(1), lit!(-4))],
            ..Recording::default()
        };

        exchange(&mut ctx, &mut recording).unwrap();

        assert_eq!(recording.exported, lits![2]);

        let ctx = ctx.into_partial_ref_mut();
        assert_eq!(ctx.part(TrailP).trail(), &lits![-3]);
        assert_eq!(ctx.part(ClauseDbP).binary_count(true), 2);
        assert_eq!(ctx.part(ClauseDbP).binary_count(false), 0);
        assert!(ctx.part(SolverStateP).new_units.is_empty());
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }

    #[test]
    fn contradicting_import() {
        let mut ctx = Context::default();

        let mut recording = Recording {
            units: lits![1, -1].to_vec(),
            ..Recording::default()
        };

        exchange(&mut ctx, &mut recording).unwrap();

        let ctx = ctx.into_partial_ref_mut();
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }
}
