//! Learns a new clause by analyzing a conflict.
//!
//! Starting from the conflict clause, the clause is resolved with the reasons of current level
//! literals in reverse trail order until a single literal of the current level remains, the first
//! unique implication point. The resulting clause is then minimized by removing literals that are
//! implied by the remaining literals.
//!
//! When an intermediate resolvent is a subset of the antecedent it is resolved with, the antecedent
//! is strengthened in place by dropping the resolved literal. This is on-the-fly strengthening as
//! described by [Han and Somenzi in "On-the-fly clause improvement"][otfs]. If the strengthened
//! antecedent has a single literal of the current level, it is asserting by itself and no new
//! clause is learned.
//!
//! [otfs]: https://doi.org/10.1007/978-3-642-02777-2_21
use std::cmp::Reverse;
use std::mem::swap;

use log::trace;
use partial_ref::{partial, PartialRef};

use blitsat_formula::{Lit, Var};

use crate::clause::{strengthen_clause, ClauseDb, ClauseHandle, LongRef, Strengthened};
use crate::context::{parts::*, Context};
use crate::glue::compute_glue;
use crate::prop::{Conflict, ImplGraph, Reason};
use crate::variables::{mark, Variables};

/// Temporaries for conflict analysis
#[derive(Default, Clone)]
pub struct AnalyzeConflict {
    /// This is the learned clause after analysis finishes.
    clause: Vec<Lit>,
    /// Number of literals in the current clause at the current level.
    current_level_count: usize,
    /// Variables that were part of any intermediate clause.
    seen: Vec<Var>,
    /// Redundant long clauses that took part in the analysis, with their glue.
    involved: Vec<(LongRef, usize)>,
    /// Search stack used by minimization, literals paired with the index of the next reason
    /// literal to visit.
    stack: Vec<(Lit, usize)>,
    /// Variables with minimization marks.
    to_clean: Vec<Var>,
}

impl AnalyzeConflict {
    /// The learned clause.
    ///
    /// The asserting literal is in position 0, a literal of the backtrack level in position 1.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }

    /// Variables involved in the last conflict.
    pub fn seen_mut(&mut self) -> &mut Vec<Var> {
        &mut self.seen
    }

    /// Redundant long clauses used in the last analysis, with their glue.
    pub fn involved(&self) -> &[(LongRef, usize)] {
        &self.involved
    }
}

/// Result of analyzing a conflict.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Analysis {
    /// The conflict doesn't depend on any decision.
    Unsat,
    /// A clause was learned, see [`AnalyzeConflict::clause`].
    Learned { backtrack_to: usize, glue: usize },
    /// An antecedent was strengthened into an asserting clause.
    Strengthened {
        backtrack_to: usize,
        lit: Lit,
        reason: Reason,
    },
}

/// Learns a new clause by analyzing a conflict.
///
/// All literals of the conflict have to be assigned at or below the current level, with at least
/// one of them at the current level.
pub fn analyze_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut ClauseDbP,
        mut TmpDataP,
        mut VariablesP,
        mut WatchlistsP,
        ImplGraphP,
        SolverConfigP,
        TrailP,
    ),
    conflict: Conflict,
) -> Analysis {
    {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        analyze.clause.clear();
        analyze.current_level_count = 0;
        analyze.seen.clear();
        analyze.involved.clear();
    }

    if ctx.part(TrailP).current_level() == 0 {
        return Analysis::Unsat;
    }

    {
        let (db, mut ctx) = ctx.split_part(ClauseDbP);
        for &lit in conflict.lits(db) {
            add_literal(ctx.borrow(), lit);
        }
    }

    if let Conflict::Long(cref) = conflict {
        note_involved(ctx.borrow(), cref);
    }

    let otfs = ctx.part(SolverConfigP).otfs;

    // To get rid of all but one literal of the current level, we resolve the clause with the reason
    // for those literals. The correct order for this is reverse chronological.
    let mut uip = None;

    let trail_len = ctx.part(TrailP).trail().len();

    for pos in (0..trail_len).rev() {
        let lit = ctx.part(TrailP).trail()[pos];
        let var = lit.var();
        if !ctx.part(VariablesP).marked(var, mark::SEEN) {
            continue;
        }
        ctx.part_mut(VariablesP).unset_mark(var, mark::SEEN);

        let analyze = ctx.part_mut(AnalyzeConflictP);
        analyze.current_level_count -= 1;
        if analyze.current_level_count == 0 {
            uip = Some(!lit);
            break;
        }

        let reason = *ctx.part(ImplGraphP).reason(var);

        let subsumes = otfs && resolvent_subsumes(&ctx.borrow(), reason);

        {
            let (db, mut ctx) = ctx.split_part(ClauseDbP);
            for &reason_lit in reason.lits(db) {
                add_literal(ctx.borrow(), reason_lit);
            }
        }

        if subsumes {
            if let Some(analysis) = strengthen_antecedent(ctx.borrow(), lit, reason) {
                clear_seen(ctx.borrow());
                return analysis;
            }
        }

        if let Reason::Long(cref) = reason {
            if ctx.part(ClauseDbP).is_live(cref) {
                note_involved(ctx.borrow(), cref);
            }
        }
    }

    // Only reachable with a conflict at the current level
    let uip = match uip {
        Some(uip) => uip,
        None => unreachable!("conflict without current level literal"),
    };

    {
        let analyze = ctx.part_mut(AnalyzeConflictP);
        analyze.clause.push(uip);
        let end = analyze.clause.len() - 1;
        analyze.clause.swap(0, end);
    }

    if ctx.part(SolverConfigP).minimize {
        minimize_clause(ctx.borrow());
    }

    clear_seen(ctx.borrow());

    // We find the highest level literal besides the asserted literal and move it into position 1.
    // This is important to ensure the watchlist constraints are not violated on backtracking.
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let impl_graph = ctx.part(ImplGraphP);
    let mut backtrack_to = 0;

    if analyze.clause.len() > 1 {
        let (prefix, rest) = analyze.clause.split_at_mut(2);
        let lit_1 = &mut prefix[1];
        backtrack_to = impl_graph.level(lit_1.var());
        for lit in rest.iter_mut() {
            let lit_level = impl_graph.level(lit.var());
            if lit_level > backtrack_to {
                backtrack_to = lit_level;
                swap(lit_1, lit);
            }
        }
    }

    // The current level is not counted
    let glue = compute_glue(ctx.borrow(), &analyze.clause).saturating_sub(1);

    trace!("learned {:?} glue {}", analyze.clause, glue);

    Analysis::Learned { backtrack_to, glue }
}

/// Add a literal to the current clause.
fn add_literal(
    mut ctx: partial!(Context, mut AnalyzeConflictP, mut VariablesP, ImplGraphP, TrailP),
    lit: Lit,
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let (variables, ctx) = ctx.split_part_mut(VariablesP);
    let lit_level = ctx.part(ImplGraphP).level(lit.var());
    // No need to add literals that are set by unit clauses or already present
    if lit_level > 0 && !variables.marked(lit.var(), mark::SEEN) {
        variables.set_mark(lit.var(), mark::SEEN);
        analyze.seen.push(lit.var());
        if lit_level == ctx.part(TrailP).current_level() {
            analyze.current_level_count += 1;
        } else {
            analyze.clause.push(lit);
        }
    }
}

/// Record a redundant long clause used in the analysis.
fn note_involved(
    mut ctx: partial!(Context, mut AnalyzeConflictP, mut TmpDataP, ClauseDbP, ImplGraphP),
    cref: LongRef,
) {
    if !cref.is_redundant() {
        return;
    }
    let (db, mut ctx) = ctx.split_part(ClauseDbP);
    let glue = compute_glue(ctx.borrow(), db.lits(cref)).saturating_sub(1);
    ctx.part_mut(AnalyzeConflictP).involved.push((cref, glue));
}

/// Whether resolving the current clause with an antecedent gives a subset of that antecedent.
///
/// Must be called after removing the resolved literal from the current clause but before adding
/// the antecedent's literals. Root level literals are ignored.
fn resolvent_subsumes(
    ctx: &partial!(Context, AnalyzeConflictP, ClauseDbP, ImplGraphP, VariablesP),
    reason: Reason,
) -> bool {
    match reason {
        Reason::Ternary(_) | Reason::Long(_) => (),
        _ => return false,
    }

    let analyze = ctx.part(AnalyzeConflictP);
    let impl_graph = ctx.part(ImplGraphP);
    let variables = ctx.part(VariablesP);

    let mut reason_len = 0;
    let mut added = 0;

    for &lit in reason.lits(ctx.part(ClauseDbP)) {
        if impl_graph.level(lit.var()) > 0 {
            reason_len += 1;
            if !variables.marked(lit.var(), mark::SEEN) {
                added += 1;
            }
        }
    }

    analyze.current_level_count + analyze.clause.len() + added == reason_len
}

/// Remove the resolved literal and all root level literals from an antecedent.
///
/// Returns the analysis result if the strengthened antecedent is asserting.
fn strengthen_antecedent(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut TmpDataP,
        mut WatchlistsP,
        AnalyzeConflictP,
        ImplGraphP,
    ),
    lit: Lit,
    reason: Reason,
) -> Option<Analysis> {
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);
    let (impl_graph, mut ctx) = ctx.split_part(ImplGraphP);

    tmp.lits.clear();

    let handle = {
        let db = ctx.part(ClauseDbP);
        tmp.lits.extend(
            reason
                .lits(db)
                .iter()
                .filter(|reason_lit| impl_graph.level(reason_lit.var()) > 0),
        );
        match reason {
            Reason::Ternary([a, b]) => {
                let lits = [lit, a, b];
                let redundant = ctx.part(WatchlistsP).ternary_is_redundant(lits);
                ClauseHandle::Ternary(lits, redundant)
            }
            Reason::Long(cref) => ClauseHandle::Long(cref),
            _ => unreachable!("only ternary and long antecedents are strengthened"),
        }
    };

    // Keeps the new watched literals in front
    tmp.lits.sort_unstable_by_key(|lit| {
        let var = lit.var();
        Reverse((impl_graph.level(var), impl_graph.depth(var)))
    });

    trace!("strengthened {:?} to {:?}", handle, tmp.lits);

    let strengthened = strengthen_clause(ctx.borrow(), handle, &tmp.lits);

    if ctx.part(AnalyzeConflictP).current_level_count != 1 {
        return None;
    }

    let lits = &tmp.lits;
    let backtrack_to = lits.get(1).map_or(0, |lit| impl_graph.level(lit.var()));

    let reason = match strengthened {
        Strengthened::Unit(_) => Reason::Unit,
        Strengthened::Clause(ClauseHandle::Binary(..)) => Reason::Binary([lits[1]]),
        Strengthened::Clause(ClauseHandle::Ternary(..)) => Reason::Ternary([lits[1], lits[2]]),
        Strengthened::Clause(ClauseHandle::Long(cref)) => Reason::Long(cref),
    };

    Some(Analysis::Strengthened {
        backtrack_to,
        lit: lits[0],
        reason,
    })
}

/// Clear the marks of all variables seen during analysis.
fn clear_seen(mut ctx: partial!(Context, mut VariablesP, AnalyzeConflictP)) {
    let (variables, ctx) = ctx.split_part_mut(VariablesP);
    for &var in ctx.part(AnalyzeConflictP).seen.iter() {
        variables.clear_marks(var);
    }
}

/// Remove literals of the learned clause that are implied by other literals of the clause.
///
/// This is the recursive minimization of MiniSat. A literal can be removed if every path back from
/// it in the implication graph reaches a literal of the clause before reaching a decision.
fn minimize_clause(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut TmpDataP,
        mut VariablesP,
        ClauseDbP,
        ImplGraphP,
    ),
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);
    let (variables, ctx) = ctx.split_part_mut(VariablesP);
    let impl_graph = ctx.part(ImplGraphP);
    let db = ctx.part(ClauseDbP);

    let AnalyzeConflict {
        clause,
        stack,
        to_clean,
        ..
    } = analyze;

    // Implied literals must come from a level that is present in the clause
    let levels = &mut tmp.flags;
    for &lit in clause[1..].iter() {
        levels[impl_graph.level(lit.var())] = true;
    }

    let before = clause.len();

    let mut pos = 1;
    while pos < clause.len() {
        let lit = clause[pos];
        let redundant = !impl_graph.reason(lit.var()).is_source()
            && lit_redundant(variables, impl_graph, db, levels, stack, to_clean, lit);
        if redundant {
            clause.swap_remove(pos);
        } else {
            pos += 1;
        }
    }

    trace!("minimized {} of {} literals", before - clause.len(), before);

    for &lit in clause[1..].iter() {
        levels[impl_graph.level(lit.var())] = false;
    }

    for var in to_clean.drain(..) {
        variables.unset_mark(var, mark::POISON | mark::REMOVABLE);
    }
}

/// Whether a literal of the learned clause is implied by the other literals.
///
/// Caches results using the `REMOVABLE` and `POISON` marks.
fn lit_redundant(
    variables: &mut Variables,
    impl_graph: &ImplGraph,
    db: &ClauseDb,
    levels: &[bool],
    stack: &mut Vec<(Lit, usize)>,
    to_clean: &mut Vec<Var>,
    lit: Lit,
) -> bool {
    stack.clear();
    stack.push((lit, 0));

    while let Some(&(top, index)) = stack.last() {
        let reason_lits = impl_graph.reason(top.var()).lits(db);

        if index == reason_lits.len() {
            // All antecedents are implied, so this literal is as well
            stack.pop();
            if top != lit {
                variables.set_mark(top.var(), mark::REMOVABLE);
                to_clean.push(top.var());
            }
            continue;
        }

        let depth = stack.len() - 1;
        stack[depth].1 += 1;

        let reason_lit = reason_lits[index];
        let var = reason_lit.var();
        let level = impl_graph.level(var);

        if level == 0 || variables.marked(var, mark::SEEN | mark::REMOVABLE) {
            continue;
        }

        if variables.marked(var, mark::POISON)
            || impl_graph.reason(var).is_source()
            || !levels[level]
        {
            for &(failed, _) in stack[1..].iter() {
                variables.set_mark(failed.var(), mark::POISON);
                to_clean.push(failed.var());
            }
            variables.set_mark(var, mark::POISON);
            to_clean.push(var);
            return false;
        }

        stack.push((reason_lit, 0));
    }

    true
}
