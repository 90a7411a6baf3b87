//! Partial assignment and trail.
use partial_ref::{partial, PartialRef};

use blitsat_formula::{Lit, LitIdx, Var};

use crate::context::{parts::*, Context};

use super::Reason;

/// Current partial assignment.
#[derive(Default, Clone)]
pub struct Assignment {
    assignment: Vec<Option<bool>>,
    /// Saved phases, the value each variable had when it was last unassigned.
    last_value: Vec<bool>,
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize, initial_phase: bool) {
        self.assignment.resize(count, None);
        self.last_value.resize(count, initial_phase);
    }

    /// Current partial assignment as slice.
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.assignment
    }

    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment[var.index()]
    }

    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.index()].map(|b| b ^ lit.is_negative())
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.assignment[lit.index()] == Some(lit.is_positive())
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        self.assignment[lit.index()] == Some(lit.is_negative())
    }

    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        self.assignment[lit.index()].is_none()
    }

    pub fn assign_lit(&mut self, lit: Lit) {
        self.assignment[lit.index()] = lit.is_positive().into()
    }

    /// Unassign a variable, saving its phase.
    pub fn unassign_var(&mut self, var: Var) {
        if let Some(value) = self.assignment[var.index()].take() {
            self.last_value[var.index()] = value;
        }
    }

    /// The saved phase of a variable.
    pub fn last_var_value(&self, var: Var) -> bool {
        self.last_value[var.index()]
    }
}

/// Decision and propagation history.
///
/// Propagation is done in two phases with separate queue heads. All binary clauses are propagated
/// for the whole trail before any ternary or long clause is visited.
#[derive(Default, Clone)]
pub struct Trail {
    /// Stack of all propagated and all enqueued assignments
    trail: Vec<Lit>,
    /// Next assignment in trail to propagate using binary clauses.
    binary_head: usize,
    /// Next assignment in trail to propagate using ternary and long clauses.
    long_head: usize,
    /// Decision levels as trail indices.
    decisions: Vec<LitIdx>,
}

impl Trail {
    /// Next assigned literal to propagate using binary clauses.
    pub fn binary_queue_head(&self) -> Option<Lit> {
        self.trail.get(self.binary_head).cloned()
    }

    pub fn pop_binary_queue(&mut self) {
        self.binary_head += 1;
        debug_assert!(self.binary_head <= self.trail.len());
    }

    /// Next assigned literal to propagate using ternary and long clauses.
    pub fn long_queue_head(&self) -> Option<Lit> {
        self.trail.get(self.long_head).cloned()
    }

    pub fn pop_long_queue(&mut self) {
        self.long_head += 1;
        debug_assert!(self.long_head <= self.binary_head);
    }

    /// Whether all assignments were propagated.
    pub fn fully_propagated(&self) -> bool {
        self.long_head == self.trail.len()
    }

    /// Mark all assignments as unpropagated.
    pub fn reset_queue(&mut self) {
        self.binary_head = 0;
        self.long_head = 0;
    }

    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Start a new decision level.
    ///
    /// Does not enqueue the decision itself.
    pub fn new_decision_level(&mut self) {
        self.decisions.push(self.trail.len() as LitIdx)
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.decisions.len()
    }

    /// Trail position of the first assignment of a decision level above 0.
    pub fn level_start(&self, level: usize) -> usize {
        self.decisions[level - 1] as usize
    }

    /// The decision literal of a level above 0, if the level is not empty.
    pub fn decision(&self, level: usize) -> Option<Lit> {
        let start = self.level_start(level);
        let end = self
            .decisions
            .get(level)
            .map_or(self.trail.len(), |&end| end as usize);
        if start < end {
            Some(self.trail[start])
        } else {
            None
        }
    }

    /// Remove all root level assignments.
    ///
    /// Only valid at level 0 after the assignments were propagated and made permanent.
    pub fn clear(&mut self) {
        debug_assert_eq!(self.current_level(), 0);
        self.trail.clear();
        self.reset_queue();
    }
}

/// Enqueues the assignment of true to a literal.
///
/// This updates the assignment and trail, but does not perform any propagation. The literal has to
/// be unassigned when calling this.
pub fn enqueue_assignment(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
    reason: Reason,
) {
    let assignment = ctx.part_mut(AssignmentP);
    debug_assert!(assignment.lit_value(lit) == None);

    assignment.assign_lit(lit);

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
    node.reason = reason;
    node.level = trail.decisions.len() as LitIdx;
    node.depth = trail.trail.len() as LitIdx;

    trail.trail.push(lit);
}

/// Undo all assignments in decision levels deeper than the given level.
///
/// Unassigned variables keep their value as saved phase and become available for decisions.
pub fn backtrack(
    mut ctx: partial!(Context, mut AssignmentP, mut TrailP, mut VmtfP),
    level: usize,
) {
    let (assignment, mut ctx) = ctx.split_part_mut(AssignmentP);
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);
    let vmtf = ctx.part_mut(VmtfP);

    if level >= trail.decisions.len() {
        return;
    }

    let new_trail_len = trail.decisions[level] as usize;

    trail.binary_head = trail.binary_head.min(new_trail_len);
    trail.long_head = trail.long_head.min(new_trail_len);
    trail.decisions.truncate(level);

    for &lit in trail.trail[new_trail_len..].iter() {
        assignment.unassign_var(lit.var());
        vmtf.make_available(lit.var());
    }
    trail.trail.truncate(new_trail_len);
}
