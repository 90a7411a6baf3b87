//! The implication graph.

use blitsat_formula::{Lit, LitIdx, Var};

use crate::clause::{ClauseDb, LongRef};

/// Assignments that caused a propagation.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    Decision,
    /// A root level unit or an assumption.
    Unit,
    Binary([Lit; 1]),
    Ternary([Lit; 2]),
    Long(LongRef),
}

impl Reason {
    /// The literals that caused the propagation.
    ///
    /// These are the false literals of the propagating clause.
    pub fn lits<'a>(&'a self, db: &'a ClauseDb) -> &'a [Lit] {
        match self {
            Reason::Decision | Reason::Unit => &[],
            Reason::Binary(lits) => lits,
            Reason::Ternary(lits) => lits,
            // The propagated literal is always kept at position 0
            Reason::Long(cref) => &db.lits(*cref)[1..],
        }
    }

    /// True if not implied by other assignments.
    pub fn is_source(&self) -> bool {
        match self {
            Reason::Decision | Reason::Unit => true,
            _ => false,
        }
    }
}

/// Propagation that resulted in a conflict.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Conflict {
    Binary([Lit; 2]),
    Ternary([Lit; 3]),
    Long(LongRef),
}

impl Conflict {
    /// The literals that caused the conflict.
    pub fn lits<'a>(&'a self, db: &'a ClauseDb) -> &'a [Lit] {
        match self {
            Conflict::Binary(lits) => lits,
            Conflict::Ternary(lits) => lits,
            Conflict::Long(cref) => db.lits(*cref),
        }
    }
}

/// Node and incoming edges of the implication graph.
#[derive(Copy, Clone)]
pub struct ImplNode {
    pub reason: Reason,
    pub level: LitIdx,
    /// Position in trail when assigned.
    pub depth: LitIdx,
}

/// The implication graph.
///
/// This is a DAG having all assigned variables as nodes. It has unit clauses, assumptions and
/// decisions as sources. For each propagated assignment it has incoming edges from the literals
/// whose assignment caused the propagation to happen.
#[derive(Default, Clone)]
pub struct ImplGraph {
    /// Contains only valid data for indices of assigned variables.
    pub nodes: Vec<ImplNode>,
}

impl ImplGraph {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.nodes.resize(
            count,
            ImplNode {
                reason: Reason::Unit,
                level: 0,
                depth: 0,
            },
        );
    }

    /// Get the reason for an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn reason(&self, var: Var) -> &Reason {
        &self.nodes[var.index()].reason
    }

    /// Get the decision level of an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn level(&self, var: Var) -> usize {
        self.nodes[var.index()].level as usize
    }

    /// Get the trail depth of an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn depth(&self, var: Var) -> usize {
        self.nodes[var.index()].depth as usize
    }

    /// Updates the reason for an assigned variable.
    ///
    /// Make sure the reason vars are in front of the assigned variable in the trail.
    pub fn update_reason(&mut self, var: Var, reason: Reason) {
        self.nodes[var.index()].reason = reason
    }

    /// The parent of a true literal in the binary implication tree.
    ///
    /// This is the true literal that implied it via a binary clause, if any.
    pub fn binary_parent(&self, lit: Lit) -> Option<Lit> {
        match self.nodes[lit.index()].reason {
            Reason::Binary([reason]) => Some(!reason),
            _ => None,
        }
    }
}
