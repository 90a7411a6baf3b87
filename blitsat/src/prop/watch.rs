//! Watchlists to detect clauses that became unit.
//!
//! Binary and ternary clauses are stored entirely within the watchlists. Each such clause has one
//! watch in the list of every one of its literals, the watch contains the remaining literals of
//! the clause. Removing such a clause means removing all of these mirrored watches.
//!
//! Each long clause has always two watches pointing to it. The watches are kept in the watchlists
//! of two different literals of the clause. Whenever the watches are moved to different literals
//! the literals of the clause are permuted so the watched literals are in position 0 and 1.
//!
//! When a long clause is not unit under the current assignment, the watched literals point at two
//! non-false literals. When a clause is unit and thus propagating, the true literal is watched and
//! in position 0, the other watched literal is the one with the largest decision level and kept in
//! position 1. When a clause becomes satisfied before becoming unit the watches can be kept as they
//! were. When a literal is assigned false, scanning its watchlist finds all clauses for which this
//! invariant needs to be restored. Unassigning variables cannot invalidate the invariant, so
//! nothing needs to be done on backtracking.
//!
//! See [Section 4.5.1 of the "Handbook of Satisfiability"][handbook-ch4] for more details and
//! references.
//!
//! Watches of long clauses also store a blocking literal. This is a literal of the clause that is
//! different from the watched literal. When that literal is true, the clause is already satisfied,
//! which can be detected without accessing the clause database. This variant was introduced by
//! [Niklas Sörensson and Niklas Eén in "MINISAT 2.1 and MINISAT++1.0 — SAT Race 2008
//! Editions"][minisat-2.1].
//!
//! [handbook-ch4]: https://www.satassociation.org/articles/FAIA185-0131.pdf
//! [minisat-2.1]: https://www.cril.univ-artois.fr/SAT09/solvers/booklet.pdf

use partial_ref::{partial, PartialRef};

use blitsat_formula::Lit;

use crate::clause::LongRef;
use crate::context::{parts::*, Context};

/// An entry in the watchlist of a literal.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Watch {
    /// A binary clause containing the watching literal and `other`.
    Binary { other: Lit, redundant: bool },
    /// A ternary clause containing the watching literal and both `others`.
    Ternary { others: [Lit; 2], redundant: bool },
    /// A long clause which has the watching literal in position 0 or 1.
    Long {
        cref: LongRef,
        /// A literal of the clause, different from the watching literal.
        blocking: Lit,
    },
}

impl Watch {
    pub fn is_binary(&self) -> bool {
        match self {
            Watch::Binary { .. } => true,
            _ => false,
        }
    }
}

/// Watchlists to detect clauses that became unit.
#[derive(Default, Clone)]
pub struct Watchlists {
    /// Watches indexed by the code of the watching literal.
    watches: Vec<Vec<Watch>>,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Watches of clauses containing the given literal.
    pub fn watches(&self, lit: Lit) -> &[Watch] {
        &self.watches[lit.code()]
    }

    pub fn watches_mut(&mut self, lit: Lit) -> &mut Vec<Watch> {
        &mut self.watches[lit.code()]
    }

    /// Make a literal watch a clause.
    pub fn add_watch(&mut self, lit: Lit, watch: Watch) {
        self.watches[lit.code()].push(watch)
    }

    pub fn watch_binary(&mut self, lits: [Lit; 2], redundant: bool) {
        for i in 0..2 {
            let other = lits[i ^ 1];
            self.add_watch(lits[i], Watch::Binary { other, redundant });
        }
    }

    pub fn watch_ternary(&mut self, lits: [Lit; 3], redundant: bool) {
        for i in 0..3 {
            let others = [lits[(i + 1) % 3], lits[(i + 2) % 3]];
            self.add_watch(lits[i], Watch::Ternary { others, redundant });
        }
    }

    /// Start watching a long clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_long(&mut self, cref: LongRef, lits: [Lit; 2]) {
        for i in 0..2 {
            let blocking = lits[i ^ 1];
            self.add_watch(lits[i], Watch::Long { cref, blocking });
        }
    }

    /// Remove the first watch of a literal matching a predicate.
    ///
    /// Returns whether a watch was removed.
    pub fn remove_first(&mut self, lit: Lit, mut matches: impl FnMut(Watch) -> bool) -> bool {
        let watches = &mut self.watches[lit.code()];
        if let Some(pos) = watches.iter().position(|&watch| matches(watch)) {
            watches.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn unwatch_binary(&mut self, lits: [Lit; 2], redundant: bool) {
        for i in 0..2 {
            let removed = self.remove_first(lits[i], |watch| {
                watch
                    == Watch::Binary {
                        other: lits[i ^ 1],
                        redundant,
                    }
            });
            debug_assert!(removed, "missing binary watch for {:?}", lits);
        }
    }

    pub fn unwatch_ternary(&mut self, lits: [Lit; 3], redundant: bool) {
        for i in 0..3 {
            let (a, b) = (lits[(i + 1) % 3], lits[(i + 2) % 3]);
            let removed = self.remove_first(lits[i], |watch| match watch {
                Watch::Ternary {
                    others,
                    redundant: watch_redundant,
                } => watch_redundant == redundant && (others == [a, b] || others == [b, a]),
                _ => false,
            });
            debug_assert!(removed, "missing ternary watch for {:?}", lits);
        }
    }

    /// Whether a ternary clause stored in the watchlists is redundant.
    pub fn ternary_is_redundant(&self, lits: [Lit; 3]) -> bool {
        let (a, b) = (lits[1], lits[2]);
        self.watches(lits[0])
            .iter()
            .find_map(|watch| match *watch {
                Watch::Ternary { others, redundant } if others == [a, b] || others == [b, a] => {
                    Some(redundant)
                }
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Remove all watches.
    pub fn clear(&mut self) {
        for watchlist in self.watches.iter_mut() {
            watchlist.clear();
        }
    }

    /// Remove the watches of long clauses, keeping binary and ternary clauses.
    pub fn clear_long(&mut self) {
        for watchlist in self.watches.iter_mut() {
            watchlist.retain(|watch| match watch {
                Watch::Long { .. } => false,
                _ => true,
            });
        }
    }
}

/// A binary or ternary clause stored in the watchlists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortClause {
    pub lits: Vec<Lit>,
    pub redundant: bool,
}

/// All binary and ternary clauses, each reported once.
pub fn short_clauses(ctx: &partial!(Context, WatchlistsP)) -> Vec<ShortClause> {
    let watchlists = ctx.part(WatchlistsP);
    let mut clauses = vec![];
    for (code, watches) in watchlists.watches.iter().enumerate() {
        let lit = Lit::from_code(code);
        for &watch in watches.iter() {
            // Each clause is reported by its literal with the smallest code
            match watch {
                Watch::Binary { other, redundant } if lit.code() < other.code() => {
                    clauses.push(ShortClause {
                        lits: vec![lit, other],
                        redundant,
                    })
                }
                Watch::Ternary { others, redundant }
                    if others.iter().all(|other| lit.code() < other.code()) =>
                {
                    clauses.push(ShortClause {
                        lits: vec![lit, others[0], others[1]],
                        redundant,
                    })
                }
                _ => (),
            }
        }
    }
    clauses
}

/// Rebuild the watches of all long clauses.
///
/// Expects that the watchlists contain no watches for long clauses. The literals at position 0 and 1
/// of each clause are watched.
pub fn watch_long_clauses(mut ctx: partial!(Context, mut WatchlistsP, ClauseDbP)) {
    let (watchlists, ctx) = ctx.split_part_mut(WatchlistsP);
    let db = ctx.part(ClauseDbP);
    for cref in db.all_refs() {
        let lits = db.lits(cref);
        watchlists.watch_long(cref, [lits[0], lits[1]]);
    }
}
