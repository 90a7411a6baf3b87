//! CNF formulas.
use std::cmp::max;
use std::fmt;

use crate::lit::{Lit, Var};

/// A formula in conjunctive normal form (CNF).
///
/// Equivalent to `Vec<Vec<Lit>>` but stores all literals in a single buffer. Clause `i` spans the
/// literals between `clause_ends[i - 1]` and `clause_ends[i]`.
#[derive(Default, Clone, Eq)]
pub struct CnfFormula {
    var_count: usize,
    literals: Vec<Lit>,
    clause_ends: Vec<usize>,
}

impl CnfFormula {
    /// Create an empty CNF formula.
    pub fn new() -> CnfFormula {
        CnfFormula::default()
    }

    /// Number of variables in the formula.
    ///
    /// This also counts missing variables if a variable with a higher number is present.
    /// A vector of this length can be indexed with the variable indices present.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Increase the number of variables in the formula.
    ///
    /// If the parameter is less than the current variable count do nothing.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_count = max(self.var_count, count)
    }

    /// Number of clauses in the formula.
    pub fn len(&self) -> usize {
        self.clause_ends.len()
    }

    /// Whether the formula has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clause_ends.is_empty()
    }

    /// Total number of literal occurrences.
    pub fn lit_count(&self) -> usize {
        self.literals.len()
    }

    /// Iterator over all clauses.
    pub fn iter(&self) -> impl Iterator<Item = &[Lit]> {
        let literals = &self.literals;
        let starts = std::iter::once(0).chain(self.clause_ends.iter().cloned());
        starts
            .zip(self.clause_ends.iter())
            .map(move |(start, &end)| &literals[start..end])
    }
}

/// Extend a formula with new variables and clauses.
pub trait ExtendFormula: Sized {
    /// Appends a clause to the formula.
    fn add_clause(&mut self, literals: &[Lit]);

    /// Add a new variable to the formula and return it.
    fn new_var(&mut self) -> Var;

    /// Add a new variable to the formula and return it as positive literal.
    fn new_lit(&mut self) -> Lit {
        self.new_var().positive()
    }

    /// Iterator over multiple new variables.
    fn new_var_iter(&mut self, count: usize) -> NewVarIter<Self> {
        NewVarIter {
            formula: self,
            vars_left: count,
        }
    }

    /// Add multiple new variables and return them as positive literals.
    fn new_lits(&mut self, count: usize) -> Vec<Lit> {
        self.new_var_iter(count).map(Var::positive).collect()
    }
}

/// Iterator over new variables.
///
/// See [`ExtendFormula::new_var_iter`].
pub struct NewVarIter<'a, F> {
    formula: &'a mut F,
    vars_left: usize,
}

impl<'a, F: ExtendFormula> Iterator for NewVarIter<'a, F> {
    type Item = Var;

    fn next(&mut self) -> Option<Var> {
        if self.vars_left == 0 {
            None
        } else {
            self.vars_left -= 1;
            Some(self.formula.new_var())
        }
    }
}

impl ExtendFormula for CnfFormula {
    fn add_clause(&mut self, literals: &[Lit]) {
        for &lit in literals {
            self.var_count = max(lit.index() + 1, self.var_count);
        }
        self.literals.extend_from_slice(literals);
        self.clause_ends.push(self.literals.len());
    }

    fn new_var(&mut self) -> Var {
        let var = Var::from_index(self.var_count);
        self.var_count += 1;
        var
    }
}

/// Convert any iterable of [`Lit`] iterables into a CnfFormula
impl<F, I> From<F> for CnfFormula
where
    F: IntoIterator<Item = I>,
    I: IntoIterator,
    I::Item: std::borrow::Borrow<Lit>,
{
    fn from(formula: F) -> CnfFormula {
        use std::borrow::Borrow;

        let mut cnf_formula = CnfFormula::new();
        let mut clause = vec![];
        for lits in formula {
            clause.clear();
            clause.extend(lits.into_iter().map(|lit| *lit.borrow()));
            cnf_formula.add_clause(&clause);
        }
        cnf_formula
    }
}

impl fmt::Debug for CnfFormula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.var_count(), f)?;
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for CnfFormula {
    fn eq(&self, other: &CnfFormula) -> bool {
        self.var_count == other.var_count
            && self.clause_ends == other.clause_ends
            && self.literals == other.literals
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;

    use proptest::{collection::SizeRange, prelude::*, *};

    use crate::lit::strategy::lit;

    pub fn vec_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = Vec<Vec<Lit>>> {
        let clauses = clauses.into();
        let clause_len = clause_len.into();

        // Not using ind_flat_map makes shrinking too expensive
        vars.prop_ind_flat_map(move |vars| {
            collection::vec(
                collection::vec(lit(0..vars), clause_len.clone()),
                clauses.clone(),
            )
        })
    }

    pub fn cnf_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = CnfFormula> {
        vec_formula(vars, clauses, clause_len).prop_map(CnfFormula::from)
    }
}
