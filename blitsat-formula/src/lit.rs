//! Literals and variables.
//!
//! A literal is stored as a nonzero signed integer. Its absolute value is the (1-based) number of
//! its variable and its sign is the polarity. This is the encoding used by DIMACS CNF files and by
//! the clause arenas of the solver, which keep literals as raw integers and use `0` as the clause
//! terminator.
use std::{fmt, ops};

/// The backing type used to represent literals.
///
/// Literal values are never `0` and never `LitIdx::min_value()`, so both can be used as markers
/// when literals are stored as raw integers.
pub type LitIdx = i32;

/// A boolean variable.
///
/// Variables are numbered densely starting from 1. Tables indexed by variables use the 0-based
/// [`index`](Var::index).
///
/// Creating a variable with a number larger than `Var::max_var()` is unsupported. This might panic
/// or be interpreted as a different variable.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Var {
    number: u32,
}

impl Var {
    /// Creates a variable from its 1-based number as used in the DIMCAS CNF encoding.
    ///
    /// The parameter must be positive and may not exceed `Var::max_var()`.
    #[inline]
    pub fn from_dimacs(number: isize) -> Var {
        debug_assert!(number > 0);
        debug_assert!(number as usize <= Var::max_count());
        Var {
            number: number as u32,
        }
    }

    /// Creates a variable from a 0-based index.
    #[inline]
    pub fn from_index(index: usize) -> Var {
        debug_assert!(index < Var::max_count());
        Var {
            number: index as u32 + 1,
        }
    }

    /// The 1-based number of this variable.
    #[inline]
    pub fn to_dimacs(self) -> isize {
        self.number as isize
    }

    /// The 0-based index of this variable.
    #[inline]
    pub const fn index(self) -> usize {
        (self.number - 1) as usize
    }

    /// The variable with the largest supported number.
    ///
    /// This leaves room in the signed backing type for negation and for the arena markers.
    pub const fn max_var() -> Var {
        Var {
            number: (LitIdx::max_value() >> 2) as u32,
        }
    }

    /// Largest number of variables supported.
    pub const fn max_count() -> usize {
        Self::max_var().number as usize
    }

    /// Creates a literal from this var and a `bool` that is `true` when the literal is positive.
    #[inline]
    pub fn lit(self, polarity: bool) -> Lit {
        Lit::from_var(self, polarity)
    }

    /// Creates a positive literal from this var.
    #[inline]
    pub fn positive(self) -> Lit {
        Lit::positive(self)
    }

    /// Creates a negative literal from this var.
    #[inline]
    pub fn negative(self) -> Lit {
        Lit::negative(self)
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.number)
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A boolean literal.
///
/// A literal is a variable or the negation of a variable. Negation is arithmetic negation of the
/// signed value, available as `!lit`.
///
/// For tables that need one entry per literal, [`code`](Lit::code) provides a dense index: two
/// times the variable index for positive literals and one more for negative literals.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Lit {
    value: LitIdx,
}

impl Lit {
    /// Creates a literal from a `Var` and a `bool` that is `true` when the literal is positive.
    #[inline]
    pub fn from_var(var: Var, polarity: bool) -> Lit {
        let number = var.number as LitIdx;
        Lit {
            value: if polarity { number } else { -number },
        }
    }

    /// Create a positive literal from a `Var`.
    #[inline]
    pub fn positive(var: Var) -> Lit {
        Lit::from_var(var, true)
    }

    /// Create a negative literal from a `Var`.
    #[inline]
    pub fn negative(var: Var) -> Lit {
        Lit::from_var(var, false)
    }

    /// Create a literal from a 0-based variable index and a `bool` that is `true` when the literal
    /// is positive.
    #[inline]
    pub fn from_index(index: usize, polarity: bool) -> Lit {
        Lit::from_var(Var::from_index(index), polarity)
    }

    /// Inverse of [`code`](Lit::code).
    #[inline]
    pub fn from_code(code: usize) -> Lit {
        Lit::from_index(code >> 1, code & 1 == 0)
    }

    /// Creates a literal from an integer.
    ///
    /// The absolute value is used as 1-based variable number, the sign of the integer is used as
    /// sign of the literal.
    #[inline]
    pub fn from_dimacs(number: isize) -> Lit {
        Lit::from_var(Var::from_dimacs(number.abs()), number > 0)
    }

    /// Integer representation of the literal, opposite of `from_dimacs`.
    #[inline]
    pub fn to_dimacs(self) -> isize {
        self.value as isize
    }

    /// Creates a literal from its raw signed value.
    ///
    /// Returns `None` for `0` and for values outside of the supported variable range. This is used
    /// to distinguish literals from markers when scanning raw literal storage.
    #[inline]
    pub fn from_raw(value: LitIdx) -> Option<Lit> {
        if value != 0 && value.checked_abs()? as usize <= Var::max_count() {
            Some(Lit { value })
        } else {
            None
        }
    }

    /// The raw signed value of this literal.
    #[inline]
    pub fn raw(self) -> LitIdx {
        self.value
    }

    /// 0-based index of the literal's _variable_.
    #[inline]
    pub fn index(self) -> usize {
        self.var().index()
    }

    /// The literal's variable.
    #[inline]
    pub fn var(self) -> Var {
        Var {
            number: self.value.abs() as u32,
        }
    }

    /// Whether the literal is negative, i.e. a negated variable.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.value < 0
    }

    /// Whether the literal is positive, i.e. a non-negated variable.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.value > 0
    }

    /// Dense index for per-literal tables.
    #[inline]
    pub fn code(self) -> usize {
        (self.index() << 1) | (self.is_negative() as usize)
    }

    /// Apply a function to the variable of the literal, keeping the polarity.
    #[inline]
    pub fn map_var(self, f: impl FnOnce(Var) -> Var) -> Lit {
        f(self.var()).lit(self.is_positive())
    }
}

impl ops::Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit { value: -self.value }
    }
}

impl ops::BitXor<bool> for Lit {
    type Output = Lit;

    #[inline]
    fn bitxor(self, rhs: bool) -> Lit {
        if rhs {
            !self
        } else {
            self
        }
    }
}

impl From<Var> for Lit {
    #[inline]
    fn from(var: Var) -> Lit {
        Lit::positive(var)
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Uses the 1-based DIMACS CNF encoding.
impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;
    use proptest::{prelude::*, *};

    pub fn var(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Var> {
        index.prop_map(Var::from_index)
    }

    pub fn lit(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Lit> {
        (var(index), bool::ANY).prop_map(|(var, polarity)| var.lit(polarity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_encoding() {
        let lit = Lit::from_dimacs(-7);
        assert_eq!(lit.raw(), -7);
        assert_eq!(lit.var(), Var::from_dimacs(7));
        assert_eq!(lit.index(), 6);
        assert!(lit.is_negative());
        assert_eq!((!lit).raw(), 7);
        assert_eq!(lit ^ true, !lit);
        assert_eq!(lit ^ false, lit);
    }

    #[test]
    fn codes_are_dense() {
        let codes: Vec<usize> = [1, -1, 2, -2, 3, -3]
            .iter()
            .map(|&number| Lit::from_dimacs(number).code())
            .collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);

        for code in 0..64 {
            assert_eq!(Lit::from_code(code).code(), code);
        }
    }

    #[test]
    fn raw_markers_are_not_literals() {
        assert_eq!(Lit::from_raw(0), None);
        assert_eq!(Lit::from_raw(LitIdx::min_value()), None);
        assert_eq!(Lit::from_raw(-3), Some(Lit::from_dimacs(-3)));
    }
}
