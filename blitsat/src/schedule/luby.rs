//! The reluctant doubling Luby sequence.
//!
//! This sequence is [A182105](https://oeis.org/A182105). Restarts and the reset of the clause
//! reduction increment both follow it.

/// Infinite iterator yielding the Luby sequence.
#[derive(Clone, Debug)]
pub struct Luby {
    u: u64,
    v: u64,
}

impl Default for Luby {
    fn default() -> Luby {
        Luby { u: 1, v: 1 }
    }
}

impl Luby {
    /// Yields the next term.
    pub fn advance(&mut self) -> u64 {
        let term = self.v;

        // Knuth's formulation without recursion
        if (self.u & self.u.wrapping_neg()) == self.v {
            self.u += 1;
            self.v = 1;
        } else {
            self.v <<= 1;
        }

        term
    }
}

impl Iterator for Luby {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        Some(self.advance())
    }
}
