//! Flat storage for long clauses.
//!
//! An arena is a single buffer of raw literal values. Each clause is stored as its literals
//! followed by a terminating `0`. Arenas for redundant clauses prefix every clause with an activity
//! word. Removing a clause overwrites all its words with a tombstone marker, the space is reclaimed
//! by [`Arena::compact`].
//!
//! Neither `0` nor the tombstone is a valid literal and a stored activity is never the tombstone,
//! so the buffer can always be scanned from the front to find all live clauses.
use std::slice;

use blitsat_formula::{Lit, LitIdx};

/// Marks the end of a clause.
pub const TERMINATOR: LitIdx = 0;
/// Marks words of removed clauses.
pub const TOMBSTONE: LitIdx = LitIdx::min_value();

/// Flat storage for long clauses.
#[derive(Clone)]
pub struct Arena {
    words: Vec<LitIdx>,
    /// Number of tombstoned words.
    garbage: usize,
    /// Soft limit for the buffer length.
    limit: usize,
    /// Whether each clause is prefixed with an activity word.
    redundant: bool,
    /// Number of live clauses.
    clause_count: usize,
}

impl Arena {
    pub fn new(redundant: bool, limit: usize) -> Arena {
        Arena {
            words: vec![],
            garbage: 0,
            limit,
            redundant,
            clause_count: 0,
        }
    }

    fn header_len(&self) -> usize {
        self.redundant as usize
    }

    /// Number of words used by a clause of the given length.
    pub fn clause_words(&self, len: usize) -> usize {
        self.header_len() + len + 1
    }

    /// Whether a clause of the given length can be added without exceeding the limit.
    ///
    /// The limit bounds the words of live clauses, tombstoned words don't count. Offsets always
    /// have to fit into 32 bits.
    pub fn has_room(&self, len: usize) -> bool {
        let words = self.clause_words(len);
        self.live_words() + words <= self.limit
            && self.words.len() + words <= u32::max_value() as usize
    }

    /// Append a clause, returning the offset of its first literal.
    ///
    /// The caller is responsible for checking the limit.
    pub fn push(&mut self, lits: &[Lit], activity: f32) -> u32 {
        debug_assert!(lits.len() >= 4);
        if self.redundant {
            self.words.push(activity_word(activity));
        }
        let offset = self.words.len();
        self.words.extend(lits.iter().map(|lit| lit.raw()));
        self.words.push(TERMINATOR);
        self.clause_count += 1;
        offset as u32
    }

    fn clause_end(&self, start: usize) -> usize {
        let mut end = start;
        while self.words[end] != TERMINATOR {
            end += 1;
        }
        end
    }

    /// The literals of a live clause.
    pub fn lits(&self, offset: u32) -> &[Lit] {
        let start = offset as usize;
        let words = &self.words[start..self.clause_end(start)];
        debug_assert!(!words.contains(&TOMBSTONE), "access to removed clause");
        unsafe {
            // This is safe as Lit and LitIdx have the same representation
            slice::from_raw_parts(words.as_ptr() as *const Lit, words.len())
        }
    }

    /// Mutable literals of a live clause.
    pub fn lits_mut(&mut self, offset: u32) -> &mut [Lit] {
        let start = offset as usize;
        let end = self.clause_end(start);
        let words = &mut self.words[start..end];
        debug_assert!(!words.contains(&TOMBSTONE), "access to removed clause");
        unsafe {
            // This is safe as Lit and LitIdx have the same representation
            slice::from_raw_parts_mut(words.as_mut_ptr() as *mut Lit, words.len())
        }
    }

    /// Whether the clause at the given offset wasn't removed.
    pub fn is_live(&self, offset: u32) -> bool {
        self.words
            .get(offset as usize)
            .map_or(false, |&word| word != TOMBSTONE)
    }

    pub fn activity(&self, offset: u32) -> f32 {
        debug_assert!(self.redundant);
        f32::from_bits(self.words[offset as usize - 1] as u32)
    }

    pub fn set_activity(&mut self, offset: u32, activity: f32) {
        debug_assert!(self.redundant);
        self.words[offset as usize - 1] = activity_word(activity);
    }

    /// Remove a clause, turning all its words into garbage.
    pub fn remove(&mut self, offset: u32) {
        let start = offset as usize - self.header_len();
        let end = self.clause_end(offset as usize);
        for word in self.words[start..=end].iter_mut() {
            *word = TOMBSTONE;
        }
        self.garbage += end + 1 - start;
        self.clause_count -= 1;
    }

    /// Shorten a clause in place, keeping its first `len` literals.
    pub fn shrink(&mut self, offset: u32, len: usize) {
        let start = offset as usize;
        let end = self.clause_end(start);
        debug_assert!(len >= 4 && start + len <= end);
        self.words[start + len] = TERMINATOR;
        for word in self.words[start + len + 1..=end].iter_mut() {
            *word = TOMBSTONE;
        }
        self.garbage += end - (start + len);
    }

    /// Offsets of all live clauses in storage order.
    pub fn offsets<'a>(&'a self) -> impl Iterator<Item = u32> + 'a {
        let header_len = self.header_len();
        let mut pos = 0;
        std::iter::from_fn(move || {
            while pos < self.words.len() {
                if self.words[pos] == TOMBSTONE {
                    pos += 1;
                } else {
                    let start = pos + header_len;
                    pos = self.clause_end(start) + 1;
                    return Some(start as u32);
                }
            }
            None
        })
    }

    /// Move all live clauses to the front, reporting each `(old, new)` offset pair.
    pub fn compact(&mut self, mut relocated: impl FnMut(u32, u32)) {
        let header_len = self.header_len();
        let live_words = self.words.len() - self.garbage;
        // Leave room for clauses learned after the collection.
        let mut new_words = Vec::with_capacity(live_words + live_words / 2);

        let mut pos = 0;
        while pos < self.words.len() {
            if self.words[pos] == TOMBSTONE {
                pos += 1;
                continue;
            }
            let start = pos + header_len;
            let end = self.clause_end(start);
            relocated(start as u32, (new_words.len() + header_len) as u32);
            new_words.extend_from_slice(&self.words[pos..=end]);
            pos = end + 1;
        }

        self.words = new_words;
        self.garbage = 0;
    }

    /// Current buffer length in words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn garbage(&self) -> usize {
        self.garbage
    }

    /// Number of words used by live clauses.
    pub fn live_words(&self) -> usize {
        self.words.len() - self.garbage
    }

    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }
}

/// Activities are non-negative, so their bit pattern never collides with the tombstone.
fn activity_word(activity: f32) -> LitIdx {
    debug_assert!(activity >= 0.0);
    activity.to_bits() as LitIdx
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::*;

    use blitsat_formula::{cnf::strategy::*, lits};

    #[test]
    fn shrink_and_remove() {
        let mut arena = Arena::new(true, 1000);
        let a = arena.push(&lits![1, 2, 3, 4, 5, 6], 1.5);
        let b = arena.push(&lits![-1, -2, -3, -4], 0.0);

        arena.shrink(a, 4);
        assert_eq!(arena.lits(a), &lits![1, 2, 3, 4]);
        assert_eq!(arena.activity(a), 1.5);
        assert_eq!(arena.garbage(), 2);

        arena.remove(b);
        assert!(!arena.is_live(b));
        assert_eq!(arena.clause_count(), 1);
        assert_eq!(arena.offsets().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn removed_clauses_free_room() {
        let mut arena = Arena::new(false, 12);
        let a = arena.push(&lits![1, 2, 3, 4, 5], 0.0);
        assert!(arena.has_room(5));
        let b = arena.push(&lits![-1, -2, -3, -4, -5], 0.0);
        assert!(!arena.has_room(4));

        arena.remove(a);
        arena.remove(b);
        assert_eq!(arena.live_words(), 0);
        assert!(arena.has_room(11));
        assert!(!arena.has_room(12));
    }

    proptest! {
        #[test]
        fn compaction_keeps_live_clauses(
            input in cnf_formula(4..100usize, 0..300, 4..20),
            redundant in bool::ANY,
        ) {
            let mut arena = Arena::new(redundant, usize::max_value());
            let mut offsets = vec![];

            for (index, lits) in input.iter().enumerate() {
                let mut lits = lits.to_vec();
                lits.sort_by_key(|lit| lit.var());
                lits.dedup_by_key(|lit| lit.var());
                if lits.len() < 4 {
                    continue;
                }
                let offset = arena.push(&lits, index as f32);
                offsets.push((offset, lits, index));
            }

            for (offset, _, index) in offsets.iter() {
                if index % 2 == 0 {
                    arena.remove(*offset);
                }
            }

            let live: Vec<_> = offsets.iter().filter(|(_, _, index)| index % 2 == 1).collect();
            prop_assert_eq!(arena.offsets().count(), live.len());

            let mut moved = vec![];
            arena.compact(|old, new| moved.push((old, new)));

            prop_assert_eq!(arena.garbage(), 0);
            prop_assert_eq!(moved.len(), live.len());

            for ((old, new), (offset, lits, index)) in moved.iter().zip(live) {
                prop_assert_eq!(old, offset);
                prop_assert_eq!(arena.lits(*new), &lits[..]);
                if redundant {
                    prop_assert_eq!(arena.activity(*new), *index as f32);
                }
            }
        }
    }
}
