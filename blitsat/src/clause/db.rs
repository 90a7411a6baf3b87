//! Database for long clauses and clause handles.
//!
//! Binary and ternary clauses are not stored here, they exist only as mirrored entries in the
//! watchlists. The database keeps their counts though, so that clause statistics are complete.
use std::fmt;

use log::warn;
use partial_ref::{partial, PartialRef};

use blitsat_formula::Lit;

use crate::config::SolverConfig;
use crate::context::{parts::*, Context};
use crate::prop::Watch;
use crate::solver::SolverError;

use super::arena::Arena;

/// Number of glue indexed buckets for redundant long clauses.
///
/// Clauses with a glue of `GLUE_BUCKETS - 1` or more share the last bucket.
pub const GLUE_BUCKETS: usize = 16;

/// Storage bucket of a long clause.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Bucket {
    Irred,
    Red(u8),
}

impl Bucket {
    /// The redundant bucket for a given glue.
    pub fn for_glue(glue: usize) -> Bucket {
        Bucket::Red(glue.min(GLUE_BUCKETS - 1) as u8)
    }

    pub fn is_redundant(self) -> bool {
        self != Bucket::Irred
    }

    /// The irredundant bucket followed by all redundant buckets.
    pub fn all() -> impl Iterator<Item = Bucket> {
        std::iter::once(Bucket::Irred).chain((0..GLUE_BUCKETS).map(|glue| Bucket::Red(glue as u8)))
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Bucket::Irred => write!(f, "irredundant"),
            Bucket::Red(glue) => write!(f, "glue {}", glue),
        }
    }
}

/// Reference to a long clause.
///
/// Stays valid until the clause is removed or the database is compacted.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct LongRef {
    bucket: Bucket,
    offset: u32,
}

impl LongRef {
    pub fn bucket(self) -> Bucket {
        self.bucket
    }

    pub fn offset(self) -> u32 {
        self.offset
    }

    pub fn is_redundant(self) -> bool {
        self.bucket.is_redundant()
    }
}

/// Handle to a clause of any size, used to remove it later.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ClauseHandle {
    Binary([Lit; 2], bool),
    Ternary([Lit; 3], bool),
    Long(LongRef),
}

impl ClauseHandle {
    pub fn is_redundant(self) -> bool {
        match self {
            ClauseHandle::Binary(_, redundant) | ClauseHandle::Ternary(_, redundant) => redundant,
            ClauseHandle::Long(cref) => cref.is_redundant(),
        }
    }
}

/// Database for long clauses.
#[derive(Clone)]
pub struct ClauseDb {
    irred: Arena,
    red: Vec<Arena>,
    max_words: usize,
    /// Binary clause counts, indexed by redundancy.
    binary_count: [usize; 2],
    /// Ternary clause counts, indexed by redundancy.
    ternary_count: [usize; 2],
}

impl Default for ClauseDb {
    fn default() -> ClauseDb {
        let config = SolverConfig::default();
        ClauseDb {
            irred: Arena::new(false, config.bucket_words),
            red: (0..GLUE_BUCKETS)
                .map(|_| Arena::new(true, config.bucket_words))
                .collect(),
            max_words: config.max_bucket_words,
            binary_count: [0; 2],
            ternary_count: [0; 2],
        }
    }
}

impl ClauseDb {
    /// Update the arena limits.
    ///
    /// A limit is never lowered below the words an arena already uses.
    pub fn set_limits(&mut self, bucket_words: usize, max_words: usize) {
        self.max_words = max_words;
        for bucket in Bucket::all() {
            let arena = self.arena_mut(bucket);
            let limit = bucket_words.max(arena.live_words());
            arena.set_limit(limit);
        }
    }

    pub fn arena(&self, bucket: Bucket) -> &Arena {
        match bucket {
            Bucket::Irred => &self.irred,
            Bucket::Red(glue) => &self.red[glue as usize],
        }
    }

    pub fn arena_mut(&mut self, bucket: Bucket) -> &mut Arena {
        match bucket {
            Bucket::Irred => &mut self.irred,
            Bucket::Red(glue) => &mut self.red[glue as usize],
        }
    }

    pub fn lits(&self, cref: LongRef) -> &[Lit] {
        self.arena(cref.bucket).lits(cref.offset)
    }

    pub fn lits_mut(&mut self, cref: LongRef) -> &mut [Lit] {
        self.arena_mut(cref.bucket).lits_mut(cref.offset)
    }

    /// Whether a long clause wasn't removed yet.
    pub fn is_live(&self, cref: LongRef) -> bool {
        self.arena(cref.bucket).is_live(cref.offset)
    }

    pub fn activity(&self, cref: LongRef) -> f32 {
        self.arena(cref.bucket).activity(cref.offset)
    }

    pub fn set_activity(&mut self, cref: LongRef, activity: f32) {
        self.arena_mut(cref.bucket).set_activity(cref.offset, activity)
    }

    /// All live long clauses of a bucket.
    pub fn refs<'a>(&'a self, bucket: Bucket) -> impl Iterator<Item = LongRef> + 'a {
        self.arena(bucket)
            .offsets()
            .map(move |offset| LongRef { bucket, offset })
    }

    /// All live long clauses.
    pub fn all_refs<'a>(&'a self) -> impl Iterator<Item = LongRef> + 'a {
        Bucket::all().flat_map(move |bucket| self.refs(bucket))
    }

    /// Number of live long clauses.
    pub fn long_count(&self, redundant: bool) -> usize {
        if redundant {
            self.red.iter().map(|arena| arena.clause_count()).sum()
        } else {
            self.irred.clause_count()
        }
    }

    pub fn binary_count(&self, redundant: bool) -> usize {
        self.binary_count[redundant as usize]
    }

    pub fn ternary_count(&self, redundant: bool) -> usize {
        self.ternary_count[redundant as usize]
    }

    /// Words used by removed clauses.
    pub fn garbage_words(&self) -> usize {
        Bucket::all().map(|bucket| self.arena(bucket).garbage()).sum()
    }

    /// Words used by all arenas.
    pub fn total_words(&self) -> usize {
        Bucket::all().map(|bucket| self.arena(bucket).len()).sum()
    }

    /// Store a long clause, preferring the given bucket.
    ///
    /// When the bucket is full, a redundant clause moves to the nearest redundant bucket with room.
    /// When there is none, the preferred bucket's limit is doubled, up to the configured maximum.
    pub fn insert(
        &mut self,
        lits: &[Lit],
        preferred: Bucket,
        activity: f32,
    ) -> Result<LongRef, SolverError> {
        let bucket = self.bucket_with_room(preferred, lits.len())?;
        let offset = self.arena_mut(bucket).push(lits, activity);
        Ok(LongRef { bucket, offset })
    }

    fn bucket_with_room(&mut self, preferred: Bucket, len: usize) -> Result<Bucket, SolverError> {
        if self.arena(preferred).has_room(len) {
            return Ok(preferred);
        }

        if let Bucket::Red(glue) = preferred {
            let glue = glue as usize;
            for distance in 1..GLUE_BUCKETS {
                let candidates = [glue.checked_sub(distance), Some(glue + distance)];
                for &candidate in candidates.iter() {
                    if let Some(candidate) = candidate.filter(|&index| index < GLUE_BUCKETS) {
                        let bucket = Bucket::Red(candidate as u8);
                        if self.arena(bucket).has_room(len) {
                            warn!("{} bucket is full, using {} bucket", preferred, bucket);
                            return Ok(bucket);
                        }
                    }
                }
            }
        }

        let max_words = self.max_words;
        let arena = self.arena_mut(preferred);
        while !arena.has_room(len) && arena.limit() < max_words {
            let limit = arena.limit().saturating_mul(2).min(max_words);
            arena.set_limit(limit);
        }

        if arena.has_room(len) {
            warn!(
                "{} bucket is full, raised its limit to {} words",
                preferred,
                arena.limit()
            );
            Ok(preferred)
        } else {
            Err(SolverError::ResourceExhausted {
                bucket: preferred,
                limit: arena.limit(),
            })
        }
    }

    /// Tombstone a long clause.
    ///
    /// This does not remove the watches of the clause.
    pub fn remove(&mut self, cref: LongRef) {
        self.arena_mut(cref.bucket).remove(cref.offset)
    }

    /// Shorten a long clause in place to its first `len` literals, keeping at least 4.
    pub fn shrink(&mut self, cref: LongRef, len: usize) {
        self.arena_mut(cref.bucket).shrink(cref.offset, len)
    }

    /// Move a redundant clause into another bucket if that bucket has room.
    ///
    /// This does not update any watches or reasons referring to the clause.
    pub fn try_move(&mut self, cref: LongRef, bucket: Bucket) -> Option<LongRef> {
        let len = self.lits(cref).len();
        if cref.bucket == bucket || !self.arena(bucket).has_room(len) {
            return None;
        }
        let activity = self.activity(cref);
        let lits = self.lits(cref).to_vec();
        let offset = self.arena_mut(bucket).push(&lits, activity);
        self.remove(cref);
        Some(LongRef { bucket, offset })
    }

    /// Compact all arenas, reporting the new location of every moved clause.
    pub fn compact(&mut self, mut relocated: impl FnMut(LongRef, LongRef)) {
        for bucket in Bucket::all() {
            self.arena_mut(bucket).compact(|old, new| {
                relocated(
                    LongRef {
                        bucket,
                        offset: old,
                    },
                    LongRef {
                        bucket,
                        offset: new,
                    },
                )
            });
        }
    }

    /// Track a binary or ternary clause that was added to the watchlists.
    pub fn count_short(&mut self, len: usize, redundant: bool, delta: isize) {
        let count = match len {
            2 => &mut self.binary_count[redundant as usize],
            3 => &mut self.ternary_count[redundant as usize],
            _ => unreachable!("long clauses are counted by their arena"),
        };
        *count = (*count as isize + delta) as usize;
    }
}

/// Add a binary or ternary clause to the watchlists.
pub fn add_short_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut WatchlistsP),
    lits: &[Lit],
    redundant: bool,
) -> ClauseHandle {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let watchlists = ctx.part_mut(WatchlistsP);
    db.count_short(lits.len(), redundant, 1);
    match *lits {
        [a, b] => {
            watchlists.watch_binary([a, b], redundant);
            ClauseHandle::Binary([a, b], redundant)
        }
        [a, b, c] => {
            watchlists.watch_ternary([a, b, c], redundant);
            ClauseHandle::Ternary([a, b, c], redundant)
        }
        _ => unreachable!("not a short clause: {:?}", lits),
    }
}

/// Add a clause of at least two literals to the database and the watchlists.
///
/// The literals must be distinct variables. For long clauses the literals at positions 0 and 1
/// become the watched literals, so the caller has to order them accordingly. The glue is ignored
/// for irredundant clauses.
pub fn add_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut WatchlistsP),
    lits: &[Lit],
    redundant: bool,
    glue: usize,
) -> Result<ClauseHandle, SolverError> {
    if lits.len() <= 3 {
        return Ok(add_short_clause(ctx.borrow(), lits, redundant));
    }
    let bucket = if redundant {
        Bucket::for_glue(glue)
    } else {
        Bucket::Irred
    };
    let cref = ctx.part_mut(ClauseDbP).insert(lits, bucket, 0.0)?;
    ctx.part_mut(WatchlistsP)
        .watch_long(cref, [lits[0], lits[1]]);
    Ok(ClauseHandle::Long(cref))
}

/// Result of replacing a clause by a subset of its literals.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Strengthened {
    /// The remaining literal has to be assigned at the root level.
    Unit(Lit),
    Clause(ClauseHandle),
}

/// Replace a clause by a subset of its literals.
///
/// Long clauses that stay long are shrunk in place, keeping their storage bucket. The literals at
/// positions 0 and 1 of `lits` become the watched literals. The clause must not be the reason of an
/// assigned variable.
pub fn strengthen_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut WatchlistsP),
    handle: ClauseHandle,
    lits: &[Lit],
) -> Strengthened {
    debug_assert!(!lits.is_empty());
    if let ClauseHandle::Long(cref) = handle {
        if lits.len() >= 4 {
            let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
            let watchlists = ctx.part_mut(WatchlistsP);
            let old_lits = db.lits(cref);
            for &lit in old_lits[..2].iter() {
                watchlists.remove_first(lit, |watch| match watch {
                    Watch::Long { cref: watched, .. } => watched == cref,
                    _ => false,
                });
            }
            db.lits_mut(cref)[..lits.len()].copy_from_slice(lits);
            db.shrink(cref, lits.len());
            watchlists.watch_long(cref, [lits[0], lits[1]]);
            return Strengthened::Clause(handle);
        }
    }

    let redundant = handle.is_redundant();

    remove_clause(ctx.borrow(), handle);

    if lits.len() == 1 {
        Strengthened::Unit(lits[0])
    } else {
        Strengthened::Clause(add_short_clause(ctx.borrow(), lits, redundant))
    }
}

/// Remove a clause including all its watches.
///
/// The clause must not be the reason of an assigned variable.
pub fn remove_clause(mut ctx: partial!(Context, mut ClauseDbP, mut WatchlistsP), handle: ClauseHandle) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let watchlists = ctx.part_mut(WatchlistsP);
    match handle {
        ClauseHandle::Binary(lits, redundant) => {
            watchlists.unwatch_binary(lits, redundant);
            db.count_short(2, redundant, -1);
        }
        ClauseHandle::Ternary(lits, redundant) => {
            watchlists.unwatch_ternary(lits, redundant);
            db.count_short(3, redundant, -1);
        }
        ClauseHandle::Long(cref) => {
            let lits = db.lits(cref);
            for &lit in lits[..2].iter() {
                watchlists.remove_first(lit, |watch| match watch {
                    Watch::Long { cref: watched, .. } => watched == cref,
                    _ => false,
                });
            }
            db.remove(cref);
        }
    }
}
