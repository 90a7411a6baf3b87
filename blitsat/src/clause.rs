//! Clause storage.
//!
//! Binary and ternary clauses are represented only by their watches, see
//! [`prop::watch`](crate::prop::watch). Long clauses are stored in arenas, one for irredundant
//! clauses and one for each glue of redundant clauses.
pub mod activity;
pub mod arena;
pub mod db;
pub mod gc;
pub mod reduce;

pub use activity::{bump_clause_activity, decay_clause_activities, ClauseActivity};
pub use db::{
    add_clause, add_short_clause, remove_clause, strengthen_clause, Bucket, ClauseDb, ClauseHandle,
    LongRef, Strengthened, GLUE_BUCKETS,
};
pub use gc::collect_garbage;
pub use reduce::{reduce_learned, reducible_count};
