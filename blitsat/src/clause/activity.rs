//! Clause activity.
use partial_ref::{partial, PartialRef};

use crate::config::SolverConfig;
use crate::context::{parts::*, Context};

use super::LongRef;

/// Clause activity.
///
/// The individual activities of redundant long clauses are stored in their arena. This stores
/// global metadata used for bumping and decaying activities.
#[derive(Clone)]
pub struct ClauseActivity {
    /// The value to add on bumping.
    bump: f32,
    /// The inverse of the decay factor.
    inv_decay: f32,
}

impl Default for ClauseActivity {
    fn default() -> ClauseActivity {
        ClauseActivity {
            bump: 1.0,
            inv_decay: 1.0 / SolverConfig::default().clause_activity_decay,
        }
    }
}

impl ClauseActivity {
    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f32) {
        assert!(decay < 1.0);
        assert!(decay > 1.0 / 16.0);
        self.inv_decay = 1.0 / decay;
    }
}

/// Rescale activities if any value exceeds this value.
fn rescale_limit() -> f32 {
    std::f32::MAX / 16.0
}

/// Increase a redundant clause's activity.
pub fn bump_clause_activity(
    mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseDbP),
    cref: LongRef,
) {
    debug_assert!(cref.is_redundant());
    let bump = ctx.part(ClauseActivityP).bump;
    let db = ctx.part_mut(ClauseDbP);

    let activity = db.activity(cref) + bump;
    db.set_activity(cref, activity);

    if activity > rescale_limit() {
        rescale_clause_activities(ctx.borrow());
    }
}

/// Rescale all values to avoid an overflow.
fn rescale_clause_activities(mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseDbP)) {
    let rescale_factor = 1.0 / rescale_limit();

    let crefs: Vec<_> = ctx
        .part(ClauseDbP)
        .all_refs()
        .filter(|cref| cref.is_redundant())
        .collect();
    let db = ctx.part_mut(ClauseDbP);
    for cref in crefs {
        let activity = db.activity(cref) * rescale_factor;
        db.set_activity(cref, activity);
    }
    ctx.part_mut(ClauseActivityP).bump *= rescale_factor;
}

/// Decay the clause activities.
pub fn decay_clause_activities(mut ctx: partial!(Context, mut ClauseActivityP, mut ClauseDbP)) {
    let activities = ctx.part_mut(ClauseActivityP);
    activities.bump *= activities.inv_decay;
    if activities.bump >= rescale_limit() {
        rescale_clause_activities(ctx.borrow());
    }
}
