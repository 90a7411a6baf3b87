//! The VMTF branching heuristic.
//!
//! VMTF (variable move-to-front) keeps all decision variables in a queue. Variables involved in a
//! conflict are moved to the front of the queue and the next decision is the unassigned variable
//! closest to the front. Each variable has a stamp that is increased on every move, so the queue is
//! ordered by stamp.
//!
//! Finding the next unassigned variable uses a search position. All variables in front of it are
//! assigned. When a variable in front of the search position becomes unassigned, it becomes the new
//! search position. This makes the search amortized constant time.
//!
//! See ["Evaluating CDCL Variable Scoring Schemes" by Armin Biere and Andreas
//! Fröhlich](https://doi.org/10.1007/978-3-319-24318-4_29) for details.

use blitsat_formula::Var;

/// Neighbors of a variable in the queue.
#[derive(Copy, Clone, Default)]
struct Link {
    /// Neighbor with a smaller stamp.
    prev: Option<Var>,
    /// Neighbor with a larger stamp.
    next: Option<Var>,
}

/// The VMTF branching heuristic.
#[derive(Default, Clone)]
pub struct Vmtf {
    links: Vec<Link>,
    stamps: Vec<u64>,
    /// Whether a variable is part of the queue.
    enqueued: Vec<bool>,
    /// Variable with the smallest stamp.
    first: Option<Var>,
    /// Variable with the largest stamp, the front of the queue.
    last: Option<Var>,
    /// All variables with a larger stamp are assigned.
    search: Option<Var>,
    next_stamp: u64,
}

impl Vmtf {
    /// Update structures for a new variable count.
    ///
    /// New variables are enqueued at the front, in index order.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.links.len();
        self.links.resize(count, Link::default());
        self.stamps.resize(count, 0);
        self.enqueued.resize(count, false);
        for index in old_count..count {
            let var = Var::from_index(index);
            self.enqueue(var);
            self.search = Some(var);
        }
    }

    fn link(&mut self, var: Var) -> &mut Link {
        &mut self.links[var.index()]
    }

    fn unlink(&mut self, var: Var) {
        let Link { prev, next } = self.links[var.index()];
        match prev {
            Some(prev) => self.link(prev).next = next,
            None => self.first = next,
        }
        match next {
            Some(next) => self.link(next).prev = prev,
            None => self.last = prev,
        }
    }

    /// Add a variable at the front of the queue.
    fn enqueue(&mut self, var: Var) {
        let last = self.last;
        *self.link(var) = Link {
            prev: last,
            next: None,
        };
        match last {
            Some(last) => self.link(last).next = Some(var),
            None => self.first = Some(var),
        }
        self.last = Some(var);
        self.stamps[var.index()] = self.next_stamp;
        self.next_stamp += 1;
        self.enqueued[var.index()] = true;
    }

    /// Stamp of the last move of a variable.
    pub fn stamp(&self, var: Var) -> u64 {
        self.stamps[var.index()]
    }

    pub fn is_enqueued(&self, var: Var) -> bool {
        self.enqueued[var.index()]
    }

    /// Move a variable to the front of the queue.
    ///
    /// `assigned` tells whether the variable is currently assigned.
    pub fn bump(&mut self, var: Var, assigned: bool) {
        if !self.enqueued[var.index()] {
            return;
        }
        if self.last != Some(var) {
            if self.search == Some(var) {
                self.search = self.links[var.index()].prev;
            }
            self.unlink(var);
            self.enqueue(var);
        } else {
            self.stamps[var.index()] = self.next_stamp;
            self.next_stamp += 1;
        }
        if !assigned {
            self.search = Some(var);
        }
    }

    /// Move several variables to the front, keeping their relative order.
    ///
    /// `assigned` tells whether a variable is currently assigned.
    pub fn bump_all(&mut self, vars: &mut Vec<Var>, assigned: impl Fn(Var) -> bool) {
        let stamps = &self.stamps;
        vars.sort_unstable_by_key(|var| stamps[var.index()]);
        for &var in vars.iter() {
            self.bump(var, assigned(var));
        }
    }

    /// Update the search position for a variable that became unassigned.
    pub fn make_available(&mut self, var: Var) {
        if !self.enqueued[var.index()] {
            return;
        }
        match self.search {
            Some(search) if self.stamp(search) >= self.stamp(var) => (),
            _ => self.search = Some(var),
        }
    }

    /// Remove a variable that is no longer a decision candidate.
    pub fn remove(&mut self, var: Var) {
        if !self.enqueued[var.index()] {
            return;
        }
        if self.search == Some(var) {
            self.search = self.links[var.index()].prev;
        }
        self.unlink(var);
        self.enqueued[var.index()] = false;
    }

    /// Find the unassigned variable closest to the front.
    ///
    /// `assigned` tells whether a variable is currently assigned.
    pub fn next_unassigned(&mut self, assigned: impl Fn(Var) -> bool) -> Option<Var> {
        let mut candidate = self.search;
        while let Some(var) = candidate {
            if !assigned(var) {
                break;
            }
            candidate = self.links[var.index()].prev;
        }
        self.search = candidate;
        candidate
    }

    /// Variables in queue order, starting at the front.
    pub fn queue(&self) -> impl Iterator<Item = Var> + '_ {
        let mut current = self.last;
        std::iter::from_fn(move || {
            let var = current?;
            current = self.links[var.index()].prev;
            Some(var)
        })
    }
}
