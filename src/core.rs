// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::Array2;

/// Sentinel time for samples not yet reached by the front.
///
/// The largest finite `f32`, so it compares greater than any legitimate time
/// and arithmetic on it stays finite.
pub const INFINITY: f32 = f32::MAX;

/// Offsets of the four axis neighbors, as (k1, k2) pairs.
const NEIGHBOR_OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

const NOT_ACTIVE: usize = usize::MAX;

/// Returns true if `t` is the "not yet reached" sentinel.
#[inline]
pub fn is_sentinel(t: f32) -> bool {
    t == INFINITY
}

/// A grid coordinate: `i1` indexes the 1st (fast) dimension, `i2` the 2nd.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Index {
    /// Index in the 1st dimension.
    pub i1: usize,
    /// Index in the 2nd dimension.
    pub i2: usize,
}

impl Index {
    /// Create a new grid coordinate.
    pub fn new(i1: usize, i2: usize) -> Self {
        Index { i1, i2 }
    }
}

/// Dense field of arrival times for an n1 x n2 grid.
///
/// Stored as an `(n2, n1)` array so that `times[[i2, i1]]` is the time at
/// sample (i1, i2). Accessors do not bounds-check beyond what ndarray does;
/// callers pass coordinates already validated against the grid.
#[derive(Clone, Debug)]
pub struct TimeField {
    n1: usize,
    n2: usize,
    times: Array2<f32>,
}

impl TimeField {
    /// Create a time field with every sample at the sentinel.
    pub fn new(n1: usize, n2: usize) -> Self {
        TimeField {
            n1,
            n2,
            times: Array2::from_elem((n2, n1), INFINITY),
        }
    }

    /// Number of samples in the 1st dimension.
    pub fn n1(&self) -> usize {
        self.n1
    }

    /// Number of samples in the 2nd dimension.
    pub fn n2(&self) -> usize {
        self.n2
    }

    /// Time at (i1, i2).
    #[inline]
    pub fn get(&self, i1: usize, i2: usize) -> f32 {
        self.times[[i2, i1]]
    }

    /// Overwrite the time at (i1, i2).
    #[inline]
    pub fn set(&mut self, i1: usize, i2: usize, value: f32) {
        self.times[[i2, i1]] = value;
    }

    /// Reset every sample to the sentinel.
    pub fn fill_sentinel(&mut self) {
        self.times.fill(INFINITY);
    }

    /// The in-bounds axis neighbors of `idx`, in the order
    /// (i1-1, i2), (i1+1, i2), (i1, i2-1), (i1, i2+1).
    pub fn neighbors(&self, idx: Index) -> impl Iterator<Item = Index> {
        let (n1, n2) = (self.n1, self.n2);
        NEIGHBOR_OFFSETS.iter().filter_map(move |&(k1, k2)| {
            let j1 = idx.i1.checked_add_signed(k1)?;
            let j2 = idx.i2.checked_add_signed(k2)?;
            (j1 < n1 && j2 < n2).then_some(Index::new(j1, j2))
        })
    }

    /// Borrow the underlying `(n2, n1)` array.
    pub fn as_array(&self) -> &Array2<f32> {
        &self.times
    }

    /// Consume the field and return the underlying `(n2, n1)` array.
    pub fn into_array(self) -> Array2<f32> {
        self.times
    }
}

/// The set of samples eligible for re-evaluation in the next sweep.
///
/// Membership is tracked in a dense position table next to an explicit
/// worklist, so insertion, removal and membership tests are all O(1).
/// Removal swaps the last member into the vacated slot.
#[derive(Clone, Debug)]
pub struct ActiveSet {
    n1: usize,
    n2: usize,
    position: Vec<usize>,
    members: Vec<Index>,
}

impl ActiveSet {
    /// Create an empty active set for an n1 x n2 grid.
    pub fn new(n1: usize, n2: usize) -> Self {
        ActiveSet {
            n1,
            n2,
            position: vec![NOT_ACTIVE; n1 * n2],
            members: Vec::with_capacity(1024.min(n1 * n2)),
        }
    }

    #[inline]
    fn flat(&self, idx: Index) -> usize {
        idx.i2 * self.n1 + idx.i1
    }

    /// Insert (i1, i2). Out-of-grid coordinates and existing members are ignored.
    pub fn activate(&mut self, i1: usize, i2: usize) {
        if i1 >= self.n1 || i2 >= self.n2 {
            return;
        }
        let idx = Index::new(i1, i2);
        let flat = self.flat(idx);
        if self.position[flat] == NOT_ACTIVE {
            self.position[flat] = self.members.len();
            self.members.push(idx);
        }
    }

    /// Remove `idx` if present.
    pub fn deactivate(&mut self, idx: Index) {
        if idx.i1 >= self.n1 || idx.i2 >= self.n2 {
            return;
        }
        let flat = self.flat(idx);
        let pos = self.position[flat];
        if pos == NOT_ACTIVE {
            return;
        }
        self.position[flat] = NOT_ACTIVE;
        self.members.swap_remove(pos);
        if let Some(&moved) = self.members.get(pos) {
            let moved_flat = self.flat(moved);
            self.position[moved_flat] = pos;
        }
    }

    /// True if `idx` is currently active.
    #[inline]
    pub fn contains(&self, idx: Index) -> bool {
        idx.i1 < self.n1 && idx.i2 < self.n2 && self.position[self.flat(idx)] != NOT_ACTIVE
    }

    /// True if no samples are active.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of active samples.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Copy of the members present now. Later activations and deactivations
    /// do not affect the returned sequence.
    pub fn snapshot(&self) -> Vec<Index> {
        self.members.clone()
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        for idx in self.members.drain(..) {
            let flat = idx.i2 * self.n1 + idx.i1;
            self.position[flat] = NOT_ACTIVE;
        }
    }
}
