// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use ndarray::Array2;
use rayon::prelude::*;

use crate::core::{ActiveSet, Index, TimeField};
use crate::error::{FimError, Result};
use crate::tensors::{invalid_tensor, IdentityTensors, Tensors};
use crate::update_kernels::arrival_time;

/// Default relative improvement below which a sample counts as converged.
pub const DEFAULT_TOLERANCE: f32 = 0.01;

/// Default cap on the number of sweeps over the active set.
pub const DEFAULT_MAX_SWEEPS: usize = 1000;

/// Progress information passed to the optional callback after each sweep.
pub struct ProgressInfo {
    /// Number of sweeps completed so far.
    pub sweep: usize,
    /// Size of the active set after the sweep.
    pub active: usize,
    /// Elapsed time since the solve started.
    pub elapsed: Duration,
}

/// How each sweep over the active set reads and writes times.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SweepMode {
    /// Update in place, in snapshot order. A new time is visible to samples
    /// later in the same sweep. Single-threaded and reproducible.
    #[default]
    GaussSeidel,
    /// Compute all candidates of a sweep in parallel from a frozen field,
    /// then commit them. Needs more sweeps but converges to the same times.
    Jacobi,
}

/// Outcome of the most recent call to [`FimSolver::solve`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolveReport {
    /// Number of sweeps performed.
    pub sweeps: usize,
    /// False if the sweep cap was reached with samples still active.
    pub converged: bool,
    /// Number of samples still active when the solve stopped.
    pub remaining_active: usize,
}

/// A Fast Iterative Method solver for the anisotropic eikonal equation on an
/// n1 x n2 grid.
///
/// The solver owns the time field and the active set; [`solve`](Self::solve)
/// reinitializes both from a source mask, so a solver can be reused.
pub struct FimSolver<T: Tensors = IdentityTensors> {
    tensors: T,
    times: TimeField,
    active: ActiveSet,
    tolerance: f32,
    max_sweeps: usize,
    mode: SweepMode,
    num_threads: Option<usize>,
    progress_callback: Option<Box<dyn Fn(ProgressInfo) + Send + Sync>>,
    tensors_checked: bool,
    report: SolveReport,
}

impl FimSolver<IdentityTensors> {
    /// Create a solver with identity tensors (isotropic, unit speed).
    ///
    /// # Errors
    /// Returns an error if n1 or n2 is zero.
    pub fn new(n1: usize, n2: usize) -> Result<Self> {
        FimSolver::with_tensors(n1, n2, IdentityTensors)
    }
}

impl<T: Tensors> FimSolver<T> {
    /// Create a solver for the given diffusion tensors.
    ///
    /// # Errors
    /// Returns an error if n1 or n2 is zero, or if the tensor provider
    /// reports a shape other than (n1, n2).
    pub fn with_tensors(n1: usize, n2: usize, tensors: T) -> Result<Self> {
        for (axis, size) in [n1, n2].into_iter().enumerate() {
            if size == 0 {
                return Err(FimError::InvalidGridShape { axis, size });
            }
        }
        if let Some((m1, m2)) = tensors.shape() {
            if (m1, m2) != (n1, n2) {
                return Err(FimError::ShapeMismatch {
                    expected: vec![n2, n1],
                    got: vec![m2, m1],
                });
            }
        }
        Ok(FimSolver {
            tensors,
            times: TimeField::new(n1, n2),
            active: ActiveSet::new(n1, n2),
            tolerance: DEFAULT_TOLERANCE,
            max_sweeps: DEFAULT_MAX_SWEEPS,
            mode: SweepMode::default(),
            num_threads: None,
            progress_callback: None,
            tensors_checked: false,
            report: SolveReport::default(),
        })
    }

    /// Set the relative convergence tolerance (builder method). Default is 0.01.
    ///
    /// # Errors
    /// Returns an error if the tolerance is not positive and finite.
    pub fn with_tolerance(mut self, tolerance: f32) -> Result<Self> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(FimError::InvalidTolerance(tolerance));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Set the maximum number of sweeps (builder method). Default is 1000.
    ///
    /// # Errors
    /// Returns an error if `max_sweeps` is zero.
    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Result<Self> {
        if max_sweeps == 0 {
            return Err(FimError::InvalidMaxSweeps);
        }
        self.max_sweeps = max_sweeps;
        Ok(self)
    }

    /// Set the sweep mode (builder method). Default is Gauss-Seidel.
    pub fn with_sweep_mode(mut self, mode: SweepMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the number of worker threads used in Jacobi mode (builder method).
    /// If not specified, defaults to the number of available CPU cores.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Set a progress callback invoked after every sweep (builder method).
    pub fn with_progress(mut self, callback: Box<dyn Fn(ProgressInfo) + Send + Sync>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Number of samples in the 1st dimension.
    pub fn n1(&self) -> usize {
        self.times.n1()
    }

    /// Number of samples in the 2nd dimension.
    pub fn n2(&self) -> usize {
        self.times.n2()
    }

    /// Times from the most recent solve, as an `(n2, n1)` array.
    pub fn times(&self) -> &Array2<f32> {
        self.times.as_array()
    }

    /// The time field from the most recent solve.
    pub fn time_field(&self) -> &TimeField {
        &self.times
    }

    /// The active set; empty after a converged solve.
    pub fn active_set(&self) -> &ActiveSet {
        &self.active
    }

    /// Report for the most recent solve.
    pub fn report(&self) -> SolveReport {
        self.report
    }

    /// Consume the solver and return the computed times.
    pub fn into_times(self) -> Array2<f32> {
        self.times.into_array()
    }

    /// Save the times to a file. Format is inferred from the extension.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        crate::io::save_times(self.times.as_array(), path.as_ref())
    }

    /// Compute times for sources flagged in `sources`, an `(n2, n1)` mask.
    ///
    /// Source samples get time 0. Samples the front cannot reach keep the
    /// [`INFINITY`](crate::core::INFINITY) sentinel. Reaching the sweep cap
    /// is not an error; check [`report`](Self::report) to tell the cases apart.
    ///
    /// # Errors
    /// Returns an error if the mask shape does not match the grid, or if the
    /// tensor at any sample is not positive-definite.
    pub fn solve(&mut self, sources: &Array2<bool>) -> Result<&Array2<f32>> {
        let (n1, n2) = (self.n1(), self.n2());
        if sources.dim() != (n2, n1) {
            return Err(FimError::ShapeMismatch {
                expected: vec![n2, n1],
                got: sources.shape().to_vec(),
            });
        }
        self.check_tensors()?;
        self.initialize(sources);

        let pool = match self.mode {
            SweepMode::GaussSeidel => None,
            SweepMode::Jacobi => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.get_num_threads())
                    .build()
                    .map_err(|e| FimError::Other(e.to_string()))?,
            ),
        };

        let start_time = Instant::now();
        let mut sweeps = 0;
        while !self.active.is_empty() && sweeps < self.max_sweeps {
            tracing::debug!(sweep = sweeps, active = self.active.len(), "sweep");
            match &pool {
                None => sweep_gauss_seidel(
                    &mut self.times,
                    &mut self.active,
                    &self.tensors,
                    self.tolerance,
                ),
                Some(pool) => sweep_jacobi(
                    pool,
                    &mut self.times,
                    &mut self.active,
                    &self.tensors,
                    self.tolerance,
                ),
            }
            sweeps += 1;

            if let Some(cb) = &self.progress_callback {
                cb(ProgressInfo {
                    sweep: sweeps,
                    active: self.active.len(),
                    elapsed: start_time.elapsed(),
                });
            }
        }

        self.report = SolveReport {
            sweeps,
            converged: self.active.is_empty(),
            remaining_active: self.active.len(),
        };
        if self.report.converged {
            tracing::info!(sweeps, elapsed = ?start_time.elapsed(), "solve converged");
        } else {
            tracing::warn!(
                sweeps,
                remaining_active = self.report.remaining_active,
                "sweep cap reached before the active set emptied"
            );
        }

        Ok(self.times.as_array())
    }

    /// Reset the time field and seed the active set from `sources`.
    fn initialize(&mut self, sources: &Array2<bool>) {
        self.active.clear();
        self.times.fill_sentinel();
        for ((i2, i1), &is_source) in sources.indexed_iter() {
            if !is_source {
                continue;
            }
            let idx = Index::new(i1, i2);
            self.times.set(i1, i2, 0.0);
            for j in self.times.neighbors(idx) {
                self.active.activate(j.i1, j.i2);
            }
        }
    }

    fn check_tensors(&mut self) -> Result<()> {
        if self.tensors_checked {
            return Ok(());
        }
        for i2 in 0..self.n2() {
            for i1 in 0..self.n1() {
                let t = self.tensors.tensor(i1, i2);
                if !t.is_positive_definite() {
                    return Err(invalid_tensor(i1, i2, t));
                }
            }
        }
        self.tensors_checked = true;
        Ok(())
    }

    fn get_num_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// True if the change from `old` to `new` is small enough to stop iterating
/// on a sample. An unchanged time always converges, including time 0.
#[inline]
fn is_converged(old: f32, new: f32, tolerance: f32) -> bool {
    new == old || old - new < old * tolerance
}

fn sweep_gauss_seidel<T: Tensors>(
    times: &mut TimeField,
    active: &mut ActiveSet,
    tensors: &T,
    tolerance: f32,
) {
    for idx in active.snapshot() {
        let ti = times.get(idx.i1, idx.i2);
        let gi = arrival_time(times, tensors, idx);
        times.set(idx.i1, idx.i2, gi);
        if !is_converged(ti, gi, tolerance) {
            continue;
        }
        for j in times.neighbors(idx) {
            if active.contains(j) {
                continue;
            }
            let gj = arrival_time(times, tensors, j);
            if gj < times.get(j.i1, j.i2) {
                times.set(j.i1, j.i2, gj);
                active.activate(j.i1, j.i2);
            }
        }
        active.deactivate(idx);
    }
}

fn sweep_jacobi<T: Tensors>(
    pool: &rayon::ThreadPool,
    times: &mut TimeField,
    active: &mut ActiveSet,
    tensors: &T,
    tolerance: f32,
) {
    let snapshot = active.snapshot();

    // Read phase: every candidate sees the same frozen field.
    let candidates: Vec<f32> = {
        let frozen = &*times;
        pool.install(|| {
            snapshot
                .par_iter()
                .map(|&idx| arrival_time(frozen, tensors, idx))
                .collect()
        })
    };

    // Commit phase.
    let mut converged = Vec::new();
    for (&idx, &gi) in snapshot.iter().zip(&candidates) {
        let ti = times.get(idx.i1, idx.i2);
        if gi < ti {
            times.set(idx.i1, idx.i2, gi);
        }
        if is_converged(ti, gi, tolerance) {
            active.deactivate(idx);
            converged.push(idx);
        }
    }

    // Neighbor phase: evaluate inactive neighbors of converged samples
    // against the committed field, then apply improvements serially.
    let improved = SegQueue::new();
    {
        let frozen = &*times;
        let live = &*active;
        pool.install(|| {
            converged.par_iter().for_each(|&idx| {
                for j in frozen.neighbors(idx) {
                    if live.contains(j) {
                        continue;
                    }
                    let gj = arrival_time(frozen, tensors, j);
                    if gj < frozen.get(j.i1, j.i2) {
                        improved.push((j, gj));
                    }
                }
            });
        });
    }
    while let Some((j, gj)) = improved.pop() {
        if gj < times.get(j.i1, j.i2) {
            times.set(j.i1, j.i2, gj);
        }
        active.activate(j.i1, j.i2);
    }
}
