// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! An anisotropic eikonal equation solver using the Fast Iterative Method (FIM).
//!
//! Given a field of symmetric positive-definite 2x2 diffusion tensors on a
//! regular n1 x n2 grid and a set of source samples, this library computes the
//! first-arrival time of a front that starts at the sources at time zero and
//! propagates with the direction-dependent speed the tensors define. Samples
//! are relaxed with a Godunov upwind update while an active set tracks the
//! samples whose times may still decrease, so no global priority queue is
//! needed.

#![warn(missing_docs)]

/// Time field, active set and grid coordinates.
pub mod core;
/// Error types for the library.
pub mod error;
/// File I/O for saving times and loading tensor fields.
pub mod io;
/// The FIM solver loop.
pub mod scheduler;
/// Diffusion tensor providers.
pub mod tensors;
/// Local arrival-time update for a single sample.
pub mod update_kernels;

pub use crate::core::{Index, INFINITY};
pub use crate::error::{FimError, Result};
pub use crate::scheduler::{FimSolver, ProgressInfo, SolveReport, SweepMode};
pub use crate::tensors::{ConstantTensors, FieldTensors, IdentityTensors, Tensor, Tensors};
