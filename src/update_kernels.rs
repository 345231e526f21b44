// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::core::{is_sentinel, Index, TimeField, INFINITY};
use crate::tensors::{Tensor, Tensors};

/// Which of the two axis neighbors a candidate time was computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The neighbor at index - 1.
    Backward,
    /// The neighbor at index + 1.
    Forward,
}

impl Side {
    /// Both sides, backward first.
    pub const BOTH: [Side; 2] = [Side::Backward, Side::Forward];

    /// -1 for backward, +1 for forward.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Side::Backward => -1.0,
            Side::Forward => 1.0,
        }
    }

    /// The neighbor index on this side of `i`, if it lies in `0..n`.
    #[inline]
    fn step(self, i: usize, n: usize) -> Option<usize> {
        match self {
            Side::Backward => i.checked_sub(1),
            Side::Forward => (i + 1 < n).then_some(i + 1),
        }
    }
}

/// Solve
///
/// ```text
///   d11*s1*s1*(t1-t)^2 + 2*d12*s1*s2*(t1-t)*(t2-t) + d22*s2*s2*(t2-t)^2 = 1
/// ```
///
/// for the later of its two roots. Returns [`INFINITY`] if the discriminant
/// is negative.
///
/// The quadratic is solved in `f64` for u = t - t1, which keeps rounding
/// errors small when t1 and t2 are large and close together.
pub fn solve_quadratic(d: &Tensor, s1: f32, s2: f32, t1: f32, t2: f32) -> f32 {
    let ds11 = d.d11 as f64 * s1 as f64 * s1 as f64;
    let ds12 = d.d12 as f64 * s1 as f64 * s2 as f64;
    let ds22 = d.d22 as f64 * s2 as f64 * s2 as f64;
    let t12 = t1 as f64 - t2 as f64;
    let a = ds11 + 2.0 * ds12 + ds22;
    let b = 2.0 * (ds12 + ds22) * t12;
    let c = ds22 * t12 * t12 - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return INFINITY;
    }
    let u = (-b + disc.sqrt()) / (2.0 * a);
    t1 + u as f32
}

/// Test whether the derivative `p` along one axis is consistent with an
/// upwind difference at a sample with time `t0`.
///
/// `tm` and `tp` are the times backward and forward of the sample along that
/// axis, and `side` is the neighbor the candidate time was computed from.
/// `p` is classified as interior (strictly between the backward and forward
/// slopes), forward (above their mean) or backward (otherwise); the candidate
/// is valid only when the classification names the side that was used.
pub fn is_valid(tm: f32, tp: f32, t0: f32, side: Side, p: f32) -> bool {
    let pm = t0 - tm;
    let pp = tp - t0;
    let upwind = if pm < p && p < pp {
        None
    } else if 0.5 * (pm + pp) < p {
        Some(Side::Forward)
    } else {
        Some(Side::Backward)
    };
    upwind == Some(side)
}

fn is_valid1(field: &TimeField, idx: Index, side: Side, p1: f32, t0: f32) -> bool {
    let Index { i1, i2 } = idx;
    let tm = if i1 > 0 { field.get(i1 - 1, i2) } else { INFINITY };
    let tp = if i1 + 1 < field.n1() {
        field.get(i1 + 1, i2)
    } else {
        INFINITY
    };
    is_valid(tm, tp, t0, side, p1)
}

fn is_valid2(field: &TimeField, idx: Index, side: Side, p2: f32, t0: f32) -> bool {
    let Index { i1, i2 } = idx;
    let tm = if i2 > 0 { field.get(i1, i2 - 1) } else { INFINITY };
    let tp = if i2 + 1 < field.n2() {
        field.get(i1, i2 + 1)
    } else {
        INFINITY
    };
    is_valid(tm, tp, t0, side, p2)
}

/// Compute the least valid arrival time at `idx` from the current times of
/// its neighbors.
///
/// The current time at `idx` is the starting bound, so the result never
/// exceeds it. Candidates come from three families of upwind stencils:
/// both axes (one neighbor per axis, four sign combinations), axis 2 only
/// with the axis-1 derivative at its critical point, and axis 1 only with
/// the axis-2 derivative at its critical point. A candidate replaces the
/// incumbent only if it is smaller, no earlier than the neighbor times that
/// produced it, and passes the upwind test on every axis it was built from.
pub fn arrival_time<T: Tensors + ?Sized>(field: &TimeField, tensors: &T, idx: Index) -> f32 {
    let Index { i1, i2 } = idx;
    let (n1, n2) = (field.n1(), field.n2());
    let mut tmin = field.get(i1, i2);
    let d = tensors.tensor(i1, i2);

    // (p1-, p2-), (p1+, p2-), (p1-, p2+), (p1+, p2+)
    for side2 in Side::BOTH {
        let Some(j2) = side2.step(i2, n2) else {
            continue;
        };
        let t2 = field.get(i1, j2);
        for side1 in Side::BOTH {
            let Some(j1) = side1.step(i1, n1) else {
                continue;
            };
            let t1 = field.get(j1, i2);
            if is_sentinel(t1) || is_sentinel(t2) {
                continue;
            }
            let s1 = side1.sign();
            let s2 = side2.sign();
            let t0 = solve_quadratic(&d, s1, s2, t1, t2);
            if t0 < tmin && t0 >= t1.min(t2) {
                let p1 = -s2 * (t2 - t0) * d.d12 / d.d11;
                let p2 = -s1 * (t1 - t0) * d.d12 / d.d22;
                if is_valid1(field, idx, side1, p1, t0) && is_valid2(field, idx, side2, p2, t0) {
                    tmin = t0;
                }
            }
        }
    }

    // (p1 critical, p2-), (p1 critical, p2+)
    for side2 in Side::BOTH {
        let Some(j2) = side2.step(i2, n2) else {
            continue;
        };
        let t2 = field.get(i1, j2);
        if is_sentinel(t2) {
            continue;
        }
        let t1 = t2;
        let s2 = side2.sign();
        let s1 = -s2 * d.d12 / d.d11;
        let t0 = solve_quadratic(&d, s1, s2, t1, t2);
        if t0 < tmin && t0 >= t2 {
            let p2 = -s1 * (t1 - t0) * d.d12 / d.d22;
            if is_valid2(field, idx, side2, p2, t0) {
                tmin = t0;
            }
        }
    }

    // (p1-, p2 critical), (p1+, p2 critical)
    for side1 in Side::BOTH {
        let Some(j1) = side1.step(i1, n1) else {
            continue;
        };
        let t1 = field.get(j1, i2);
        if is_sentinel(t1) {
            continue;
        }
        let t2 = t1;
        let s1 = side1.sign();
        let s2 = -s1 * d.d12 / d.d22;
        let t0 = solve_quadratic(&d, s1, s2, t1, t2);
        if t0 < tmin && t0 >= t1 {
            let p1 = -s2 * (t2 - t0) * d.d12 / d.d11;
            if is_valid1(field, idx, side1, p1, t0) {
                tmin = t0;
            }
        }
    }

    tmin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::{ConstantTensors, IdentityTensors};
    use proptest::prelude::*;

    #[test]
    fn quadratic_equal_neighbors_identity() {
        // 2 (t - 0)^2 = 1
        let t = solve_quadratic(&Tensor::IDENTITY, -1.0, -1.0, 0.0, 0.0);
        assert!((t - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn quadratic_unequal_neighbors_identity() {
        // t^2 + (t - 1)^2 = 1 has roots 0 and 1; the later one is taken.
        let t = solve_quadratic(&Tensor::IDENTITY, 1.0, 1.0, 0.0, 1.0);
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn quadratic_negative_discriminant() {
        let t = solve_quadratic(&Tensor::IDENTITY, 1.0, 1.0, 0.0, 10.0);
        assert_eq!(t, INFINITY);
    }

    #[test]
    fn quadratic_single_axis() {
        // s1 = 0 reduces to a 1D update along axis 2.
        let t = solve_quadratic(&Tensor::IDENTITY, 0.0, 1.0, 3.0, 3.0);
        assert!((t - 4.0).abs() < 1e-6);

        // d22 = 0.25 halves the speed along axis 2.
        let slow = Tensor::new(1.0, 0.0, 0.25);
        let t = solve_quadratic(&slow, 0.0, -1.0, 3.0, 3.0);
        assert!((t - 5.0).abs() < 1e-6);
    }

    #[test]
    fn valid_backward_upwind() {
        // Neighbor behind at 0, nothing ahead: a flat p is a backward difference.
        assert!(is_valid(0.0, INFINITY, 1.0, Side::Backward, 0.0));
        assert!(!is_valid(0.0, INFINITY, 1.0, Side::Forward, 0.0));
    }

    #[test]
    fn valid_forward_upwind() {
        assert!(is_valid(INFINITY, 0.0, 1.0, Side::Forward, 0.0));
        assert!(!is_valid(INFINITY, 0.0, 1.0, Side::Backward, 0.0));
    }

    #[test]
    fn interior_derivative_is_never_valid() {
        // pm = 1, pp = 2, p = 1.5 lies strictly between.
        assert!(!is_valid(0.0, 3.0, 1.0, Side::Backward, 1.5));
        assert!(!is_valid(0.0, 3.0, 1.0, Side::Forward, 1.5));
    }

    #[test]
    fn classification_against_mean_slope() {
        // pm = pp = 1: p above the mean is forward, below is backward.
        assert!(is_valid(0.0, 2.0, 1.0, Side::Forward, 1.5));
        assert!(is_valid(0.0, 2.0, 1.0, Side::Backward, 0.5));
    }

    fn point_source_field(n: usize, src: (usize, usize)) -> TimeField {
        let mut field = TimeField::new(n, n);
        field.set(src.0, src.1, 0.0);
        field
    }

    #[test]
    fn arrival_next_to_source() {
        let field = point_source_field(5, (2, 2));
        let t = arrival_time(&field, &IdentityTensors, Index::new(2, 1));
        assert!((t - 1.0).abs() < 1e-6);
        let t = arrival_time(&field, &IdentityTensors, Index::new(3, 2));
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn arrival_diagonal_uses_both_axes() {
        let mut field = point_source_field(5, (2, 2));
        field.set(1, 2, 1.0);
        field.set(2, 1, 1.0);
        let t = arrival_time(&field, &IdentityTensors, Index::new(1, 1));
        let expected = 1.0 + std::f32::consts::FRAC_1_SQRT_2;
        assert!((t - expected).abs() < 1e-5, "t = {}", t);
    }

    #[test]
    fn arrival_unreachable_stays_sentinel() {
        let field = point_source_field(5, (2, 2));
        let t = arrival_time(&field, &IdentityTensors, Index::new(0, 0));
        assert_eq!(t, INFINITY);
    }

    #[test]
    fn arrival_never_exceeds_current_time() {
        let mut field = point_source_field(5, (2, 2));
        field.set(2, 1, 0.5);
        let t = arrival_time(&field, &IdentityTensors, Index::new(2, 1));
        assert_eq!(t, 0.5);

        let t = arrival_time(&field, &IdentityTensors, Index::new(2, 2));
        assert_eq!(t, 0.0);
    }

    #[test]
    fn arrival_at_grid_corner() {
        let mut field = TimeField::new(3, 3);
        field.set(1, 0, 0.0);
        let t = arrival_time(&field, &IdentityTensors, Index::new(0, 0));
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn arrival_coupled_tensor_single_neighbor() {
        // With only an axis-2 neighbor, the axis-1 derivative sits at its
        // critical point and t0 = 1 / sqrt(det / d11).
        let tensors = ConstantTensors::new(Tensor::new(1.0, 0.5, 1.0)).unwrap();
        let field = point_source_field(5, (2, 2));
        let t = arrival_time(&field, &tensors, Index::new(2, 1));
        let expected = 1.0 / 0.75_f32.sqrt();
        assert!((t - expected).abs() < 1e-5, "t = {}", t);
    }

    proptest! {
        #[test]
        fn quadratic_root_satisfies_equation(
            d11 in 0.5_f32..2.0,
            d12 in -0.4_f32..0.4,
            d22 in 0.5_f32..2.0,
            t1 in 0.0_f32..10.0,
            dt in -0.5_f32..0.5,
            flip1 in any::<bool>(),
            flip2 in any::<bool>(),
        ) {
            let d = Tensor::new(d11, d12, d22);
            let s1 = if flip1 { -1.0 } else { 1.0 };
            let s2 = if flip2 { -1.0 } else { 1.0 };
            let t2 = t1 + dt;
            let t = solve_quadratic(&d, s1, s2, t1, t2);
            if t != INFINITY {
                let (t, t1, t2) = (t as f64, t1 as f64, t2 as f64);
                let (s1, s2) = (s1 as f64, s2 as f64);
                let lhs = d11 as f64 * s1 * s1 * (t1 - t) * (t1 - t)
                    + 2.0 * d12 as f64 * s1 * s2 * (t1 - t) * (t2 - t)
                    + d22 as f64 * s2 * s2 * (t2 - t) * (t2 - t);
                prop_assert!((lhs - 1.0).abs() < 1e-3, "lhs = {}", lhs);
            }
        }

        #[test]
        fn arrival_is_monotone(
            t_left in 0.0_f32..5.0,
            t_down in 0.0_f32..5.0,
            current in 0.0_f32..10.0,
        ) {
            let mut field = TimeField::new(3, 3);
            field.set(0, 1, t_left);
            field.set(1, 0, t_down);
            field.set(1, 1, current);
            let t = arrival_time(&field, &IdentityTensors, Index::new(1, 1));
            prop_assert!(t <= current);
            prop_assert!(t >= 0.0);
        }
    }
}
