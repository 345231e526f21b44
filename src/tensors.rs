// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::{Array2, Array3, Axis};

use crate::error::{FimError, Result};

/// A symmetric 2x2 diffusion tensor `[[d11, d12], [d12, d22]]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tensor {
    /// Element (1, 1).
    pub d11: f32,
    /// Off-diagonal element (1, 2) = (2, 1).
    pub d12: f32,
    /// Element (2, 2).
    pub d22: f32,
}

impl Tensor {
    /// The identity tensor; propagation speed is the same in every direction.
    pub const IDENTITY: Tensor = Tensor {
        d11: 1.0,
        d12: 0.0,
        d22: 1.0,
    };

    /// Create a tensor from its three distinct elements.
    pub fn new(d11: f32, d12: f32, d22: f32) -> Self {
        Tensor { d11, d12, d22 }
    }

    /// Create a tensor with eigenvalue `su` along the unit vector at `angle`
    /// radians from axis 1, and eigenvalue `sv` perpendicular to it.
    pub fn from_orientation(angle: f32, su: f32, sv: f32) -> Self {
        let (sina, cosa) = angle.sin_cos();
        Tensor {
            d11: su * cosa * cosa + sv * sina * sina,
            d12: (su - sv) * sina * cosa,
            d22: sv * cosa * cosa + su * sina * sina,
        }
    }

    /// Determinant `d11*d22 - d12^2`.
    pub fn determinant(&self) -> f32 {
        self.d11 * self.d22 - self.d12 * self.d12
    }

    /// True if all elements are finite and the matrix is positive-definite.
    pub fn is_positive_definite(&self) -> bool {
        self.d11.is_finite()
            && self.d12.is_finite()
            && self.d22.is_finite()
            && self.d11 > 0.0
            && self.d22 > 0.0
            && self.determinant() > 0.0
    }
}

/// Supplies a diffusion tensor for each grid sample.
///
/// Implementations must be pure functions of the coordinate: the solver may
/// query the same sample many times, from several threads when solving in
/// Jacobi mode, and expects the same answer each time. Coordinates passed in
/// are always inside the grid.
pub trait Tensors: Sync {
    /// Tensor at sample (i1, i2).
    fn tensor(&self, i1: usize, i2: usize) -> Tensor;

    /// The (n1, n2) extent of the field, for providers backed by storage.
    /// Providers defined everywhere return `None`.
    fn shape(&self) -> Option<(usize, usize)> {
        None
    }
}

/// Identity tensors everywhere (isotropic, unit speed).
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityTensors;

impl Tensors for IdentityTensors {
    #[inline]
    fn tensor(&self, _i1: usize, _i2: usize) -> Tensor {
        Tensor::IDENTITY
    }
}

/// The same tensor at every sample.
#[derive(Clone, Copy, Debug)]
pub struct ConstantTensors {
    tensor: Tensor,
}

impl ConstantTensors {
    /// Create a constant tensor field.
    ///
    /// # Errors
    /// Returns an error if the tensor is not positive-definite.
    pub fn new(tensor: Tensor) -> Result<Self> {
        if !tensor.is_positive_definite() {
            return Err(FimError::InvalidConstantTensor {
                d11: tensor.d11,
                d12: tensor.d12,
                d22: tensor.d22,
            });
        }
        Ok(ConstantTensors { tensor })
    }
}

impl Tensors for ConstantTensors {
    #[inline]
    fn tensor(&self, _i1: usize, _i2: usize) -> Tensor {
        self.tensor
    }
}

/// A tensor per sample, stored as three `(n2, n1)` arrays.
#[derive(Clone, Debug)]
pub struct FieldTensors {
    d11: Array2<f32>,
    d12: Array2<f32>,
    d22: Array2<f32>,
}

impl FieldTensors {
    /// Create a tensor field from element arrays of shape `(n2, n1)`.
    ///
    /// # Errors
    /// Returns an error if the arrays differ in shape or any tensor is not
    /// positive-definite.
    pub fn new(d11: Array2<f32>, d12: Array2<f32>, d22: Array2<f32>) -> Result<Self> {
        for other in [&d12, &d22] {
            if other.dim() != d11.dim() {
                return Err(FimError::ShapeMismatch {
                    expected: d11.shape().to_vec(),
                    got: other.shape().to_vec(),
                });
            }
        }
        let field = FieldTensors { d11, d12, d22 };
        let (n2, n1) = field.d11.dim();
        for i2 in 0..n2 {
            for i1 in 0..n1 {
                let t = field.tensor(i1, i2);
                if !t.is_positive_definite() {
                    return Err(invalid_tensor(i1, i2, t));
                }
            }
        }
        Ok(field)
    }

    /// Create a tensor field from an `(n2, n1, 3)` array whose last axis
    /// holds `d11, d12, d22`.
    ///
    /// # Errors
    /// Returns an error if the last axis is not of length 3 or any tensor is
    /// not positive-definite.
    pub fn from_stacked(stacked: &Array3<f32>) -> Result<Self> {
        let (n2, n1, nc) = stacked.dim();
        if nc != 3 {
            return Err(FimError::ShapeMismatch {
                expected: vec![n2, n1, 3],
                got: stacked.shape().to_vec(),
            });
        }
        let d11 = stacked.index_axis(Axis(2), 0).to_owned();
        let d12 = stacked.index_axis(Axis(2), 1).to_owned();
        let d22 = stacked.index_axis(Axis(2), 2).to_owned();
        FieldTensors::new(d11, d12, d22)
    }
}

impl Tensors for FieldTensors {
    #[inline]
    fn tensor(&self, i1: usize, i2: usize) -> Tensor {
        Tensor {
            d11: self.d11[[i2, i1]],
            d12: self.d12[[i2, i1]],
            d22: self.d22[[i2, i1]],
        }
    }

    fn shape(&self) -> Option<(usize, usize)> {
        let (n2, n1) = self.d11.dim();
        Some((n1, n2))
    }
}

impl<T: Tensors + ?Sized> Tensors for Box<T> {
    fn tensor(&self, i1: usize, i2: usize) -> Tensor {
        (**self).tensor(i1, i2)
    }

    fn shape(&self) -> Option<(usize, usize)> {
        (**self).shape()
    }
}

pub(crate) fn invalid_tensor(i1: usize, i2: usize, t: Tensor) -> FimError {
    FimError::InvalidTensor {
        i1,
        i2,
        d11: t.d11,
        d12: t.d12,
        d22: t.d22,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn identity_is_positive_definite() {
        assert!(Tensor::IDENTITY.is_positive_definite());
        assert_eq!(IdentityTensors.tensor(7, 3), Tensor::IDENTITY);
    }

    #[test]
    fn indefinite_tensors_rejected() {
        assert!(!Tensor::new(1.0, 2.0, 1.0).is_positive_definite());
        assert!(!Tensor::new(-1.0, 0.0, 1.0).is_positive_definite());
        assert!(!Tensor::new(1.0, 0.0, 0.0).is_positive_definite());
        assert!(!Tensor::new(f32::NAN, 0.0, 1.0).is_positive_definite());
    }

    #[test]
    fn constant_tensor_error_has_no_coordinates() {
        let result = ConstantTensors::new(Tensor::new(1.0, 1.0, 1.0));
        assert!(matches!(
            result,
            Err(FimError::InvalidConstantTensor {
                d11,
                d12,
                d22,
            }) if (d11, d12, d22) == (1.0, 1.0, 1.0)
        ));
    }

    #[test]
    fn orientation_preserves_eigenvalues() {
        let t = Tensor::from_orientation(110.0 * PI / 180.0, 1.0, 0.001);
        // trace = su + sv, det = su * sv
        assert!((t.d11 + t.d22 - 1.001).abs() < 1e-5);
        assert!((t.determinant() - 0.001).abs() < 1e-5);
        assert!(t.is_positive_definite());
    }

    #[test]
    fn orientation_along_axis_is_diagonal() {
        let t = Tensor::from_orientation(0.0, 4.0, 1.0);
        assert!((t.d11 - 4.0).abs() < 1e-6);
        assert!(t.d12.abs() < 1e-6);
        assert!((t.d22 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn field_tensors_lookup_by_i1_i2() {
        let mut d11 = Array2::from_elem((2, 3), 1.0_f32);
        d11[[1, 2]] = 5.0;
        let d12 = Array2::zeros((2, 3));
        let d22 = Array2::from_elem((2, 3), 2.0_f32);
        let field = FieldTensors::new(d11, d12, d22).unwrap();
        assert_eq!(field.shape(), Some((3, 2)));
        assert_eq!(field.tensor(2, 1), Tensor::new(5.0, 0.0, 2.0));
        assert_eq!(field.tensor(0, 0), Tensor::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn field_tensors_reject_bad_sample() {
        let d11 = Array2::from_elem((2, 2), 1.0_f32);
        let mut d12 = Array2::zeros((2, 2));
        d12[[0, 1]] = 3.0;
        let d22 = Array2::from_elem((2, 2), 1.0_f32);
        let result = FieldTensors::new(d11, d12, d22);
        assert!(matches!(
            result,
            Err(FimError::InvalidTensor { i1: 1, i2: 0, .. })
        ));
    }

    #[test]
    fn field_tensors_shape_mismatch() {
        let result = FieldTensors::new(
            Array2::from_elem((2, 2), 1.0),
            Array2::zeros((2, 3)),
            Array2::from_elem((2, 2), 1.0),
        );
        assert!(matches!(result, Err(FimError::ShapeMismatch { .. })));
    }

    #[test]
    fn stacked_field() {
        let mut stacked = Array3::zeros((2, 2, 3));
        for i2 in 0..2 {
            for i1 in 0..2 {
                stacked[[i2, i1, 0]] = 2.0;
                stacked[[i2, i1, 1]] = 0.5;
                stacked[[i2, i1, 2]] = 1.0;
            }
        }
        let field = FieldTensors::from_stacked(&stacked).unwrap();
        assert_eq!(field.tensor(1, 0), Tensor::new(2.0, 0.5, 1.0));

        let wrong = Array3::<f32>::zeros((2, 2, 2));
        assert!(matches!(
            FieldTensors::from_stacked(&wrong),
            Err(FimError::ShapeMismatch { .. })
        ));
    }
}
