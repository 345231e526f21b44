// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Errors that can occur during solver setup, I/O, or validation of inputs.
///
/// The numerical kernel itself never fails: cells without a causal solution
/// keep the [`INFINITY`](crate::core::INFINITY) sentinel.
#[derive(Debug)]
pub enum FimError {
    /// Grid shape is invalid (an axis has no samples).
    InvalidGridShape {
        /// The axis index (0 for n1, 1 for n2).
        axis: usize,
        /// The size provided.
        size: usize,
    },
    /// Array shape does not match expected shape.
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// Diffusion tensor is not finite and symmetric positive-definite.
    InvalidTensor {
        /// Index in the 1st dimension.
        i1: usize,
        /// Index in the 2nd dimension.
        i2: usize,
        /// Tensor element d11.
        d11: f32,
        /// Tensor element d12.
        d12: f32,
        /// Tensor element d22.
        d22: f32,
    },
    /// The tensor of a constant field is not finite and symmetric
    /// positive-definite.
    InvalidConstantTensor {
        /// Tensor element d11.
        d11: f32,
        /// Tensor element d12.
        d12: f32,
        /// Tensor element d22.
        d22: f32,
    },
    /// Convergence tolerance is not positive and finite.
    InvalidTolerance(f32),
    /// Sweep cap must allow at least one sweep.
    InvalidMaxSweeps,
    /// Unsupported data type in file.
    UnsupportedDtype(String),
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// Expected MAT variable not found in file.
    MatVariableNotFound {
        /// The variable name that was requested.
        expected: String,
        /// The variable names that are available.
        available: Vec<String>,
    },
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for FimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FimError::InvalidGridShape { axis, size } => {
                write!(
                    f,
                    "invalid grid shape: axis {} has size {} (must be >= 1)",
                    axis, size
                )
            }
            FimError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            FimError::InvalidTensor {
                i1,
                i2,
                d11,
                d12,
                d22,
            } => {
                write!(
                    f,
                    "invalid tensor at ({}, {}): d11={} d12={} d22={} (must be positive-definite)",
                    i1, i2, d11, d12, d22
                )
            }
            FimError::InvalidConstantTensor { d11, d12, d22 } => {
                write!(
                    f,
                    "invalid constant tensor: d11={} d12={} d22={} (must be positive-definite)",
                    d11, d12, d22
                )
            }
            FimError::InvalidTolerance(tol) => {
                write!(
                    f,
                    "invalid tolerance: {} (must be positive and finite)",
                    tol
                )
            }
            FimError::InvalidMaxSweeps => write!(f, "max sweeps must be at least 1"),
            FimError::UnsupportedDtype(dtype) => {
                write!(f, "unsupported dtype: {}", dtype)
            }
            FimError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            FimError::MatVariableNotFound {
                expected,
                available,
            } => {
                write!(
                    f,
                    "MAT variable '{}' not found; available variables: {:?}",
                    expected, available
                )
            }
            FimError::IoError(e) => write!(f, "I/O error: {}", e),
            FimError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FimError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FimError {
    fn from(e: std::io::Error) -> Self {
        FimError::IoError(e)
    }
}

/// Convenience type alias for Results with FimError.
pub type Result<T> = std::result::Result<T, FimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_grid_shape() {
        let e = FimError::InvalidGridShape { axis: 1, size: 0 };
        assert_eq!(
            e.to_string(),
            "invalid grid shape: axis 1 has size 0 (must be >= 1)"
        );
    }

    #[test]
    fn display_shape_mismatch() {
        let e = FimError::ShapeMismatch {
            expected: vec![4, 5],
            got: vec![5, 4],
        };
        assert_eq!(e.to_string(), "shape mismatch: expected [4, 5], got [5, 4]");
    }

    #[test]
    fn display_invalid_tensor() {
        let e = FimError::InvalidTensor {
            i1: 2,
            i2: 3,
            d11: 1.0,
            d12: 2.0,
            d22: 1.0,
        };
        assert_eq!(
            e.to_string(),
            "invalid tensor at (2, 3): d11=1 d12=2 d22=1 (must be positive-definite)"
        );
    }

    #[test]
    fn display_invalid_constant_tensor() {
        let e = FimError::InvalidConstantTensor {
            d11: 1.0,
            d12: 1.0,
            d22: 1.0,
        };
        assert_eq!(
            e.to_string(),
            "invalid constant tensor: d11=1 d12=1 d22=1 (must be positive-definite)"
        );
    }

    #[test]
    fn display_invalid_tolerance() {
        let e = FimError::InvalidTolerance(-0.5);
        assert_eq!(
            e.to_string(),
            "invalid tolerance: -0.5 (must be positive and finite)"
        );
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let e: FimError = io_err.into();
        assert!(matches!(e, FimError::IoError(_)));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn display_mat_variable_not_found() {
        let e = FimError::MatVariableNotFound {
            expected: "tensors".to_string(),
            available: vec!["d11".to_string(), "times".to_string()],
        };
        assert!(e.to_string().contains("tensors"));
        assert!(e.to_string().contains("d11"));
    }
}
