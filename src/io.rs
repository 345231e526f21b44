// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::path::Path;

use ndarray::{Array2, Array3, ArrayD, IxDyn, ShapeBuilder};

use crate::error::{FimError, Result};
use crate::tensors::FieldTensors;

/// Supported file formats for grid I/O.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    /// NumPy .npy format.
    Npy,
    /// MATLAB .mat format (Level 5).
    Mat,
}

/// Infer file format from extension.
pub fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => Ok(FileFormat::Npy),
        Some("mat") => Ok(FileFormat::Mat),
        Some(ext) => Err(FimError::UnsupportedFileFormat(ext.to_string())),
        None => Err(FimError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

/// Save a `(n2, n1)` time field to a .npy file as f32.
///
/// Unreached samples are written as the sentinel value, not as NaN.
pub fn save_npy(times: &Array2<f32>, path: &Path) -> Result<()> {
    ndarray_npy::write_npy(path, times)
        .map_err(|e| FimError::Other(format!("npy write error: {}", e)))
}

/// Load an array of any rank from a .npy file, promoting f32 to f64.
///
/// # Errors
/// Returns an error if the stored shape differs from `expected_shape`.
pub fn load_npy(path: &Path, expected_shape: &[usize]) -> Result<Vec<f64>> {
    let arr: ArrayD<f64> = match ndarray_npy::read_npy(path) {
        Ok(a) => a,
        Err(_) => {
            let arr32: ArrayD<f32> = ndarray_npy::read_npy(path)
                .map_err(|e| FimError::UnsupportedDtype(format!("{}", e)))?;
            arr32.mapv(|v| v as f64)
        }
    };

    if arr.shape() != expected_shape {
        return Err(FimError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            got: arr.shape().to_vec(),
        });
    }

    // Fortran-order files would otherwise come out column-major.
    Ok(arr.as_standard_layout().to_owned().into_raw_vec())
}

/// Load a numeric variable from a .mat file in row-major order.
///
/// The stored dimensions may either match `expected_shape` or be its
/// reverse (the usual result of writing a C-ordered array from MATLAB).
pub fn load_mat_field(
    path: &Path,
    variable_name: &str,
    expected_shape: &[usize],
) -> Result<Vec<f64>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mat = matfile::MatFile::parse(&mut reader)
        .map_err(|e| FimError::Other(format!("MAT parse error: {}", e)))?;

    let array = mat
        .find_by_name(variable_name)
        .ok_or_else(|| FimError::MatVariableNotFound {
            expected: variable_name.to_string(),
            available: mat.arrays().iter().map(|a| a.name().to_string()).collect(),
        })?;

    let data: Vec<f64> = match array.data() {
        matfile::NumericData::Double { real, imag: _ } => real.clone(),
        matfile::NumericData::Single { real, imag: _ } => real.iter().map(|&v| v as f64).collect(),
        _ => {
            return Err(FimError::UnsupportedDtype(
                "MAT file array is not f64 or f32".to_string(),
            ))
        }
    };

    let mat_shape: Vec<usize> = array.size().to_vec();
    let reversed: Vec<usize> = expected_shape.iter().rev().cloned().collect();
    let shape_matches = mat_shape == expected_shape;
    let shape_reversed = mat_shape == reversed;
    if !shape_matches && !shape_reversed {
        return Err(FimError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            got: mat_shape,
        });
    }

    let arr = ArrayD::from_shape_vec(IxDyn(&mat_shape).f(), data)
        .map_err(|e| FimError::Other(format!("shape error: {}", e)))?;

    let arr = if shape_matches {
        arr
    } else {
        let permutation: Vec<usize> = (0..expected_shape.len()).rev().collect();
        arr.permuted_axes(IxDyn(&permutation))
    };
    Ok(arr.as_standard_layout().to_owned().into_raw_vec())
}

/// Save a `(n2, n1)` time field to a Level 5 .mat file as a double array.
///
/// The array keeps its `(n2, n1)` shape in MATLAB, so `t(i2+1, i1+1)` is
/// the time at sample (i1, i2).
pub fn save_mat(times: &Array2<f32>, path: &Path, var_name: &str) -> Result<()> {
    let (n2, n1) = times.dim();
    // MATLAB is column-major: walk the transpose in standard order.
    let col_major: Vec<f64> = times.t().iter().map(|&v| v as f64).collect();
    write_mat_level5(path, var_name, &[n2, n1], &col_major)
}

fn padded(len: u32) -> u32 {
    len.div_ceil(8) * 8
}

/// Byte lengths of the dimensions, name and real-data sub-elements, and of
/// the enclosing miMATRIX element. MAT Level 5 tags hold 32-bit lengths.
fn element_lengths(ndims: usize, name_len: usize, numel: usize) -> Result<(u32, u32, u32, u32)> {
    let too_large = || FimError::Other("array is too large for a MAT Level 5 file".to_string());
    let to_u32 = |bytes: u64| u32::try_from(bytes).map_err(|_| too_large());
    let padded64 = |len: u64| len.div_ceil(8) * 8;

    let dims_len = (ndims as u64) * 4;
    let name_len = name_len as u64;
    let real_len = (numel as u64).checked_mul(8).ok_or_else(too_large)?;
    let matrix_len = 16
        + (8 + padded64(dims_len))
        + (8 + padded64(name_len))
        + (8 + padded64(real_len));
    Ok((
        to_u32(dims_len)?,
        to_u32(name_len)?,
        to_u32(real_len)?,
        to_u32(matrix_len)?,
    ))
}

/// Writes a single real double array as an uncompressed MAT Level 5 file.
///
/// `matfile` can only read, so the writer is done by hand. Layout: a 128-byte
/// header, then one miMATRIX element holding array flags, dimensions, name
/// and real data sub-elements, each padded to 8 bytes.
fn write_mat_level5(path: &Path, var_name: &str, dimensions: &[usize], data: &[f64]) -> Result<()> {
    const MI_INT8: u32 = 1;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MI_MATRIX: u32 = 14;
    const MX_DOUBLE_CLASS: u32 = 6;

    fn write_tag<W: Write>(w: &mut W, ty: u32, len: u32) -> std::io::Result<()> {
        w.write_all(&ty.to_le_bytes())?;
        w.write_all(&len.to_le_bytes())
    }

    fn write_padding<W: Write>(w: &mut W, len: u32) -> std::io::Result<()> {
        let pad = (padded(len) - len) as usize;
        if pad > 0 {
            w.write_all(&[0u8; 8][..pad])?;
        }
        Ok(())
    }

    let name = var_name.as_bytes();
    let (dims_len, name_len, real_len, matrix_len) =
        element_lengths(dimensions.len(), name.len(), data.len())?;
    let dims = dimensions
        .iter()
        .map(|&d| {
            i32::try_from(d).map_err(|_| {
                FimError::Other(format!("dimension {} is too large for a MAT file", d))
            })
        })
        .collect::<Result<Vec<i32>>>()?;

    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);

    // Header: text, subsystem offset, version 0x0100, little-endian marker.
    let desc = b"MATLAB 5.0 MAT-file, created by anisotropic-fim";
    let mut header_text = [b' '; 116];
    let copy_len = desc.len().min(116);
    header_text[..copy_len].copy_from_slice(&desc[..copy_len]);
    w.write_all(&header_text)?;
    w.write_all(&[0u8; 8])?;
    w.write_all(&0x0100u16.to_le_bytes())?;
    w.write_all(b"IM")?;

    write_tag(&mut w, MI_MATRIX, matrix_len)?;

    write_tag(&mut w, MI_UINT32, 8)?;
    w.write_all(&MX_DOUBLE_CLASS.to_le_bytes())?;
    w.write_all(&0u32.to_le_bytes())?;

    write_tag(&mut w, MI_INT32, dims_len)?;
    for d in dims {
        w.write_all(&d.to_le_bytes())?;
    }
    write_padding(&mut w, dims_len)?;

    write_tag(&mut w, MI_INT8, name_len)?;
    w.write_all(name)?;
    write_padding(&mut w, name_len)?;

    write_tag(&mut w, MI_DOUBLE, real_len)?;
    for &val in data {
        w.write_all(&val.to_le_bytes())?;
    }
    write_padding(&mut w, real_len)?;

    w.flush()?;
    Ok(())
}

/// Save a time field, inferring format from extension. MAT files store it
/// in a variable named `times`.
pub fn save_times(times: &Array2<f32>, path: &Path) -> Result<()> {
    match infer_format(path)? {
        FileFormat::Npy => save_npy(times, path),
        FileFormat::Mat => save_mat(times, path, "times"),
    }
}

/// Load a tensor field for an n1 x n2 grid from an `(n2, n1, 3)` array whose
/// last axis holds `d11, d12, d22`. MAT files must name the variable `tensors`.
///
/// # Errors
/// Returns an error on shape mismatch, unsupported format, or if any tensor
/// in the file is not positive-definite.
pub fn load_tensor_field(path: &Path, n1: usize, n2: usize) -> Result<FieldTensors> {
    let shape = [n2, n1, 3];
    let data = match infer_format(path)? {
        FileFormat::Npy => load_npy(path, &shape)?,
        FileFormat::Mat => load_mat_field(path, "tensors", &shape)?,
    };
    let stacked = Array3::from_shape_vec((n2, n1, 3), data)
        .map_err(|e| FimError::Other(format!("shape error: {}", e)))?
        .mapv(|v| v as f32);
    FieldTensors::from_stacked(&stacked)
}
