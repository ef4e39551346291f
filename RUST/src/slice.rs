//! Scalar fields and axis-aligned 2-D cross-sections of them.

use std::fmt;

use crate::error::{BrowseError, Result};
use crate::palette::DisplayRange;

/// One of the three spatial axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_index(i: usize) -> Result<Self> {
        match i {
            0 => Ok(Axis::X),
            1 => Ok(Axis::Y),
            2 => Ok(Axis::Z),
            other => Err(BrowseError::InvalidAxis(other)),
        }
    }

    /// The two axes that survive a cut along `self`, in dataset order.
    pub fn remaining(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(s)
    }
}

/// Pad a rank-1..3 dims vector to rank 3 with trailing 1s.
pub fn padded_dims(dims: &[usize]) -> Result<[usize; 3]> {
    if dims.is_empty() || dims.len() > 3 {
        return Err(BrowseError::Format(format!(
            "field rank must be 1..=3, got {}",
            dims.len()
        )));
    }
    let mut out = [1usize; 3];
    out[..dims.len()].copy_from_slice(dims);
    Ok(out)
}

/// Row-major scalar field (last axis fastest), always stored as rank 3.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    dims: [usize; 3],
    data: Vec<f64>,
}

impl Field {
    pub fn new(dims: &[usize], data: Vec<f64>) -> Result<Self> {
        let dims = padded_dims(dims)?;
        let expected = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| BrowseError::Format("field dims overflow".to_string()))?;
        if data.len() != expected {
            return Err(BrowseError::Format(format!(
                "field has {} samples, dims {:?} need {}",
                data.len(),
                dims,
                expected
            )));
        }
        Ok(Self { dims, data })
    }

    /// Build a field by evaluating `f(i, j, k)` at every sample.
    pub fn from_fn(dims: &[usize], mut f: impl FnMut(usize, usize, usize) -> f64) -> Result<Self> {
        let [nx, ny, nz] = padded_dims(dims)?;
        let mut data = Vec::with_capacity(nx * ny * nz);
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    data.push(f(i, j, k));
                }
            }
        }
        Self::new(&[nx, ny, nz], data)
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        let [nx, ny, nz] = self.dims;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        self.data.get((i * ny + j) * nz + k).copied()
    }
}

/// Immutable 2-D row-major array of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    shape: [usize; 2],
    data: Vec<f64>,
}

impl Slice {
    pub fn new(shape: [usize; 2], data: Vec<f64>) -> Result<Self> {
        if shape[0].checked_mul(shape[1]) != Some(data.len()) {
            return Err(BrowseError::Format(format!(
                "slice has {} samples, shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn row(&self, y: usize) -> Option<&[f64]> {
        if y >= self.rows() {
            return None;
        }
        let start = y * self.cols();
        self.data.get(start..start + self.cols())
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if col >= self.cols() {
            return None;
        }
        self.row(row).map(|r| r[col])
    }

    /// Finite min/max over the samples; `None` when no sample is finite.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Display range spanning the finite samples, `{0, 0}` when there are none.
    pub fn range(&self) -> DisplayRange {
        match self.min_max() {
            Some((min, max)) => DisplayRange { min, max },
            None => DisplayRange { min: 0.0, max: 0.0 },
        }
    }
}

/// Cut `field` at `coord` along `axis`.
///
/// The remaining two axes keep their dataset order, so cutting a `[nx, ny, nz]`
/// field along `Axis::Y` yields a `[nx, nz]` slice. `coord` is not clamped.
pub fn extract(field: &Field, axis: Axis, coord: usize) -> Result<Slice> {
    let dims = field.dims();
    let len = dims[axis.index()];
    if coord >= len {
        return Err(BrowseError::AxisOutOfRange {
            axis: axis.index(),
            coord,
            len,
        });
    }

    let (a, b) = axis.remaining();
    let (rows, cols) = (dims[a.index()], dims[b.index()]);
    let mut data = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let mut idx = [0usize; 3];
            idx[axis.index()] = coord;
            idx[a.index()] = r;
            idx[b.index()] = c;
            let v = field
                .get(idx[0], idx[1], idx[2])
                .ok_or_else(|| BrowseError::Format("slice index outside field".to_string()))?;
            data.push(v);
        }
    }
    Slice::new([rows, cols], data)
}
