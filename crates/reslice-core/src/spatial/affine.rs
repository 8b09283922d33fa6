//! Typed homogeneous affine matrices.
//!
//! Resampling works with two coordinate conventions: pixel indices and
//! normalized `[-1, 1]` coordinates. An [`Affine`] carries its convention in a
//! zero-sized marker type so that a [`PixelAffine`] can never be handed to code
//! expecting a [`NormalizedAffine`]. Conversions live in
//! [`crate::spatial::normalize`].

use std::fmt;
use std::marker::PhantomData;

use burn::tensor::TensorData;
use nalgebra::{DMatrix, DVector};

use crate::error::{ResampleError, Result};

/// Tolerance used when checking the homogeneous row `[0, ..., 0, 1]`.
const HOMOGENEOUS_TOLERANCE: f64 = 1e-6;

/// Determinant magnitude below which a matrix is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

mod sealed {
    pub trait Sealed {}
}

/// Coordinate convention an affine operates in.
pub trait CoordinateSpace:
    sealed::Sealed + fmt::Debug + Clone + Copy + PartialEq + Send + Sync + 'static
{
    /// Human readable name used in diagnostics.
    const NAME: &'static str;
}

/// Pixel-index coordinates: origin at voxel 0, one unit per voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel;

/// Normalized coordinates: `[-1, 1]` along every spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized;

impl sealed::Sealed for Pixel {}
impl sealed::Sealed for Normalized {}

impl CoordinateSpace for Pixel {
    const NAME: &'static str = "pixel";
}

impl CoordinateSpace for Normalized {
    const NAME: &'static str = "normalized";
}

/// Homogeneous `(D+1)×(D+1)` affine matrix in coordinate space `S`.
///
/// Invariants (checked by every constructor):
/// * square with side `D + 1 >= 3`,
/// * all entries finite,
/// * last row equal to `[0, ..., 0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine<S: CoordinateSpace> {
    matrix: DMatrix<f64>,
    _space: PhantomData<S>,
}

/// Affine mapping output voxel indices to input voxel indices.
pub type PixelAffine = Affine<Pixel>;

/// Affine mapping normalized output coordinates to normalized input coordinates.
pub type NormalizedAffine = Affine<Normalized>;

impl<S: CoordinateSpace> Affine<S> {
    /// Create an affine from a square homogeneous matrix.
    ///
    /// # Errors
    /// `InvalidAffine` if the matrix is not square, smaller than 3×3,
    /// contains non-finite values or has a non-homogeneous last row.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        validate_homogeneous(&matrix)?;
        Ok(Self::from_matrix_unchecked(matrix))
    }

    pub(crate) fn from_matrix_unchecked(matrix: DMatrix<f64>) -> Self {
        Self {
            matrix,
            _space: PhantomData,
        }
    }

    /// Identity affine for `spatial_dims` spatial dimensions.
    pub fn identity(spatial_dims: usize) -> Result<Self> {
        if spatial_dims < 2 {
            return Err(ResampleError::invalid_affine(format!(
                "affine needs at least 2 spatial dims, got {}",
                spatial_dims
            )));
        }
        Ok(Self::from_matrix_unchecked(DMatrix::identity(
            spatial_dims + 1,
            spatial_dims + 1,
        )))
    }

    /// Create an affine from square row data.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != ncols) {
            return Err(ResampleError::invalid_affine("ragged affine rows"));
        }
        if nrows != ncols {
            return Err(ResampleError::invalid_affine(format!(
                "affine must be square, got {}x{}",
                nrows, ncols
            )));
        }
        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::new(DMatrix::from_row_slice(nrows, ncols, &data))
    }

    /// Create an affine from `D×(D+1)` rows, appending the homogeneous row.
    ///
    /// Square input is accepted unchanged.
    pub fn from_compact_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if nrows + 1 != ncols {
            return Self::from_rows(rows);
        }
        let mut full = rows.to_vec();
        let mut last = vec![0.0; ncols];
        last[ncols - 1] = 1.0;
        full.push(last);
        Self::from_rows(&full)
    }

    /// Number of spatial dimensions `D`.
    pub fn spatial_dims(&self) -> usize {
        self.matrix.nrows() - 1
    }

    /// The full homogeneous matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Consume the affine and return its matrix.
    pub fn into_matrix(self) -> DMatrix<f64> {
        self.matrix
    }

    /// The `D×D` linear (rotation, zoom, shear) block.
    pub fn linear(&self) -> DMatrix<f64> {
        let d = self.spatial_dims();
        DMatrix::from_fn(d, d, |r, c| self.matrix[(r, c)])
    }

    /// The translation column.
    pub fn translation(&self) -> DVector<f64> {
        let d = self.spatial_dims();
        DVector::from_fn(d, |r, _| self.matrix[(r, d)])
    }

    /// Matrix product `self · rhs` (apply `rhs` first).
    pub fn compose(&self, rhs: &Self) -> Result<Self> {
        if self.spatial_dims() != rhs.spatial_dims() {
            return Err(ResampleError::invalid_affine(format!(
                "cannot compose {}-D and {}-D {} affines",
                self.spatial_dims(),
                rhs.spatial_dims(),
                S::NAME
            )));
        }
        Ok(Self::from_matrix_unchecked(&self.matrix * &rhs.matrix))
    }

    /// Invert the affine.
    ///
    /// # Errors
    /// `SingularAffine` if the matrix is not invertible.
    pub fn try_inverse(&self) -> Result<Self> {
        invert(&self.matrix).map(Self::from_matrix_unchecked)
    }

    /// Reverse the order of the spatial axes in both rows and columns.
    ///
    /// Converts between array axis order and grid-sample (x-first) order.
    pub fn reverse_axes(&self) -> Self {
        let n = self.matrix.nrows();
        let d = n - 1;
        let perm = |i: usize| if i < d { d - 1 - i } else { i };
        Self::from_matrix_unchecked(DMatrix::from_fn(n, n, |r, c| {
            self.matrix[(perm(r), perm(c))]
        }))
    }

    /// Whether every entry is within `tolerance` of the identity.
    pub fn is_identity(&self, tolerance: f64) -> bool {
        let n = self.matrix.nrows();
        (0..n).all(|r| {
            (0..n).all(|c| {
                let expected = if r == c { 1.0 } else { 0.0 };
                (self.matrix[(r, c)] - expected).abs() <= tolerance
            })
        })
    }
}

impl<S: CoordinateSpace> fmt::Display for Affine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} affine {}", S::NAME, self.matrix)
    }
}

/// Non-empty batch of affines with identical dimensionality.
///
/// A batch of length 1 is broadcast over every image in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineBatch<S: CoordinateSpace> {
    items: Vec<Affine<S>>,
}

impl<S: CoordinateSpace> AffineBatch<S> {
    /// Create a batch from individual affines.
    pub fn new(items: Vec<Affine<S>>) -> Result<Self> {
        let first = items
            .first()
            .ok_or_else(|| ResampleError::invalid_affine("affine batch is empty"))?;
        let d = first.spatial_dims();
        if let Some(bad) = items.iter().find(|a| a.spatial_dims() != d) {
            return Err(ResampleError::invalid_affine(format!(
                "affine batch mixes {}-D and {}-D matrices",
                d,
                bad.spatial_dims()
            )));
        }
        Ok(Self { items })
    }

    /// Batch holding a single affine.
    pub fn single(affine: Affine<S>) -> Self {
        Self {
            items: vec![affine],
        }
    }

    /// Parse raw tensor data of shape `[n, n]` or `[batch, n, n]`.
    ///
    /// # Errors
    /// `InvalidAffine` if the rank is not 2 or 3, the trailing dims differ or
    /// are smaller than 3, or any matrix is not homogeneous.
    pub fn from_data(data: TensorData) -> Result<Self> {
        let shape = data.shape.clone();
        let (batch, rows, cols) = match shape.as_slice() {
            [r, c] => (1, *r, *c),
            [b, r, c] => (*b, *r, *c),
            _ => {
                return Err(ResampleError::invalid_affine(format!(
                    "affine must be [n, n] or [batch, n, n], got shape {:?}",
                    shape
                )))
            }
        };
        if rows != cols || rows < 3 {
            return Err(ResampleError::invalid_affine(format!(
                "affine trailing dims must be equal and >= 3, got {}x{}",
                rows, cols
            )));
        }
        let values: Vec<f64> = data.iter::<f64>().collect();
        let items = values
            .chunks_exact(rows * cols)
            .take(batch)
            .map(|chunk| Affine::new(DMatrix::from_row_slice(rows, cols, chunk)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(items)
    }

    /// Number of affines in the batch.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false; batches are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Spatial dimensionality shared by all items.
    pub fn spatial_dims(&self) -> usize {
        self.items[0].spatial_dims()
    }

    /// Iterate over the affines.
    pub fn iter(&self) -> std::slice::Iter<'_, Affine<S>> {
        self.items.iter()
    }

    /// The affines as a slice.
    pub fn items(&self) -> &[Affine<S>] {
        &self.items
    }

    /// Broadcast the batch to `batch` items.
    ///
    /// # Errors
    /// `BatchMismatch` if the batch has more than one item and its length
    /// differs from `batch`.
    pub fn broadcast(&self, batch: usize) -> Result<Self> {
        match self.items.len() {
            n if n == batch => Ok(self.clone()),
            1 => Ok(Self {
                items: vec![self.items[0].clone(); batch],
            }),
            n => Err(ResampleError::BatchMismatch {
                affine: n,
                image: batch,
            }),
        }
    }

    /// Apply a fallible conversion to every item.
    pub fn try_map<T, F>(&self, f: F) -> Result<AffineBatch<T>>
    where
        T: CoordinateSpace,
        F: Fn(&Affine<S>) -> Result<Affine<T>>,
    {
        AffineBatch::new(self.items.iter().map(f).collect::<Result<Vec<_>>>()?)
    }

    /// Apply an infallible transformation to every item.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&Affine<S>) -> Affine<S>,
    {
        Self {
            items: self.items.iter().map(f).collect(),
        }
    }
}

impl<S: CoordinateSpace> From<Affine<S>> for AffineBatch<S> {
    fn from(affine: Affine<S>) -> Self {
        Self::single(affine)
    }
}

impl<'a, S: CoordinateSpace> IntoIterator for &'a AffineBatch<S> {
    type Item = &'a Affine<S>;
    type IntoIter = std::slice::Iter<'a, Affine<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Invert a square matrix, rejecting (near-)singular input.
pub(crate) fn invert(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if !matrix.is_square() {
        return Err(ResampleError::invalid_affine(format!(
            "cannot invert a {}x{} matrix",
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    let det = matrix.determinant();
    if !det.is_finite() || det.abs() < SINGULAR_TOLERANCE {
        return Err(ResampleError::singular_affine(format!(
            "determinant {:e} is too close to zero",
            det
        )));
    }
    matrix
        .clone()
        .try_inverse()
        .ok_or_else(|| ResampleError::singular_affine("matrix inversion failed"))
}

fn validate_homogeneous(matrix: &DMatrix<f64>) -> Result<()> {
    let (rows, cols) = matrix.shape();
    if rows != cols {
        return Err(ResampleError::invalid_affine(format!(
            "affine must be square, got {}x{}",
            rows, cols
        )));
    }
    if rows < 3 {
        return Err(ResampleError::invalid_affine(format!(
            "affine must be at least 3x3, got {}x{}",
            rows, cols
        )));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(ResampleError::invalid_affine("affine contains non-finite values"));
    }
    let last = rows - 1;
    let homogeneous = (0..cols).all(|c| {
        let expected = if c == last { 1.0 } else { 0.0 };
        (matrix[(last, c)] - expected).abs() <= HOMOGENEOUS_TOLERANCE
    });
    if !homogeneous {
        return Err(ResampleError::invalid_affine(
            "last affine row must be [0, ..., 0, 1]",
        ));
    }
    Ok(())
}
