//! Conversion between pixel-index and normalized coordinates.
//!
//! Normalized coordinates cover `[-1, 1]` along every spatial axis. Two
//! conventions exist for where the extremes land:
//! * **align corners**: the centres of the first and last voxel map to `-1`
//!   and `+1`,
//! * **align centres** (half-pixel): the outer edges of the first and last
//!   voxel map to `-1` and `+1`.
//!
//! Matrices built here are in grid order: row `k` addresses
//! `shape[D-1-k]`, so the first row belongs to the fastest-varying array
//! axis. Pixel affines passed to [`to_norm_affine`] must use the same order;
//! [`Affine::reverse_axes`](crate::spatial::Affine::reverse_axes) converts
//! from array axis order.

use nalgebra::DMatrix;

use crate::error::{ResampleError, Result};
use crate::spatial::affine::{AffineBatch, Normalized, NormalizedAffine, Pixel, PixelAffine};

/// Build the matrix mapping pixel indices to normalized coordinates.
///
/// With `align_corners` an axis of size 1 has zero scale: every index maps
/// to `-1`.
///
/// # Errors
/// `InvalidShape` if `shape` is empty or contains a zero.
///
/// # Examples
/// ```rust
/// use reslice_core::spatial::normalize_transform;
///
/// let norm = normalize_transform(&[4, 5], true).unwrap();
/// assert_eq!(norm[(0, 0)], 0.5);
/// assert!((norm[(1, 1)] - 2.0 / 3.0).abs() < 1e-12);
/// assert_eq!(norm[(0, 2)], -1.0);
/// ```
pub fn normalize_transform(shape: &[usize], align_corners: bool) -> Result<DMatrix<f64>> {
    validate_shape(shape)?;
    let d = shape.len();
    let mut norm = DMatrix::identity(d + 1, d + 1);
    for (i, &size) in shape.iter().rev().enumerate() {
        let size = size as f64;
        let (scale, offset) = if align_corners {
            let scale = if size > 1.0 { 2.0 / (size - 1.0) } else { 0.0 };
            (scale, -1.0)
        } else {
            (2.0 / size, -(size - 1.0) / size)
        };
        norm[(i, i)] = scale;
        norm[(i, d)] = offset;
    }
    Ok(norm)
}

/// Build the matrix mapping normalized coordinates back to pixel indices.
///
/// This is the inverse of [`normalize_transform`]. For a degenerate
/// align-corners axis (size 1) it maps every coordinate to index 0.
pub fn denormalize_transform(shape: &[usize], align_corners: bool) -> Result<DMatrix<f64>> {
    validate_shape(shape)?;
    let d = shape.len();
    let mut denorm = DMatrix::identity(d + 1, d + 1);
    for (i, &size) in shape.iter().rev().enumerate() {
        let size = size as f64;
        let scale = if align_corners {
            (size - 1.0) / 2.0
        } else {
            size / 2.0
        };
        denorm[(i, i)] = scale;
        denorm[(i, d)] = (size - 1.0) / 2.0;
    }
    Ok(denorm)
}

/// Convert a pixel-space affine into normalized space.
///
/// `affine` maps destination (output) voxel indices to source (input) voxel
/// indices, with axes in grid order. The result is `normalize(src_size) · affine · denormalize(dst_size)`.
///
/// # Errors
/// * `InvalidAffine` if the affine dimensionality differs from either shape,
/// * `InvalidShape` if a shape is empty or contains a zero.
pub fn to_norm_affine(
    affine: &PixelAffine,
    src_size: &[usize],
    dst_size: &[usize],
    align_corners: bool,
) -> Result<NormalizedAffine> {
    let d = affine.spatial_dims();
    check_rank(d, src_size, dst_size)?;
    let src_xform = normalize_transform(src_size, align_corners)?;
    let dst_xform = denormalize_transform(dst_size, align_corners)?;
    Ok(NormalizedAffine::from_matrix_unchecked(
        src_xform * affine.matrix() * dst_xform,
    ))
}

/// Convert every affine of a batch into normalized space.
pub fn to_norm_affine_batch(
    affines: &AffineBatch<Pixel>,
    src_size: &[usize],
    dst_size: &[usize],
    align_corners: bool,
) -> Result<AffineBatch<Normalized>> {
    affines.try_map(|a| to_norm_affine(a, src_size, dst_size, align_corners))
}

impl PixelAffine {
    /// Express this affine in normalized coordinates. See [`to_norm_affine`].
    pub fn to_normalized(
        &self,
        src_size: &[usize],
        dst_size: &[usize],
        align_corners: bool,
    ) -> Result<NormalizedAffine> {
        to_norm_affine(self, src_size, dst_size, align_corners)
    }
}

impl NormalizedAffine {
    /// Express this affine in pixel-index coordinates.
    ///
    /// Inverse of [`to_norm_affine`]: `denormalize(src_size) · self · normalize(dst_size)`.
    pub fn to_pixel(
        &self,
        src_size: &[usize],
        dst_size: &[usize],
        align_corners: bool,
    ) -> Result<PixelAffine> {
        check_rank(self.spatial_dims(), src_size, dst_size)?;
        let src_xform = denormalize_transform(src_size, align_corners)?;
        let dst_xform = normalize_transform(dst_size, align_corners)?;
        Ok(PixelAffine::from_matrix_unchecked(
            src_xform * self.matrix() * dst_xform,
        ))
    }
}

fn check_rank(d: usize, src_size: &[usize], dst_size: &[usize]) -> Result<()> {
    if src_size.len() != d || dst_size.len() != d {
        return Err(ResampleError::invalid_affine(format!(
            "{}-D affine does not match source rank {} and destination rank {}",
            d,
            src_size.len(),
            dst_size.len()
        )));
    }
    Ok(())
}

fn validate_shape(shape: &[usize]) -> Result<()> {
    if shape.is_empty() {
        return Err(ResampleError::invalid_shape("shape must not be empty"));
    }
    if shape.contains(&0) {
        return Err(ResampleError::invalid_shape(format!(
            "shape entries must be positive, got {:?}",
            shape
        )));
    }
    Ok(())
}
