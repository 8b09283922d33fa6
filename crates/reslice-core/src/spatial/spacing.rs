//! Physical-space helpers for index-to-world affines.

use nalgebra::DMatrix;

use crate::error::{ResampleError, Result};

/// Voxel spacing encoded in an affine: the column norms of its linear block.
///
/// # Examples
/// ```rust
/// use nalgebra::DMatrix;
/// use reslice_core::spatial::affine_spacing;
///
/// let affine = DMatrix::from_row_slice(3, 3, &[0.0, 2.0, 1.0, -3.0, 0.0, 4.0, 0.0, 0.0, 1.0]);
/// assert_eq!(affine_spacing(&affine), vec![3.0, 2.0]);
/// ```
pub fn affine_spacing(affine: &DMatrix<f64>) -> Vec<f64> {
    let d = affine.nrows().saturating_sub(1).min(affine.ncols().saturating_sub(1));
    (0..d)
        .map(|c| (0..d).map(|r| affine[(r, c)].powi(2)).sum::<f64>().sqrt())
        .collect()
}

/// Embed or truncate a square affine into a `(D+1)×(D+1)` one.
///
/// The overlapping leading linear block is copied; the translation column
/// is copied when the overlap covers at least two axes. Everything else is
/// identity.
///
/// # Errors
/// `InvalidAffine` if `spatial_dims` is 0 or `affine` is not square with
/// side at least 2.
pub fn to_affine_nd(spatial_dims: usize, affine: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if spatial_dims == 0 {
        return Err(ResampleError::invalid_affine(
            "target affine needs at least one spatial dim",
        ));
    }
    embed_affine(&DMatrix::identity(spatial_dims + 1, spatial_dims + 1), affine)
}

/// Write `affine` into a copy of `template` following the [`to_affine_nd`] rule.
pub fn embed_affine(template: &DMatrix<f64>, affine: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    for (name, m) in [("template", template), ("affine", affine)] {
        if !m.is_square() || m.nrows() < 2 {
            return Err(ResampleError::invalid_affine(format!(
                "{} must be square with side >= 2, got {}x{}",
                name,
                m.nrows(),
                m.ncols()
            )));
        }
    }
    let target_d = template.nrows() - 1;
    let source_d = affine.nrows() - 1;
    let overlap = target_d.min(source_d).max(1);

    let mut out = template.clone();
    for r in 0..overlap {
        for c in 0..overlap {
            out[(r, c)] = affine[(r, c)];
        }
    }
    if overlap > 1 {
        for r in 0..overlap {
            out[(r, target_d)] = affine[(r, source_d)];
        }
    }
    Ok(out)
}

/// Pad or truncate a target spacing to `d` entries.
///
/// Missing trailing entries take the value from `current`.
pub(crate) fn fit_spacing(target: &[f64], current: &[f64], d: usize) -> Vec<f64> {
    (0..d)
        .map(|i| {
            target
                .get(i)
                .or_else(|| current.get(i))
                .copied()
                .unwrap_or(1.0)
        })
        .collect()
}
