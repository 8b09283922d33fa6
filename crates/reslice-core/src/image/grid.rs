//! Sampling grid construction from normalized affines.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::error::{ResampleError, Result};
use crate::spatial::{AffineBatch, Normalized};

/// Normalized coordinate of voxel `i` along an axis of `n` voxels.
pub fn base_coordinate(i: usize, n: usize, align_corners: bool) -> f64 {
    if align_corners {
        if n > 1 {
            -1.0 + 2.0 * i as f64 / (n - 1) as f64
        } else {
            0.0
        }
    } else {
        (2 * i + 1) as f64 / n as f64 - 1.0
    }
}

/// Homogeneous normalized positions of every output voxel.
///
/// Returns `N × (D+1)` values in row-major voxel order. Each row is
/// `[p_{D-1}, ..., p_0, 1]`, i.e. grid order with the fastest-varying array
/// axis first.
pub fn base_grid(shape: &[usize], align_corners: bool) -> Vec<f32> {
    let d = shape.len();
    let total: usize = shape.iter().product();
    let axes: Vec<Vec<f32>> = shape
        .iter()
        .map(|&n| {
            (0..n)
                .map(|i| base_coordinate(i, n, align_corners) as f32)
                .collect()
        })
        .collect();

    let mut grid = Vec::with_capacity(total * (d + 1));
    let mut index = vec![0usize; d];
    for _ in 0..total {
        for axis in (0..d).rev() {
            grid.push(axes[axis][index[axis]]);
        }
        grid.push(1.0);

        for axis in (0..d).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    grid
}

/// Generate a sampling grid from a batch of normalized affines.
///
/// Returns a tensor of shape `[batch, out_1, ..., out_D, D]` where the last
/// axis holds grid-order coordinates in `[-1, 1]`. The base grid is created
/// once and all batch items are transformed with a single batched matmul.
///
/// # Errors
/// `InvalidShape` if `output_shape` does not have one positive entry per
/// affine spatial dimension, or if `R != D + 2`.
pub fn generate_grid<B, const R: usize>(
    thetas: &AffineBatch<Normalized>,
    output_shape: &[usize],
    align_corners: bool,
    device: &B::Device,
) -> Result<Tensor<B, R>>
where
    B: Backend,
{
    let d = thetas.spatial_dims();
    if output_shape.len() != d {
        return Err(ResampleError::invalid_shape(format!(
            "output shape {:?} does not match {}-D affine",
            output_shape, d
        )));
    }
    if output_shape.contains(&0) {
        return Err(ResampleError::invalid_shape(format!(
            "output shape entries must be positive, got {:?}",
            output_shape
        )));
    }
    if R != d + 2 {
        return Err(ResampleError::invalid_shape(format!(
            "rank {} grid cannot hold {} spatial dims",
            R, d
        )));
    }

    let batch = thetas.len();
    let total: usize = output_shape.iter().product();

    let base = Tensor::<B, 3>::from_data(
        TensorData::new(base_grid(output_shape, align_corners), [1, total, d + 1]),
        device,
    )
    .repeat_dim(0, batch);

    // theta^T per batch item: [D+1, D]
    let mut theta_t = Vec::with_capacity(batch * (d + 1) * d);
    for theta in thetas {
        let m = theta.matrix();
        for j in 0..=d {
            for k in 0..d {
                theta_t.push(m[(k, j)] as f32);
            }
        }
    }
    let theta_t = Tensor::<B, 3>::from_data(TensorData::new(theta_t, [batch, d + 1, d]), device);

    let mut dims = [0; R];
    dims[0] = batch;
    dims[1..R - 1].copy_from_slice(output_shape);
    dims[R - 1] = d;
    Ok(base.matmul(theta_t).reshape(dims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::NormalizedAffine;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_base_coordinate() {
        assert_eq!(base_coordinate(0, 5, true), -1.0);
        assert_eq!(base_coordinate(4, 5, true), 1.0);
        assert_eq!(base_coordinate(0, 1, true), 0.0);
        assert_eq!(base_coordinate(0, 4, false), -0.75);
        assert_eq!(base_coordinate(3, 4, false), 0.75);
        assert_eq!(base_coordinate(0, 1, false), 0.0);
    }

    #[test]
    fn test_base_grid_order() {
        let grid = base_grid(&[2, 3], true);
        assert_eq!(grid.len(), 6 * 3);
        // voxel (0, 1): x from axis 1, y from axis 0
        assert_eq!(&grid[3..6], &[0.0, -1.0, 1.0]);
        // voxel (1, 0)
        assert_eq!(&grid[9..12], &[-1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_generate_grid_identity() {
        let device = Default::default();
        let thetas = AffineBatch::single(NormalizedAffine::identity(2).unwrap());
        let grid = generate_grid::<B, 4>(&thetas, &[2, 3], true, &device).unwrap();
        assert_eq!(grid.dims(), [1, 2, 3, 2]);

        let values = grid.into_data().to_vec::<f32>().unwrap();
        let expected = [
            -1.0, -1.0, 0.0, -1.0, 1.0, -1.0,
            -1.0, 1.0, 0.0, 1.0, 1.0, 1.0,
        ];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert!((v - e).abs() < 1e-6, "expected {}, got {}", e, v);
        }
    }

    #[test]
    fn test_generate_grid_batched() {
        let device = Default::default();
        let shift = NormalizedAffine::new(nalgebra::DMatrix::from_row_slice(
            3,
            3,
            &[1.0, 0.0, 0.5, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        ))
        .unwrap();
        let thetas =
            AffineBatch::new(vec![NormalizedAffine::identity(2).unwrap(), shift]).unwrap();
        let grid = generate_grid::<B, 4>(&thetas, &[1, 2], false, &device).unwrap();
        let values = grid.into_data().to_vec::<f32>().unwrap();
        // Batch 0: x = -0.5, 0.5 ; batch 1: shifted by 0.5 along x
        let expected = [-0.5, 0.0, 0.5, 0.0, 0.0, 0.0, 1.0, 0.0];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert!((v - e).abs() < 1e-6, "expected {}, got {}", e, v);
        }
    }

    #[test]
    fn test_generate_grid_rejects_shape_rank() {
        let device = Default::default();
        let thetas = AffineBatch::single(NormalizedAffine::identity(2).unwrap());
        let result = generate_grid::<B, 4>(&thetas, &[2, 3, 4], true, &device);
        assert!(matches!(result, Err(ResampleError::InvalidShape(_))));
        let result = generate_grid::<B, 5>(&thetas, &[2, 3], true, &device);
        assert!(matches!(result, Err(ResampleError::InvalidShape(_))));
    }
}
