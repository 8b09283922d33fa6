//! Grid sampling filter.
//!
//! Samples an image at normalized grid coordinates, generalizing the
//! grid-sample operator to any number of spatial dimensions. Taps are
//! gathered from the flattened spatial block, so the cost is one gather per
//! tap combination regardless of rank.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{ResampleError, Result};
use crate::image::{self, VolumeLayout};
use crate::interpolation::{axis_taps, unnormalize, AxisTap, InterpolationMode, PaddingMode};
use crate::spatial::{AffineBatch, Normalized};

/// Samples images at normalized coordinates.
///
/// Grid component `k` addresses spatial axis `D-1-k`, so component 0 is the
/// fastest-varying array axis ("x").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridSampler {
    interpolation: InterpolationMode,
    padding: PaddingMode,
    align_corners: bool,
}

impl GridSampler {
    pub fn new(interpolation: InterpolationMode, padding: PaddingMode, align_corners: bool) -> Self {
        Self {
            interpolation,
            padding,
            align_corners,
        }
    }

    pub fn with_interpolation(mut self, interpolation: InterpolationMode) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_padding(mut self, padding: PaddingMode) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_align_corners(mut self, align_corners: bool) -> Self {
        self.align_corners = align_corners;
        self
    }

    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }

    pub fn padding(&self) -> PaddingMode {
        self.padding
    }

    pub fn align_corners(&self) -> bool {
        self.align_corners
    }

    /// Build the sampling grid for `thetas` using this sampler's convention.
    ///
    /// See [`image::generate_grid`].
    pub fn generate_grid<B: Backend, const R: usize>(
        &self,
        thetas: &AffineBatch<Normalized>,
        output_shape: &[usize],
        device: &B::Device,
    ) -> Result<Tensor<B, R>> {
        image::generate_grid(thetas, output_shape, self.align_corners, device)
    }

    /// Sample `image` at the coordinates in `grid`.
    ///
    /// # Arguments
    /// * `image` - Input of shape `[batch, channels, spatial...]`
    /// * `grid` - Coordinates of shape `[batch, out..., D]`
    ///
    /// # Returns
    /// Tensor of shape `[batch, channels, out...]`
    ///
    /// # Errors
    /// * `InvalidShape` if the grid component count differs from the image
    ///   spatial rank, or a dim is zero,
    /// * `BatchMismatch` if the grid and image batch sizes differ.
    pub fn sample<B: Backend, const R: usize>(
        &self,
        image: &Tensor<B, R>,
        grid: &Tensor<B, R>,
    ) -> Result<Tensor<B, R>> {
        let layout = VolumeLayout::from_dims(&image.dims())?;
        let grid_dims = grid.dims();
        let d = layout.spatial_dims();
        if grid_dims[R - 1] != d {
            return Err(ResampleError::invalid_shape(format!(
                "grid has {} components, image has {} spatial dims",
                grid_dims[R - 1],
                d
            )));
        }
        if grid_dims[0] != layout.batch {
            return Err(ResampleError::BatchMismatch {
                affine: grid_dims[0],
                image: layout.batch,
            });
        }
        let out_layout = layout.with_spatial(&grid_dims[1..R - 1]);
        if out_layout.spatial.contains(&0) {
            return Err(ResampleError::invalid_shape(format!(
                "grid spatial dims must be positive, got {:?}",
                out_layout.spatial
            )));
        }

        let batch = layout.batch;
        let channels = layout.channels;
        let points = out_layout.voxel_count();
        let device = image.device();

        let flat = image.clone().reshape([batch, channels, layout.voxel_count()]);
        let coords = grid.clone().reshape([batch, points, d]);

        let taps: Vec<Vec<AxisTap<B>>> = (0..d)
            .map(|axis| {
                let size = layout.spatial[axis];
                let coord = coords.clone().narrow(2, d - 1 - axis, 1).reshape([batch, points]);
                let position = unnormalize(coord, size, self.align_corners);
                axis_taps(position, size, self.interpolation, self.padding, self.align_corners)
            })
            .collect();
        let strides = layout.spatial_strides();
        let support = self.interpolation.support();
        let combinations = support.pow(d as u32);

        let mut output = Tensor::<B, 3>::zeros([batch, channels, points], &device);
        for combination in 0..combinations {
            let mut rest = combination;
            let mut index: Option<Tensor<B, 2, Int>> = None;
            let mut weight: Option<Tensor<B, 2>> = None;
            for axis in (0..d).rev() {
                let tap = &taps[axis][rest % support];
                rest /= support;

                let offset = tap.index.clone() * strides[axis] as i64;
                index = Some(match index {
                    Some(acc) => acc + offset,
                    None => offset,
                });
                weight = Some(match weight {
                    Some(acc) => acc * tap.weight.clone(),
                    None => tap.weight.clone(),
                });
            }
            let (Some(index), Some(weight)) = (index, weight) else {
                continue;
            };

            let index = index.unsqueeze_dim::<3>(1).repeat_dim(1, channels);
            let weight = weight.unsqueeze_dim::<3>(1).repeat_dim(1, channels);
            output = output + flat.clone().gather(2, index) * weight;
        }

        Ok(output.reshape(out_layout.tensor_dims::<R>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::NormalizedAffine;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn image_2d(values: Vec<f32>, h: usize, w: usize) -> Tensor<B, 4> {
        let device = Default::default();
        Tensor::<B, 4>::from_data(TensorData::new(values, [1, 1, h, w]), &device)
    }

    fn grid_2d(points: &[[f32; 2]], h: usize, w: usize) -> Tensor<B, 4> {
        let device = Default::default();
        let values: Vec<f32> = points.iter().flatten().copied().collect();
        Tensor::<B, 4>::from_data(TensorData::new(values, [1, h, w, 2]), &device)
    }

    fn values(t: Tensor<B, 4>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-4, "expected {:?}, got {:?}", expected, actual);
        }
    }

    #[test]
    fn test_identity_grid_reproduces_image() {
        let device = Default::default();
        let image = image_2d((0..12).map(|v| v as f32).collect(), 3, 4);
        for mode in [
            InterpolationMode::Nearest,
            InterpolationMode::Linear,
            InterpolationMode::Cubic,
        ] {
            for align_corners in [true, false] {
                let sampler = GridSampler::new(mode, PaddingMode::Zeros, align_corners);
                let thetas = AffineBatch::single(NormalizedAffine::identity(2).unwrap());
                let grid = sampler.generate_grid::<B, 4>(&thetas, &[3, 4], &device).unwrap();
                let out = sampler.sample(&image, &grid).unwrap();
                assert_eq!(out.dims(), [1, 1, 3, 4]);
                assert_close(&values(out), &(0..12).map(|v| v as f32).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_linear_midpoint() {
        // 1x2 image [10, 20]; x = 0 is halfway between the centres
        let image = image_2d(vec![10.0, 20.0], 1, 2);
        let grid = grid_2d(&[[0.0, 0.0]], 1, 1);
        let sampler = GridSampler::new(InterpolationMode::Linear, PaddingMode::Border, true);
        assert_close(&values(sampler.sample(&image, &grid).unwrap()), &[15.0]);
    }

    #[test]
    fn test_padding_out_of_range() {
        // 1x4 row [1, 2, 3, 4], align_corners: x = -1 + 2i/3
        let image = image_2d(vec![1.0, 2.0, 3.0, 4.0], 1, 4);
        // positions -1 and 4 (one voxel past each end)
        let grid = grid_2d(&[[-1.0 - 2.0 / 3.0, 0.0], [1.0 + 2.0 / 3.0, 0.0]], 1, 2);

        let zeros = GridSampler::new(InterpolationMode::Nearest, PaddingMode::Zeros, true);
        assert_close(&values(zeros.sample(&image, &grid).unwrap()), &[0.0, 0.0]);

        let border = GridSampler::new(InterpolationMode::Nearest, PaddingMode::Border, true);
        assert_close(&values(border.sample(&image, &grid).unwrap()), &[1.0, 4.0]);

        let reflection =
            GridSampler::new(InterpolationMode::Nearest, PaddingMode::Reflection, true);
        assert_close(&values(reflection.sample(&image, &grid).unwrap()), &[2.0, 3.0]);
    }

    #[test]
    fn test_reflection_half_pixel_linear() {
        // 1x4 row, align_corners = false: x = (2i + 1)/4 - 1.
        // Position -0.5 sits on the left edge; position 4.5 reflects to 2.5.
        let image = image_2d(vec![1.0, 2.0, 3.0, 4.0], 1, 4);
        let grid = grid_2d(&[[-1.0, 0.0], [1.5, 0.0]], 1, 2);
        let sampler = GridSampler::new(InterpolationMode::Linear, PaddingMode::Reflection, false);
        assert_close(&values(sampler.sample(&image, &grid).unwrap()), &[1.0, 3.5]);
    }

    #[test]
    fn test_zeros_linear_blends_with_zero() {
        // Halfway between voxel 3 and the virtual voxel 4 under zeros padding.
        let image = image_2d(vec![1.0, 2.0, 3.0, 4.0], 1, 4);
        let grid = grid_2d(&[[1.0 + 1.0 / 3.0, 0.0]], 1, 1);
        let sampler = GridSampler::new(InterpolationMode::Linear, PaddingMode::Zeros, true);
        assert_close(&values(sampler.sample(&image, &grid).unwrap()), &[2.0]);
    }

    #[test]
    fn test_channels_share_grid() {
        let device = Default::default();
        let image = Tensor::<B, 4>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0], [1, 2, 2, 2]),
            &device,
        );
        // Swap x and y: transpose each channel
        let grid = grid_2d(&[[-1.0, -1.0], [-1.0, 1.0], [1.0, -1.0], [1.0, 1.0]], 2, 2);
        let sampler = GridSampler::new(InterpolationMode::Nearest, PaddingMode::Zeros, true);
        let out = sampler.sample(&image, &grid).unwrap();
        assert_close(&values(out), &[1.0, 3.0, 2.0, 4.0, 10.0, 30.0, 20.0, 40.0]);
    }

    #[test]
    fn test_sample_3d_volume() {
        let device = Default::default();
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let image = Tensor::<B, 5>::from_data(TensorData::new(data, [1, 1, 2, 3, 4]), &device);
        let sampler = GridSampler::new(InterpolationMode::Linear, PaddingMode::Border, true);
        // Single point at the centre of the volume: index (0.5, 1, 1.5)
        let grid = Tensor::<B, 5>::from_data(
            TensorData::new(vec![0.0f32, 0.0, 0.0], [1, 1, 1, 1, 3]),
            &device,
        );
        let out = sampler.sample(&image, &grid).unwrap();
        assert_eq!(out.dims(), [1, 1, 1, 1, 1]);
        let v = out.into_data().to_vec::<f32>().unwrap();
        // 12 * 0.5 + 4 * 1 + 1.5
        assert!((v[0] - 11.5).abs() < 1e-4);
    }

    #[test]
    fn test_grid_component_mismatch() {
        let device = Default::default();
        let image = image_2d(vec![0.0; 4], 2, 2);
        let grid = Tensor::<B, 4>::zeros([1, 2, 2, 3], &device);
        let sampler = GridSampler::default();
        assert!(matches!(
            sampler.sample(&image, &grid),
            Err(ResampleError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_grid_batch_mismatch() {
        let device = Default::default();
        let image = image_2d(vec![0.0; 4], 2, 2);
        let grid = Tensor::<B, 4>::zeros([2, 2, 2, 2], &device);
        let sampler = GridSampler::default();
        assert_eq!(
            sampler.sample(&image, &grid).unwrap_err(),
            ResampleError::BatchMismatch { affine: 2, image: 1 }
        );
    }
}
