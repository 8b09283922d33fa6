//! Affine resampling filter.
//!
//! Resamples a batched image under a pixel-space or normalized-space affine.
//! The affine maps output coordinates to input coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use serde::{Deserialize, Serialize};

use super::grid_sample::GridSampler;
use crate::error::{ResampleError, Result};
use crate::image::VolumeLayout;
use crate::interpolation::{InterpolationMode, PaddingMode};
use crate::spatial::{
    to_norm_affine_batch, AffineBatch, Normalized, NormalizedAffine, Pixel, PixelAffine,
};

/// Affine input of the resampler, tagged with its coordinate space.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingAffine {
    /// Maps output voxel indices to input voxel indices.
    Pixel(AffineBatch<Pixel>),
    /// Maps normalized output coordinates to normalized input coordinates.
    Normalized(AffineBatch<Normalized>),
}

impl SamplingAffine {
    /// Parse raw tensor data of shape `[n, n]` or `[batch, n, n]`.
    pub fn from_data(data: TensorData, normalized: bool) -> Result<Self> {
        if normalized {
            AffineBatch::from_data(data).map(Self::Normalized)
        } else {
            AffineBatch::from_data(data).map(Self::Pixel)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Pixel(batch) => batch.len(),
            Self::Normalized(batch) => batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spatial_dims(&self) -> usize {
        match self {
            Self::Pixel(batch) => batch.spatial_dims(),
            Self::Normalized(batch) => batch.spatial_dims(),
        }
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::Normalized(_))
    }

    /// Swap between array axis order and grid order for every affine.
    pub fn reverse_axes(&self) -> Self {
        match self {
            Self::Pixel(batch) => Self::Pixel(batch.map(|a| a.reverse_axes())),
            Self::Normalized(batch) => Self::Normalized(batch.map(|a| a.reverse_axes())),
        }
    }

    /// Express every affine in normalized space.
    ///
    /// Pixel affines must be in grid order and are converted with
    /// `src = input_shape` and `dst = output_shape`.
    pub fn to_normalized(
        &self,
        input_shape: &[usize],
        output_shape: &[usize],
        align_corners: bool,
    ) -> Result<AffineBatch<Normalized>> {
        match self {
            Self::Pixel(batch) => {
                to_norm_affine_batch(batch, input_shape, output_shape, align_corners)
            }
            Self::Normalized(batch) => Ok(batch.clone()),
        }
    }
}

impl From<PixelAffine> for SamplingAffine {
    fn from(affine: PixelAffine) -> Self {
        Self::Pixel(AffineBatch::single(affine))
    }
}

impl From<NormalizedAffine> for SamplingAffine {
    fn from(affine: NormalizedAffine) -> Self {
        Self::Normalized(AffineBatch::single(affine))
    }
}

impl From<AffineBatch<Pixel>> for SamplingAffine {
    fn from(batch: AffineBatch<Pixel>) -> Self {
        Self::Pixel(batch)
    }
}

impl From<AffineBatch<Normalized>> for SamplingAffine {
    fn from(batch: AffineBatch<Normalized>) -> Self {
        Self::Normalized(batch)
    }
}

/// Affine resampling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffineResampleConfig {
    /// Output spatial shape; the input spatial shape when `None`.
    pub output_shape: Option<Vec<usize>>,
    /// Interpolation kernel.
    pub interpolation: InterpolationMode,
    /// Out-of-range policy.
    pub padding: PaddingMode,
    /// Normalization convention, see [`crate::spatial::normalize_transform`].
    pub align_corners: bool,
    /// Whether the affine rows and columns follow array axis order
    /// (`true`) rather than grid order (`false`). Applies to pixel and
    /// normalized affines alike.
    pub reverse_indexing: bool,
}

impl Default for AffineResampleConfig {
    fn default() -> Self {
        Self {
            output_shape: None,
            interpolation: InterpolationMode::Linear,
            padding: PaddingMode::Zeros,
            align_corners: false,
            reverse_indexing: true,
        }
    }
}

impl AffineResampleConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output spatial shape.
    ///
    /// # Errors
    /// `InvalidShape` if the shape is empty or contains a zero.
    pub fn with_output_shape(mut self, shape: &[usize]) -> Result<Self> {
        validate_output_shape(shape)?;
        self.output_shape = Some(shape.to_vec());
        Ok(self)
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

    pub fn with_reverse_indexing(mut self, reverse_indexing: bool) -> Self {
        self.reverse_indexing = reverse_indexing;
        self
    }

    /// The sampler this configuration drives.
    pub fn sampler(&self) -> GridSampler {
        GridSampler::new(self.interpolation, self.padding, self.align_corners)
    }
}

/// Resamples images under a fixed affine.
///
/// # Examples
/// ```rust
/// use burn::tensor::{Tensor, TensorData};
/// use burn_ndarray::NdArray;
/// use reslice_core::filter::AffineResampler;
/// use reslice_core::spatial::PixelAffine;
///
/// type B = NdArray<f32>;
/// let device = Default::default();
/// let image = Tensor::<B, 4>::from_data(
///     TensorData::new((0..12).map(|v| v as f32).collect::<Vec<_>>(), [1, 1, 3, 4]),
///     &device,
/// );
/// let zoom = PixelAffine::from_compact_rows(&[vec![1.0, 0.0, 0.0], vec![0.0, 2.0, 0.0]]).unwrap();
/// let resampler = AffineResampler::new(zoom).with_output_shape(&[3, 2]).unwrap();
/// let out = resampler.apply(&image).unwrap();
/// assert_eq!(out.dims(), [1, 1, 3, 2]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AffineResampler {
    affine: SamplingAffine,
    config: AffineResampleConfig,
}

impl AffineResampler {
    /// Create a resampler with default settings.
    pub fn new(affine: impl Into<SamplingAffine>) -> Self {
        Self {
            affine: affine.into(),
            config: AffineResampleConfig::default(),
        }
    }

    /// Create a resampler from raw affine data.
    ///
    /// # Errors
    /// `InvalidAffine` if the data is not a `[n, n]` or `[batch, n, n]`
    /// homogeneous matrix set with `n >= 3`.
    pub fn from_data(data: TensorData, normalized: bool) -> Result<Self> {
        SamplingAffine::from_data(data, normalized).map(Self::new)
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: AffineResampleConfig) -> Result<Self> {
        if let Some(shape) = &config.output_shape {
            validate_output_shape(shape)?;
        }
        self.config = config;
        Ok(self)
    }

    /// Set the output spatial shape.
    pub fn with_output_shape(mut self, shape: &[usize]) -> Result<Self> {
        self.config = self.config.with_output_shape(shape)?;
        Ok(self)
    }

    pub fn with_interpolation(mut self, interpolation: InterpolationMode) -> Self {
        self.config = self.config.with_interpolation(interpolation);
        self
    }

    pub fn with_padding(mut self, padding: PaddingMode) -> Self {
        self.config = self.config.with_padding(padding);
        self
    }

    pub fn with_align_corners(mut self, align_corners: bool) -> Self {
        self.config = self.config.with_align_corners(align_corners);
        self
    }

    pub fn with_reverse_indexing(mut self, reverse_indexing: bool) -> Self {
        self.config = self.config.with_reverse_indexing(reverse_indexing);
        self
    }

    pub fn affine(&self) -> &SamplingAffine {
        &self.affine
    }

    pub fn config(&self) -> &AffineResampleConfig {
        &self.config
    }

    /// Resample `image` to the configured output shape.
    pub fn apply<B: Backend, const R: usize>(&self, image: &Tensor<B, R>) -> Result<Tensor<B, R>> {
        self.apply_with_shape(image, None)
    }

    /// Resample `image`, overriding the configured output shape.
    ///
    /// # Errors
    /// * `InsufficientDims` if the image has fewer spatial dims than the
    ///   affine or the output shape,
    /// * `InvalidAffine` if the image has more spatial dims than the affine,
    /// * `InvalidShape` if the output shape rank differs from the affine,
    /// * `BatchMismatch` if the affine batch is larger than one and differs
    ///   from the image batch.
    pub fn apply_with_shape<B: Backend, const R: usize>(
        &self,
        image: &Tensor<B, R>,
        output_shape: Option<&[usize]>,
    ) -> Result<Tensor<B, R>> {
        let layout = VolumeLayout::from_dims(&image.dims())?;
        let d = self.affine.spatial_dims();
        let spatial = layout.spatial_dims();
        if spatial < d {
            return Err(ResampleError::InsufficientDims {
                required: d,
                actual: spatial,
            });
        }
        if spatial > d {
            return Err(ResampleError::invalid_affine(format!(
                "{}-D affine cannot resample an image with {} spatial dims",
                d, spatial
            )));
        }

        let output_shape = output_shape
            .or(self.config.output_shape.as_deref())
            .unwrap_or(layout.spatial.as_slice())
            .to_vec();
        if output_shape.len() > spatial {
            return Err(ResampleError::InsufficientDims {
                required: output_shape.len(),
                actual: spatial,
            });
        }
        if output_shape.len() != d {
            return Err(ResampleError::invalid_shape(format!(
                "output shape {:?} does not match {}-D affine",
                output_shape, d
            )));
        }
        validate_output_shape(&output_shape)?;

        let affine_batch = self.affine.len();
        if affine_batch != 1 && affine_batch != layout.batch {
            return Err(ResampleError::BatchMismatch {
                affine: affine_batch,
                image: layout.batch,
            });
        }

        tracing::debug!(
            "Affine resample: {} {}-D affine(s), input {:?} -> output {:?}, {} / {}, align_corners={}",
            affine_batch,
            d,
            image.dims(),
            output_shape,
            self.config.interpolation,
            self.config.padding,
            self.config.align_corners
        );

        // Normalization works in grid order.
        let affine = if self.config.reverse_indexing {
            self.affine.reverse_axes()
        } else {
            self.affine.clone()
        };
        let thetas = affine
            .to_normalized(&layout.spatial, &output_shape, self.config.align_corners)?
            .broadcast(layout.batch)?;

        let sampler = self.config.sampler();
        let grid = sampler.generate_grid::<B, R>(&thetas, &output_shape, &image.device())?;
        sampler.sample(image, &grid)
    }
}

/// Resample `image` under `affine` in one call.
///
/// `output_shape` takes precedence over `config.output_shape`.
pub fn apply_affine_transform<B: Backend, const R: usize>(
    image: &Tensor<B, R>,
    affine: impl Into<SamplingAffine>,
    output_shape: Option<&[usize]>,
    config: &AffineResampleConfig,
) -> Result<Tensor<B, R>> {
    AffineResampler::new(affine)
        .with_config(config.clone())?
        .apply_with_shape(image, output_shape)
}

fn validate_output_shape(shape: &[usize]) -> Result<()> {
    if shape.is_empty() {
        return Err(ResampleError::invalid_shape("output shape must not be empty"));
    }
    if shape.contains(&0) {
        return Err(ResampleError::invalid_shape(format!(
            "output shape entries must be positive, got {:?}",
            shape
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn image(values: Vec<f32>, dims: [usize; 4]) -> Tensor<B, 4> {
        let device = Default::default();
        Tensor::<B, 4>::from_data(TensorData::new(values, dims), &device)
    }

    #[test]
    fn test_config_defaults() {
        let config = AffineResampleConfig::default();
        assert_eq!(config.output_shape, None);
        assert_eq!(config.interpolation, InterpolationMode::Linear);
        assert_eq!(config.padding, PaddingMode::Zeros);
        assert!(!config.align_corners);
        assert!(config.reverse_indexing);
    }

    #[test]
    fn test_with_output_shape_validates_eagerly() {
        let resampler = AffineResampler::new(PixelAffine::identity(2).unwrap());
        assert!(matches!(
            resampler.clone().with_output_shape(&[3, 0]),
            Err(ResampleError::InvalidShape(_))
        ));
        assert!(matches!(
            resampler.with_output_shape(&[]),
            Err(ResampleError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_from_data_rejects_compact_matrix() {
        let data = TensorData::new(vec![1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0], [2, 3]);
        assert!(matches!(
            AffineResampler::from_data(data, false),
            Err(ResampleError::InvalidAffine(_))
        ));
    }

    #[test]
    fn test_from_data_normalized_flag() {
        let data = TensorData::new(vec![1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0], [3, 3]);
        let resampler = AffineResampler::from_data(data.clone(), true).unwrap();
        assert!(resampler.affine().is_normalized());
        let resampler = AffineResampler::from_data(data, false).unwrap();
        assert!(!resampler.affine().is_normalized());
    }

    #[test]
    fn test_identity_nearest_align_corners() {
        let values: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let input = image(values.clone(), [1, 1, 3, 4]);
        let out = AffineResampler::new(PixelAffine::identity(2).unwrap())
            .with_interpolation(InterpolationMode::Nearest)
            .with_align_corners(true)
            .apply(&input)
            .unwrap();
        assert_eq!(out.into_data().to_vec::<f32>().unwrap(), values);
    }

    #[test]
    fn test_image_rank_errors() {
        let affine_3d = PixelAffine::identity(3).unwrap();
        let input = image(vec![0.0; 4], [1, 1, 2, 2]);
        assert_eq!(
            AffineResampler::new(affine_3d).apply(&input).unwrap_err(),
            ResampleError::InsufficientDims { required: 3, actual: 2 }
        );

        let device = Default::default();
        let volume = Tensor::<B, 5>::zeros([1, 1, 2, 2, 2], &device);
        assert!(matches!(
            AffineResampler::new(PixelAffine::identity(2).unwrap()).apply(&volume),
            Err(ResampleError::InvalidAffine(_))
        ));
    }

    #[test]
    fn test_output_shape_rank_errors() {
        let input = image(vec![0.0; 4], [1, 1, 2, 2]);
        let resampler = AffineResampler::new(PixelAffine::identity(2).unwrap());
        assert_eq!(
            resampler.apply_with_shape(&input, Some(&[2, 2, 2][..])).unwrap_err(),
            ResampleError::InsufficientDims { required: 3, actual: 2 }
        );
        assert!(matches!(
            resampler.apply_with_shape(&input, Some(&[2][..])),
            Err(ResampleError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_affine_batch_rejects_single_image() {
        let input = image(vec![1.0, 2.0, 3.0, 4.0], [1, 1, 2, 2]);
        let batch = AffineBatch::new(vec![PixelAffine::identity(2).unwrap(); 3]).unwrap();
        assert_eq!(
            AffineResampler::new(batch).apply(&input).unwrap_err(),
            ResampleError::BatchMismatch { affine: 3, image: 1 }
        );
    }

    #[test]
    fn test_single_affine_broadcasts_over_batch() {
        let input = image(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], [2, 1, 2, 2]);
        let out = AffineResampler::new(PixelAffine::identity(2).unwrap())
            .with_interpolation(InterpolationMode::Nearest)
            .with_align_corners(true)
            .apply(&input)
            .unwrap();
        assert_eq!(
            out.into_data().to_vec::<f32>().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
        );
    }

    #[test]
    fn test_reverse_axes_swaps_pixel_affine() {
        let shift = PixelAffine::from_compact_rows(&[vec![1.0, 0.0, -1.0], vec![0.0, 1.0, 0.0]]).unwrap();
        let affine = SamplingAffine::from(shift.clone()).reverse_axes();
        assert_eq!(affine, SamplingAffine::from(shift.reverse_axes()));
        assert!(!affine.is_normalized());
    }

    #[test]
    fn test_batch_mismatch() {
        let input = image(vec![0.0; 8], [2, 1, 2, 2]);
        let batch = AffineBatch::new(vec![PixelAffine::identity(2).unwrap(); 3]).unwrap();
        assert_eq!(
            AffineResampler::new(batch).apply(&input).unwrap_err(),
            ResampleError::BatchMismatch { affine: 3, image: 2 }
        );
    }

    #[test]
    fn test_apply_with_shape_overrides_config() {
        let input = image((0..12).map(|v| v as f32).collect(), [1, 1, 3, 4]);
        let resampler = AffineResampler::new(PixelAffine::identity(2).unwrap())
            .with_output_shape(&[3, 4])
            .unwrap();
        let out = resampler.apply_with_shape(&input, Some(&[2, 2][..])).unwrap();
        assert_eq!(out.dims(), [1, 1, 2, 2]);
    }
}
