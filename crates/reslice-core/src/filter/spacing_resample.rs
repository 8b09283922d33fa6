//! Spacing resampling filter.
//!
//! Resamples an image so that its voxels have a requested physical size.
//! The index-to-world affine of the image is updated accordingly: the new
//! affine keeps the world position of the volume while its column norms
//! become the target spacing.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::affine_resample::AffineResampler;
use crate::error::{ResampleError, Result};
use crate::image::VolumeLayout;
use crate::interpolation::{InterpolationMode, PaddingMode};
use crate::spatial::affine::invert;
use crate::spatial::spacing::fit_spacing;
use crate::spatial::{affine_spacing, embed_affine, to_affine_nd, PixelAffine};

/// Spacing magnitude below which an axis is treated as degenerate.
const MIN_SPACING: f64 = 1e-12;

/// Tolerance for skipping resampling when the transform is the identity.
const IDENTITY_TOLERANCE: f64 = 1e-6;

/// Sign convention of a diagonalized affine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagonalSign {
    /// Keep the sign of each original diagonal entry and the original origin.
    #[default]
    FromOriginal,
    /// Force positive axes. When this changes the orientation, the origin
    /// moves to the minimum world corner of the input volume.
    Positive,
}

/// Spacing resampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacingConfig {
    /// Target voxel spacing. Shorter vectors keep the current spacing for the
    /// remaining axes; longer vectors are truncated.
    pub pixdim: Vec<f64>,
    /// Force the derived affine to be axis-aligned.
    pub diagonal: bool,
    /// Sign convention used when `diagonal` is set.
    pub diagonal_sign: DiagonalSign,
    pub padding: PaddingMode,
    pub interpolation: InterpolationMode,
}

impl Default for SpacingConfig {
    fn default() -> Self {
        Self {
            pixdim: Vec::new(),
            diagonal: false,
            diagonal_sign: DiagonalSign::FromOriginal,
            padding: PaddingMode::Border,
            interpolation: InterpolationMode::Linear,
        }
    }
}

/// Geometry derived from a target spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct SpacingGeometry {
    /// Spacing of the input affine.
    pub spacing: Vec<f64>,
    /// Spacing of the derived affine, after fallbacks.
    pub target_spacing: Vec<f64>,
    /// `spacing / target_spacing` per axis.
    pub factors: Vec<f64>,
    pub output_shape: Vec<usize>,
    /// Derived `(D+1)×(D+1)` index-to-world affine.
    pub affine: DMatrix<f64>,
    /// Maps output voxel indices to input voxel indices.
    pub transform: PixelAffine,
}

/// Resampled image with its old and new affines.
#[derive(Debug, Clone)]
pub struct SpacingOutput<B: Backend, const R: usize> {
    pub data: Tensor<B, R>,
    /// The affine supplied by the caller (identity if none was given).
    pub original_affine: DMatrix<f64>,
    /// The derived affine, at the rank of `original_affine`.
    pub affine: DMatrix<f64>,
}

/// Resamples images to a target voxel spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct SpacingResampler {
    config: SpacingConfig,
}

impl SpacingResampler {
    /// Create a resampler targeting `pixdim` with default settings.
    pub fn new(pixdim: &[f64]) -> Self {
        Self {
            config: SpacingConfig {
                pixdim: pixdim.to_vec(),
                ..SpacingConfig::default()
            },
        }
    }

    pub fn from_config(config: SpacingConfig) -> Self {
        Self { config }
    }

    pub fn with_diagonal(mut self, diagonal: bool) -> Self {
        self.config.diagonal = diagonal;
        self
    }

    pub fn with_diagonal_sign(mut self, sign: DiagonalSign) -> Self {
        self.config.diagonal_sign = sign;
        self
    }

    pub fn with_padding(mut self, padding: PaddingMode) -> Self {
        self.config.padding = padding;
        self
    }

    pub fn with_interpolation(mut self, interpolation: InterpolationMode) -> Self {
        self.config.interpolation = interpolation;
        self
    }

    pub fn config(&self) -> &SpacingConfig {
        &self.config
    }

    /// Derive the output geometry without touching pixel data.
    ///
    /// `affine` may have any square size; it is adapted to the rank of
    /// `spatial_shape` with [`to_affine_nd`].
    ///
    /// # Errors
    /// * `InvalidShape` if `spatial_shape` or `output_shape` is malformed,
    /// * `InvalidAffine` if `affine` is not square,
    /// * `SingularAffine` if `affine` cannot be inverted.
    pub fn target_geometry(
        &self,
        affine: &DMatrix<f64>,
        spatial_shape: &[usize],
        output_shape: Option<&[usize]>,
    ) -> Result<SpacingGeometry> {
        let d = spatial_shape.len();
        if d == 0 || spatial_shape.contains(&0) {
            return Err(ResampleError::invalid_shape(format!(
                "spatial shape must be non-empty and positive, got {:?}",
                spatial_shape
            )));
        }
        let affine = to_affine_nd(d, affine)?;
        let spacing = affine_spacing(&affine);
        let requested = fit_spacing(&self.config.pixdim, &spacing, d);

        let factors: Vec<f64> = (0..d)
            .map(|axis| {
                let (current, target) = (spacing[axis], requested[axis]);
                if !target.is_finite() || target <= 0.0 {
                    tracing::warn!(
                        "Target spacing {} on axis {} is not positive, keeping spacing {}",
                        target,
                        axis,
                        current
                    );
                    1.0
                } else if current < MIN_SPACING {
                    tracing::warn!(
                        "Axis {} has zero spacing in the input affine, keeping it",
                        axis
                    );
                    1.0
                } else {
                    current / target
                }
            })
            .collect();
        let target_spacing: Vec<f64> = spacing
            .iter()
            .zip(&factors)
            .map(|(s, f)| s / f)
            .collect();

        let output_shape = match output_shape {
            Some(shape) => {
                if shape.len() != d || shape.contains(&0) {
                    return Err(ResampleError::invalid_shape(format!(
                        "output shape {:?} does not fit {} positive spatial dims",
                        shape, d
                    )));
                }
                shape.to_vec()
            }
            None => spatial_shape
                .iter()
                .zip(&factors)
                .map(|(&size, f)| ((size as f64 * f).round() as usize).max(1))
                .collect(),
        };

        let new_affine = if self.config.diagonal {
            self.diagonal_affine(&affine, &target_spacing, spatial_shape)
        } else {
            let mut new_affine = affine.clone();
            for (axis, f) in factors.iter().enumerate() {
                for r in 0..d {
                    new_affine[(r, axis)] /= f;
                }
            }
            new_affine
        };

        let transform = PixelAffine::new(invert(&affine)? * &new_affine)?;
        tracing::trace!("Spacing transform: {}", transform);

        Ok(SpacingGeometry {
            spacing,
            target_spacing,
            factors,
            output_shape,
            affine: new_affine,
            transform,
        })
    }

    fn diagonal_affine(
        &self,
        affine: &DMatrix<f64>,
        target_spacing: &[f64],
        spatial_shape: &[usize],
    ) -> DMatrix<f64> {
        let d = target_spacing.len();
        let mut new_affine = DMatrix::identity(d + 1, d + 1);
        match self.config.diagonal_sign {
            DiagonalSign::FromOriginal => {
                for axis in 0..d {
                    let sign = if affine[(axis, axis)] < 0.0 { -1.0 } else { 1.0 };
                    new_affine[(axis, axis)] = sign * target_spacing[axis];
                    new_affine[(axis, d)] = affine[(axis, d)];
                }
            }
            DiagonalSign::Positive => {
                let origin = if is_canonical(affine) {
                    DVector::from_fn(d, |r, _| affine[(r, d)])
                } else {
                    min_world_corner(affine, spatial_shape)
                };
                for axis in 0..d {
                    new_affine[(axis, axis)] = target_spacing[axis];
                    new_affine[(axis, d)] = origin[axis];
                }
            }
        }
        new_affine
    }

    /// Resample `image` to the target spacing.
    ///
    /// # Arguments
    /// * `image` - Input of shape `[batch, channels, spatial...]`
    /// * `affine` - Index-to-world affine of any square size; identity if `None`
    /// * `interpolation` - Overrides the configured interpolation
    /// * `output_shape` - Overrides the derived spatial shape
    pub fn resample<B: Backend, const R: usize>(
        &self,
        image: &Tensor<B, R>,
        affine: Option<&DMatrix<f64>>,
        interpolation: Option<InterpolationMode>,
        output_shape: Option<&[usize]>,
    ) -> Result<SpacingOutput<B, R>> {
        let layout = VolumeLayout::from_dims(&image.dims())?;
        let d = layout.spatial_dims();
        let original_affine = affine
            .cloned()
            .unwrap_or_else(|| DMatrix::identity(d + 1, d + 1));

        let geometry = self.target_geometry(&original_affine, &layout.spatial, output_shape)?;
        tracing::debug!(
            "Spacing resample: spacing {:?} -> {:?}, shape {:?} -> {:?}",
            geometry.spacing,
            geometry.target_spacing,
            layout.spatial,
            geometry.output_shape
        );

        let data = if geometry.transform.is_identity(IDENTITY_TOLERANCE)
            && geometry.output_shape == layout.spatial
        {
            tracing::debug!("Spacing already matches, skipping resampling");
            image.clone()
        } else {
            AffineResampler::new(geometry.transform.clone())
                .with_interpolation(interpolation.unwrap_or(self.config.interpolation))
                .with_padding(self.config.padding)
                .with_align_corners(true)
                .with_reverse_indexing(true)
                .apply_with_shape(image, Some(geometry.output_shape.as_slice()))?
        };

        let affine = embed_affine(&original_affine, &geometry.affine)?;
        Ok(SpacingOutput {
            data,
            original_affine,
            affine,
        })
    }
}

/// Resample `image` to `pixdim` in one call.
pub fn resample_to_spacing<B: Backend, const R: usize>(
    image: &Tensor<B, R>,
    affine: Option<&DMatrix<f64>>,
    pixdim: &[f64],
    diagonal: bool,
    padding: PaddingMode,
    interpolation: InterpolationMode,
    output_shape: Option<&[usize]>,
) -> Result<SpacingOutput<B, R>> {
    SpacingResampler::new(pixdim)
        .with_diagonal(diagonal)
        .with_padding(padding)
        .with_interpolation(interpolation)
        .resample(image, affine, None, output_shape)
}

/// Whether every column of the linear block points mostly along its own
/// positive axis.
fn is_canonical(affine: &DMatrix<f64>) -> bool {
    let d = affine.nrows() - 1;
    (0..d).all(|c| {
        let dominant = (0..d)
            .max_by(|&a, &b| affine[(a, c)].abs().total_cmp(&affine[(b, c)].abs()))
            .unwrap_or(c);
        dominant == c && affine[(c, c)] > 0.0
    })
}

/// Per-axis minimum of the world coordinates of the volume corners.
fn min_world_corner(affine: &DMatrix<f64>, spatial_shape: &[usize]) -> DVector<f64> {
    let d = spatial_shape.len();
    DVector::from_fn(d, |r, _| {
        let mut value = affine[(r, d)];
        for (c, &size) in spatial_shape.iter().enumerate() {
            let extent = affine[(r, c)] * (size - 1) as f64;
            if extent < 0.0 {
                value += extent;
            }
        }
        value
    })
}
