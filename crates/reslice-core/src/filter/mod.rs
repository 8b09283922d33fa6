//! Resampling filters.
//!
//! [`GridSampler`] is the low-level sampler; [`AffineResampler`] and
//! [`SpacingResampler`] build on it.

pub mod affine_resample;
pub mod grid_sample;
pub mod spacing_resample;

pub use affine_resample::{
    apply_affine_transform, AffineResampleConfig, AffineResampler, SamplingAffine,
};
pub use grid_sample::GridSampler;
pub use spacing_resample::{
    resample_to_spacing, DiagonalSign, SpacingConfig, SpacingGeometry, SpacingOutput,
    SpacingResampler,
};
