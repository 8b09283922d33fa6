pub mod error;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod spatial;

pub use error::{ResampleError, Result};
pub use filter::{
    apply_affine_transform, resample_to_spacing, AffineResampleConfig, AffineResampler,
    GridSampler, SpacingResampler,
};
pub use interpolation::{InterpolationMode, PaddingMode};
pub use spatial::{AffineBatch, NormalizedAffine, PixelAffine};
