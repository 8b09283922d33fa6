//! Affine matrices and coordinate-space conversions.
//!
//! Geometry is kept on the host as nalgebra `DMatrix<f64>`; pixel data stays
//! on the burn backend.

pub mod affine;
pub mod normalize;
pub mod spacing;

pub use affine::{
    AffineBatch, Affine, CoordinateSpace, Normalized, NormalizedAffine, Pixel, PixelAffine,
};
pub use normalize::{
    denormalize_transform, normalize_transform, to_norm_affine, to_norm_affine_batch,
};
pub use spacing::{affine_spacing, embed_affine, to_affine_nd};
