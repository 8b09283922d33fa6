//! Error types for resampling operations.
//!
//! Every operation in this crate validates its inputs eagerly and reports
//! failures through [`ResampleError`] before any sampling work starts.

use thiserror::Error;

/// Main error type for resampling operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResampleError {
    /// A shape argument is empty, has the wrong rank or contains a zero size.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// An affine matrix has the wrong rank or size, or is not homogeneous.
    #[error("Invalid affine: {0}")]
    InvalidAffine(String),

    /// The image has fewer spatial dimensions than the affine or output shape require.
    #[error("Insufficient dimensions: required {required} spatial dims, got {actual}")]
    InsufficientDims { required: usize, actual: usize },

    /// The affine batch disagrees with the image batch.
    #[error("Batch mismatch: affine batch {affine}, image batch {image}")]
    BatchMismatch { affine: usize, image: usize },

    /// An affine could not be inverted where inversion is required.
    #[error("Singular affine: {0}")]
    SingularAffine(String),

    /// An interpolation or padding mode name was not recognised.
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
}

/// Result type for resampling operations.
pub type Result<T> = std::result::Result<T, ResampleError>;

impl ResampleError {
    /// Create an invalid shape error.
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }

    /// Create an invalid affine error.
    pub fn invalid_affine(msg: impl Into<String>) -> Self {
        Self::InvalidAffine(msg.into())
    }

    /// Create a singular affine error.
    pub fn singular_affine(msg: impl Into<String>) -> Self {
        Self::SingularAffine(msg.into())
    }

    /// Create an unknown mode error.
    pub fn unknown_mode(msg: impl Into<String>) -> Self {
        Self::UnknownMode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ResampleError::invalid_shape("empty shape");
        assert!(matches!(err, ResampleError::InvalidShape(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ResampleError::invalid_affine("2x3 is not square");
        assert_eq!(err.to_string(), "Invalid affine: 2x3 is not square");
    }

    #[test]
    fn test_batch_mismatch_display() {
        let err = ResampleError::BatchMismatch { affine: 3, image: 2 };
        let err_str = err.to_string();
        assert!(err_str.contains("affine batch 3"));
        assert!(err_str.contains("image batch 2"));
    }

    #[test]
    fn test_insufficient_dims_display() {
        let err = ResampleError::InsufficientDims { required: 3, actual: 1 };
        assert_eq!(
            err.to_string(),
            "Insufficient dimensions: required 3 spatial dims, got 1"
        );
    }
}
