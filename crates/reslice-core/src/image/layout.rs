//! Shape bookkeeping for `(batch, channels, spatial...)` image tensors.

use crate::error::{ResampleError, Result};

/// Decomposed shape of a channel-first batched image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLayout {
    pub batch: usize,
    pub channels: usize,
    pub spatial: Vec<usize>,
}

impl VolumeLayout {
    /// Split tensor dims into batch, channel and spatial parts.
    ///
    /// # Errors
    /// * `InsufficientDims` if there is no spatial dimension,
    /// * `InvalidShape` if any dimension is zero.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() < 3 {
            return Err(ResampleError::InsufficientDims {
                required: 1,
                actual: dims.len().saturating_sub(2),
            });
        }
        if dims.contains(&0) {
            return Err(ResampleError::invalid_shape(format!(
                "image dims must be positive, got {:?}",
                dims
            )));
        }
        Ok(Self {
            batch: dims[0],
            channels: dims[1],
            spatial: dims[2..].to_vec(),
        })
    }

    pub fn spatial_dims(&self) -> usize {
        self.spatial.len()
    }

    /// Number of voxels in one channel of one batch item.
    pub fn voxel_count(&self) -> usize {
        self.spatial.iter().product()
    }

    /// Same batch and channels with a different spatial shape.
    pub fn with_spatial(&self, spatial: &[usize]) -> Self {
        Self {
            batch: self.batch,
            channels: self.channels,
            spatial: spatial.to_vec(),
        }
    }

    /// Row-major strides of the spatial axes, in elements.
    pub fn spatial_strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.spatial.len()];
        for axis in (0..self.spatial.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.spatial[axis + 1];
        }
        strides
    }

    /// Full tensor dims as a fixed-size array for `reshape`.
    ///
    /// # Errors
    /// `InvalidShape` if `R` does not equal `2 + spatial_dims`.
    pub fn tensor_dims<const R: usize>(&self) -> Result<[usize; R]> {
        if R != self.spatial.len() + 2 {
            return Err(ResampleError::invalid_shape(format!(
                "rank {} tensor cannot hold {} spatial dims",
                R,
                self.spatial.len()
            )));
        }
        let mut dims = [0; R];
        dims[0] = self.batch;
        dims[1] = self.channels;
        dims[2..].copy_from_slice(&self.spatial);
        Ok(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dims() {
        let layout = VolumeLayout::from_dims(&[2, 3, 4, 5, 6]).unwrap();
        assert_eq!(layout.batch, 2);
        assert_eq!(layout.channels, 3);
        assert_eq!(layout.spatial, vec![4, 5, 6]);
        assert_eq!(layout.voxel_count(), 120);
        assert_eq!(layout.spatial_strides(), vec![30, 6, 1]);
    }

    #[test]
    fn test_from_dims_rejects_rank_two() {
        assert_eq!(
            VolumeLayout::from_dims(&[1, 3]),
            Err(ResampleError::InsufficientDims { required: 1, actual: 0 })
        );
    }

    #[test]
    fn test_from_dims_rejects_zero() {
        assert!(matches!(
            VolumeLayout::from_dims(&[1, 1, 0, 4]),
            Err(ResampleError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_tensor_dims() {
        let layout = VolumeLayout::from_dims(&[1, 2, 3, 4]).unwrap().with_spatial(&[5, 6]);
        assert_eq!(layout.tensor_dims::<4>().unwrap(), [1, 2, 5, 6]);
        assert!(layout.tensor_dims::<5>().is_err());
    }
}
