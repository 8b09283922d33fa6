//! Interpolation and padding mode selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResampleError;

/// Interpolation kernel used when sampling between voxel centres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Value of the closest voxel (ties round to even).
    Nearest,
    /// Bilinear in 2-D, trilinear in 3-D, multilinear beyond.
    #[default]
    Linear,
    /// Separable cubic convolution over a 4-voxel support per axis.
    Cubic,
}

impl InterpolationMode {
    /// Number of voxels touched per axis.
    pub fn support(self) -> usize {
        match self {
            Self::Nearest => 1,
            Self::Linear => 2,
            Self::Cubic => 4,
        }
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

impl FromStr for InterpolationMode {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" | "bilinear" | "trilinear" => Ok(Self::Linear),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            other => Err(ResampleError::unknown_mode(format!(
                "interpolation '{}'",
                other
            ))),
        }
    }
}

/// Policy for sample taps that fall outside the input volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// Out-of-range taps contribute 0.
    #[default]
    Zeros,
    /// Out-of-range taps take the nearest edge voxel.
    Border,
    /// Out-of-range taps are mirrored back into the volume.
    Reflection,
}

impl fmt::Display for PaddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Zeros => "zeros",
            Self::Border => "border",
            Self::Reflection => "reflection",
        };
        f.write_str(name)
    }
}

impl FromStr for PaddingMode {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zeros" | "zero" | "constant" => Ok(Self::Zeros),
            "border" | "edge" => Ok(Self::Border),
            "reflection" | "reflect" => Ok(Self::Reflection),
            other => Err(ResampleError::unknown_mode(format!("padding '{}'", other))),
        }
    }
}
