//! Interpolation kernels and padding policies.
//!
//! Modes are closed enums; the sampler dispatches on them with `match`.

pub mod kernel;
pub mod mode;

pub use kernel::{axis_taps, unnormalize, AxisTap, CUBIC_A};
pub use mode::{InterpolationMode, PaddingMode};
