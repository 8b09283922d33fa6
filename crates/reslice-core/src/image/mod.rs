//! Image layout and sampling grids.
//!
//! Images are plain burn tensors of shape `(batch, channels, spatial...)`;
//! spatial metadata travels separately as an affine matrix.

pub mod grid;
pub mod layout;

pub use grid::{base_grid, generate_grid};
pub use layout::VolumeLayout;
