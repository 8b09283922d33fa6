//! Per-axis sampling taps.
//!
//! A sample at a continuous position is a weighted sum over integer voxel
//! positions ("taps"). Interpolation is separable, so taps are computed one
//! axis at a time and combined by the sampler as a Cartesian product.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::mode::{InterpolationMode, PaddingMode};

/// Cubic convolution coefficient, matching grid-sample bicubic.
pub const CUBIC_A: f64 = -0.75;

/// One tap along one axis: voxel index and weight per sample point.
///
/// Both tensors have shape `[batch, points]`. The index is always inside
/// `[0, size)` after padding; out-of-range taps under zero padding keep a
/// clamped index and a zero weight.
#[derive(Debug, Clone)]
pub struct AxisTap<B: Backend> {
    pub index: Tensor<B, 2, Int>,
    pub weight: Tensor<B, 2>,
}

/// Map normalized coordinates in `[-1, 1]` to continuous voxel positions.
pub fn unnormalize<B: Backend>(coord: Tensor<B, 2>, size: usize, align_corners: bool) -> Tensor<B, 2> {
    let n = size as f64;
    if align_corners {
        (coord + 1.0) * ((n - 1.0) / 2.0)
    } else {
        ((coord + 1.0) * n - 1.0) / 2.0
    }
}

/// Compute the taps of one axis for continuous voxel positions.
pub fn axis_taps<B: Backend>(
    position: Tensor<B, 2>,
    size: usize,
    interpolation: InterpolationMode,
    padding: PaddingMode,
    align_corners: bool,
) -> Vec<AxisTap<B>> {
    let raw: Vec<(Tensor<B, 2>, Tensor<B, 2>)> = match interpolation {
        InterpolationMode::Nearest => {
            let rounded = position.round();
            let weight = rounded.ones_like();
            vec![(rounded, weight)]
        }
        InterpolationMode::Linear => {
            let low = position.clone().floor();
            let frac = position - low.clone();
            let high = low.clone() + 1.0;
            vec![(low, frac.clone().neg() + 1.0), (high, frac)]
        }
        InterpolationMode::Cubic => {
            let low = position.clone().floor();
            let t = position - low.clone();
            let weights = cubic_weights(t);
            weights
                .into_iter()
                .enumerate()
                .map(|(k, w)| (low.clone() + (k as f64 - 1.0), w))
                .collect()
        }
    };

    raw.into_iter()
        .map(|(tap, weight)| {
            let (index, mask) = pad_index(tap, size, padding, align_corners);
            let weight = match mask {
                Some(mask) => weight * mask,
                None => weight,
            };
            AxisTap { index, weight }
        })
        .collect()
}

/// Cubic convolution weights for taps `floor-1 ..= floor+2` at fraction `t`.
pub fn cubic_weights<B: Backend>(t: Tensor<B, 2>) -> [Tensor<B, 2>; 4] {
    let one_minus_t = t.clone().neg() + 1.0;
    [
        cubic_outer(t.clone() + 1.0),
        cubic_inner(t.clone()),
        cubic_inner(one_minus_t.clone()),
        cubic_outer(one_minus_t + 1.0),
    ]
}

/// Kernel on `|x| <= 1`: `((A+2)x - (A+3))x² + 1`.
fn cubic_inner<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let inner = x.clone() * (CUBIC_A + 2.0) - (CUBIC_A + 3.0);
    inner * x.clone() * x + 1.0
}

/// Kernel on `1 < |x| < 2`: `((Ax - 5A)x + 8A)x - 4A`.
fn cubic_outer<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let inner = x.clone() * CUBIC_A - 5.0 * CUBIC_A;
    let inner = inner * x.clone() + 8.0 * CUBIC_A;
    inner * x - 4.0 * CUBIC_A
}

/// Bring integer-valued tap positions inside `[0, size)`.
///
/// Returns the index tensor and, for zero padding, the validity mask as
/// float weights.
pub fn pad_index<B: Backend>(
    tap: Tensor<B, 2>,
    size: usize,
    padding: PaddingMode,
    align_corners: bool,
) -> (Tensor<B, 2, Int>, Option<Tensor<B, 2>>) {
    let max = (size - 1) as f64;
    match padding {
        PaddingMode::Zeros => {
            let mask = tap.clone().greater_equal_elem(0.0).float()
                * tap.clone().lower_equal_elem(max).float();
            (tap.clamp(0.0, max).int(), Some(mask))
        }
        PaddingMode::Border => (tap.clamp(0.0, max).int(), None),
        PaddingMode::Reflection => (reflect(tap, size, align_corners).int(), None),
    }
}

/// Mirror positions back into the volume, repeating periodically.
///
/// With `align_corners` the mirror axes are the first and last voxel centres
/// (period `2(size-1)`); otherwise the outer voxel edges (period `2 size`).
fn reflect<B: Backend>(tap: Tensor<B, 2>, size: usize, align_corners: bool) -> Tensor<B, 2> {
    let max = (size - 1) as f64;
    if size == 1 {
        return tap.clamp(0.0, 0.0);
    }
    let n = size as f64;
    let (period, mirror) = if align_corners {
        (2.0 * (n - 1.0), 2.0 * (n - 1.0))
    } else {
        (2.0 * n, 2.0 * n - 1.0)
    };
    let wrapped = tap.clone() - (tap / period).floor() * period;
    let mirrored = wrapped.clone().neg() + mirror;
    let upper = wrapped.clone().greater_equal_elem(n);
    wrapped.mask_where(upper, mirrored).clamp(0.0, max)
}
