//! Reslice Volume Example
//!
//! This example builds a synthetic anisotropic 3D volume and walks through the
//! two resampling entry points:
//!
//! 1. Create a volume with 0.8 x 0.8 x 3.0 mm voxels and an oblique affine
//! 2. Resample it to isotropic 1 mm spacing
//! 3. Rotate the result about the first axis with a pixel-space affine
//! 4. Load a resampling configuration from JSON and apply it
//!
//! Usage:
//!   cargo run --example reslice_volume

use std::f64::consts::PI;

use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use nalgebra::DMatrix;
use reslice_core::filter::{AffineResampleConfig, AffineResampler, SpacingResampler};
use reslice_core::spatial::{affine_spacing, PixelAffine};
use reslice_core::{InterpolationMode, PaddingMode};

type Backend = NdArray<f32>;

fn main() -> anyhow::Result<()> {
    println!("Reslice Volume Example");
    println!("======================\n");

    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .init();

    let device = Default::default();

    // =======================================================================
    // Step 1: Synthetic Volume
    // =======================================================================
    println!("Step 1: Creating synthetic volume...");

    let shape = [24usize, 24, 8];
    let centre = [11.5, 11.5, 3.5];
    let mut values = Vec::with_capacity(shape.iter().product());
    for i in 0..shape[0] {
        for j in 0..shape[1] {
            for k in 0..shape[2] {
                let di = (i as f64 - centre[0]) * 0.8;
                let dj = (j as f64 - centre[1]) * 0.8;
                let dk = (k as f64 - centre[2]) * 3.0;
                let r = (di * di + dj * dj + dk * dk).sqrt();
                values.push(if r < 8.0 { 100.0f32 } else { 0.0 });
            }
        }
    }
    let volume = Tensor::<Backend, 5>::from_data(
        TensorData::new(values, [1, 1, shape[0], shape[1], shape[2]]),
        &device,
    );

    let (c, s) = ((PI / 12.0).cos(), (PI / 12.0).sin());
    let affine = DMatrix::from_row_slice(
        4,
        4,
        &[
            0.8 * c, -0.8 * s, 0.0, -10.0,
            0.8 * s, 0.8 * c, 0.0, -12.0,
            0.0, 0.0, 3.0, 20.0,
            0.0, 0.0, 0.0, 1.0,
        ],
    );
    println!("  Volume shape: {:?}", volume.dims());
    println!("  Voxel spacing: {:?} mm", affine_spacing(&affine));

    // =======================================================================
    // Step 2: Resample to Isotropic Spacing
    // =======================================================================
    println!("\nStep 2: Resampling to 1 mm isotropic...");

    let spacing = SpacingResampler::new(&[1.0, 1.0, 1.0])
        .with_padding(PaddingMode::Zeros)
        .with_interpolation(InterpolationMode::Linear);
    let isotropic = spacing.resample(&volume, Some(&affine), None, None)?;

    println!("  Output shape: {:?}", isotropic.data.dims());
    println!("  Output spacing: {:?} mm", affine_spacing(&isotropic.affine));

    // =======================================================================
    // Step 3: Rotate with a Pixel-Space Affine
    // =======================================================================
    println!("\nStep 3: Rotating 30 degrees about the first axis...");

    let spatial = isotropic.data.dims();
    let centre: Vec<f64> = spatial[2..].iter().map(|&n| (n as f64 - 1.0) / 2.0).collect();
    let (c, s) = ((PI / 6.0).cos(), (PI / 6.0).sin());
    // Rotate about the volume centre: x_in = R (x_out - centre) + centre
    let rotation = PixelAffine::from_compact_rows(&[
        vec![1.0, 0.0, 0.0, 0.0],
        vec![0.0, c, -s, centre[1] - c * centre[1] + s * centre[2]],
        vec![0.0, s, c, centre[2] - s * centre[1] - c * centre[2]],
    ])?;

    let rotated = AffineResampler::new(rotation)
        .with_padding(PaddingMode::Border)
        .with_align_corners(true)
        .apply(&isotropic.data)?;
    println!("  Rotated shape: {:?}", rotated.dims());

    // =======================================================================
    // Step 4: Configuration from JSON
    // =======================================================================
    println!("\nStep 4: Applying a JSON configuration...");

    let config: AffineResampleConfig = serde_json::from_str(
        r#"{ "interpolation": "cubic", "padding": "reflection", "output_shape": [16, 16, 16] }"#,
    )?;
    println!("  Config: {:?}", config);
    let resliced = AffineResampler::new(PixelAffine::identity(3)?)
        .with_config(config)?
        .apply(&rotated)?;
    let total: f32 = resliced.clone().sum().into_scalar();
    println!("  Resliced shape: {:?}", resliced.dims());
    println!("  Resliced intensity sum: {:.1}", total);

    println!("\nDone.");
    Ok(())
}
