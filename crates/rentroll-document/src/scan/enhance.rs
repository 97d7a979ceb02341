// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement: grayscale, contrast normalization, denoise and adaptive
// binarization of page rasters ahead of OCR.

use image::{DynamicImage, GrayImage, Luma};
use tracing::{debug, instrument};

use crate::image::processor::ImageProcessor;

/// Rasters above this size are downscaled before enhancement.
pub const MAX_ENHANCE_PIXELS: u64 = 16_000_000;

/// Resolution-dependent enhancement settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceParams {
    /// Lower luma percentile mapped to black.
    pub stretch_low: f32,
    /// Upper luma percentile mapped to white.
    pub stretch_high: f32,
    /// Contrast factor applied after stretching.
    pub contrast: f32,
    /// Median filter radius (0 disables).
    pub median_radius: u32,
    /// Gaussian sigma before binarization (0 disables).
    pub smooth_sigma: f32,
    /// Adaptive threshold window radius and offset; `None` keeps grayscale.
    pub binarize: Option<(u32, i32)>,
    pub max_pixels: u64,
}

impl EnhanceParams {
    /// Settings for a raster produced at `dpi`.
    ///
    /// Low resolutions keep grayscale (binarizing thin strokes destroys them);
    /// high resolutions have enough pixels per stroke for a local threshold.
    pub fn for_resolution(dpi: u32) -> Self {
        match dpi {
            0..=199 => Self {
                stretch_low: 0.01,
                stretch_high: 0.99,
                contrast: 1.2,
                median_radius: 1,
                smooth_sigma: 0.0,
                binarize: None,
                max_pixels: MAX_ENHANCE_PIXELS,
            },
            200..=299 => Self {
                stretch_low: 0.02,
                stretch_high: 0.98,
                contrast: 1.4,
                median_radius: 1,
                smooth_sigma: 0.0,
                binarize: None,
                max_pixels: MAX_ENHANCE_PIXELS,
            },
            _ => Self {
                stretch_low: 0.02,
                stretch_high: 0.98,
                contrast: 1.4,
                median_radius: 1,
                smooth_sigma: 0.8,
                // Window grows with resolution: 15 px at 300 DPI.
                binarize: Some(((dpi / 20).max(15), 10)),
                max_pixels: MAX_ENHANCE_PIXELS,
            },
        }
    }
}

/// Stateless page-raster enhancer. Identical input and parameters always give
/// identical output.
pub struct ImageEnhancer;

impl ImageEnhancer {
    /// Enhance a raster rendered at `dpi`.
    pub fn enhance(image: &DynamicImage, dpi: u32) -> DynamicImage {
        Self::enhance_with(image, &EnhanceParams::for_resolution(dpi))
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn enhance_with(image: &DynamicImage, params: &EnhanceParams) -> DynamicImage {
        let processed = ImageProcessor::from_dynamic(image.clone())
            .fit_pixels(params.max_pixels)
            .grayscale()
            .stretch_contrast(params.stretch_low, params.stretch_high)
            .adjust_contrast(params.contrast)
            .denoise(params.median_radius)
            .smooth(params.smooth_sigma);

        let out = match params.binarize {
            Some((radius, c)) => {
                DynamicImage::ImageLuma8(binarize(&processed.into_dynamic().to_luma8(), radius, c))
            }
            None => processed.into_dynamic(),
        };
        debug!(
            out_w = out.width(),
            out_h = out.height(),
            binarized = params.binarize.is_some(),
            "Raster enhanced"
        );
        out
    }
}

/// Adaptive threshold: a pixel is ink when darker than its local mean minus `c`.
pub fn binarize(gray: &GrayImage, block_radius: u32, c: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = compute_integral_image(gray);

    GrayImage::from_fn(width, height, |x, y| {
        let local_mean = region_mean(&integral, width, height, x, y, block_radius);
        let threshold = (local_mean as i32 - c).clamp(0, 255) as u8;
        let value = gray.get_pixel(x, y).0[0];
        Luma([if value < threshold { 0 } else { 255 }])
    })
}

/// Summed-area table with a zero row and column, `(w + 1) * (h + 1)` entries.
fn compute_integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += gray.get_pixel(x, y).0[0] as u64;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean intensity of the window centred on (cx, cy), clipped to the image.
fn region_mean(
    integral: &[u64],
    img_width: u32,
    img_height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let stride = (img_width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = (cx as usize + radius as usize + 1).min(img_width as usize);
    let y2 = (cy as usize + radius as usize + 1).min(img_height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return 128.0;
    }

    let sum = integral[y2 * stride + x2] as f64 - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    sum / area
}
