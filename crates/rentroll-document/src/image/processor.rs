// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: resize, grayscale, contrast and denoise steps used to
// prepare page rasters for OCR. Operates on in-memory images using the
// `image` and `imageproc` crates.

use image::{DynamicImage, GrayImage, Luma, imageops::FilterType};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use tracing::{debug, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping
/// the transformed image, enabling method chaining.
///
/// ```ignore
/// let prepared = ImageProcessor::from_dynamic(page)
///     .fit_pixels(12_000_000)
///     .grayscale()
///     .stretch_contrast(0.01, 0.99)
///     .denoise(1)
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Geometry -------------------------------------------------------------

    /// Resize to exactly `width` x `height`, ignoring aspect ratio.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        if self.image.width() == width && self.image.height() == height {
            return self;
        }
        let resized = self.image.resize_exact(width, height, FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Downscale (never upscale) so the image holds at most `max_pixels`,
    /// preserving aspect ratio. Lanczos3 filtering.
    #[instrument(skip(self), fields(max_pixels))]
    pub fn fit_pixels(self, max_pixels: u64) -> Self {
        let (w, h) = (self.image.width() as u64, self.image.height() as u64);
        if w * h <= max_pixels || max_pixels == 0 {
            return self;
        }
        let scale = (max_pixels as f64 / (w * h) as f64).sqrt();
        let new_w = ((w as f64 * scale).floor() as u32).max(1);
        let new_h = ((h as f64 * scale).floor() as u32).max(1);
        debug!(from_w = w, from_h = h, new_w, new_h, "Downscaling oversized raster");
        Self {
            image: self.image.resize_exact(new_w, new_h, FilterType::Lanczos3),
        }
    }

    // -- Tone -----------------------------------------------------------------

    /// Convert the image to 8-bit grayscale (luma).
    pub fn grayscale(self) -> Self {
        match self.image {
            DynamicImage::ImageLuma8(_) => self,
            other => Self {
                image: DynamicImage::ImageLuma8(other.to_luma8()),
            },
        }
    }

    /// Linearly map the `low`..`high` luma percentiles onto 0..255.
    ///
    /// Washed-out scans use only a narrow band of the range; stretching it
    /// restores ink/paper separation. Uniform images are returned unchanged.
    pub fn stretch_contrast(self, low: f32, high: f32) -> Self {
        let gray = self.image.to_luma8();
        let total = gray.width() as u64 * gray.height() as u64;
        if total == 0 {
            return Self::from_gray(gray);
        }

        let mut histogram = [0u64; 256];
        for pixel in gray.pixels() {
            histogram[pixel.0[0] as usize] += 1;
        }
        let lo = percentile(&histogram, total, low);
        let hi = percentile(&histogram, total, high);
        if hi <= lo {
            return Self::from_gray(gray);
        }

        let span = (hi - lo) as f32;
        let mut lut = [0u8; 256];
        for (value, slot) in lut.iter_mut().enumerate() {
            let scaled = (value as f32 - lo as f32) * 255.0 / span;
            *slot = scaled.round().clamp(0.0, 255.0) as u8;
        }
        Self::from_gray(map_luma(&gray, &lut))
    }

    /// Adjust contrast by a factor around mid-gray. 1.0 is a no-op.
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let gray = self.image.to_luma8();
        let mut lut = [0u8; 256];
        for (value, slot) in lut.iter_mut().enumerate() {
            let adjusted = factor * (value as f32 - 128.0) + 128.0;
            *slot = adjusted.clamp(0.0, 255.0) as u8;
        }
        Self::from_gray(map_luma(&gray, &lut))
    }

    // -- Noise ----------------------------------------------------------------

    /// Median filter; removes speckle without smearing glyph edges.
    pub fn denoise(self, radius: u32) -> Self {
        if radius == 0 {
            return self;
        }
        let gray = self.image.to_luma8();
        Self::from_gray(median_filter(&gray, radius, radius))
    }

    /// Gaussian smoothing, used ahead of binarization.
    pub fn smooth(self, sigma: f32) -> Self {
        if sigma <= 0.0 {
            return self;
        }
        let gray = self.image.to_luma8();
        Self::from_gray(gaussian_blur_f32(&gray, sigma))
    }

    fn from_gray(gray: GrayImage) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(gray),
        }
    }
}

fn percentile(histogram: &[u64; 256], total: u64, fraction: f32) -> u8 {
    let target = (total as f64 * fraction.clamp(0.0, 1.0) as f64).ceil() as u64;
    let mut seen = 0u64;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= target.max(1) {
            return value as u8;
        }
    }
    255
}

fn map_luma(gray: &GrayImage, lut: &[u8; 256]) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([lut[gray.get_pixel(x, y).0[0] as usize]])
    })
}
