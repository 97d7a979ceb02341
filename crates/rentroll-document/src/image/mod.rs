// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: resize, grayscale, contrast and denoise steps for page rasters.

pub mod processor;

pub use processor::ImageProcessor;
