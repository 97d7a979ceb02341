// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanned-page pipeline: raster enhancement and optical character
// recognition (OCR).

pub mod backend;
pub mod enhance;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use backend::{OcrBackend, OcrOutput, OcrRequest};
pub use enhance::{EnhanceParams, ImageEnhancer};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrEngine};
