// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rentroll-document: Page text acquisition for rent-roll PDFs.
//
// Provides PDF reading and page rasterization, raster enhancement, an OCR
// backend seam (with an `ocrs` engine behind the `ocr` feature), the
// direct-text and multi-resolution OCR strategies, and the document loader
// that routes each page between them.

pub mod acquire;
pub mod image;
pub mod loader;
pub mod pdf;
pub mod scan;
pub mod source;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

// Re-export the primary types so callers can use `rentroll_document::DocumentLoader` etc.
pub use acquire::{DirectText, MultiResolutionOcr, OcrLadder, TextAcquisitionStrategy};
pub use crate::image::processor::ImageProcessor;
pub use loader::{DocumentLoader, LoadedDocument};
pub use pdf::reader::PdfReader;
pub use scan::backend::{OcrBackend, OcrOutput, OcrRequest};
pub use scan::enhance::{EnhanceParams, ImageEnhancer};
pub use source::PageSource;

#[cfg(feature = "ocr")]
pub use scan::ocr::{OcrConfig, OcrEngine};
