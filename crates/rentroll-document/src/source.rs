// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page source abstraction: what the acquisition strategies need from a
// document, independent of how it is stored.

use image::DynamicImage;
use rentroll_core::error::Result;

use crate::pdf::reader::PdfReader;

/// Read-only access to a document's pages. Shared across page workers.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Embedded text layer of a 0-based page.
    fn text_layer(&self, page: usize) -> Result<String>;

    /// Raster of a 0-based page at `dpi`.
    fn rasterize(&self, page: usize, dpi: u32) -> Result<DynamicImage>;
}

impl PageSource for PdfReader {
    fn page_count(&self) -> usize {
        PdfReader::page_count(self)
    }

    fn text_layer(&self, page: usize) -> Result<String> {
        self.page_text(page)
    }

    fn rasterize(&self, page: usize, dpi: u32) -> Result<DynamicImage> {
        self.render_page(page, dpi)
    }
}
