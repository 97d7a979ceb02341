// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rentroll-pipeline: Turns rent-roll PDFs into Documents.
//
// Ties the loader (page text acquisition) to field extraction, unit assembly
// and aggregation over one shared worker pool.

pub mod pipeline;

pub use pipeline::Pipeline;
pub use rentroll_core::{Document, PipelineConfig, RentrollError};
