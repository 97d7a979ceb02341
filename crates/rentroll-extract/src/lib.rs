// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rentroll-extract: Field extraction, unit assembly and aggregation.
//
// Everything here is synchronous and pure over page text: the pipeline
// crate decides where it runs.

pub mod aggregator;
pub mod assembler;
pub mod fields;
pub mod normalize;

pub use aggregator::{DocumentAggregator, Summary};
pub use assembler::{Assembly, UnitAssembler};
pub use fields::{ExtractorRegistry, FieldExtractor, FieldScan, PageContext};
