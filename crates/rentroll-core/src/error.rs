// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Rentroll.
//
// Only a document that cannot be opened (or a pipeline that cannot be built)
// fails the whole operation. Everything else is recovered into an errored
// page, a degraded OCR result, or an unparsed field.

use thiserror::Error;

use crate::types::FieldName;

/// Top-level error type for all Rentroll operations.
#[derive(Debug, Error)]
pub enum RentrollError {
    // -- Document errors --
    #[error("cannot open document {path}: {reason}")]
    DocumentOpen { path: String, reason: String },

    #[error("page {page} extraction failed: {reason}")]
    PageExtraction { page: usize, reason: String },

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- OCR / imaging --
    #[error("OCR on page {page} timed out after {elapsed_ms} ms")]
    OcrTimeout { page: usize, elapsed_ms: u64 },

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How far an error is allowed to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the operation; no partial result is produced.
    Fatal,
    /// Absorbed into page or field metadata; processing continues.
    Recovered,
}

impl RentrollError {
    /// Classify this error for propagation decisions.
    pub fn severity(&self) -> Severity {
        match self {
            RentrollError::DocumentOpen { .. } => Severity::Fatal,
            RentrollError::Config(_) => Severity::Fatal,

            RentrollError::PageExtraction { .. } => Severity::Recovered,
            RentrollError::PdfError(_) => Severity::Recovered,
            RentrollError::OcrTimeout { .. } => Severity::Recovered,
            RentrollError::OcrError(_) => Severity::Recovered,
            RentrollError::ImageError(_) => Severity::Recovered,

            // Only reachable while loading configuration, before any document.
            RentrollError::Io(_) => Severity::Fatal,
            RentrollError::Serialization(_) => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Wrap a lower-level failure as a page-scoped extraction error.
    pub fn for_page(self, page: usize) -> RentrollError {
        match self {
            RentrollError::PageExtraction { .. } | RentrollError::OcrTimeout { .. } => self,
            other => RentrollError::PageExtraction {
                page,
                reason: other.to_string(),
            },
        }
    }
}

/// A field value was located but could not be normalized.
///
/// Never propagated: extractors turn it into an unparsed-field record.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot parse {field} from {raw:?}: {reason}")]
pub struct FieldParseError {
    pub field: FieldName,
    pub raw: String,
    pub reason: String,
}

impl FieldParseError {
    pub fn new(field: FieldName, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RentrollError>;
