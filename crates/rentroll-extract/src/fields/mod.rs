// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field extraction: one stateless extractor per rent-roll field, registered
// in an explicit ordered registry.
//
// Each extractor scans a page's text with three families of patterns:
// labeled values (`Rent: $1,200.00`), tabular row columns, and keyword
// proximity / fallback heuristics. Confidence reflects pattern specificity.
// Values that are located but fail normalization come back as unparsed
// records instead of candidates.

pub mod area;
pub mod dates;
pub mod money;
pub mod row;
pub mod tenant;
pub mod unit_number;
pub mod unit_type;

use std::borrow::Cow;

use regex::Regex;
use rentroll_core::error::FieldParseError;
use rentroll_core::types::{
    ExtractionMethod, FieldName, FieldValue, Page, TypedValue, UnparsedField,
};
use tracing::debug;

use crate::normalize;
use self::row::ParsedRow;

pub use area::AreaExtractor;
pub use dates::DateExtractor;
pub use money::MoneyExtractor;
pub use tenant::TenantExtractor;
pub use unit_number::UnitNumberExtractor;
pub use unit_type::UnitTypeExtractor;

/// Confidence per pattern tier.
pub mod confidence {
    pub const LABELED: f32 = 0.95;
    /// Unit numbers in the first column of a row.
    pub const ROW_KEY: f32 = 0.75;
    pub const ROW: f32 = 0.70;
    pub const PROXIMITY: f32 = 0.55;
    pub const VACANT_MARKER: f32 = 0.40;
    pub const FALLBACK: f32 = 0.35;
}

// ---------------------------------------------------------------------------
// Page context
// ---------------------------------------------------------------------------

/// Read-only view of one page handed to every extractor. Table rows are
/// parsed once up front.
pub struct PageContext<'a> {
    pub page: usize,
    pub text: &'a str,
    pub method: ExtractionMethod,
    rows: Vec<ParsedRow>,
}

impl<'a> PageContext<'a> {
    pub fn new(page: usize, text: &'a str, method: ExtractionMethod) -> Self {
        let rows = row::parse_rows(text, method == ExtractionMethod::Ocr);
        Self {
            page,
            text,
            method,
            rows,
        }
    }

    pub fn for_page(page: &'a Page) -> Self {
        Self::new(page.index, &page.text, page.method)
    }

    pub fn rows(&self) -> &[ParsedRow] {
        &self.rows
    }

    pub fn is_ocr(&self) -> bool {
        self.method == ExtractionMethod::Ocr
    }

    /// Numeric token with OCR letter/digit repair applied on OCR pages.
    pub fn numeric<'s>(&self, raw: &'s str) -> Cow<'s, str> {
        if self.is_ocr() {
            Cow::Owned(normalize::repair_ocr_digits(raw))
        } else {
            Cow::Borrowed(raw)
        }
    }

    /// Unit token with between-digit repair applied on OCR pages.
    pub fn unit_token<'s>(&self, raw: &'s str) -> Cow<'s, str> {
        if self.is_ocr() {
            Cow::Owned(normalize::repair_unit_token(raw))
        } else {
            Cow::Borrowed(raw)
        }
    }
}

// ---------------------------------------------------------------------------
// Scan results
// ---------------------------------------------------------------------------

/// Where a value was found and by which pattern.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'r> {
    pub field: FieldName,
    pub raw: &'r str,
    pub offset: usize,
    pub confidence: f32,
    /// Pattern kind, e.g. `labeled`; the full id is `<field>.<kind>`.
    pub kind: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldScan {
    pub candidates: Vec<FieldValue>,
    pub unparsed: Vec<UnparsedField>,
}

impl FieldScan {
    /// Record a located value: a candidate when it normalized, otherwise an
    /// unparsed record.
    pub fn record(
        &mut self,
        ctx: &PageContext<'_>,
        hit: Hit<'_>,
        parsed: std::result::Result<TypedValue, String>,
    ) {
        match parsed {
            Ok(value) => self.candidates.push(FieldValue {
                field: hit.field,
                raw: hit.raw.to_string(),
                value,
                confidence: hit.confidence,
                method: ctx.method,
                pattern: format!("{}.{}", hit.field, hit.kind),
                page: ctx.page,
                offset: hit.offset,
            }),
            Err(reason) => {
                let err = FieldParseError::new(hit.field, hit.raw, reason);
                debug!(page = ctx.page, offset = hit.offset, %err, "Field value not normalized");
                self.unparsed.push(UnparsedField {
                    field: err.field,
                    raw: err.raw,
                    reason: err.reason,
                    page: ctx.page,
                    offset: hit.offset,
                });
            }
        }
    }

    pub fn extend(&mut self, other: FieldScan) {
        self.candidates.extend(other.candidates);
        self.unparsed.extend(other.unparsed);
    }

    /// Canonical order: by offset, then field, then pattern.
    pub fn sort(&mut self) {
        self.candidates.sort_by(|a, b| {
            (a.offset, a.field, &a.pattern, &a.raw).cmp(&(b.offset, b.field, &b.pattern, &b.raw))
        });
        self.unparsed
            .sort_by(|a, b| (a.offset, a.field, &a.raw).cmp(&(b.offset, b.field, &b.raw)));
        self.candidates.dedup();
        self.unparsed.dedup();
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.unparsed.is_empty()
    }
}

/// Run `pattern` over the page and record every `v` capture. A match that
/// also captured a `skip` group is ignored (e.g. `Market Rent:` for rent).
pub(crate) fn scan_pattern<F>(
    ctx: &PageContext<'_>,
    scan: &mut FieldScan,
    pattern: &Regex,
    field: FieldName,
    kind: &'static str,
    confidence: f32,
    parse: F,
) where
    F: Fn(&str) -> std::result::Result<TypedValue, String>,
{
    for caps in pattern.captures_iter(ctx.text) {
        if caps.name("skip").is_some() {
            continue;
        }
        let Some(value) = caps.name("v") else {
            continue;
        };
        let hit = Hit {
            field,
            raw: value.as_str(),
            offset: value.start(),
            confidence,
            kind,
        };
        scan.record(ctx, hit, parse(value.as_str()));
    }
}

// ---------------------------------------------------------------------------
// Extractor trait and registry
// ---------------------------------------------------------------------------

/// One field's extraction rules. Implementations hold no state between calls.
pub trait FieldExtractor: Send + Sync {
    fn field(&self) -> FieldName;

    fn extract(&self, ctx: &PageContext<'_>) -> FieldScan;
}

/// Ordered set of extractors applied to every page.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn FieldExtractor>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExtractorRegistry {
    /// One extractor per rent-roll field.
    pub fn standard() -> Self {
        Self::with_extractors(vec![
            Box::new(UnitNumberExtractor),
            Box::new(UnitTypeExtractor),
            Box::new(AreaExtractor),
            Box::new(TenantExtractor),
            Box::new(MoneyExtractor::new(FieldName::Rent)),
            Box::new(MoneyExtractor::new(FieldName::TotalAmount)),
            Box::new(DateExtractor::new(FieldName::LeaseStart)),
            Box::new(DateExtractor::new(FieldName::LeaseEnd)),
            Box::new(DateExtractor::new(FieldName::MoveInDate)),
            Box::new(DateExtractor::new(FieldName::MoveOutDate)),
        ])
    }

    pub fn with_extractors(extractors: Vec<Box<dyn FieldExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn fields(&self) -> Vec<FieldName> {
        self.extractors.iter().map(|e| e.field()).collect()
    }

    /// Apply every extractor to one page. Errored pages yield nothing.
    pub fn scan_page(&self, page: &Page) -> FieldScan {
        if page.is_errored() || page.text.trim().is_empty() {
            return FieldScan::default();
        }
        let ctx = PageContext::for_page(page);
        let mut scan = FieldScan::default();
        for extractor in &self.extractors {
            scan.extend(extractor.extract(&ctx));
        }
        scan.sort();
        debug!(
            page = page.index,
            rows = ctx.rows().len(),
            candidates = scan.candidates.len(),
            unparsed = scan.unparsed.len(),
            "Page scanned"
        );
        scan
    }
}
