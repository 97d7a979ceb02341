// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Currency extractors for the rent and total-amount fields.
//
// Rent excludes qualified rents (market, gross, potential, ...) which are not
// the unit's contract rent. Totals require an explicit total/due label. In
// table rows the first amount is the rent and the second the total.

use std::sync::LazyLock;

use regex::Regex;
use rentroll_core::types::{FieldName, TypedValue};

use super::{FieldExtractor, FieldScan, Hit, PageContext, confidence, scan_pattern};
use crate::normalize;

// Amounts may carry OCR confusables; they are repaired before parsing on OCR
// pages and rejected on direct pages.
const AMOUNT: &str = r"\(?-?\$?\s?\d[\d,OoIlSB]*(?:\.[\dOo]{1,2})?\)?";
const DOLLAR_AMOUNT: &str = r"\$\s?\d[\d,]*(?:\.\d{1,2})?";

const RENT_QUALIFIERS: &str = concat!(
    r"(?:(?P<skip>market|total|gross|potential|scheduled|budget(?:ed)?|annual)\s+)?",
    r"(?:monthly\s+|base\s+|current\s+|contract\s+)?",
);
const TOTAL_LABELS: &str =
    r"(?:total\s+(?:monthly\s+)?(?:amount|charges|due|billed)|amount\s+due|balance\s+due)";

static RENT_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{RENT_QUALIFIERS}rent(?:al)?(?:\s+(?:amount|rate))?\s*:\s*(?P<v>{AMOUNT})"
    ))
    .expect("valid labeled rent regex")
});

static RENT_NEARBY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{RENT_QUALIFIERS}rent(?:al)?\b[^\n$\d:]{{0,25}}(?P<v>{DOLLAR_AMOUNT})"
    ))
    .expect("valid rent proximity regex")
});

static TOTAL_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b{TOTAL_LABELS}\s*:\s*(?P<v>{AMOUNT})"))
        .expect("valid labeled total regex")
});

static TOTAL_NEARBY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{TOTAL_LABELS}\b[^\n$\d:]{{0,25}}(?P<v>{DOLLAR_AMOUNT})"
    ))
    .expect("valid total proximity regex")
});

/// Extractor for one currency field; `field` is `Rent` or `TotalAmount`.
pub struct MoneyExtractor {
    field: FieldName,
}

impl MoneyExtractor {
    pub fn new(field: FieldName) -> Self {
        debug_assert!(matches!(field, FieldName::Rent | FieldName::TotalAmount));
        Self { field }
    }

    fn patterns(&self) -> (&'static Regex, &'static Regex, usize) {
        match self.field {
            FieldName::TotalAmount => (&*TOTAL_LABELED, &*TOTAL_NEARBY, 1),
            _ => (&*RENT_LABELED, &*RENT_NEARBY, 0),
        }
    }
}

impl FieldExtractor for MoneyExtractor {
    fn field(&self) -> FieldName {
        self.field
    }

    fn extract(&self, ctx: &PageContext<'_>) -> FieldScan {
        let (labeled, nearby, column) = self.patterns();
        let mut scan = FieldScan::default();
        let parse = |raw: &str| normalize::parse_money(&ctx.numeric(raw)).map(TypedValue::Money);

        scan_pattern(ctx, &mut scan, labeled, self.field, "labeled", confidence::LABELED, parse);

        for cell in ctx.rows().iter().filter_map(|row| row.amounts.get(column)) {
            let hit = Hit {
                field: self.field,
                raw: &cell.raw,
                offset: cell.offset,
                confidence: confidence::ROW,
                kind: "row",
            };
            scan.record(ctx, hit, parse(&cell.raw));
        }

        scan_pattern(ctx, &mut scan, nearby, self.field, "nearby", confidence::PROXIMITY, parse);
        scan
    }
}
