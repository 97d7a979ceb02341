// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unit area (square feet) extractor.

use std::sync::LazyLock;

use regex::Regex;
use rentroll_core::types::{FieldName, TypedValue};

use super::{FieldExtractor, FieldScan, Hit, PageContext, confidence, scan_pattern};
use crate::normalize;

static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?i)\b(?:sq\.?\s*ft|sqft|square\s*(?:feet|footage)|area|size)\.?\s*:\s*",
            r"(?P<v>\d[\d,OoIlS]*(?:\.\d+)?)",
        ),
    )
    .expect("valid labeled area regex")
});

static SUFFIXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<v>\d[\d,]*(?:\.\d+)?)\s*(?:sq\.?\s*ft|sqft|sf|square\s*feet)\b")
        .expect("valid area suffix regex")
});

pub struct AreaExtractor;

impl FieldExtractor for AreaExtractor {
    fn field(&self) -> FieldName {
        FieldName::AreaSqft
    }

    fn extract(&self, ctx: &PageContext<'_>) -> FieldScan {
        let mut scan = FieldScan::default();
        let parse = |raw: &str| normalize::parse_area(&ctx.numeric(raw)).map(TypedValue::Number);

        scan_pattern(ctx, &mut scan, &LABELED, self.field(), "labeled", confidence::LABELED, parse);

        for cell in ctx.rows().iter().filter_map(|row| row.area.as_ref()) {
            let hit = Hit {
                field: self.field(),
                raw: &cell.raw,
                offset: cell.offset,
                confidence: confidence::ROW,
                kind: "row",
            };
            scan.record(ctx, hit, parse(&cell.raw));
        }

        let field = self.field();
        scan_pattern(ctx, &mut scan, &SUFFIXED, field, "suffixed", confidence::PROXIMITY, parse);
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::test_support::{direct, ocr, values};

    #[test]
    fn labeled_row_and_suffixed() {
        let page = "Sq Ft: 1,100\n101 2BR 950 Smith, Jane $1,200.00\nabout 720 sq ft";
        let scan = AreaExtractor.extract(&direct(page));
        assert_eq!(
            values(&scan),
            vec![
                ("area_sqft.labeled".into(), TypedValue::Number(1100.0)),
                ("area_sqft.row".into(), TypedValue::Number(950.0)),
                ("area_sqft.suffixed".into(), TypedValue::Number(720.0)),
            ]
        );
    }

    #[test]
    fn implausible_labeled_area_is_unparsed() {
        let scan = AreaExtractor.extract(&direct("Area: 3"));
        assert!(scan.candidates.is_empty());
        assert_eq!(scan.unparsed.len(), 1);
        assert_eq!(scan.unparsed[0].raw, "3");
    }

    #[test]
    fn ocr_area_is_repaired() {
        let scan = AreaExtractor.extract(&ocr("SqFt: 9S0"));
        assert_eq!(values(&scan), vec![("area_sqft.labeled".into(), TypedValue::Number(950.0))]);
    }
}
