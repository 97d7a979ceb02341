// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unit number extractor. Its candidates are the anchors units are assembled
// around.

use std::sync::LazyLock;

use regex::Regex;
use rentroll_core::types::{FieldName, TypedValue};

use super::{FieldExtractor, FieldScan, Hit, PageContext, confidence, scan_pattern};
use crate::normalize;

static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?i)\bunit\s*(?:#|no\.?|number)?\s*:\s*#?\s*",
            r"(?P<v>\d{1,3}-\d{1,4}[A-Za-z]?|[A-Za-z]{0,2}-?\d{1,5}[A-Za-z]?)\b",
        ),
    )
    .expect("valid labeled unit regex")
});

static PREFIXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?i)\b(?:unit|apt\.?|apartment|suite|ste\.?)\s*#?\s*",
            r"(?P<v>\d{1,3}-\d{1,4}[A-Za-z]?|[A-Za-z]{0,2}-?\d{1,5}[A-Za-z]?)\b",
        ),
    )
    .expect("valid prefixed unit regex")
});

pub struct UnitNumberExtractor;

impl UnitNumberExtractor {
    fn parse(ctx: &PageContext<'_>, raw: &str) -> Result<TypedValue, String> {
        normalize::normalize_unit_number(&ctx.unit_token(raw)).map(TypedValue::Text)
    }
}

impl FieldExtractor for UnitNumberExtractor {
    fn field(&self) -> FieldName {
        FieldName::UnitNumber
    }

    fn extract(&self, ctx: &PageContext<'_>) -> FieldScan {
        let mut scan = FieldScan::default();
        let parse = |raw: &str| Self::parse(ctx, raw);

        scan_pattern(ctx, &mut scan, &LABELED, self.field(), "labeled", confidence::LABELED, parse);

        for row in ctx.rows() {
            let hit = Hit {
                field: self.field(),
                raw: &row.unit.raw,
                offset: row.unit.offset,
                confidence: confidence::ROW_KEY,
                kind: "row",
            };
            scan.record(ctx, hit, parse(&row.unit.raw));
        }

        let field = self.field();
        scan_pattern(ctx, &mut scan, &PREFIXED, field, "prefixed", confidence::PROXIMITY, parse);
        scan
    }
}
