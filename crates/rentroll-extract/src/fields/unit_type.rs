// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unit type / floor plan extractor.

use std::sync::LazyLock;

use regex::Regex;
use rentroll_core::types::{FieldName, TypedValue};

use super::{FieldExtractor, FieldScan, Hit, PageContext, confidence, scan_pattern};
use crate::normalize;

static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?i)\b(?:unit\s*type|floor\s*plan|bed\s*/\s*bath)\s*:\s*",
            r"(?P<v>[A-Za-z0-9][A-Za-z0-9/.\-]*)",
        ),
    )
    .expect("valid labeled unit type regex")
});

// Bedroom counts written out, e.g. `2BR`, `2 bd/1 ba`, `Studio`.
static BEDROOMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?i)\b(?P<v>studio|\d\s?(?:br|bd|bed(?:room)?s?)",
            r"(?:\s?/\s?\d(?:\.\d)?\s?(?:ba|bath)s?)?)\b",
        ),
    )
    .expect("valid bedroom regex")
});

pub struct UnitTypeExtractor;

fn parse(raw: &str) -> Result<TypedValue, String> {
    normalize::normalize_unit_type(raw).map(TypedValue::Text)
}

impl FieldExtractor for UnitTypeExtractor {
    fn field(&self) -> FieldName {
        FieldName::UnitType
    }

    fn extract(&self, ctx: &PageContext<'_>) -> FieldScan {
        let mut scan = FieldScan::default();
        scan_pattern(ctx, &mut scan, &LABELED, self.field(), "labeled", confidence::LABELED, parse);

        for cell in ctx.rows().iter().filter_map(|row| row.unit_type.as_ref()) {
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
        scan_pattern(ctx, &mut scan, &BEDROOMS, field, "bedrooms", confidence::PROXIMITY, parse);
        scan
    }
}
