// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Date extractors for lease start/end and move-in/move-out.
//
// Row dates are positional: lease start, lease end, move in, move out. A date
// column that fails to parse still occupies its position.

use std::sync::LazyLock;

use regex::Regex;
use rentroll_core::types::{FieldName, TypedValue};

use super::{FieldExtractor, FieldScan, Hit, PageContext, confidence, scan_pattern};
use crate::normalize;

const DATE: &str = concat!(
    r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{1,2}-\d{1,2}|\d{1,2}-[A-Za-z]{3}-\d{2,4}",
    r"|[A-Za-z]{3,9}\.?\s+\d{1,2},\s*\d{4}",
);

/// Labeled and nearby keyword alternations for one date field.
struct Keywords {
    labeled: &'static str,
    nearby: &'static str,
}

fn keywords(field: FieldName) -> Keywords {
    match field {
        FieldName::LeaseStart => Keywords {
            labeled: concat!(
                r"lease\s*(?:start|begin|from)(?:\s*date)?",
                r"|start\s*date|commencement(?:\s*date)?",
            ),
            nearby: r"lease\s+(?:starts?|begins?|began|commenc\w*)|commenc\w*|start(?:s|ed|ing)?",
        },
        FieldName::LeaseEnd => Keywords {
            labeled: concat!(
                r"lease\s*(?:end|to|expiration|exp\.?)(?:\s*date)?",
                r"|end\s*date|expiration(?:\s*date)?",
            ),
            nearby: concat!(
                r"lease\s+(?:ends?|expires?|expired|expiring)",
                r"|expires?|expired|expiring|expiration|ends?",
            ),
        },
        FieldName::MoveInDate => Keywords {
            labeled: r"move[\s-]*in(?:\s*date)?",
            nearby: r"moved?[\s-]*in|occupied\s+since",
        },
        _ => Keywords {
            labeled: r"move[\s-]*out(?:\s*date)?",
            nearby: r"moved?[\s-]*out|vacat(?:ed|es|ing)|notice\s+to\s+vacate",
        },
    }
}

fn compile(field: FieldName) -> (Regex, Regex) {
    let words = keywords(field);
    let labeled = Regex::new(&format!(
        r"(?i)\b(?:{})\s*:\s*(?P<v>{DATE})",
        words.labeled
    ))
    .expect("valid labeled date regex");
    let nearby = Regex::new(&format!(
        r"(?i)\b(?:{})\b[^\n\d:]{{0,20}}(?P<v>{DATE})",
        words.nearby
    ))
    .expect("valid date proximity regex");
    (labeled, nearby)
}

static LEASE_START: LazyLock<(Regex, Regex)> = LazyLock::new(|| compile(FieldName::LeaseStart));
static LEASE_END: LazyLock<(Regex, Regex)> = LazyLock::new(|| compile(FieldName::LeaseEnd));
static MOVE_IN: LazyLock<(Regex, Regex)> = LazyLock::new(|| compile(FieldName::MoveInDate));
static MOVE_OUT: LazyLock<(Regex, Regex)> = LazyLock::new(|| compile(FieldName::MoveOutDate));

/// Extractor for one date field.
pub struct DateExtractor {
    field: FieldName,
}

impl DateExtractor {
    pub fn new(field: FieldName) -> Self {
        debug_assert!(field.is_date());
        Self { field }
    }

    fn patterns(&self) -> &'static (Regex, Regex) {
        match self.field {
            FieldName::LeaseStart => &*LEASE_START,
            FieldName::LeaseEnd => &*LEASE_END,
            FieldName::MoveInDate => &*MOVE_IN,
            _ => &*MOVE_OUT,
        }
    }

    /// Position of this field among a row's date columns.
    fn column(&self) -> usize {
        match self.field {
            FieldName::LeaseStart => 0,
            FieldName::LeaseEnd => 1,
            FieldName::MoveInDate => 2,
            _ => 3,
        }
    }
}

impl FieldExtractor for DateExtractor {
    fn field(&self) -> FieldName {
        self.field
    }

    fn extract(&self, ctx: &PageContext<'_>) -> FieldScan {
        let (labeled, nearby) = self.patterns();
        let mut scan = FieldScan::default();
        let parse = |raw: &str| normalize::parse_date(&ctx.numeric(raw)).map(TypedValue::Date);

        scan_pattern(ctx, &mut scan, labeled, self.field, "labeled", confidence::LABELED, parse);

        let column = self.column();
        for cell in ctx.rows().iter().filter_map(|row| row.dates.get(column)) {
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

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::fields::test_support::{direct, ocr, values};

    fn date(y: i32, m: u32, d: u32) -> TypedValue {
        TypedValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    const ROW: &str = "101 Smith, Jane $1,200.00 01/01/2024 12/31/2024 01/15/2024 02/30/2024";

    #[test]
    fn row_dates_are_positional() {
        let ctx = direct(ROW);
        let start = DateExtractor::new(FieldName::LeaseStart).extract(&ctx);
        let end = DateExtractor::new(FieldName::LeaseEnd).extract(&ctx);
        let move_in = DateExtractor::new(FieldName::MoveInDate).extract(&ctx);
        assert_eq!(values(&start), vec![("lease_start.row".into(), date(2024, 1, 1))]);
        assert_eq!(values(&end), vec![("lease_end.row".into(), date(2024, 12, 31))]);
        assert_eq!(values(&move_in), vec![("move_in_date.row".into(), date(2024, 1, 15))]);
    }

    #[test]
    fn invalid_row_date_is_unparsed() {
        let scan = DateExtractor::new(FieldName::MoveOutDate).extract(&direct(ROW));
        assert!(scan.candidates.is_empty());
        assert_eq!(scan.unparsed.len(), 1);
        assert_eq!(scan.unparsed[0].raw, "02/30/2024");
        assert_eq!(scan.unparsed[0].field, FieldName::MoveOutDate);
    }

    #[test]
    fn labeled_dates() {
        let page = "Lease Start Date: 2024-03-01\nLease End: Feb 28, 2025\nMove-In: 03/02/24";
        let start = DateExtractor::new(FieldName::LeaseStart).extract(&direct(page));
        let end = DateExtractor::new(FieldName::LeaseEnd).extract(&direct(page));
        let move_in = DateExtractor::new(FieldName::MoveInDate).extract(&direct(page));
        assert_eq!(values(&start), vec![("lease_start.labeled".into(), date(2024, 3, 1))]);
        assert_eq!(values(&end), vec![("lease_end.labeled".into(), date(2025, 2, 28))]);
        assert_eq!(values(&move_in), vec![("move_in_date.labeled".into(), date(2024, 3, 2))]);
    }

    #[test]
    fn nearby_keywords() {
        let page = "Resident moved out on 05/31/2024 after notice.";
        let scan = DateExtractor::new(FieldName::MoveOutDate).extract(&direct(page));
        assert_eq!(values(&scan), vec![("move_out_date.nearby".into(), date(2024, 5, 31))]);
    }

    #[test]
    fn ocr_row_dates_are_repaired() {
        let scan = DateExtractor::new(FieldName::LeaseStart)
            .extract(&ocr("1O1 Smith, Jane $1,200.00 O1/O1/2024"));
        assert_eq!(values(&scan), vec![("lease_start.row".into(), date(2024, 1, 1))]);
    }
}
