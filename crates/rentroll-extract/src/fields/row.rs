// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tabular row parser.
//
// A rent-roll row starts with a unit token and continues, in order, with an
// optional unit type code, an optional area, the tenant (or VACANT), then
// amounts and dates. Column cells keep their byte offset in the page text so
// row values line up with candidates found by the other patterns.

use std::sync::LazyLock;

use regex::Regex;

use crate::normalize;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid token regex"));

static UNIT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{1,3}-\d{1,4}[A-Za-z]?|[A-Za-z]{0,2}-?\d{1,5}[A-Za-z]?)$")
        .expect("valid unit token regex")
});

static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{1,2}-\d{1,2}",
        r"|\d{1,2}-[A-Za-z]{3}-\d{2,4})$",
    ))
    .expect("valid date token regex")
});

static MONEY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"^\(?-?\$\s?-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?\)?$",
            r"|^\(?-?(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}\)?$",
        ),
    )
    .expect("valid money token regex")
});

static INTEGER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{1,3}(?:,\d{3})+|\d+)$").expect("valid integer token regex")
});

static TYPE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?i)^(?:studio|eff|efficiency|\d(?:br|bd|bed|bdr)(?:/\d(?:\.\d)?(?:ba|bath)?)?",
            r"|\d[x/]\d(?:\.\d)?|[a-z]{1,2}\d{1,2}[a-z]?|\d{1,2}[a-z]{1,2}\d?)$",
        ),
    )
    .expect("valid unit type regex")
});

static RESIDENT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^t\d{6,8}$").expect("valid resident code regex"));

/// Words that may open a row before the unit token.
const UNIT_PREFIXES: &[&str] = &["unit", "apt", "apt.", "apartment", "suite", "ste", "ste.", "#"];

/// Occupancy status columns skipped before the tenant name.
const STATUS_WORDS: &[&str] = &["occupied", "current", "notice", "model", "down"];

/// Rows whose unit area falls outside this range do not get an area column.
const ROW_AREA_RANGE: std::ops::RangeInclusive<u32> = 100..=20_000;

/// A column value and its byte offset within the page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub raw: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub unit: Cell,
    pub unit_type: Option<Cell>,
    pub area: Option<Cell>,
    /// Tenant name as written; `VACANT` for an explicitly vacant unit.
    pub tenant: Option<Cell>,
    /// Money columns in order: rent first, then total.
    pub amounts: Vec<Cell>,
    /// Date columns in order: lease start, lease end, move in, move out.
    pub dates: Vec<Cell>,
}

/// Parse every line of `text` that looks like a rent-roll row.
pub fn parse_rows(text: &str, ocr: bool) -> Vec<ParsedRow> {
    let mut rows = Vec::new();
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        if let Some(row) = parse_line(line, line_start, ocr) {
            rows.push(row);
        }
        line_start += line.len();
    }
    rows
}

struct Token<'l> {
    text: &'l str,
    start: usize,
    end: usize,
}

/// Whitespace-separated tokens; a lone `$` is joined to the amount after it.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let raw: Vec<(usize, usize)> = TOKEN.find_iter(line).map(|m| (m.start(), m.end())).collect();
    let mut tokens = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let (start, mut end) = raw[i];
        if &line[start..end] == "$" && i + 1 < raw.len() {
            end = raw[i + 1].1;
            i += 1;
        }
        tokens.push(Token {
            text: &line[start..end],
            start,
            end,
        });
        i += 1;
    }
    tokens
}

fn parse_line(line: &str, line_start: usize, ocr: bool) -> Option<ParsedRow> {
    let tokens = tokenize(line);
    let mut rest = tokens
        .iter()
        .skip_while(|t| UNIT_PREFIXES.iter().any(|p| t.text.eq_ignore_ascii_case(p)));

    let first = rest.next()?;
    let unit_text = first.text.trim_start_matches('#');
    let unit_offset = line_start + first.start + (first.text.len() - unit_text.len());
    let checked = if ocr {
        normalize::repair_unit_token(unit_text)
    } else {
        unit_text.to_string()
    };
    if unit_text.is_empty() || !UNIT_TOKEN.is_match(&checked) {
        return None;
    }

    let cell = |token: &Token<'_>, text: &str| Cell {
        raw: text.to_string(),
        offset: line_start + token.start,
    };

    let mut row = ParsedRow {
        unit: Cell {
            raw: unit_text.to_string(),
            offset: unit_offset,
        },
        unit_type: None,
        area: None,
        tenant: None,
        amounts: Vec::new(),
        dates: Vec::new(),
    };
    // Byte span of the tenant words within the line.
    let mut tenant_span: Option<(usize, usize)> = None;
    let mut tenant_closed = false;

    for token in rest {
        let text = token.text.trim_end_matches([',', ';']);
        if text.is_empty() || RESIDENT_CODE.is_match(text) {
            continue;
        }
        let shape = Shape::of(text, ocr);

        match shape {
            Shape::Date => {
                row.dates.push(cell(token, text));
                tenant_closed = true;
            }
            Shape::Money => {
                row.amounts.push(cell(token, text));
                tenant_closed = true;
            }
            Shape::Integer(value) => {
                if tenant_span.is_some() || tenant_closed {
                    row.amounts.push(cell(token, text));
                    tenant_closed = true;
                } else if row.area.is_none() && ROW_AREA_RANGE.contains(&value) {
                    row.area = Some(cell(token, text));
                }
            }
            Shape::Word => {
                if tenant_closed {
                    continue;
                }
                let lower = text.to_ascii_lowercase();
                if tenant_span.is_none() {
                    if row.unit_type.is_none() && row.area.is_none() && TYPE_CODE.is_match(text) {
                        row.unit_type = Some(cell(token, text));
                        continue;
                    }
                    if lower == "vacant" {
                        row.tenant = Some(cell(token, text));
                        tenant_closed = true;
                        continue;
                    }
                    if STATUS_WORDS.contains(&lower.as_str()) {
                        continue;
                    }
                }
                if !text.chars().any(|c| c.is_alphabetic()) {
                    continue;
                }
                tenant_span = Some(match tenant_span {
                    Some((start, _)) => (start, token.end),
                    None => (token.start, token.end),
                });
            }
        }
    }

    if let Some((start, end)) = tenant_span {
        let name = line[start..end].trim_end_matches([',', ';']);
        row.tenant = Some(Cell {
            raw: name.to_string(),
            offset: line_start + start,
        });
    }

    let has_money_or_dates = !row.amounts.is_empty() || !row.dates.is_empty();
    let has_descriptor = row.tenant.is_some() && (row.area.is_some() || row.unit_type.is_some());
    (has_money_or_dates || has_descriptor).then_some(row)
}

enum Shape {
    Date,
    Money,
    Integer(u32),
    Word,
}

impl Shape {
    /// Classify a token. OCR pages get a second look with confusable letters
    /// repaired: fully for money and dates, between digits for integers.
    fn of(text: &str, ocr: bool) -> Shape {
        if let Some(shape) = Self::numeric(text) {
            return shape;
        }
        if ocr {
            let repaired = normalize::repair_ocr_digits(text);
            if DATE_TOKEN.is_match(&repaired) {
                return Shape::Date;
            }
            if MONEY_TOKEN.is_match(&repaired) {
                return Shape::Money;
            }
            let digits = normalize::repair_unit_token(text);
            if let Some(shape @ Shape::Integer(_)) = Self::numeric(&digits) {
                return shape;
            }
        }
        Shape::Word
    }

    fn numeric(text: &str) -> Option<Shape> {
        if DATE_TOKEN.is_match(text) {
            Some(Shape::Date)
        } else if MONEY_TOKEN.is_match(text) {
            Some(Shape::Money)
        } else if INTEGER_TOKEN.is_match(text) {
            let value = text.replace(',', "").parse().unwrap_or(u32::MAX);
            Some(Shape::Integer(value))
        } else {
            None
        }
    }
}
