// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Normalization rules shared by the field extractors: currency, dates, areas,
// unit numbers, tenant names, and repair of OCR letter/digit confusions.
//
// Every parser returns the reason for rejection as a plain string; callers
// attach the field and raw text.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rentroll_core::types::Money;

/// Accepted date layouts, tried in order; the first successful parse wins.
pub const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y-%m-%d",
    "%m-%d-%Y",
    "%m-%d-%y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Years outside this window are treated as misparses (e.g. `24` read by `%Y`).
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2100;

/// Plausible unit areas in square feet.
pub const AREA_RANGE: std::ops::RangeInclusive<f64> = 50.0..=50_000.0;

// Thousands separators must group by three.
static DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d{1,2}))?$").expect("valid decimal regex")
});

static UNIT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z]{0,2}-?\d{1,5}[A-Z]{0,2}|\d{1,3}-\d{1,4}[A-Z]?)$")
        .expect("valid unit number regex")
});

// -- Money -------------------------------------------------------------------

/// Parse a currency amount exactly. `$` and spaces are stripped, thousands
/// separators checked and dropped; parentheses or a leading minus mean
/// negative; at most two decimal places.
pub fn parse_money(raw: &str) -> Result<Money, String> {
    let trimmed = raw.trim();
    let parenthesized = trimmed.starts_with('(') && trimmed.ends_with(')') && trimmed.len() > 2;
    let (negative, body) = if parenthesized {
        (true, &trimmed[1..trimmed.len() - 1])
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (true, rest)
    } else {
        (false, trimmed)
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ' ' | '\t'))
        .collect();
    let cleaned = cleaned.strip_prefix('-').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return Err("no digits".into());
    }

    let caps = DECIMAL
        .captures(cleaned)
        .ok_or_else(|| format!("{cleaned:?} is not a decimal amount"))?;
    let whole: i64 = caps[1]
        .replace(',', "")
        .parse()
        .map_err(|_| format!("{cleaned:?} is out of range"))?;
    let fraction = match caps.get(2).map(|m| m.as_str()) {
        None => 0,
        Some(f) if f.len() == 1 => f.parse::<i64>().unwrap_or(0) * 10,
        Some(f) => f.parse::<i64>().unwrap_or(0),
    };
    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(|| format!("{cleaned:?} is out of range"))?;

    Ok(Money::from_cents(if negative { -cents } else { cents }))
}

// -- Dates -------------------------------------------------------------------

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let cleaned = raw.trim().trim_end_matches([',', ';', '.']).replace(". ", " ");
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            if YEAR_RANGE.contains(&date.year()) {
                return Ok(date);
            }
        }
    }
    Err(format!("{cleaned:?} matches no accepted date format"))
}

// -- Areas -------------------------------------------------------------------

pub fn parse_area(raw: &str) -> Result<f64, String> {
    let lowered = raw.trim().to_ascii_lowercase();
    let numeric: String = lowered
        .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '.' || c == ' ')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let area: f64 = numeric
        .parse()
        .map_err(|_| format!("{numeric:?} is not a number"))?;
    if !AREA_RANGE.contains(&area) {
        return Err(format!("{area} sq ft is outside the plausible range"));
    }
    Ok(area)
}

// -- Unit numbers ------------------------------------------------------------

/// Fold a unit number to its canonical token: `#` and whitespace removed,
/// uppercase. Must contain a digit.
pub fn normalize_unit_number(raw: &str) -> Result<String, String> {
    let folded: String = raw
        .trim()
        .trim_start_matches('#')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if !folded.chars().any(|c| c.is_ascii_digit()) {
        return Err(format!("{folded:?} has no digits"));
    }
    if !UNIT_NUMBER.is_match(&folded) {
        return Err(format!("{folded:?} is not a unit number"));
    }
    Ok(folded)
}

// -- Text fields -------------------------------------------------------------

/// Collapse internal whitespace.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tenant names: whitespace collapsed, stray punctuation trimmed. The
/// `VACANT` marker normalizes to the empty name.
pub fn normalize_tenant(raw: &str) -> Result<String, String> {
    let name = collapse_whitespace(raw)
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '*'))
        .trim()
        .to_string();
    if name.eq_ignore_ascii_case("vacant") {
        return Ok(String::new());
    }
    if !name.chars().any(|c| c.is_alphabetic()) {
        return Err(format!("{name:?} is not a name"));
    }
    Ok(name)
}

pub fn normalize_unit_type(raw: &str) -> Result<String, String> {
    let code = collapse_whitespace(raw)
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':'))
        .to_ascii_uppercase();
    if code.is_empty() {
        return Err("empty unit type".into());
    }
    Ok(code)
}

// -- OCR repair ----------------------------------------------------------------

/// Digit a letter is commonly misread for, if any.
fn confusable_digit(c: char) -> Option<char> {
    match c {
        'O' | 'o' | 'Q' | 'D' => Some('0'),
        'I' | 'l' | '|' | 'i' | '!' => Some('1'),
        'Z' | 'z' => Some('2'),
        'S' | 's' => Some('5'),
        'G' | 'b' => Some('6'),
        'B' => Some('8'),
        _ => None,
    }
}

/// Repair every confusable letter inside a numeric token (money, area).
/// Tokens without any real digit are left alone.
pub fn repair_ocr_digits(token: &str) -> String {
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return token.to_string();
    }
    token
        .chars()
        .map(|c| confusable_digit(c).unwrap_or(c))
        .collect()
}

/// Repair confusable letters only where they sit between two digits, so unit
/// suffixes like `12B` survive.
pub fn repair_unit_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let flanked = i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_ascii_digit()
                && chars[i + 1].is_ascii_digit();
            match confusable_digit(c) {
                Some(digit) if flanked => digit,
                _ => c,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_parses_exactly() {
        assert_eq!(parse_money("$1,200.00").unwrap().cents(), 120_000);
        assert_eq!(parse_money("1200").unwrap().cents(), 120_000);
        assert_eq!(parse_money("$ 950.5").unwrap().cents(), 95_050);
        assert_eq!(parse_money("(125.00)").unwrap().cents(), -12_500);
        assert_eq!(parse_money("-$40.01").unwrap().cents(), -4_001);
    }

    #[test]
    fn money_rejects_garbage() {
        assert!(parse_money("$").is_err());
        assert!(parse_money("12.345").is_err());
        assert!(parse_money("N/A").is_err());
        assert!(parse_money("99999999999999999999").is_err());
    }

    #[test]
    fn money_checks_thousands_grouping() {
        assert_eq!(parse_money("$12,345,678.90").unwrap().cents(), 1_234_567_890);
        assert!(parse_money("1,2,3").is_err());
        assert!(parse_money("$12,00").is_err());
        assert!(parse_money("1,2345.00").is_err());
        assert!(parse_money(",100").is_err());
    }

    #[test]
    fn dates_try_formats_in_order() {
        let jan5 = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(parse_date("01/05/2024").unwrap(), jan5);
        assert_eq!(parse_date("1/5/24").unwrap(), jan5);
        assert_eq!(parse_date("2024-01-05").unwrap(), jan5);
        assert_eq!(parse_date("01-05-2024").unwrap(), jan5);
        assert_eq!(parse_date("05-Jan-2024").unwrap(), jan5);
        assert_eq!(parse_date("Jan 5, 2024").unwrap(), jan5);
        assert_eq!(parse_date("January 5, 2024").unwrap(), jan5);
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert!(parse_date("02/30/2024").is_err());
        assert!(parse_date("13/01/2024").is_err());
        assert!(parse_date("soon").is_err());
    }

    #[test]
    fn areas() {
        assert_eq!(parse_area("1,200").unwrap(), 1200.0);
        assert_eq!(parse_area("950 sq ft").unwrap(), 950.0);
        assert_eq!(parse_area("875.5 SF").unwrap(), 875.5);
        assert!(parse_area("12").is_err());
        assert!(parse_area("lots").is_err());
    }

    #[test]
    fn unit_numbers_fold_to_canonical_token() {
        assert_eq!(normalize_unit_number(" #101 ").unwrap(), "101");
        assert_eq!(normalize_unit_number("12b").unwrap(), "12B");
        assert_eq!(normalize_unit_number("A-204").unwrap(), "A-204");
        assert_eq!(normalize_unit_number("1-203").unwrap(), "1-203");
        assert!(normalize_unit_number("Type").is_err());
        assert!(normalize_unit_number("01/05/2024").is_err());
    }

    #[test]
    fn tenant_vacant_marker() {
        assert_eq!(normalize_tenant("VACANT").unwrap(), "");
        assert_eq!(normalize_tenant("  Smith,   Jane ").unwrap(), "Smith, Jane");
        assert!(normalize_tenant("1234").is_err());
    }

    #[test]
    fn ocr_repair_in_numbers() {
        assert_eq!(repair_ocr_digits("$1,2O0.0O"), "$1,200.00");
        assert_eq!(repair_ocr_digits("9S0"), "950");
        assert_eq!(repair_ocr_digits("Smith"), "Smith");
    }

    #[test]
    fn ocr_repair_in_unit_tokens_keeps_suffixes() {
        assert_eq!(repair_unit_token("1O1"), "101");
        assert_eq!(repair_unit_token("12B"), "12B");
        assert_eq!(repair_unit_token("B12"), "B12");
        assert_eq!(repair_unit_token("2l4"), "214");
    }
}
