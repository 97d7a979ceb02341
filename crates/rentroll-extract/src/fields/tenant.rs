// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tenant name extractor.
//
// Besides labels and row columns, names are found after a resident code
// (`t0012345 Smith, Jane`), as bare `Last, First` pairs, and as the VACANT
// marker, which resolves to the empty name.

use std::sync::LazyLock;

use regex::Regex;
use rentroll_core::types::{FieldName, TypedValue};

use super::{FieldExtractor, FieldScan, Hit, PageContext, confidence, scan_pattern};
use crate::normalize;

static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)\b(?:tenant|resident|lessee|occupant)(?:\s*name)?\s*:[ \t]*(?P<v>[^\n]+)")
        .expect("valid labeled tenant regex")
});

static RESIDENT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[tT]\d{6,8}\s+(?P<v>[A-Z][A-Za-z'\-]+,\s*[A-Z][A-Za-z'\-]+)")
        .expect("valid resident code regex")
});

static LAST_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<v>[A-Z][a-z]+(?:[\-'][A-Z][a-z]+)?,\s*[A-Z][a-z]+)\b")
        .expect("valid name regex")
});

static VACANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?P<v>vacant)\b").expect("valid vacant regex"));

/// Words that end a labeled name because another field starts there.
const STOP_WORDS: &[&str] = &[
    "unit", "type", "rent", "market", "total", "lease", "move", "sq", "sqft", "area", "balance",
    "deposit", "status", "phone", "email", "amount",
];

const MAX_NAME_WORDS: usize = 4;

/// The leading part of a labeled value that is plausibly a name.
fn name_prefix(value: &str) -> &str {
    let value = value.split('\t').next().unwrap_or(value);
    let value = value.split("  ").next().unwrap_or(value);
    let mut end = 0;
    let mut words = 0;
    for token in value.split_whitespace() {
        let bare = token.trim_end_matches([',', ':', ';']).to_ascii_lowercase();
        if words == MAX_NAME_WORDS
            || STOP_WORDS.contains(&bare.as_str())
            || token.chars().any(|c| c.is_ascii_digit() || c == '$')
        {
            break;
        }
        // Tokens come from `value` itself, so the pointer offset is in bounds.
        let start = token.as_ptr() as usize - value.as_ptr() as usize;
        end = start + token.len();
        words += 1;
    }
    value[..end].trim_end_matches([',', ';'])
}

pub struct TenantExtractor;

fn parse(raw: &str) -> Result<TypedValue, String> {
    normalize::normalize_tenant(raw).map(TypedValue::Text)
}

impl FieldExtractor for TenantExtractor {
    fn field(&self) -> FieldName {
        FieldName::TenantName
    }

    fn extract(&self, ctx: &PageContext<'_>) -> FieldScan {
        let mut scan = FieldScan::default();

        for caps in LABELED.captures_iter(ctx.text) {
            let Some(value) = caps.name("v") else {
                continue;
            };
            let name = match name_prefix(value.as_str()) {
                "" => value.as_str().trim(),
                name => name,
            };
            let hit = Hit {
                field: self.field(),
                raw: name,
                offset: value.start(),
                confidence: confidence::LABELED,
                kind: "labeled",
            };
            scan.record(ctx, hit, parse(name));
        }

        for cell in ctx.rows().iter().filter_map(|row| row.tenant.as_ref()) {
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
        scan_pattern(
            ctx,
            &mut scan,
            &RESIDENT_CODE,
            field,
            "resident_code",
            confidence::PROXIMITY,
            parse,
        );
        scan_pattern(ctx, &mut scan, &VACANT, field, "vacant", confidence::VACANT_MARKER, parse);
        scan_pattern(ctx, &mut scan, &LAST_FIRST, field, "last_first", confidence::FALLBACK, parse);
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::test_support::{direct, text, values};

    #[test]
    fn labeled_name_stops_at_next_field() {
        let scan = TenantExtractor.extract(&direct("Tenant: Maria de la Cruz  Rent: $900.00"));
        assert_eq!(values(&scan), vec![("tenant_name.labeled".into(), text("Maria de la Cruz"))]);

        let scan = TenantExtractor.extract(&direct("Resident Name: Ortiz, Sam Rent $900.00"));
        let labeled = &scan.candidates[0];
        assert_eq!(labeled.value, text("Ortiz, Sam"));
    }

    #[test]
    fn resident_code_precedes_name() {
        let scan = TenantExtractor.extract(&direct("id t0012345 Lee, Ann"));
        assert_eq!(
            values(&scan),
            vec![
                ("tenant_name.resident_code".into(), text("Lee, Ann")),
                ("tenant_name.last_first".into(), text("Lee, Ann")),
            ]
        );
    }

    #[test]
    fn vacant_resolves_to_empty_name() {
        let scan = TenantExtractor.extract(&direct("102 1BR 700 VACANT $0.00"));
        assert_eq!(
            values(&scan),
            vec![
                ("tenant_name.row".into(), text("")),
                ("tenant_name.vacant".into(), text("")),
            ]
        );
    }

    #[test]
    fn empty_label_is_unparsed() {
        let scan = TenantExtractor.extract(&direct("Tenant: 12345"));
        assert!(scan.candidates.is_empty());
        assert_eq!(scan.unparsed.len(), 1);
    }

    #[test]
    fn name_prefix_limits() {
        assert_eq!(name_prefix("Smith, Jane\tRent"), "Smith, Jane");
        assert_eq!(name_prefix("A B C D E F"), "A B C D");
        assert_eq!(name_prefix("Doe, John 01/01/2024"), "Doe, John");
        assert_eq!(name_prefix("$500"), "");
    }
}
