// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unit assembler: groups a document's candidates into one Unit per distinct
// unit number and resolves conflicting values.
//
// Unit-number candidates are anchors. Every other candidate (and unparsed
// record) belongs to the nearest anchor at or before it on the same page.
// Items ahead of a page's first anchor continue the previous page's last
// unit at reduced confidence, so they only fill gaps; without one they are
// discarded. A unit anchored solely by a bare "Suite 100"-style mention that
// owns nothing else is dropped as an address, not a unit. Conflicts resolve
// by higher confidence, then direct over OCR, then earlier page, then
// earlier offset, and the deciding rule is kept as provenance.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rentroll_core::types::{
    FieldName, FieldValue, Provenance, ResolutionBranch, TypedValue, Unit, UnparsedField,
};
use tracing::{debug, info, instrument, warn};

/// Confidence multiplier for items carried over a page break.
pub const CARRIED_CONFIDENCE_FACTOR: f32 = 0.5;

/// Anchors from this pattern alone do not establish a unit.
const WEAK_ANCHOR_PATTERN: &str = "unit_number.prefixed";

/// Assembled units in order of first appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub units: Vec<Unit>,
    /// Candidates with no unit anchor, plus weak anchors that were dropped.
    pub discarded: usize,
}

/// Candidate ranking: the preferred candidate sorts first.
pub fn preference(a: &FieldValue, b: &FieldValue) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then(a.method.cmp(&b.method))
        .then(a.page.cmp(&b.page))
        .then(a.offset.cmp(&b.offset))
        .then_with(|| a.pattern.cmp(&b.pattern))
}

/// The rule that separates the winner from the best candidate disagreeing
/// with it.
fn deciding_branch(ranked: &[&FieldValue]) -> ResolutionBranch {
    let winner = ranked[0];
    if ranked.len() == 1 {
        return ResolutionBranch::Single;
    }
    let Some(rival) = ranked[1..].iter().find(|c| c.value != winner.value) else {
        return ResolutionBranch::Unanimous;
    };
    if winner.confidence != rival.confidence {
        ResolutionBranch::Confidence
    } else if winner.method != rival.method {
        ResolutionBranch::ExtractionMethod
    } else if winner.page != rival.page {
        ResolutionBranch::PageOrder
    } else {
        ResolutionBranch::TextPosition
    }
}

/// Anchors of one page, sorted by offset.
struct PageAnchors {
    offsets: Vec<usize>,
    units: Vec<usize>,
}

impl PageAnchors {
    /// Unit owning an item at `offset`.
    fn owner(&self, offset: usize) -> Option<usize> {
        let idx = self.offsets.partition_point(|&o| o <= offset);
        idx.checked_sub(1).map(|i| self.units[i])
    }

    fn last(&self) -> Option<usize> {
        self.units.last().copied()
    }
}

/// Where an item landed.
#[derive(Clone, Copy)]
enum Owner {
    OnPage(usize),
    Carried(usize),
}

impl Owner {
    fn unit(self) -> usize {
        match self {
            Owner::OnPage(unit) | Owner::Carried(unit) => unit,
        }
    }
}

fn carried(candidate: &FieldValue) -> FieldValue {
    FieldValue {
        confidence: candidate.confidence * CARRIED_CONFIDENCE_FACTOR,
        pattern: format!("{}+carried", candidate.pattern),
        ..candidate.clone()
    }
}

pub struct UnitAssembler;

impl UnitAssembler {
    #[instrument(skip_all, fields(candidates = candidates.len(), unparsed = unparsed.len()))]
    pub fn assemble(candidates: &[FieldValue], unparsed: &[UnparsedField]) -> Assembly {
        // -- Anchors ---------------------------------------------------------
        let mut anchor_candidates: Vec<&FieldValue> = candidates
            .iter()
            .filter(|c| c.field == FieldName::UnitNumber)
            .filter(|c| matches!(&c.value, TypedValue::Text(n) if !n.is_empty()))
            .collect();
        anchor_candidates.sort_by(|a, b| {
            (a.page, a.offset).cmp(&(b.page, b.offset)).then_with(|| preference(a, b))
        });

        let mut units: Vec<Unit> = Vec::new();
        let mut index_of: HashMap<String, usize> = HashMap::new();
        let mut pages: BTreeMap<usize, PageAnchors> = BTreeMap::new();
        let mut buckets: BTreeMap<(usize, FieldName), Vec<Cow<'_, FieldValue>>> =
            BTreeMap::new();

        for &candidate in &anchor_candidates {
            let TypedValue::Text(number) = &candidate.value else {
                continue;
            };
            let anchors = pages.entry(candidate.page).or_insert_with(|| PageAnchors {
                offsets: Vec::new(),
                units: Vec::new(),
            });

            // Several patterns can hit the same token; the best one anchors.
            if anchors.offsets.last() == Some(&candidate.offset) {
                if let Some(&unit) = anchors.units.last() {
                    if units[unit].unit_number == *number {
                        buckets
                            .entry((unit, FieldName::UnitNumber))
                            .or_default()
                            .push(Cow::Borrowed(candidate));
                    }
                }
                continue;
            }

            let unit = match index_of.get(number) {
                Some(&unit) => unit,
                None => {
                    units.push(Unit::new(number.clone()));
                    index_of.insert(number.clone(), units.len() - 1);
                    units.len() - 1
                }
            };
            anchors.offsets.push(candidate.offset);
            anchors.units.push(unit);
            buckets
                .entry((unit, FieldName::UnitNumber))
                .or_default()
                .push(Cow::Borrowed(candidate));
        }

        // -- Association -------------------------------------------------------
        let owner = |page: usize, offset: usize| -> Option<Owner> {
            if let Some(unit) = pages.get(&page).and_then(|a| a.owner(offset)) {
                return Some(Owner::OnPage(unit));
            }
            let previous = page.checked_sub(1)?;
            pages.get(&previous).and_then(PageAnchors::last).map(Owner::Carried)
        };

        let mut discarded = 0usize;
        let mut owns_items = vec![false; units.len()];
        for candidate in candidates.iter().filter(|c| c.field != FieldName::UnitNumber) {
            let entry = match owner(candidate.page, candidate.offset) {
                Some(Owner::OnPage(unit)) => (unit, Cow::Borrowed(candidate)),
                Some(Owner::Carried(unit)) => {
                    debug!(
                        page = candidate.page,
                        pattern = %candidate.pattern,
                        "Candidate continues the previous page's last unit"
                    );
                    (unit, Cow::Owned(carried(candidate)))
                }
                None => {
                    debug!(
                        page = candidate.page,
                        offset = candidate.offset,
                        pattern = %candidate.pattern,
                        "Candidate has no unit anchor"
                    );
                    discarded += 1;
                    continue;
                }
            };
            owns_items[entry.0] = true;
            buckets.entry((entry.0, candidate.field)).or_default().push(entry.1);
        }

        let mut unparsed_by_unit: Vec<(usize, FieldName)> = Vec::new();
        for record in unparsed {
            match owner(record.page, record.offset) {
                Some(found) => {
                    owns_items[found.unit()] = true;
                    unparsed_by_unit.push((found.unit(), record.field));
                }
                None => debug!(
                    page = record.page,
                    field = %record.field,
                    "Unparsed value has no unit anchor"
                ),
            }
        }

        // -- Weak anchors ------------------------------------------------------
        let mut keep = vec![true; units.len()];
        for (unit, kept) in keep.iter_mut().enumerate() {
            let Some(anchors) = buckets.get(&(unit, FieldName::UnitNumber)) else {
                continue;
            };
            if !owns_items[unit] && anchors.iter().all(|a| a.pattern == WEAK_ANCHOR_PATTERN) {
                debug!(
                    unit = %units[unit].unit_number,
                    "Dropping unit backed only by an address-style mention"
                );
                *kept = false;
                discarded += anchors.len();
            }
        }

        // -- Resolution --------------------------------------------------------
        for ((unit, field), bucket) in &buckets {
            if !keep[*unit] {
                continue;
            }
            let mut ranked: Vec<&FieldValue> = bucket.iter().map(|c| &**c).collect();
            ranked.sort_by(|a, b| preference(a, b));
            let winner = ranked[0];
            let branch = deciding_branch(&ranked);
            let field = *field;
            let target = &mut units[*unit];
            if !target.set_field(field, &winner.value) {
                warn!(
                    field = %field,
                    pattern = %winner.pattern,
                    "Candidate value does not fit its field"
                );
                continue;
            }
            target.provenance.insert(
                field,
                Provenance {
                    confidence: winner.confidence,
                    method: winner.method,
                    page: winner.page,
                    pattern: winner.pattern.clone(),
                    branch,
                },
            );
        }

        for (unit, field) in unparsed_by_unit {
            let target = &mut units[unit];
            if !target.is_resolved(field) {
                target.unparsed_fields.insert(field);
            }
        }

        let units: Vec<Unit> = units
            .into_iter()
            .zip(keep)
            .filter_map(|(unit, kept)| kept.then_some(unit))
            .collect();

        if discarded > 0 {
            warn!(discarded, "Candidates discarded without a unit anchor");
        }
        info!(units = units.len(), "Units assembled");
        Assembly { units, discarded }
    }
}

#[cfg(test)]
mod tests {
    use rentroll_core::types::{ExtractionMethod, Money};

    use super::*;

    fn candidate(
        field: FieldName,
        value: TypedValue,
        confidence: f32,
        method: ExtractionMethod,
        page: usize,
        offset: usize,
    ) -> FieldValue {
        FieldValue {
            field,
            raw: String::new(),
            value,
            confidence,
            method,
            pattern: format!("{field}.test"),
            page,
            offset,
        }
    }

    fn anchor(number: &str, page: usize, offset: usize) -> FieldValue {
        candidate(
            FieldName::UnitNumber,
            TypedValue::Text(number.into()),
            0.75,
            ExtractionMethod::Direct,
            page,
            offset,
        )
    }

    fn rent(
        cents: i64,
        confidence: f32,
        method: ExtractionMethod,
        page: usize,
        offset: usize,
    ) -> FieldValue {
        candidate(
            FieldName::Rent,
            TypedValue::Money(Money::from_cents(cents)),
            confidence,
            method,
            page,
            offset,
        )
    }

    use ExtractionMethod::{Direct, Ocr};

    #[test]
    fn higher_confidence_wins_over_method() {
        let cands = vec![
            anchor("101", 0, 0),
            rent(100_000, 0.7, Direct, 0, 10),
            rent(120_000, 0.9, Ocr, 0, 20),
        ];
        let assembly = UnitAssembler::assemble(&cands, &[]);
        let unit = &assembly.units[0];
        assert_eq!(unit.rent, Some(Money::from_cents(120_000)));
        assert_eq!(unit.provenance[&FieldName::Rent].branch, ResolutionBranch::Confidence);
        assert_eq!(unit.provenance[&FieldName::Rent].method, Ocr);
    }

    #[test]
    fn equal_confidence_prefers_direct() {
        let cands = vec![
            anchor("101", 0, 0),
            rent(120_000, 0.7, Ocr, 0, 10),
            rent(100_000, 0.7, Direct, 0, 20),
        ];
        let unit = &UnitAssembler::assemble(&cands, &[]).units[0];
        assert_eq!(unit.rent, Some(Money::from_cents(100_000)));
        assert_eq!(
            unit.provenance[&FieldName::Rent].branch,
            ResolutionBranch::ExtractionMethod
        );
    }

    #[test]
    fn page_then_position_break_remaining_ties() {
        let cands = vec![
            anchor("101", 0, 0),
            anchor("101", 1, 0),
            rent(200, 0.7, Direct, 1, 5),
            rent(100, 0.7, Direct, 0, 5),
        ];
        let unit = &UnitAssembler::assemble(&cands, &[]).units[0];
        assert_eq!(unit.rent, Some(Money::from_cents(100)));
        assert_eq!(unit.provenance[&FieldName::Rent].branch, ResolutionBranch::PageOrder);

        let cands = vec![
            anchor("101", 0, 0),
            rent(200, 0.7, Direct, 0, 9),
            rent(100, 0.7, Direct, 0, 5),
        ];
        let unit = &UnitAssembler::assemble(&cands, &[]).units[0];
        assert_eq!(unit.rent, Some(Money::from_cents(100)));
        assert_eq!(unit.provenance[&FieldName::Rent].branch, ResolutionBranch::TextPosition);
    }

    #[test]
    fn items_attach_to_nearest_preceding_anchor() {
        let cands = vec![
            rent(1, 0.7, Direct, 0, 2),
            anchor("101", 0, 10),
            rent(100, 0.7, Direct, 0, 15),
            anchor("102", 0, 30),
            rent(200, 0.7, Direct, 0, 35),
            rent(300, 0.7, Direct, 1, 0),
        ];
        let assembly = UnitAssembler::assemble(&cands, &[]);
        assert_eq!(assembly.units.len(), 2);
        assert_eq!(assembly.units[0].rent, Some(Money::from_cents(100)));
        // Page 1 continues 102, but at reduced confidence it loses.
        assert_eq!(assembly.units[1].rent, Some(Money::from_cents(200)));
        assert_eq!(assembly.discarded, 1);
    }

    #[test]
    fn leading_items_continue_previous_page_unit() {
        let tenant = candidate(
            FieldName::TenantName,
            TypedValue::Text("Jane Doe".into()),
            0.75,
            Direct,
            0,
            20,
        );
        let cands = vec![
            anchor("100", 0, 0),
            anchor("101", 0, 10),
            tenant,
            rent(120_000, 0.7, Direct, 1, 0),
            anchor("102", 1, 30),
            rent(95_000, 0.7, Direct, 1, 35),
        ];
        let unparsed = vec![UnparsedField {
            field: FieldName::MoveInDate,
            raw: "13/45/2024".into(),
            reason: "no format".into(),
            page: 1,
            offset: 5,
        }];
        let assembly = UnitAssembler::assemble(&cands, &unparsed);
        assert_eq!(assembly.discarded, 0);

        let unit = &assembly.units[1];
        assert_eq!(unit.unit_number, "101");
        assert_eq!(unit.rent, Some(Money::from_cents(120_000)));
        let provenance = &unit.provenance[&FieldName::Rent];
        assert_eq!(provenance.page, 1);
        assert!(provenance.pattern.ends_with("+carried"));
        assert!((provenance.confidence - 0.7 * CARRIED_CONFIDENCE_FACTOR).abs() < 1e-6);
        assert!(unit.unparsed_fields.contains(&FieldName::MoveInDate));

        assert_eq!(assembly.units[2].rent, Some(Money::from_cents(95_000)));
    }

    #[test]
    fn carry_over_skips_more_than_one_page() {
        let cands = vec![anchor("101", 0, 0), rent(100, 0.7, Direct, 2, 0)];
        let assembly = UnitAssembler::assemble(&cands, &[]);
        assert_eq!(assembly.units[0].rent, None);
        assert_eq!(assembly.discarded, 1);
    }

    #[test]
    fn address_style_anchor_without_items_is_dropped() {
        let mut suite = anchor("100", 0, 0);
        suite.pattern = "unit_number.prefixed".into();
        let cands = vec![
            suite,
            anchor("101", 0, 40),
            rent(120_000, 0.7, Direct, 0, 45),
            anchor("102", 0, 60),
            rent(95_000, 0.7, Direct, 0, 65),
        ];
        let assembly = UnitAssembler::assemble(&cands, &[]);
        let numbers: Vec<&str> = assembly.units.iter().map(|u| u.unit_number.as_str()).collect();
        assert_eq!(numbers, vec!["101", "102"]);
        assert_eq!(assembly.units[0].rent, Some(Money::from_cents(120_000)));
        assert_eq!(assembly.discarded, 1);
    }

    #[test]
    fn prefixed_anchor_owning_items_is_kept() {
        let mut suite = anchor("7C", 0, 0);
        suite.pattern = "unit_number.prefixed".into();
        let cands = vec![suite, rent(80_000, 0.7, Direct, 0, 10)];
        let assembly = UnitAssembler::assemble(&cands, &[]);
        assert_eq!(assembly.units.len(), 1);
        assert_eq!(assembly.units[0].rent, Some(Money::from_cents(80_000)));
        assert_eq!(assembly.discarded, 0);
    }

    #[test]
    fn repeated_unit_numbers_merge_into_one_unit() {
        let cands = vec![
            anchor("101", 0, 0),
            rent(100, 0.7, Direct, 0, 5),
            anchor("102", 0, 20),
            anchor("101", 1, 0),
            rent(100, 0.95, Direct, 1, 5),
        ];
        let assembly = UnitAssembler::assemble(&cands, &[]);
        let numbers: Vec<&str> = assembly.units.iter().map(|u| u.unit_number.as_str()).collect();
        assert_eq!(numbers, vec!["101", "102"]);
        assert_eq!(
            assembly.units[0].provenance[&FieldName::Rent].branch,
            ResolutionBranch::Unanimous
        );
    }

    #[test]
    fn unparsed_only_counts_when_unresolved() {
        let cands = vec![anchor("101", 0, 0), rent(100, 0.7, Direct, 0, 5)];
        let unparsed = vec![
            UnparsedField {
                field: FieldName::MoveOutDate,
                raw: "02/30/2024".into(),
                reason: "no format".into(),
                page: 0,
                offset: 8,
            },
            UnparsedField {
                field: FieldName::Rent,
                raw: "$1,2O0".into(),
                reason: "not decimal".into(),
                page: 0,
                offset: 9,
            },
        ];
        let unit = &UnitAssembler::assemble(&cands, &unparsed).units[0];
        assert!(unit.unparsed_fields.contains(&FieldName::MoveOutDate));
        assert!(!unit.unparsed_fields.contains(&FieldName::Rent));
        assert_eq!(unit.move_out_date, None);
    }

    #[test]
    fn single_candidates_and_anchor_provenance() {
        let cands = vec![anchor("7C", 2, 4), rent(5, 0.55, Ocr, 2, 9)];
        let unit = &UnitAssembler::assemble(&cands, &[]).units[0];
        assert_eq!(unit.unit_number, "7C");
        assert_eq!(unit.provenance[&FieldName::Rent].branch, ResolutionBranch::Single);
        assert_eq!(unit.provenance[&FieldName::UnitNumber].page, 2);
    }
}
