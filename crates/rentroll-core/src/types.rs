// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for rent-roll extraction.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stable identifier for a processed document (hex SHA-256 of its bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -- Fields ------------------------------------------------------------------

/// The ten per-unit fields the extractors know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    UnitNumber,
    UnitType,
    AreaSqft,
    TenantName,
    Rent,
    TotalAmount,
    LeaseStart,
    LeaseEnd,
    MoveInDate,
    MoveOutDate,
}

impl FieldName {
    pub const ALL: [FieldName; 10] = [
        FieldName::UnitNumber,
        FieldName::UnitType,
        FieldName::AreaSqft,
        FieldName::TenantName,
        FieldName::Rent,
        FieldName::TotalAmount,
        FieldName::LeaseStart,
        FieldName::LeaseEnd,
        FieldName::MoveInDate,
        FieldName::MoveOutDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnitNumber => "unit_number",
            Self::UnitType => "unit_type",
            Self::AreaSqft => "area_sqft",
            Self::TenantName => "tenant_name",
            Self::Rent => "rent",
            Self::TotalAmount => "total_amount",
            Self::LeaseStart => "lease_start",
            Self::LeaseEnd => "lease_end",
            Self::MoveInDate => "move_in_date",
            Self::MoveOutDate => "move_out_date",
        }
    }

    /// Whether values of this field normalize to a calendar date.
    pub fn is_date(&self) -> bool {
        matches!(
            self,
            Self::LeaseStart | Self::LeaseEnd | Self::MoveInDate | Self::MoveOutDate
        )
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text acquisition path. `Direct` orders before `Ocr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Embedded PDF text layer.
    Direct,
    /// Optical character recognition over a page raster.
    Ocr,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Ocr => f.write_str("ocr"),
        }
    }
}

// -- Money -------------------------------------------------------------------

/// An exact currency amount in cents. Serialized as a decimal number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Money((value * 100.0).round() as i64))
    }
}

// -- Candidates --------------------------------------------------------------

/// A normalized field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Text(String),
    Money(Money),
    Number(f64),
    Date(NaiveDate),
}

/// One candidate for a field, as emitted by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field: FieldName,
    /// Text exactly as matched on the page.
    pub raw: String,
    pub value: TypedValue,
    /// Pattern specificity, in [0, 1].
    pub confidence: f32,
    pub method: ExtractionMethod,
    /// Identifier of the pattern that matched, e.g. `rent.labeled`.
    pub pattern: String,
    pub page: usize,
    /// Byte offset of the match within the page text.
    pub offset: usize,
}

/// A field that was located on a page but failed normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnparsedField {
    pub field: FieldName,
    pub raw: String,
    pub reason: String,
    pub page: usize,
    pub offset: usize,
}

// -- Pages -------------------------------------------------------------------

/// How the OCR resolution ladder finished for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrOutcome {
    /// An attempt met the confidence threshold.
    Accepted,
    /// Every resolution was tried; the best attempt was kept.
    Degraded,
    /// The page budget ran out; the best attempt so far was kept.
    TimedOut,
}

/// One rung of the resolution ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrAttempt {
    pub resolution: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// OCR details for a page that went through the resolution ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrInfo {
    /// Resolution of the selected attempt; `None` when no attempt produced text.
    pub resolution: Option<u32>,
    /// Confidence of the selected attempt.
    pub confidence: Option<f32>,
    pub outcome: OcrOutcome,
    pub attempts: Vec<OcrAttempt>,
}

/// Raw text acquired for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 0-based page index.
    pub index: usize,
    pub text: String,
    pub method: ExtractionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrInfo>,
    /// Set when acquisition failed; `text` is then empty.
    #[serde(rename = "page_error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Page {
    pub fn direct(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            method: ExtractionMethod::Direct,
            ocr: None,
            error: None,
        }
    }

    pub fn errored(index: usize, method: ExtractionMethod, reason: impl Into<String>) -> Self {
        Self {
            index,
            text: String::new(),
            method,
            ocr: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

// -- Units -------------------------------------------------------------------

/// Which rule picked the winning candidate for a (unit, field) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionBranch {
    /// Only one candidate existed.
    Single,
    /// Several candidates, all agreeing on the value.
    Unanimous,
    /// Highest confidence won.
    Confidence,
    /// Equal confidence; the direct candidate won.
    ExtractionMethod,
    /// Equal confidence and method; the earliest page won.
    PageOrder,
    /// Same page; the earliest occurrence won.
    TextPosition,
}

/// Where a resolved field value came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub confidence: f32,
    pub method: ExtractionMethod,
    pub page: usize,
    pub pattern: String,
    pub branch: ResolutionBranch,
}

/// Per-unit state of a field after assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    Resolved,
    /// Located in the document but never normalized successfully.
    Unparsed,
    /// Never located.
    Absent,
}

/// One rental unit. Unset optional fields mean "not extracted", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_number: String,
    pub unit_type: Option<String>,
    pub area_sqft: Option<f64>,
    /// Empty when the document marks the unit vacant.
    pub tenant_name: Option<String>,
    pub rent: Option<Money>,
    pub total_amount: Option<Money>,
    pub lease_start: Option<NaiveDate>,
    pub lease_end: Option<NaiveDate>,
    pub move_in_date: Option<NaiveDate>,
    pub move_out_date: Option<NaiveDate>,
    /// In-process only; the metadata carries the aggregates.
    #[serde(skip)]
    pub provenance: BTreeMap<FieldName, Provenance>,
    #[serde(skip)]
    pub unparsed_fields: BTreeSet<FieldName>,
}

impl Unit {
    pub fn new(unit_number: impl Into<String>) -> Self {
        Self {
            unit_number: unit_number.into(),
            unit_type: None,
            area_sqft: None,
            tenant_name: None,
            rent: None,
            total_amount: None,
            lease_start: None,
            lease_end: None,
            move_in_date: None,
            move_out_date: None,
            provenance: BTreeMap::new(),
            unparsed_fields: BTreeSet::new(),
        }
    }

    /// Store a normalized value. Returns false if the value's type does not
    /// fit the field (the unit is left untouched).
    pub fn set_field(&mut self, field: FieldName, value: &TypedValue) -> bool {
        match (field, value) {
            (FieldName::UnitNumber, TypedValue::Text(s)) => self.unit_number = s.clone(),
            (FieldName::UnitType, TypedValue::Text(s)) => self.unit_type = Some(s.clone()),
            (FieldName::TenantName, TypedValue::Text(s)) => self.tenant_name = Some(s.clone()),
            (FieldName::AreaSqft, TypedValue::Number(n)) => self.area_sqft = Some(*n),
            (FieldName::Rent, TypedValue::Money(m)) => self.rent = Some(*m),
            (FieldName::TotalAmount, TypedValue::Money(m)) => self.total_amount = Some(*m),
            (FieldName::LeaseStart, TypedValue::Date(d)) => self.lease_start = Some(*d),
            (FieldName::LeaseEnd, TypedValue::Date(d)) => self.lease_end = Some(*d),
            (FieldName::MoveInDate, TypedValue::Date(d)) => self.move_in_date = Some(*d),
            (FieldName::MoveOutDate, TypedValue::Date(d)) => self.move_out_date = Some(*d),
            _ => return false,
        }
        true
    }

    pub fn is_resolved(&self, field: FieldName) -> bool {
        match field {
            FieldName::UnitNumber => !self.unit_number.is_empty(),
            FieldName::UnitType => self.unit_type.is_some(),
            FieldName::AreaSqft => self.area_sqft.is_some(),
            FieldName::TenantName => self.tenant_name.is_some(),
            FieldName::Rent => self.rent.is_some(),
            FieldName::TotalAmount => self.total_amount.is_some(),
            FieldName::LeaseStart => self.lease_start.is_some(),
            FieldName::LeaseEnd => self.lease_end.is_some(),
            FieldName::MoveInDate => self.move_in_date.is_some(),
            FieldName::MoveOutDate => self.move_out_date.is_some(),
        }
    }

    pub fn status(&self, field: FieldName) -> FieldStatus {
        if self.is_resolved(field) {
            FieldStatus::Resolved
        } else if self.unparsed_fields.contains(&field) {
            FieldStatus::Unparsed
        } else {
            FieldStatus::Absent
        }
    }

    /// A unit is occupied when it has a non-blank tenant name.
    pub fn is_occupied(&self) -> bool {
        self.tenant_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }
}

// -- Documents ---------------------------------------------------------------

/// Min / max / mean of the confidences behind one field's resolved values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

/// Page-level acquisition counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub total: usize,
    pub direct: usize,
    pub ocr: usize,
    pub errored: usize,
    pub degraded: usize,
    pub timed_out: usize,
}

impl PageSummary {
    pub fn from_pages(pages: &[Page]) -> Self {
        let mut summary = PageSummary {
            total: pages.len(),
            ..Default::default()
        };
        for page in pages {
            match page.method {
                ExtractionMethod::Direct => summary.direct += 1,
                ExtractionMethod::Ocr => summary.ocr += 1,
            }
            if page.is_errored() {
                summary.errored += 1;
            }
            match page.ocr.as_ref().map(|info| info.outcome) {
                Some(OcrOutcome::Degraded) => summary.degraded += 1,
                Some(OcrOutcome::TimedOut) => summary.timed_out += 1,
                _ => {}
            }
        }
        summary
    }
}

/// What could and could not be extracted, per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Percentage (0-100) of units with the field resolved.
    pub per_field_coverage: BTreeMap<FieldName, f64>,
    pub per_field_confidence_summary: BTreeMap<FieldName, ConfidenceSummary>,
    /// Units where the field was found but could not be parsed.
    pub per_field_unparsed: BTreeMap<FieldName, usize>,
    /// Units where the field was never found.
    pub per_field_absent: BTreeMap<FieldName, usize>,
    pub resolution_branches: BTreeMap<FieldName, BTreeMap<ResolutionBranch, usize>>,
    /// Candidates dropped for lack of a unit-number anchor.
    pub discarded_candidates: usize,
    pub pages: PageSummary,
}

/// Extraction result for one PDF. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub file_name: String,
    pub file_path: String,
    /// True when any page went through OCR.
    pub is_scanned: bool,
    pub pages: Vec<Page>,
    pub units: Vec<Unit>,
    pub total_units: usize,
    pub occupied_units: usize,
    pub vacant_units: usize,
    pub total_rent: Money,
    pub total_area: f64,
    pub extraction_metadata: ExtractionMetadata,
    pub processed_at: DateTime<Utc>,
}
