// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document aggregation: totals and per-field metadata as a pure function of
// the assembled units.

use std::collections::BTreeMap;

use rentroll_core::types::{
    ConfidenceSummary, ExtractionMetadata, FieldName, FieldStatus, Money, Unit,
};

/// Document-level figures derived from the units.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_units: usize,
    pub occupied_units: usize,
    pub vacant_units: usize,
    pub total_rent: Money,
    pub total_area: f64,
    /// Field metadata; page and discard counts are filled in by the caller.
    pub metadata: ExtractionMetadata,
}

pub struct DocumentAggregator;

impl DocumentAggregator {
    pub fn summarize(units: &[Unit]) -> Summary {
        let total_units = units.len();
        let occupied_units = units.iter().filter(|u| u.is_occupied()).count();
        let total_rent: Money = units.iter().filter_map(|u| u.rent).sum();
        let total_area: f64 = units.iter().filter_map(|u| u.area_sqft).sum();

        let mut metadata = ExtractionMetadata::default();
        for field in FieldName::ALL {
            let mut resolved = 0usize;
            let mut unparsed = 0usize;
            let mut absent = 0usize;
            for unit in units {
                match unit.status(field) {
                    FieldStatus::Resolved => resolved += 1,
                    FieldStatus::Unparsed => unparsed += 1,
                    FieldStatus::Absent => absent += 1,
                }
            }
            let coverage = if total_units == 0 {
                0.0
            } else {
                resolved as f64 * 100.0 / total_units as f64
            };
            metadata.per_field_coverage.insert(field, coverage);
            metadata.per_field_unparsed.insert(field, unparsed);
            metadata.per_field_absent.insert(field, absent);

            let confidences: Vec<f32> = units
                .iter()
                .filter_map(|u| u.provenance.get(&field))
                .map(|p| p.confidence)
                .collect();
            if let Some(summary) = confidence_summary(&confidences) {
                metadata.per_field_confidence_summary.insert(field, summary);
            }

            let mut branches = BTreeMap::new();
            for provenance in units.iter().filter_map(|u| u.provenance.get(&field)) {
                *branches.entry(provenance.branch).or_insert(0usize) += 1;
            }
            if !branches.is_empty() {
                metadata.resolution_branches.insert(field, branches);
            }
        }

        Summary {
            total_units,
            occupied_units,
            vacant_units: total_units - occupied_units,
            total_rent,
            total_area,
            metadata,
        }
    }
}

fn confidence_summary(values: &[f32]) -> Option<ConfidenceSummary> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    Some(ConfidenceSummary {
        count: values.len(),
        min,
        max,
        mean,
    })
}
