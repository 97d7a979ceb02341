// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.
//
// Passed explicitly into every component; nothing here reads the process
// environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RentrollError, Result};

/// Highest OCR rasterization resolution accepted, in DPI.
pub const MAX_OCR_RESOLUTION: u32 = 1200;

/// Settings for one extraction pipeline. Safe to share across documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// OCR rasterization resolutions in DPI, strictly ascending.
    pub ocr_resolutions: Vec<u32>,
    /// Minimum OCR confidence accepted without escalating.
    pub ocr_confidence_threshold: f32,
    /// Non-whitespace characters a text layer needs before it is trusted.
    pub text_density_threshold: usize,
    /// Wall-clock budget for all OCR attempts on one page.
    pub page_ocr_timeout_ms: u64,
    /// Concurrent page workers (0 = available parallelism).
    pub max_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_resolutions: vec![150, 200, 300],
            ocr_confidence_threshold: 0.6,
            text_density_threshold: 100,
            page_ocr_timeout_ms: 120_000,
            max_workers: 0,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the OCR ladder and page router cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.ocr_resolutions.is_empty() {
            return Err(RentrollError::Config(
                "ocr_resolutions must not be empty".into(),
            ));
        }
        if self.ocr_resolutions.contains(&0) {
            return Err(RentrollError::Config(
                "ocr_resolutions must be positive".into(),
            ));
        }
        if let Some(dpi) = self.ocr_resolutions.iter().find(|&&dpi| dpi > MAX_OCR_RESOLUTION) {
            return Err(RentrollError::Config(format!(
                "ocr_resolutions must not exceed {} dpi, got {}",
                MAX_OCR_RESOLUTION, dpi
            )));
        }
        if self.ocr_resolutions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RentrollError::Config(format!(
                "ocr_resolutions must be strictly ascending, got {:?}",
                self.ocr_resolutions
            )));
        }
        if !(0.0..=1.0).contains(&self.ocr_confidence_threshold) {
            return Err(RentrollError::Config(format!(
                "ocr_confidence_threshold must be within [0, 1], got {}",
                self.ocr_confidence_threshold
            )));
        }
        if self.page_ocr_timeout_ms == 0 {
            return Err(RentrollError::Config(
                "page_ocr_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn page_ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.page_ocr_timeout_ms)
    }

    /// Resolve `max_workers`, falling back to the host's parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ocr_resolutions, vec![150, 200, 300]);
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn rejects_unordered_ladder() {
        let config = PipelineConfig {
            ocr_resolutions: vec![300, 200],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RentrollError::Config(_))));

        let dup = PipelineConfig {
            ocr_resolutions: vec![200, 200],
            ..Default::default()
        };
        assert!(dup.validate().is_err());
    }

    #[test]
    fn rejects_resolutions_beyond_the_ceiling() {
        let config = PipelineConfig {
            ocr_resolutions: vec![300, 60_000],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RentrollError::Config(_))));

        let ceiling = PipelineConfig {
            ocr_resolutions: vec![150, MAX_OCR_RESOLUTION],
            ..Default::default()
        };
        assert!(ceiling.validate().is_ok());
    }

    #[test]
    fn rejects_empty_ladder_and_bad_threshold() {
        let empty = PipelineConfig {
            ocr_resolutions: Vec::new(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let threshold = PipelineConfig {
            ocr_confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(threshold.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{ "ocr_confidence_threshold": 0.8 }"#).unwrap();
        assert_eq!(config.ocr_confidence_threshold, 0.8);
        assert_eq!(config.text_density_threshold, 100);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{ "ocr_resolutions": [100, 400], "max_workers": 2 }"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.ocr_resolutions, vec![100, 400]);
        assert_eq!(config.effective_workers(), 2);
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{ "ocr_resolutions": [] }"#).unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(RentrollError::Config(_))
        ));
    }
}
