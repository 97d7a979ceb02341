// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR backend seam. The resolution ladder only needs "image in, text and a
// confidence out", so engines plug in behind this trait and tests inject
// scripted results.

use image::DynamicImage;
use rentroll_core::error::Result;

/// Which attempt an OCR call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrRequest {
    pub page: usize,
    pub resolution: u32,
}

/// Recognized text and the engine's confidence in it, in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: f32,
}

/// A blocking OCR engine. Called from the blocking thread pool.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &DynamicImage, request: OcrRequest) -> Result<OcrOutput>;
}

/// Characters that legitimately appear on rent rolls.
fn is_plausible(c: char) -> bool {
    c.is_ascii_alphanumeric() || "$.,/-#:()'&%".contains(c)
}

/// Confidence for engines that do not report one.
///
/// Half the score is the share of detected lines that produced any text, half
/// the share of recognized characters that are plausible on a rent roll.
pub fn estimate_confidence(detected_lines: usize, lines: &[String]) -> f32 {
    if detected_lines == 0 {
        return 0.0;
    }
    let recognized = lines.iter().filter(|l| !l.trim().is_empty()).count();
    let line_ratio = (recognized as f32 / detected_lines as f32).min(1.0);

    let (plausible, total) = lines
        .iter()
        .flat_map(|l| l.chars())
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(p, t), c| (p + is_plausible(c) as usize, t + 1));
    let char_ratio = if total == 0 {
        0.0
    } else {
        plausible as f32 / total as f32
    };

    (0.5 * line_ratio + 0.5 * char_ratio).clamp(0.0, 1.0)
}
