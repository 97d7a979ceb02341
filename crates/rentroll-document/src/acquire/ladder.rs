// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR resolution ladder: the state machine behind multi-resolution OCR.
//
//   Attempting(r0) --ok, conf >= threshold--> Accepted
//   Attempting(rN) --ok below threshold / failed--> Attempting(rN+1)
//   Attempting(last) --ok below threshold / failed--> Degraded
//   Attempting(_) --page budget spent--> TimedOut
//
// The ladder never runs OCR itself; callers feed it results. Best-so-far is
// the highest confidence seen, ties going to the earlier (cheaper) attempt.

use rentroll_core::types::{OcrAttempt, OcrOutcome};

use crate::scan::backend::OcrOutput;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LadderState {
    Attempting(u32),
    Accepted,
    Degraded,
    TimedOut,
}

impl LadderState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LadderState::Attempting(_))
    }
}

/// The attempt a finished ladder settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedAttempt {
    pub resolution: u32,
    pub text: String,
    pub confidence: f32,
    /// Position on the ladder, 0 = lowest resolution.
    pub rung: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LadderResult {
    /// `None` when no attempt produced output.
    pub selected: Option<SelectedAttempt>,
    pub outcome: OcrOutcome,
    pub attempts: Vec<OcrAttempt>,
}

#[derive(Debug)]
pub struct OcrLadder {
    resolutions: Vec<u32>,
    threshold: f32,
    rung: usize,
    state: LadderState,
    best: Option<SelectedAttempt>,
    attempts: Vec<OcrAttempt>,
}

impl OcrLadder {
    /// `resolutions` must be ascending; an empty ladder starts out degraded.
    pub fn new(resolutions: Vec<u32>, threshold: f32) -> Self {
        let state = match resolutions.first() {
            Some(&first) => LadderState::Attempting(first),
            None => LadderState::Degraded,
        };
        Self {
            resolutions,
            threshold,
            rung: 0,
            state,
            best: None,
            attempts: Vec::new(),
        }
    }

    pub fn state(&self) -> LadderState {
        self.state
    }

    /// Resolution to try next, if the ladder is still running.
    pub fn current_resolution(&self) -> Option<u32> {
        match self.state {
            LadderState::Attempting(resolution) => Some(resolution),
            _ => None,
        }
    }

    /// Feed the output of the current attempt.
    pub fn record_success(&mut self, output: OcrOutput) -> LadderState {
        let LadderState::Attempting(resolution) = self.state else {
            return self.state;
        };
        let confidence = if output.confidence.is_finite() {
            output.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.attempts.push(OcrAttempt {
            resolution,
            confidence: Some(confidence),
            error: None,
        });

        let improves = self
            .best
            .as_ref()
            .is_none_or(|best| confidence > best.confidence);
        if improves {
            self.best = Some(SelectedAttempt {
                resolution,
                text: output.text,
                confidence,
                rung: self.rung,
            });
        }

        if confidence >= self.threshold {
            self.state = LadderState::Accepted;
        } else {
            self.escalate();
        }
        self.state
    }

    /// The current attempt failed (rasterization or OCR error).
    pub fn record_failure(&mut self, reason: impl Into<String>) -> LadderState {
        let LadderState::Attempting(resolution) = self.state else {
            return self.state;
        };
        self.attempts.push(OcrAttempt {
            resolution,
            confidence: None,
            error: Some(reason.into()),
        });
        self.escalate();
        self.state
    }

    /// The page budget ran out while attempting.
    pub fn time_out(&mut self) -> LadderState {
        if let LadderState::Attempting(resolution) = self.state {
            self.attempts.push(OcrAttempt {
                resolution,
                confidence: None,
                error: Some("timed out".into()),
            });
            self.state = LadderState::TimedOut;
        }
        self.state
    }

    pub fn finish(self) -> LadderResult {
        let outcome = match self.state {
            LadderState::Accepted => OcrOutcome::Accepted,
            LadderState::TimedOut => OcrOutcome::TimedOut,
            LadderState::Degraded | LadderState::Attempting(_) => OcrOutcome::Degraded,
        };
        LadderResult {
            selected: self.best,
            outcome,
            attempts: self.attempts,
        }
    }

    fn escalate(&mut self) {
        self.rung += 1;
        self.state = match self.resolutions.get(self.rung) {
            Some(&next) => LadderState::Attempting(next),
            None => LadderState::Degraded,
        };
    }
}
