// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text acquisition strategies: embedded text layer or multi-resolution OCR.

pub mod direct;
pub mod ladder;
pub mod multi_res;

use std::sync::Arc;

use rentroll_core::types::Page;

pub use direct::DirectText;
pub use ladder::{LadderResult, LadderState, OcrLadder, SelectedAttempt};
pub use multi_res::MultiResolutionOcr;

use crate::source::PageSource;

/// How raw text is obtained for a page.
#[derive(Clone)]
pub enum TextAcquisitionStrategy {
    DirectText(DirectText),
    MultiResolutionOcr(MultiResolutionOcr),
}

impl TextAcquisitionStrategy {
    /// Acquire one page. Never fails: problems land in `Page::error`.
    pub async fn acquire(&self, source: Arc<dyn PageSource>, page: usize) -> Page {
        match self {
            Self::DirectText(strategy) => strategy.acquire(source, page).await,
            Self::MultiResolutionOcr(strategy) => strategy.acquire(source, page).await,
        }
    }
}
