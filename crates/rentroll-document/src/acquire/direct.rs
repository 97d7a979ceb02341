// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Direct text-layer acquisition.

use std::sync::Arc;

use rentroll_core::types::{ExtractionMethod, Page};
use tracing::{debug, warn};

use crate::source::PageSource;

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectText;

impl DirectText {
    pub async fn acquire(&self, source: Arc<dyn PageSource>, page: usize) -> Page {
        let result = tokio::task::spawn_blocking(move || source.text_layer(page)).await;
        match result {
            Ok(Ok(text)) => {
                debug!(page, chars = text.len(), "Text layer read");
                Page::direct(page, text)
            }
            Ok(Err(err)) => {
                let err = err.for_page(page);
                warn!(page, error = %err, "Text layer unreadable");
                Page::errored(page, ExtractionMethod::Direct, err.to_string())
            }
            Err(join_err) => {
                warn!(page, error = %join_err, "Text layer task failed");
                Page::errored(
                    page,
                    ExtractionMethod::Direct,
                    format!("text layer task failed: {}", join_err),
                )
            }
        }
    }
}
