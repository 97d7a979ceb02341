// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-resolution OCR acquisition.
//
// Drives an `OcrLadder` for one page: rasterize, enhance and recognize at each
// rung on the blocking pool, bounded by the page's remaining time budget.
//
// Every attempt holds a worker permit, and the permit travels into the
// blocking task. A timed-out call cannot be interrupted; its result is
// discarded, but it keeps its permit until the engine returns. The page
// budget starts once the first attempt gets a worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rentroll_core::config::PipelineConfig;
use rentroll_core::error::RentrollError;
use rentroll_core::types::{ExtractionMethod, OcrInfo, Page};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument, warn};

use crate::acquire::ladder::{LadderResult, OcrLadder};
use crate::scan::backend::{OcrBackend, OcrRequest};
use crate::scan::enhance::ImageEnhancer;
use crate::source::PageSource;

#[derive(Clone)]
pub struct MultiResolutionOcr {
    backend: Arc<dyn OcrBackend>,
    resolutions: Vec<u32>,
    threshold: f32,
    page_timeout: Duration,
    workers: Arc<Semaphore>,
}

impl MultiResolutionOcr {
    /// A strategy with its own worker pool sized by `max_workers`.
    pub fn new(backend: Arc<dyn OcrBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            resolutions: config.ocr_resolutions.clone(),
            threshold: config.ocr_confidence_threshold,
            page_timeout: config.page_ocr_timeout(),
            workers: Arc::new(Semaphore::new(config.effective_workers())),
        }
    }

    /// Draw attempt permits from a shared pool instead.
    pub fn with_workers(mut self, workers: Arc<Semaphore>) -> Self {
        self.workers = workers;
        self
    }

    #[instrument(skip(self, source))]
    pub async fn acquire(&self, source: Arc<dyn PageSource>, page: usize) -> Page {
        let started = Instant::now();
        let mut deadline: Option<Instant> = None;
        let mut ladder = OcrLadder::new(self.resolutions.clone(), self.threshold);

        while let Some(dpi) = ladder.current_resolution() {
            let permit = match deadline {
                None => self.worker().await,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match tokio::time::timeout(remaining, self.worker()).await {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!(page, dpi, "Page OCR budget exhausted waiting for a worker");
                            ladder.time_out();
                            break;
                        }
                    }
                }
            };
            let deadline = *deadline.get_or_insert_with(|| Instant::now() + self.page_timeout);
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                ladder.time_out();
                break;
            }

            let src = Arc::clone(&source);
            let backend = Arc::clone(&self.backend);
            let attempt = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let raster = src.rasterize(page, dpi)?;
                let enhanced = ImageEnhancer::enhance(&raster, dpi);
                backend.recognize(&enhanced, OcrRequest { page, resolution: dpi })
            });

            let state = match tokio::time::timeout(remaining, attempt).await {
                Ok(Ok(Ok(output))) => {
                    debug!(page, dpi, confidence = output.confidence, "OCR attempt finished");
                    ladder.record_success(output)
                }
                Ok(Ok(Err(err))) => {
                    warn!(page, dpi, error = %err, "OCR attempt failed");
                    ladder.record_failure(err.to_string())
                }
                Ok(Err(join_err)) => {
                    warn!(page, dpi, error = %join_err, "OCR task aborted");
                    ladder.record_failure(format!("OCR task aborted: {}", join_err))
                }
                Err(_) => {
                    let err = RentrollError::OcrTimeout {
                        page,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    };
                    warn!(page, dpi, error = %err, "Page OCR budget exhausted");
                    ladder.time_out()
                }
            };
            debug!(page, ?state, "Ladder advanced");
        }

        let result = ladder.finish();
        info!(
            page,
            outcome = ?result.outcome,
            attempts = result.attempts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR ladder finished"
        );
        page_from_ladder(page, result)
    }

    /// A closed pool only happens at shutdown; run unbounded then.
    async fn worker(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.workers).acquire_owned().await.ok()
    }
}

fn page_from_ladder(index: usize, result: LadderResult) -> Page {
    let LadderResult {
        selected,
        outcome,
        attempts,
    } = result;

    match selected {
        Some(best) => Page {
            index,
            text: best.text,
            method: ExtractionMethod::Ocr,
            ocr: Some(OcrInfo {
                resolution: Some(best.resolution),
                confidence: Some(best.confidence),
                outcome,
                attempts,
            }),
            error: None,
        },
        None => {
            let reason = match attempts.last().and_then(|a| a.error.as_deref()) {
                Some(last) => format!(
                    "no OCR attempt succeeded ({} tried, last: {})",
                    attempts.len(),
                    last
                ),
                None => "no OCR attempt was made".to_string(),
            };
            let mut page = Page::errored(index, ExtractionMethod::Ocr, reason);
            page.ocr = Some(OcrInfo {
                resolution: None,
                confidence: None,
                outcome,
                attempts,
            });
            page
        }
    }
}
