// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document loader: opens a PDF, routes each page to the text layer or to
// OCR, and collects page results in order.
//
// Routing: a page whose text layer has at least `text_density_threshold`
// non-whitespace characters keeps it; anything sparser (or unreadable) goes
// through the OCR strategy. Pages run concurrently; the text-layer read and
// every OCR attempt each take a permit from the shared worker pool, so a page
// never holds one permit while waiting for another.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rentroll_core::config::PipelineConfig;
use rentroll_core::error::{RentrollError, Result};
use rentroll_core::types::{DocumentId, ExtractionMethod, Page};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::acquire::{DirectText, MultiResolutionOcr, TextAcquisitionStrategy};
use crate::pdf::reader::PdfReader;
use crate::scan::backend::OcrBackend;
use crate::source::PageSource;

/// An opened document, ready for page acquisition.
pub struct LoadedDocument {
    pub id: DocumentId,
    pub file_name: String,
    pub file_path: String,
    pub source: Arc<dyn PageSource>,
}

#[derive(Clone)]
pub struct DocumentLoader {
    text_density_threshold: usize,
    direct: TextAcquisitionStrategy,
    ocr: Option<TextAcquisitionStrategy>,
    workers: Arc<Semaphore>,
}

impl DocumentLoader {
    pub fn new(
        config: &PipelineConfig,
        ocr_backend: Option<Arc<dyn OcrBackend>>,
        workers: Arc<Semaphore>,
    ) -> Self {
        Self {
            text_density_threshold: config.text_density_threshold,
            direct: TextAcquisitionStrategy::DirectText(DirectText),
            ocr: ocr_backend.map(|backend| {
                TextAcquisitionStrategy::MultiResolutionOcr(
                    MultiResolutionOcr::new(backend, config).with_workers(Arc::clone(&workers)),
                )
            }),
            workers,
        }
    }

    // -- Opening ---------------------------------------------------------------

    /// Read and parse a PDF. The only fatal step of the pipeline.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<LoadedDocument> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let display = path.display().to_string();
        let open_error = |reason: String| RentrollError::DocumentOpen {
            path: display.clone(),
            reason,
        };

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| open_error(err.to_string()))?;
        let id = DocumentId(hex::encode(Sha256::digest(&bytes)));

        let reader = tokio::task::spawn_blocking(move || PdfReader::from_bytes(&bytes))
            .await
            .map_err(|err| open_error(format!("parser task failed: {}", err)))?
            .map_err(|err| open_error(err.to_string()))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());

        info!(id = %id, pages = reader.page_count(), "Document opened");
        Ok(LoadedDocument {
            id,
            file_name,
            file_path: display,
            source: Arc::new(reader),
        })
    }

    // -- Acquisition -----------------------------------------------------------

    /// Acquire every page of `source`, ordered by page index.
    #[instrument(skip_all, fields(pages = source.page_count()))]
    pub async fn load_pages(&self, source: Arc<dyn PageSource>) -> Vec<Page> {
        let count = source.page_count();
        let mut tasks = JoinSet::new();

        for index in 0..count {
            let loader = self.clone();
            let source = Arc::clone(&source);
            tasks.spawn(async move { (index, loader.acquire_page(source, index).await) });
        }

        let mut slots: Vec<Option<Page>> = vec![None; count];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, page)) => slots[index] = Some(page),
                Err(err) => warn!(error = %err, "Page task panicked"),
            }
        }

        let pages: Vec<Page> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Page::errored(index, ExtractionMethod::Direct, "page task panicked")
                })
            })
            .collect();

        let errored = pages.iter().filter(|p| p.is_errored()).count();
        info!(count, errored, "Pages acquired");
        pages
    }

    /// Route one page to the appropriate strategy.
    pub async fn acquire_page(&self, source: Arc<dyn PageSource>, index: usize) -> Page {
        let direct = {
            // A closed pool only happens at shutdown; run unbounded then.
            let _permit = Arc::clone(&self.workers).acquire_owned().await.ok();
            self.direct.acquire(Arc::clone(&source), index).await
        };
        let density = text_density(&direct.text);
        if !direct.is_errored() && density >= self.text_density_threshold {
            debug!(page = index, density, "Using text layer");
            return direct;
        }

        let Some(ocr) = &self.ocr else {
            if !direct.is_errored() && density > 0 {
                warn!(page = index, density, "Sparse text layer kept; no OCR backend configured");
                return direct;
            }
            return Page::errored(
                index,
                ExtractionMethod::Ocr,
                "page needs OCR but no OCR backend configured",
            );
        };

        debug!(page = index, density, "Routing page to OCR");
        let scanned = ocr.acquire(source, index).await;
        if scanned.is_errored() && !direct.is_errored() && density > 0 {
            warn!(page = index, "OCR produced nothing; keeping sparse text layer");
            return direct;
        }
        scanned
    }
}

/// Non-whitespace character count.
pub fn text_density(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fixtures::{MemorySource, PdfBuilder, ScriptedOcr};

    fn loader(ocr: Option<Arc<dyn OcrBackend>>) -> DocumentLoader {
        let config = PipelineConfig {
            text_density_threshold: 20,
            ..Default::default()
        };
        DocumentLoader::new(&config, ocr, Arc::new(Semaphore::new(2)))
    }

    const DENSE: &str = "101 2BR 950 Smith, Jane $1,200.00 01/01/2024";

    #[tokio::test]
    async fn opens_pdf_and_hashes_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roll.pdf");
        std::fs::write(&path, PdfBuilder::new().text_page(&[DENSE]).build()).unwrap();

        let loader = loader(None);
        let first = loader.open(&path).await.unwrap();
        let second = loader.open(&path).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.id.0.len(), 64);
        assert_eq!(first.file_name, "roll.pdf");
        assert_eq!(first.source.page_count(), 1);
    }

    #[tokio::test]
    async fn invalid_file_is_document_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 garbage without xref").unwrap();

        let err = loader(None).open(&path).await.err().unwrap();
        assert!(matches!(err, RentrollError::DocumentOpen { .. }));
        assert!(err.is_fatal());

        let missing = loader(None).open(dir.path().join("absent.pdf")).await;
        assert!(matches!(missing, Err(RentrollError::DocumentOpen { .. })));
    }

    #[tokio::test]
    async fn dense_pages_stay_direct_and_sparse_pages_go_to_ocr() {
        let source: Arc<dyn PageSource> = Arc::new(MemorySource::new(vec![
            (DENSE.to_string(), false),
            (String::new(), true),
        ]));
        let ocr = ScriptedOcr::new().respond(1, 150, "102 1BR scanned", 0.8);
        let pages = loader(Some(Arc::new(ocr))).load_pages(source).await;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].method, ExtractionMethod::Direct);
        assert_eq!(pages[0].text, DENSE);
        assert_eq!(pages[1].method, ExtractionMethod::Ocr);
        assert_eq!(pages[1].text, "102 1BR scanned");
    }

    #[tokio::test]
    async fn results_are_ordered_by_page_index() {
        let texts: Vec<String> = (0..12).map(|i| format!("{DENSE} page {i}")).collect();
        let source: Arc<dyn PageSource> = Arc::new(MemorySource::new(
            texts.iter().map(|t| (t.clone(), false)).collect(),
        ));
        let pages = loader(None).load_pages(source).await;
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.index, i);
            assert!(page.text.ends_with(&format!("page {i}")));
        }
    }

    #[tokio::test]
    async fn scanned_page_without_backend_is_errored() {
        let source: Arc<dyn PageSource> = Arc::new(MemorySource::scanned(1));
        let pages = loader(None).load_pages(source).await;
        assert!(pages[0].is_errored());
        assert!(pages[0].text.is_empty());
    }

    #[tokio::test]
    async fn one_bad_page_does_not_abort_the_rest() {
        let source: Arc<dyn PageSource> = Arc::new(
            MemorySource::new(vec![(DENSE.to_string(), false), (DENSE.to_string(), false)])
                .with_broken_text_layer(0),
        );
        let pages = loader(None).load_pages(source).await;
        assert!(pages[0].is_errored());
        assert!(!pages[1].is_errored());
        assert_eq!(pages[1].text, DENSE);
    }

    #[tokio::test]
    async fn loads_real_pdf_pages() {
        let bytes = PdfBuilder::new()
            .text_page(&[DENSE, "102 1BR 700 Doe, John $900.00"])
            .text_page(&["x"])
            .build();
        let source: Arc<dyn PageSource> = Arc::new(PdfReader::from_bytes(&bytes).unwrap());
        let pages = loader(None).load_pages(source).await;
        assert!(pages[0].text.contains("Smith, Jane"));
        assert!(pages[0].text.contains("Doe, John"));
        // Sparse but readable: kept as direct text when OCR is unavailable.
        assert_eq!(pages[1].method, ExtractionMethod::Direct);
    }

    #[tokio::test]
    async fn ocr_timeouts_do_not_widen_the_worker_pool() {
        let mut script = ScriptedOcr::new();
        for page in 0..4 {
            script = script.respond_slowly(page, 150, "late", 0.9, Duration::from_millis(150));
        }
        let ocr = Arc::new(script);
        let config = PipelineConfig {
            page_ocr_timeout_ms: 20,
            max_workers: 1,
            ..Default::default()
        };
        let backend: Arc<dyn OcrBackend> = ocr.clone();
        let loader = DocumentLoader::new(&config, Some(backend), Arc::new(Semaphore::new(1)));

        let pages = loader.load_pages(Arc::new(MemorySource::scanned(4))).await;
        assert_eq!(pages.len(), 4);
        assert!(pages.iter().all(|p| p.is_errored()));
        assert_eq!(ocr.peak_concurrency(), 1);
    }

    #[test]
    fn density_ignores_whitespace() {
        assert_eq!(text_density("  a b\n\tc  "), 3);
        assert_eq!(text_density(""), 0);
    }
}
