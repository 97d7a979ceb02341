// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction pipeline.
//
// process(path):
//   open (fatal on failure) -> acquire pages concurrently -> scan fields per
//   page concurrently -> barrier -> assemble units -> aggregate -> Document
//
// Every stage after opening recovers its own failures, so any openable file
// yields a Document. Page work from all documents in flight shares one
// bounded worker pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rentroll_core::config::PipelineConfig;
use rentroll_core::error::{RentrollError, Result};
use rentroll_core::types::{Document, ExtractionMethod, Page, PageSummary};
use rentroll_document::{DocumentLoader, LoadedDocument, OcrBackend};
use rentroll_extract::{DocumentAggregator, ExtractorRegistry, FieldScan, UnitAssembler};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Cheaply cloneable handle; clones share the worker pool and extractors.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    loader: DocumentLoader,
    registry: Arc<ExtractorRegistry>,
    workers: Arc<Semaphore>,
}

impl Pipeline {
    /// A pipeline without OCR: pages lacking a usable text layer come back
    /// errored.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// A pipeline that reads sparse or scanned pages through `backend`.
    pub fn with_ocr_backend(config: PipelineConfig, backend: Arc<dyn OcrBackend>) -> Result<Self> {
        Self::build(config, Some(backend))
    }

    /// A pipeline using the bundled `ocrs` engine with models from `model_dir`.
    #[cfg(feature = "ocr")]
    pub fn with_ocr_models(config: PipelineConfig, model_dir: impl AsRef<Path>) -> Result<Self> {
        let engine = rentroll_document::OcrEngine::from_model_dir(model_dir)?;
        Self::with_ocr_backend(config, Arc::new(engine))
    }

    fn build(config: PipelineConfig, backend: Option<Arc<dyn OcrBackend>>) -> Result<Self> {
        config.validate()?;
        let workers = Arc::new(Semaphore::new(config.effective_workers()));
        info!(
            workers = config.effective_workers(),
            ocr = backend.is_some(),
            ladder = ?config.ocr_resolutions,
            "Pipeline ready"
        );
        Ok(Self {
            loader: DocumentLoader::new(&config, backend, Arc::clone(&workers)),
            config: Arc::new(config),
            registry: Arc::new(ExtractorRegistry::standard()),
            workers,
        })
    }

    /// Replace the standard extractor set.
    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // -- Processing -------------------------------------------------------------

    /// Extract one PDF. Fails only when the file cannot be opened as a PDF.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn process(&self, path: impl AsRef<Path>) -> Result<Document> {
        let loaded = self.loader.open(path).await?;
        Ok(self.process_loaded(loaded).await)
    }

    /// Extract several PDFs concurrently. Results keep the input order and
    /// fail independently.
    #[instrument(skip_all, fields(documents = paths.len()))]
    pub async fn process_many(&self, paths: &[PathBuf]) -> Vec<Result<Document>> {
        let mut tasks = JoinSet::new();
        for (index, path) in paths.iter().enumerate() {
            let pipeline = self.clone();
            let path = path.clone();
            tasks.spawn(async move { (index, pipeline.process(path).await) });
        }

        let mut slots: Vec<Option<Result<Document>>> = (0..paths.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => warn!(error = %err, "Document task panicked"),
            }
        }

        slots
            .into_iter()
            .zip(paths)
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| {
                    Err(RentrollError::DocumentOpen {
                        path: path.display().to_string(),
                        reason: "processing task panicked".into(),
                    })
                })
            })
            .collect()
    }

    /// Run every stage after opening. Never fails; problems are recorded on
    /// pages and in the extraction metadata.
    #[instrument(skip_all, fields(id = %document.id))]
    pub async fn process_loaded(&self, document: LoadedDocument) -> Document {
        let pages = self.loader.load_pages(Arc::clone(&document.source)).await;
        let scan = self.scan_pages(&pages).await;

        let assembly = UnitAssembler::assemble(&scan.candidates, &scan.unparsed);
        let summary = DocumentAggregator::summarize(&assembly.units);

        let mut metadata = summary.metadata;
        metadata.discarded_candidates = assembly.discarded;
        metadata.pages = PageSummary::from_pages(&pages);

        info!(
            units = summary.total_units,
            occupied = summary.occupied_units,
            total_rent = %summary.total_rent,
            errored_pages = metadata.pages.errored,
            "Document extracted"
        );

        Document {
            id: document.id,
            file_name: document.file_name,
            file_path: document.file_path,
            is_scanned: pages.iter().any(|p| p.method == ExtractionMethod::Ocr),
            pages,
            units: assembly.units,
            total_units: summary.total_units,
            occupied_units: summary.occupied_units,
            vacant_units: summary.vacant_units,
            total_rent: summary.total_rent,
            total_area: summary.total_area,
            extraction_metadata: metadata,
            processed_at: Utc::now(),
        }
    }

    /// Scan every page on the worker pool and merge the results in page
    /// order once all pages are done.
    async fn scan_pages(&self, pages: &[Page]) -> FieldScan {
        let mut tasks = JoinSet::new();
        for page in pages {
            let page = page.clone();
            let registry = Arc::clone(&self.registry);
            let workers = Arc::clone(&self.workers);
            tasks.spawn(async move {
                let _permit = workers.acquire_owned().await.ok();
                let index = page.index;
                let scan = tokio::task::spawn_blocking(move || registry.scan_page(&page)).await;
                (index, scan)
            });
        }

        let mut per_page: Vec<Option<FieldScan>> = vec![None; pages.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(scan))) => {
                    if let Some(slot) = per_page.get_mut(index) {
                        *slot = Some(scan);
                    }
                }
                Ok((index, Err(err))) => warn!(page = index, error = %err, "Field scan failed"),
                Err(err) => warn!(error = %err, "Field scan task panicked"),
            }
        }

        let mut merged = FieldScan::default();
        for scan in per_page.into_iter().flatten() {
            merged.extend(scan);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rentroll_core::types::{DocumentId, FieldName, Money, OcrOutcome};
    use rentroll_document::PageSource;
    use rentroll_document::fixtures::{MemorySource, ScriptedOcr, text_pdf};

    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            text_density_threshold: 10,
            max_workers: 2,
            ..Default::default()
        }
    }

    fn loaded(source: impl PageSource + 'static) -> LoadedDocument {
        LoadedDocument {
            id: DocumentId("test".into()),
            file_name: "roll.pdf".into(),
            file_path: "/tmp/roll.pdf".into(),
            source: Arc::new(source),
        }
    }

    const HEADER: &str = "Unit Type SqFt Tenant Rent Total Lease Start Lease End Move In Move Out";
    const ROW_101: &str =
        "101 2BR 950 Smith, Jane $1,200.00 $1,250.00 01/01/2024 12/31/2024 01/01/2024 12/31/2024";
    const ROW_102: &str =
        "102 1BR 700 Doe, John $950.00 $1,000.00 02/01/2024 01/31/2025 02/01/2024 01/31/2025";
    const ROW_103: &str =
        "103 3BR 1200 Lee, Ann $1,600.00 $1,650.00 03/01/2024 02/28/2025 03/01/2024 02/28/2025";

    fn three_unit_text() -> String {
        ["Rent Roll - Sunset Apartments", HEADER, ROW_101, ROW_102, ROW_103].join("\n")
    }

    #[tokio::test]
    async fn three_unit_rent_roll() {
        init_tracing();
        let pipeline = Pipeline::new(config()).unwrap();
        let text = three_unit_text();
        let doc = pipeline
            .process_loaded(loaded(MemorySource::text(&[text.as_str()])))
            .await;

        assert_eq!(doc.total_units, 3);
        assert_eq!(doc.occupied_units, 3);
        assert_eq!(doc.vacant_units, 0);
        assert_eq!(doc.total_rent, Money::from_cents(120_000 + 95_000 + 160_000));
        assert_eq!(doc.total_area, 950.0 + 700.0 + 1200.0);
        assert!(!doc.is_scanned);

        let numbers: Vec<&str> = doc.units.iter().map(|u| u.unit_number.as_str()).collect();
        assert_eq!(numbers, vec!["101", "102", "103"]);
        for field in FieldName::ALL {
            assert_eq!(
                doc.extraction_metadata.per_field_coverage[&field], 100.0,
                "coverage of {field}"
            );
        }
        assert_eq!(doc.extraction_metadata.discarded_candidates, 0);

        let jane = &doc.units[0];
        assert_eq!(jane.tenant_name.as_deref(), Some("Smith, Jane"));
        assert_eq!(jane.unit_type.as_deref(), Some("2BR"));
        assert_eq!(jane.total_amount, Some(Money::from_cents(125_000)));
        assert_eq!(jane.lease_end.map(|d| d.to_string()), Some("2024-12-31".into()));
    }

    #[tokio::test]
    async fn suite_address_in_header_is_not_a_unit() {
        let text = [
            "Property: Sunset Apartments, 500 Main Street Suite 100, Austin TX",
            HEADER,
            ROW_101,
            ROW_102,
        ]
        .join("\n");
        let pipeline = Pipeline::new(config()).unwrap();
        let doc = pipeline
            .process_loaded(loaded(MemorySource::text(&[text.as_str()])))
            .await;

        let numbers: Vec<&str> = doc.units.iter().map(|u| u.unit_number.as_str()).collect();
        assert_eq!(numbers, vec!["101", "102"]);
        assert_eq!(doc.total_units, 2);
        assert_eq!(doc.extraction_metadata.discarded_candidates, 1);
    }

    #[tokio::test]
    async fn row_split_by_page_break_stays_with_its_unit() {
        let first = [HEADER, ROW_101, "102 1BR 700 Doe, John"].join("\n");
        let second = ["Rent: $950.00", ROW_103].join("\n");
        let pipeline = Pipeline::new(config()).unwrap();
        let doc = pipeline
            .process_loaded(loaded(MemorySource::text(&[first.as_str(), second.as_str()])))
            .await;

        assert_eq!(doc.total_units, 3);
        assert_eq!(doc.extraction_metadata.discarded_candidates, 0);
        let doe = &doc.units[1];
        assert_eq!(doe.unit_number, "102");
        assert_eq!(doe.tenant_name.as_deref(), Some("Doe, John"));
        assert_eq!(doe.rent, Some(Money::from_cents(95_000)));
        assert!(doe.provenance[&FieldName::Rent].pattern.ends_with("+carried"));
    }

    #[tokio::test]
    async fn scanned_page_escalates_resolution() {
        let ocr = ScriptedOcr::new()
            .respond(0, 150, "1O1 blurry", 0.4)
            .respond(0, 200, ROW_101, 0.75);
        let pipeline = Pipeline::with_ocr_backend(config(), Arc::new(ocr)).unwrap();
        let doc = pipeline.process_loaded(loaded(MemorySource::scanned(1))).await;

        assert!(doc.is_scanned);
        let info = doc.pages[0].ocr.as_ref().unwrap();
        assert_eq!(info.resolution, Some(200));
        assert_eq!(info.outcome, OcrOutcome::Accepted);
        assert_eq!(doc.pages[0].text, ROW_101);

        assert_eq!(doc.total_units, 1);
        let unit = &doc.units[0];
        assert_eq!(unit.unit_number, "101");
        assert_eq!(unit.rent, Some(Money::from_cents(120_000)));
        assert_eq!(unit.provenance[&FieldName::Rent].method, ExtractionMethod::Ocr);
        assert_eq!(doc.extraction_metadata.pages.ocr, 1);
    }

    #[tokio::test]
    async fn unparsable_move_out_is_unparsed_not_absent() {
        let row = "101 2BR 950 Smith, Jane $1,200.00 $1,250.00 \
                   01/01/2024 12/31/2024 01/01/2024 02/30/2024";
        let pipeline = Pipeline::new(config()).unwrap();
        let doc = pipeline.process_loaded(loaded(MemorySource::text(&[row]))).await;

        let unit = &doc.units[0];
        assert_eq!(unit.move_out_date, None);
        assert!(unit.move_in_date.is_some());
        assert!(unit.rent.is_some());
        assert!(unit.unparsed_fields.contains(&FieldName::MoveOutDate));

        let meta = &doc.extraction_metadata;
        assert_eq!(meta.per_field_unparsed[&FieldName::MoveOutDate], 1);
        assert_eq!(meta.per_field_absent[&FieldName::MoveOutDate], 0);
        assert_eq!(meta.per_field_coverage[&FieldName::MoveOutDate], 0.0);
        assert!(doc.pages.iter().all(|p| !p.is_errored()));
    }

    #[tokio::test]
    async fn repeated_unit_across_pages_is_counted_once() {
        let short = "101 2BR 950 Smith, Jane $1,200.00 $1,250.00";
        let pipeline = Pipeline::new(config()).unwrap();
        let doc = pipeline
            .process_loaded(loaded(MemorySource::text(&[short, short])))
            .await;

        assert_eq!(doc.total_units, 1);
        assert_eq!(doc.total_rent, Money::from_cents(120_000));
        assert_eq!(doc.pages.len(), 2);
    }

    #[tokio::test]
    async fn errored_pages_do_not_abort_the_document() {
        let pipeline = Pipeline::new(config()).unwrap();
        let source = MemorySource::new(vec![
            (ROW_101.to_string(), false),
            (String::new(), true),
        ]);
        let doc = pipeline.process_loaded(loaded(source)).await;

        assert_eq!(doc.total_units, 1);
        assert!(doc.pages[1].is_errored());
        assert_eq!(doc.extraction_metadata.pages.errored, 1);
    }

    #[tokio::test]
    async fn processing_a_pdf_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roll.pdf");
        std::fs::write(&path, text_pdf(&[&[HEADER, ROW_101, ROW_102, ROW_103]])).unwrap();

        let pipeline = Pipeline::new(config()).unwrap();
        let first = pipeline.process(&path).await.unwrap();
        let mut second = pipeline.process(&path).await.unwrap();
        second.processed_at = first.processed_at;

        assert_eq!(first, second);
        assert_eq!(first.total_units, 3);
        assert_eq!(first.file_name, "roll.pdf");
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn unreadable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let err = Pipeline::new(config()).unwrap().process(&path).await.unwrap_err();
        assert!(matches!(err, RentrollError::DocumentOpen { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn process_many_keeps_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.pdf");
        let second = dir.path().join("c.pdf");
        std::fs::write(&first, text_pdf(&[&[ROW_101]])).unwrap();
        std::fs::write(&second, text_pdf(&[&[ROW_102, ROW_103]])).unwrap();
        let paths = vec![first, dir.path().join("missing.pdf"), second];

        let results = Pipeline::new(config()).unwrap().process_many(&paths).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().total_units, 1);
        assert!(matches!(results[1], Err(RentrollError::DocumentOpen { .. })));
        assert_eq!(results[2].as_ref().unwrap().total_units, 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            ocr_resolutions: vec![300, 150],
            ..Default::default()
        };
        assert!(matches!(Pipeline::new(config), Err(RentrollError::Config(_))));
    }

    #[tokio::test]
    async fn resolution_branches_are_reported() {
        let text = format!("{ROW_101}\nRent: $1,300.00");
        let pipeline = Pipeline::new(config()).unwrap();
        let doc = pipeline
            .process_loaded(loaded(MemorySource::text(&[text.as_str()])))
            .await;

        assert_eq!(doc.units[0].rent, Some(Money::from_cents(130_000)));
        let branches: &BTreeMap<_, _> =
            &doc.extraction_metadata.resolution_branches[&FieldName::Rent];
        assert_eq!(branches.values().sum::<usize>(), 1);
        assert!(branches.contains_key(&rentroll_core::types::ResolutionBranch::Confidence));
    }
}
