//! Extraction Pipeline
//!
//! Runs one document through Preprocess -> Detect (OCR) -> Classify -> Score
//! -> Layout, keeping the stage list current and emitting an event on every
//! stage transition. Each run owns its buffers; only the profile set is
//! shared between runs.

pub mod result;

pub use result::{ExtractionMode, ExtractionResult, ExtractionRun, PipelineFailure};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::labels::{spatial_candidate_lines, text_candidate_lines};
use crate::analysis::{
    analyze_layout, detect_form_type, validate_labels, EventEmitter, LabelExtractor, PipelineEvent,
    Stage, StageStatus,
};
use crate::config::AppConfig;
use crate::document::{load_document, DocumentKind, DocumentSource, PdfRasterizer, PdftoppmRasterizer};
use crate::error::{ExtractionError, Result};
use crate::storage::ProfileSet;
use crate::vision::{preprocess_for_ocr, OcrEngine, SpatialLocator, TesseractOcr};

/// Stage names in run order
pub const STAGE_NAMES: [&str; 5] = [
    "Preprocessing",
    "Spatial OCR Analysis",
    "Form Type Detection",
    "Confidence Scoring",
    "Layout Analysis",
];

const PREPROCESS: usize = 0;
const DETECT: usize = 1;
const CLASSIFY: usize = 2;
const SCORE: usize = 3;
const LAYOUT: usize = 4;

/// Stage list of a single run
struct StageTracker {
    run_id: String,
    stages: Vec<Stage>,
    current: Option<usize>,
    events: EventEmitter,
}

impl StageTracker {
    fn new(run_id: String, events: EventEmitter) -> Self {
        Self {
            run_id,
            stages: STAGE_NAMES.iter().map(|name| Stage::pending(name)).collect(),
            current: None,
            events,
        }
    }

    fn start(&mut self, index: usize, description: impl Into<String>) {
        self.current = Some(index);
        self.set(index, StageStatus::Processing, description.into());
    }

    fn complete(&mut self, index: usize, description: impl Into<String>) {
        self.current = None;
        self.set(index, StageStatus::Complete, description.into());
    }

    /// Mark the stage in progress as failed
    fn fail(&mut self, error: &ExtractionError) {
        if let Some(index) = self.current.take() {
            self.set(index, StageStatus::Failed, error.to_string());
        }
    }

    fn set(&mut self, index: usize, status: StageStatus, description: String) {
        let stage = &mut self.stages[index];
        stage.status = status;
        stage.description = description;
        debug!("Stage '{}' -> {:?}", stage.name, status);

        self.events.emit(PipelineEvent::StageChanged {
            run_id: self.run_id.clone(),
            index,
            stage: stage.clone(),
        });
    }
}

/// Form label extraction pipeline
pub struct FormLabelPipeline {
    config: AppConfig,
    profiles: Arc<ProfileSet>,
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PdfRasterizer>,
    events: EventEmitter,
}

impl FormLabelPipeline {
    /// Create a pipeline with explicit collaborators
    pub fn new(
        config: AppConfig,
        profiles: Arc<ProfileSet>,
        ocr: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn PdfRasterizer>,
    ) -> Self {
        Self {
            config,
            profiles,
            ocr,
            rasterizer,
            events: EventEmitter::new(),
        }
    }

    /// Create a pipeline backed by the Tesseract and pdftoppm command-line tools
    pub fn from_config(config: AppConfig, profiles: Arc<ProfileSet>) -> Self {
        let ocr = Arc::new(TesseractOcr::new(&config.ocr));
        let rasterizer = Arc::new(PdftoppmRasterizer::new(&config.pdf));
        Self::new(config, profiles, ocr, rasterizer)
    }

    /// Emitter that receives every stage transition
    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Extract labels from one document
    ///
    /// A fatal error returns the frozen stage list alongside the error; the
    /// failing stage is marked failed and later stages stay pending.
    pub async fn run(
        &self,
        source: &DocumentSource,
        cancel: &CancellationToken,
    ) -> std::result::Result<ExtractionRun, PipelineFailure> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("extract", run_id = %run_id);
        let mut tracker = StageTracker::new(run_id.clone(), self.events.clone());

        let outcome = self.execute(source, cancel, &mut tracker).instrument(span).await;

        match outcome {
            Ok(mut run) => {
                run.result.stages = tracker.stages;
                info!(run_id = %run_id, "Extraction finished with {} labels", run.result.label_count());
                self.events.emit(PipelineEvent::RunFinished {
                    run_id,
                    success: true,
                    label_count: run.result.label_count(),
                });
                Ok(run)
            }
            Err(error) => {
                tracker.fail(&error);
                warn!(run_id = %run_id, "Extraction failed: {}", error);
                self.events.emit(PipelineEvent::RunFinished {
                    run_id: run_id.clone(),
                    success: false,
                    label_count: 0,
                });
                Err(PipelineFailure {
                    error,
                    result: ExtractionResult::failed(&run_id, tracker.stages),
                })
            }
        }
    }

    async fn execute(
        &self,
        source: &DocumentSource,
        cancel: &CancellationToken,
        tracker: &mut StageTracker,
    ) -> Result<ExtractionRun> {
        // Preprocess
        tracker.start(PREPROCESS, "Loading document");
        let timeout = Duration::from_secs(self.config.general.decode_timeout_secs);
        let document = load_document(source, self.rasterizer.as_ref(), timeout, cancel).await?;
        let (width, height) = document.page.dimensions();
        let origin = match document.kind {
            DocumentKind::Pdf => format!("PDF page 1 of {}", document.page_count),
            DocumentKind::Image => "Image".to_string(),
        };

        let settings = self.config.preprocess.clone();
        let page = document.page;
        let prepared = tokio::task::spawn_blocking(move || preprocess_for_ocr(&page, &settings))
            .await
            .map_err(|e| ExtractionError::ImageDecode(format!("preprocess task failed: {}", e)))??;
        let description = match prepared.threshold {
            Some(t) => format!(
                "{} {}x{} binarized at threshold {} (scale {:.2})",
                origin, width, height, t, prepared.scale
            ),
            None => format!("{} {}x{}, preprocessing disabled", origin, width, height),
        };
        tracker.complete(PREPROCESS, description);

        // Detect
        tracker.start(DETECT, format!("Recognizing text with {}", self.ocr.name()));
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractionError::Cancelled),
            output = self.ocr.recognize(&prepared.image, &self.config.ocr.language) => output?,
        };
        if output.is_blank() {
            return Err(ExtractionError::OcrEngine("engine returned no text".into()));
        }

        let locator = SpatialLocator::new(&self.config.spatial);
        let words = output.words.as_deref().unwrap_or_default();
        let (mode, layout) = match locator.locate(words) {
            Ok(layout) => (ExtractionMode::Spatial, Some(layout)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("{}; falling back to text-only extraction", e);
                (ExtractionMode::TextFallback, None)
            }
        };

        let raw_text = match &layout {
            Some(layout) if output.text.trim().is_empty() => layout
                .lines
                .iter()
                .map(|line| line.text())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => output.text.clone(),
        };

        let candidates = match &layout {
            Some(layout) => spatial_candidate_lines(layout),
            None => text_candidate_lines(
                &raw_text,
                self.config.scoring.fallback_confidence,
                &self.config.spatial,
            ),
        };
        let description = match &layout {
            Some(layout) => format!(
                "{} words in {} lines, {} pairings, OCR confidence {:.1}%",
                output.word_count(),
                layout.lines.len(),
                layout.pairs.len(),
                output.confidence
            ),
            None => format!("Text-only extraction, OCR confidence {:.1}%", output.confidence),
        };
        tracker.complete(DETECT, description);

        // Classify
        tracker.start(CLASSIFY, "Matching form profiles");
        let classification = detect_form_type(&raw_text, &self.profiles);
        info!(
            "Form type: {} ({:.2})",
            classification.profile_name(),
            classification.confidence
        );
        tracker.complete(
            CLASSIFY,
            format!(
                "{} (confidence {:.1})",
                classification.profile_name(),
                classification.confidence
            ),
        );

        // Score
        tracker.start(SCORE, format!("Scoring {} candidate lines", candidates.len()));
        let extracted = LabelExtractor::new(&self.config.scoring, &classification).extract(&candidates);
        let accepted = extracted.len();
        let labels = validate_labels(extracted, self.config.scoring.validation_bonus);
        debug!("{} candidates accepted, {} passed validation", accepted, labels.len());
        if labels.is_empty() {
            warn!("No field labels passed validation");
        }
        tracker.complete(SCORE, format!("{} labels extracted", labels.len()));

        // Layout
        tracker.start(LAYOUT, "Detecting sections");
        let sections = analyze_layout(&raw_text);
        tracker.complete(LAYOUT, format!("{} sections detected", sections.names.len()));

        let result = ExtractionResult {
            raw_text,
            ocr_confidence: Some(output.confidence),
            mode: Some(mode),
            form_type: Some(classification.summary()),
            sections,
            ..ExtractionResult::failed(&tracker.run_id, Vec::new())
        }
        .with_labels(&labels);

        Ok(ExtractionRun {
            result,
            page: prepared.image,
            layout,
        })
    }
}
