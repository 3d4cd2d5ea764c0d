//! Tesseract OCR backend
//!
//! Runs the `tesseract` command-line tool in TSV mode and turns its word rows
//! into an [`OcrOutput`].

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::ocr::{OcrEngine, OcrOutput, RecognizedWord};
use super::BoundingBox;
use crate::config::OcrSettings;
use crate::document::RasterImage;
use crate::error::{ExtractionError, Result};

/// TSV level of word rows
const WORD_LEVEL: u32 = 5;

/// Tesseract engine wrapper
pub struct TesseractOcr {
    binary: PathBuf,
    page_segmentation_mode: Option<u32>,
}

impl TesseractOcr {
    /// Create an engine from settings
    pub fn new(settings: &OcrSettings) -> Self {
        info!("Using tesseract OCR at {:?}", settings.tesseract_path);
        Self {
            binary: settings.tesseract_path.clone(),
            page_segmentation_mode: settings.page_segmentation_mode,
        }
    }

    async fn run_tsv(&self, image: &RasterImage, language: &str) -> Result<String> {
        let png = image
            .encode_png()
            .map_err(|e| ExtractionError::OcrEngine(format!("encode page: {:#}", e)))?;

        let temp_dir = tempfile::tempdir()
            .map_err(|e| ExtractionError::OcrEngine(format!("temp dir: {}", e)))?;
        let image_path = temp_dir.path().join("page.png");
        tokio::fs::write(&image_path, png)
            .await
            .map_err(|e| ExtractionError::OcrEngine(format!("write page: {}", e)))?;

        let mut command = Command::new(&self.binary);
        command.arg(&image_path).arg("stdout").arg("-l").arg(language);
        if let Some(psm) = self.page_segmentation_mode {
            command.arg("--psm").arg(psm.to_string());
        }
        command.arg("tsv").kill_on_drop(true);

        debug!("Running {:?} on {}x{} page", self.binary, image.width, image.height);
        let output = command.output().await.map_err(|e| {
            ExtractionError::OcrEngine(format!("failed to run {:?} (is it installed?): {}", self.binary, e))
        })?;

        if !output.status.success() {
            return Err(ExtractionError::OcrEngine(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &RasterImage, language: &str) -> Result<OcrOutput> {
        if image.is_empty() {
            return Err(ExtractionError::OcrEngine("empty page".into()));
        }
        let tsv = self.run_tsv(image, language).await?;
        let output = parse_tsv(&tsv);
        debug!(
            "Tesseract: {} words, confidence {:.1}",
            output.word_count(),
            output.confidence
        );
        Ok(output)
    }
}

/// Parse tesseract TSV output into text, words, and mean confidence
///
/// Rows with negative confidence or blank text are skipped. Words sharing a
/// (page, block, paragraph, line) key form one text line, in order of first
/// appearance.
pub fn parse_tsv(tsv: &str) -> OcrOutput {
    let mut line_keys: Vec<(u32, u32, u32, u32)> = Vec::new();
    let mut line_texts: Vec<Vec<String>> = Vec::new();
    let mut words = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = cols[0].parse().unwrap_or(0);
        if level != WORD_LEVEL {
            continue;
        }
        let confidence: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || confidence < 0.0 {
            continue;
        }

        let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        let key = (num(1), num(2), num(3), num(4));
        let line_index = match line_keys.iter().position(|k| *k == key) {
            Some(idx) => idx,
            None => {
                line_keys.push(key);
                line_texts.push(Vec::new());
                line_keys.len() - 1
            }
        };
        line_texts[line_index].push(text.to_string());

        words.push(RecognizedWord::new(
            text,
            BoundingBox::new(num(6), num(7), num(8), num(9)),
            confidence.min(100.0),
            line_index,
        ));
    }

    let text = line_texts
        .iter()
        .map(|line| line.join(" "))
        .collect::<Vec<_>>()
        .join("\n");
    let confidence = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
    };

    OcrOutput {
        text,
        confidence,
        words: Some(words),
    }
}
