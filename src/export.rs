//! Export formats for extraction results

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::pipeline::ExtractionResult;

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// One `label [Confidence: NN.N%]` line per label
    Text,
    /// Labels with confidences and the raw OCR text
    Json,
    /// The complete result payload
    Full,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelExport<'a> {
    extracted_at: String,
    total_labels: usize,
    labels: Vec<LabelEntry<'a>>,
    #[serde(rename = "rawOCRText")]
    raw_ocr_text: &'a str,
}

#[derive(Serialize)]
struct LabelEntry<'a> {
    label: &'a str,
    confidence: f32,
}

/// Plain-text export
pub fn to_text(result: &ExtractionResult) -> String {
    result
        .labels
        .iter()
        .map(|label| {
            let confidence = result.confidence_by_label.get(label).copied().unwrap_or(0.0);
            format!("{} [Confidence: {:.1}%]", label, confidence)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON export stamped with the given time
pub fn to_json_at(result: &ExtractionResult, extracted_at: DateTime<Utc>) -> Result<String> {
    let export = LabelExport {
        extracted_at: extracted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        total_labels: result.labels.len(),
        labels: result
            .labels
            .iter()
            .map(|label| LabelEntry {
                label,
                confidence: result.confidence_by_label.get(label).copied().unwrap_or(0.0),
            })
            .collect(),
        raw_ocr_text: &result.raw_text,
    };
    serde_json::to_string_pretty(&export).context("Failed to serialize label export")
}

/// JSON export stamped with the current time
pub fn to_json(result: &ExtractionResult) -> Result<String> {
    to_json_at(result, Utc::now())
}

/// The whole payload as JSON
pub fn to_full_json(result: &ExtractionResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize extraction result")
}

/// Render a result in the chosen format
pub fn render(result: &ExtractionResult, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Text => Ok(to_text(result)),
        ExportFormat::Json => to_json(result),
        ExportFormat::Full => to_full_json(result),
    }
}
