//! Run results and failure reporting

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::analysis::{FormTypeSummary, LabelCandidate, LabelSet, SectionLayout, Stage};
use crate::document::RasterImage;
use crate::error::ExtractionError;
use crate::vision::SpatialLayout;

/// How labels were found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionMode {
    /// Word positions from the OCR engine
    Spatial,
    /// Plain text only, at the fallback base confidence
    TextFallback,
}

/// Payload returned to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub run_id: String,
    /// Distinct labels in discovery order
    pub labels: Vec<String>,
    pub confidence_by_label: IndexMap<String, f32>,
    /// Labels with their source lines and input areas
    pub label_details: Vec<LabelCandidate>,
    /// Stage list; frozen at the failing stage when the run aborted
    pub stages: Vec<Stage>,
    /// Full OCR text
    pub raw_text: String,
    /// Overall engine confidence
    pub ocr_confidence: Option<f32>,
    pub mode: Option<ExtractionMode>,
    pub form_type: Option<FormTypeSummary>,
    pub sections: SectionLayout,
}

impl ExtractionResult {
    /// Result of an aborted run: stages only, no labels
    pub fn failed(run_id: &str, stages: Vec<Stage>) -> Self {
        Self {
            run_id: run_id.to_string(),
            labels: Vec::new(),
            confidence_by_label: IndexMap::new(),
            label_details: Vec::new(),
            stages,
            raw_text: String::new(),
            ocr_confidence: None,
            mode: None,
            form_type: None,
            sections: SectionLayout::default(),
        }
    }

    /// Fill in the label fields from a validated set
    pub(crate) fn with_labels(mut self, labels: &LabelSet) -> Self {
        self.labels = labels.labels();
        self.confidence_by_label = labels.confidence_by_label();
        self.label_details = labels.iter().cloned().collect();
        self
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

/// A completed run with the artifacts needed for inspection output
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub result: ExtractionResult,
    /// Page exactly as it was sent to the OCR engine
    pub page: RasterImage,
    /// Visual lines and pairings, absent in text fallback mode
    pub layout: Option<SpatialLayout>,
}

/// A fatal run: the error plus the frozen stage list
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    #[source]
    pub error: ExtractionError,
    pub result: ExtractionResult,
}

impl PipelineFailure {
    /// The stage that failed, if any
    pub fn failed_stage(&self) -> Option<&Stage> {
        self.result
            .stages
            .iter()
            .find(|s| s.status == crate::analysis::StageStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StageStatus;

    #[test]
    fn test_failed_result_is_empty() {
        let mut stage = Stage::pending("Preprocessing");
        stage.status = StageStatus::Failed;
        let result = ExtractionResult::failed("run", vec![stage, Stage::pending("Layout Analysis")]);
        assert_eq!(result.label_count(), 0);
        assert!(result.form_type.is_none());

        let failure = PipelineFailure {
            error: ExtractionError::ImageDecode("bad header".into()),
            result,
        };
        assert_eq!(failure.to_string(), "image decode failed: bad header");
        assert_eq!(failure.failed_stage().map(|s| s.name.as_str()), Some("Preprocessing"));
    }

    #[test]
    fn test_payload_keys_are_camel_case() {
        let result = ExtractionResult::failed("run", Vec::new());
        let json = serde_json::to_value(&result).unwrap();
        for key in ["labels", "confidenceByLabel", "stages", "rawText", "formType", "sections"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json["sections"].get("lineGroups").is_some());
    }
}
