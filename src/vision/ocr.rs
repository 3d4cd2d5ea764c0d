//! OCR (Optical Character Recognition) module
//!
//! The recognizer is an external collaborator behind the [`OcrEngine`] trait:
//! it takes a binarized page and returns text, an overall confidence, and
//! optionally a per-word table with positions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::BoundingBox;
use crate::document::RasterImage;
use crate::error::Result;

/// Single recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedWord {
    /// Recognized text, never empty
    pub text: String,
    /// Position on the page that was recognized
    pub bbox: BoundingBox,
    /// Recognition confidence (0-100)
    pub confidence: f32,
    /// Line index assigned by the engine
    pub line_index: usize,
}

impl RecognizedWord {
    pub fn new(text: impl Into<String>, bbox: BoundingBox, confidence: f32, line_index: usize) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
            line_index,
        }
    }
}

/// Everything the engine returned for one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    /// Plain text, lines separated by newlines
    pub text: String,
    /// Overall confidence (0-100)
    pub confidence: f32,
    /// Per-word table, when the engine provides one
    pub words: Option<Vec<RecognizedWord>>,
}

impl OcrOutput {
    /// Number of words in the per-word table
    pub fn word_count(&self) -> usize {
        self.words.as_ref().map_or(0, Vec::len)
    }

    /// True when neither text nor words were recognized
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.word_count() == 0
    }
}

/// Text recognizer
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Recognize one page in the given language
    async fn recognize(&self, image: &RasterImage, language: &str) -> Result<OcrOutput>;
}
