//! Error types for the extraction pipeline

use thiserror::Error;

/// Errors raised by pipeline stages
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Input could not be decoded, had zero dimensions, or took too long to load
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// The OCR engine failed or returned nothing usable
    #[error("OCR engine failed: {0}")]
    OcrEngine(String),

    /// Word-level output was empty; recovered by text-only extraction
    #[error("no words extracted from OCR output")]
    NoWordsExtracted,

    /// PDF rasterization failed or produced no pages
    #[error("PDF conversion failed: {0}")]
    PdfConversion(String),

    /// The caller cancelled the run while an external call was in flight
    #[error("extraction cancelled")]
    Cancelled,
}

impl ExtractionError {
    /// Whether this error aborts the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExtractionError::NoWordsExtracted)
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
