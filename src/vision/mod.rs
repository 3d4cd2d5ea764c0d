//! Vision/OCR Layer
//!
//! Prepares page images for recognition, talks to the OCR engine, and
//! reconstructs visual lines from word positions.

pub mod annotate;
pub mod ocr;
pub mod ocr_preprocess;
pub mod spatial;
pub mod tesseract;

pub use ocr::OcrEngine;
pub use ocr_preprocess::preprocess_for_ocr;
pub use spatial::{SpatialLayout, SpatialLocator};
pub use tesseract::TesseractOcr;

use serde::{Deserialize, Serialize};

/// Axis-aligned box in page pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BoundingBox {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}
