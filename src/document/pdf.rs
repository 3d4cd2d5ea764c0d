//! PDF rasterization
//!
//! PDFs are rendered to raster pages by an external tool before preprocessing.
//! The default backend shells out to `pdftoppm` from poppler-utils.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::page::RasterImage;
use crate::config::PdfSettings;
use crate::error::{ExtractionError, Result};

/// Base resolution of a PDF user-space unit
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Check whether a document is a PDF by signature or file extension
pub fn is_pdf(bytes: &[u8], path: Option<&Path>) -> bool {
    if bytes.starts_with(b"%PDF") {
        return true;
    }
    path.and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Renders PDF pages to raster images
#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    /// Render pages in document order
    async fn render_pages(&self, pdf: &[u8]) -> Result<Vec<RasterImage>>;
}

/// Rasterizer backed by the `pdftoppm` command-line tool
pub struct PdftoppmRasterizer {
    binary: PathBuf,
    scale: f32,
    max_pages: Option<u32>,
}

impl PdftoppmRasterizer {
    /// Create a rasterizer from settings
    pub fn new(settings: &PdfSettings) -> Self {
        Self {
            binary: settings.pdftoppm_path.clone(),
            scale: settings.scale,
            max_pages: settings.max_pages,
        }
    }

    /// Render resolution for the configured upscale factor
    fn dpi(&self) -> u32 {
        (PDF_POINTS_PER_INCH * self.scale).round().max(1.0) as u32
    }
}

#[async_trait]
impl PdfRasterizer for PdftoppmRasterizer {
    async fn render_pages(&self, pdf: &[u8]) -> Result<Vec<RasterImage>> {
        let temp_dir = tempfile::tempdir()
            .map_err(|e| ExtractionError::PdfConversion(format!("temp dir: {}", e)))?;
        let pdf_path = temp_dir.path().join("input.pdf");
        tokio::fs::write(&pdf_path, pdf)
            .await
            .map_err(|e| ExtractionError::PdfConversion(format!("write input: {}", e)))?;

        let mut command = Command::new(&self.binary);
        command
            .arg("-png")
            .arg("-r")
            .arg(self.dpi().to_string())
            .arg("-f")
            .arg("1");
        if let Some(last) = self.max_pages {
            command.arg("-l").arg(last.to_string());
        }
        command
            .arg(&pdf_path)
            .arg(temp_dir.path().join("page"))
            .kill_on_drop(true);

        debug!("Running {:?} at {} dpi", self.binary, self.dpi());
        let output = command.output().await.map_err(|e| {
            ExtractionError::PdfConversion(format!(
                "failed to run {:?} (install poppler-utils): {}",
                self.binary, e
            ))
        })?;

        if !output.status.success() {
            return Err(ExtractionError::PdfConversion(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut page_paths = Vec::new();
        let mut entries = tokio::fs::read_dir(temp_dir.path())
            .await
            .map_err(|e| ExtractionError::PdfConversion(format!("read output: {}", e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ExtractionError::PdfConversion(format!("read output: {}", e)))?
        {
            let path = entry.path();
            let is_page = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("page") && n.ends_with(".png"))
                .unwrap_or(false);
            if is_page {
                page_paths.push(path);
            }
        }
        // pdftoppm zero-pads page numbers, so lexical order is page order
        page_paths.sort();

        let mut pages = Vec::with_capacity(page_paths.len());
        for path in &page_paths {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| ExtractionError::PdfConversion(format!("read page: {}", e)))?;
            let image = image::load_from_memory(&bytes)
                .map_err(|e| ExtractionError::PdfConversion(format!("decode page: {}", e)))?;
            pages.push(RasterImage::from_dynamic(image));
        }

        if pages.is_empty() {
            return Err(ExtractionError::PdfConversion(
                "rasterization produced zero pages".to_string(),
            ));
        }

        info!("Rendered {} PDF page(s)", pages.len());
        Ok(pages)
    }
}
