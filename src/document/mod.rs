//! Document Input Layer
//!
//! Turns an uploaded document (image file, PDF, or base64 data URL) into the
//! single raster page the pipeline works on.

pub mod page;
pub mod pdf;

pub use page::RasterImage;
pub use pdf::{is_pdf, PdfRasterizer, PdftoppmRasterizer};

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, Result};

/// Where a document comes from
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file on disk
    Path(PathBuf),
    /// Raw bytes, with an optional original file name for type detection
    Bytes {
        bytes: Vec<u8>,
        name: Option<PathBuf>,
    },
}

/// Kind of document that was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
}

/// The page selected for extraction
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// First page of the document
    pub page: RasterImage,
    /// Number of pages the source produced
    pub page_count: usize,
    /// Source kind
    pub kind: DocumentKind,
}

/// Decode a `data:<mime>;base64,<payload>` URL, or a bare base64 payload
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let url = url.trim();
    let payload = match url.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| ExtractionError::ImageDecode("data URL has no payload".into()))?;
            if !header.ends_with(";base64") {
                return Err(ExtractionError::ImageDecode(
                    "only base64 data URLs are supported".into(),
                ));
            }
            payload
        }
        None => url,
    };

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ExtractionError::ImageDecode(format!("invalid base64 payload: {}", e)))
}

/// Decode image bytes off the async runtime, bounded by `timeout`
pub async fn decode_image(bytes: Vec<u8>, timeout: Duration) -> Result<RasterImage> {
    let task = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes));

    let decoded = tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| ExtractionError::ImageDecode(format!("image load timed out after {:?}", timeout)))?
        .map_err(|e| ExtractionError::ImageDecode(format!("decode task failed: {}", e)))?
        .map_err(|e| ExtractionError::ImageDecode(e.to_string()))?;

    let image = RasterImage::from_dynamic(decoded);
    if image.is_empty() {
        return Err(ExtractionError::ImageDecode("invalid image dimensions".into()));
    }
    Ok(image)
}

/// Load a document and select its first page
pub async fn load_document(
    source: &DocumentSource,
    rasterizer: &dyn PdfRasterizer,
    decode_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<LoadedDocument> {
    let (mut bytes, name): (Vec<u8>, Option<&Path>) = match source {
        DocumentSource::Path(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| ExtractionError::ImageDecode(format!("failed to read {:?}: {}", path, e)))?;
            (bytes, Some(path.as_path()))
        }
        DocumentSource::Bytes { bytes, name } => (bytes.clone(), name.as_deref()),
    };

    if bytes.starts_with(b"data:") {
        debug!("Input is a data URL");
        let text = String::from_utf8_lossy(&bytes).into_owned();
        bytes = decode_data_url(&text)?;
    }

    if bytes.is_empty() {
        return Err(ExtractionError::ImageDecode("empty input".into()));
    }

    if is_pdf(&bytes, name) {
        info!("Rasterizing PDF input");
        let pages = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractionError::Cancelled),
            pages = rasterizer.render_pages(&bytes) => pages?,
        };
        let page_count = pages.len();
        let page = pages
            .into_iter()
            .next()
            .ok_or_else(|| ExtractionError::PdfConversion("no pages found in PDF".into()))?;
        if page_count > 1 {
            warn!("PDF has {} pages; only the first page is extracted", page_count);
        }
        if page.is_empty() {
            return Err(ExtractionError::ImageDecode("rendered page has zero dimensions".into()));
        }
        return Ok(LoadedDocument {
            page,
            page_count,
            kind: DocumentKind::Pdf,
        });
    }

    let page = decode_image(bytes, decode_timeout).await?;
    Ok(LoadedDocument {
        page,
        page_count: 1,
        kind: DocumentKind::Image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoPages;

    #[async_trait]
    impl PdfRasterizer for NoPages {
        async fn render_pages(&self, _pdf: &[u8]) -> Result<Vec<RasterImage>> {
            Err(ExtractionError::PdfConversion("rasterization produced zero pages".into()))
        }
    }

    struct TwoPages;

    #[async_trait]
    impl PdfRasterizer for TwoPages {
        async fn render_pages(&self, _pdf: &[u8]) -> Result<Vec<RasterImage>> {
            Ok(vec![
                RasterImage::filled(4, 3, [255; 4]),
                RasterImage::filled(8, 8, [0, 0, 0, 255]),
            ])
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        RasterImage::filled(width, height, [200, 200, 200, 255])
            .encode_png()
            .unwrap()
    }

    #[test]
    fn test_decode_data_url() {
        let url = "data:text/plain;base64,aGVsbG8=";
        assert_eq!(decode_data_url(url).unwrap(), b"hello");
        // Bare payloads are accepted too
        assert_eq!(decode_data_url("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_data_url_rejects_non_base64() {
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[tokio::test]
    async fn test_load_png_bytes() {
        let source = DocumentSource::Bytes {
            bytes: png_bytes(5, 7),
            name: None,
        };
        let doc = load_document(&source, &NoPages, Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(doc.kind, DocumentKind::Image);
        assert_eq!(doc.page.dimensions(), (5, 7));
        assert_eq!(doc.page_count, 1);
    }

    #[tokio::test]
    async fn test_load_data_url_bytes() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(2, 2));
        let source = DocumentSource::Bytes {
            bytes: format!("data:image/png;base64,{}", encoded).into_bytes(),
            name: None,
        };
        let doc = load_document(&source, &NoPages, Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(doc.page.dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn test_corrupt_image_is_decode_error() {
        let source = DocumentSource::Bytes {
            bytes: b"definitely not an image".to_vec(),
            name: None,
        };
        let err = load_document(&source, &NoPages, Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ImageDecode(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_decode_error() {
        let source = DocumentSource::Path(PathBuf::from("/nonexistent/form.png"));
        let err = load_document(&source, &NoPages, Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ImageDecode(_)));
    }

    #[tokio::test]
    async fn test_pdf_with_zero_pages_fails() {
        let source = DocumentSource::Bytes {
            bytes: b"%PDF-1.4 empty".to_vec(),
            name: None,
        };
        let err = load_document(&source, &NoPages, Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::PdfConversion(_)));
    }

    #[tokio::test]
    async fn test_pdf_uses_first_page() {
        let source = DocumentSource::Bytes {
            bytes: b"%PDF-1.4 two pages".to_vec(),
            name: None,
        };
        let doc = load_document(&source, &TwoPages, Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(doc.kind, DocumentKind::Pdf);
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.page.dimensions(), (4, 3));
    }

    #[tokio::test]
    async fn test_cancelled_before_rasterization() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let source = DocumentSource::Bytes {
            bytes: b"%PDF-1.4".to_vec(),
            name: None,
        };
        let err = load_document(&source, &TwoPages, Duration::from_secs(10), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Cancelled));
    }
}
