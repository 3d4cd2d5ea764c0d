//! Application Configuration
//!
//! Extraction settings stored in TOML format. Every section falls back to its
//! defaults, so a config file only needs the values it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Optional JSON file replacing the built-in form-type profiles
    pub profiles_path: Option<PathBuf>,
    /// General settings
    pub general: GeneralConfig,
    /// Image preprocessing settings
    pub preprocess: PreprocessSettings,
    /// OCR engine settings
    pub ocr: OcrSettings,
    /// PDF rasterization settings
    pub pdf: PdfSettings,
    /// Word grouping and pairing settings
    pub spatial: SpatialSettings,
    /// Confidence scoring constants
    pub scoring: ScoringConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Maximum time to spend decoding an input image, in seconds
    pub decode_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            decode_timeout_secs: 10,
        }
    }
}

/// Image preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Run the preprocessing filters at all
    pub enabled: bool,
    /// Dimension the larger image side is scaled towards
    pub target_dimension: u32,
    /// Upper bound on the scale factor
    pub max_scale: f32,
    /// Steepness of the sigmoid contrast curve
    pub contrast_steepness: f32,
    /// Pixels with fewer dark pixels in their 3x3 neighbourhood are whitened
    pub despeckle_min_dark: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target_dimension: 3000,
            max_scale: 3.0,
            // 10 * 1.5: a gentle curve that keeps thin rule lines
            contrast_steepness: 15.0,
            despeckle_min_dark: 3,
        }
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract executable
    pub tesseract_path: PathBuf,
    /// Recognition language code
    pub language: String,
    /// Tesseract page segmentation mode
    pub page_segmentation_mode: Option<u32>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: None,
        }
    }
}

/// PDF rasterization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSettings {
    /// pdftoppm executable
    pub pdftoppm_path: PathBuf,
    /// Render scale relative to 72 dpi
    pub scale: f32,
    /// Number of pages to render; `None` renders all
    pub max_pages: Option<u32>,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            scale: 2.0,
            max_pages: Some(1),
        }
    }
}

/// Word grouping and pairing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialSettings {
    /// Vertical bucket size used to group words into lines
    pub line_bucket: u32,
    /// Shortest accepted paired label
    pub min_label_len: usize,
    /// Longest accepted paired label
    pub max_label_len: usize,
}

impl Default for SpatialSettings {
    fn default() -> Self {
        Self {
            line_bucket: 20,
            min_label_len: 3,
            max_label_len: 99,
        }
    }
}

/// Confidence scoring constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Base confidence when no per-word OCR confidence is available
    pub fallback_confidence: f32,
    /// Bonus for a placeholder found in plain text
    pub text_pairing_bonus: f32,
    /// Bonus for a placeholder found from word positions
    pub spatial_pairing_bonus: f32,
    /// Bonus for matching the generic form keyword list
    pub generic_keyword_bonus: f32,
    /// Bonus for containing a colon
    pub colon_bonus: f32,
    /// Bonus for a length strictly between 10 and 80
    pub length_bonus: f32,
    /// Bonus for starting with an uppercase letter
    pub uppercase_bonus: f32,
    /// Bonus for passing the final validation pass
    pub validation_bonus: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            fallback_confidence: 50.0,
            text_pairing_bonus: 25.0,
            spatial_pairing_bonus: 30.0,
            generic_keyword_bonus: 15.0,
            colon_bonus: 10.0,
            length_bonus: 5.0,
            uppercase_bonus: 5.0,
            validation_bonus: 10.0,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("Invalid config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
