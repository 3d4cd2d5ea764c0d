//! Image preprocessing filters for OCR optimization
//!
//! Turns a photographed or scanned form into a clean black-and-white page:
//! upscale, grayscale, sigmoid contrast, 3x3 smoothing, Otsu binarization,
//! despeckle, and a morphological opening.
//!
//! Every filter reads from its input buffer and writes a new one, so each
//! stage is a pure function of the previous stage's output.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use tracing::debug;

use crate::config::PreprocessSettings;
use crate::document::RasterImage;
use crate::error::{ExtractionError, Result};

/// Gaussian-like smoothing kernel, row-major
const SMOOTHING_KERNEL: [u32; 9] = [1, 2, 1, 2, 4, 2, 1, 2, 1];
const SMOOTHING_KERNEL_SUM: u32 = 16;

/// Gray values below this count as ink
const DARK_LEVEL: u8 = 128;

/// Result of preprocessing that includes potentially resized dimensions
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Binarized page
    pub image: RasterImage,
    /// Scale factor applied before filtering
    pub scale: f32,
    /// Otsu threshold chosen for binarization
    pub threshold: Option<u8>,
}

/// Run the full preprocessing chain on a decoded page
pub fn preprocess_for_ocr(input: &RasterImage, settings: &PreprocessSettings) -> Result<PreprocessResult> {
    if input.is_empty() {
        return Err(ExtractionError::ImageDecode("invalid image dimensions".into()));
    }

    if !settings.enabled {
        debug!("OCR preprocessing disabled");
        return Ok(PreprocessResult {
            image: input.clone(),
            scale: 1.0,
            threshold: None,
        });
    }

    let scale = upscale_factor(input.width, input.height, settings.target_dimension, settings.max_scale);
    let scaled = apply_upscale(input, scale)?;
    debug!(
        "Preprocessing {}x{} -> {}x{} (scale {:.2})",
        input.width, input.height, scaled.width, scaled.height, scale
    );

    let gray = apply_grayscale(&scaled);
    let contrasted = apply_contrast(&gray, settings.contrast_steepness);
    let smoothed = apply_smoothing(&contrasted);

    let threshold = otsu_threshold(&luma_histogram(&smoothed));
    debug!("Otsu threshold: {}", threshold);
    let binary = apply_threshold(&smoothed, threshold);

    let despeckled = apply_despeckle(&binary, settings.despeckle_min_dark);
    let opened = apply_opening(&despeckled);

    Ok(PreprocessResult {
        image: opened,
        scale,
        threshold: Some(threshold),
    })
}

/// Scale that brings the page towards `target` without exceeding `max_scale`
///
/// Pages already larger than the target are scaled down.
pub fn upscale_factor(width: u32, height: u32, target: u32, max_scale: f32) -> f32 {
    let target = target as f32;
    (target / width as f32)
        .min(target / height as f32)
        .min(max_scale)
}

/// Resample with the image crate's bilinear filter
fn apply_upscale(image: &RasterImage, scale: f32) -> Result<RasterImage> {
    if (scale - 1.0).abs() < f32::EPSILON {
        return Ok(image.clone());
    }

    let new_width = ((image.width as f32 * scale) as u32).max(1);
    let new_height = ((image.height as f32 * scale) as u32).max(1);

    let buffer = image
        .to_rgba_image()
        .ok_or_else(|| ExtractionError::ImageDecode("pixel buffer does not match dimensions".into()))?;
    let resized = imageops::resize(&buffer, new_width, new_height, FilterType::Triangle);

    Ok(RasterImage {
        data: resized.into_raw(),
        width: new_width,
        height: new_height,
    })
}

/// Luma of an RGBA pixel
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Convert RGBA to grayscale (keeping RGBA format for compatibility)
fn apply_grayscale(image: &RasterImage) -> RasterImage {
    let mut result = image.clone();
    for chunk in result.data.chunks_exact_mut(4) {
        let gray = luma(chunk[0], chunk[1], chunk[2]);
        chunk[0] = gray;
        chunk[1] = gray;
        chunk[2] = gray;
        // Alpha unchanged
    }
    result
}

/// Stretch gray levels to the full range through a logistic curve
fn apply_contrast(image: &RasterImage, steepness: f32) -> RasterImage {
    let (min, max) = image
        .data
        .chunks_exact(4)
        .fold((255u8, 0u8), |(lo, hi), px| (lo.min(px[0]), hi.max(px[0])));
    let range = match max.saturating_sub(min) {
        0 => 1.0,
        r => r as f32,
    };

    let mut result = image.clone();
    for chunk in result.data.chunks_exact_mut(4) {
        let normalized = (chunk[0].saturating_sub(min)) as f32 / range;
        let enhanced = 255.0 / (1.0 + (-steepness * (normalized - 0.5)).exp());
        let value = enhanced.round().clamp(0.0, 255.0) as u8;
        chunk[0] = value;
        chunk[1] = value;
        chunk[2] = value;
    }
    result
}

/// 3x3 weighted smoothing of interior pixels; border pixels are copied
fn apply_smoothing(image: &RasterImage) -> RasterImage {
    let mut result = image.clone();
    if image.width < 3 || image.height < 3 {
        return result;
    }

    for y in 1..image.height - 1 {
        for x in 1..image.width - 1 {
            let mut sum = 0u32;
            for ky in 0..3u32 {
                for kx in 0..3u32 {
                    let gray = image.gray_at(x + kx - 1, y + ky - 1) as u32;
                    sum += gray * SMOOTHING_KERNEL[(ky * 3 + kx) as usize];
                }
            }
            let value = (sum + SMOOTHING_KERNEL_SUM / 2) / SMOOTHING_KERNEL_SUM;
            result.set_gray(x, y, value.min(255) as u8);
        }
    }
    result
}

/// 256-bin histogram of pixel luma
pub fn luma_histogram(image: &RasterImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for chunk in image.data.chunks_exact(4) {
        histogram[luma(chunk[0], chunk[1], chunk[2]) as usize] += 1;
    }
    histogram
}

/// Otsu's method: the threshold maximizing between-class variance
///
/// Thresholds with an empty background class are skipped; the scan stops once
/// the foreground class becomes empty.
pub fn otsu_threshold(histogram: &[u64; 256]) -> u8 {
    let total: u64 = histogram.iter().sum();
    let sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut sum_background = 0.0f64;
    let mut weight_background = 0u64;
    let mut max_variance = 0.0f64;
    let mut threshold = 0u8;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }

        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum - sum_background) / weight_foreground as f64;
        let diff = mean_background - mean_foreground;
        let variance = weight_background as f64 * weight_foreground as f64 * diff * diff;

        if variance > max_variance {
            max_variance = variance;
            threshold = t as u8;
        }
    }

    threshold
}

/// Binarize: white above the threshold, black at or below it
fn apply_threshold(image: &RasterImage, threshold: u8) -> RasterImage {
    let mut result = image.clone();
    for chunk in result.data.chunks_exact_mut(4) {
        let bw = if luma(chunk[0], chunk[1], chunk[2]) > threshold { 255 } else { 0 };
        chunk[0] = bw;
        chunk[1] = bw;
        chunk[2] = bw;
    }
    result
}

/// Whiten interior pixels with fewer than `min_dark` dark pixels in their 3x3 neighbourhood
fn apply_despeckle(image: &RasterImage, min_dark: u32) -> RasterImage {
    let mut result = image.clone();
    if image.width < 3 || image.height < 3 {
        return result;
    }

    for y in 1..image.height - 1 {
        for x in 1..image.width - 1 {
            let mut dark = 0u32;
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    if image.gray_at(nx, ny) < DARK_LEVEL {
                        dark += 1;
                    }
                }
            }
            if dark < min_dark {
                result.set_gray(x, y, 255);
            }
        }
    }
    result
}

/// Morphological opening with a 3x3 square on a binarized page
///
/// Ink is black, so imageproc's erosion of the white foreground grows the
/// strokes and the dilation shrinks them back. Only interior pixels change;
/// the one-pixel border keeps its source value after each pass.
fn apply_opening(image: &RasterImage) -> RasterImage {
    let mut result = image.clone();
    if image.width < 3 || image.height < 3 {
        return result;
    }

    let gray = GrayImage::from_fn(image.width, image.height, |x, y| Luma([image.gray_at(x, y)]));
    let eroded = restore_border(erode(&gray, Norm::LInf, 1), &gray);
    let opened = restore_border(dilate(&eroded, Norm::LInf, 1), &gray);

    for (x, y, pixel) in opened.enumerate_pixels() {
        result.set_gray(x, y, pixel[0]);
    }
    result
}

fn restore_border(mut processed: GrayImage, source: &GrayImage) -> GrayImage {
    let (width, height) = source.dimensions();
    for y in 0..height {
        for x in 0..width {
            if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                processed.put_pixel(x, y, *source.get_pixel(x, y));
            }
        }
    }
    processed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_image(width: u32, height: u32, values: &[u8]) -> RasterImage {
        let data = values.iter().flat_map(|&v| [v, v, v, 255]).collect();
        RasterImage::new(data, width, height).unwrap()
    }

    fn grays(image: &RasterImage) -> Vec<u8> {
        image.data.chunks_exact(4).map(|px| px[0]).collect()
    }

    #[test]
    fn test_preprocessing_disabled() {
        let img = gray_image(2, 2, &[10, 20, 30, 40]);
        let settings = PreprocessSettings {
            enabled: false,
            ..PreprocessSettings::default()
        };
        let result = preprocess_for_ocr(&img, &settings).unwrap();
        assert_eq!(result.image, img);
        assert!(result.threshold.is_none());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let img = RasterImage::filled(0, 0, [0; 4]);
        let err = preprocess_for_ocr(&img, &PreprocessSettings::default()).unwrap_err();
        assert!(matches!(err, ExtractionError::ImageDecode(_)));
    }

    #[test]
    fn test_upscale_factor() {
        // Small page: capped by the maximum multiplier
        assert!((upscale_factor(500, 400, 3000, 3.0) - 3.0).abs() < 1e-6);
        // Medium page: larger side reaches the target
        assert!((upscale_factor(1500, 1000, 3000, 3.0) - 2.0).abs() < 1e-6);
        // Oversized page is scaled down
        assert!((upscale_factor(6000, 3000, 3000, 3.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_upscale_dimensions() {
        let img = RasterImage::filled(10, 5, [255; 4]);
        let scaled = apply_upscale(&img, 3.0).unwrap();
        assert_eq!(scaled.dimensions(), (30, 15));
        assert_eq!(scaled.data.len(), 30 * 15 * 4);
    }

    #[test]
    fn test_upscale_noop() {
        let img = gray_image(1, 1, &[100]);
        assert_eq!(apply_upscale(&img, 1.0).unwrap(), img);
    }

    #[test]
    fn test_grayscale() {
        let img = RasterImage::new(vec![255, 0, 0, 255], 1, 1).unwrap(); // Red pixel
        let gray = apply_grayscale(&img);
        // 0.299 * 255 = 76.245
        assert_eq!(gray.data, vec![76, 76, 76, 255]);
    }

    #[test]
    fn test_contrast_is_monotonic_sigmoid() {
        let img = gray_image(3, 1, &[0, 128, 255]);
        let out = grays(&apply_contrast(&img, 15.0));
        // Ends pushed to the extremes, midpoint stays near the middle
        assert!(out[0] < 5);
        assert!(out[2] > 250);
        assert!((out[1] as i32 - 128).abs() <= 2);
    }

    #[test]
    fn test_contrast_flat_image() {
        let img = gray_image(2, 1, &[90, 90]);
        let out = grays(&apply_contrast(&img, 15.0));
        // Zero range: every pixel normalizes to 0
        assert_eq!(out[0], out[1]);
        assert!(out[0] < 5);
    }

    #[test]
    fn test_smoothing_leaves_border() {
        #[rustfmt::skip]
        let img = gray_image(3, 3, &[
            0,   0, 0,
            0, 160, 0,
            0,   0, 0,
        ]);
        let out = grays(&apply_smoothing(&img));
        // Center: 160 * 4 / 16 = 40
        assert_eq!(out[4], 40);
        assert_eq!(out[0], 0);
        assert_eq!(out[8], 0);
    }

    #[test]
    fn test_otsu_bimodal_threshold_between_peaks() {
        let mut histogram = [0u64; 256];
        for level in 40..=60 {
            histogram[level] = 500;
        }
        for level in 190..=210 {
            histogram[level] = 500;
        }
        let t = otsu_threshold(&histogram);
        assert!(t > 50 && t < 200, "threshold {} not between peaks", t);
    }

    #[test]
    fn test_otsu_uniform_image() {
        let mut histogram = [0u64; 256];
        histogram[200] = 100;
        // Foreground empties at the only populated level
        assert_eq!(otsu_threshold(&histogram), 0);
    }

    #[test]
    fn test_threshold_binarizes() {
        let img = gray_image(3, 1, &[10, 100, 101]);
        assert_eq!(grays(&apply_threshold(&img, 100)), vec![0, 0, 255]);
    }

    #[test]
    fn test_despeckle_removes_isolated_pixel() {
        let mut values = vec![255u8; 25];
        values[12] = 0; // center of a 5x5 page
        let img = gray_image(5, 5, &values);
        let out = grays(&apply_despeckle(&img, 3));
        assert!(out.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_despeckle_keeps_strokes() {
        // Horizontal line through the middle row
        #[rustfmt::skip]
        let img = gray_image(5, 3, &[
            255, 255, 255, 255, 255,
              0,   0,   0,   0,   0,
            255, 255, 255, 255, 255,
        ]);
        let out = grays(&apply_despeckle(&img, 3));
        assert_eq!(&out[5..10], &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_despeckle_reads_snapshot() {
        // Two adjacent dark pixels: each sees 2 dark neighbours, both whitened
        // in the same pass without cascading through the in-progress buffer
        let mut values = vec![255u8; 20];
        values[6] = 0;
        values[7] = 0;
        let img = gray_image(5, 4, &values);
        let out = grays(&apply_despeckle(&img, 3));
        assert_eq!(out[6], 255);
        assert_eq!(out[7], 255);
    }

    #[test]
    fn test_opening_removes_small_protrusion() {
        // 7x7 white page with a 3x3 dark block and a single dark spur
        let mut values = vec![255u8; 49];
        for y in 2..5 {
            for x in 2..5 {
                values[y * 7 + x] = 0;
            }
        }
        values[7 + 3] = 0; // spur above the block
        let img = gray_image(7, 7, &values);
        let out = grays(&apply_opening(&img));
        assert_eq!(out[7 + 3], 255, "spur should be removed");
        assert_eq!(out[3 * 7 + 3], 0, "block center should survive");
    }

    #[test]
    fn test_opening_keeps_border_and_alpha() {
        // Dark border pixel with no dark neighbours, on a translucent page
        let mut data: Vec<u8> = [255, 255, 255, 200].repeat(25);
        data[..4].copy_from_slice(&[0, 0, 0, 200]);
        let img = RasterImage::new(data, 5, 5).unwrap();
        let out = apply_opening(&img);
        assert_eq!(&out.data[..4], &[0, 0, 0, 200]);
        assert!(out.data.chunks_exact(4).skip(1).all(|px| px == [255, 255, 255, 200]));
    }

    #[test]
    fn test_alpha_preserved() {
        let data = vec![10, 10, 10, 7, 200, 200, 200, 9];
        let img = RasterImage::new(data, 2, 1).unwrap();
        let out = apply_threshold(&apply_contrast(&apply_grayscale(&img), 15.0), 128);
        assert_eq!(out.data[3], 7);
        assert_eq!(out.data[7], 9);
    }

    #[test]
    fn test_full_pipeline_outputs_binary_page() {
        let mut values = vec![230u8; 100];
        for x in 2..8 {
            values[5 * 10 + x] = 20;
            values[6 * 10 + x] = 20;
            values[4 * 10 + x] = 20;
        }
        let img = gray_image(10, 10, &values);
        let settings = PreprocessSettings {
            target_dimension: 20,
            ..PreprocessSettings::default()
        };
        let result = preprocess_for_ocr(&img, &settings).unwrap();
        assert_eq!(result.image.dimensions(), (20, 20));
        assert!(result.threshold.is_some());
        assert!(grays(&result.image).iter().all(|&v| v == 0 || v == 255));
    }
}
