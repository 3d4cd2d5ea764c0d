//! Raster page data passed between pipeline stages

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};

/// A decoded page image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Raw RGBA pixel data, row-major
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl RasterImage {
    /// Create a raster image from RGBA data
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self { data, width, height })
    }

    /// Create a uniformly filled image
    #[cfg(test)]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take((width as usize) * (height as usize) * 4)
            .collect();
        Self { data, width, height }
    }

    /// Convert a decoded image into RGBA8
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            data: rgba.into_raw(),
            width,
            height,
        }
    }

    /// Get dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Byte offset of the pixel at (x, y)
    pub fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * 4
    }

    /// Red channel of the pixel at (x, y); equals luma once grayscaled
    pub fn gray_at(&self, x: u32, y: u32) -> u8 {
        self.data[self.index(x, y)]
    }

    /// Write a gray value into the RGB channels at (x, y), leaving alpha alone
    pub fn set_gray(&mut self, x: u32, y: u32, value: u8) {
        let idx = self.index(x, y);
        self.data[idx] = value;
        self.data[idx + 1] = value;
        self.data[idx + 2] = value;
    }

    /// View as an `image` buffer
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Encode as PNG bytes
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let image = self
            .to_rgba_image()
            .context("Pixel buffer does not match image dimensions")?;
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("Failed to encode PNG")?;
        Ok(bytes)
    }

    /// Save to disk; the format follows the file extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let image = self
            .to_rgba_image()
            .context("Pixel buffer does not match image dimensions")?;
        image
            .save(path)
            .with_context(|| format!("Failed to save image to {:?}", path))?;
        Ok(())
    }
}
