//! Debug rendering of detected field pairs

use anyhow::{Context, Result};
use image::Rgba;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::spatial::SpatialLayout;
use super::BoundingBox;
use crate::document::RasterImage;

const LABEL_COLOR: Rgba<u8> = Rgba([0, 160, 0, 255]);
const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([220, 0, 0, 255]);
const LINE_COLOR: Rgba<u8> = Rgba([120, 120, 255, 255]);

/// Draw line boxes, label boxes, and placeholder boxes over a page
///
/// Unpaired lines are outlined in blue, paired labels in green, their input
/// areas in red.
pub fn annotate_layout(page: &RasterImage, layout: &SpatialLayout) -> Result<RasterImage> {
    let mut canvas = page
        .to_rgba_image()
        .context("Pixel buffer does not match image dimensions")?;

    for (idx, line) in layout.lines.iter().enumerate() {
        let color = if layout.pair_for_line(idx).is_some() {
            LABEL_COLOR
        } else {
            LINE_COLOR
        };
        if let Some(rect) = to_rect(&line.bbox(), page) {
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }

    for pair in &layout.pairs {
        if let Some(rect) = to_rect(&pair.placeholder, page) {
            draw_hollow_rect_mut(&mut canvas, rect, PLACEHOLDER_COLOR);
        }
    }

    let (width, height) = canvas.dimensions();
    RasterImage::new(canvas.into_raw(), width, height).context("Annotated canvas has the wrong size")
}

/// Clip a box to the page; `None` when nothing is left
fn to_rect(bbox: &BoundingBox, page: &RasterImage) -> Option<Rect> {
    let right = bbox.right().min(page.width);
    let bottom = bbox.bottom().min(page.height);
    if right <= bbox.x || bottom <= bbox.y {
        return None;
    }
    Some(Rect::at(bbox.x as i32, bbox.y as i32).of_size(right - bbox.x, bottom - bbox.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ocr::RecognizedWord;
    use crate::vision::spatial::{FieldPair, VisualLine};

    #[test]
    fn test_draws_placeholder_outline() {
        let page = RasterImage::filled(50, 50, [255; 4]);
        let layout = SpatialLayout {
            lines: vec![VisualLine {
                key: 0,
                words: vec![RecognizedWord::new("Name:", BoundingBox::new(2, 2, 20, 8), 90.0, 0)],
            }],
            pairs: vec![FieldPair {
                label: "Name".into(),
                line_index: 0,
                placeholder: BoundingBox::new(10, 20, 30, 10),
                confidence: 90.0,
                inline: false,
            }],
        };

        let out = annotate_layout(&page, &layout).unwrap();
        assert_eq!(out.dimensions(), (50, 50));

        let idx = out.index(10, 20);
        assert_eq!(&out.data[idx..idx + 4], &PLACEHOLDER_COLOR.0);
        let idx = out.index(2, 2);
        assert_eq!(&out.data[idx..idx + 4], &LABEL_COLOR.0);
        // Interior untouched
        let idx = out.index(20, 25);
        assert_eq!(&out.data[idx..idx + 4], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_boxes_outside_page_are_skipped() {
        let page = RasterImage::filled(10, 10, [255; 4]);
        assert!(to_rect(&BoundingBox::new(20, 20, 5, 5), &page).is_none());
        assert!(to_rect(&BoundingBox::new(5, 5, 0, 3), &page).is_none());
        let clipped = to_rect(&BoundingBox::new(5, 5, 50, 50), &page).unwrap();
        assert_eq!((clipped.width(), clipped.height()), (5, 5));
    }
}
