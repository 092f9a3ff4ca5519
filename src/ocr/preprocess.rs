use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};

use super::cells::IdentificationBox;
use crate::config::Thresholds;
use crate::imaging::{crop_gray, otsu_ink_mask, outer_boxes, union_box};

/// Margin added around the isolated digit on its square canvas (px).
const CANVAS_MARGIN: u32 = 10;
/// Upscale factor applied before recognition.
const UPSCALE: u32 = 3;
/// Light border added after upscaling (px).
const BORDER: u32 = 20;

/// Crops a cell with a horizontal inset that keeps the grid borders out.
pub fn crop_cell(gray: &GrayImage, cell: &IdentificationBox, padding_px: f32) -> Option<GrayImage> {
    let pad = padding_px.round() as i32;
    crop_gray(gray, cell.x + pad, cell.y, cell.width - 2 * pad, cell.height)
}

/// Isolates the handwritten digit of a cell as an ink mask (255 = ink).
///
/// Blobs that are too small, or that span nearly the whole cell height (box
/// borders), are ignored. The union of the remaining blobs keeps digits drawn
/// in several strokes together; it is centred on a square canvas. With no
/// usable blob, the thresholded cell is returned as is.
pub fn isolate_digit(cell: &GrayImage, t: &Thresholds) -> GrayImage {
    let mask = otsu_ink_mask(cell);
    let cell_h = cell.height() as f32;

    let blobs: Vec<_> = outer_boxes(&mask)
        .into_iter()
        .filter(|b| {
            let (w, h) = (b.width() as f32, b.height() as f32);
            w >= t.blob_min_width_px && h >= t.blob_min_height_px && h < cell_h * t.blob_max_height_ratio
        })
        .collect();

    let Some(digit) = union_box(&blobs) else {
        return mask;
    };

    let (w, h) = (digit.width(), digit.height());
    let crop = imageops::crop_imm(&mask, digit.left() as u32, digit.top() as u32, w, h).to_image();

    let side = w.max(h) + CANVAS_MARGIN;
    let mut canvas: GrayImage = ImageBuffer::new(side, side);
    imageops::replace(
        &mut canvas,
        &crop,
        ((side - w) / 2) as i64,
        ((side - h) / 2) as i64,
    );
    canvas
}

/// Turns an ink mask into what the engine reads best: dark ink on light
/// paper, upscaled, with a light border.
pub fn prepare_for_recognition(ink_mask: &GrayImage) -> GrayImage {
    let mut inverted = ink_mask.clone();
    imageops::invert(&mut inverted);

    let (w, h) = inverted.dimensions();
    let scaled = imageops::resize(&inverted, w * UPSCALE, h * UPSCALE, FilterType::CatmullRom);

    let mut padded: GrayImage =
        ImageBuffer::from_pixel(scaled.width() + 2 * BORDER, scaled.height() + 2 * BORDER, Luma([255u8]));
    imageops::replace(&mut padded, &scaled, BORDER as i64, BORDER as i64);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn cell_with(rects: &[Rect]) -> GrayImage {
        sized_cell_with(47, 71, rects)
    }

    fn sized_cell_with(width: u32, height: u32, rects: &[Rect]) -> GrayImage {
        let mut cell = GrayImage::from_pixel(width, height, Luma([255u8]));
        for r in rects {
            draw_filled_rect_mut(&mut cell, *r, Luma([0u8]));
        }
        cell
    }

    #[test]
    fn test_crop_cell_insets_horizontally() {
        let page = GrayImage::from_pixel(200, 100, Luma([255u8]));
        let cell = IdentificationBox { x: 10, y: 20, width: 55, height: 60 };
        let cropped = crop_cell(&page, &cell, 4.0).unwrap();
        assert_eq!(cropped.dimensions(), (47, 60));
    }

    #[test]
    fn test_broken_strokes_are_united() {
        // A "4" drawn as two separate strokes plus a border line and a speck
        let cell = cell_with(&[
            Rect::at(10, 15).of_size(4, 25),
            Rect::at(25, 10).of_size(4, 40),
            Rect::at(0, 0).of_size(2, 71),
            Rect::at(40, 60).of_size(2, 2),
        ]);

        let digit = isolate_digit(&cell, &Thresholds::default());

        // Union is 19 x 40, so the canvas is 50 x 50
        assert_eq!(digit.dimensions(), (50, 50));
        // Left stroke lands at x = 15..19, y = 10..35
        assert_eq!(digit.get_pixel(16, 20)[0], 255);
        assert_eq!(digit.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_blob_at_height_limit_is_a_border() {
        // 57 px is exactly 95% of a 60 px cell
        let cell = sized_cell_with(47, 60, &[Rect::at(20, 1).of_size(4, 57)]);
        let digit = isolate_digit(&cell, &Thresholds::default());
        assert_eq!(digit.dimensions(), (47, 60));

        let cell = sized_cell_with(47, 60, &[Rect::at(20, 1).of_size(4, 56)]);
        let digit = isolate_digit(&cell, &Thresholds::default());
        assert_eq!(digit.dimensions(), (66, 66));
    }

    #[test]
    fn test_blank_cell_returns_mask() {
        let cell = cell_with(&[]);
        let digit = isolate_digit(&cell, &Thresholds::default());
        assert_eq!(digit.dimensions(), (47, 71));
        assert!(digit.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_prepare_inverts_scales_and_pads() {
        let mut mask = GrayImage::new(10, 10);
        draw_filled_rect_mut(&mut mask, Rect::at(3, 3).of_size(4, 4), Luma([255u8]));

        let prepared = prepare_for_recognition(&mask);

        assert_eq!(prepared.dimensions(), (70, 70));
        assert_eq!(prepared.get_pixel(0, 0)[0], 255);
        // Center of the ink square is dark
        assert!(prepared.get_pixel(35, 35)[0] < 50);
    }
}
