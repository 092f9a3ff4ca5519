//! Identification strip geometry.
//!
//! The handwritten identification number sits in a row of printed boxes just
//! above the identification bubbles. The strip is found as the largest dark
//! region in a search window derived from the layout, and its cells from the
//! vertical grid lines inside it. When the lines cannot be measured, or the
//! strip itself cannot be found, the boxes fall back to layout geometry.

use image::GrayImage;
use serde::Serialize;

use crate::config::Thresholds;
use crate::imaging::{close_rect, crop_gray, open_rect, otsu_ink_mask, outer_boxes};
use crate::layout::IdBlock;

/// Structuring element bridging strokes of the strip outline (w × h px).
const STRIP_CLOSE_KERNEL: (u32, u32) = (5, 3);

/// One digit cell of the identification strip, in page pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct IdentificationBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// How the identification boxes were derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSource {
    /// Cell width measured from the strip's grid lines
    MeasuredGrid,
    /// Strip found, but too few consistent grid lines
    StripFallback,
    /// No strip found; boxes placed from the layout alone
    LayoutFallback,
}

/// Located strip in page pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Strip {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

fn boxes_from(start_x: i32, y: i32, cell_w: i32, height: i32, count: usize) -> Vec<IdentificationBox> {
    (0..count as i32)
        .map(|i| IdentificationBox {
            x: start_x + i * cell_w,
            y,
            width: cell_w,
            height,
        })
        .collect()
}

/// Finds the widest/tallest dark region in the window above the bubbles.
fn find_strip(gray: &GrayImage, block: &IdBlock, t: &Thresholds) -> Option<Strip> {
    let [ox, oy] = block.origin;
    let grid_w = block.digits as f32 * block.digits_gap as f32;
    let center_x = ox as f32 + grid_w / 2.0;
    let search_w = grid_w + t.strip_search_extra_width_px;

    let x1 = ((center_x - search_w / 2.0) as i32).max(0);
    let x2 = (center_x + search_w / 2.0) as i32;
    let y1 = ((oy as f32 - t.strip_search_above_px) as i32).max(0);
    let y2 = (oy as f32 - t.strip_search_clearance_px) as i32;

    let region = crop_gray(gray, x1, y1, x2 - x1, y2 - y1)?;
    let mask = close_rect(&otsu_ink_mask(&region), STRIP_CLOSE_KERNEL.0, STRIP_CLOSE_KERNEL.1);

    let mut best: Option<Strip> = None;
    let mut max_area = 0i64;
    for rect in outer_boxes(&mask) {
        if (rect.width() as f32) < t.strip_min_width_px || (rect.height() as f32) < t.strip_min_height_px {
            continue;
        }
        let area = rect.width() as i64 * rect.height() as i64;
        if area > max_area {
            max_area = area;
            best = Some(Strip {
                x: x1 + rect.left(),
                y: y1 + rect.top(),
                width: rect.width() as i32,
                height: rect.height() as i32,
            });
        }
    }

    best
}

/// x positions (strip-relative) of vertical separators, with nearby lines
/// merged into one.
fn grid_lines(strip_img: &GrayImage, t: &Thresholds) -> Vec<i32> {
    let kernel = t.grid_line_kernel_px.round().max(1.0) as u32;
    let lines = open_rect(&otsu_ink_mask(strip_img), 1, kernel);
    let min_height = strip_img.height() as f32 * 0.5;

    let mut xs: Vec<i32> = outer_boxes(&lines)
        .iter()
        .filter(|r| r.height() as f32 > min_height)
        .map(|r| r.left())
        .collect();
    xs.sort_unstable();

    let mut merged = Vec::new();
    let mut group: Vec<i32> = Vec::new();
    for x in xs {
        if let Some(&last) = group.last() {
            if ((x - last) as f32) >= t.grid_line_merge_px {
                merged.push(group.iter().sum::<i32>() / group.len() as i32);
                group.clear();
            }
        }
        group.push(x);
    }
    if !group.is_empty() {
        merged.push(group.iter().sum::<i32>() / group.len() as i32);
    }

    merged
}

/// Median of the inter-line gaps that look like a cell, if enough do.
fn stable_cell_width(lines: &[i32], t: &Thresholds) -> Option<i32> {
    let mut widths: Vec<i32> = lines
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|&w| (w as f32) > t.cell_min_width_px && (w as f32) < t.cell_max_width_px)
        .collect();

    if widths.len() < t.min_stable_gaps.max(1) {
        return None;
    }
    widths.sort_unstable();
    Some(widths[widths.len() / 2])
}

/// Locates one box per identification digit.
pub fn locate_id_boxes(
    gray: &GrayImage,
    block: &IdBlock,
    t: &Thresholds,
) -> (Vec<IdentificationBox>, GridSource) {
    let [ox, oy] = block.origin;
    let fallback_x = (ox as f32 - t.fallback_offset_px) as i32;

    let Some(strip) = find_strip(gray, block, t) else {
        let bottom = (oy as f32 - t.fallback_box_clearance_px) as i32;
        let height = t.fallback_box_height_px as i32;
        crate::log("ID strip not found, using layout box grid");
        return (
            boxes_from(fallback_x, bottom - height, block.digits_gap, height, block.digits),
            GridSource::LayoutFallback,
        );
    };

    let lines = crop_gray(gray, strip.x, strip.y, strip.width, strip.height)
        .map(|img| grid_lines(&img, t))
        .unwrap_or_default();

    crate::log(&format!(
        "ID strip at ({}, {}) {}x{}: {} vertical lines {:?}",
        strip.x,
        strip.y,
        strip.width,
        strip.height,
        lines.len(),
        lines
    ));

    match stable_cell_width(&lines, t) {
        Some(cell_w) => {
            let grid_w = block.digits as i32 * cell_w;
            let start_x = strip.x + (strip.width - grid_w).div_euclid(2);
            crate::log(&format!("ID grid: measured cell width {} px", cell_w));
            (
                boxes_from(start_x, strip.y, cell_w, strip.height, block.digits),
                GridSource::MeasuredGrid,
            )
        }
        None => {
            crate::log("ID grid lines insufficient, using layout offset within strip");
            (
                boxes_from(fallback_x, strip.y, block.digits_gap, strip.height, block.digits),
                GridSource::StripFallback,
            )
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    pub(crate) fn id_block() -> IdBlock {
        IdBlock {
            origin: [300, 320],
            digits: 5,
            rows: 10,
            labels: None,
            digits_gap: 55,
            labels_gap: 26,
        }
    }

    fn blank() -> GrayImage {
        GrayImage::from_pixel(800, 600, Luma([255u8]))
    }

    fn line(img: &mut GrayImage, x: i32, y: i32, w: u32, h: u32) {
        draw_filled_rect_mut(img, Rect::at(x, y).of_size(w, h), Luma([0u8]));
    }

    /// Strip outline 250..=580 × 180..=250 with optional inner separators.
    pub(crate) fn draw_strip(img: &mut GrayImage, separators: &[i32]) {
        line(img, 250, 180, 331, 2);
        line(img, 250, 249, 331, 2);
        line(img, 250, 180, 2, 71);
        line(img, 579, 180, 2, 71);
        for &x in separators {
            line(img, x, 180, 2, 71);
        }
    }

    #[test]
    fn test_measured_grid_centred_in_strip() {
        let mut img = blank();
        draw_strip(&mut img, &[277, 332, 387, 442, 497, 552]);

        let (boxes, source) = locate_id_boxes(&img, &id_block(), &Thresholds::default());

        assert_eq!(source, GridSource::MeasuredGrid);
        assert_eq!(boxes.len(), 5);
        assert_eq!(boxes[0].width, 55);
        assert!((boxes[0].x - 277).abs() <= 2);
        assert_eq!(boxes[0].y, 180);
        assert_eq!(boxes[0].height, 71);
        assert_eq!(boxes[4].x - boxes[0].x, 4 * 55);
    }

    #[test]
    fn test_strip_without_lines_uses_layout_offset() {
        let mut img = blank();
        draw_strip(&mut img, &[]);

        let (boxes, source) = locate_id_boxes(&img, &id_block(), &Thresholds::default());

        assert_eq!(source, GridSource::StripFallback);
        assert_eq!(boxes[0], IdentificationBox { x: 232, y: 180, width: 55, height: 71 });
        assert_eq!(boxes[1].x, 287);
    }

    #[test]
    fn test_blank_page_uses_layout_grid() {
        let (boxes, source) = locate_id_boxes(&blank(), &id_block(), &Thresholds::default());

        assert_eq!(source, GridSource::LayoutFallback);
        assert_eq!(boxes.len(), 5);
        assert_eq!(boxes[0], IdentificationBox { x: 232, y: 225, width: 55, height: 60 });
    }

    #[test]
    fn test_grid_lines_merge_double_borders() {
        let mut strip = GrayImage::from_pixel(300, 60, Luma([255u8]));
        for x in [10, 14, 70, 130, 190, 250, 253] {
            line(&mut strip, x, 0, 2, 60);
        }

        let lines = grid_lines(&strip, &Thresholds::default());

        assert_eq!(lines, vec![12, 70, 130, 190, 251]);
        assert_eq!(stable_cell_width(&lines, &Thresholds::default()), Some(60));
    }

    #[test]
    fn test_stable_width_needs_enough_gaps() {
        let t = Thresholds::default();
        assert_eq!(stable_cell_width(&[0, 50, 100, 150], &t), None);
        assert_eq!(stable_cell_width(&[0, 50, 100, 160, 220], &t), Some(60));
        // Gaps outside (40, 80) are not cells
        assert_eq!(stable_cell_width(&[0, 20, 40, 60, 80, 100], &t), None);
    }
}
