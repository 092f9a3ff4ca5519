//! Bubble detection by shape.
//!
//! Every closed region boundary of a locally binarized page is scored for
//! size and roundness; the ones that look like a printed bubble become
//! candidates. Nothing here depends on where a bubble is expected to be.

use anyhow::Result;
use image::GrayImage;
use imageproc::geometry::arc_length;
use std::f64::consts::PI;

use super::types::MarkCandidate;
use crate::cancel::CancelToken;
use crate::config::Thresholds;
use crate::imaging::{adaptive_ink_mask, polygon_area, polygon_centroid, smooth, trace_contours};

/// Finds bubble-shaped regions on a grayscale page.
///
/// A boundary is accepted when its enclosed area lies within
/// `[min_area_ratio, max_area_ratio] × π·r²` and its circularity
/// `4π·area / perimeter²` exceeds `min_circularity`. Inner and outer rings
/// of one printed bubble are both reported; see
/// [`suppress_duplicates`](super::dedup::suppress_duplicates).
///
/// A blank page yields an empty list. The only error is cancellation.
pub fn detect_marks(
    gray: &GrayImage,
    radius: u32,
    thresholds: &Thresholds,
    cancel: &CancelToken,
) -> Result<Vec<MarkCandidate>> {
    let blurred = smooth(gray, thresholds.blur_sigma);
    let mask = adaptive_ink_mask(
        &blurred,
        thresholds.adaptive_block_radius,
        thresholds.adaptive_offset,
    );

    let contours = trace_contours(&mask);

    let expected_area = PI * (radius as f64).powi(2);
    let min_area = expected_area * thresholds.min_area_ratio;
    let max_area = expected_area * thresholds.max_area_ratio;

    let mut candidates = Vec::new();
    for contour in &contours {
        cancel.check()?;

        let area = polygon_area(&contour.points);
        if area < min_area || area > max_area {
            continue;
        }

        let perimeter = arc_length(&contour.points, true);
        if perimeter <= 0.0 {
            continue;
        }
        let circularity = 4.0 * PI * area / (perimeter * perimeter);
        if circularity <= thresholds.min_circularity {
            continue;
        }

        if let Some((cx, cy)) = polygon_centroid(&contour.points) {
            candidates.push(MarkCandidate {
                x: cx as i32,
                y: cy as i32,
                radius,
                area,
                circularity,
            });
        }
    }

    crate::log(&format!(
        "Mark detection: {} of {} boundaries look like bubbles (area {:.0}-{:.0} px²)",
        candidates.len(),
        contours.len(),
        min_area,
        max_area
    ));

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    fn blank(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([255u8]))
    }

    /// Printed ring: dark disk with a light interior.
    fn draw_ring(img: &mut GrayImage, x: i32, y: i32) {
        draw_filled_circle_mut(img, (x, y), 22, Luma([0u8]));
        draw_filled_circle_mut(img, (x, y), 17, Luma([255u8]));
    }

    #[test]
    fn test_blank_page_has_no_marks() {
        let marks =
            detect_marks(&blank(200, 200), 22, &Thresholds::default(), &CancelToken::new()).unwrap();
        assert!(marks.is_empty());
    }

    #[test]
    fn test_ring_and_filled_disk_are_detected() {
        let mut img = blank(300, 150);
        draw_ring(&mut img, 70, 70);
        draw_filled_circle_mut(&mut img, (200, 70), 22, Luma([0u8]));

        let marks = detect_marks(&img, 22, &Thresholds::default(), &CancelToken::new()).unwrap();

        assert!(marks.iter().any(|m| (m.x - 70).abs() <= 2 && (m.y - 70).abs() <= 2));
        assert!(marks.iter().any(|m| (m.x - 200).abs() <= 2 && (m.y - 70).abs() <= 2));
        for m in &marks {
            assert_eq!(m.radius, 22);
        }
    }

    #[test]
    fn test_emitted_marks_respect_size_and_roundness() {
        let mut img = blank(400, 200);
        draw_ring(&mut img, 60, 60);
        draw_filled_circle_mut(&mut img, (160, 60), 22, Luma([0u8]));
        // Handwriting box, noise dot and an oversized blob
        draw_filled_rect_mut(&mut img, Rect::at(230, 40).of_size(40, 40), Luma([0u8]));
        draw_filled_circle_mut(&mut img, (320, 60), 4, Luma([0u8]));
        draw_filled_circle_mut(&mut img, (100, 150), 4, Luma([0u8]));

        let t = Thresholds::default();
        let marks = detect_marks(&img, 22, &t, &CancelToken::new()).unwrap();

        let expected = PI * 22.0 * 22.0;
        assert!(!marks.is_empty());
        for m in &marks {
            assert!(m.area >= 0.5 * expected && m.area <= 5.0 * expected);
            assert!(m.circularity > 0.85);
        }
    }

    #[test]
    fn test_square_box_is_rejected() {
        let mut img = blank(200, 200);
        draw_filled_rect_mut(&mut img, Rect::at(60, 60).of_size(40, 40), Luma([0u8]));

        let marks = detect_marks(&img, 22, &Thresholds::default(), &CancelToken::new()).unwrap();

        assert!(marks.iter().all(|m| (m.x - 80).abs() > 10 || (m.y - 80).abs() > 10));
    }

    #[test]
    fn test_cancelled_detection_errors() {
        let mut img = blank(200, 200);
        draw_ring(&mut img, 100, 100);

        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(detect_marks(&img, 22, &Thresholds::default(), &cancel).is_err());
    }
}
