//! Fill measurement.
//!
//! Fill is measured on a globally (Otsu) binarized page: the adaptive mask
//! used for detection hollows out solid fills. Only an inner disk of each
//! mark is sampled so the printed ring never counts as ink.

use anyhow::Result;
use image::GrayImage;

use super::types::{EvaluatedMark, MappedMark, MarkCandidate};
use crate::cancel::CancelToken;
use crate::imaging::{otsu_ink_mask, smooth};

/// Ink mask the fill ratios are measured on.
pub fn fill_mask(gray: &GrayImage, blur_sigma: f32) -> GrayImage {
    otsu_ink_mask(&smooth(gray, blur_sigma))
}

/// Radius of the sampled disk for a mark of nominal radius `radius`.
pub fn sample_radius(radius: u32, disk_ratio: f32, min_radius: u32) -> u32 {
    ((radius as f32 * disk_ratio) as u32).max(min_radius)
}

/// Fraction of the disk of radius `r` around `(cx, cy)` that is ink.
///
/// The denominator is the number of pixels in the discrete disk, so pixels
/// outside the image count as paper and a fully inked disk scores exactly 1.0.
pub fn fill_ratio(mask: &GrayImage, cx: i32, cy: i32, r: u32) -> f32 {
    let r = r as i32;
    let r2 = r * r;
    let (width, height) = (mask.width() as i32, mask.height() as i32);

    let mut total = 0u32;
    let mut ink = 0u32;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            total += 1;

            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && x < width && y < height && mask.get_pixel(x as u32, y as u32)[0] > 0 {
                ink += 1;
            }
        }
    }

    if total == 0 {
        return 0.0;
    }
    ink as f32 / total as f32
}

/// Measures every mapped mark against `mask`.
///
/// `disk_radius` is the sampled radius in pixels and `threshold` the fill
/// ratio at or above which a mark counts as filled. Output order follows
/// `mapped`; evaluations are independent of each other.
pub fn evaluate_marks(
    mask: &GrayImage,
    candidates: &[MarkCandidate],
    mapped: &[MappedMark],
    disk_radius: u32,
    threshold: f32,
    cancel: &CancelToken,
) -> Result<Vec<EvaluatedMark>> {
    let mut evaluated = Vec::with_capacity(mapped.len());

    for (index, mark) in mapped.iter().enumerate() {
        cancel.check()?;

        let Some(candidate) = candidates.get(mark.candidate) else {
            crate::log(&format!("Warning: mark {} refers to a missing candidate", mark));
            continue;
        };

        let ratio = fill_ratio(mask, candidate.x, candidate.y, disk_radius);
        evaluated.push(EvaluatedMark {
            mapped: index,
            fill_ratio: ratio,
            filled: ratio >= threshold,
        });
    }

    let filled = evaluated.iter().filter(|e| e.filled).count();
    crate::log(&format!(
        "Fill evaluation: {} of {} marks filled (threshold {:.2}, disk radius {} px)",
        filled,
        evaluated.len(),
        threshold,
        disk_radius
    ));

    Ok(evaluated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marks::types::{MarkIdentity, ID_GROUP};
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    fn candidate(x: i32, y: i32) -> MarkCandidate {
        MarkCandidate {
            x,
            y,
            radius: 22,
            area: 1500.0,
            circularity: 0.9,
        }
    }

    fn mapped(candidate: usize, row: usize) -> MappedMark {
        MappedMark {
            candidate,
            identity: MarkIdentity::IdDigit { column: 0, row },
            group: ID_GROUP.into(),
            value: row.to_string(),
        }
    }

    #[test]
    fn test_sample_radius() {
        assert_eq!(sample_radius(22, 0.6, 2), 13);
        assert_eq!(sample_radius(3, 0.6, 2), 2);
    }

    #[test]
    fn test_full_and_empty_disks() {
        let mut mask = GrayImage::new(100, 50);
        draw_filled_rect_mut(&mut mask, Rect::at(0, 0).of_size(50, 50), Luma([255u8]));

        assert_eq!(fill_ratio(&mask, 25, 25, 13), 1.0);
        assert_eq!(fill_ratio(&mask, 75, 25, 13), 0.0);
    }

    #[test]
    fn test_fill_ratio_is_monotonic() {
        let mut mask = GrayImage::new(60, 60);
        let mut last = fill_ratio(&mask, 30, 30, 13);
        for width in [5u32, 10, 15, 20, 27] {
            draw_filled_rect_mut(&mut mask, Rect::at(17, 17).of_size(width, 27), Luma([255u8]));
            let ratio = fill_ratio(&mask, 30, 30, 13);
            assert!(ratio >= last);
            last = ratio;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_disk_beyond_edge_counts_as_paper() {
        let mask = GrayImage::from_pixel(20, 20, Luma([255u8]));
        let ratio = fill_ratio(&mask, 0, 10, 5);
        assert!(ratio > 0.4 && ratio < 0.7);
    }

    #[test]
    fn test_evaluate_filled_ring_and_empty_ring() {
        let mut page = GrayImage::from_pixel(200, 100, Luma([255u8]));
        // Empty ring
        draw_filled_circle_mut(&mut page, (50, 50), 22, Luma([0u8]));
        draw_filled_circle_mut(&mut page, (50, 50), 17, Luma([255u8]));
        // Pencil fill
        draw_filled_circle_mut(&mut page, (150, 50), 22, Luma([40u8]));

        let mask = fill_mask(&page, 1.1);
        let candidates = vec![candidate(50, 50), candidate(150, 50)];
        let marks = vec![mapped(0, 0), mapped(1, 1)];

        let evaluated =
            evaluate_marks(&mask, &candidates, &marks, 13, 0.35, &CancelToken::new()).unwrap();

        assert_eq!(evaluated.len(), 2);
        assert_eq!(evaluated[0].mapped, 0);
        assert!(!evaluated[0].filled);
        assert_eq!(evaluated[0].fill_ratio, 0.0);
        assert!(evaluated[1].filled);
        assert_eq!(evaluated[1].fill_ratio, 1.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut mask = GrayImage::new(60, 60);
        draw_filled_rect_mut(&mut mask, Rect::at(0, 0).of_size(30, 60), Luma([255u8]));
        let ratio = fill_ratio(&mask, 30, 30, 10);

        let evaluated = evaluate_marks(
            &mask,
            &[candidate(30, 30)],
            &[mapped(0, 0)],
            10,
            ratio,
            &CancelToken::new(),
        )
        .unwrap();

        assert!(evaluated[0].filled);
    }

    #[test]
    fn test_blank_page_has_no_fill() {
        let page = GrayImage::from_pixel(80, 80, Luma([250u8]));
        let mask = fill_mask(&page, 1.1);
        assert_eq!(fill_ratio(&mask, 40, 40, 13), 0.0);
    }
}
