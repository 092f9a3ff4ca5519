//! Contour geometry: area, centroid and bounding boxes of traced regions.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// Signed shoelace sum (twice the signed area) of a closed polygon.
fn signed_double_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    let mut sum = 0f64;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        sum += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    sum
}

/// Area enclosed by a closed contour polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    signed_double_area(points).abs() / 2.0
}

/// Centroid of the area enclosed by a closed contour (first-order moments
/// over zeroth-order moment). `None` for degenerate polygons.
pub fn polygon_centroid(points: &[Point<i32>]) -> Option<(f64, f64)> {
    if points.len() < 3 {
        return None;
    }
    let a2 = signed_double_area(points);
    if a2 == 0.0 {
        return None;
    }

    let n = points.len();
    let mut cx = 0f64;
    let mut cy = 0f64;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let cross = p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
        cx += (p.x + q.x) as f64 * cross;
        cy += (p.y + q.y) as f64 * cross;
    }

    Some((cx / (3.0 * a2), cy / (3.0 * a2)))
}

/// Upright bounding box of a point set, inclusive of the extreme pixels.
pub fn bounding_box(points: &[Point<i32>]) -> Option<Rect> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(Rect::at(min_x, min_y).of_size((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32))
}

/// Traces every region boundary of a mask (255 = ink).
///
/// The mask is traced inside a one-pixel paper frame so that regions touching
/// the image edge get an outer border of their own and do not swallow the
/// others as children. Points are in `mask` coordinates.
pub fn trace_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    let (width, height) = mask.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    image::imageops::replace(&mut framed, mask, 1, 1);

    let mut contours = find_contours::<i32>(&framed);
    for contour in &mut contours {
        for p in &mut contour.points {
            p.x -= 1;
            p.y -= 1;
        }
    }
    contours
}

/// Bounding boxes of the outermost ink regions of a mask. Regions nested
/// inside another region's hole are not reported.
pub fn outer_boxes(mask: &GrayImage) -> Vec<Rect> {
    trace_contours(mask)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| bounding_box(&c.points))
        .collect()
}

/// Smallest box containing every box in `boxes`.
pub fn union_box(boxes: &[Rect]) -> Option<Rect> {
    let x1 = boxes.iter().map(|b| b.left()).min()?;
    let y1 = boxes.iter().map(|b| b.top()).min()?;
    let x2 = boxes.iter().map(|b| b.right()).max()?;
    let y2 = boxes.iter().map(|b| b.bottom()).max()?;
    Some(Rect::at(x1, y1).of_size((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32))
}
