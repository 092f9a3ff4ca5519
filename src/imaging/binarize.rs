use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::{box_filter, gaussian_blur_f32};

/// Noise-smoothing blur applied before any binarization.
pub fn smooth(gray: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return gray.clone();
    }
    gaussian_blur_f32(gray, sigma)
}

/// Local binarization separating dark ink from light paper.
///
/// A pixel is ink when it is at least `offset` grey levels darker than the
/// mean of the `(2r+1)²` window around it. Large solid fills come out hollow
/// (their interior equals its own local mean), which is fine for locating
/// mark outlines but not for measuring fill; use [`otsu_ink_mask`] for that.
pub fn adaptive_ink_mask(gray: &GrayImage, block_radius: u32, offset: i16) -> GrayImage {
    let local_mean = box_filter(gray, block_radius, block_radius);
    let (width, height) = gray.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in gray.enumerate_pixels() {
        let mean = local_mean.get_pixel(x, y)[0] as i16;
        let value = if (pixel[0] as i16) <= mean - offset {
            255u8 // Ink
        } else {
            0u8 // Paper
        };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Global binarization with an automatically chosen (Otsu) level.
///
/// Pixels at or below the level are ink. A uniform image yields level 0, so a
/// blank page produces no ink.
pub fn otsu_ink_mask(gray: &GrayImage) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    threshold(gray, otsu_level(gray), ThresholdType::BinaryInverted)
}

/// Crops a sub-region given in absolute pixels, clamping to image bounds.
///
/// Returns `None` when nothing of the region lies inside the image.
pub fn crop_gray(gray: &GrayImage, x: i32, y: i32, width: i32, height: i32) -> Option<GrayImage> {
    let (w, h) = (gray.width() as i32, gray.height() as i32);

    let x0 = x.clamp(0, w);
    let y0 = y.clamp(0, h);
    let x1 = (x + width).clamp(0, w);
    let y1 = (y + height).clamp(0, h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(
        image::imageops::crop_imm(
            gray,
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        )
        .to_image(),
    )
}
