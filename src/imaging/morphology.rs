//! Rectangular-kernel morphology on binary masks.
//!
//! Grid line extraction needs long thin kernels (1×20), strip closing a 5×3
//! one and the recognition variants a 2×2 one. The kernel anchor sits at
//! `(w / 2, h / 2)`.

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_close, grayscale_dilate, grayscale_erode, grayscale_open, Mask};

/// Largest kernel side `Mask` accepts.
const MAX_KERNEL: u32 = 511;

/// `kw × kh` rectangle anchored at its center, or `None` for an empty kernel.
fn rect_mask(kw: u32, kh: u32) -> Option<Mask> {
    if kw == 0 || kh == 0 {
        return None;
    }
    let (kw, kh) = (kw.min(MAX_KERNEL), kh.min(MAX_KERNEL));
    let kernel = GrayImage::from_pixel(kw, kh, Luma([255u8]));
    Some(Mask::from_image(&kernel, (kw / 2) as u8, (kh / 2) as u8))
}

fn apply(img: &GrayImage, kw: u32, kh: u32, op: fn(&GrayImage, &Mask) -> GrayImage) -> GrayImage {
    match rect_mask(kw, kh) {
        Some(mask) if img.width() > 0 && img.height() > 0 => op(img, &mask),
        _ => img.clone(),
    }
}

/// Grows bright regions by a `kw × kh` rectangle.
pub fn dilate_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    apply(img, kw, kh, grayscale_dilate)
}

/// Shrinks bright regions by a `kw × kh` rectangle.
pub fn erode_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    apply(img, kw, kh, grayscale_erode)
}

/// Erosion then dilation: removes bright structures the kernel does not fit in.
pub fn open_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    apply(img, kw, kh, grayscale_open)
}

/// Dilation then erosion: bridges bright structures separated by small gaps.
pub fn close_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    apply(img, kw, kh, grayscale_close)
}
