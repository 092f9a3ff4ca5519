//! Raster helpers shared by mark detection, fill evaluation and the
//! identification strip reader.
//!
//! Binary masks use 255 for ink and 0 for paper, the polarity
//! `imageproc::contours` treats as foreground.

pub mod binarize;
pub mod morphology;
pub mod regions;

pub use binarize::{adaptive_ink_mask, crop_gray, otsu_ink_mask, smooth};
pub use morphology::{close_rect, dilate_rect, erode_rect, open_rect};
pub use regions::{outer_boxes, polygon_area, polygon_centroid, trace_contours, union_box};
