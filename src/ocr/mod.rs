pub mod cells;
pub mod digits;
pub mod engine;
pub mod preprocess;
pub mod setup;

pub use cells::{locate_id_boxes, GridSource, IdentificationBox};
pub use digits::{read_id_digits, CellOutcome, PassStrategy, RecognitionBudget, UNKNOWN_DIGIT};
pub use engine::{RecognitionMode, Recognizer, TesseractEngine};
pub use setup::{locate_tesseract, TesseractPaths};

use anyhow::Result;
use image::GrayImage;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::config::Thresholds;
use crate::layout::IdBlock;

/// Identification number read from the handwriting boxes.
#[derive(Debug, Clone, Serialize)]
pub struct IdReading {
    pub boxes: Vec<IdentificationBox>,
    pub grid: GridSource,
    /// One character per box; empty when no engine was available
    pub text: String,
    pub cells: Vec<CellOutcome>,
}

/// High-level function: page → identification boxes → digit string.
///
/// Without a recognizer the boxes are still located and `text` is empty.
/// `max_calls` caps engine calls for the whole strip.
pub fn read_identification(
    gray: &GrayImage,
    block: &IdBlock,
    thresholds: &Thresholds,
    recognizer: Option<&dyn Recognizer>,
    max_calls: Option<usize>,
    cancel: &CancelToken,
) -> Result<IdReading> {
    let (boxes, grid) = locate_id_boxes(gray, block, thresholds);

    let Some(recognizer) = recognizer else {
        crate::log("No recognition engine available, skipping ID OCR");
        return Ok(IdReading {
            boxes,
            grid,
            text: String::new(),
            cells: Vec::new(),
        });
    };

    let mut budget = match max_calls {
        Some(limit) => RecognitionBudget::new(limit),
        None => RecognitionBudget::for_digits(boxes.len()),
    };
    let (text, cells) = read_id_digits(gray, &boxes, recognizer, thresholds, &mut budget, cancel)?;

    crate::log(&format!(
        "ID OCR: \"{}\" via {:?} ({} calls left)",
        text,
        grid,
        budget.remaining()
    ));

    Ok(IdReading {
        boxes,
        grid,
        text,
        cells,
    })
}
