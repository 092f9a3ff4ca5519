//! Multi-pass digit reading.
//!
//! Each cell is offered to the engine as a small set of morphological
//! variants, in a fixed order, restricted to digits. When none yields a
//! digit, one unconstrained read is mapped through a table of symbols the
//! engine commonly confuses with handwritten digits.

use anyhow::Result;
use image::GrayImage;
use serde::Serialize;

use super::cells::IdentificationBox;
use super::engine::{RecognitionMode, Recognizer};
use super::preprocess::{crop_cell, isolate_digit, prepare_for_recognition};
use crate::cancel::CancelToken;
use crate::config::Thresholds;
use crate::imaging::{dilate_rect, erode_rect};

/// Placeholder for a digit position that could not be read.
pub const UNKNOWN_DIGIT: char = '?';

/// Engine calls allowed per digit cell: three variants and one fallback.
pub const CALLS_PER_CELL: usize = 4;

/// Side of the square structuring element used for the variants (px).
const VARIANT_KERNEL: u32 = 2;

/// Morphological variant of a prepared cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStrategy {
    /// Paper grown into the strokes
    Thinned,
    Original,
    /// Strokes grown into the paper
    Thickened,
}

/// Order in which variants are tried; the first digit wins.
pub const PASS_ORDER: [PassStrategy; 3] = [
    PassStrategy::Thinned,
    PassStrategy::Original,
    PassStrategy::Thickened,
];

impl PassStrategy {
    /// Applies the variant to a dark-on-light image.
    pub fn apply(self, prepared: &GrayImage) -> GrayImage {
        match self {
            PassStrategy::Thinned => dilate_rect(prepared, VARIANT_KERNEL, VARIANT_KERNEL),
            PassStrategy::Original => prepared.clone(),
            PassStrategy::Thickened => erode_rect(prepared, VARIANT_KERNEL, VARIANT_KERNEL),
        }
    }
}

/// How a digit position was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum CellOutcome {
    Pass { strategy: PassStrategy },
    /// Unconstrained read mapped through the confusion table
    Corrected { symbol: char },
    Unresolved,
}

/// Maps a symbol the engine confuses with a digit to that digit.
pub fn correct_symbol(c: char) -> Option<char> {
    let digit = match c {
        '0'..='9' => c,
        '|' | 'I' | 'l' | '!' | ']' => '1',
        'Z' | 'z' => '2',
        'A' | 'H' => '4',
        'S' | 's' | '$' => '5',
        'b' | 'G' => '6',
        'B' => '8',
        'g' | 'q' => '9',
        'O' | 'D' => '0',
        _ => return None,
    };
    Some(digit)
}

/// The only character of `text`, ignoring surrounding whitespace.
fn single_char(text: &str) -> Option<char> {
    let mut chars = text.trim().chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(c)
}

/// Per-sheet cap on engine calls.
#[derive(Debug)]
pub struct RecognitionBudget {
    remaining: usize,
    warned: bool,
}

impl RecognitionBudget {
    pub fn new(max_calls: usize) -> Self {
        Self {
            remaining: max_calls,
            warned: false,
        }
    }

    /// Budget for `digits` cells: every pass plus the fallback for each.
    pub fn for_digits(digits: usize) -> Self {
        Self::new(digits * CALLS_PER_CELL)
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Consumes one call, or returns false once the budget is spent.
    fn take(&mut self) -> bool {
        if self.remaining == 0 {
            if !self.warned {
                crate::log("Warning: recognition call budget exhausted, remaining cells left unknown");
                self.warned = true;
            }
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Reads one prepared cell (dark digit on light paper).
pub fn read_cell(
    prepared: &GrayImage,
    recognizer: &dyn Recognizer,
    budget: &mut RecognitionBudget,
) -> (char, CellOutcome) {
    for strategy in PASS_ORDER {
        if !budget.take() {
            return (UNKNOWN_DIGIT, CellOutcome::Unresolved);
        }
        let variant = strategy.apply(prepared);
        match recognizer.recognize(&variant, RecognitionMode::Digits) {
            Ok(text) => {
                if let Some(c) = single_char(&text).filter(|c| c.is_ascii_digit()) {
                    return (c, CellOutcome::Pass { strategy });
                }
            }
            Err(e) => crate::log(&format!("Recognition pass {:?} failed: {}", strategy, e)),
        }
    }

    if !budget.take() {
        return (UNKNOWN_DIGIT, CellOutcome::Unresolved);
    }
    match recognizer.recognize(prepared, RecognitionMode::Any) {
        Ok(text) => {
            if let Some((symbol, digit)) =
                single_char(&text).and_then(|s| correct_symbol(s).map(|d| (s, d)))
            {
                return (digit, CellOutcome::Corrected { symbol });
            }
        }
        Err(e) => crate::log(&format!("Recognition fallback failed: {}", e)),
    }

    (UNKNOWN_DIGIT, CellOutcome::Unresolved)
}

/// Reads every identification cell in order; one character per box.
pub fn read_id_digits(
    gray: &GrayImage,
    boxes: &[IdentificationBox],
    recognizer: &dyn Recognizer,
    thresholds: &Thresholds,
    budget: &mut RecognitionBudget,
    cancel: &CancelToken,
) -> Result<(String, Vec<CellOutcome>)> {
    let mut text = String::with_capacity(boxes.len());
    let mut outcomes = Vec::with_capacity(boxes.len());

    for (idx, cell) in boxes.iter().enumerate() {
        cancel.check()?;

        let Some(cell_img) = crop_cell(gray, cell, thresholds.cell_padding_px) else {
            crate::log(&format!("ID cell {} lies outside the image", idx));
            text.push(UNKNOWN_DIGIT);
            outcomes.push(CellOutcome::Unresolved);
            continue;
        };

        let prepared = prepare_for_recognition(&isolate_digit(&cell_img, thresholds));
        let (digit, outcome) = read_cell(&prepared, recognizer, budget);
        crate::log(&format!("ID cell {}: '{}' ({:?})", idx, digit, outcome));

        text.push(digit);
        outcomes.push(outcome);
    }

    Ok((text, outcomes))
}
