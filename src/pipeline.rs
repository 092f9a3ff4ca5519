//! One-sheet scan: detection → suppression → mapping → fill → scoring, with
//! the identification strip read alongside as a cross-check.

use anyhow::Result;
use image::DynamicImage;
use serde::Serialize;
use std::time::Duration;

use crate::answer_key::AnswerKey;
use crate::cancel::CancelToken;
use crate::config::ScanConfig;
use crate::layout::LayoutDescriptor;
use crate::marks::{
    detect_marks, evaluate_marks, fill_mask, map_marks, sample_radius, suppress_duplicates, SheetMarks,
};
use crate::ocr::{locate_tesseract, read_identification, IdReading, Recognizer, TesseractEngine};
use crate::scoring::ScoreReport;

/// Everything produced for one sheet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetResult {
    pub marks: SheetMarks,
    /// `None` when the layout has no identification block
    pub identification: Option<IdReading>,
    pub report: ScoreReport,
}

impl SheetResult {
    /// Console summary of the scan.
    pub fn summary_lines(&self) -> Vec<String> {
        let filled = self.marks.filled_count();
        let total = self.marks.evaluated.len();
        let report = &self.report;
        let summary = &report.summary;

        let mut lines = vec![
            "================ SUMMARY REPORT ================".to_string(),
            format!(" Detected Bubbles  : {}", total),
            format!(" Filled Bubbles    : {}", filled),
            format!(" Unfilled Bubbles  : {}", total - filled),
            "------------------------------------------------".to_string(),
            format!(
                " Detected ID No    : {}",
                if report.identification_number.is_empty() {
                    "None"
                } else {
                    &report.identification_number
                }
            ),
        ];

        if !report.ocr_identification_number.is_empty() {
            lines.push(format!(" OCR Extracted     : {}", report.ocr_identification_number));
            let status = match report.identification_matches_ocr {
                Some(true) => "MATCH",
                Some(false) => "MISMATCH",
                None => "N/A",
            };
            lines.push(format!(" ID No Status      : {} (OCR Validation)", status));
        }
        if let Some(code) = &report.booklet_code {
            lines.push(format!(" Booklet Code      : {}", code));
        }

        lines.extend([
            "------------------------------------------------".to_string(),
            format!(" Correct Answers   : {}", summary.correct),
            format!(" Wrong Answers     : {}", summary.wrong),
            format!(" Unanswered        : {}", summary.unanswered),
            format!(" TOTAL SCORE       : {} / {}", summary.score, summary.total_questions),
            "================================================".to_string(),
        ]);
        lines
    }
}

/// Configured scanner. Holds no per-sheet state; one pipeline can process
/// any number of sheets.
pub struct Pipeline {
    config: ScanConfig,
    recognizer: Option<Box<dyn Recognizer>>,
    cancel: CancelToken,
}

impl Pipeline {
    /// Pipeline without a recognition engine: the identification strip is
    /// located but not read.
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            recognizer: None,
            cancel: CancelToken::new(),
        }
    }

    /// Pipeline reading the identification strip with tesseract, if it can
    /// be found.
    pub fn with_tesseract(config: ScanConfig) -> Self {
        let recognizer: Option<Box<dyn Recognizer>> = match locate_tesseract(&config.recognition) {
            Ok(paths) => Some(Box::new(TesseractEngine::new(
                paths,
                Duration::from_millis(config.recognition.timeout_ms),
            ))),
            Err(e) => {
                crate::log(&format!("Warning: OCR disabled: {}", e));
                None
            }
        };
        Self {
            recognizer,
            ..Self::new(config)
        }
    }

    pub fn with_recognizer(mut self, recognizer: Box<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that aborts an in-progress [`process`](Self::process) call.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scans one rasterized sheet.
    ///
    /// Recognition, mapping and scoring problems end up in the result as
    /// data; the only error is cancellation.
    pub fn process(
        &self,
        image: &DynamicImage,
        layout: &LayoutDescriptor,
        key: &AnswerKey,
    ) -> Result<SheetResult> {
        let cancel = &self.cancel;
        let gray = image.to_luma8();

        let [page_w, page_h] = layout.page_dimensions;
        if gray.dimensions() != (page_w, page_h) {
            crate::log(&format!(
                "Warning: image is {}x{}, layout expects {}x{}",
                gray.width(),
                gray.height(),
                page_w,
                page_h
            ));
        }

        let radius = layout.radius();
        let thresholds = self.config.thresholds.scaled_for_radius(radius);

        let candidates = detect_marks(&gray, radius, &thresholds, cancel)?;
        if candidates.is_empty() {
            crate::log("Warning: no bubbles detected");
        }
        let candidates = suppress_duplicates(&candidates, thresholds.duplicate_radius_px, cancel)?;
        let mapped = map_marks(&candidates, layout, &thresholds, self.config.numbering, cancel)?;

        let mask = fill_mask(&gray, thresholds.blur_sigma);
        let disk_radius = sample_radius(radius, thresholds.fill_disk_ratio, thresholds.min_fill_disk_radius);
        let fill_threshold = layout
            .bubble_style
            .fill_threshold
            .unwrap_or(thresholds.fill_threshold);
        let evaluated = evaluate_marks(&mask, &candidates, &mapped, disk_radius, fill_threshold, cancel)?;

        let marks = SheetMarks {
            candidates,
            mapped,
            evaluated,
        };

        let identification = layout
            .id_block()
            .map(|block| {
                read_identification(
                    &gray,
                    block,
                    &thresholds,
                    self.recognizer.as_deref(),
                    self.config.recognition.max_calls_per_sheet,
                    cancel,
                )
            })
            .transpose()?;

        let ocr_number = identification.as_ref().map(|r| r.text.as_str()).unwrap_or("");
        let report = ScoreReport::build(&marks, ocr_number, key);

        Ok(SheetResult {
            marks,
            identification,
            report,
        })
    }
}
