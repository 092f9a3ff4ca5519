//! Scoring: identification validation, response validation and grading.

pub mod identification;
pub mod responses;

pub use identification::{booklet_code, ocr_agreement, validate_identification, IdValidation, Identification};
pub use responses::{score_responses, validate_responses, QuestionResult, QuestionStatus, Response, ScoreSummary};

use serde::Serialize;
use std::collections::BTreeMap;

use crate::answer_key::AnswerKey;
use crate::marks::SheetMarks;

/// Final, flat result for one sheet.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub identification_number: String,
    #[serde(flatten)]
    pub identification_validation: IdValidation,
    /// Identification number read from the handwriting boxes
    pub ocr_identification_number: String,
    /// `null` when there is no OCR result or no valid bubbled number
    pub identification_matches_ocr: Option<bool>,
    pub booklet_code: Option<String>,
    pub responses: BTreeMap<u32, Response>,
    pub summary: ScoreSummary,
    pub details: Vec<QuestionResult>,
}

impl ScoreReport {
    /// Scores evaluated marks against `key`, cross-checking the bubbled
    /// identification number against `ocr_number`.
    pub fn build(marks: &SheetMarks, ocr_number: &str, key: &AnswerKey) -> Self {
        let identification = validate_identification(marks);
        let identification_matches_ocr = ocr_agreement(&identification, ocr_number);
        let responses = validate_responses(marks);
        let (details, summary) = score_responses(&responses, key);

        crate::log(&format!(
            "Score: {} correct, {} wrong, {} unanswered of {}",
            summary.correct, summary.wrong, summary.unanswered, summary.total_questions
        ));

        ScoreReport {
            identification_number: identification.number,
            identification_validation: identification.validation,
            ocr_identification_number: ocr_number.to_string(),
            identification_matches_ocr,
            booklet_code: booklet_code(marks),
            responses,
            summary,
            details,
        }
    }
}
