use serde::Serialize;
use std::collections::BTreeMap;

use crate::marks::{MarkIdentity, SheetMarks};

/// Validity of the identification number read from the bubbles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "identificationStatus", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdValidation {
    Ok,
    /// A column has more than one filled bubble
    Invalid {
        #[serde(rename = "identificationReason")]
        reason: String,
    },
    /// No identification bubble is filled
    NotDetected,
}

/// Identification number as marked in bubbles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identification {
    /// Digits in column order; `INVALID` when invalid, empty when not detected
    pub number: String,
    pub validation: IdValidation,
}

impl Identification {
    pub fn is_valid(&self) -> bool {
        self.validation == IdValidation::Ok
    }
}

/// Reads the identification number from the filled bubbles.
///
/// Columns are scanned left to right. A column with no filled bubble adds
/// nothing; the first column with several filled bubbles makes the whole
/// number invalid and stops the scan.
pub fn validate_identification(marks: &SheetMarks) -> Identification {
    let mut columns: BTreeMap<usize, Vec<(usize, String)>> = BTreeMap::new();
    for view in marks.views().into_iter().filter(|v| v.filled()) {
        if let MarkIdentity::IdDigit { column, row } = view.mapped.identity {
            columns
                .entry(column)
                .or_default()
                .push((row, view.mapped.value.clone()));
        }
    }

    if columns.is_empty() {
        return Identification {
            number: String::new(),
            validation: IdValidation::NotDetected,
        };
    }

    let mut number = String::new();
    for (column, values) in &columns {
        if values.len() > 1 {
            let reason = format!("Column {} has {} bubbles filled", column, values.len());
            crate::log(&format!("Identification invalid: {}", reason));
            return Identification {
                number: "INVALID".to_string(),
                validation: IdValidation::Invalid { reason },
            };
        }
        number.push_str(&values[0].1);
    }

    Identification {
        number,
        validation: IdValidation::Ok,
    }
}

/// Whether the bubbled and OCR'd numbers agree. `None` when there is nothing
/// to compare: no OCR result, or no valid bubbled number.
pub fn ocr_agreement(identification: &Identification, ocr: &str) -> Option<bool> {
    if ocr.is_empty() || !identification.is_valid() {
        return None;
    }
    Some(identification.number == ocr)
}

/// Option-code value: the single filled code bubble, if exactly one is.
pub fn booklet_code(marks: &SheetMarks) -> Option<String> {
    let filled: Vec<&str> = marks
        .views()
        .into_iter()
        .filter(|v| v.filled() && matches!(v.mapped.identity, MarkIdentity::Code { .. }))
        .map(|v| v.mapped.value.as_str())
        .collect();

    match filled.as_slice() {
        [code] => Some(code.to_string()),
        [] => None,
        many => {
            crate::log(&format!(
                "Warning: {} option-code bubbles filled ({}), code not determined",
                many.len(),
                many.join(", ")
            ));
            None
        }
    }
}
