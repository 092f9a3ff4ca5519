//! Mark records for each pipeline stage.
//!
//! Each stage owns one array. Later stages refer back to earlier ones by
//! index instead of copying: a [`MappedMark`] points at its candidate, an
//! [`EvaluatedMark`] at its mapped mark.

use serde::Serialize;
use std::fmt;

/// A bubble-shaped region found by the detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MarkCandidate {
    /// Centroid x (px)
    pub x: i32,
    /// Centroid y (px)
    pub y: i32,
    /// Nominal radius from the layout, not a measurement
    pub radius: u32,
    /// Enclosed contour area (px²)
    pub area: f64,
    /// 4π·area / perimeter²
    pub circularity: f64,
}

/// Logical role of a mark. Unique within one sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkIdentity {
    /// Row `row` of identification digit column `column`
    IdDigit { column: usize, row: usize },
    /// `index`-th option of the option-code block
    Code { index: usize },
    /// Option `option` (0 = A) of question `number`
    Question { number: u32, option: usize },
}

pub const ID_GROUP: &str = "rollNumber";
pub const CODE_GROUP: &str = "testBookletCode";

/// A candidate with its logical identity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MappedMark {
    /// Index into the candidate array
    pub candidate: usize,
    pub identity: MarkIdentity,
    /// Block name: `rollNumber`, `testBookletCode` or a question block name
    pub group: String,
    /// Digit label or option letter this mark stands for
    pub value: String,
}

impl MappedMark {
    pub fn question(&self) -> Option<u32> {
        match self.identity {
            MarkIdentity::Question { number, .. } => Some(number),
            _ => None,
        }
    }

    pub fn id_column(&self) -> Option<usize> {
        match self.identity {
            MarkIdentity::IdDigit { column, .. } => Some(column),
            _ => None,
        }
    }
}

impl fmt::Display for MappedMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity {
            MarkIdentity::IdDigit { column, .. } => write!(f, "roll_col{}_val{}", column, self.value),
            MarkIdentity::Code { .. } => write!(f, "testBooklet_{}", self.value),
            MarkIdentity::Question { number, .. } => write!(f, "q{}_{}", number, self.value),
        }
    }
}

/// Fill measurement of a mapped mark.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EvaluatedMark {
    /// Index into the mapped array
    pub mapped: usize,
    /// Ink coverage of the inner disk, 0.0 to 1.0
    pub fill_ratio: f32,
    pub filled: bool,
}

/// All mark arrays of one sheet.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SheetMarks {
    pub candidates: Vec<MarkCandidate>,
    pub mapped: Vec<MappedMark>,
    pub evaluated: Vec<EvaluatedMark>,
}

/// Borrowed view joining one evaluated mark with its earlier stages.
#[derive(Clone, Copy, Debug)]
pub struct MarkView<'a> {
    pub candidate: &'a MarkCandidate,
    pub mapped: &'a MappedMark,
    pub evaluation: &'a EvaluatedMark,
}

impl<'a> MarkView<'a> {
    pub fn filled(&self) -> bool {
        self.evaluation.filled
    }
}

impl SheetMarks {
    /// Joins every evaluated mark with its mapped mark and candidate.
    pub fn views(&self) -> Vec<MarkView<'_>> {
        self.evaluated
            .iter()
            .filter_map(|evaluation| {
                let mapped = self.mapped.get(evaluation.mapped)?;
                let candidate = self.candidates.get(mapped.candidate)?;
                Some(MarkView {
                    candidate,
                    mapped,
                    evaluation,
                })
            })
            .collect()
    }

    pub fn filled_count(&self) -> usize {
        self.evaluated.iter().filter(|e| e.filled).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: i32, y: i32) -> MarkCandidate {
        MarkCandidate {
            x,
            y,
            radius: 22,
            area: 1500.0,
            circularity: 0.9,
        }
    }

    #[test]
    fn test_display_keys() {
        let roll = MappedMark {
            candidate: 0,
            identity: MarkIdentity::IdDigit { column: 2, row: 7 },
            group: ID_GROUP.into(),
            value: "7".into(),
        };
        let question = MappedMark {
            candidate: 1,
            identity: MarkIdentity::Question { number: 12, option: 1 },
            group: "col1".into(),
            value: "B".into(),
        };
        assert_eq!(roll.to_string(), "roll_col2_val7");
        assert_eq!(question.to_string(), "q12_B");
        assert_eq!(question.question(), Some(12));
        assert_eq!(roll.question(), None);
        assert_eq!(roll.id_column(), Some(2));
    }

    #[test]
    fn test_views_follow_indices() {
        let marks = SheetMarks {
            candidates: vec![candidate(10, 10), candidate(50, 10)],
            mapped: vec![MappedMark {
                candidate: 1,
                identity: MarkIdentity::Code { index: 0 },
                group: CODE_GROUP.into(),
                value: "A".into(),
            }],
            evaluated: vec![EvaluatedMark {
                mapped: 0,
                fill_ratio: 0.8,
                filled: true,
            }],
        };

        let views = marks.views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].candidate.x, 50);
        assert!(views[0].filled());
        assert_eq!(marks.filled_count(), 1);
    }
}
