//! Bubble marks: detection, duplicate suppression, structural mapping and
//! fill evaluation.

pub mod dedup;
pub mod detect;
pub mod fill;
pub mod mapping;
pub mod types;

pub use dedup::suppress_duplicates;
pub use detect::detect_marks;
pub use fill::{evaluate_marks, fill_mask, fill_ratio, sample_radius};
pub use mapping::map_marks;
pub use types::{
    EvaluatedMark, MappedMark, MarkCandidate, MarkIdentity, MarkView, SheetMarks, CODE_GROUP,
    ID_GROUP,
};
