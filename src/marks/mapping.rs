//! Structural mapping: logical identity from relative position.
//!
//! Absolute coordinates drift between prints and scans, so identities come
//! from gap clustering instead. The page is split into zones once (header
//! above `header_split_y_px`, questions below; identification left of
//! `id_split_x_px`, option code right of it) and within each zone marks are
//! grouped into columns and rows wherever consecutive coordinates jump by
//! more than a gap threshold.

use anyhow::Result;
use std::collections::HashSet;

use super::types::{MappedMark, MarkCandidate, MarkIdentity, CODE_GROUP, ID_GROUP};
use crate::cancel::CancelToken;
use crate::config::{NumberingPolicy, Thresholds};
use crate::layout::{option_label, LayoutDescriptor};

/// Splits `sorted` (indices ordered by `coord`) wherever two neighbours are
/// more than `gap` apart.
fn split_by_gap(sorted: &[usize], coord: impl Fn(usize) -> i32, gap: f32) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();

    for &idx in sorted {
        if let Some(&prev) = current.last() {
            if (coord(idx) - coord(prev)) as f32 > gap {
                groups.push(std::mem::take(&mut current));
            }
        }
        current.push(idx);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

/// Collects mapped marks, refusing any identity seen before.
struct Assignments {
    marks: Vec<MappedMark>,
    seen: HashSet<MarkIdentity>,
}

impl Assignments {
    fn new() -> Self {
        Self {
            marks: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn assign(&mut self, candidate: usize, identity: MarkIdentity, group: &str, value: String) {
        if !self.seen.insert(identity) {
            crate::log(&format!(
                "Warning: identity {:?} already assigned, ignoring mark {}",
                identity, candidate
            ));
            return;
        }
        self.marks.push(MappedMark {
            candidate,
            identity,
            group: group.to_string(),
            value,
        });
    }
}

/// Assigns identities to deduplicated candidates.
///
/// Returns mapped marks referring to `candidates` by index. Zones whose
/// structure disagrees with the layout are truncated or skipped with a logged
/// warning; the only error is cancellation.
pub fn map_marks(
    candidates: &[MarkCandidate],
    layout: &LayoutDescriptor,
    thresholds: &Thresholds,
    numbering: NumberingPolicy,
    cancel: &CancelToken,
) -> Result<Vec<MappedMark>> {
    let x = |i: usize| candidates[i].x;
    let y = |i: usize| candidates[i].y;

    let (header, questions): (Vec<usize>, Vec<usize>) =
        (0..candidates.len()).partition(|&i| (y(i) as f32) < thresholds.header_split_y_px);

    crate::log(&format!(
        "Mapping: {} header marks, {} question marks (split at y={:.0})",
        header.len(),
        questions.len(),
        thresholds.header_split_y_px
    ));

    let mut out = Assignments::new();

    // Identification block (top left)
    if let Some(id_block) = layout.id_block() {
        let mut pool: Vec<usize> = header
            .iter()
            .copied()
            .filter(|&i| (x(i) as f32) < thresholds.id_split_x_px)
            .collect();
        pool.sort_by_key(|&i| x(i));

        let columns = split_by_gap(&pool, x, thresholds.id_column_gap_px);
        if columns.len() > id_block.digits {
            crate::log(&format!(
                "Warning: found {} identification columns, layout declares {}; ignoring extras",
                columns.len(),
                id_block.digits
            ));
        }

        for (column, mut members) in columns.into_iter().take(id_block.digits).enumerate() {
            members.sort_by_key(|&i| y(i));
            if members.len() > id_block.rows {
                crate::log(&format!(
                    "Warning: identification column {} has {} marks, layout declares {} rows",
                    column,
                    members.len(),
                    id_block.rows
                ));
            }
            for (row, &idx) in members.iter().take(id_block.rows).enumerate() {
                cancel.check()?;
                out.assign(
                    idx,
                    MarkIdentity::IdDigit { column, row },
                    ID_GROUP,
                    id_block.label(row),
                );
            }
        }
    }

    // Option-code block (top right)
    if let Some(code_block) = layout.code_block() {
        let mut pool: Vec<usize> = header
            .iter()
            .copied()
            .filter(|&i| (x(i) as f32) >= thresholds.id_split_x_px)
            .collect();
        pool.sort_by_key(|&i| x(i));

        if pool.len() > code_block.options.len() {
            crate::log(&format!(
                "Warning: found {} option-code marks, layout declares {}",
                pool.len(),
                code_block.options.len()
            ));
        }
        for (index, (&idx, option)) in pool.iter().zip(&code_block.options).enumerate() {
            cancel.check()?;
            out.assign(idx, MarkIdentity::Code { index }, CODE_GROUP, option.clone());
        }
    }

    // Question blocks (bottom)
    if questions.len() < thresholds.min_question_marks {
        crate::log(&format!(
            "Warning: too few question marks ({} < {}), skipping question mapping",
            questions.len(),
            thresholds.min_question_marks
        ));
        return Ok(out.marks);
    }

    let mut pool = questions;
    pool.sort_by_key(|&i| x(i));
    let columns = split_by_gap(&pool, x, thresholds.question_column_gap_px);
    let detected_columns = columns.len();

    let blocks = layout.question_blocks();
    if detected_columns != blocks.len() {
        crate::log(&format!(
            "Warning: detected {} question columns, layout declares {} blocks",
            detected_columns,
            blocks.len()
        ));
    }

    for (col_idx, (block, mut members)) in blocks.iter().zip(columns).enumerate() {
        members.sort_by_key(|&i| y(i));
        let rows = split_by_gap(&members, y, thresholds.question_row_gap_px);

        for (row_idx, mut row) in rows.into_iter().enumerate() {
            row.sort_by_key(|&i| x(i));

            let number = match numbering {
                NumberingPolicy::AcrossColumns => {
                    (row_idx * detected_columns + col_idx + 1) as u32
                }
                NumberingPolicy::DownColumns => block.first_question + row_idx as u32,
            };

            for (option, &idx) in row.iter().take(block.options_count).enumerate() {
                cancel.check()?;
                out.assign(
                    idx,
                    MarkIdentity::Question { number, option },
                    &block.name,
                    option_label(option),
                );
            }
        }
    }

    crate::log(&format!("Mapping: assigned {} marks", out.marks.len()));

    Ok(out.marks)
}
