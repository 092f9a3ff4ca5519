//! Sheet layout descriptor.
//!
//! Read-only description of the printed sheet, loaded from the template JSON:
//! page size, nominal bubble size, the identification (roll number) block,
//! the option-code (test booklet) block and the question blocks. Marks are
//! never placed from these coordinates; they only size thresholds, name
//! labels and bound the identification strip search.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleStyle {
    /// Overrides the configured fill threshold for this sheet
    pub fill_threshold: Option<f32>,
}

/// Identification number block: `digits` columns of `rows` bubbles each.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdBlock {
    pub origin: [i32; 2],
    pub digits: usize,
    pub rows: usize,
    /// Value of each row, top to bottom; defaults to "0", "1", ...
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default = "default_digits_gap")]
    pub digits_gap: i32,
    #[serde(default = "default_labels_gap")]
    pub labels_gap: i32,
}

impl IdBlock {
    /// Label assigned to the `row`-th bubble of a column.
    pub fn label(&self, row: usize) -> String {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(row).cloned())
            .unwrap_or_else(|| row.to_string())
    }
}

/// Option-code block: a single row of bubbles, one per code.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub origin: [i32; 2],
    pub options: Vec<String>,
    #[serde(default = "default_bubbles_gap")]
    pub bubbles_gap: i32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderBlocks {
    pub roll_number: Option<IdBlock>,
    pub test_booklet_code: Option<CodeBlock>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDefaults {
    pub bubbles_gap: i32,
    pub labels_gap: i32,
    pub rows_per_block: usize,
    pub options_count: usize,
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self {
            bubbles_gap: default_bubbles_gap(),
            labels_gap: 32,
            rows_per_block: 12,
            options_count: 4,
        }
    }
}

/// A question block as written in the template; unset fields fall back to
/// [`FieldDefaults`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldBlockSpec {
    pub origin: [i32; 2],
    /// e.g. "q1..12"
    #[serde(default)]
    pub question_range: Option<String>,
    #[serde(default)]
    pub rows: Option<usize>,
    #[serde(default)]
    pub options_count: Option<usize>,
    #[serde(default)]
    pub bubbles_gap: Option<i32>,
    #[serde(default)]
    pub labels_gap: Option<i32>,
}

/// A question block with its defaults resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionBlock {
    pub name: String,
    pub origin: [i32; 2],
    pub rows: usize,
    pub options_count: usize,
    pub bubbles_gap: i32,
    pub labels_gap: i32,
    pub first_question: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDescriptor {
    /// [width, height] in pixels
    pub page_dimensions: [u32; 2],
    /// [width, height] of one bubble in pixels
    pub bubble_dimensions: [u32; 2],
    #[serde(default)]
    pub bubble_style: BubbleStyle,
    #[serde(default)]
    pub header_blocks: HeaderBlocks,
    #[serde(default)]
    pub field_defaults: FieldDefaults,
    #[serde(default)]
    pub field_blocks: BTreeMap<String, FieldBlockSpec>,
}

fn default_digits_gap() -> i32 {
    48
}

fn default_labels_gap() -> i32 {
    26
}

fn default_bubbles_gap() -> i32 {
    26
}

/// Letter for the `index`-th option of a row: A, B, C, ...
pub fn option_label(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        index.to_string()
    }
}

impl LayoutDescriptor {
    /// Loads and validates a layout from a template JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout: {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Invalid layout: {}", path.display()))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let layout: LayoutDescriptor =
            serde_json::from_str(contents).context("Failed to parse layout JSON")?;
        layout.validate()?;
        Ok(layout)
    }

    /// Nominal bubble radius in pixels.
    pub fn radius(&self) -> u32 {
        self.bubble_dimensions[0].min(self.bubble_dimensions[1]) / 2
    }

    pub fn id_block(&self) -> Option<&IdBlock> {
        self.header_blocks.roll_number.as_ref()
    }

    pub fn code_block(&self) -> Option<&CodeBlock> {
        self.header_blocks.test_booklet_code.as_ref()
    }

    /// Question blocks with defaults resolved, sorted left to right by origin.
    pub fn question_blocks(&self) -> Vec<QuestionBlock> {
        let defaults = &self.field_defaults;
        let mut blocks: Vec<QuestionBlock> = self
            .field_blocks
            .iter()
            .map(|(name, block)| QuestionBlock {
                name: name.clone(),
                origin: block.origin,
                rows: block.rows.unwrap_or(defaults.rows_per_block),
                options_count: block.options_count.unwrap_or(defaults.options_count),
                bubbles_gap: block.bubbles_gap.unwrap_or(defaults.bubbles_gap),
                labels_gap: block.labels_gap.unwrap_or(defaults.labels_gap),
                first_question: block
                    .question_range
                    .as_deref()
                    .and_then(parse_first_question)
                    .unwrap_or(1),
            })
            .collect();
        blocks.sort_by_key(|b| b.origin[0]);
        blocks
    }

    /// Checks that every spacing is positive and every count non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.page_dimensions.contains(&0) {
            return Err(anyhow!("pageDimensions must be positive"));
        }
        if self.radius() == 0 {
            return Err(anyhow!("bubbleDimensions must be at least 2 px"));
        }
        if let Some(id) = self.id_block() {
            if id.digits == 0 || id.rows == 0 {
                return Err(anyhow!("rollNumber digits and rows must be positive"));
            }
            if id.digits_gap <= 0 || id.labels_gap <= 0 {
                return Err(anyhow!("rollNumber gaps must be positive"));
            }
        }
        if let Some(code) = self.code_block() {
            if code.options.is_empty() {
                return Err(anyhow!("testBookletCode needs at least one option"));
            }
            if code.bubbles_gap <= 0 {
                return Err(anyhow!("testBookletCode bubblesGap must be positive"));
            }
        }
        for block in self.question_blocks() {
            if block.rows == 0 || block.options_count == 0 {
                return Err(anyhow!(
                    "field block '{}' rows and optionsCount must be positive",
                    block.name
                ));
            }
            if block.bubbles_gap <= 0 || block.labels_gap <= 0 {
                return Err(anyhow!("field block '{}' gaps must be positive", block.name));
            }
        }
        Ok(())
    }
}

/// Parses the first question number from a range like "q13..24".
fn parse_first_question(range: &str) -> Option<u32> {
    static QUESTION_RANGE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = QUESTION_RANGE
        .get_or_init(|| Regex::new(r"^\s*q?(\d+)").ok())
        .as_ref()?;
    re.captures(range)?.get(1)?.as_str().parse().ok()
}
