//! Scan configuration.
//!
//! Loads settings from config.json. Every pixel constant here is expressed in
//! pixels at the calibration resolution (300 DPI, where a printed bubble is
//! 44 px across) and is rescaled from the layout's nominal bubble size at run
//! time.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Bubble radius, in pixels, the default thresholds were calibrated against.
pub const CALIBRATION_RADIUS_PX: f32 = 22.0;

/// How question numbers are laid out across the detected question columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingPolicy {
    /// Row-major across all columns: row × columns + column + 1.
    #[default]
    AcrossColumns,
    /// Column-major: each block counts down from its declared first question.
    DownColumns,
}

/// Detection, mapping and OCR geometry thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Smallest accepted contour area as a multiple of π·r²
    pub min_area_ratio: f64,
    /// Largest accepted contour area as a multiple of π·r²
    pub max_area_ratio: f64,
    /// Contours must be strictly rounder than this (squares score ≈0.78)
    pub min_circularity: f64,
    /// Adaptive binarization window radius (px)
    pub adaptive_block_radius: u32,
    /// Adaptive binarization offset below the local mean (grey levels)
    pub adaptive_offset: i16,
    /// Gaussian blur sigma applied before binarization
    pub blur_sigma: f32,

    /// Centers closer than this are the same physical mark (px)
    pub duplicate_radius_px: f32,

    /// Marks above this y are header marks (px)
    pub header_split_y_px: f32,
    /// Header marks left of this x belong to the identification block (px)
    pub id_split_x_px: f32,
    /// x-gap that starts a new identification column (px)
    pub id_column_gap_px: f32,
    /// x-gap that separates two question columns (px)
    pub question_column_gap_px: f32,
    /// y-gap that starts a new question row (px)
    pub question_row_gap_px: f32,
    /// Fewer question marks than this abandons question mapping
    pub min_question_marks: usize,

    /// Sampled disk radius as a fraction of the mark radius
    pub fill_disk_ratio: f32,
    /// Smallest sampled disk radius (px, not rescaled)
    pub min_fill_disk_radius: u32,
    /// Fill ratio at or above which a mark is filled, unless the layout overrides it
    pub fill_threshold: f32,

    /// Extra width searched around the identification block for its strip (px)
    pub strip_search_extra_width_px: f32,
    /// How far above the identification bubbles the strip search starts (px)
    pub strip_search_above_px: f32,
    /// Clearance between the strip search region and the bubbles (px)
    pub strip_search_clearance_px: f32,
    /// Minimum strip width (px)
    pub strip_min_width_px: f32,
    /// Minimum strip height (px)
    pub strip_min_height_px: f32,
    /// Vertical structuring element length for grid line extraction (px)
    pub grid_line_kernel_px: f32,
    /// Grid lines closer than this are one separator (px)
    pub grid_line_merge_px: f32,
    /// Inter-line gaps outside (min, max) are not cells (px)
    pub cell_min_width_px: f32,
    pub cell_max_width_px: f32,
    /// Consistent gaps required before the measured cell width is trusted
    pub min_stable_gaps: usize,
    /// Fallback grid starts this far left of the identification origin (px)
    pub fallback_offset_px: f32,
    /// Fallback boxes end this far above the identification origin (px)
    pub fallback_box_clearance_px: f32,
    /// Fallback box height (px)
    pub fallback_box_height_px: f32,
    /// Horizontal inset applied to every cell before reading it (px)
    pub cell_padding_px: f32,
    /// Ink blobs narrower than this are noise (px)
    pub blob_min_width_px: f32,
    /// Ink blobs shorter than this are noise (px)
    pub blob_min_height_px: f32,
    /// Blobs spanning at least this fraction of the cell height are borders
    pub blob_max_height_ratio: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_area_ratio: 0.5,
            max_area_ratio: 5.0,
            min_circularity: 0.85,
            adaptive_block_radius: 5,
            adaptive_offset: 2,
            blur_sigma: 1.1,
            duplicate_radius_px: 10.0,
            header_split_y_px: 900.0,
            id_split_x_px: 1100.0,
            id_column_gap_px: 30.0,
            question_column_gap_px: 60.0,
            question_row_gap_px: 25.0,
            min_question_marks: 20,
            fill_disk_ratio: 0.6,
            min_fill_disk_radius: 2,
            fill_threshold: 0.35,
            strip_search_extra_width_px: 150.0,
            strip_search_above_px: 200.0,
            strip_search_clearance_px: 30.0,
            strip_min_width_px: 200.0,
            strip_min_height_px: 20.0,
            grid_line_kernel_px: 20.0,
            grid_line_merge_px: 10.0,
            cell_min_width_px: 40.0,
            cell_max_width_px: 80.0,
            min_stable_gaps: 4,
            fallback_offset_px: 68.0,
            fallback_box_clearance_px: 35.0,
            fallback_box_height_px: 60.0,
            cell_padding_px: 4.0,
            blob_min_width_px: 2.0,
            blob_min_height_px: 10.0,
            blob_max_height_ratio: 0.95,
        }
    }
}

impl Thresholds {
    /// Returns a copy with every pixel distance rescaled for a sheet whose
    /// nominal bubble radius is `radius` pixels.
    pub fn scaled_for_radius(&self, radius: u32) -> Thresholds {
        let factor = if radius == 0 {
            1.0
        } else {
            radius as f32 / CALIBRATION_RADIUS_PX
        };
        if (factor - 1.0).abs() < f32::EPSILON {
            return self.clone();
        }

        Thresholds {
            duplicate_radius_px: self.duplicate_radius_px * factor,
            header_split_y_px: self.header_split_y_px * factor,
            id_split_x_px: self.id_split_x_px * factor,
            id_column_gap_px: self.id_column_gap_px * factor,
            question_column_gap_px: self.question_column_gap_px * factor,
            question_row_gap_px: self.question_row_gap_px * factor,
            strip_search_extra_width_px: self.strip_search_extra_width_px * factor,
            strip_search_above_px: self.strip_search_above_px * factor,
            strip_search_clearance_px: self.strip_search_clearance_px * factor,
            strip_min_width_px: self.strip_min_width_px * factor,
            strip_min_height_px: self.strip_min_height_px * factor,
            grid_line_kernel_px: self.grid_line_kernel_px * factor,
            grid_line_merge_px: self.grid_line_merge_px * factor,
            cell_min_width_px: self.cell_min_width_px * factor,
            cell_max_width_px: self.cell_max_width_px * factor,
            fallback_offset_px: self.fallback_offset_px * factor,
            fallback_box_clearance_px: self.fallback_box_clearance_px * factor,
            fallback_box_height_px: self.fallback_box_height_px * factor,
            cell_padding_px: self.cell_padding_px * factor,
            blob_min_width_px: self.blob_min_width_px * factor,
            blob_min_height_px: self.blob_min_height_px * factor,
            ..self.clone()
        }
    }
}

/// Recognition engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Path to the tesseract executable; discovered when unset
    pub tesseract_path: Option<PathBuf>,
    /// tessdata directory passed to tesseract; its own default when unset
    pub tessdata_dir: Option<PathBuf>,
    /// Per-invocation timeout (milliseconds)
    pub timeout_ms: u64,
    /// Hard cap on engine calls for one sheet; 4 per digit cell when unset
    pub max_calls_per_sheet: Option<usize>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            timeout_ms: 5000,
            max_calls_per_sheet: None,
        }
    }
}

/// Complete scan configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub thresholds: Thresholds,
    pub numbering: NumberingPolicy,
    pub recognition: RecognitionConfig,
}

impl ScanConfig {
    /// Loads configuration from `config_path`, or returns defaults if the
    /// file is missing or unreadable.
    pub fn load(config_path: &Path) -> Self {
        crate::log(&format!("Looking for config at: {}", config_path.display()));

        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(contents) => match serde_json::from_str(&contents) {
                    Ok(config) => {
                        crate::log("Config loaded from config.json");
                        return config;
                    }
                    Err(e) => {
                        crate::log(&format!(
                            "Failed to parse {}: {}. Using defaults.",
                            config_path.display(),
                            e
                        ));
                    }
                },
                Err(e) => {
                    crate::log(&format!(
                        "Failed to read {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    ));
                }
            }
        } else {
            crate::log("config.json not found. Using default config.");
        }

        ScanConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scaled_for_calibration_radius_is_identity() {
        let t = Thresholds::default().scaled_for_radius(22);
        assert_eq!(t.duplicate_radius_px, 10.0);
        assert_eq!(t.question_column_gap_px, 60.0);
    }

    #[test]
    fn test_scaled_for_half_resolution() {
        let t = Thresholds::default().scaled_for_radius(11);
        assert!((t.duplicate_radius_px - 5.0).abs() < 1e-4);
        assert!((t.header_split_y_px - 450.0).abs() < 1e-3);
        // Ratios are resolution independent
        assert_eq!(t.min_circularity, 0.85);
        assert_eq!(t.fill_threshold, 0.35);
        assert_eq!(t.min_question_marks, 20);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ScanConfig::load(&dir.path().join("config.json"));
        assert_eq!(config.numbering, NumberingPolicy::AcrossColumns);
        assert_eq!(config.recognition.timeout_ms, 5000);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"numbering": "down_columns", "thresholds": {"fill_threshold": 0.5}}"#,
        )
        .unwrap();

        let config = ScanConfig::load(&path);
        assert_eq!(config.numbering, NumberingPolicy::DownColumns);
        assert_eq!(config.thresholds.fill_threshold, 0.5);
        assert_eq!(config.thresholds.min_circularity, 0.85);
    }

    #[test]
    fn test_load_invalid_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let config = ScanConfig::load(&path);
        assert_eq!(config.thresholds.duplicate_radius_px, 10.0);
    }
}
