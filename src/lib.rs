//! Bubble answer sheet recognition.
//!
//! Turns a rasterized, filled-in answer sheet into a scored report. Bubble
//! marks are located by shape, given a logical identity from their position
//! relative to neighbouring marks, measured for fill, and scored against an
//! answer key. The identification number is also read from its handwriting
//! boxes with tesseract as a cross-check.

pub mod answer_key;
pub mod cancel;
pub mod config;
pub mod imaging;
pub mod layout;
pub mod marks;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod scoring;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

pub use answer_key::AnswerKey;
pub use cancel::CancelToken;
pub use config::ScanConfig;
pub use layout::LayoutDescriptor;
pub use pipeline::{Pipeline, SheetResult};
pub use scoring::ScoreReport;

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    eprint!("{}", line);
    let log_path = paths::get_logs_dir().join("omr_sheet.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}
