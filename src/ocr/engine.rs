use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;

const DIGIT_WHITELIST: &str = "0123456789";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Character set a recognition call is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionMode {
    /// Only 0-9
    Digits,
    /// Whatever the engine sees
    Any,
}

/// A single-character recognition engine.
///
/// Implementations return the raw text they read; callers decide what counts
/// as a usable result. Any error is treated as "no result" by the reader.
pub trait Recognizer {
    fn recognize(&self, image: &GrayImage, mode: RecognitionMode) -> Result<String>;
}

/// Runs the tesseract CLI once per call in single-character mode.
pub struct TesseractEngine {
    paths: TesseractPaths,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths, timeout: Duration) -> Self {
        Self { paths, timeout }
    }

    fn command(&self, input: &std::path::Path, mode: RecognitionMode) -> Command {
        let mut cmd = Command::new(&self.paths.executable);
        cmd.arg(input).arg("stdout");
        if let Some(tessdata) = &self.paths.tessdata {
            cmd.arg("--tessdata-dir").arg(tessdata);
        }
        cmd.arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("10") // Single character
            .arg("--oem")
            .arg("3");
        if mode == RecognitionMode::Digits {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={}", DIGIT_WHITELIST));
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Recognizer for TesseractEngine {
    fn recognize(&self, image: &GrayImage, mode: RecognitionMode) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .context("Failed to write recognition input")?;

        let mut child = self
            .command(temp_input.path(), mode)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.paths.executable.display()))?;

        let started = Instant::now();
        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!(
                    "Tesseract timed out after {} ms",
                    self.timeout.as_millis()
                ));
            }
            thread::sleep(POLL_INTERVAL);
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
