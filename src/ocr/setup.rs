use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::RecognitionConfig;
use crate::log;
use crate::paths::get_tesseract_dir;

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];

#[cfg(windows)]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Resolved locations handed to the engine.
#[derive(Debug, Clone)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets tesseract use its compiled-in default
    pub tessdata: Option<PathBuf>,
}

/// Resolves the executable and tessdata directory for `config`.
pub fn locate_tesseract(config: &RecognitionConfig) -> Result<TesseractPaths> {
    let executable = match &config.tesseract_path {
        Some(path) if path.exists() => path.clone(),
        Some(path) => {
            return Err(anyhow!(
                "Configured tesseract not found: {}",
                path.display()
            ))
        }
        None => find_tesseract_executable()?,
    };

    let tessdata = match &config.tessdata_dir {
        Some(dir) => Some(dir.clone()),
        None => find_tessdata_dir(),
    };

    log(&format!(
        "Tesseract: {} (tessdata: {})",
        executable.display(),
        tessdata
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "default".to_string())
    ));

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable: per-user dir, then PATH, then common
/// install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if responds_to_version(Path::new("tesseract")) {
        return Ok(PathBuf::from("tesseract"));
    }

    for dir in COMMON_INSTALL_DIRS {
        let p = Path::new(dir).join(EXECUTABLE_NAME);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install tesseract-ocr, add it to PATH, or set recognition.tesseract_path in config.json"
    ))
}

/// Finds a tessdata directory holding `eng.traineddata`.
pub fn find_tessdata_dir() -> Option<PathBuf> {
    let local_tessdata = get_tesseract_dir().join("tessdata");
    if has_eng(&local_tessdata) {
        return Some(local_tessdata);
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_eng(&p) {
            return Some(p);
        }
        let p = p.join("tessdata");
        if has_eng(&p) {
            return Some(p);
        }
    }

    SYSTEM_TESSDATA_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|p| has_eng(p))
}

fn has_eng(dir: &Path) -> bool {
    dir.join("eng.traineddata").exists()
}

fn responds_to_version(executable: &Path) -> bool {
    Command::new(executable)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_configured_path_is_an_error() {
        let dir = tempdir().unwrap();
        let config = RecognitionConfig {
            tesseract_path: Some(dir.path().join("no-such-tesseract")),
            ..RecognitionConfig::default()
        };
        assert!(locate_tesseract(&config).is_err());
    }

    #[test]
    fn test_configured_paths_are_used_as_is() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join(EXECUTABLE_NAME);
        std::fs::write(&exe, b"").unwrap();
        let config = RecognitionConfig {
            tesseract_path: Some(exe.clone()),
            tessdata_dir: Some(dir.path().to_path_buf()),
            ..RecognitionConfig::default()
        };

        let paths = locate_tesseract(&config).unwrap();
        assert_eq!(paths.executable, exe);
        assert_eq!(paths.tessdata.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_has_eng() {
        let dir = tempdir().unwrap();
        assert!(!has_eng(dir.path()));
        std::fs::write(dir.path().join("eng.traineddata"), b"").unwrap();
        assert!(has_eng(dir.path()));
    }
}
