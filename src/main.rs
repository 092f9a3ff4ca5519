//! OMR Sheet Scanner
//!
//! Scans a rasterized bubble answer sheet and prints its score report as
//! JSON, or turns a filled-in master sheet into an answer key.
//!
//! ```text
//! omr-sheet <sheet.png> [--layout template.json] [--key answer_key.json] [--config config.json]
//! omr-sheet --make-key <master.png> [--layout template.json] [--out answer_key.json]
//! ```

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use omr_sheet::scoring::validate_responses;
use omr_sheet::{log, paths, AnswerKey, LayoutDescriptor, Pipeline, ScanConfig};

const DEFAULT_LAYOUT: &str = "template.json";
const DEFAULT_KEY: &str = "answer_key.json";

enum Mode {
    Score { key: PathBuf },
    MakeKey { out: PathBuf },
}

struct Args {
    mode: Mode,
    image: PathBuf,
    layout: PathBuf,
    config: Option<PathBuf>,
}

fn usage() -> anyhow::Error {
    anyhow!(
        "usage: omr-sheet <sheet-image> [--layout FILE] [--key FILE] [--config FILE]\n       \
         omr-sheet --make-key <master-image> [--layout FILE] [--out FILE] [--config FILE]"
    )
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut image = None;
    let mut make_key = false;
    let mut layout = PathBuf::from(DEFAULT_LAYOUT);
    let mut key = PathBuf::from(DEFAULT_KEY);
    let mut out = None;
    let mut config = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().ok_or_else(|| anyhow!("{} needs a value", name));
        match arg.as_str() {
            "--make-key" => make_key = true,
            "--layout" => layout = PathBuf::from(value("--layout")?),
            "--key" => key = PathBuf::from(value("--key")?),
            "--out" => out = Some(PathBuf::from(value("--out")?)),
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "-h" | "--help" => return Err(usage()),
            other if other.starts_with("--") => return Err(anyhow!("unknown option {}", other)),
            other if image.is_none() => image = Some(PathBuf::from(other)),
            other => return Err(anyhow!("unexpected argument {}", other)),
        }
    }

    let mode = if make_key {
        Mode::MakeKey {
            out: out.unwrap_or(key),
        }
    } else {
        Mode::Score { key }
    };

    Ok(Args {
        mode,
        image: image.ok_or_else(usage)?,
        layout,
        config,
    })
}

fn load_sheet(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("Failed to open sheet image: {}", path.display()))
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        log(&format!("[PANIC]{} {}", location, msg));
    }));

    // Ensure output directories exist
    paths::ensure_directories()?;

    let args = parse_args(std::env::args().skip(1))?;

    let config_path = args.config.clone().unwrap_or_else(paths::get_config_path);
    let config = ScanConfig::load(&config_path);

    let layout = LayoutDescriptor::from_json_file(&args.layout)?;
    let image = load_sheet(&args.image)?;
    log(&format!(
        "Processing {} ({}x{})",
        args.image.display(),
        image.width(),
        image.height()
    ));

    match &args.mode {
        Mode::Score { key } => {
            let key = AnswerKey::load_or_empty(key)?;
            let pipeline = Pipeline::with_tesseract(config);
            let result = pipeline.process(&image, &layout, &key)?;

            for line in result.summary_lines() {
                log(&line);
            }

            let json = serde_json::to_string_pretty(&result.report)
                .context("Failed to serialize report")?;
            println!("{}", json);
        }
        Mode::MakeKey { out } => {
            // OCR plays no part in a master sheet
            let pipeline = Pipeline::new(config);
            let result = pipeline.process(&image, &layout, &AnswerKey::default())?;
            if result.marks.candidates.is_empty() {
                return Err(anyhow!("No bubbles detected on master sheet"));
            }

            let key = AnswerKey::from_responses(&validate_responses(&result.marks));
            key.save(out)?;
            log(&format!(
                "Generated answer key with {} items, saved to {}",
                key.len(),
                out.display()
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_score_mode_defaults() {
        let parsed = args(&["sheet.png"]).unwrap();
        assert_eq!(parsed.image, PathBuf::from("sheet.png"));
        assert_eq!(parsed.layout, PathBuf::from(DEFAULT_LAYOUT));
        assert!(matches!(parsed.mode, Mode::Score { ref key } if key == Path::new(DEFAULT_KEY)));
    }

    #[test]
    fn test_make_key_mode() {
        let parsed = args(&["--make-key", "master.png", "--layout", "t.json", "--out", "k.json"]).unwrap();
        assert_eq!(parsed.layout, PathBuf::from("t.json"));
        assert!(matches!(parsed.mode, Mode::MakeKey { ref out } if out == Path::new("k.json")));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(args(&[]).is_err());
        assert!(args(&["sheet.png", "--layout"]).is_err());
        assert!(args(&["sheet.png", "--verbose"]).is_err());
        assert!(args(&["a.png", "b.png"]).is_err());
    }
}
