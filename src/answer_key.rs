//! Answer key: the correct option letter for each question number.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::scoring::Response;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKey {
    /// Question number → option letter
    #[serde(default)]
    pub answers: BTreeMap<u32, String>,
}

impl AnswerKey {
    /// Loads `{"answers": {"1": "A", ...}}` from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read answer key: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse answer key: {}", path.display()))
    }

    /// Like [`load`](Self::load), but a missing file is an empty key.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if !path.exists() {
            crate::log(&format!(
                "Warning: {} not found. Using empty key.",
                path.display()
            ));
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn get(&self, question: u32) -> Option<&str> {
        self.answers.get(&question).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Builds a key from the responses of a filled-in master sheet.
    ///
    /// A question with several filled options takes the first one (with a
    /// warning); blank questions are left out.
    pub fn from_responses(responses: &BTreeMap<u32, Response>) -> Self {
        let mut answers = BTreeMap::new();
        for (&question, response) in responses {
            match response {
                Response::Marked(option) => {
                    answers.insert(question, option.clone());
                }
                Response::Multiple(options) => {
                    crate::log(&format!(
                        "Warning: Question {} has multiple options filled on the master sheet, using {}",
                        question,
                        options.first().map(String::as_str).unwrap_or("none")
                    ));
                    if let Some(first) = options.first() {
                        answers.insert(question, first.clone());
                    }
                }
                Response::Blank => {}
            }
        }
        Self { answers }
    }

    /// Writes the key as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize answer key")?;

        let mut file = File::create(path)
            .with_context(|| format!("Failed to create answer key file: {}", path.display()))?;

        file.write_all(json.as_bytes())
            .context("Failed to write answer key")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_answer_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("answer_key.json");
        fs::write(&path, r#"{"answers": {"1": "A", "2": "C", "10": "D"}}"#).unwrap();

        let key = AnswerKey::load(&path).unwrap();

        assert_eq!(key.len(), 3);
        assert_eq!(key.get(2), Some("C"));
        assert_eq!(key.get(10), Some("D"));
        assert_eq!(key.get(3), None);
    }

    #[test]
    fn test_missing_key_is_empty() {
        let dir = tempdir().unwrap();
        let key = AnswerKey::load_or_empty(&dir.path().join("answer_key.json")).unwrap();
        assert!(key.is_empty());
    }

    #[test]
    fn test_malformed_key_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("answer_key.json");
        fs::write(&path, r#"{"answers": {"one": "A"}}"#).unwrap();

        assert!(AnswerKey::load_or_empty(&path).is_err());
    }

    #[test]
    fn test_from_responses() {
        let responses = BTreeMap::from([
            (1, Response::Marked("B".into())),
            (2, Response::Multiple(vec!["A".into(), "D".into()])),
            (3, Response::Blank),
        ]);

        let key = AnswerKey::from_responses(&responses);

        assert_eq!(key.get(1), Some("B"));
        assert_eq!(key.get(2), Some("A"));
        assert_eq!(key.get(3), None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.json");
        let key = AnswerKey {
            answers: BTreeMap::from([(1, "A".to_string()), (12, "D".to_string())]),
        };

        key.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"12\": \"D\""));
        assert_eq!(AnswerKey::load(&path).unwrap(), key);
    }
}
