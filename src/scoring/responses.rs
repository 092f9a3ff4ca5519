use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::answer_key::AnswerKey;
use crate::marks::{MarkIdentity, SheetMarks};

/// What a respondent marked for one question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Exactly one option filled
    Marked(String),
    /// More than one option filled, in option order
    Multiple(Vec<String>),
    Blank,
}

impl Response {
    /// Text used in reports: the option, `MULTIPLE`, or empty.
    pub fn as_str(&self) -> &str {
        match self {
            Response::Marked(option) => option,
            Response::Multiple(_) => "MULTIPLE",
            Response::Blank => "",
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionStatus {
    Correct,
    Wrong,
    Unanswered,
    InvalidMultiple,
}

/// Outcome of one question.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct QuestionResult {
    pub question: u32,
    pub marked: Response,
    /// Key option, empty when the key has none
    pub correct: String,
    pub status: QuestionStatus,
    pub reason: String,
}

/// Aggregate counts; `score` is the number of correct answers.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScoreSummary {
    pub total_questions: u32,
    pub correct: u32,
    pub wrong: u32,
    pub unanswered: u32,
    pub score: u32,
}

/// (option index, label, filled) of every question mark, by question.
fn group_by_question(marks: &SheetMarks) -> BTreeMap<u32, Vec<(usize, String, bool)>> {
    let mut groups: BTreeMap<u32, Vec<(usize, String, bool)>> = BTreeMap::new();
    for view in marks.views() {
        if let MarkIdentity::Question { number, option } = view.mapped.identity {
            groups
                .entry(number)
                .or_default()
                .push((option, view.mapped.value.clone(), view.filled()));
        }
    }
    groups
}

/// One response per question found on the sheet.
pub fn validate_responses(marks: &SheetMarks) -> BTreeMap<u32, Response> {
    group_by_question(marks)
        .into_iter()
        .map(|(question, mut options)| {
            options.sort_by_key(|(option, _, _)| *option);
            let filled: Vec<String> = options
                .into_iter()
                .filter(|(_, _, filled)| *filled)
                .map(|(_, value, _)| value)
                .collect();

            let response = match filled.len() {
                0 => Response::Blank,
                1 => Response::Marked(filled.into_iter().next().unwrap_or_default()),
                _ => Response::Multiple(filled),
            };
            (question, response)
        })
        .collect()
}

/// Scores every question from 1 to the highest number seen in either the
/// key or the responses.
pub fn score_responses(
    responses: &BTreeMap<u32, Response>,
    key: &AnswerKey,
) -> (Vec<QuestionResult>, ScoreSummary) {
    // An empty key and an empty sheet score zero questions; no sheet-size
    // default is assumed.
    let max_question = responses
        .keys()
        .chain(key.answers.keys())
        .copied()
        .max()
        .unwrap_or(0);

    let mut summary = ScoreSummary {
        total_questions: max_question,
        ..ScoreSummary::default()
    };
    let mut details = Vec::with_capacity(max_question as usize);

    for question in 1..=max_question {
        let marked = responses.get(&question).cloned().unwrap_or(Response::Blank);
        let correct = key.get(question).unwrap_or("").to_string();

        let (status, reason) = match &marked {
            Response::Blank => (QuestionStatus::Unanswered, ""),
            Response::Multiple(_) => (QuestionStatus::InvalidMultiple, "Multiple options filled"),
            Response::Marked(option) if *option == correct => (QuestionStatus::Correct, ""),
            Response::Marked(_) => (QuestionStatus::Wrong, ""),
        };

        match status {
            QuestionStatus::Correct => summary.correct += 1,
            QuestionStatus::Wrong | QuestionStatus::InvalidMultiple => summary.wrong += 1,
            QuestionStatus::Unanswered => summary.unanswered += 1,
        }

        details.push(QuestionResult {
            question,
            marked,
            correct,
            status,
            reason: reason.to_string(),
        });
    }
    summary.score = summary.correct;

    (details, summary)
}
