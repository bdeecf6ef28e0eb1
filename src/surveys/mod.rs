//! Preference surveys for a trip.
//!
//! A survey is a list of questions stored as JSON alongside the survey row.
//! Members answer once (re-submitting replaces their answers) and the
//! aggregated answers feed the destination recommendation in [`recommend`].

pub mod handlers;
mod recommend;
mod validation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use recommend::{recommend, CandidateScore, Recommendation};
pub use validation::{validate_answers, validate_questions};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Every option is rated from 1 to 5.
    Rating,
    SingleChoice,
    MultiChoice,
    Text,
}

impl QuestionKind {
    pub fn has_options(self) -> bool {
        !matches!(self, QuestionKind::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: String,
    pub prompt: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Ratings(BTreeMap<String, u8>),
    Choice(String),
    Choices(Vec<String>),
    Text(String),
}

impl Answer {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Answer::Ratings(_) => "ratings",
            Answer::Choice(_) => "choice",
            Answer::Choices(_) => "choices",
            Answer::Text(_) => "text",
        }
    }
}

/// Answers keyed by question id.
pub type Answers = BTreeMap<String, Answer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_wire_format() {
        let json = r#"{
            "q1": {"type": "ratings", "value": {"Lisbon": 5, "Porto": 3}},
            "q2": {"type": "choice", "value": "Beach"},
            "q3": {"type": "choices", "value": ["Food", "Museums"]},
            "q4": {"type": "text", "value": "No red-eyes please"}
        }"#;
        let answers: Answers = serde_json::from_str(json).unwrap();

        assert_eq!(answers.len(), 4);
        match &answers["q1"] {
            Answer::Ratings(r) => assert_eq!(r["Lisbon"], 5),
            other => panic!("unexpected answer {:?}", other),
        }
        assert_eq!(answers["q2"], Answer::Choice("Beach".into()));
    }

    #[test]
    fn test_question_defaults() {
        let q: SurveyQuestion = serde_json::from_str(
            r#"{"id": "notes", "prompt": "Anything else?", "kind": "text"}"#,
        )
        .unwrap();
        assert!(q.options.is_empty());
        assert!(!q.required);
        assert!(!q.kind.has_options());
    }
}
