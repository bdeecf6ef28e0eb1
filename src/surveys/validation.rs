use std::collections::HashSet;

use super::{Answer, Answers, QuestionKind, SurveyQuestion, MAX_RATING, MIN_RATING};
use crate::error::AppError;
use crate::Result;

const MAX_QUESTIONS: usize = 50;
const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 20;
const MAX_TEXT_ANSWER: usize = 2000;

pub fn validate_questions(questions: &[SurveyQuestion]) -> Result<()> {
    if questions.is_empty() || questions.len() > MAX_QUESTIONS {
        return Err(AppError::validation(format!(
            "a survey needs between 1 and {} questions",
            MAX_QUESTIONS
        )));
    }

    let mut ids = HashSet::new();
    for q in questions {
        if q.id.trim().is_empty() {
            return Err(AppError::validation("question id must not be blank"));
        }
        if !ids.insert(q.id.as_str()) {
            return Err(AppError::validation(format!("duplicate question id '{}'", q.id)));
        }
        if q.prompt.trim().is_empty() {
            return Err(AppError::validation(format!("question '{}' has no prompt", q.id)));
        }

        if q.kind.has_options() {
            if q.options.len() < MIN_OPTIONS || q.options.len() > MAX_OPTIONS {
                return Err(AppError::validation(format!(
                    "question '{}' needs between {} and {} options",
                    q.id, MIN_OPTIONS, MAX_OPTIONS
                )));
            }
            let mut seen = HashSet::new();
            for opt in &q.options {
                if opt.trim().is_empty() {
                    return Err(AppError::validation(format!("question '{}' has a blank option", q.id)));
                }
                if !seen.insert(opt.as_str()) {
                    return Err(AppError::validation(format!(
                        "question '{}' repeats option '{}'",
                        q.id, opt
                    )));
                }
            }
        } else if !q.options.is_empty() {
            return Err(AppError::validation(format!("text question '{}' cannot have options", q.id)));
        }
    }

    Ok(())
}

pub fn validate_answers(questions: &[SurveyQuestion], answers: &Answers) -> Result<()> {
    for id in answers.keys() {
        if !questions.iter().any(|q| &q.id == id) {
            return Err(AppError::validation(format!("unknown question '{}'", id)));
        }
    }

    for q in questions {
        let answer = match answers.get(&q.id) {
            Some(a) => a,
            None if q.required => {
                return Err(AppError::validation(format!("question '{}' is required", q.id)))
            }
            None => continue,
        };
        validate_answer(q, answer)?;
    }

    Ok(())
}

fn validate_answer(q: &SurveyQuestion, answer: &Answer) -> Result<()> {
    let known = |opt: &str| q.options.iter().any(|o| o == opt);

    match (q.kind, answer) {
        (QuestionKind::Rating, Answer::Ratings(ratings)) => {
            if ratings.is_empty() && q.required {
                return Err(AppError::validation(format!("question '{}' is required", q.id)));
            }
            for (opt, score) in ratings {
                if !known(opt) {
                    return Err(AppError::validation(format!(
                        "'{}' is not an option of question '{}'",
                        opt, q.id
                    )));
                }
                if !(MIN_RATING..=MAX_RATING).contains(score) {
                    return Err(AppError::validation(format!(
                        "ratings must be between {} and {}",
                        MIN_RATING, MAX_RATING
                    )));
                }
            }
        }
        (QuestionKind::SingleChoice, Answer::Choice(choice)) => {
            if !known(choice) {
                return Err(AppError::validation(format!(
                    "'{}' is not an option of question '{}'",
                    choice, q.id
                )));
            }
        }
        (QuestionKind::MultiChoice, Answer::Choices(choices)) => {
            if choices.is_empty() && q.required {
                return Err(AppError::validation(format!("question '{}' is required", q.id)));
            }
            let mut seen = HashSet::new();
            for choice in choices {
                if !known(choice) {
                    return Err(AppError::validation(format!(
                        "'{}' is not an option of question '{}'",
                        choice, q.id
                    )));
                }
                if !seen.insert(choice.as_str()) {
                    return Err(AppError::validation(format!("'{}' chosen twice", choice)));
                }
            }
        }
        (QuestionKind::Text, Answer::Text(text)) => {
            if q.required && text.trim().is_empty() {
                return Err(AppError::validation(format!("question '{}' is required", q.id)));
            }
            if text.chars().count() > MAX_TEXT_ANSWER {
                return Err(AppError::validation(format!(
                    "answers are limited to {} characters",
                    MAX_TEXT_ANSWER
                )));
            }
        }
        (kind, other) => {
            return Err(AppError::validation(format!(
                "question '{}' expects a {:?} answer, got '{}'",
                q.id,
                kind,
                other.kind_name()
            )));
        }
    }

    Ok(())
}
