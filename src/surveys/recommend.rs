use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use super::{Answer, Answers, QuestionKind, SurveyQuestion, MAX_RATING, MIN_RATING};

const RATING_WEIGHT: f64 = 0.8;
const MENTION_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub candidate: String,
    pub average_rating: Option<f64>,
    pub rating_count: u32,
    pub mentions: u32,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub survey_id: Uuid,
    pub respondents: usize,
    pub candidates: Vec<CandidateScore>,
}

#[derive(Default)]
struct Tally {
    rating_sum: u32,
    rating_count: u32,
    mentions: u32,
}

/// Ranks every option of the survey's rating and choice questions.
///
/// The score blends the normalized mean rating with the share of
/// respondents who picked the option in a choice question. Ties fall back
/// to rating count, then mentions, then the candidate name.
pub fn recommend(survey_id: Uuid, questions: &[SurveyQuestion], responses: &[Answers]) -> Recommendation {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    for q in questions.iter().filter(|q| q.kind.has_options()) {
        for opt in &q.options {
            tallies.entry(opt.as_str()).or_default();
        }
    }

    for answers in responses {
        for q in questions {
            let Some(answer) = answers.get(&q.id) else { continue };
            match (q.kind, answer) {
                (QuestionKind::Rating, Answer::Ratings(ratings)) => {
                    for (opt, score) in ratings {
                        if let Some(t) = tallies.get_mut(opt.as_str()) {
                            t.rating_sum += u32::from((*score).clamp(MIN_RATING, MAX_RATING));
                            t.rating_count += 1;
                        }
                    }
                }
                (QuestionKind::SingleChoice, Answer::Choice(choice)) => {
                    if let Some(t) = tallies.get_mut(choice.as_str()) {
                        t.mentions += 1;
                    }
                }
                (QuestionKind::MultiChoice, Answer::Choices(choices)) => {
                    for choice in choices {
                        if let Some(t) = tallies.get_mut(choice.as_str()) {
                            t.mentions += 1;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let respondents = responses.len();
    let mut candidates: Vec<CandidateScore> = tallies
        .into_iter()
        .map(|(name, t)| score_candidate(name, &t, respondents))
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.rating_count.cmp(&a.rating_count))
            .then_with(|| b.mentions.cmp(&a.mentions))
            .then_with(|| a.candidate.cmp(&b.candidate))
    });

    Recommendation {
        survey_id,
        respondents,
        candidates,
    }
}

fn score_candidate(name: &str, t: &Tally, respondents: usize) -> CandidateScore {
    let average_rating = (t.rating_count > 0).then(|| f64::from(t.rating_sum) / f64::from(t.rating_count));

    let score = if respondents == 0 {
        0.0
    } else {
        let span = f64::from(MAX_RATING - MIN_RATING);
        let rating_term = average_rating.map_or(0.0, |avg| (avg - f64::from(MIN_RATING)) / span);
        // options are merged by name across questions, so this can exceed 1
        let mention_share = f64::from(t.mentions) / respondents as f64;
        RATING_WEIGHT * rating_term + MENTION_WEIGHT * mention_share
    };

    CandidateScore {
        candidate: name.to_string(),
        average_rating,
        rating_count: t.rating_count,
        mentions: t.mentions,
        score,
    }
}
