use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::db::models::{Vote, VotingOption};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptionCount {
    pub option_id: Uuid,
    pub label: String,
    pub votes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Tally {
    pub total_votes: u32,
    pub counts: Vec<OptionCount>,
    /// Every option sharing the top count. Empty until a ballot is cast.
    pub winners: Vec<Uuid>,
}

impl Tally {
    pub fn winner_labels(&self) -> Vec<&str> {
        self.counts
            .iter()
            .filter(|c| self.winners.contains(&c.option_id))
            .map(|c| c.label.as_str())
            .collect()
    }
}

/// Counts ballots per option, keeping the options' display order.
/// Ballots for options outside the session are ignored.
pub fn tally(options: &[VotingOption], votes: &[Vote]) -> Tally {
    let mut per_option: HashMap<Uuid, u32> = options.iter().map(|o| (o.id, 0)).collect();
    let mut total_votes = 0;
    for vote in votes {
        if let Some(count) = per_option.get_mut(&vote.option_id) {
            *count += 1;
            total_votes += 1;
        }
    }

    let mut ordered: Vec<&VotingOption> = options.iter().collect();
    ordered.sort_by_key(|o| o.position);

    let counts: Vec<OptionCount> = ordered
        .into_iter()
        .map(|o| OptionCount {
            option_id: o.id,
            label: o.label.clone(),
            votes: per_option.get(&o.id).copied().unwrap_or(0),
        })
        .collect();

    let max = counts.iter().map(|c| c.votes).max().unwrap_or(0);
    let winners = if max == 0 {
        Vec::new()
    } else {
        counts.iter().filter(|c| c.votes == max).map(|c| c.option_id).collect()
    };

    Tally {
        total_votes,
        counts,
        winners,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn option(session_id: Uuid, label: &str, position: i32) -> VotingOption {
        VotingOption {
            id: Uuid::new_v4(),
            session_id,
            label: label.to_string(),
            description: None,
            position,
        }
    }

    fn vote(session_id: Uuid, option_id: Uuid) -> Vote {
        Vote {
            session_id,
            option_id,
            user_id: Uuid::new_v4(),
            cast_at: Utc::now(),
        }
    }

    #[test]
    fn test_single_winner() {
        let sid = Uuid::new_v4();
        let options = vec![option(sid, "Rome", 0), option(sid, "Paris", 1)];
        let votes = vec![
            vote(sid, options[1].id),
            vote(sid, options[1].id),
            vote(sid, options[0].id),
        ];

        let t = tally(&options, &votes);
        assert_eq!(t.total_votes, 3);
        assert_eq!(t.counts[0].label, "Rome");
        assert_eq!(t.counts[0].votes, 1);
        assert_eq!(t.counts[1].votes, 2);
        assert_eq!(t.winners, vec![options[1].id]);
        assert_eq!(t.winner_labels(), vec!["Paris"]);
    }

    #[test]
    fn test_ties_produce_several_winners() {
        let sid = Uuid::new_v4();
        let options = vec![option(sid, "A", 0), option(sid, "B", 1), option(sid, "C", 2)];
        let votes = vec![vote(sid, options[0].id), vote(sid, options[2].id)];

        let t = tally(&options, &votes);
        assert_eq!(t.winners, vec![options[0].id, options[2].id]);
        assert_eq!(t.winner_labels(), vec!["A", "C"]);
    }

    #[test]
    fn test_no_votes_no_winner() {
        let sid = Uuid::new_v4();
        let options = vec![option(sid, "A", 0), option(sid, "B", 1)];
        let t = tally(&options, &[]);
        assert_eq!(t.total_votes, 0);
        assert!(t.winners.is_empty());
    }

    #[test]
    fn test_orders_by_position_and_ignores_foreign_ballots() {
        let sid = Uuid::new_v4();
        let options = vec![option(sid, "Second", 1), option(sid, "First", 0)];
        let votes = vec![vote(sid, Uuid::new_v4()), vote(sid, options[0].id)];

        let t = tally(&options, &votes);
        assert_eq!(t.total_votes, 1);
        assert_eq!(t.counts[0].label, "First");
        assert_eq!(t.winner_labels(), vec!["Second"]);
    }
}
