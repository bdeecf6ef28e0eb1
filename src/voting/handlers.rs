use std::collections::HashSet;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::tally::{tally, Tally};
use crate::auth::AuthenticatedUser;
use crate::db::models::{NotificationKind, Vote, VotingOption, VotingSession, VotingStatus};
use crate::db::DbOperations;
use crate::error::AppError;
use crate::notifications::NotificationDraft;
use crate::trips::{require_manager, require_member, TripAccess};
use crate::trips::handlers::display_name;
use crate::{AppState, Result};

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 20;
const MAX_LABEL_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct OptionInput {
    pub label: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVoteRequest {
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<OptionInput>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BallotRequest {
    pub option_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct VotingDetail {
    #[serde(flatten)]
    pub session: VotingSession,
    pub options: Vec<VotingOption>,
    pub tally: Tally,
    pub my_vote: Option<Uuid>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Validates the request and lays out the session with its ordered options.
pub fn build_session(
    trip_id: Uuid,
    created_by: Uuid,
    req: CreateVoteRequest,
    now: DateTime<Utc>,
) -> Result<(VotingSession, Vec<VotingOption>)> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("vote title is required"));
    }
    if let Some(closes_at) = req.closes_at {
        if closes_at <= now {
            return Err(AppError::validation("closes_at must be in the future"));
        }
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&req.options.len()) {
        return Err(AppError::validation(format!(
            "a vote needs between {} and {} options",
            MIN_OPTIONS, MAX_OPTIONS
        )));
    }

    let session = VotingSession {
        id: Uuid::new_v4(),
        trip_id,
        created_by,
        title,
        description: blank_to_none(req.description),
        status: VotingStatus::Open,
        closes_at: req.closes_at,
        created_at: now,
        closed_at: None,
    };

    let mut seen = HashSet::new();
    let mut options = Vec::with_capacity(req.options.len());
    for (position, input) in req.options.into_iter().enumerate() {
        let label = input.label.trim().to_string();
        if label.is_empty() {
            return Err(AppError::validation("option labels must not be blank"));
        }
        if label.chars().count() > MAX_LABEL_LEN {
            return Err(AppError::validation(format!("option labels are limited to {} characters", MAX_LABEL_LEN)));
        }
        if !seen.insert(label.to_lowercase()) {
            return Err(AppError::validation(format!("duplicate option '{}'", label)));
        }
        options.push(VotingOption {
            id: Uuid::new_v4(),
            session_id: session.id,
            label,
            description: blank_to_none(input.description),
            position: position as i32,
        });
    }

    Ok((session, options))
}

pub(crate) async fn load_tally(db: &DbOperations, session_id: Uuid) -> Result<(Vec<VotingOption>, Tally)> {
    let options = db.list_voting_options(session_id).await?;
    let votes: Vec<Vote> = db.list_votes(session_id).await?;
    let tally = tally(&options, &votes);
    Ok((options, tally))
}

pub(crate) fn vote_closed_draft(session: &VotingSession, tally: &Tally) -> NotificationDraft {
    let labels = tally.winner_labels();
    let body = match labels.len() {
        0 => "No ballots were cast".to_string(),
        1 => format!("Winner: {}", labels[0]),
        _ => format!("Tie between {}", labels.join(", ")),
    };
    NotificationDraft::new(NotificationKind::VoteClosed, format!("Vote closed: {}", session.title), body)
        .for_trip(session.trip_id)
        .with_payload(serde_json::json!({
            "voting_session_id": session.id,
            "winners": tally.winners,
            "winner_labels": labels,
        }))
}

async fn session_access(state: &AppState, session_id: Uuid, user_id: Uuid) -> Result<(VotingSession, TripAccess)> {
    let session = state.db
        .get_voting_session(session_id)
        .await?
        .ok_or_else(|| AppError::not_found("voting session"))?;
    let access = require_member(&state.db, session.trip_id, user_id).await?;
    Ok((session, access))
}

pub async fn create_vote(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<CreateVoteRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_manager(&state.db, path.into_inner(), auth.user.id).await?;
    let (session, options) = build_session(access.trip.id, auth.user.id, req.into_inner(), Utc::now())?;

    let (session, options) = state.db.create_voting_session(&session, &options).await?;
    info!("User {} opened vote {} with {} options on trip {}", auth.user.id, session.id, options.len(), session.trip_id);

    let draft = NotificationDraft::new(
        NotificationKind::VoteCreated,
        format!("New vote: {}", session.title),
        format!("{} opened a vote on {}", display_name(&auth), access.trip.name),
    )
    .with_payload(serde_json::json!({ "voting_session_id": session.id }));
    state.notifier.notify_trip_members(session.trip_id, Some(auth.user.id), draft).await;

    let tally = tally(&options, &[]);
    Ok(HttpResponse::Created().json(VotingDetail {
        session,
        options,
        tally,
        my_vote: None,
    }))
}

pub async fn list_votes(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;
    let sessions = state.db.list_voting_sessions(access.trip.id).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

pub async fn get_vote(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (session, _) = session_access(&state, path.into_inner(), auth.user.id).await?;
    let (options, tally) = load_tally(&state.db, session.id).await?;
    let my_vote = state.db.get_user_vote(session.id, auth.user.id).await?.map(|v| v.option_id);

    Ok(HttpResponse::Ok().json(VotingDetail {
        session,
        options,
        tally,
        my_vote,
    }))
}

pub async fn cast_ballot(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<BallotRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (session, _) = session_access(&state, path.into_inner(), auth.user.id).await?;
    if !session.accepts_ballots_at(Utc::now()) {
        return Err(AppError::validation("this vote is closed"));
    }

    let options = state.db.list_voting_options(session.id).await?;
    if !options.iter().any(|o| o.id == req.option_id) {
        return Err(AppError::validation("option does not belong to this vote"));
    }

    let vote = state.db.cast_vote(session.id, req.option_id, auth.user.id).await?;
    info!("User {} voted in session {}", auth.user.id, session.id);
    Ok(HttpResponse::Ok().json(vote))
}

pub async fn withdraw_ballot(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (session, _) = session_access(&state, path.into_inner(), auth.user.id).await?;
    if !session.accepts_ballots_at(Utc::now()) {
        return Err(AppError::validation("this vote is closed"));
    }

    if !state.db.withdraw_vote(session.id, auth.user.id).await? {
        return Err(AppError::not_found("ballot"));
    }
    info!("User {} withdrew their ballot from session {}", auth.user.id, session.id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn close_vote(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (session, access) = session_access(&state, path.into_inner(), auth.user.id).await?;
    access.require_manager()?;

    let session = state.db
        .close_voting_session(session.id)
        .await?
        .ok_or_else(|| AppError::Conflict("vote is already closed".into()))?;
    let (options, tally) = load_tally(&state.db, session.id).await?;
    info!("User {} closed vote {} with {} ballots", auth.user.id, session.id, tally.total_votes);

    state.notifier
        .notify_trip_members(session.trip_id, Some(auth.user.id), vote_closed_draft(&session, &tally))
        .await;

    Ok(HttpResponse::Ok().json(VotingDetail {
        session,
        options,
        tally,
        my_vote: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(labels: &[&str]) -> CreateVoteRequest {
        CreateVoteRequest {
            title: "Which weekend?".into(),
            description: None,
            options: labels
                .iter()
                .map(|l| OptionInput { label: l.to_string(), description: None })
                .collect(),
            closes_at: None,
        }
    }

    #[test]
    fn test_build_session_orders_options() {
        let (session, options) =
            build_session(Uuid::new_v4(), Uuid::new_v4(), request(&[" May 1 ", "May 8", "May 15"]), Utc::now()).unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].label, "May 1");
        assert_eq!(options.iter().map(|o| o.position).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(options.iter().all(|o| o.session_id == session.id));
    }

    #[test]
    fn test_build_session_rejects_bad_options() {
        let trip = Uuid::new_v4();
        let user = Uuid::new_v4();
        let now = Utc::now();

        assert!(build_session(trip, user, request(&["only one"]), now).is_err());
        assert!(build_session(trip, user, request(&["Porto", "porto"]), now).is_err());
        assert!(build_session(trip, user, request(&["Porto", "  "]), now).is_err());

        let many: Vec<String> = (0..=MAX_OPTIONS).map(|i| format!("option {}", i)).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        assert!(build_session(trip, user, request(&many), now).is_err());

        let mut req = request(&["a", "b"]);
        req.closes_at = Some(now - Duration::seconds(1));
        assert!(build_session(trip, user, req, now).is_err());
    }

    #[test]
    fn test_closed_draft_mentions_winners() {
        let (session, options) =
            build_session(Uuid::new_v4(), Uuid::new_v4(), request(&["Porto", "Faro"]), Utc::now()).unwrap();
        let ballot = |option: &VotingOption| Vote {
            session_id: session.id,
            option_id: option.id,
            user_id: Uuid::new_v4(),
            cast_at: Utc::now(),
        };

        let none = vote_closed_draft(&session, &tally(&options, &[]));
        assert_eq!(none.body, "No ballots were cast");

        let one = vote_closed_draft(&session, &tally(&options, &[ballot(&options[1])]));
        assert_eq!(one.body, "Winner: Faro");
        assert_eq!(one.kind, NotificationKind::VoteClosed);

        let tie = vote_closed_draft(&session, &tally(&options, &[ballot(&options[0]), ballot(&options[1])]));
        assert_eq!(tie.body, "Tie between Porto, Faro");
        assert_eq!(tie.payload["winner_labels"].as_array().map(|a| a.len()), Some(2));
    }
}
