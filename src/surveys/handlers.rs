use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use tracing::info;
use uuid::Uuid;

use super::{recommend, validate_answers, validate_questions, Answers, Recommendation, SurveyQuestion};
use crate::auth::AuthenticatedUser;
use crate::db::models::{NotificationKind, Survey, SurveyStatus};
use crate::db::DbOperations;
use crate::error::AppError;
use crate::notifications::NotificationDraft;
use crate::trips::{require_manager, require_member, TripAccess};
use crate::trips::handlers::display_name;
use crate::{AppState, Result};

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateSurveyRequest {
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<SurveyQuestion>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponseRequest {
    pub answers: Answers,
}

#[derive(Debug, Serialize)]
pub struct SurveyDetail {
    #[serde(flatten)]
    pub survey: Survey,
    pub response_count: i64,
    pub has_responded: bool,
}

pub fn build_survey(trip_id: Uuid, created_by: Uuid, req: CreateSurveyRequest, now: DateTime<Utc>) -> Result<Survey> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("survey title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(format!("survey title is limited to {} characters", MAX_TITLE_LEN)));
    }
    if let Some(closes_at) = req.closes_at {
        if closes_at <= now {
            return Err(AppError::validation("closes_at must be in the future"));
        }
    }
    validate_questions(&req.questions)?;

    Ok(Survey {
        id: Uuid::new_v4(),
        trip_id,
        created_by,
        title,
        description: req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        questions: Json(req.questions),
        status: SurveyStatus::Open,
        closes_at: req.closes_at,
        created_at: now,
        closed_at: None,
    })
}

/// Scores the survey from every stored response.
pub(crate) async fn load_recommendation(db: &DbOperations, survey: &Survey) -> Result<Recommendation> {
    let responses = db.list_survey_responses(survey.id).await?;
    let answers: Vec<Answers> = responses.into_iter().map(|r| r.answers.0).collect();
    Ok(recommend(survey.id, &survey.questions.0, &answers))
}

pub(crate) fn survey_closed_draft(survey: &Survey) -> NotificationDraft {
    NotificationDraft::new(
        NotificationKind::SurveyClosed,
        format!("Survey closed: {}", survey.title),
        "Results and recommendations are ready",
    )
    .for_trip(survey.trip_id)
    .with_payload(serde_json::json!({ "survey_id": survey.id }))
}

async fn survey_access(state: &AppState, survey_id: Uuid, user_id: Uuid) -> Result<(Survey, TripAccess)> {
    let survey = state.db
        .get_survey(survey_id)
        .await?
        .ok_or_else(|| AppError::not_found("survey"))?;
    let access = require_member(&state.db, survey.trip_id, user_id).await?;
    Ok((survey, access))
}

pub async fn create_survey(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<CreateSurveyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_manager(&state.db, path.into_inner(), auth.user.id).await?;
    let survey = build_survey(access.trip.id, auth.user.id, req.into_inner(), Utc::now())?;

    let survey = state.db.create_survey(&survey).await?;
    info!("User {} created survey {} on trip {}", auth.user.id, survey.id, survey.trip_id);

    let draft = NotificationDraft::new(
        NotificationKind::SurveyCreated,
        format!("New survey: {}", survey.title),
        format!("{} wants to know what you think about {}", display_name(&auth), access.trip.name),
    )
    .with_payload(serde_json::json!({ "survey_id": survey.id }));
    state.notifier.notify_trip_members(survey.trip_id, Some(auth.user.id), draft).await;

    Ok(HttpResponse::Created().json(survey))
}

pub async fn list_surveys(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;
    let surveys = state.db.list_surveys(access.trip.id).await?;
    Ok(HttpResponse::Ok().json(surveys))
}

pub async fn get_survey(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (survey, _) = survey_access(&state, path.into_inner(), auth.user.id).await?;
    let response_count = state.db.count_survey_responses(survey.id).await?;
    let has_responded = state.db.get_survey_response(survey.id, auth.user.id).await?.is_some();

    Ok(HttpResponse::Ok().json(SurveyDetail {
        survey,
        response_count,
        has_responded,
    }))
}

pub async fn submit_response(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<SubmitResponseRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (survey, _) = survey_access(&state, path.into_inner(), auth.user.id).await?;
    if !survey.accepts_responses_at(Utc::now()) {
        return Err(AppError::validation("this survey is closed"));
    }

    let answers = req.into_inner().answers;
    validate_answers(&survey.questions.0, &answers)?;

    let response = state.db.upsert_survey_response(survey.id, auth.user.id, &answers).await?;
    info!("User {} answered survey {}", auth.user.id, survey.id);
    Ok(HttpResponse::Ok().json(response))
}

pub async fn list_responses(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (survey, _) = survey_access(&state, path.into_inner(), auth.user.id).await?;
    let responses = state.db.list_survey_responses(survey.id).await?;
    Ok(HttpResponse::Ok().json(responses))
}

pub async fn close_survey(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (survey, access) = survey_access(&state, path.into_inner(), auth.user.id).await?;
    access.require_manager()?;

    let survey = state.db
        .close_survey(survey.id)
        .await?
        .ok_or_else(|| AppError::Conflict("survey is already closed".into()))?;
    info!("User {} closed survey {}", auth.user.id, survey.id);

    state.notifier
        .notify_trip_members(survey.trip_id, Some(auth.user.id), survey_closed_draft(&survey))
        .await;

    Ok(HttpResponse::Ok().json(survey))
}

pub async fn get_recommendations(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (survey, _) = survey_access(&state, path.into_inner(), auth.user.id).await?;
    let recommendation = load_recommendation(&state.db, &survey).await?;
    Ok(HttpResponse::Ok().json(recommendation))
}
