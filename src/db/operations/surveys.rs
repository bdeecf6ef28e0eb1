use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::DbOperations;
use crate::db::models::{Survey, SurveyResponse};
use crate::surveys::Answers;
use crate::Result;

const SURVEY_COLUMNS: &str =
    "id, trip_id, created_by, title, description, questions, status, closes_at, created_at, closed_at";
const RESPONSE_COLUMNS: &str = "id, survey_id, user_id, answers, submitted_at, updated_at";

impl DbOperations {
    pub async fn create_survey(&self, survey: &Survey) -> Result<Survey> {
        let sql = format!(
            "INSERT INTO surveys (id, trip_id, created_by, title, description, questions, status, closes_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            SURVEY_COLUMNS
        );
        let created = sqlx::query_as::<_, Survey>(&sql)
            .bind(survey.id)
            .bind(survey.trip_id)
            .bind(survey.created_by)
            .bind(&survey.title)
            .bind(&survey.description)
            .bind(&survey.questions)
            .bind(survey.status)
            .bind(survey.closes_at)
            .bind(survey.created_at)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(created)
    }

    pub async fn get_survey(&self, id: Uuid) -> Result<Option<Survey>> {
        let sql = format!("SELECT {} FROM surveys WHERE id = $1", SURVEY_COLUMNS);
        let survey = sqlx::query_as::<_, Survey>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(survey)
    }

    pub async fn list_surveys(&self, trip_id: Uuid) -> Result<Vec<Survey>> {
        let sql = format!(
            "SELECT {} FROM surveys WHERE trip_id = $1 ORDER BY created_at DESC",
            SURVEY_COLUMNS
        );
        let surveys = sqlx::query_as::<_, Survey>(&sql)
            .bind(trip_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(surveys)
    }

    pub async fn latest_closed_survey(&self, trip_id: Uuid) -> Result<Option<Survey>> {
        let sql = format!(
            "SELECT {} FROM surveys WHERE trip_id = $1 AND status = 'closed' \
             ORDER BY closed_at DESC NULLS LAST LIMIT 1",
            SURVEY_COLUMNS
        );
        let survey = sqlx::query_as::<_, Survey>(&sql)
            .bind(trip_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(survey)
    }

    /// `None` when the survey was already closed.
    pub async fn close_survey(&self, id: Uuid) -> Result<Option<Survey>> {
        let sql = format!(
            "UPDATE surveys SET status = 'closed', closed_at = now() \
             WHERE id = $1 AND status = 'open' RETURNING {}",
            SURVEY_COLUMNS
        );
        let survey = sqlx::query_as::<_, Survey>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(survey)
    }

    pub async fn close_expired_surveys(&self, now: DateTime<Utc>) -> Result<Vec<Survey>> {
        let sql = format!(
            "UPDATE surveys SET status = 'closed', closed_at = $1 \
             WHERE status = 'open' AND closes_at IS NOT NULL AND closes_at < $1 RETURNING {}",
            SURVEY_COLUMNS
        );
        let surveys = sqlx::query_as::<_, Survey>(&sql)
            .bind(now)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(surveys)
    }

    /// Re-submitting replaces the member's previous answers.
    pub async fn upsert_survey_response(
        &self,
        survey_id: Uuid,
        user_id: Uuid,
        answers: &Answers,
    ) -> Result<SurveyResponse> {
        let sql = format!(
            "INSERT INTO survey_responses (id, survey_id, user_id, answers) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (survey_id, user_id) DO UPDATE SET answers = EXCLUDED.answers, updated_at = now() \
             RETURNING {}",
            RESPONSE_COLUMNS
        );
        let response = sqlx::query_as::<_, SurveyResponse>(&sql)
            .bind(Uuid::new_v4())
            .bind(survey_id)
            .bind(user_id)
            .bind(Json(answers))
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(response)
    }

    pub async fn list_survey_responses(&self, survey_id: Uuid) -> Result<Vec<SurveyResponse>> {
        let sql = format!(
            "SELECT {} FROM survey_responses WHERE survey_id = $1 ORDER BY submitted_at",
            RESPONSE_COLUMNS
        );
        let responses = sqlx::query_as::<_, SurveyResponse>(&sql)
            .bind(survey_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(responses)
    }

    pub async fn get_survey_response(&self, survey_id: Uuid, user_id: Uuid) -> Result<Option<SurveyResponse>> {
        let sql = format!(
            "SELECT {} FROM survey_responses WHERE survey_id = $1 AND user_id = $2",
            RESPONSE_COLUMNS
        );
        let response = sqlx::query_as::<_, SurveyResponse>(&sql)
            .bind(survey_id)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(response)
    }

    pub async fn count_survey_responses(&self, survey_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM survey_responses WHERE survey_id = $1")
            .bind(survey_id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}
