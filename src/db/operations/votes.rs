use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbOperations;
use crate::db::models::{Vote, VotingOption, VotingSession};
use crate::Result;

const SESSION_COLUMNS: &str =
    "id, trip_id, created_by, title, description, status, closes_at, created_at, closed_at";

impl DbOperations {
    pub async fn create_voting_session(
        &self,
        session: &VotingSession,
        options: &[VotingOption],
    ) -> Result<(VotingSession, Vec<VotingOption>)> {
        let mut tx = self.begin_transaction().await?;

        let sql = format!(
            "INSERT INTO voting_sessions (id, trip_id, created_by, title, description, status, closes_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            SESSION_COLUMNS
        );
        let created = sqlx::query_as::<_, VotingSession>(&sql)
            .bind(session.id)
            .bind(session.trip_id)
            .bind(session.created_by)
            .bind(&session.title)
            .bind(&session.description)
            .bind(session.status)
            .bind(session.closes_at)
            .bind(session.created_at)
            .fetch_one(&mut *tx)
            .await?;

        let mut inserted = Vec::with_capacity(options.len());
        for option in options {
            let row = sqlx::query_as::<_, VotingOption>(
                "INSERT INTO voting_options (id, session_id, label, description, position) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id, session_id, label, description, position",
            )
            .bind(option.id)
            .bind(created.id)
            .bind(&option.label)
            .bind(&option.description)
            .bind(option.position)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok((created, inserted))
    }

    pub async fn get_voting_session(&self, id: Uuid) -> Result<Option<VotingSession>> {
        let sql = format!("SELECT {} FROM voting_sessions WHERE id = $1", SESSION_COLUMNS);
        let session = sqlx::query_as::<_, VotingSession>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(session)
    }

    pub async fn list_voting_sessions(&self, trip_id: Uuid) -> Result<Vec<VotingSession>> {
        let sql = format!(
            "SELECT {} FROM voting_sessions WHERE trip_id = $1 ORDER BY created_at DESC",
            SESSION_COLUMNS
        );
        let sessions = sqlx::query_as::<_, VotingSession>(&sql)
            .bind(trip_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(sessions)
    }

    pub async fn list_voting_options(&self, session_id: Uuid) -> Result<Vec<VotingOption>> {
        let options = sqlx::query_as::<_, VotingOption>(
            "SELECT id, session_id, label, description, position FROM voting_options \
             WHERE session_id = $1 ORDER BY position",
        )
        .bind(session_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(options)
    }

    pub async fn list_votes(&self, session_id: Uuid) -> Result<Vec<Vote>> {
        let votes = sqlx::query_as::<_, Vote>(
            "SELECT session_id, option_id, user_id, cast_at FROM votes WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(votes)
    }

    pub async fn get_user_vote(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Vote>> {
        let vote = sqlx::query_as::<_, Vote>(
            "SELECT session_id, option_id, user_id, cast_at FROM votes WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(vote)
    }

    /// One ballot per member: a second vote replaces the first.
    pub async fn cast_vote(&self, session_id: Uuid, option_id: Uuid, user_id: Uuid) -> Result<Vote> {
        let vote = sqlx::query_as::<_, Vote>(
            "INSERT INTO votes (session_id, option_id, user_id) VALUES ($1, $2, $3) \
             ON CONFLICT (session_id, user_id) DO UPDATE SET option_id = EXCLUDED.option_id, cast_at = now() \
             RETURNING session_id, option_id, user_id, cast_at",
        )
        .bind(session_id)
        .bind(option_id)
        .bind(user_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(vote)
    }

    pub async fn withdraw_vote(&self, session_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM votes WHERE session_id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn close_voting_session(&self, id: Uuid) -> Result<Option<VotingSession>> {
        let sql = format!(
            "UPDATE voting_sessions SET status = 'closed', closed_at = now() \
             WHERE id = $1 AND status = 'open' RETURNING {}",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, VotingSession>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(session)
    }

    pub async fn close_expired_voting_sessions(&self, now: DateTime<Utc>) -> Result<Vec<VotingSession>> {
        let sql = format!(
            "UPDATE voting_sessions SET status = 'closed', closed_at = $1 \
             WHERE status = 'open' AND closes_at IS NOT NULL AND closes_at < $1 RETURNING {}",
            SESSION_COLUMNS
        );
        let sessions = sqlx::query_as::<_, VotingSession>(&sql)
            .bind(now)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(sessions)
    }
}
