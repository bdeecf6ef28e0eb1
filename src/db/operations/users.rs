use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbOperations;
use crate::db::models::{User, UserSession};
use crate::Result;

const USER_COLUMNS: &str = "id, email, password_hash, display_name, home_airport, avatar_url, \
                            created_at, updated_at, last_login, is_active";

impl DbOperations {
    pub async fn create_user(&self, user: &User) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, display_name, created_at, updated_at, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.display_name)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.is_active)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    /// Stores the profile fields as given; `None` clears the column.
    pub async fn update_user_profile(
        &self,
        id: Uuid,
        display_name: Option<&str>,
        home_airport: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET \
                display_name = $2, \
                home_airport = $3, \
                avatar_url = $4, \
                updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(display_name)
            .bind(home_airport)
            .bind(avatar_url)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn record_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn create_session(&self, session: &UserSession) -> Result<UserSession> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (id, user_id, token, expires_at, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, token, expires_at, created_at, last_activity
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<UserSession>> {
        let session = sqlx::query_as::<_, UserSession>(
            "SELECT id, user_id, token, expires_at, created_at, last_activity \
             FROM user_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    pub async fn update_session_activity(&self, token: &str) -> Result<()> {
        sqlx::query("UPDATE user_sessions SET last_activity = $1 WHERE token = $2")
            .bind(Utc::now())
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn delete_session(&self, token: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }
}
