use uuid::Uuid;

use super::DbOperations;
use crate::db::models::Notification;
use crate::Result;

const NOTIFICATION_COLUMNS: &str = "id, user_id, trip_id, kind, title, body, payload, read_at, created_at";

impl DbOperations {
    pub async fn insert_notifications(&self, notifications: &[Notification]) -> Result<Vec<Notification>> {
        if notifications.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.begin_transaction().await?;
        let sql = format!(
            "INSERT INTO notifications (id, user_id, trip_id, kind, title, body, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            NOTIFICATION_COLUMNS
        );

        let mut stored = Vec::with_capacity(notifications.len());
        for n in notifications {
            let row = sqlx::query_as::<_, Notification>(&sql)
                .bind(n.id)
                .bind(n.user_id)
                .bind(n.trip_id)
                .bind(n.kind)
                .bind(&n.title)
                .bind(&n.body)
                .bind(&n.payload)
                .bind(n.created_at)
                .fetch_one(&mut *tx)
                .await?;
            stored.push(row);
        }

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn list_notifications(&self, user_id: Uuid, unread_only: bool, limit: i64) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL) \
             ORDER BY created_at DESC LIMIT $3",
            NOTIFICATION_COLUMNS
        );
        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(notifications)
    }

    pub async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>> {
        let sql = format!(
            "UPDATE notifications SET read_at = COALESCE(read_at, now()) \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        let notification = sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(notification)
    }

    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET read_at = now() WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn unread_notification_count(&self, user_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }
}
