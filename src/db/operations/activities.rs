use uuid::Uuid;

use super::DbOperations;
use crate::db::models::Activity;
use crate::Result;

const ACTIVITY_COLUMNS: &str = "id, trip_id, created_by, name, description, category, location, latitude, \
                                longitude, starts_at, ends_at, cost_estimate, url, external_id, \
                                created_at, updated_at";

impl DbOperations {
    pub async fn create_activity(&self, activity: &Activity) -> Result<Activity> {
        let sql = format!(
            "INSERT INTO activities (id, trip_id, created_by, name, description, category, location, \
                latitude, longitude, starts_at, ends_at, cost_estimate, url, external_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING {}",
            ACTIVITY_COLUMNS
        );
        let created = sqlx::query_as::<_, Activity>(&sql)
            .bind(activity.id)
            .bind(activity.trip_id)
            .bind(activity.created_by)
            .bind(&activity.name)
            .bind(&activity.description)
            .bind(activity.category)
            .bind(&activity.location)
            .bind(activity.latitude)
            .bind(activity.longitude)
            .bind(activity.starts_at)
            .bind(activity.ends_at)
            .bind(activity.cost_estimate)
            .bind(&activity.url)
            .bind(&activity.external_id)
            .bind(activity.created_at)
            .bind(activity.updated_at)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(created)
    }

    pub async fn list_activities(&self, trip_id: Uuid) -> Result<Vec<Activity>> {
        let sql = format!(
            "SELECT {} FROM activities WHERE trip_id = $1 ORDER BY starts_at ASC NULLS LAST, created_at ASC",
            ACTIVITY_COLUMNS
        );
        let activities = sqlx::query_as::<_, Activity>(&sql)
            .bind(trip_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(activities)
    }

    pub async fn get_activity(&self, trip_id: Uuid, id: Uuid) -> Result<Option<Activity>> {
        let sql = format!("SELECT {} FROM activities WHERE trip_id = $1 AND id = $2", ACTIVITY_COLUMNS);
        let activity = sqlx::query_as::<_, Activity>(&sql)
            .bind(trip_id)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(activity)
    }

    pub async fn update_activity(&self, activity: &Activity) -> Result<Activity> {
        let sql = format!(
            "UPDATE activities SET name = $2, description = $3, category = $4, location = $5, latitude = $6, \
                longitude = $7, starts_at = $8, ends_at = $9, cost_estimate = $10, url = $11, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            ACTIVITY_COLUMNS
        );
        let updated = sqlx::query_as::<_, Activity>(&sql)
            .bind(activity.id)
            .bind(&activity.name)
            .bind(&activity.description)
            .bind(activity.category)
            .bind(&activity.location)
            .bind(activity.latitude)
            .bind(activity.longitude)
            .bind(activity.starts_at)
            .bind(activity.ends_at)
            .bind(activity.cost_estimate)
            .bind(&activity.url)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(updated)
    }

    pub async fn delete_activity(&self, trip_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM activities WHERE trip_id = $1 AND id = $2")
            .bind(trip_id)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
