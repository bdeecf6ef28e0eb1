use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::DbOperations;
use crate::db::models::{MemberProfile, MemberRole, Trip, TripMember, TripSummary};
use crate::Result;

const TRIP_COLUMNS: &str = "id, owner_id, name, description, destination, start_date, end_date, \
                            budget_per_person, status, created_at, updated_at";

impl DbOperations {
    /// Inserts the trip and its owner membership together.
    pub async fn create_trip(&self, trip: &Trip) -> Result<Trip> {
        let mut tx = self.begin_transaction().await?;

        let sql = format!(
            "INSERT INTO trips (id, owner_id, name, description, destination, start_date, end_date, \
                                budget_per_person, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            TRIP_COLUMNS
        );
        let created = sqlx::query_as::<_, Trip>(&sql)
            .bind(trip.id)
            .bind(trip.owner_id)
            .bind(&trip.name)
            .bind(&trip.description)
            .bind(&trip.destination)
            .bind(trip.start_date)
            .bind(trip.end_date)
            .bind(trip.budget_per_person)
            .bind(trip.status)
            .bind(trip.created_at)
            .bind(trip.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        Self::add_member_with_transaction(&mut tx, created.id, created.owner_id, MemberRole::Owner).await?;
        tx.commit().await?;

        Ok(created)
    }

    pub async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>> {
        let sql = format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS);
        let trip = sqlx::query_as::<_, Trip>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(trip)
    }

    pub async fn list_trips_for_user(&self, user_id: Uuid) -> Result<Vec<TripSummary>> {
        let trips = sqlx::query_as::<_, TripSummary>(
            r#"
            SELECT t.id, t.owner_id, t.name, t.description, t.destination, t.start_date, t.end_date,
                   t.budget_per_person, t.status, t.created_at, t.updated_at,
                   m.role,
                   (SELECT COUNT(*) FROM trip_members c WHERE c.trip_id = t.id) AS member_count
            FROM trips t
            JOIN trip_members m ON m.trip_id = t.id
            WHERE m.user_id = $1
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(trips)
    }

    pub async fn update_trip(&self, trip: &Trip) -> Result<Trip> {
        let sql = format!(
            "UPDATE trips SET name = $2, description = $3, destination = $4, start_date = $5, \
                end_date = $6, budget_per_person = $7, status = $8, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            TRIP_COLUMNS
        );
        let updated = sqlx::query_as::<_, Trip>(&sql)
            .bind(trip.id)
            .bind(&trip.name)
            .bind(&trip.description)
            .bind(&trip.destination)
            .bind(trip.start_date)
            .bind(trip.end_date)
            .bind(trip.budget_per_person)
            .bind(trip.status)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(updated)
    }

    pub async fn delete_trip(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_membership(&self, trip_id: Uuid, user_id: Uuid) -> Result<Option<TripMember>> {
        let member = sqlx::query_as::<_, TripMember>(
            "SELECT trip_id, user_id, role, joined_at FROM trip_members WHERE trip_id = $1 AND user_id = $2",
        )
        .bind(trip_id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(member)
    }

    pub async fn list_members(&self, trip_id: Uuid) -> Result<Vec<MemberProfile>> {
        let members = sqlx::query_as::<_, MemberProfile>(
            r#"
            SELECT m.user_id, u.email, u.display_name, u.avatar_url, m.role, m.joined_at
            FROM trip_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.trip_id = $1
            ORDER BY m.role DESC, m.joined_at
            "#,
        )
        .bind(trip_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(members)
    }

    pub async fn member_ids(&self, trip_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM trip_members WHERE trip_id = $1")
            .bind(trip_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(ids)
    }

    /// Never touches the owner row.
    pub async fn set_member_role(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Option<TripMember>> {
        let member = sqlx::query_as::<_, TripMember>(
            "UPDATE trip_members SET role = $3 \
             WHERE trip_id = $1 AND user_id = $2 AND role <> 'owner' \
             RETURNING trip_id, user_id, role, joined_at",
        )
        .bind(trip_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(member)
    }

    pub async fn remove_member(&self, trip_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM trip_members WHERE trip_id = $1 AND user_id = $2 AND role <> 'owner'",
        )
        .bind(trip_id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn add_member_with_transaction(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<TripMember> {
        let member = sqlx::query_as::<_, TripMember>(
            "INSERT INTO trip_members (trip_id, user_id, role) VALUES ($1, $2, $3) \
             ON CONFLICT (trip_id, user_id) DO UPDATE SET role = trip_members.role \
             RETURNING trip_id, user_id, role, joined_at",
        )
        .bind(trip_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&mut **tx)
        .await?;

        Ok(member)
    }
}
