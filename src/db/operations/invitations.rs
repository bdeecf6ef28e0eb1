use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbOperations;
use crate::db::models::{Invitation, InvitationStatus, MemberRole, PendingInvitation, TripMember};
use crate::error::AppError;
use crate::Result;

const INVITATION_COLUMNS: &str =
    "id, trip_id, email, invited_by, token_hash, status, expires_at, created_at, responded_at";

impl DbOperations {
    pub async fn create_invitation(&self, invitation: &Invitation) -> Result<Invitation> {
        let sql = format!(
            "INSERT INTO invitations (id, trip_id, email, invited_by, token_hash, status, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            INVITATION_COLUMNS
        );
        let created = sqlx::query_as::<_, Invitation>(&sql)
            .bind(invitation.id)
            .bind(invitation.trip_id)
            .bind(&invitation.email)
            .bind(invitation.invited_by)
            .bind(&invitation.token_hash)
            .bind(invitation.status)
            .bind(invitation.expires_at)
            .bind(invitation.created_at)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(created)
    }

    pub async fn get_invitation(&self, id: Uuid) -> Result<Option<Invitation>> {
        let sql = format!("SELECT {} FROM invitations WHERE id = $1", INVITATION_COLUMNS);
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(invitation)
    }

    pub async fn get_invitation_by_token_hash(&self, token_hash: &str) -> Result<Option<Invitation>> {
        let sql = format!("SELECT {} FROM invitations WHERE token_hash = $1", INVITATION_COLUMNS);
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(token_hash)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(invitation)
    }

    pub async fn list_invitations_for_trip(&self, trip_id: Uuid) -> Result<Vec<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE trip_id = $1 ORDER BY created_at DESC",
            INVITATION_COLUMNS
        );
        let invitations = sqlx::query_as::<_, Invitation>(&sql)
            .bind(trip_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(invitations)
    }

    pub async fn list_pending_invitations_for_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PendingInvitation>> {
        let invitations = sqlx::query_as::<_, PendingInvitation>(
            r#"
            SELECT i.id, i.trip_id, i.email, i.invited_by, i.token_hash, i.status, i.expires_at,
                   i.created_at, i.responded_at,
                   t.name AS trip_name,
                   u.display_name AS invited_by_name
            FROM invitations i
            JOIN trips t ON t.id = i.trip_id
            JOIN users u ON u.id = i.invited_by
            WHERE i.email = $1 AND i.status = 'pending' AND i.expires_at > $2
            ORDER BY i.created_at DESC
            "#,
        )
        .bind(email)
        .bind(now)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(invitations)
    }

    pub async fn has_pending_invitation(&self, trip_id: Uuid, email: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM invitations \
             WHERE trip_id = $1 AND email = $2 AND status = 'pending')",
        )
        .bind(trip_id)
        .bind(email)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    pub async fn is_member_email(&self, trip_id: Uuid, email: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM trip_members m JOIN users u ON u.id = m.user_id \
             WHERE m.trip_id = $1 AND u.email = $2)",
        )
        .bind(trip_id)
        .bind(email)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    /// Moves a pending invitation to `status`. `None` when it was no longer pending.
    pub async fn resolve_invitation(&self, id: Uuid, status: InvitationStatus) -> Result<Option<Invitation>> {
        let sql = format!(
            "UPDATE invitations SET status = $2, responded_at = now() \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            INVITATION_COLUMNS
        );
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(invitation)
    }

    /// Marks the invitation accepted and adds the user as a member in one
    /// transaction. Fails with a conflict when another request got there first.
    pub async fn accept_invitation(&self, id: Uuid, user_id: Uuid) -> Result<(Invitation, TripMember)> {
        let mut tx = self.begin_transaction().await?;

        let sql = format!(
            "UPDATE invitations SET status = 'accepted', responded_at = now() \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            INVITATION_COLUMNS
        );
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::Conflict("invitation is no longer pending".into()))?;

        let member =
            Self::add_member_with_transaction(&mut tx, invitation.trip_id, user_id, MemberRole::Member).await?;
        tx.commit().await?;

        Ok((invitation, member))
    }

    pub async fn expire_invitations(&self, now: DateTime<Utc>) -> Result<Vec<Invitation>> {
        let sql = format!(
            "UPDATE invitations SET status = 'expired', responded_at = $1 \
             WHERE status = 'pending' AND expires_at < $1 RETURNING {}",
            INVITATION_COLUMNS
        );
        let expired = sqlx::query_as::<_, Invitation>(&sql)
            .bind(now)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(expired)
    }
}
