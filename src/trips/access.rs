use uuid::Uuid;

use crate::db::models::{MemberRole, Trip, TripMember};
use crate::db::DbOperations;
use crate::error::AppError;
use crate::Result;

/// A trip together with the caller's membership in it.
#[derive(Debug, Clone)]
pub struct TripAccess {
    pub trip: Trip,
    pub member: TripMember,
}

impl TripAccess {
    pub fn role(&self) -> MemberRole {
        self.member.role
    }

    pub fn require_manager(self) -> Result<Self> {
        if self.member.role.can_manage() {
            Ok(self)
        } else {
            Err(AppError::forbidden("only the trip owner or an organizer can do this"))
        }
    }

    pub fn require_owner(self) -> Result<Self> {
        if self.member.role == MemberRole::Owner {
            Ok(self)
        } else {
            Err(AppError::forbidden("only the trip owner can do this"))
        }
    }
}

/// 404 when the trip does not exist, 403 when the user is not a member.
pub async fn require_member(db: &DbOperations, trip_id: Uuid, user_id: Uuid) -> Result<TripAccess> {
    let trip = db.get_trip(trip_id).await?.ok_or_else(|| AppError::not_found("trip"))?;
    let member = db
        .get_membership(trip_id, user_id)
        .await?
        .ok_or_else(|| AppError::forbidden("you are not a member of this trip"))?;

    Ok(TripAccess { trip, member })
}

pub async fn require_manager(db: &DbOperations, trip_id: Uuid, user_id: Uuid) -> Result<TripAccess> {
    require_member(db, trip_id, user_id).await?.require_manager()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TripStatus;
    use chrono::Utc;

    fn access(role: MemberRole) -> TripAccess {
        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Lisbon".into(),
            description: None,
            destination: None,
            start_date: None,
            end_date: None,
            budget_per_person: None,
            status: TripStatus::Planning,
            created_at: now,
            updated_at: now,
        };
        let member = TripMember {
            trip_id: trip.id,
            user_id: Uuid::new_v4(),
            role,
            joined_at: now,
        };
        TripAccess { trip, member }
    }

    #[test]
    fn test_role_gates() {
        assert!(access(MemberRole::Owner).require_owner().is_ok());
        assert!(access(MemberRole::Organizer).require_owner().is_err());
        assert!(access(MemberRole::Organizer).require_manager().is_ok());

        let err = access(MemberRole::Member).require_manager().unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
