use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::access::require_member;
use crate::auth::AuthenticatedUser;
use crate::db::models::{MemberRole, NotificationKind, Trip, TripStatus};
use crate::error::AppError;
use crate::notifications::NotificationDraft;
use crate::{AppState, Result};

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub name: String,
    pub description: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget_per_person: Option<f64>,
}

/// Absent fields stay as they are; an empty description or destination clears it.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateTripRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget_per_person: Option<f64>,
    pub status: Option<TripStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: MemberRole,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Field rules shared by create and update.
pub fn validate_trip(trip: &Trip) -> Result<()> {
    if trip.name.trim().is_empty() {
        return Err(AppError::validation("trip name is required"));
    }
    if trip.name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!("trip name is limited to {} characters", MAX_NAME_LEN)));
    }
    if let (Some(start), Some(end)) = (trip.start_date, trip.end_date) {
        if start > end {
            return Err(AppError::validation("start_date must not be after end_date"));
        }
    }
    if let Some(budget) = trip.budget_per_person {
        if !budget.is_finite() || budget < 0.0 {
            return Err(AppError::validation("budget_per_person must be a non-negative number"));
        }
    }
    Ok(())
}

pub fn apply_update(trip: &mut Trip, update: UpdateTripRequest) {
    if let Some(name) = update.name {
        trip.name = name.trim().to_string();
    }
    if update.description.is_some() {
        trip.description = blank_to_none(update.description);
    }
    if update.destination.is_some() {
        trip.destination = blank_to_none(update.destination);
    }
    if update.start_date.is_some() {
        trip.start_date = update.start_date;
    }
    if update.end_date.is_some() {
        trip.end_date = update.end_date;
    }
    if update.budget_per_person.is_some() {
        trip.budget_per_person = update.budget_per_person;
    }
    if let Some(status) = update.status {
        trip.status = status;
    }
}

pub async fn create_trip(
    auth: AuthenticatedUser,
    req: web::Json<CreateTripRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let now = Utc::now();
    let trip = Trip {
        id: Uuid::new_v4(),
        owner_id: auth.user.id,
        name: req.name.trim().to_string(),
        description: blank_to_none(req.description),
        destination: blank_to_none(req.destination),
        start_date: req.start_date,
        end_date: req.end_date,
        budget_per_person: req.budget_per_person,
        status: TripStatus::Planning,
        created_at: now,
        updated_at: now,
    };
    validate_trip(&trip)?;

    let trip = state.db.create_trip(&trip).await?;
    info!("User {} created trip {}", auth.user.id, trip.id);
    Ok(HttpResponse::Created().json(trip))
}

pub async fn list_trips(auth: AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let trips = state.db.list_trips_for_user(auth.user.id).await?;
    Ok(HttpResponse::Ok().json(trips))
}

pub async fn get_trip(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "trip": access.trip,
        "role": access.member.role,
    })))
}

pub async fn update_trip(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<UpdateTripRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id)
        .await?
        .require_manager()?;

    let mut trip = access.trip;
    apply_update(&mut trip, req.into_inner());
    validate_trip(&trip)?;

    let trip = state.db.update_trip(&trip).await?;
    info!("User {} updated trip {}", auth.user.id, trip.id);

    let draft = NotificationDraft::new(
        NotificationKind::TripUpdated,
        format!("{} was updated", trip.name),
        format!("{} changed the trip details", display_name(&auth)),
    );
    state.notifier.notify_trip_members(trip.id, Some(auth.user.id), draft).await;

    Ok(HttpResponse::Ok().json(trip))
}

pub async fn delete_trip(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id)
        .await?
        .require_owner()?;

    state.db.delete_trip(access.trip.id).await?;
    info!("User {} deleted trip {}", auth.user.id, access.trip.id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn list_members(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;
    let members = state.db.list_members(access.trip.id).await?;
    Ok(HttpResponse::Ok().json(members))
}

pub async fn update_member_role(
    auth: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<UpdateRoleRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (trip_id, user_id) = path.into_inner();
    if req.role == MemberRole::Owner {
        return Err(AppError::validation("ownership cannot be assigned"));
    }
    let access = require_member(&state.db, trip_id, auth.user.id).await?.require_owner()?;
    if user_id == auth.user.id {
        return Err(AppError::validation("the owner's role cannot be changed"));
    }

    let member = state.db
        .set_member_role(access.trip.id, user_id, req.role)
        .await?
        .ok_or_else(|| AppError::not_found("member"))?;

    info!("User {} set role of {} on trip {} to {:?}", auth.user.id, user_id, trip_id, req.role);
    Ok(HttpResponse::Ok().json(member))
}

/// The owner removes others; anyone else may only remove themself.
pub async fn remove_member(
    auth: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (trip_id, user_id) = path.into_inner();
    let access = require_member(&state.db, trip_id, auth.user.id).await?;
    let leaving = user_id == auth.user.id;

    if leaving && access.role() == MemberRole::Owner {
        return Err(AppError::validation("the owner cannot leave the trip; delete it instead"));
    }
    if !leaving && access.role() != MemberRole::Owner {
        return Err(AppError::forbidden("only the trip owner can remove members"));
    }

    if !state.db.remove_member(trip_id, user_id).await? {
        return Err(AppError::not_found("member"));
    }

    if leaving {
        info!("User {} left trip {}", user_id, trip_id);
    } else {
        info!("User {} removed {} from trip {}", auth.user.id, user_id, trip_id);
        let draft = NotificationDraft::new(
            NotificationKind::MemberRemoved,
            format!("Removed from {}", access.trip.name),
            format!("{} removed you from the trip", display_name(&auth)),
        )
        .for_trip(trip_id);
        state.notifier.notify_or_log(&[user_id], draft).await;
    }

    Ok(HttpResponse::NoContent().finish())
}

pub(crate) fn display_name(auth: &AuthenticatedUser) -> &str {
    auth.user.display_name.as_deref().unwrap_or(&auth.user.email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip() -> Trip {
        let now = Utc::now();
        Trip {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Portugal".into(),
            description: Some("Food tour".into()),
            destination: Some("Lisbon".into()),
            start_date: NaiveDate::from_ymd_opt(2027, 5, 1),
            end_date: NaiveDate::from_ymd_opt(2027, 5, 8),
            budget_per_person: Some(1200.0),
            status: TripStatus::Planning,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validate_trip() {
        assert!(validate_trip(&trip()).is_ok());

        let mut t = trip();
        t.name = "   ".into();
        assert!(validate_trip(&t).is_err());

        let mut t = trip();
        t.name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(validate_trip(&t).is_err());

        let mut t = trip();
        t.budget_per_person = Some(-1.0);
        assert!(validate_trip(&t).is_err());

        let mut t = trip();
        t.budget_per_person = Some(f64::NAN);
        assert!(validate_trip(&t).is_err());
    }

    #[test]
    fn test_update_revalidates_merged_dates() {
        let mut t = trip();
        apply_update(&mut t, UpdateTripRequest {
            start_date: NaiveDate::from_ymd_opt(2027, 6, 1),
            ..Default::default()
        });
        // new start is after the untouched end date
        assert!(validate_trip(&t).is_err());
    }

    #[test]
    fn test_update_clears_blank_text() {
        let mut t = trip();
        apply_update(&mut t, UpdateTripRequest {
            description: Some("  ".into()),
            name: Some("  Portugal 2027 ".into()),
            status: Some(TripStatus::Booked),
            ..Default::default()
        });
        assert_eq!(t.description, None);
        assert_eq!(t.destination.as_deref(), Some("Lisbon"));
        assert_eq!(t.name, "Portugal 2027");
        assert_eq!(t.status, TripStatus::Booked);
    }
}
