use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::models::{Activity, ActivityCategory, NotificationKind};
use crate::error::AppError;
use crate::integrations::Geocoder;
use crate::notifications::NotificationDraft;
use crate::trips::handlers::display_name;
use crate::trips::require_member;
use crate::{AppState, Result};

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateActivityRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category: ActivityCategory,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub cost_estimate: Option<f64>,
    pub url: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateActivityRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ActivityCategory>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub cost_estimate: Option<f64>,
    pub url: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn validate_activity(activity: &Activity) -> Result<()> {
    if activity.name.trim().is_empty() {
        return Err(AppError::validation("activity name is required"));
    }
    if activity.name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!("activity name is limited to {} characters", MAX_NAME_LEN)));
    }
    if let (Some(start), Some(end)) = (activity.starts_at, activity.ends_at) {
        if start > end {
            return Err(AppError::validation("starts_at must not be after ends_at"));
        }
    }
    match (activity.latitude, activity.longitude) {
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(AppError::validation("latitude must be between -90 and 90"));
            }
            if !(-180.0..=180.0).contains(&lng) {
                return Err(AppError::validation("longitude must be between -180 and 180"));
            }
        }
        (None, None) => {}
        _ => return Err(AppError::validation("latitude and longitude must be given together")),
    }
    if let Some(cost) = activity.cost_estimate {
        if !cost.is_finite() || cost < 0.0 {
            return Err(AppError::validation("cost_estimate must be a non-negative number"));
        }
    }
    if let Some(url) = &activity.url {
        url::Url::parse(url).map_err(|_| AppError::validation("url must be an absolute URL"))?;
    }
    Ok(())
}

pub fn apply_update(activity: &mut Activity, update: UpdateActivityRequest) {
    if let Some(name) = update.name {
        activity.name = name.trim().to_string();
    }
    if update.description.is_some() {
        activity.description = blank_to_none(update.description);
    }
    if let Some(category) = update.category {
        activity.category = category;
    }
    if update.location.is_some() {
        let location = blank_to_none(update.location);
        if location != activity.location && update.latitude.is_none() && update.longitude.is_none() {
            // stale coordinates; fill_coordinates asks the geocoder again
            activity.latitude = None;
            activity.longitude = None;
        }
        activity.location = location;
    }
    if update.latitude.is_some() || update.longitude.is_some() {
        activity.latitude = update.latitude;
        activity.longitude = update.longitude;
    }
    if update.starts_at.is_some() {
        activity.starts_at = update.starts_at;
    }
    if update.ends_at.is_some() {
        activity.ends_at = update.ends_at;
    }
    if update.cost_estimate.is_some() {
        activity.cost_estimate = update.cost_estimate;
    }
    if update.url.is_some() {
        activity.url = blank_to_none(update.url);
    }
}

/// Looks up coordinates for a located activity that has none. Failures leave
/// the activity as it is.
pub async fn fill_coordinates(geocoder: &dyn Geocoder, activity: &mut Activity) {
    if activity.latitude.is_some() || activity.longitude.is_some() {
        return;
    }
    let Some(location) = activity.location.as_deref() else {
        return;
    };

    match geocoder.geocode(location).await {
        Ok(Some(point)) => {
            debug!("Geocoded '{}' to {},{}", location, point.latitude, point.longitude);
            activity.latitude = Some(point.latitude);
            activity.longitude = Some(point.longitude);
        }
        Ok(None) => debug!("No geocoding match for '{}'", location),
        Err(e) => warn!("Geocoding '{}' failed: {}", location, e),
    }
}

pub async fn create_activity(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<CreateActivityRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;
    let req = req.into_inner();
    let now = Utc::now();

    let mut activity = Activity {
        id: Uuid::new_v4(),
        trip_id: access.trip.id,
        created_by: auth.user.id,
        name: req.name.trim().to_string(),
        description: blank_to_none(req.description),
        category: req.category,
        location: blank_to_none(req.location),
        latitude: req.latitude,
        longitude: req.longitude,
        starts_at: req.starts_at,
        ends_at: req.ends_at,
        cost_estimate: req.cost_estimate,
        url: blank_to_none(req.url),
        external_id: blank_to_none(req.external_id),
        created_at: now,
        updated_at: now,
    };
    validate_activity(&activity)?;
    fill_coordinates(state.integrations.geocoder.as_ref(), &mut activity).await;

    let activity = state.db.create_activity(&activity).await?;
    info!("User {} added activity {} to trip {}", auth.user.id, activity.id, activity.trip_id);

    let draft = NotificationDraft::new(
        NotificationKind::ActivityAdded,
        format!("New activity: {}", activity.name),
        format!("{} added {} to {}", display_name(&auth), activity.name, access.trip.name),
    )
    .with_payload(serde_json::json!({ "activity_id": activity.id }));
    state.notifier.notify_trip_members(activity.trip_id, Some(auth.user.id), draft).await;

    Ok(HttpResponse::Created().json(activity))
}

pub async fn list_activities(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;
    let activities = state.db.list_activities(access.trip.id).await?;
    Ok(HttpResponse::Ok().json(activities))
}

/// Loads an activity the caller may change: its creator, or a trip manager.
async fn editable_activity(state: &AppState, auth: &AuthenticatedUser, trip_id: Uuid, activity_id: Uuid) -> Result<Activity> {
    let access = require_member(&state.db, trip_id, auth.user.id).await?;
    let activity = state.db
        .get_activity(trip_id, activity_id)
        .await?
        .ok_or_else(|| AppError::not_found("activity"))?;

    if activity.created_by != auth.user.id && !access.role().can_manage() {
        return Err(AppError::forbidden("only the creator or a trip organizer can change this activity"));
    }
    Ok(activity)
}

pub async fn update_activity(
    auth: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<UpdateActivityRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (trip_id, activity_id) = path.into_inner();
    let mut activity = editable_activity(&state, &auth, trip_id, activity_id).await?;

    apply_update(&mut activity, req.into_inner());
    validate_activity(&activity)?;
    fill_coordinates(state.integrations.geocoder.as_ref(), &mut activity).await;

    let activity = state.db.update_activity(&activity).await?;
    info!("User {} updated activity {}", auth.user.id, activity.id);
    Ok(HttpResponse::Ok().json(activity))
}

pub async fn delete_activity(
    auth: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (trip_id, activity_id) = path.into_inner();
    let activity = editable_activity(&state, &auth, trip_id, activity_id).await?;

    if !state.db.delete_activity(trip_id, activity.id).await? {
        return Err(AppError::not_found("activity"));
    }
    info!("User {} deleted activity {}", auth.user.id, activity.id);
    Ok(HttpResponse::NoContent().finish())
}
