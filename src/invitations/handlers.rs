use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::token::{generate_token, hash_token};
use crate::auth::{normalize_email, AuthenticatedUser};
use crate::db::models::{Invitation, InvitationStatus, NotificationKind};
use crate::error::AppError;
use crate::notifications::NotificationDraft;
use crate::trips::{require_manager, require_member};
use crate::trips::handlers::display_name;
use crate::{AppState, Result};

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedInvitation {
    pub invitation: Invitation,
    /// Only returned here; the database keeps a digest.
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptByTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

pub async fn create_invitation(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<CreateInvitationRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_manager(&state.db, path.into_inner(), auth.user.id).await?;
    let trip = access.trip;
    let email = normalize_email(&req.email)?;

    if state.db.is_member_email(trip.id, &email).await? {
        return Err(AppError::Conflict(format!("{} is already a member of this trip", email)));
    }
    if state.db.has_pending_invitation(trip.id, &email).await? {
        return Err(AppError::Conflict(format!("{} already has a pending invitation", email)));
    }

    let token = generate_token();
    let now = Utc::now();
    let invitation = Invitation {
        id: Uuid::new_v4(),
        trip_id: trip.id,
        email: email.clone(),
        invited_by: auth.user.id,
        token_hash: token.hash,
        status: InvitationStatus::Pending,
        expires_at: now + Duration::days(state.config.auth.invitation_expiry_days),
        created_at: now,
        responded_at: None,
    };
    let invitation = state.db.create_invitation(&invitation).await?;
    info!("User {} invited {} to trip {}", auth.user.id, email, trip.id);

    if let Some(invitee) = state.db.get_user_by_email(&email).await? {
        let draft = NotificationDraft::new(
            NotificationKind::InvitationReceived,
            format!("You're invited to {}", trip.name),
            format!("{} invited you to join the trip", display_name(&auth)),
        )
        .for_trip(trip.id)
        .with_payload(serde_json::json!({ "invitation_id": invitation.id }));
        state.notifier.notify_or_log(&[invitee.id], draft).await;
    }

    Ok(HttpResponse::Created().json(CreatedInvitation {
        invitation,
        token: token.token,
    }))
}

pub async fn list_trip_invitations(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_manager(&state.db, path.into_inner(), auth.user.id).await?;
    let invitations = state.db.list_invitations_for_trip(access.trip.id).await?;
    Ok(HttpResponse::Ok().json(invitations))
}

pub async fn revoke_invitation(
    auth: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (trip_id, invitation_id) = path.into_inner();
    require_manager(&state.db, trip_id, auth.user.id).await?;

    let invitation = state.db
        .get_invitation(invitation_id)
        .await?
        .filter(|i| i.trip_id == trip_id)
        .ok_or_else(|| AppError::not_found("invitation"))?;

    let revoked = state.db
        .resolve_invitation(invitation.id, InvitationStatus::Revoked)
        .await?
        .ok_or_else(|| AppError::Conflict("only pending invitations can be revoked".into()))?;

    info!("User {} revoked invitation {}", auth.user.id, revoked.id);
    Ok(HttpResponse::Ok().json(revoked))
}

pub async fn list_my_invitations(auth: AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let invitations = state.db
        .list_pending_invitations_for_email(&auth.user.email, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(invitations))
}

pub async fn accept_by_token(
    auth: AuthenticatedUser,
    req: web::Json<AcceptByTokenRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if req.token.trim().is_empty() {
        return Err(AppError::validation("token is required"));
    }
    let invitation = state.db
        .get_invitation_by_token_hash(&hash_token(&req.token))
        .await?
        .ok_or_else(|| AppError::not_found("invitation"))?;

    accept(&state, &auth, invitation).await
}

pub async fn respond(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<RespondRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let invitation = state.db
        .get_invitation(path.into_inner())
        .await?
        .filter(|i| i.email == auth.user.email)
        .ok_or_else(|| AppError::not_found("invitation"))?;

    if req.accept {
        return accept(&state, &auth, invitation).await;
    }

    ensure_answerable(&state, &invitation).await?;
    let declined = state.db
        .resolve_invitation(invitation.id, InvitationStatus::Declined)
        .await?
        .ok_or_else(|| AppError::Conflict("invitation is no longer pending".into()))?;

    info!("User {} declined invitation {}", auth.user.id, declined.id);
    Ok(HttpResponse::Ok().json(declined))
}

/// Pending and unexpired. An expired invitation is marked so on the way out.
async fn ensure_answerable(state: &AppState, invitation: &Invitation) -> Result<()> {
    if invitation.status != InvitationStatus::Pending {
        return Err(AppError::Conflict(format!(
            "invitation is already {}",
            serde_json::to_value(invitation.status)?.as_str().unwrap_or("resolved")
        )));
    }
    if invitation.is_expired_at(Utc::now()) {
        state.db.resolve_invitation(invitation.id, InvitationStatus::Expired).await?;
        return Err(AppError::validation("invitation has expired"));
    }
    Ok(())
}

async fn accept(state: &AppState, auth: &AuthenticatedUser, invitation: Invitation) -> Result<HttpResponse> {
    if invitation.email != auth.user.email {
        warn!("User {} tried to accept invitation {} addressed to someone else", auth.user.id, invitation.id);
        return Err(AppError::forbidden("this invitation was sent to a different email address"));
    }
    ensure_answerable(state, &invitation).await?;

    let (invitation, member) = state.db.accept_invitation(invitation.id, auth.user.id).await?;
    info!("User {} joined trip {} via invitation {}", auth.user.id, invitation.trip_id, invitation.id);

    let trip = require_member(&state.db, invitation.trip_id, auth.user.id).await?.trip;
    let who = display_name(auth).to_string();

    let to_inviter = NotificationDraft::new(
        NotificationKind::InvitationAccepted,
        format!("{} accepted your invitation", who),
        format!("{} is now part of {}", who, trip.name),
    )
    .for_trip(trip.id);
    state.notifier.notify_or_log(&[invitation.invited_by], to_inviter).await;

    let members = state.db.member_ids(trip.id).await?;
    let others: Vec<Uuid> = members
        .into_iter()
        .filter(|id| *id != auth.user.id && *id != invitation.invited_by)
        .collect();
    let joined = NotificationDraft::new(
        NotificationKind::MemberJoined,
        format!("{} joined {}", who, trip.name),
        format!("Say hello to {}", who),
    )
    .for_trip(trip.id);
    state.notifier.notify_or_log(&others, joined).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "invitation": invitation,
        "member": member,
        "trip": trip,
    })))
}
