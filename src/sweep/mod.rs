//! Periodic expiry job.
//!
//! Expires stale invitations, closes surveys and votes whose deadline has
//! passed and purges expired login sessions. Runs on a timer inside the
//! server and on demand through `POST /api/cron/sweep`.

use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::db::models::{Invitation, NotificationKind};
use crate::db::DbOperations;
use crate::error::{AppError, AuthError};
use crate::notifications::{NotificationDraft, Notifier};
use crate::surveys::handlers::survey_closed_draft;
use crate::voting::handlers::{load_tally, vote_closed_draft};
use crate::{AppState, Result};

pub const CRON_SECRET_HEADER: &str = "X-Cron-Secret";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub invitations_expired: usize,
    pub surveys_closed: usize,
    pub votes_closed: usize,
    pub sessions_purged: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }
}

#[derive(Clone)]
pub struct Sweeper {
    db: DbOperations,
    notifier: Notifier,
}

fn invitation_expired_draft(invitation: &Invitation) -> NotificationDraft {
    NotificationDraft::new(
        NotificationKind::InvitationExpired,
        "Invitation expired",
        format!("Your invitation to {} expired before it was answered", invitation.email),
    )
    .for_trip(invitation.trip_id)
    .with_payload(serde_json::json!({ "invitation_id": invitation.id }))
}

impl Sweeper {
    pub fn new(db: DbOperations, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    /// One pass over everything due at `now`. Each step is a single
    /// `UPDATE .. RETURNING`, so concurrent passes never process a row twice.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let invitations = self.db.expire_invitations(now).await?;
        report.invitations_expired = invitations.len();
        for invitation in &invitations {
            self.notifier
                .notify_or_log(&[invitation.invited_by], invitation_expired_draft(invitation))
                .await;
        }

        let surveys = self.db.close_expired_surveys(now).await?;
        report.surveys_closed = surveys.len();
        for survey in &surveys {
            self.notifier
                .notify_trip_members(survey.trip_id, None, survey_closed_draft(survey))
                .await;
        }

        let sessions = self.db.close_expired_voting_sessions(now).await?;
        report.votes_closed = sessions.len();
        for session in &sessions {
            match load_tally(&self.db, session.id).await {
                Ok((_, tally)) => {
                    self.notifier
                        .notify_trip_members(session.trip_id, None, vote_closed_draft(session, &tally))
                        .await;
                }
                Err(e) => error!("Failed to tally closed vote {}: {}", session.id, e),
            }
        }

        report.sessions_purged = self.db.delete_expired_sessions(now).await?;

        if report.is_empty() {
            tracing::debug!("Sweep found nothing to do");
        } else {
            info!(
                "Sweep expired {} invitations, closed {} surveys and {} votes, purged {} sessions",
                report.invitations_expired, report.surveys_closed, report.votes_closed, report.sessions_purged
            );
        }
        Ok(report)
    }

    /// Runs `run_once` every `interval` until the runtime shuts down.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        info!("Starting sweep every {}s", interval.as_secs());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once(Utc::now()).await {
                    error!("Sweep failed: {}", e);
                }
            }
        })
    }
}

/// Checks the shared secret sent by an external scheduler.
pub fn authorize_cron(req: &HttpRequest, configured: Option<&str>) -> Result<()> {
    let expected = configured
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Unavailable("cron trigger is not configured".into()))?;

    let provided = req
        .headers()
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    if provided.trim() != expected {
        warn!("Rejected cron trigger with a wrong secret");
        return Err(AuthError::InvalidCredentials.into());
    }
    Ok(())
}

pub async fn trigger_sweep(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    authorize_cron(&req, state.config.sweep.cron_secret.as_deref())?;

    let sweeper = Sweeper::new(state.db.clone(), state.notifier.clone());
    let report = sweeper.run_once(Utc::now()).await?;
    Ok(HttpResponse::Ok().json(report))
}
