use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;
use tracing::{debug, error};
use uuid::Uuid;

use crate::db::models::{Notification, NotificationKind};
use crate::db::DbOperations;
use crate::realtime::{NotificationHub, ServerMessage};
use crate::Result;

/// What to tell recipients; one row is stored per recipient.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub trip_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub payload: Value,
}

impl NotificationDraft {
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            trip_id: None,
            title: title.into(),
            body: body.into(),
            payload: Value::Object(Default::default()),
        }
    }

    pub fn for_trip(mut self, trip_id: Uuid) -> Self {
        self.trip_id = Some(trip_id);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    fn to_row(&self, user_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            trip_id: self.trip_id,
            kind: self.kind,
            title: self.title.clone(),
            body: self.body.clone(),
            payload: Json(self.payload.clone()),
            read_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Persists notifications and pushes them to connected sessions.
#[derive(Clone)]
pub struct Notifier {
    db: DbOperations,
    hub: Arc<NotificationHub>,
}

impl Notifier {
    pub fn new(db: DbOperations, hub: Arc<NotificationHub>) -> Self {
        Self { db, hub }
    }

    pub async fn notify(&self, recipients: &[Uuid], draft: &NotificationDraft) -> Result<Vec<Notification>> {
        let rows: Vec<Notification> = recipients.iter().map(|id| draft.to_row(*id)).collect();
        let stored = self.db.insert_notifications(&rows).await?;

        for notification in &stored {
            self.push(notification).await;
        }

        Ok(stored)
    }

    /// For side effects of an action that already succeeded: failures are
    /// logged, never returned.
    pub async fn notify_or_log(&self, recipients: &[Uuid], draft: NotificationDraft) {
        if recipients.is_empty() {
            return;
        }
        if let Err(e) = self.notify(recipients, &draft).await {
            error!("Failed to store {:?} notifications for {} users: {}", draft.kind, recipients.len(), e);
        }
    }

    /// Notifies every member of the trip except `except`, usually the actor.
    pub async fn notify_trip_members(&self, trip_id: Uuid, except: Option<Uuid>, draft: NotificationDraft) {
        let members = match self.db.member_ids(trip_id).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to load members of trip {} for notification: {}", trip_id, e);
                return;
            }
        };
        let recipients: Vec<Uuid> = members.into_iter().filter(|id| Some(*id) != except).collect();
        self.notify_or_log(&recipients, draft.for_trip(trip_id)).await;
    }

    async fn push(&self, notification: &Notification) {
        match serde_json::to_string(&ServerMessage::Notification(notification.clone())) {
            Ok(payload) => {
                let delivered = self.hub.push_to_user(notification.user_id, &payload).await;
                debug!("Notification {} delivered to {} sessions", notification.id, delivered);
            }
            Err(e) => error!("Failed to serialize notification {}: {}", notification.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_rows() {
        let trip_id = Uuid::new_v4();
        let draft = NotificationDraft::new(NotificationKind::SurveyCreated, "New survey", "Vote on dates")
            .for_trip(trip_id)
            .with_payload(serde_json::json!({"survey_id": "s1"}));

        let user = Uuid::new_v4();
        let row = draft.to_row(user);
        assert_eq!(row.user_id, user);
        assert_eq!(row.trip_id, Some(trip_id));
        assert_eq!(row.kind, NotificationKind::SurveyCreated);
        assert_eq!(row.payload.0["survey_id"], "s1");
        assert!(row.read_at.is_none());
    }
}
