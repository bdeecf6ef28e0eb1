use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::{AppState, Result};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

impl ListQuery {
    fn limit(&self) -> Result<i64> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(l) if (1..=MAX_LIMIT).contains(&l) => Ok(l),
            Some(_) => Err(AppError::validation(format!("limit must be between 1 and {}", MAX_LIMIT))),
        }
    }
}

pub async fn list(
    auth: AuthenticatedUser,
    query: web::Query<ListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let limit = query.limit()?;
    let notifications = state.db.list_notifications(auth.user.id, query.unread_only, limit).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

pub async fn unread_count(auth: AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let count = state.db.unread_notification_count(auth.user.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "unread": count })))
}

pub async fn mark_read(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let notification = state.db
        .mark_notification_read(path.into_inner(), auth.user.id)
        .await?
        .ok_or_else(|| AppError::not_found("notification"))?;
    Ok(HttpResponse::Ok().json(notification))
}

pub async fn mark_all_read(auth: AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let updated = state.db.mark_all_notifications_read(auth.user.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_bounds() {
        let q = ListQuery { unread_only: false, limit: None };
        assert_eq!(q.limit().unwrap(), DEFAULT_LIMIT);

        let q = ListQuery { unread_only: true, limit: Some(100) };
        assert_eq!(q.limit().unwrap(), 100);

        let q = ListQuery { unread_only: false, limit: Some(0) };
        assert!(q.limit().is_err());

        let q = ListQuery { unread_only: false, limit: Some(101) };
        assert!(q.limit().is_err());
    }
}
