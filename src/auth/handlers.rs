use actix_web::{web, HttpResponse, HttpRequest};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::auth::extractor::{bearer_token, AuthenticatedUser};
use crate::auth::rate_limit::LOGIN_BUCKET;
use crate::db::models::User;
use crate::error::{AppError, AuthError};
use crate::Result;
use tracing::{info, error, warn};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let key = req.email.trim().to_lowercase();
    info!("Received login request for email: {}", key);

    if !state.rate_limiter.check_rate_limit(&key, LOGIN_BUCKET).await {
        warn!("Too many login attempts for {}", key);
        return Err(AuthError::RateLimited.into());
    }

    match state.auth_service.authenticate(&req.email, &req.password).await {
        Ok((token, user)) => {
            info!("Login successful for user {}", user.id);
            Ok(HttpResponse::Ok().json(AuthResponse { token, user }))
        }
        Err(e) => {
            error!("Login failed for email: {}: {}", key, e);
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    info!("Received registration request for email: {}", req.email);

    if let Err(e) = state.auth_service.register(
        &req.email,
        &req.password,
        req.display_name.as_deref(),
    ).await {
        error!("Registration failed for email: {}: {}", req.email, e);
        return Err(e);
    }

    let (token, user) = state.auth_service.authenticate(&req.email, &req.password).await?;
    Ok(HttpResponse::Created().json(AuthResponse { token, user }))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let token = bearer_token(&req).ok_or(AuthError::MissingToken)?;

    state.auth_service.invalidate_token(token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out"
    })))
}

pub async fn me(auth: AuthenticatedUser) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(auth.user))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub home_airport: Option<String>,
    pub avatar_url: Option<String>,
}

pub(crate) fn normalize_airport(code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::validation("airport must be a 3-letter IATA code"));
    }
    Ok(code)
}

/// Absent fields stay as they are; an empty string clears the field.
fn blank_to_none(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn apply_profile_update(user: &mut User, req: UpdateProfileRequest) -> Result<()> {
    if let Some(name) = req.display_name {
        user.display_name = blank_to_none(name);
    }
    if let Some(code) = req.home_airport {
        user.home_airport = blank_to_none(code).as_deref().map(normalize_airport).transpose()?;
    }
    if let Some(url) = req.avatar_url {
        let url = blank_to_none(url);
        if let Some(url) = url.as_deref() {
            url::Url::parse(url).map_err(|_| AppError::validation("avatar_url must be an absolute URL"))?;
        }
        user.avatar_url = url;
    }
    Ok(())
}

pub async fn update_me(
    auth: AuthenticatedUser,
    req: web::Json<UpdateProfileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let mut profile = auth.user.clone();
    apply_profile_update(&mut profile, req.into_inner())?;

    let user = state.db
        .update_user_profile(
            auth.user.id,
            profile.display_name.as_deref(),
            profile.home_airport.as_deref(),
            profile.avatar_url.as_deref(),
        )
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

    info!("Updated profile for user {}", user.id);
    Ok(HttpResponse::Ok().json(user))
}
