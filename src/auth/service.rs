use crate::auth::password::{hash_password, verify_password};
use crate::db::operations::DbOperations;
use crate::db::models::{User, UserSession};
use crate::error::{AppError, AuthError};
use crate::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, decode, Header, EncodingKey, DecodingKey, Validation, Algorithm};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
    pub jti: String,  // Keeps tokens unique so each maps to one session row
}

pub struct AuthService {
    db: DbOperations,
    jwt_secret: String,
    token_expiry_hours: i64,
}

/// Trims and lower-cases, rejecting anything that is not `local@domain`.
/// The domain is not checked beyond being non-empty.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(AppError::validation("a valid email address is required"));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl AuthService {
    pub fn new(db: DbOperations, jwt_secret: String, token_expiry_hours: i64) -> Self {
        Self {
            db,
            jwt_secret,
            token_expiry_hours,
        }
    }

    pub async fn register(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<User> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        if self.db.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("an account with this email already exists".into()));
        }

        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let user = User::new(email, hash_password(password)?, display_name);
        let user = self.db.create_user(&user).await?;

        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Verifies credentials and opens a session, returning its token.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(String, User)> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = match self.db.get_user_by_email(&email).await? {
            Some(user) if user.is_active && verify_password(password, &user.password_hash) => user,
            Some(_) | None => {
                warn!("Rejected login for {}", email);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let token = self.generate_token(user.id)?;
        let session = UserSession::new(user.id, token.clone(), self.token_expiry_hours);
        self.db.create_session(&session).await?;
        self.db.record_login(user.id).await?;

        Ok((token, user))
    }

    pub async fn validate_token(&self, token: &str) -> Result<User> {
        // Signature and expiry first, so garbage never reaches the database
        let claims = self.decode_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let session = self.db.get_session_by_token(token).await?
            .ok_or(AuthError::InvalidToken)?;

        if session.is_expired() || session.user_id != user_id {
            return Err(AuthError::SessionExpired.into());
        }

        let user = self.db.get_user_by_id(user_id).await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::InvalidToken)?;

        self.db.update_session_activity(token).await?;

        Ok(user)
    }

    pub async fn invalidate_token(&self, token: &str) -> Result<()> {
        self.db.delete_session(token).await?;
        Ok(())
    }

    pub fn generate_token(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(claims.claims)
    }
}
