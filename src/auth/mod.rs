//! Authentication module
//!
//! Registration and login, JWT tokens backed by session rows, the
//! `AuthenticatedUser` extractor, and request rate limiting.

pub mod handlers;
mod extractor;
mod password;
mod rate_limit;
mod service;

pub use extractor::{bearer_token, AuthenticatedUser};
pub use password::{hash_password, verify_password};
pub use rate_limit::{RateLimiter, RateLimitConfig, AI_BUCKET, LOGIN_BUCKET};
pub use service::{normalize_email, AuthService, Claims};
