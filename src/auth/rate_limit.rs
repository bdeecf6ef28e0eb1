use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc, Duration};
use tracing::warn;

use crate::config::RateLimitSettings;

pub const LOGIN_BUCKET: &str = "login";
pub const AI_BUCKET: &str = "ai";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub limits: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert(LOGIN_BUCKET.to_string(), 10);  // login attempts per email per window
        limits.insert(AI_BUCKET.to_string(), 5);      // itinerary generations per user per window

        Self {
            window_size: Duration::minutes(1),
            limits,
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        let mut limits = HashMap::new();
        limits.insert(LOGIN_BUCKET.to_string(), settings.login_attempts);
        limits.insert(AI_BUCKET.to_string(), settings.ai_requests);

        Self {
            window_size: Duration::seconds(settings.window_seconds),
            limits,
        }
    }
}

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_requests(&mut self, window_size: Duration) {
        let cutoff = Utc::now() - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    fn add_request(&mut self) {
        self.timestamps.push(Utc::now());
    }

    fn request_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Sliding-window limiter keyed by `(bucket, key)`, e.g. `("login", email)`.
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<(String, String), RequestWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Records the request and returns whether it is allowed. Buckets
    /// without a configured limit are not limited.
    pub async fn check_rate_limit(&self, key: &str, bucket: &str) -> bool {
        let limit = match self.config.limits.get(bucket) {
            Some(limit) => *limit as usize,
            None => {
                warn!("No rate limit configured for bucket '{}'", bucket);
                return true;
            }
        };

        let mut windows = self.windows.write().await;
        let window = windows
            .entry((bucket.to_string(), key.to_string()))
            .or_insert_with(RequestWindow::new);

        window.cleanup_old_requests(self.config.window_size);

        if window.request_count() < limit {
            window.add_request();
            true
        } else {
            false
        }
    }

    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;

        windows.retain(|_, window| {
            window.cleanup_old_requests(self.config.window_size);
            !window.timestamps.is_empty()
        });
    }

    #[cfg(test)]
    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}
