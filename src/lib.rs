pub mod activities;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod integrations;
pub mod invitations;
pub mod notifications;
pub mod realtime;
pub mod surveys;
pub mod sweep;
pub mod trips;
pub mod voting;

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use tracing::info;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, RateLimitConfig, RateLimiter};
pub use db::{DbOperations, User, UserSession};
pub use integrations::Integrations;
pub use notifications::Notifier;
pub use realtime::NotificationHub;
pub use sweep::{SweepReport, Sweeper};

/// Health check endpoint handler
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "database": state.db.get_pool_status(),
        "websocket_connections": state.hub.connection_count().await,
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: DbOperations,
    pub auth_service: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub hub: Arc<NotificationHub>,
    pub notifier: Notifier,
    pub integrations: Integrations,
}

impl AppState {
    /// Connects to Postgres, applies pending migrations and wires services.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::connect(&config.database).await?;
        if config.database.run_migrations {
            db.run_migrations().await?;
            info!("Database migrations applied");
        }
        Self::from_parts(config, db)
    }

    pub fn from_parts(config: Settings, db: DbOperations) -> Result<Self> {
        let auth_service = Arc::new(AuthService::new(
            db.clone(),
            config.auth.jwt_secret.clone(),
            config.auth.token_expiry_hours,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.rate_limit)));
        let hub = Arc::new(NotificationHub::new());
        let notifier = Notifier::new(db.clone(), hub.clone());
        let integrations = Integrations::from_config(&config.integrations)?;

        Ok(Self {
            config: Arc::new(config),
            db,
            auth_service,
            rate_limiter,
            hub,
            notifier,
            integrations,
        })
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(self.db.clone(), self.notifier.clone())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.db.close().await;
        Ok(())
    }
}

/// Every HTTP route of the service.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ws", web::get().to(realtime::websocket_route))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::handlers::register))
                        .route("/login", web::post().to(auth::handlers::login))
                        .route("/logout", web::post().to(auth::handlers::logout)),
                )
                .service(
                    web::resource("/users/me")
                        .route(web::get().to(auth::handlers::me))
                        .route(web::patch().to(auth::handlers::update_me)),
                )
                .service(
                    web::scope("/trips")
                        .route("", web::post().to(trips::handlers::create_trip))
                        .route("", web::get().to(trips::handlers::list_trips))
                        .route("/{trip_id}", web::get().to(trips::handlers::get_trip))
                        .route("/{trip_id}", web::patch().to(trips::handlers::update_trip))
                        .route("/{trip_id}", web::delete().to(trips::handlers::delete_trip))
                        .route("/{trip_id}/members", web::get().to(trips::handlers::list_members))
                        .route("/{trip_id}/members/{user_id}", web::patch().to(trips::handlers::update_member_role))
                        .route("/{trip_id}/members/{user_id}", web::delete().to(trips::handlers::remove_member))
                        .route("/{trip_id}/invitations", web::post().to(invitations::handlers::create_invitation))
                        .route("/{trip_id}/invitations", web::get().to(invitations::handlers::list_trip_invitations))
                        .route(
                            "/{trip_id}/invitations/{invitation_id}",
                            web::delete().to(invitations::handlers::revoke_invitation),
                        )
                        .route("/{trip_id}/activities", web::get().to(activities::handlers::list_activities))
                        .route("/{trip_id}/activities", web::post().to(activities::handlers::create_activity))
                        .route(
                            "/{trip_id}/activities/{activity_id}",
                            web::patch().to(activities::handlers::update_activity),
                        )
                        .route(
                            "/{trip_id}/activities/{activity_id}",
                            web::delete().to(activities::handlers::delete_activity),
                        )
                        .route("/{trip_id}/surveys", web::post().to(surveys::handlers::create_survey))
                        .route("/{trip_id}/surveys", web::get().to(surveys::handlers::list_surveys))
                        .route("/{trip_id}/votes", web::post().to(voting::handlers::create_vote))
                        .route("/{trip_id}/votes", web::get().to(voting::handlers::list_votes))
                        .route("/{trip_id}/places", web::get().to(integrations::handlers::search_places))
                        .route("/{trip_id}/events", web::get().to(integrations::handlers::search_events))
                        .route("/{trip_id}/itinerary", web::post().to(integrations::handlers::generate_itinerary)),
                )
                .service(
                    web::scope("/invitations")
                        .route("", web::get().to(invitations::handlers::list_my_invitations))
                        .route("/accept", web::post().to(invitations::handlers::accept_by_token))
                        .route("/{invitation_id}/respond", web::post().to(invitations::handlers::respond)),
                )
                .service(
                    web::scope("/surveys")
                        .route("/{survey_id}", web::get().to(surveys::handlers::get_survey))
                        .route("/{survey_id}/responses", web::post().to(surveys::handlers::submit_response))
                        .route("/{survey_id}/responses", web::get().to(surveys::handlers::list_responses))
                        .route("/{survey_id}/close", web::post().to(surveys::handlers::close_survey))
                        .route("/{survey_id}/recommendations", web::get().to(surveys::handlers::get_recommendations)),
                )
                .service(
                    web::scope("/votes")
                        .route("/{session_id}", web::get().to(voting::handlers::get_vote))
                        .route("/{session_id}/ballot", web::post().to(voting::handlers::cast_ballot))
                        .route("/{session_id}/ballot", web::delete().to(voting::handlers::withdraw_ballot))
                        .route("/{session_id}/close", web::post().to(voting::handlers::close_vote)),
                )
                .service(
                    web::scope("/notifications")
                        .route("", web::get().to(notifications::handlers::list))
                        .route("/unread-count", web::get().to(notifications::handlers::unread_count))
                        .route("/read-all", web::post().to(notifications::handlers::mark_all_read))
                        .route("/{notification_id}/read", web::post().to(notifications::handlers::mark_read)),
                )
                .route("/flights/search", web::get().to(integrations::handlers::search_flights))
                .route("/cron/sweep", web::post().to(sweep::trigger_sweep)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_app_state_from_parts() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let db = DbOperations::connect_lazy(&config.database).expect("lazy pool");
        let state = AppState::from_parts(config, db).expect("state");

        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.hub, &cloned.hub));
        assert_eq!(state.hub.connection_count().await, 0);
    }

    #[actix_web::test]
    async fn test_health_check_reports_version() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let db = DbOperations::connect_lazy(&config.database).expect("lazy pool");
        let state = web::Data::new(AppState::from_parts(config, db).expect("state"));
        let app = test::init_service(
            App::new()
                .app_data(state)
                .route("/health", web::get().to(health_check)),
        )
        .await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["database"]["active_connections"], 0);
        assert_eq!(body["websocket_connections"], 0);
    }
}
