#![allow(dead_code)]

use actix_web::web;
use sqlx::PgPool;
use trip_planner_server::{AppState, DbOperations, Settings};

/// State over a lazily connected pool: requests rejected before any query
/// never need a database.
pub fn lazy_state() -> web::Data<AppState> {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let db = DbOperations::connect_lazy(&config.database).expect("Failed to build lazy pool");
    web::Data::new(AppState::from_parts(config, db).expect("Failed to build state"))
}

/// State over `DATABASE_URL` with migrations applied.
pub async fn database_state() -> web::Data<AppState> {
    let mut config = Settings::new_for_test().expect("Failed to load test config");
    config.database.url = database_url();
    let state = AppState::new(config).await.expect("Failed to connect to test database");
    web::Data::new(state)
}

fn database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        Settings::new_for_test()
            .expect("Failed to load test config")
            .database
            .url
    })
}

/// Direct connection for seeding rows the API cannot produce, such as
/// deadlines in the past.
pub async fn raw_pool() -> PgPool {
    PgPool::connect(&database_url())
        .await
        .expect("Failed to connect to test database")
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}+{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}
