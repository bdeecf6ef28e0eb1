use std::net::TcpListener;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trip_planner_server::config::CorsConfig;
use trip_planner_server::{configure_routes, AppError, AppState, Settings};

const RATE_LIMIT_CLEANUP_SECS: u64 = 60;

fn cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .supports_credentials()
    };

    cors.max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trip_planner_server=info,actix_web=info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new()?;
    info!("Configuration loaded for {} environment", config.environment);
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    if config.sweep.enabled {
        state
            .sweeper()
            .spawn(Duration::from_secs(config.sweep.interval_seconds.max(1)));
    } else {
        warn!("Periodic sweep disabled; expiry relies on POST /api/cron/sweep");
    }

    // Forget rate limiter windows nobody has touched lately
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(RATE_LIMIT_CLEANUP_SECS)).await;
            limiter.cleanup().await;
        }
    });

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!(
        "Listening on http://{}:{} (websocket at /ws)",
        config.server.host, config.server.port
    );

    let server_state = state.clone();
    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&cors_config))
            .app_data(server_state.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .workers(config.server.workers.max(1) as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    info!("Server stopped, closing database pool");
    state.shutdown().await?;
    Ok(())
}
