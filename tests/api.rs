mod common;

use actix_web::{test, App};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use trip_planner_server::auth::Claims;
use trip_planner_server::configure_routes;
use uuid::Uuid;

fn token_with(secret: &str, expires_in: Duration) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        exp: (now + expires_in).timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

#[test_log::test(actix_web::test)]
async fn test_protected_routes_require_token() {
    let state = common::lazy_state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;
    let trip = Uuid::new_v4();

    let requests = vec![
        test::TestRequest::get().uri("/api/users/me"),
        test::TestRequest::get().uri("/api/trips"),
        test::TestRequest::get().uri(&format!("/api/trips/{}", trip)),
        test::TestRequest::get().uri(&format!("/api/trips/{}/activities", trip)),
        test::TestRequest::post().uri(&format!("/api/trips/{}/itinerary", trip)),
        test::TestRequest::get().uri("/api/invitations"),
        test::TestRequest::get().uri(&format!("/api/surveys/{}/recommendations", Uuid::new_v4())),
        test::TestRequest::delete().uri(&format!("/api/votes/{}/ballot", Uuid::new_v4())),
        test::TestRequest::get().uri("/api/notifications/unread-count"),
        test::TestRequest::get().uri("/api/flights/search?origin=SFO&destination=LIS&departure_date=2030-01-01"),
    ];

    for req in requests {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), 401);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["status"], 401);
    }
}

#[actix_web::test]
async fn test_forged_and_expired_tokens_rejected() {
    let state = common::lazy_state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    let cases = [
        "not-a-jwt".to_string(),
        token_with("some_other_secret", Duration::hours(1)),
        token_with("test_secret", Duration::hours(-2)),
    ];
    for token in cases {
        let req = test::TestRequest::get()
            .uri("/api/trips")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401, "token {:?} should be rejected", token);
    }
}

#[actix_web::test]
async fn test_invalid_registration() {
    let state = common::lazy_state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    let bodies = [
        json!({ "email": "test@example.com", "password": "" }),
        json!({ "email": "test@example.com", "password": "short" }),
        json!({ "email": "not-an-email", "password": "password123" }),
    ];
    for body in bodies {
        let resp = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(&body)
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 400, "{} should be rejected", body);
    }
}

#[actix_web::test]
async fn test_logout_without_token() {
    let state = common::lazy_state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    let resp = test::TestRequest::post().uri("/api/auth/logout").send_request(&app).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_cron_sweep_requires_secret() {
    let state = common::lazy_state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    let resp = test::TestRequest::post().uri("/api/cron/sweep").send_request(&app).await;
    assert_eq!(resp.status(), 401);

    let resp = test::TestRequest::post()
        .uri("/api/cron/sweep")
        .insert_header(("X-Cron-Secret", "wrong"))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}
