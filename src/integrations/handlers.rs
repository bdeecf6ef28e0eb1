use std::fmt::Write as _;

use actix_web::{web, HttpResponse};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{EventQuery, FlightQuery, PlaceQuery, TextGenerator};
use crate::auth::{AuthenticatedUser, RateLimiter, AI_BUCKET};
use crate::auth::handlers::normalize_airport;
use crate::db::models::{Activity, ActivityCategory, Trip};
use crate::error::{AppError, AuthError, IntegrationError};
use crate::surveys::handlers::load_recommendation;
use crate::surveys::Recommendation;
use crate::trips::require_member;
use crate::{AppState, Result};

const MAX_ADULTS: u8 = 9;
const DEFAULT_EVENT_DAYS: i64 = 7;
const MAX_EVENT_DAYS: i64 = 62;
const PROMPT_ACTIVITIES: usize = 30;
const PROMPT_CANDIDATES: usize = 5;

#[derive(Debug, Deserialize)]
pub struct FlightSearchParams {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: Option<u8>,
}

impl FlightSearchParams {
    pub fn into_query(self, today: NaiveDate) -> Result<FlightQuery> {
        let origin = normalize_airport(&self.origin)?;
        let destination = normalize_airport(&self.destination)?;
        if origin == destination {
            return Err(AppError::validation("origin and destination must differ"));
        }
        if self.departure_date < today {
            return Err(AppError::validation("departure_date is in the past"));
        }
        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err(AppError::validation("return_date must not be before departure_date"));
            }
        }
        let adults = self.adults.unwrap_or(1);
        if !(1..=MAX_ADULTS).contains(&adults) {
            return Err(AppError::validation(format!("adults must be between 1 and {}", MAX_ADULTS)));
        }

        Ok(FlightQuery {
            origin,
            destination,
            departure_date: self.departure_date,
            return_date: self.return_date,
            adults,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaceSearchParams {
    pub query: Option<String>,
    pub category: Option<ActivityCategory>,
}

/// Free text wins; otherwise the category name is searched.
pub fn place_query(params: PlaceSearchParams, trip: &Trip) -> Result<PlaceQuery> {
    let text = params
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .or_else(|| {
            params
                .category
                .and_then(|c| serde_json::to_value(c).ok())
                .and_then(|v| v.as_str().map(String::from))
        })
        .ok_or_else(|| AppError::validation("query or category is required"))?;

    Ok(PlaceQuery {
        text,
        near: trip.destination.clone(),
    })
}

#[derive(Debug, Deserialize)]
pub struct EventSearchParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub keyword: Option<String>,
}

/// Missing dates fall back to the trip's, then to a week from today.
pub fn event_query(params: EventSearchParams, trip: &Trip, today: NaiveDate) -> Result<EventQuery> {
    let city = trip
        .destination
        .clone()
        .ok_or_else(|| AppError::validation("the trip has no destination yet"))?;

    let start = params.start.or(trip.start_date).unwrap_or(today);
    let end = params
        .end
        .or(trip.end_date)
        .unwrap_or(start + Duration::days(DEFAULT_EVENT_DAYS));

    if start > end {
        return Err(AppError::validation("start must not be after end"));
    }
    if (end - start).num_days() > MAX_EVENT_DAYS {
        return Err(AppError::validation(format!("event searches span at most {} days", MAX_EVENT_DAYS)));
    }

    Ok(EventQuery {
        city,
        start,
        end,
        keyword: params.keyword.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
    })
}

pub fn itinerary_prompt(trip: &Trip, activities: &[Activity], recommendation: Option<&Recommendation>) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Trip: {}", trip.name);
    if let Some(destination) = &trip.destination {
        let _ = writeln!(prompt, "Destination: {}", destination);
    }
    match (trip.start_date, trip.end_date) {
        (Some(start), Some(end)) => {
            let _ = writeln!(prompt, "Dates: {} to {} ({} days)", start, end, (end - start).num_days() + 1);
        }
        (Some(start), None) => {
            let _ = writeln!(prompt, "Starting: {}", start);
        }
        _ => {}
    }
    if let Some(budget) = trip.budget_per_person {
        let _ = writeln!(prompt, "Budget per person: {:.0}", budget);
    }
    if let Some(description) = &trip.description {
        let _ = writeln!(prompt, "Notes: {}", description);
    }

    if !activities.is_empty() {
        let _ = writeln!(prompt, "\nAlready planned:");
        for activity in activities.iter().take(PROMPT_ACTIVITIES) {
            let when = activity
                .starts_at
                .map(|s| s.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unscheduled".into());
            let _ = writeln!(prompt, "- {} ({}, {:?})", activity.name, when, activity.category);
        }
    }

    if let Some(recommendation) = recommendation.filter(|r| r.respondents > 0) {
        let _ = writeln!(prompt, "\nGroup preferences from {} survey responses, best first:", recommendation.respondents);
        for candidate in recommendation.candidates.iter().take(PROMPT_CANDIDATES) {
            let _ = writeln!(prompt, "- {} (score {:.2})", candidate.candidate, candidate.score);
        }
    }

    let _ = writeln!(prompt, "\nSuggest a day-by-day itinerary that keeps the planned activities and favours the group's preferences.");
    prompt
}

pub async fn suggest_itinerary(
    generator: &dyn TextGenerator,
    trip: &Trip,
    activities: &[Activity],
    recommendation: Option<&Recommendation>,
) -> Result<String> {
    let prompt = itinerary_prompt(trip, activities, recommendation);
    generator.generate(&prompt).await
}

/// Refuses before spending a rate-limit slot when no text provider is set up.
pub(crate) async fn admit_itinerary(text: &dyn TextGenerator, limiter: &RateLimiter, user_id: Uuid) -> Result<()> {
    if !text.is_configured() {
        return Err(IntegrationError::NotConfigured("ai").into());
    }
    if !limiter.check_rate_limit(&user_id.to_string(), AI_BUCKET).await {
        warn!("User {} exceeded the itinerary rate limit", user_id);
        return Err(AuthError::RateLimited.into());
    }
    Ok(())
}

pub async fn search_flights(
    auth: AuthenticatedUser,
    params: web::Query<FlightSearchParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let query = params.into_inner().into_query(Utc::now().date_naive())?;
    info!("User {} searching flights {} -> {}", auth.user.id, query.origin, query.destination);

    let offers = state.integrations.flights.search(&query).await?;
    Ok(HttpResponse::Ok().json(offers))
}

pub async fn search_places(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    params: web::Query<PlaceSearchParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;
    let query = place_query(params.into_inner(), &access.trip)?;

    let places = state.integrations.places.search(&query).await?;
    Ok(HttpResponse::Ok().json(places))
}

pub async fn search_events(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    params: web::Query<EventSearchParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;
    let query = event_query(params.into_inner(), &access.trip, Utc::now().date_naive())?;

    let events = state.integrations.events.search(&query).await?;
    Ok(HttpResponse::Ok().json(events))
}

pub async fn generate_itinerary(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let access = require_member(&state.db, path.into_inner(), auth.user.id).await?;

    admit_itinerary(state.integrations.text.as_ref(), &state.rate_limiter, auth.user.id).await?;

    let trip = access.trip;
    let activities = state.db.list_activities(trip.id).await?;
    let recommendation = match state.db.latest_closed_survey(trip.id).await? {
        Some(survey) => Some(load_recommendation(&state.db, &survey).await?),
        None => None,
    };

    let itinerary = suggest_itinerary(state.integrations.text.as_ref(), &trip, &activities, recommendation.as_ref()).await?;
    info!("Generated itinerary for trip {} requested by {}", trip.id, auth.user.id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "trip_id": trip.id,
        "itinerary": itinerary,
        "based_on_survey": recommendation.map(|r| r.survey_id),
        "generated_at": Utc::now(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TripStatus;
    use crate::integrations::MockTextGenerator;
    use crate::surveys::CandidateScore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trip() -> Trip {
        let now = Utc::now();
        Trip {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Spring in Lisbon".into(),
            description: None,
            destination: Some("Lisbon".into()),
            start_date: Some(date(2027, 5, 1)),
            end_date: Some(date(2027, 5, 4)),
            budget_per_person: Some(900.0),
            status: TripStatus::Planning,
            created_at: now,
            updated_at: now,
        }
    }

    fn flight_params() -> FlightSearchParams {
        FlightSearchParams {
            origin: "sfo".into(),
            destination: "LIS".into(),
            departure_date: date(2027, 5, 1),
            return_date: Some(date(2027, 5, 8)),
            adults: None,
        }
    }

    #[test]
    fn test_flight_params() {
        let today = date(2027, 1, 1);
        let query = flight_params().into_query(today).unwrap();
        assert_eq!(query.origin, "SFO");
        assert_eq!(query.adults, 1);

        let mut p = flight_params();
        p.adults = Some(10);
        assert!(p.into_query(today).is_err());

        let mut p = flight_params();
        p.return_date = Some(date(2027, 4, 30));
        assert!(p.into_query(today).is_err());

        assert!(flight_params().into_query(date(2027, 5, 2)).is_err(), "departure in the past");

        let mut p = flight_params();
        p.destination = "SFO".into();
        assert!(p.into_query(today).is_err());
    }

    #[test]
    fn test_place_query() {
        let q = place_query(PlaceSearchParams { query: Some(" tascas ".into()), category: None }, &trip()).unwrap();
        assert_eq!(q.text, "tascas");
        assert_eq!(q.near.as_deref(), Some("Lisbon"));

        let q = place_query(PlaceSearchParams { query: None, category: Some(ActivityCategory::Nightlife) }, &trip()).unwrap();
        assert_eq!(q.text, "nightlife");

        assert!(place_query(PlaceSearchParams { query: Some(" ".into()), category: None }, &trip()).is_err());
    }

    #[test]
    fn test_event_query_defaults() {
        let today = date(2027, 1, 1);
        let q = event_query(EventSearchParams { start: None, end: None, keyword: None }, &trip(), today).unwrap();
        assert_eq!(q.start, date(2027, 5, 1));
        assert_eq!(q.end, date(2027, 5, 4));

        let mut t = trip();
        t.start_date = None;
        t.end_date = None;
        let q = event_query(EventSearchParams { start: None, end: None, keyword: Some("jazz".into()) }, &t, today).unwrap();
        assert_eq!(q.start, today);
        assert_eq!(q.end, date(2027, 1, 8));
        assert_eq!(q.keyword.as_deref(), Some("jazz"));

        t.destination = None;
        assert!(event_query(EventSearchParams { start: None, end: None, keyword: None }, &t, today).is_err());

        let backwards = EventSearchParams { start: Some(date(2027, 5, 4)), end: Some(date(2027, 5, 1)), keyword: None };
        assert!(event_query(backwards, &trip(), today).is_err());
    }

    #[tokio::test]
    async fn test_itinerary_prompt_carries_preferences() {
        let recommendation = Recommendation {
            survey_id: Uuid::new_v4(),
            respondents: 3,
            candidates: vec![CandidateScore {
                candidate: "Sintra day trip".into(),
                average_rating: Some(4.5),
                rating_count: 3,
                mentions: 2,
                score: 0.83,
            }],
        };

        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|prompt| {
                prompt.contains("Destination: Lisbon")
                    && prompt.contains("(4 days)")
                    && prompt.contains("Sintra day trip")
                    && prompt.contains("3 survey responses")
            })
            .times(1)
            .returning(|_| Ok("Day 1: Sintra".to_string()));

        let text = suggest_itinerary(&generator, &trip(), &[], Some(&recommendation)).await.unwrap();
        assert_eq!(text, "Day 1: Sintra");
    }

    #[test]
    fn test_prompt_skips_empty_survey() {
        let recommendation = Recommendation {
            survey_id: Uuid::new_v4(),
            respondents: 0,
            candidates: vec![],
        };
        let prompt = itinerary_prompt(&trip(), &[], Some(&recommendation));
        assert!(!prompt.contains("survey responses"));
        assert!(!prompt.contains("Already planned"));
    }

    #[tokio::test]
    async fn test_unconfigured_generator_spends_no_rate_limit() {
        let mut generator = MockTextGenerator::new();
        generator.expect_is_configured().return_const(false);
        generator.expect_generate().never();
        let limiter = RateLimiter::new(crate::auth::RateLimitConfig::default());
        let user = Uuid::new_v4();

        for _ in 0..10 {
            let err = admit_itinerary(&generator, &limiter, user).await.unwrap_err();
            assert!(matches!(err, AppError::IntegrationError(IntegrationError::NotConfigured("ai"))));
        }
        assert_eq!(limiter.tracked_keys().await, 0);
    }

    #[tokio::test]
    async fn test_configured_generator_is_rate_limited() {
        let mut generator = MockTextGenerator::new();
        generator.expect_is_configured().return_const(true);
        let limiter = RateLimiter::new(crate::auth::RateLimitConfig::default());
        let user = Uuid::new_v4();

        for _ in 0..5 {
            assert!(admit_itinerary(&generator, &limiter, user).await.is_ok());
        }
        let err = admit_itinerary(&generator, &limiter, user).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::RateLimited)));
    }
}
