use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::ProviderClient;
use crate::Result;

const PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub city: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub venue: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSearch: Send + Sync {
    async fn search(&self, query: &EventQuery) -> Result<Vec<Event>>;
}

/// Event discovery in the Ticketmaster shape.
pub struct HttpEventSearch {
    client: ProviderClient,
}

impl HttpEventSearch {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedEvents>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedEvents {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    name: String,
    url: Option<String>,
    dates: Option<RawDates>,
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedVenues>,
}

#[derive(Debug, Deserialize)]
struct RawDates {
    start: Option<RawStart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStart {
    local_date: Option<NaiveDate>,
    local_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedVenues {
    #[serde(default)]
    venues: Vec<RawVenue>,
}

#[derive(Debug, Deserialize)]
struct RawVenue {
    name: Option<String>,
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        let start = raw.dates.and_then(|d| d.start);
        Event {
            id: raw.id,
            name: raw.name,
            url: raw.url,
            date: start.as_ref().and_then(|s| s.local_date),
            time: start.and_then(|s| s.local_time),
            venue: raw.embedded.and_then(|e| e.venues.into_iter().find_map(|v| v.name)),
        }
    }
}

#[async_trait]
impl EventSearch for HttpEventSearch {
    async fn search(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let mut params = vec![
            ("city", query.city.clone()),
            ("startDateTime", format!("{}T00:00:00Z", query.start)),
            ("endDateTime", format!("{}T23:59:59Z", query.end)),
            ("size", PAGE_SIZE.to_string()),
            ("sort", "date,asc".to_string()),
        ];
        if let Some(keyword) = &query.keyword {
            params.push(("keyword", keyword.clone()));
        }

        let response: DiscoveryResponse = self
            .client
            .get_json(&["discovery", "v2", "events.json"], &params)
            .await?;

        let events: Vec<Event> = response
            .embedded
            .map(|e| e.events)
            .unwrap_or_default()
            .into_iter()
            .map(Event::from)
            .collect();
        info!("Found {} events in {} between {} and {}", events.len(), query.city, query.start, query.end);
        Ok(events)
    }
}
