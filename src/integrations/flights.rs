use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::ProviderClient;
use crate::Result;

const MAX_RESULTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOffer {
    pub id: String,
    pub price: f64,
    pub currency: String,
    pub airline: Option<String>,
    pub departure_at: Option<String>,
    pub arrival_at: Option<String>,
    pub stops: usize,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlightSearch: Send + Sync {
    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>>;
}

/// Flight offers API in the Amadeus self-service shape.
pub struct HttpFlightSearch {
    client: ProviderClient,
}

impl HttpFlightSearch {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<RawOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOffer {
    id: String,
    price: RawPrice,
    #[serde(default)]
    validating_airline_codes: Vec<String>,
    #[serde(default)]
    itineraries: Vec<RawItinerary>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    total: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RawItinerary {
    #[serde(default)]
    segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    departure: RawEndpoint,
    arrival: RawEndpoint,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    at: String,
}

impl RawOffer {
    /// Offers with an unparseable price are dropped.
    fn into_offer(self) -> Option<FlightOffer> {
        let price = self.price.total.parse::<f64>().ok()?;
        let outbound = self.itineraries.into_iter().next();
        let segments = outbound.map(|i| i.segments).unwrap_or_default();

        Some(FlightOffer {
            id: self.id,
            price,
            currency: self.price.currency,
            airline: self.validating_airline_codes.into_iter().next(),
            departure_at: segments.first().map(|s| s.departure.at.clone()),
            arrival_at: segments.last().map(|s| s.arrival.at.clone()),
            stops: segments.len().saturating_sub(1),
        })
    }
}

#[async_trait]
impl FlightSearch for HttpFlightSearch {
    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>> {
        let mut params = vec![
            ("originLocationCode", query.origin.clone()),
            ("destinationLocationCode", query.destination.clone()),
            ("departureDate", query.departure_date.to_string()),
            ("adults", query.adults.to_string()),
            ("max", MAX_RESULTS.to_string()),
        ];
        if let Some(return_date) = query.return_date {
            params.push(("returnDate", return_date.to_string()));
        }

        let response: OffersResponse = self
            .client
            .get_json(&["v2", "shopping", "flight-offers"], &params)
            .await?;

        let mut offers: Vec<FlightOffer> = response.data.into_iter().filter_map(RawOffer::into_offer).collect();
        offers.sort_by(|a, b| a.price.total_cmp(&b.price));
        info!("Found {} flight offers {} -> {}", offers.len(), query.origin, query.destination);
        Ok(offers)
    }
}
