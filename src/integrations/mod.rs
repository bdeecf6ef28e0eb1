//! Third-party APIs: flights, places, events, geocoding and text generation.
//!
//! Each provider sits behind a trait so handlers can be exercised with mocks.
//! The HTTP implementations make a single request per call and never retry.

mod ai;
mod client;
mod events;
mod flights;
mod geocoding;
pub mod handlers;
mod places;

use std::sync::Arc;

use tracing::info;

use crate::config::IntegrationsConfig;
use crate::Result;

pub use ai::{HttpTextGenerator, TextGenerator};
pub use client::ProviderClient;
pub use events::{Event, EventQuery, EventSearch, HttpEventSearch};
pub use flights::{FlightOffer, FlightQuery, FlightSearch, HttpFlightSearch};
pub use geocoding::{GeoPoint, Geocoder, HttpGeocoder};
pub use places::{HttpPlaceSearch, Place, PlaceQuery, PlaceSearch};

#[cfg(test)]
pub use ai::MockTextGenerator;
#[cfg(test)]
pub use geocoding::MockGeocoder;

#[derive(Clone)]
pub struct Integrations {
    pub flights: Arc<dyn FlightSearch>,
    pub places: Arc<dyn PlaceSearch>,
    pub events: Arc<dyn EventSearch>,
    pub geocoder: Arc<dyn Geocoder>,
    pub text: Arc<dyn TextGenerator>,
}

impl Integrations {
    pub fn from_config(config: &IntegrationsConfig) -> Result<Self> {
        let flights = ProviderClient::new("flights", &config.flights)?;
        let places = ProviderClient::new("places", &config.places)?;
        let events = ProviderClient::new("events", &config.events)?;
        let geocoding = ProviderClient::new("geocoding", &config.geocoding)?;
        let ai = ProviderClient::new("ai", &config.ai)?;

        for client in [&flights, &places, &events, &geocoding, &ai] {
            if !client.is_configured() {
                info!("{} integration has no API key; its endpoints will answer 503", client.name());
            }
        }

        Ok(Self {
            flights: Arc::new(HttpFlightSearch::new(flights)),
            places: Arc::new(HttpPlaceSearch::new(places)),
            events: Arc::new(HttpEventSearch::new(events)),
            geocoder: Arc::new(HttpGeocoder::new(geocoding)),
            text: Arc::new(HttpTextGenerator::new(ai, config.ai.model.clone())),
        })
    }
}
