use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::client::ProviderClient;
use crate::Result;

const MAX_RESULTS: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceQuery {
    pub text: String,
    /// Biases results toward this area, usually the trip destination.
    pub near: Option<String>,
}

impl PlaceQuery {
    fn text_query(&self) -> String {
        match &self.near {
            Some(near) => format!("{} in {}", self.text, near),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<f64>,
    pub types: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, query: &PlaceQuery) -> Result<Vec<Place>>;
}

/// Text search against a Places-style API.
pub struct HttpPlaceSearch {
    client: ProviderClient,
}

impl HttpPlaceSearch {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlace {
    id: String,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    location: Option<LatLng>,
    rating: Option<f64>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl From<RawPlace> for Place {
    fn from(raw: RawPlace) -> Self {
        Place {
            name: raw.display_name.map(|d| d.text).unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            address: raw.formatted_address,
            latitude: raw.location.as_ref().map(|l| l.latitude),
            longitude: raw.location.as_ref().map(|l| l.longitude),
            rating: raw.rating,
            types: raw.types,
        }
    }
}

#[async_trait]
impl PlaceSearch for HttpPlaceSearch {
    async fn search(&self, query: &PlaceQuery) -> Result<Vec<Place>> {
        let body = json!({
            "textQuery": query.text_query(),
            "maxResultCount": MAX_RESULTS,
        });
        let response: SearchResponse = self.client.post_json(&["v1", "places:searchText"], &body).await?;

        let places: Vec<Place> = response.places.into_iter().map(Place::from).collect();
        info!("Place search '{}' returned {} results", query.text, places.len());
        Ok(places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_sends_biased_text_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/places:searchText"))
            .and(body_partial_json(json!({"textQuery": "pastel de nata in Lisbon"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "places": [
                    {
                        "id": "abc",
                        "displayName": {"text": "Manteigaria"},
                        "formattedAddress": "R. do Loreto 2, Lisboa",
                        "location": {"latitude": 38.7107, "longitude": -9.1437},
                        "rating": 4.7,
                        "types": ["bakery"]
                    },
                    {"id": "def"}
                ]
            })))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            base_url: server.uri(),
            api_key: Some("key".into()),
            timeout_secs: 5,
            model: None,
        };
        let search = HttpPlaceSearch::new(ProviderClient::new("places", &config).unwrap());
        let places = search
            .search(&PlaceQuery {
                text: "pastel de nata".into(),
                near: Some("Lisbon".into()),
            })
            .await
            .unwrap();

        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Manteigaria");
        assert_eq!(places[0].latitude, Some(38.7107));
        assert_eq!(places[1].name, "def");
        assert!(places[1].types.is_empty());
    }

    #[tokio::test]
    async fn test_empty_response_is_no_places() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            base_url: server.uri(),
            api_key: Some("key".into()),
            timeout_secs: 5,
            model: None,
        };
        let search = HttpPlaceSearch::new(ProviderClient::new("places", &config).unwrap());
        let places = search
            .search(&PlaceQuery { text: "museum".into(), near: None })
            .await
            .unwrap();
        assert!(places.is_empty());
    }
}
