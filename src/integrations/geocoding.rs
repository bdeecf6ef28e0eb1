use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::ProviderClient;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for a free-form address, if any.
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>>;
}

/// Forward geocoding in the Mapbox places shape.
pub struct HttpGeocoder {
    client: ProviderClient,
}

impl HttpGeocoder {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    /// `[longitude, latitude]`
    center: [f64; 2],
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        let file = format!("{}.json", address.trim());
        let response: FeatureCollection = self
            .client
            .get_json(&["geocoding", "v5", "mapbox.places", &file], &[("limit", "1".to_string())])
            .await?;

        Ok(response.features.first().map(|f| GeoPoint {
            latitude: f.center[1],
            longitude: f.center[0],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder(base_url: String) -> HttpGeocoder {
        let config = ProviderConfig {
            base_url,
            api_key: Some("key".into()),
            timeout_secs: 5,
            model: None,
        };
        HttpGeocoder::new(ProviderClient::new("geocoding", &config).unwrap())
    }

    #[tokio::test]
    async fn test_geocode_swaps_center_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocoding/v5/mapbox.places/Belem%20Tower.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "features": [{"center": [-9.2160, 38.6916], "place_name": "Belém Tower"}]
            })))
            .mount(&server)
            .await;

        let point = geocoder(server.uri()).geocode(" Belem Tower ").await.unwrap().unwrap();
        assert_eq!(point.latitude, 38.6916);
        assert_eq!(point.longitude, -9.2160);
    }

    #[tokio::test]
    async fn test_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"features": []})))
            .mount(&server)
            .await;

        assert!(geocoder(server.uri()).geocode("nowhere").await.unwrap().is_none());
    }
}
