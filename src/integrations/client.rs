use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::ProviderConfig;
use crate::error::{AppError, IntegrationError};
use crate::Result;

/// One configured third-party API: base URL, bearer key and timeout.
#[derive(Clone)]
pub struct ProviderClient {
    name: &'static str,
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ProviderClient {
    pub fn new(name: &'static str, config: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::ConfigError(format!("{} HTTP client: {}", name, e)))?;

        Ok(Self {
            name,
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| IntegrationError::NotConfigured(self.name).into())
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::ConfigError(format!("{} base_url: {}", self.name, e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::ConfigError(format!("{} base_url cannot have a path", self.name)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T> {
        let key = self.api_key()?;
        let url = self.url(segments)?;
        debug!("GET {} ({})", url.path(), self.name);
        self.send(self.http.get(url).bearer_auth(key).query(query)).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, segments: &[&str], body: &B) -> Result<T> {
        let key = self.api_key()?;
        let url = self.url(segments)?;
        debug!("POST {} ({})", url.path(), self.name);
        self.send(self.http.post(url).bearer_auth(key).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            warn!("{} request failed: {}", self.name, e);
            IntegrationError::RequestFailed(self.name, e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("{} rate limited the request", self.name);
            return Err(IntegrationError::RateLimited(self.name).into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{} returned {}: {}", self.name, status, truncate(&body, 300));
            return Err(IntegrationError::Upstream(self.name, status.as_u16()).into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| IntegrationError::InvalidResponse(self.name, e.to_string()).into())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, api_key: Option<&str>) -> ProviderClient {
        let config = ProviderConfig {
            base_url: base_url.to_string(),
            api_key: api_key.map(String::from),
            timeout_secs: 5,
            model: None,
        };
        ProviderClient::new("test", &config).unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = provider("http://localhost:1", Some("  "));
        assert!(!client.is_configured());

        let err = client.get_json::<Value>(&["x"], &[]).await.unwrap_err();
        assert!(matches!(err, AppError::IntegrationError(IntegrationError::NotConfigured("test"))));
    }

    #[tokio::test]
    async fn test_sends_bearer_key_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/things/a%20b"))
            .and(header("authorization", "Bearer secret"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = provider(&format!("{}/v1", server.uri()), Some("secret"));
        let body: Value = client
            .get_json(&["things", "a b"], &[("limit", "1".to_string())])
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = provider(&server.uri(), Some("k"));

        let err = client.get_json::<Value>(&["limited"], &[]).await.unwrap_err();
        assert!(matches!(err, AppError::IntegrationError(IntegrationError::RateLimited(_))));

        let err = client.get_json::<Value>(&["broken"], &[]).await.unwrap_err();
        assert!(matches!(err, AppError::IntegrationError(IntegrationError::Upstream(_, 500))));

        let err = client.post_json::<_, Value>(&["garbage"], &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, AppError::IntegrationError(IntegrationError::InvalidResponse(_, _))));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("ação", 2), "aç");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
