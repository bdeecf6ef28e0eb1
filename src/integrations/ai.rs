use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::client::ProviderClient;
use crate::error::IntegrationError;
use crate::Result;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SYSTEM_PROMPT: &str = "You are a travel planner for a group trip. Answer with a concise \
                             day-by-day itinerary in plain text.";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// False when `generate` would fail with `NotConfigured`.
    fn is_configured(&self) -> bool;
}

/// Chat-completions style text generation.
pub struct HttpTextGenerator {
    client: ProviderClient,
    model: String,
}

impl HttpTextGenerator {
    pub fn new(client: ProviderClient, model: Option<String>) -> Self {
        Self {
            client,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": 0.7,
        });
        let response: CompletionResponse = self.client.post_json(&["v1", "chat", "completions"], &body).await?;

        let text = response
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| IntegrationError::InvalidResponse(self.client.name(), "empty completion".into()))?;

        info!("Generated {} characters with {}", text.len(), self.model);
        Ok(text)
    }
}
