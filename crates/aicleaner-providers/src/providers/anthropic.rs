//! Anthropic provider implementation
//!
//! Uses the messages API with a base64 image content block.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{base_url, probe, require_api_key, send_json, MAX_OUTPUT_TOKENS};
use crate::error::ProviderError;
use crate::models::{parse_analysis, CleaningRequest, CleaningResult, ProviderConfig, ProviderKind};
use crate::provider::Provider;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic provider implementation
pub struct AnthropicProvider {
    id: String,
    api_key: String,
    model: String,
    client: Arc<Client>,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from its configuration
    pub fn new(config: &ProviderConfig, client: Arc<Client>) -> Result<Self, ProviderError> {
        Ok(Self {
            id: config.id.clone(),
            api_key: require_api_key(config, "Anthropic")?,
            model: config.model_name(),
            client,
            base_url: base_url(config, DEFAULT_BASE_URL),
        })
    }

    fn build_request(&self, request: &CleaningRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: vec![
                    AnthropicContent::Image {
                        source: AnthropicImageSource {
                            kind: "base64".to_string(),
                            media_type: request.image.mime_type.clone(),
                            data: request.image.to_base64(),
                        },
                    },
                    AnthropicContent::Text {
                        text: request.full_prompt(),
                    },
                ],
            }],
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, request: &CleaningRequest) -> Result<CleaningResult, ProviderError> {
        debug!(provider = %self.id, model = %self.model, "Sending analysis request to Anthropic");

        let body = self.build_request(request);
        let response: AnthropicResponse = send_json(
            &self.id,
            self.client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body),
        )
        .await?;

        let text = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No text content in response".to_string(),
            ));
        }

        let (description, tasks) = parse_analysis(&text);
        Ok(CleaningResult {
            description,
            tasks,
            provider_id: self.id.clone(),
            model: self.model.clone(),
        })
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        probe(
            self.client
                .get(format!("{}/models", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION),
        )
        .await
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum AnthropicContent {
    Image { source: AnthropicImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct AnthropicImageSource {
    #[serde(rename = "type")]
    kind: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImagePayload;

    #[test]
    fn test_request_shape() {
        let config =
            ProviderConfig::new("claude", ProviderKind::Anthropic, 1).with_api_key("key");
        let provider = AnthropicProvider::new(&config, Arc::new(Client::new())).unwrap();
        let request =
            CleaningRequest::new(ImagePayload::new(vec![0xFF, 0xD8], "image/jpeg"), "Look");

        let json = serde_json::to_value(provider.build_request(&request)).unwrap();
        let content = &json["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[1]["type"], "text");
    }
}
