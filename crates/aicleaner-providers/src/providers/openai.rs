//! OpenAI provider implementation
//!
//! Sends the snapshot inline as a base64 data URL through chat completions.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{base_url, probe, require_api_key, send_json, MAX_OUTPUT_TOKENS};
use crate::error::ProviderError;
use crate::models::{parse_analysis, CleaningRequest, CleaningResult, ProviderConfig, ProviderKind};
use crate::provider::Provider;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider implementation
pub struct OpenAiProvider {
    id: String,
    api_key: String,
    model: String,
    client: Arc<Client>,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider from its configuration
    pub fn new(config: &ProviderConfig, client: Arc<Client>) -> Result<Self, ProviderError> {
        Ok(Self {
            id: config.id.clone(),
            api_key: require_api_key(config, "OpenAI")?,
            model: config.model_name(),
            client,
            base_url: base_url(config, DEFAULT_BASE_URL),
        })
    }

    fn build_request(&self, request: &CleaningRequest) -> OpenAiChatRequest {
        let data_url = format!(
            "data:{};base64,{}",
            request.image.mime_type,
            request.image.to_base64()
        );
        OpenAiChatRequest {
            model: self.model.clone(),
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: vec![
                    OpenAiContent::Text {
                        text: request.full_prompt(),
                    },
                    OpenAiContent::ImageUrl {
                        image_url: OpenAiImageUrl { url: data_url },
                    },
                ],
            }],
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, request: &CleaningRequest) -> Result<CleaningResult, ProviderError> {
        debug!(provider = %self.id, model = %self.model, "Sending analysis request to OpenAI");

        let body = self.build_request(request);
        let response: OpenAiChatResponse = send_json(
            &self.id,
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("No content in response".to_string()))?;

        let (description, tasks) = parse_analysis(&content);
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
                .bearer_auth(&self.api_key),
        )
        .await
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: Vec<OpenAiContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiContent {
    Text { text: String },
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Debug, Serialize)]
struct OpenAiImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}
