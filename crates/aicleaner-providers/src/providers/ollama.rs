//! Ollama provider implementation
//!
//! Local inference server; images are passed as base64 strings on the chat
//! message. No API key is needed, but one is sent as a bearer token when
//! configured (for servers behind an authenticating proxy).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{base_url, probe, send_json};
use crate::error::ProviderError;
use crate::models::{parse_analysis, CleaningRequest, CleaningResult, ProviderConfig, ProviderKind};
use crate::provider::Provider;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama provider implementation
pub struct OllamaProvider {
    id: String,
    api_key: Option<String>,
    model: String,
    client: Arc<Client>,
    base_url: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider from its configuration
    pub fn new(config: &ProviderConfig, client: Arc<Client>) -> Result<Self, ProviderError> {
        let base_url = base_url(config, DEFAULT_BASE_URL);
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ProviderError::ConfigError(format!(
                "Ollama base URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        Ok(Self {
            id: config.id.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model_name(),
            client,
            base_url,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn build_request(&self, request: &CleaningRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.model.clone(),
            stream: false,
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: request.full_prompt(),
                images: vec![request.image.to_base64()],
            }],
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, request: &CleaningRequest) -> Result<CleaningResult, ProviderError> {
        debug!(provider = %self.id, model = %self.model, url = %self.base_url, "Sending analysis request to Ollama");

        let body = self.build_request(request);
        let response: OllamaChatResponse = send_json(
            &self.id,
            self.authorize(
                self.client
                    .post(format!("{}/api/chat", self.base_url))
                    .json(&body),
            ),
        )
        .await?;

        let content = response
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("No message in response".to_string()))?;

        let (description, tasks) = parse_analysis(&content);
        Ok(CleaningResult {
            description,
            tasks,
            provider_id: self.id.clone(),
            model: self.model.clone(),
        })
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        probe(self.authorize(self.client.get(format!("{}/api/tags", self.base_url)))).await
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    stream: bool,
    messages: Vec<OllamaMessage>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}
