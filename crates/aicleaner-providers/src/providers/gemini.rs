//! Google Gemini provider implementation

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{base_url, probe, require_api_key, send_json, MAX_OUTPUT_TOKENS};
use crate::error::ProviderError;
use crate::models::{parse_analysis, CleaningRequest, CleaningResult, ProviderConfig, ProviderKind};
use crate::provider::Provider;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider implementation
pub struct GeminiProvider {
    id: String,
    api_key: String,
    model: String,
    client: Arc<Client>,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider from its configuration
    pub fn new(config: &ProviderConfig, client: Arc<Client>) -> Result<Self, ProviderError> {
        Ok(Self {
            id: config.id.clone(),
            api_key: require_api_key(config, "Gemini")?,
            model: config.model_name(),
            client,
            base_url: base_url(config, DEFAULT_BASE_URL),
        })
    }

    fn build_request(&self, request: &CleaningRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text {
                        text: request.full_prompt(),
                    },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: request.image.mime_type.clone(),
                            data: request.image.to_base64(),
                        },
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, request: &CleaningRequest) -> Result<CleaningResult, ProviderError> {
        debug!(provider = %self.id, model = %self.model, "Sending analysis request to Gemini");

        let body = self.build_request(request);
        let response: GeminiResponse = send_json(
            &self.id,
            self.client
                .post(format!(
                    "{}/models/{}:generateContent",
                    self.base_url, self.model
                ))
                .query(&[("key", self.api_key.as_str())])
                .json(&body),
        )
        .await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".to_string()))?;

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
                .query(&[("key", self.api_key.as_str())]),
        )
        .await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}
