//! Provider implementations for the supported AI services

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::ProviderError;
use crate::models::ProviderConfig;

/// Upper bound on generated tokens for an analysis
pub(crate) const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Send a request and decode a JSON body, mapping HTTP failures
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| {
        error!(provider = %provider, "API request failed: {}", e);
        ProviderError::from(e)
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(provider = %provider, status = status.as_u16(), "API error: {}", body);
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }

    let body = response.text().await.map_err(ProviderError::from)?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::InvalidResponse(format!("{} returned unexpected body: {}", provider, e))
    })
}

/// Send a request and report whether the status was a success
pub(crate) async fn probe(request: reqwest::RequestBuilder) -> Result<bool, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(true)
    } else if matches!(status.as_u16(), 401 | 403) {
        Err(ProviderError::AuthError)
    } else {
        Ok(false)
    }
}

/// Non-empty API key or a configuration error
pub(crate) fn require_api_key(config: &ProviderConfig, vendor: &str) -> Result<String, ProviderError> {
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(ProviderError::ConfigError(format!(
            "{} API key is required for provider '{}'",
            vendor, config.id
        ))),
    }
}

/// Configured base URL without a trailing slash, or the vendor default
pub(crate) fn base_url(config: &ProviderConfig, default: &str) -> String {
    config
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
