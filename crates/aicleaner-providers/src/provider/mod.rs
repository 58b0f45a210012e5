//! Provider trait and the closed set of provider clients

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    error::ProviderError,
    models::{CleaningRequest, CleaningResult, ProviderConfig, ProviderKind},
    providers::{AnthropicProvider, GeminiProvider, OllamaProvider, OpenAiProvider},
};

pub mod selector;

pub use selector::{DeviceStatus, HealthEvent, ProviderSelector, SelectorConfig};

/// Capability every AI backend offers to the selector
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique identifier from the configuration
    fn id(&self) -> &str;

    /// Backend kind
    fn kind(&self) -> ProviderKind;

    /// Model the provider will request
    fn model(&self) -> &str;

    /// Analyze a snapshot and describe what needs cleaning
    async fn analyze(&self, request: &CleaningRequest) -> Result<CleaningResult, ProviderError>;

    /// Check if the provider is reachable and accepts our credentials
    async fn health_check(&self) -> Result<bool, ProviderError>;
}

/// Concrete provider, chosen once from the configured kind
pub enum ProviderClient {
    OpenAi(OpenAiProvider),
    Anthropic(AnthropicProvider),
    Gemini(GeminiProvider),
    Ollama(OllamaProvider),
}

impl ProviderClient {
    /// Build the client matching `config.kind`
    pub fn from_config(config: &ProviderConfig, client: Arc<Client>) -> Result<Self, ProviderError> {
        Ok(match config.kind {
            ProviderKind::OpenAi => ProviderClient::OpenAi(OpenAiProvider::new(config, client)?),
            ProviderKind::Anthropic => {
                ProviderClient::Anthropic(AnthropicProvider::new(config, client)?)
            }
            ProviderKind::Gemini => ProviderClient::Gemini(GeminiProvider::new(config, client)?),
            ProviderKind::Ollama => ProviderClient::Ollama(OllamaProvider::new(config, client)?),
        })
    }

    fn inner(&self) -> &dyn Provider {
        match self {
            ProviderClient::OpenAi(p) => p,
            ProviderClient::Anthropic(p) => p,
            ProviderClient::Gemini(p) => p,
            ProviderClient::Ollama(p) => p,
        }
    }
}

#[async_trait]
impl Provider for ProviderClient {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn kind(&self) -> ProviderKind {
        self.inner().kind()
    }

    fn model(&self) -> &str {
        self.inner().model()
    }

    async fn analyze(&self, request: &CleaningRequest) -> Result<CleaningResult, ProviderError> {
        self.inner().analyze(request).await
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner().health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_variant() {
        let client = Arc::new(Client::new());
        let config = ProviderConfig::new("local", ProviderKind::Ollama, 1)
            .with_base_url("http://localhost:11434");
        let provider = ProviderClient::from_config(&config, client.clone()).unwrap();
        assert!(matches!(provider, ProviderClient::Ollama(_)));
        assert_eq!(provider.id(), "local");
        assert_eq!(provider.kind(), ProviderKind::Ollama);

        let config = ProviderConfig::new("gpt", ProviderKind::OpenAi, 2).with_api_key("sk-test");
        let provider = ProviderClient::from_config(&config, client).unwrap();
        assert!(matches!(provider, ProviderClient::OpenAi(_)));
        assert_eq!(provider.model(), "gpt-4o");
    }

    #[test]
    fn test_cloud_provider_requires_key() {
        let client = Arc::new(Client::new());
        let config = ProviderConfig::new("claude", ProviderKind::Anthropic, 1);
        assert!(matches!(
            ProviderClient::from_config(&config, client),
            Err(ProviderError::ConfigError(_))
        ));
    }
}
