//! AICleaner AI providers - vision analysis with failover
//!
//! This crate turns a list of configured providers (OpenAI, Anthropic,
//! Gemini, Ollama) into a [`ProviderSelector`] that tries them in priority
//! order, keeps a circuit breaker per provider, and reports health changes.

pub mod circuit_breaker;
pub mod error;
pub mod models;
pub mod provider;
pub mod providers;
pub mod rate_limiter;

// Re-export commonly used types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, Permit, ProviderHealth, Transition,
};
pub use error::{AttemptOutcome, ProviderAttempt, ProviderError, SelectorError};
pub use models::{
    parse_analysis, CleaningRequest, CleaningResult, ImagePayload, ProviderConfig, ProviderKind,
    MAX_IMAGE_BYTES, SUPPORTED_MIME_TYPES,
};
pub use provider::selector::{HealthChange, ProviderSummary};
pub use provider::{
    DeviceStatus, HealthEvent, Provider, ProviderClient, ProviderSelector, SelectorConfig,
};
pub use providers::{AnthropicProvider, GeminiProvider, OllamaProvider, OpenAiProvider};
pub use rate_limiter::TokenBucketLimiter;
