//! Error types for provider calls and provider selection

use std::time::Duration;

use thiserror::Error;

/// Errors a single provider attempt can produce
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ProviderError {
    /// Authentication failed (never includes key details)
    #[error("Authentication failed")]
    AuthError,

    /// Rate limited by the provider or by the local limiter
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Connection could not be established
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The call did not finish within the provider timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP client gave up waiting; its deadline is not known here
    #[error("Request timed out: {0}")]
    ClientTimeout(String),

    /// Provider answered with a 5xx status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Provider answered but the body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Generic provider error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ProviderError {
    /// Whether the failure is expected to clear up on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::NetworkError(_)
                | ProviderError::Timeout(_)
                | ProviderError::ClientTimeout(_)
                | ProviderError::ServerError { .. }
                | ProviderError::RateLimited(_)
        )
    }

    /// Map an unsuccessful HTTP status to a provider error
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::AuthError,
            429 => ProviderError::RateLimited(60),
            500..=599 => ProviderError::ServerError {
                status,
                message: truncate(body, 200),
            },
            _ => ProviderError::ProviderError(format!("HTTP {}: {}", status, truncate(body, 200))),
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::ClientTimeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::NetworkError(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status.as_u16(), &err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::ProviderError(err.to_string())
        }
    }
}

/// Why a provider did not produce a result during one selection cycle
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The provider was called and failed
    Failed(ProviderError),
    /// The circuit was open, the provider was not called
    CircuitOpen,
    /// The local rate limit was spent, the provider was not called
    RateLimited,
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptOutcome::Failed(e) => write!(f, "{}", e),
            AttemptOutcome::CircuitOpen => write!(f, "circuit open"),
            AttemptOutcome::RateLimited => write!(f, "local rate limit reached"),
        }
    }
}

/// One provider's contribution to an exhausted selection
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub outcome: AttemptOutcome,
}

impl std::fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.outcome)
    }
}

/// Errors surfaced by [`crate::ProviderSelector`]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectorError {
    /// Malformed request; retrying another provider would not help
    #[error("Invalid request: {0}")]
    ValidationError(String),

    /// Every provider is disabled
    #[error("No AI provider is enabled")]
    NoProvidersEnabled,

    /// Unknown provider id
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Every enabled provider was tried and none succeeded
    #[error("AI analysis unavailable: {}", format_attempts(.attempts))]
    AllProvidersExhausted { attempts: Vec<ProviderAttempt> },

    /// Provider list could not be turned into clients
    #[error("Provider configuration error: {0}")]
    Config(String),
}

impl SelectorError {
    /// Short message suitable for end users
    pub fn user_message(&self) -> String {
        match self {
            SelectorError::AllProvidersExhausted { .. } | SelectorError::NoProvidersEnabled => {
                "AI analysis unavailable".to_string()
            }
            other => other.to_string(),
        }
    }
}

fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no provider attempted".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
