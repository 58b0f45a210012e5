//! Priority-ordered provider selection with failover
//!
//! The selector walks enabled providers by ascending priority, skipping any
//! whose circuit is open, and returns the first successful analysis. Health
//! changes are published on a broadcast channel so an external status sink
//! (the MQTT bridge) can mirror them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{Provider, ProviderClient};
use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, Permit, ProviderHealth, Transition,
};
use crate::error::{AttemptOutcome, ProviderAttempt, ProviderError, SelectorError};
use crate::models::{CleaningRequest, CleaningResult, ProviderConfig, ProviderKind};
use crate::rate_limiter::TokenBucketLimiter;

const EVENT_CAPACITY: usize = 64;

/// Tunables shared by every provider in the selector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorConfig {
    pub breaker: CircuitBreakerConfig,
}

impl SelectorConfig {
    /// Create a config with the default breaker policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set consecutive failures needed to open a circuit
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.breaker = self.breaker.with_failure_threshold(threshold);
        self
    }

    /// Set how long an open circuit waits before a probe
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.breaker = self.breaker.with_cooldown(cooldown);
        self
    }
}

/// Aggregate status reported on the device-status entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Every enabled provider has a closed circuit
    Online,
    /// At least one enabled provider is open or probing, but one is usable
    Degraded,
    /// No enabled provider is usable
    Offline,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Degraded => write!(f, "degraded"),
            DeviceStatus::Offline => write!(f, "offline"),
        }
    }
}

/// What changed for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthChange {
    Circuit { from: CircuitState, to: CircuitState },
    Enabled { enabled: bool },
}

/// Event published whenever a provider's health or enabled flag changes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthEvent {
    pub provider_id: String,
    pub change: HealthChange,
    pub device_status: DeviceStatus,
}

/// Static description of a configured provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    pub id: String,
    pub kind: ProviderKind,
    pub priority: i64,
    pub enabled: bool,
    pub model: String,
}

struct ProviderEntry {
    config: ProviderConfig,
    enabled: AtomicBool,
    provider: Arc<dyn Provider>,
    breaker: CircuitBreaker,
    limiter: Option<Mutex<TokenBucketLimiter>>,
}

impl ProviderEntry {
    fn new(config: ProviderConfig, provider: Arc<dyn Provider>, breaker: CircuitBreakerConfig) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            breaker: CircuitBreaker::new(
                config.id.clone(),
                breaker.with_call_timeout(config.timeout()),
            ),
            limiter: config
                .rate_limit_per_minute
                .map(|rpm| Mutex::new(TokenBucketLimiter::per_minute(rpm))),
            provider,
            config,
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn take_rate_token(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .try_acquire(1.0),
            None => true,
        }
    }
}

/// Chooses a provider for each request and falls back on failure
pub struct ProviderSelector {
    entries: Vec<ProviderEntry>,
    events: broadcast::Sender<HealthEvent>,
}

impl ProviderSelector {
    /// Build HTTP clients for every configured provider
    ///
    /// Providers whose configuration cannot produce a client (for example a
    /// cloud provider without an API key) are logged and left out.
    pub fn from_configs(
        configs: &[ProviderConfig],
        config: SelectorConfig,
    ) -> Result<Self, SelectorError> {
        let client = Arc::new(Client::new());
        let mut providers: Vec<(ProviderConfig, Arc<dyn Provider>)> = Vec::new();

        for provider_config in configs {
            match ProviderClient::from_config(provider_config, client.clone()) {
                Ok(provider) => providers.push((provider_config.clone(), Arc::new(provider))),
                Err(e) => warn!(
                    provider = %provider_config.id,
                    kind = %provider_config.kind,
                    "Skipping provider that could not be configured: {}",
                    e
                ),
            }
        }

        Self::with_providers(providers, config)
    }

    /// Build a selector from ready-made providers
    pub fn with_providers(
        providers: Vec<(ProviderConfig, Arc<dyn Provider>)>,
        config: SelectorConfig,
    ) -> Result<Self, SelectorError> {
        let mut entries: Vec<ProviderEntry> = Vec::with_capacity(providers.len());
        for (provider_config, provider) in providers {
            if entries.iter().any(|e| e.config.id == provider_config.id) {
                return Err(SelectorError::Config(format!(
                    "duplicate provider id '{}'",
                    provider_config.id
                )));
            }
            entries.push(ProviderEntry::new(
                provider_config,
                provider,
                config.breaker.clone(),
            ));
        }
        // Stable sort keeps declaration order for equal priorities
        entries.sort_by_key(|e| e.config.priority);

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        info!(
            providers = entries.len(),
            order = %entries.iter().map(|e| e.config.id.as_str()).collect::<Vec<_>>().join(","),
            "Provider selector ready"
        );
        Ok(Self { entries, events })
    }

    /// Analyze a request with the best available provider
    pub async fn select_and_invoke(
        &self,
        request: &CleaningRequest,
    ) -> Result<CleaningResult, SelectorError> {
        request.validate()?;

        let candidates: Vec<&ProviderEntry> =
            self.entries.iter().filter(|e| e.is_enabled()).collect();
        if candidates.is_empty() {
            return Err(SelectorError::NoProvidersEnabled);
        }

        let mut attempts = Vec::new();
        for entry in candidates {
            let id = entry.config.id.as_str();

            let (permit, transition) = entry.breaker.try_acquire();
            if let Some(transition) = transition {
                self.publish_transition(id, transition);
            }
            if permit == Permit::Rejected {
                debug!(provider = %id, "Skipping provider with open circuit");
                attempts.push(ProviderAttempt {
                    provider_id: id.to_string(),
                    outcome: AttemptOutcome::CircuitOpen,
                });
                continue;
            }

            if !entry.take_rate_token() {
                if permit == Permit::Probe {
                    entry.breaker.abandon_probe();
                }
                debug!(provider = %id, "Skipping provider over its local rate limit");
                attempts.push(ProviderAttempt {
                    provider_id: id.to_string(),
                    outcome: AttemptOutcome::RateLimited,
                });
                continue;
            }

            let timeout = entry.config.timeout();
            let outcome =
                match tokio::time::timeout(timeout, entry.provider.analyze(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                };

            match outcome {
                Ok(result) => {
                    if let Some(transition) = entry.breaker.record_success() {
                        self.publish_transition(id, transition);
                    }
                    info!(
                        provider = %id,
                        probe = permit == Permit::Probe,
                        tasks = result.tasks.len(),
                        zone = request.zone.as_deref().unwrap_or("-"),
                        "AI analysis succeeded"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        provider = %id,
                        transient = e.is_transient(),
                        "AI provider invocation failed, trying next provider: {}",
                        e
                    );
                    if let Some(transition) = entry.breaker.record_failure() {
                        self.publish_transition(id, transition);
                    }
                    attempts.push(ProviderAttempt {
                        provider_id: id.to_string(),
                        outcome: AttemptOutcome::Failed(e),
                    });
                }
            }
        }

        warn!(attempts = attempts.len(), "All AI providers exhausted");
        Err(SelectorError::AllProvidersExhausted { attempts })
    }

    /// Enable or disable a provider at runtime
    pub fn set_enabled(&self, provider_id: &str, enabled: bool) -> Result<(), SelectorError> {
        let entry = self.entry(provider_id)?;
        let previous = entry.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(provider = %provider_id, enabled, "Provider enabled flag changed");
            self.publish(provider_id, HealthChange::Enabled { enabled });
        }
        Ok(())
    }

    /// Whether a provider currently takes part in selection
    pub fn is_enabled(&self, provider_id: &str) -> Result<bool, SelectorError> {
        Ok(self.entry(provider_id)?.is_enabled())
    }

    /// Health of every provider, in selection order
    pub fn health(&self) -> Vec<ProviderHealth> {
        self.entries.iter().map(|e| e.breaker.health()).collect()
    }

    /// Health of one provider
    pub fn provider_health(&self, provider_id: &str) -> Result<ProviderHealth, SelectorError> {
        Ok(self.entry(provider_id)?.breaker.health())
    }

    /// Configured providers, in selection order
    pub fn providers(&self) -> Vec<ProviderSummary> {
        self.entries
            .iter()
            .map(|e| ProviderSummary {
                id: e.config.id.clone(),
                kind: e.config.kind,
                priority: e.config.priority,
                enabled: e.is_enabled(),
                model: e.provider.model().to_string(),
            })
            .collect()
    }

    /// Aggregate status over enabled providers
    pub fn device_status(&self) -> DeviceStatus {
        let states: Vec<CircuitState> = self
            .entries
            .iter()
            .filter(|e| e.is_enabled())
            .map(|e| e.breaker.state())
            .collect();

        if states.iter().all(|s| *s == CircuitState::Open) {
            DeviceStatus::Offline
        } else if states.iter().all(|s| *s == CircuitState::Closed) {
            DeviceStatus::Online
        } else {
            DeviceStatus::Degraded
        }
    }

    /// Subscribe to health change events
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.events.subscribe()
    }

    /// Run each provider's health check, bounded by its timeout
    pub async fn health_check_all(&self) -> Vec<(String, Result<bool, ProviderError>)> {
        let mut results = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let timeout = entry.config.timeout();
            let result = match tokio::time::timeout(timeout, entry.provider.health_check()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };
            if let Err(e) = &result {
                warn!(provider = %entry.config.id, "Health check failed: {}", e);
            }
            results.push((entry.config.id.clone(), result));
        }
        results
    }

    fn entry(&self, provider_id: &str) -> Result<&ProviderEntry, SelectorError> {
        self.entries
            .iter()
            .find(|e| e.config.id == provider_id)
            .ok_or_else(|| SelectorError::ProviderNotFound(provider_id.to_string()))
    }

    fn publish_transition(&self, provider_id: &str, transition: Transition) {
        self.publish(
            provider_id,
            HealthChange::Circuit {
                from: transition.from,
                to: transition.to,
            },
        );
    }

    fn publish(&self, provider_id: &str, change: HealthChange) {
        let event = HealthEvent {
            provider_id: provider_id.to_string(),
            change,
            device_status: self.device_status(),
        };
        // No subscribers is fine; the status sink is optional
        let _ = self.events.send(event);
    }
}
