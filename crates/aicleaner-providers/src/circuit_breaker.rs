//! Circuit breaker tracking per-provider health
//!
//! A provider that fails `failure_threshold` times in a row is taken out of
//! rotation for `cooldown`. After the cooldown a single probe call is let
//! through: success closes the circuit, failure reopens it and restarts the
//! cooldown.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow through normally
    Closed,
    /// Requests are refused until the cooldown elapses
    Open,
    /// One probe request is allowed to test recovery
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before a probe is allowed
    pub cooldown: Duration,
    /// Longest a single call can run; a probe holds the half-open slot at least this long
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
            call_timeout: Duration::ZERO,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the upper bound of one provider call
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// How long an unanswered probe blocks other callers
    fn probe_window(&self) -> Duration {
        self.cooldown.max(self.call_timeout)
    }
}

/// Snapshot of a provider's health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub state: CircuitState,
}

/// Decision returned by [`CircuitBreaker::try_acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// Circuit closed, call normally
    Allowed,
    /// Circuit half-open, this call is the single recovery probe
    Probe,
    /// Circuit open (or probe already in flight), skip the provider
    Rejected,
}

/// A state change worth reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_started: Option<Instant>,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_started: None,
            last_success: None,
            last_failure: None,
        }
    }
}

/// Circuit breaker for one provider
pub struct CircuitBreaker {
    provider_id: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(provider_id: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider_id: provider_id.into(),
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // A panic while holding the lock leaves plain counters behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state, reporting `HalfOpen` once the cooldown has elapsed
    pub fn state(&self) -> CircuitState {
        let state = self.lock();
        self.effective_state(&state)
    }

    /// Ask for permission to call the provider
    pub fn try_acquire(&self) -> (Permit, Option<Transition>) {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => (Permit::Allowed, None),
            CircuitState::Open => {
                let cooled_down = state
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if !cooled_down {
                    return (Permit::Rejected, None);
                }
                state.state = CircuitState::HalfOpen;
                state.probe_started = Some(Instant::now());
                info!(
                    provider = %self.provider_id,
                    "Circuit breaker transitioning to half-open"
                );
                (
                    Permit::Probe,
                    Some(Transition {
                        from: CircuitState::Open,
                        to: CircuitState::HalfOpen,
                    }),
                )
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight(&state) {
                    (Permit::Rejected, None)
                } else {
                    state.probe_started = Some(Instant::now());
                    (Permit::Probe, None)
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) -> Option<Transition> {
        let mut state = self.lock();
        let previous = state.state;

        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.probe_started = None;
        state.last_success = Some(Utc::now());

        if previous != CircuitState::Closed {
            info!(
                provider = %self.provider_id,
                from = %previous,
                "Circuit breaker recovered, transitioning to closed"
            );
            Some(Transition {
                from: previous,
                to: CircuitState::Closed,
            })
        } else {
            None
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) -> Option<Transition> {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(Utc::now());

        match state.state {
            CircuitState::Closed => {
                debug!(
                    provider = %self.provider_id,
                    failures = state.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker recorded failure"
                );
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    warn!(
                        provider = %self.provider_id,
                        failures = state.consecutive_failures,
                        "Circuit breaker opened"
                    );
                    return Some(Transition {
                        from: CircuitState::Closed,
                        to: CircuitState::Open,
                    });
                }
                None
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.probe_started = None;
                warn!(
                    provider = %self.provider_id,
                    "Circuit breaker reopened after failed probe"
                );
                Some(Transition {
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Open,
                })
            }
            // A call that started before the circuit opened; the cooldown is not extended.
            CircuitState::Open => None,
        }
    }

    /// Give back a probe permit that was never used for a call
    pub fn abandon_probe(&self) {
        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen {
            state.probe_started = None;
        }
    }

    /// Snapshot for reporting
    pub fn health(&self) -> ProviderHealth {
        let state = self.lock();
        ProviderHealth {
            provider_id: self.provider_id.clone(),
            consecutive_failures: state.consecutive_failures,
            last_success: state.last_success,
            last_failure: state.last_failure,
            state: self.effective_state(&state),
        }
    }

    fn probe_in_flight(&self, state: &BreakerState) -> bool {
        // A probe whose future was dropped never reports back; it expires once it can no longer be running.
        state
            .probe_started
            .map(|started| started.elapsed() < self.config.probe_window())
            .unwrap_or(false)
    }

    fn effective_state(&self, state: &BreakerState) -> CircuitState {
        match state.state {
            CircuitState::Open => match state.opened_at {
                Some(opened) if opened.elapsed() >= self.config.cooldown => CircuitState::HalfOpen,
                _ => CircuitState::Open,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig::default()
            .with_failure_threshold(3)
            .with_cooldown(Duration::from_millis(5))
    }

    #[test]
    fn test_circuit_breaker_starts_closed() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.try_acquire().0, Permit::Allowed);
    }

    #[test]
    fn test_circuit_opens_after_threshold_failures() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());

        assert!(cb.record_failure().is_none());
        assert!(cb.record_failure().is_none());
        assert_eq!(cb.state(), CircuitState::Closed);

        let transition = cb.record_failure();
        assert_eq!(
            transition,
            Some(Transition {
                from: CircuitState::Closed,
                to: CircuitState::Open
            })
        );
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.try_acquire().0, Permit::Rejected);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());

        cb.record_failure();
        cb.record_failure();
        cb.record_success();

        let health = cb.health();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.state, CircuitState::Closed);
        assert!(health.last_success.is_some());
    }

    #[test]
    fn test_half_open_allows_single_probe() {
        let cb = CircuitBreaker::new("test", quick_config());
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let (permit, transition) = cb.try_acquire();
        assert_eq!(permit, Permit::Probe);
        assert_eq!(
            transition.map(|t| t.to),
            Some(CircuitState::HalfOpen)
        );
        // Second caller while the probe is outstanding is turned away
        assert_eq!(cb.try_acquire().0, Permit::Rejected);
    }

    #[test]
    fn test_half_open_closes_on_success() {
        let cb = CircuitBreaker::new("test", quick_config());
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cb.try_acquire().0, Permit::Probe);

        let transition = cb.record_success();
        assert_eq!(transition.map(|t| t.from), Some(CircuitState::HalfOpen));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health().consecutive_failures, 0);
    }

    #[test]
    fn test_half_open_reopens_on_failure() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(2)
            .with_cooldown(Duration::from_millis(30));
        let cb = CircuitBreaker::new("test", config);
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cb.try_acquire().0, Permit::Probe);

        let transition = cb.record_failure();
        assert_eq!(transition.map(|t| t.to), Some(CircuitState::Open));
        // Cooldown restarted
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.try_acquire().0, Permit::Rejected);
    }

    #[test]
    fn test_probe_outlives_cooldown_while_call_can_run() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_cooldown(Duration::from_millis(5))
            .with_call_timeout(Duration::from_secs(5));
        let cb = CircuitBreaker::new("test", config);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cb.try_acquire().0, Permit::Probe);

        // Past the cooldown but within the call timeout
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.try_acquire().0, Permit::Rejected);
    }

    #[test]
    fn test_dropped_probe_expires_after_call_timeout() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_cooldown(Duration::from_millis(5))
            .with_call_timeout(Duration::from_millis(20));
        let cb = CircuitBreaker::new("test", config);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cb.try_acquire().0, Permit::Probe);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cb.try_acquire().0, Permit::Probe);
    }
}
