//! Local rate limiting for provider calls
//!
//! Each provider may carry a `rate_limit_per_minute` budget. When the bucket
//! is empty the selector skips the provider for that request instead of
//! waiting.

use std::time::Instant;

/// Token bucket rate limiter
///
/// Tokens are added at a fixed rate up to `max_tokens`; each request consumes
/// one token.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    /// Tokens per second (refill rate)
    tokens_per_second: f64,
    /// Maximum tokens in bucket (burst capacity)
    max_tokens: f64,
    /// Current tokens in bucket
    tokens: f64,
    /// Last refill time
    last_refill: Instant,
}

impl TokenBucketLimiter {
    /// Create a new token bucket limiter
    ///
    /// # Arguments
    /// * `tokens_per_second` - Rate at which tokens are added
    /// * `max_tokens` - Maximum tokens in bucket (burst capacity)
    pub fn new(tokens_per_second: f64, max_tokens: f64) -> Self {
        Self {
            tokens_per_second,
            max_tokens,
            tokens: max_tokens,
            last_refill: Instant::now(),
        }
    }

    /// Limiter allowing `requests` per minute with a burst of the same size
    pub fn per_minute(requests: u32) -> Self {
        let requests = f64::from(requests.max(1));
        Self::new(requests / 60.0, requests)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.tokens_per_second).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Try to acquire tokens; returns false if rate limited
    pub fn try_acquire(&mut self, tokens: f64) -> bool {
        self.refill();
        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }
}
