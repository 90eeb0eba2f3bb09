//! Router failover policy.

use crate::config::secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Longest delay, cooldown or timeout accepted by configuration.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Returns the instant `delay` after `now`, with `delay` capped at [`MAX_DURATION`].
pub fn instant_after(now: Instant, delay: Duration) -> Instant {
    now + delay.min(MAX_DURATION)
}

/// Retry, cooldown and timeout settings shared by all endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterPolicy {
    /// Consecutive transient failures before an endpoint is taken out of rotation.
    pub max_model_retries: u32,
    /// Cooldown after a rate-limited call.
    #[serde(rename = "rate_limit_retry_delay_secs", with = "secs")]
    pub rate_limit_retry_delay: Duration,
    /// Cooldown after `max_model_retries` transient failures.
    #[serde(rename = "failure_cooldown_secs", with = "secs")]
    pub failure_cooldown: Duration,
    /// Pause before trying the next endpoint after a failure.
    #[serde(rename = "model_switch_delay_secs", with = "secs")]
    pub model_switch_delay: Duration,
    /// Upper bound on a single backend call.
    #[serde(rename = "call_timeout_secs", with = "secs")]
    pub call_timeout: Duration,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            max_model_retries: 3,
            rate_limit_retry_delay: Duration::from_secs(60),
            failure_cooldown: Duration::from_secs(30),
            model_switch_delay: Duration::from_secs(5),
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl RouterPolicy {
    /// Sets the retry limit.
    #[must_use]
    pub fn with_max_model_retries(mut self, retries: u32) -> Self {
        self.max_model_retries = retries;
        self
    }

    /// Sets the rate-limit cooldown.
    #[must_use]
    pub fn with_rate_limit_retry_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_retry_delay = delay;
        self
    }

    /// Sets the transient-failure cooldown.
    #[must_use]
    pub fn with_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.failure_cooldown = cooldown;
        self
    }

    /// Sets the delay between endpoints.
    #[must_use]
    pub fn with_model_switch_delay(mut self, delay: Duration) -> Self {
        self.model_switch_delay = delay;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}
