//! Per-endpoint health tracking.
//!
//! Each tracker guards its record with its own mutex. Every mutation is a
//! single critical section and no lock is held across an `.await`, so one
//! router can be shared by concurrent workflow runs. Recovery from a cooldown
//! is lazy: it happens in [`ModelHealthTracker::check_eligibility`] at call
//! time rather than on a background timer.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use super::policy::instant_after;
use tokio::time::Instant;
use tracing::{debug, info};

/// Whether an endpoint may be called right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// The endpoint may be called.
    Ready,
    /// The endpoint is cooling down for the given remaining time.
    CoolingDown(Duration),
    /// The endpoint needs an operator reset.
    Disabled(String),
}

#[derive(Debug, Clone)]
struct HealthRecord {
    available: bool,
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
    total_calls: u64,
    total_failures: u64,
    last_used: Option<DateTime<Utc>>,
    disabled_reason: Option<String>,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            available: true,
            consecutive_failures: 0,
            cooldown_until: None,
            total_calls: 0,
            total_failures: 0,
            last_used: None,
            disabled_reason: None,
        }
    }
}

/// Point-in-time view of one endpoint's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// Whether the endpoint is currently marked available.
    pub available: bool,
    /// Transient failures since the last success.
    pub consecutive_failures: u32,
    /// Time left before the endpoint becomes eligible again.
    #[serde(serialize_with = "serialize_remaining")]
    pub cooldown_remaining: Option<Duration>,
    /// Successful calls.
    pub total_calls: u64,
    /// Failed calls of any kind.
    pub total_failures: u64,
    /// Endpoint priority.
    pub priority: u32,
    /// Wall-clock time of the last successful call.
    pub last_used: Option<DateTime<Utc>>,
    /// Set when a fatal failure disabled the endpoint.
    pub disabled_reason: Option<String>,
}

fn serialize_remaining<S: Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&d.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

/// Mutable health record for one endpoint.
#[derive(Debug)]
pub struct ModelHealthTracker {
    name: String,
    record: Mutex<HealthRecord>,
}

impl ModelHealthTracker {
    /// Creates an available tracker with zero counters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), record: Mutex::new(HealthRecord::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, HealthRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks whether the endpoint may be called at `now`.
    ///
    /// An unavailable endpoint whose cooldown has expired is reset to
    /// available with zero consecutive failures before returning `Ready`.
    pub fn check_eligibility(&self, now: Instant) -> Eligibility {
        let mut record = self.lock();
        if record.available {
            return Eligibility::Ready;
        }
        if let Some(reason) = &record.disabled_reason {
            return Eligibility::Disabled(reason.clone());
        }
        match record.cooldown_until {
            Some(until) if now >= until => {
                record.available = true;
                record.consecutive_failures = 0;
                record.cooldown_until = None;
                info!(endpoint = %self.name, "Cooldown expired, endpoint available again");
                Eligibility::Ready
            }
            Some(until) => Eligibility::CoolingDown(until - now),
            None => Eligibility::Disabled("retry limit reached".to_string()),
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut record = self.lock();
        record.consecutive_failures = 0;
        record.total_calls += 1;
        record.last_used = Some(Utc::now());
    }

    /// Records a rate-limited call and starts a cooldown of `delay`.
    pub fn record_rate_limited(&self, now: Instant, delay: Duration) {
        let mut record = self.lock();
        record.total_failures += 1;
        record.available = false;
        record.cooldown_until = Some(instant_after(now, delay));
        debug!(endpoint = %self.name, cooldown = ?delay, "Endpoint rate limited");
    }

    /// Records a transient failure.
    ///
    /// # Returns
    /// `true` if this failure reached `max_retries` and made the endpoint
    /// unavailable for `cooldown`.
    pub fn record_transient(&self, now: Instant, max_retries: u32, cooldown: Duration) -> bool {
        let mut record = self.lock();
        record.total_failures += 1;
        record.consecutive_failures += 1;
        if record.consecutive_failures >= max_retries {
            record.available = false;
            record.cooldown_until = Some(instant_after(now, cooldown));
            return true;
        }
        false
    }

    /// Records a fatal failure; the endpoint stays disabled until reset.
    pub fn record_fatal(&self, reason: impl Into<String>) {
        let mut record = self.lock();
        record.total_failures += 1;
        record.available = false;
        record.cooldown_until = None;
        record.disabled_reason = Some(reason.into());
    }

    /// Makes the endpoint available with zero counters and no cooldown.
    pub fn reset(&self) {
        *self.lock() = HealthRecord::default();
    }

    /// Takes a snapshot without changing any state.
    #[must_use]
    pub fn snapshot(&self, now: Instant, priority: u32) -> HealthSnapshot {
        let record = self.lock();
        HealthSnapshot {
            available: record.available,
            consecutive_failures: record.consecutive_failures,
            cooldown_remaining: record
                .cooldown_until
                .map(|until| until.saturating_duration_since(now)),
            total_calls: record.total_calls,
            total_failures: record.total_failures,
            priority,
            last_used: record.last_used,
            disabled_reason: record.disabled_reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_cooldown_and_lazy_recovery() {
        let tracker = ModelHealthTracker::new("a");
        let start = Instant::now();
        tracker.record_rate_limited(start, Duration::from_secs(60));

        assert_eq!(
            tracker.check_eligibility(start + Duration::from_secs(10)),
            Eligibility::CoolingDown(Duration::from_secs(50))
        );

        let snapshot = tracker.snapshot(start, 1);
        assert!(!snapshot.available);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.total_failures, 1);

        assert_eq!(tracker.check_eligibility(start + Duration::from_secs(60)), Eligibility::Ready);
        let snapshot = tracker.snapshot(start + Duration::from_secs(60), 1);
        assert!(snapshot.available);
        assert_eq!(snapshot.cooldown_remaining, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_reach_retry_limit() {
        let tracker = ModelHealthTracker::new("a");
        let now = Instant::now();
        assert!(!tracker.record_transient(now, 3, Duration::from_secs(30)));
        assert!(!tracker.record_transient(now, 3, Duration::from_secs(30)));
        assert_eq!(tracker.check_eligibility(now), Eligibility::Ready);
        assert!(tracker.record_transient(now, 3, Duration::from_secs(30)));
        assert!(matches!(tracker.check_eligibility(now), Eligibility::CoolingDown(_)));
        assert_eq!(tracker.snapshot(now, 1).consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_consecutive_failures() {
        let tracker = ModelHealthTracker::new("a");
        let now = Instant::now();
        tracker.record_transient(now, 3, Duration::from_secs(30));
        tracker.record_success();
        let snapshot = tracker.snapshot(now, 1);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.total_calls, 1);
        assert_eq!(snapshot.total_failures, 1);
        assert!(snapshot.last_used.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_never_recovers_without_reset() {
        let tracker = ModelHealthTracker::new("a");
        tracker.record_fatal("invalid key");
        let later = Instant::now() + Duration::from_secs(86_400);
        assert_eq!(tracker.check_eligibility(later), Eligibility::Disabled("invalid key".into()));

        tracker.reset();
        assert_eq!(tracker.check_eligibility(later), Eligibility::Ready);
        let snapshot = tracker.snapshot(later, 1);
        assert_eq!(snapshot.total_failures, 0);
        assert_eq!(snapshot.disabled_reason, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_cooldowns_do_not_overflow() {
        let tracker = ModelHealthTracker::new("a");
        let now = Instant::now();
        tracker.record_rate_limited(now, Duration::MAX);
        assert!(matches!(tracker.check_eligibility(now), Eligibility::CoolingDown(_)));

        let tracker = ModelHealthTracker::new("b");
        assert!(tracker.record_transient(now, 1, Duration::MAX));
        assert!(matches!(tracker.check_eligibility(now), Eligibility::CoolingDown(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_a_pure_read() {
        let tracker = ModelHealthTracker::new("a");
        let start = Instant::now();
        tracker.record_rate_limited(start, Duration::from_secs(5));
        let after = start + Duration::from_secs(10);

        let snapshot = tracker.snapshot(after, 1);
        assert!(!snapshot.available);
        assert_eq!(snapshot.cooldown_remaining, Some(Duration::ZERO));
        assert!(!tracker.snapshot(after, 1).available);
    }

    #[test]
    fn test_snapshot_serializes_seconds() {
        let snapshot = HealthSnapshot {
            available: false,
            consecutive_failures: 0,
            cooldown_remaining: Some(Duration::from_millis(1500)),
            total_calls: 0,
            total_failures: 1,
            priority: 1,
            last_used: None,
            disabled_reason: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["cooldown_remaining"], 1.5);
    }
}
