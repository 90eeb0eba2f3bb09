//! Priority-ordered model router with automatic failover.

use super::endpoint::{GenerationHint, ModelEndpoint};
use super::health::{Eligibility, HealthSnapshot, ModelHealthTracker};
use super::outcome::CallOutcome;
use super::policy::RouterPolicy;
use crate::config::QuillConfig;
use crate::error::{ConfigError, FailureKind, FailureRecord, Result, RoutingError};
use quill_abstraction::{Model, ModelUsage};
use quill_models::ModelFactory;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, info, warn};

/// A successful routed call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedResponse {
    /// Generated text.
    pub content: String,
    /// Endpoint that produced the text.
    pub endpoint: String,
    /// Token usage, if the backend reported it.
    pub usage: Option<ModelUsage>,
    /// Endpoints that failed or were skipped before the successful one.
    pub failovers: Vec<FailureRecord>,
}

struct RoutedEndpoint {
    endpoint: ModelEndpoint,
    tracker: ModelHealthTracker,
    backend: Arc<dyn Model + Send + Sync>,
}

/// Stateful facade over several interchangeable model backends.
///
/// Endpoints are tried in ascending priority; ties keep insertion order.
pub struct ModelRouter {
    endpoints: Vec<RoutedEndpoint>,
    policy: RouterPolicy,
}

impl fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.endpoints.iter().map(|e| &e.endpoint.name).collect();
        f.debug_struct("ModelRouter")
            .field("endpoints", &names)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ModelRouter {
    /// Creates a router with no endpoints.
    #[must_use]
    pub fn new(policy: RouterPolicy) -> Self {
        Self { endpoints: Vec::new(), policy }
    }

    /// Adds an endpoint served by `backend`.
    #[must_use]
    pub fn with_endpoint(
        mut self,
        endpoint: ModelEndpoint,
        backend: Arc<dyn Model + Send + Sync>,
    ) -> Self {
        let tracker = ModelHealthTracker::new(endpoint.name.clone());
        self.endpoints.push(RoutedEndpoint { endpoint, tracker, backend });
        // Stable sort keeps configuration order among equal priorities.
        self.endpoints.sort_by_key(|e| e.endpoint.priority);
        self
    }

    /// Builds a router from configuration, creating one backend per endpoint.
    ///
    /// # Errors
    /// Returns `ConfigError::Backend` if a backend cannot be created, for
    /// example when its credential is missing.
    pub fn from_config(config: &QuillConfig) -> std::result::Result<Self, ConfigError> {
        let mut router = Self::new(config.policy.clone());
        for endpoint in &config.endpoints {
            let backend = endpoint
                .model_config()
                .and_then(ModelFactory::create)
                .map_err(|source| ConfigError::Backend {
                    endpoint: endpoint.name.clone(),
                    source,
                })?;
            debug!(endpoint = %endpoint.name, priority = endpoint.priority, "Registered endpoint");
            router = router.with_endpoint(endpoint.clone(), backend);
        }
        Ok(router)
    }

    /// The router policy.
    #[must_use]
    pub const fn policy(&self) -> &RouterPolicy {
        &self.policy
    }

    /// Endpoints in the order they are tried.
    pub fn endpoints(&self) -> impl Iterator<Item = &ModelEndpoint> {
        self.endpoints.iter().map(|e| &e.endpoint)
    }

    /// Generates text, failing over across endpoints.
    ///
    /// # Arguments
    /// * `prompt` - Prompt text
    /// * `hint` - Stage label and parameter overrides
    ///
    /// # Errors
    /// Returns `RoutingError::AllModelsExhausted` with one record per endpoint
    /// if no endpoint produced text.
    pub async fn generate(&self, prompt: &str, hint: &GenerationHint) -> Result<RoutedResponse> {
        if self.endpoints.is_empty() {
            return Err(RoutingError::NoEndpoints);
        }

        let stage = hint.stage.as_deref().unwrap_or("-");
        let mut failures = Vec::new();
        let mut attempted = false;

        for routed in &self.endpoints {
            let name = routed.endpoint.name.as_str();

            match routed.tracker.check_eligibility(Instant::now()) {
                Eligibility::Ready => {}
                Eligibility::CoolingDown(remaining) => {
                    debug!(
                        endpoint = %name,
                        stage = %stage,
                        remaining = ?remaining,
                        "Skipping endpoint in cooldown"
                    );
                    failures.push(FailureRecord::new(
                        name,
                        FailureKind::SkippedCoolingDown,
                        format!("{:.1}s remaining", remaining.as_secs_f64()),
                    ));
                    continue;
                }
                Eligibility::Disabled(reason) => {
                    debug!(
                        endpoint = %name,
                        stage = %stage,
                        reason = %reason,
                        "Skipping disabled endpoint"
                    );
                    failures.push(FailureRecord::new(name, FailureKind::SkippedDisabled, reason));
                    continue;
                }
            }

            let switch_delay = self.policy.model_switch_delay;
            if attempted && !switch_delay.is_zero() {
                debug!(endpoint = %name, delay = ?switch_delay, "Waiting before next endpoint");
                sleep(switch_delay).await;
            }
            attempted = true;

            debug!(endpoint = %name, stage = %stage, prompt_len = prompt.len(), "Calling endpoint");
            let parameters = routed.endpoint.parameters(hint);
            let call = routed.backend.generate_text(prompt, Some(parameters));
            let outcome = match timeout(self.policy.call_timeout, call).await {
                Ok(result) => CallOutcome::classify(result),
                Err(_) => CallOutcome::timed_out(self.policy.call_timeout),
            };

            let kind = outcome.failure_kind();
            match outcome {
                CallOutcome::Success(response) => {
                    routed.tracker.record_success();
                    info!(
                        endpoint = %name,
                        stage = %stage,
                        failovers = failures.len(),
                        "Endpoint produced response"
                    );
                    return Ok(RoutedResponse {
                        content: response.content,
                        endpoint: name.to_string(),
                        usage: response.usage,
                        failovers: failures,
                    });
                }
                CallOutcome::RateLimited(message) => {
                    routed
                        .tracker
                        .record_rate_limited(Instant::now(), self.policy.rate_limit_retry_delay);
                    warn!(
                        endpoint = %name,
                        stage = %stage,
                        cooldown = ?self.policy.rate_limit_retry_delay,
                        "Endpoint rate limited, failing over"
                    );
                    failures.push(FailureRecord::new(name, FailureKind::RateLimited, message));
                }
                CallOutcome::TransientFailure { message, .. } => {
                    let exhausted = routed.tracker.record_transient(
                        Instant::now(),
                        self.policy.max_model_retries,
                        self.policy.failure_cooldown,
                    );
                    if exhausted {
                        warn!(
                            endpoint = %name,
                            stage = %stage,
                            cooldown = ?self.policy.failure_cooldown,
                            "Endpoint reached retry limit, marked unavailable"
                        );
                    } else {
                        warn!(
                            endpoint = %name,
                            stage = %stage,
                            error = %message,
                            "Transient failure, failing over"
                        );
                    }
                    let kind = kind.unwrap_or(FailureKind::Transient);
                    failures.push(FailureRecord::new(name, kind, message));
                }
                CallOutcome::FatalFailure(message) => {
                    routed.tracker.record_fatal(message.clone());
                    error!(
                        endpoint = %name,
                        stage = %stage,
                        error = %message,
                        "Fatal failure, endpoint disabled until reset"
                    );
                    failures.push(FailureRecord::new(name, FailureKind::Fatal, message));
                }
            }
        }

        error!(stage = %stage, endpoints = failures.len(), "All models exhausted");
        Err(RoutingError::AllModelsExhausted(failures))
    }

    /// Health snapshot per endpoint name. Does not change any state.
    #[must_use]
    pub fn status(&self) -> BTreeMap<String, HealthSnapshot> {
        let now = Instant::now();
        self.endpoints
            .iter()
            .map(|e| (e.endpoint.name.clone(), e.tracker.snapshot(now, e.endpoint.priority)))
            .collect()
    }

    /// Makes every endpoint available with zero counters.
    pub fn reset_all(&self) {
        for routed in &self.endpoints {
            routed.tracker.reset();
        }
        info!(endpoints = self.endpoints.len(), "All endpoints reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_abstraction::ModelError;
    use quill_models::ScriptedModel;
    use std::time::Duration;

    fn quick_policy() -> RouterPolicy {
        RouterPolicy::default().with_model_switch_delay(Duration::ZERO)
    }

    fn ok(name: &str, text: &str) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::always_ok(name, text))
    }

    fn failing(name: &str) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::always_err(name, ModelError::RequestError("reset".into())))
    }

    #[tokio::test]
    async fn test_empty_router() {
        let router = ModelRouter::new(quick_policy());
        let err = router.generate("x", &GenerationHint::default()).await.unwrap_err();
        assert_eq!(err, RoutingError::NoEndpoints);
    }

    #[tokio::test]
    async fn test_equal_priorities_keep_insertion_order() {
        let router = ModelRouter::new(quick_policy())
            .with_endpoint(ModelEndpoint::new("first", 1), ok("first", "one"))
            .with_endpoint(ModelEndpoint::new("second", 1), ok("second", "two"))
            .with_endpoint(ModelEndpoint::new("zero", 0), ok("zero", "nil"));

        let order: Vec<_> = router.endpoints().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["zero", "first", "second"]);
    }

    #[tokio::test]
    async fn test_hint_parameters_reach_backend() {
        let backend = ok("a", "text");
        let router = ModelRouter::new(quick_policy())
            .with_endpoint(ModelEndpoint::new("a", 1), backend.clone());
        let response = router
            .generate("prompt", &GenerationHint::for_stage("critique").with_temperature(0.3))
            .await
            .unwrap();
        assert_eq!(response.content, "text");
        assert_eq!(response.endpoint, "a");
        assert!(response.failovers.is_empty());
        assert_eq!(backend.prompts(), vec!["prompt"]);
    }

    #[tokio::test]
    async fn test_failovers_recorded_on_success() {
        let router = ModelRouter::new(quick_policy())
            .with_endpoint(ModelEndpoint::new("a", 1), failing("a"))
            .with_endpoint(ModelEndpoint::new("b", 2), ok("b", "ok"));

        let response = router.generate("x", &GenerationHint::default()).await.unwrap();
        assert_eq!(response.endpoint, "b");
        assert_eq!(response.failovers.len(), 1);
        assert_eq!(response.failovers[0].kind, FailureKind::Transient);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_is_transient() {
        let slow = ScriptedModel::always_ok("slow", "late").with_latency(Duration::from_secs(10));
        let router = ModelRouter::new(quick_policy().with_call_timeout(Duration::from_secs(1)))
            .with_endpoint(ModelEndpoint::new("slow", 1), Arc::new(slow))
            .with_endpoint(ModelEndpoint::new("fast", 2), ok("fast", "ok"));

        let response = router.generate("x", &GenerationHint::default()).await.unwrap();
        assert_eq!(response.endpoint, "fast");
        assert_eq!(response.failovers[0].kind, FailureKind::TimedOut);
        assert_eq!(router.status()["slow"].consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_delay_only_between_attempts() {
        let policy = RouterPolicy::default().with_model_switch_delay(Duration::from_secs(5));
        let router = ModelRouter::new(policy)
            .with_endpoint(ModelEndpoint::new("a", 1), failing("a"))
            .with_endpoint(ModelEndpoint::new("b", 2), ok("b", "ok"));

        let start = Instant::now();
        router.generate("x", &GenerationHint::default()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(5));

        // A hit on the first attempt costs no delay.
        let router = ModelRouter::new(RouterPolicy::default())
            .with_endpoint(ModelEndpoint::new("b", 1), ok("b", "ok"));
        let start = Instant::now();
        router.generate("x", &GenerationHint::default()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_from_config_builds_mock_endpoints() {
        let mut config = QuillConfig::default();
        for endpoint in &mut config.endpoints {
            endpoint.provider = "mock".to_string();
        }
        let router = ModelRouter::from_config(&config).unwrap();
        assert_eq!(router.endpoints().count(), 2);
        let status = router.status();
        assert!(status.values().all(|s| s.available));
    }

    #[tokio::test]
    async fn test_from_config_reports_backend_failure() {
        let mut config = QuillConfig::default();
        config.endpoints[0].provider = "gemini".to_string();
        config.endpoints[0].credential_ref = "QUILL_TEST_DEFINITELY_UNSET_KEY".to_string();
        let err = ModelRouter::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Backend { ref endpoint, .. } if endpoint == "gemini-1.5-pro"
        ));
    }
}
