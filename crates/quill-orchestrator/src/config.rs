//! TOML configuration for endpoints, routing policy and workflow limits.
//!
//! Configuration is loaded once at startup and never reloaded. Durations are
//! written in seconds (`*_secs` keys, integer or fractional).
//!
//! ```toml
//! [[endpoints]]
//! name = "gemini-1.5-pro"
//! credential_ref = "GOOGLE_API_KEY"
//! priority = 1
//!
//! [policy]
//! max_model_retries = 3
//! rate_limit_retry_delay_secs = 60
//!
//! [workflow]
//! max_iterations = 20
//! on_attempt_cap = "force_approve"
//! ```

use crate::error::ConfigError;
use crate::routing::{MAX_DURATION, ModelEndpoint, RouterPolicy};
use crate::workflow::WorkflowPolicy;
use quill_models::ModelType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Complete Quill configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuillConfig {
    /// Model endpoints in configuration order.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<ModelEndpoint>,
    /// Router failover policy.
    #[serde(default)]
    pub policy: RouterPolicy,
    /// Workflow limits and failure policies.
    #[serde(default)]
    pub workflow: WorkflowPolicy,
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            policy: RouterPolicy::default(),
            workflow: WorkflowPolicy::default(),
        }
    }
}

fn default_endpoints() -> Vec<ModelEndpoint> {
    vec![
        ModelEndpoint::new("gemini-1.5-pro", 1)
            .with_credential_ref("GOOGLE_API_KEY")
            .with_description("Primary model with the largest context window"),
        ModelEndpoint::new("gemini-1.5-flash", 2)
            .with_credential_ref("GOOGLE_API_KEY")
            .with_description("Faster fallback model"),
    ]
}

impl QuillConfig {
    /// Replaces every endpoint's provider with the mock backend.
    #[must_use]
    pub fn into_dry_run(mut self) -> Self {
        for endpoint in &mut self.endpoints {
            endpoint.provider = ModelType::Mock.as_str().to_string();
        }
        self
    }
}

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<QuillConfig> {
        debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    /// Returns error if the text cannot be parsed or validated.
    pub fn parse(content: &str) -> Result<QuillConfig> {
        let config: QuillConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validates configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(config: &QuillConfig) -> Result<()> {
        if config.endpoints.is_empty() {
            return Err(ConfigError::Validation("at least one endpoint is required".to_string()));
        }

        let mut names = HashSet::new();
        for endpoint in &config.endpoints {
            Self::validate_endpoint(endpoint)?;
            if !names.insert(endpoint.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate endpoint name '{}'",
                    endpoint.name
                )));
            }
        }

        let policy = &config.policy;
        if policy.max_model_retries == 0 {
            return Err(invalid("policy.max_model_retries must be at least 1"));
        }
        if policy.call_timeout.is_zero() {
            return Err(invalid("policy.call_timeout_secs must be positive"));
        }

        let durations = [
            ("policy.rate_limit_retry_delay_secs", policy.rate_limit_retry_delay),
            ("policy.failure_cooldown_secs", policy.failure_cooldown),
            ("policy.model_switch_delay_secs", policy.model_switch_delay),
            ("policy.call_timeout_secs", policy.call_timeout),
            ("workflow.run_timeout_secs", config.workflow.run_timeout),
        ];
        for (key, value) in durations {
            if value > MAX_DURATION {
                return Err(ConfigError::Validation(format!(
                    "{key} must not exceed {} seconds",
                    MAX_DURATION.as_secs()
                )));
            }
        }

        let workflow = &config.workflow;
        if workflow.max_iterations == 0 {
            return Err(invalid("workflow.max_iterations must be at least 1"));
        }
        if workflow.max_writing_attempts == 0 {
            return Err(invalid("workflow.max_writing_attempts must be at least 1"));
        }
        if workflow.run_timeout.is_zero() {
            return Err(invalid("workflow.run_timeout_secs must be positive"));
        }

        Ok(())
    }

    fn validate_endpoint(endpoint: &ModelEndpoint) -> Result<()> {
        if endpoint.name.trim().is_empty() {
            return Err(ConfigError::Validation("endpoint name must not be empty".to_string()));
        }

        let model_type = endpoint.model_type().map_err(|_| {
            ConfigError::Validation(format!(
                "endpoint '{}': unknown provider '{}'. Valid providers: gemini, mock",
                endpoint.name, endpoint.provider
            ))
        })?;

        if model_type != ModelType::Mock && endpoint.credential_ref.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "endpoint '{}': credential_ref is required for provider '{}'",
                endpoint.name, endpoint.provider
            )));
        }

        if !(0.0..=2.0).contains(&endpoint.temperature) {
            return Err(ConfigError::Validation(format!(
                "endpoint '{}': temperature {} must be between 0.0 and 2.0",
                endpoint.name, endpoint.temperature
            )));
        }

        if endpoint.max_tokens == 0 {
            return Err(ConfigError::Validation(format!(
                "endpoint '{}': max_tokens must be positive",
                endpoint.name
            )));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(message.to_string())
}

/// Serde adapter for `Duration` as (fractional) seconds.
pub mod secs {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as seconds.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    /// Deserializes non-negative seconds into a duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid duration {secs}: {e}")))
    }
}
