//! Model endpoint descriptions.

use quill_abstraction::{ModelError, ModelParameters};
use quill_models::{ModelConfig, ModelType};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Per-call hints attached to a `generate` request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationHint {
    /// Stage name, used for logging.
    pub stage: Option<String>,
    /// Overrides the endpoint temperature.
    pub temperature: Option<f32>,
    /// Overrides the endpoint token limit.
    pub max_tokens: Option<u32>,
}

impl GenerationHint {
    /// Creates a hint labelled with a stage name.
    #[must_use]
    pub fn for_stage(stage: impl Into<String>) -> Self {
        Self { stage: Some(stage.into()), ..Self::default() }
    }

    /// Sets the temperature override.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Immutable description of one model backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEndpoint {
    /// Endpoint name, also the model ID sent to the provider.
    pub name: String,
    /// Provider name (`gemini` or `mock`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Environment variable holding the API key, or the key itself.
    #[serde(default)]
    pub credential_ref: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum output tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Lower values are tried first.
    pub priority: u32,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Optional API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "gemini".to_string()
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    8192
}

impl ModelEndpoint {
    /// Creates an endpoint with default sampling settings.
    ///
    /// # Arguments
    /// * `name` - Endpoint name and model ID
    /// * `priority` - Position in the failover order (lower first)
    #[must_use]
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            provider: default_provider(),
            credential_ref: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            priority,
            description: String::new(),
            base_url: None,
        }
    }

    /// Sets the provider.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Sets the credential reference.
    #[must_use]
    pub fn with_credential_ref(mut self, credential_ref: impl Into<String>) -> Self {
        self.credential_ref = credential_ref.into();
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Parses the provider name.
    ///
    /// # Errors
    /// Returns `ModelError::UnsupportedModelProvider` for unknown providers.
    pub fn model_type(&self) -> std::result::Result<ModelType, ModelError> {
        ModelType::from_str(&self.provider).map_err(|()| {
            ModelError::UnsupportedModelProvider(format!("Unknown provider: {}", self.provider))
        })
    }

    /// Builds the factory configuration for this endpoint.
    ///
    /// # Errors
    /// Returns an error if the provider is unknown.
    pub fn model_config(&self) -> std::result::Result<ModelConfig, ModelError> {
        let mut config = ModelConfig::new(self.model_type()?, self.name.clone());
        if !self.credential_ref.trim().is_empty() {
            config = config.with_credential_ref(self.credential_ref.clone());
        }
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        Ok(config)
    }

    /// Resolves the parameters for one call, applying hint overrides.
    #[must_use]
    pub fn parameters(&self, hint: &GenerationHint) -> ModelParameters {
        ModelParameters {
            temperature: Some(hint.temperature.unwrap_or(self.temperature)),
            max_tokens: Some(hint.max_tokens.unwrap_or(self.max_tokens)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_overrides_endpoint_settings() {
        let endpoint =
            ModelEndpoint::new("gemini-1.5-pro", 1).with_temperature(0.9).with_max_tokens(1000);

        let params = endpoint.parameters(&GenerationHint::default());
        assert_eq!(params.temperature, Some(0.9));
        assert_eq!(params.max_tokens, Some(1000));

        let hint = GenerationHint::for_stage("critique").with_temperature(0.3);
        let params = endpoint.parameters(&hint);
        assert_eq!(params.temperature, Some(0.3));
        assert_eq!(params.max_tokens, Some(1000));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let endpoint: ModelEndpoint = toml::from_str(
            r#"
name = "gemini-1.5-flash"
priority = 2
credential_ref = "GOOGLE_API_KEY"
"#,
        )
        .unwrap();
        assert_eq!(endpoint.provider, "gemini");
        assert!((endpoint.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(endpoint.max_tokens, 8192);
        assert!(endpoint.description.is_empty());
    }

    #[test]
    fn test_model_config_carries_credential_ref() {
        let endpoint =
            ModelEndpoint::new("gemini-1.5-pro", 1).with_credential_ref("GOOGLE_API_KEY");
        let config = endpoint.model_config().unwrap();
        assert_eq!(config.model_type, ModelType::Gemini);
        assert_eq!(config.model_id, "gemini-1.5-pro");
        assert_eq!(config.credential_ref.as_deref(), Some("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let endpoint = ModelEndpoint::new("x", 1).with_provider("carrier-pigeon");
        assert!(matches!(endpoint.model_type(), Err(ModelError::UnsupportedModelProvider(_))));
    }
}
