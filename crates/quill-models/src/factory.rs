//! Model factory for creating model instances from configuration.
//!
//! This module provides functionality to create model instances based on configuration,
//! resolving API keys from credential references.

use crate::{GeminiModel, MockModel};
use quill_abstraction::{Model, ModelError};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

/// Model type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Mock model for dry runs and testing.
    Mock,
    /// Google Gemini model.
    Gemini,
}

impl ModelType {
    /// Returns the canonical provider name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Gemini => "gemini",
        }
    }
}

impl FromStr for ModelType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(()),
        }
    }
}

/// Model configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// The type of model to create.
    pub model_type: ModelType,
    /// The model ID (e.g., "gemini-1.5-pro").
    pub model_id: String,
    /// Explicit API key. Takes precedence over `credential_ref`.
    pub api_key: Option<String>,
    /// Name of the environment variable holding the key, or the key itself.
    pub credential_ref: Option<String>,
    /// Optional base URL override.
    pub base_url: Option<String>,
}

impl ModelConfig {
    /// Creates a new `ModelConfig` with the given type and model ID.
    ///
    /// # Arguments
    /// * `model_type` - The type of model
    /// * `model_id` - The model ID
    #[must_use]
    pub fn new(model_type: ModelType, model_id: String) -> Self {
        Self { model_type, model_id, api_key: None, credential_ref: None, base_url: None }
    }

    /// Sets the API key for this configuration.
    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Sets the credential reference for this configuration.
    #[must_use]
    pub fn with_credential_ref(mut self, credential_ref: String) -> Self {
        self.credential_ref = Some(credential_ref);
        self
    }

    /// Sets the base URL for this configuration.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Resolves a credential reference against the process environment.
///
/// See [`resolve_credential_with`] for the resolution rules.
pub fn resolve_credential(credential_ref: &str) -> Result<String, ModelError> {
    resolve_credential_with(credential_ref, |name| std::env::var(name).ok())
}

/// Resolves a credential reference using `lookup` for environment access.
///
/// The reference is first looked up as a variable name. If no value is found
/// and the reference looks like a variable name (`UPPER_SNAKE_CASE`), that is
/// an error; otherwise the reference is used as the key itself.
///
/// # Errors
/// Returns `ModelError::Authentication` if the reference is empty or names an
/// unset variable.
pub fn resolve_credential_with<F>(credential_ref: &str, lookup: F) -> Result<String, ModelError>
where
    F: Fn(&str) -> Option<String>,
{
    let credential_ref = credential_ref.trim();
    if credential_ref.is_empty() {
        return Err(ModelError::Authentication("empty credential reference".to_string()));
    }

    if let Some(value) = lookup(credential_ref).filter(|v| !v.trim().is_empty()) {
        return Ok(value);
    }

    if looks_like_env_var(credential_ref) {
        error!(credential_ref = %credential_ref, "Credential environment variable is not set");
        return Err(ModelError::Authentication(format!(
            "environment variable {} is not set",
            credential_ref
        )));
    }

    Ok(credential_ref.to_string())
}

fn looks_like_env_var(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Factory for creating model instances.
pub struct ModelFactory;

impl ModelFactory {
    /// Creates a model instance from the given configuration.
    ///
    /// # Arguments
    /// * `config` - The model configuration
    ///
    /// # Errors
    /// Returns a `ModelError` if model creation fails (e.g., missing API key).
    pub fn create(config: ModelConfig) -> Result<Arc<dyn Model + Send + Sync>, ModelError> {
        debug!(
            model_type = ?config.model_type,
            model_id = %config.model_id,
            "Creating model instance"
        );

        match config.model_type {
            ModelType::Mock => Ok(Arc::new(MockModel::new(config.model_id))),
            ModelType::Gemini => {
                let api_key = match (config.api_key, config.credential_ref) {
                    (Some(key), _) => key,
                    (None, Some(reference)) => resolve_credential(&reference)?,
                    (None, None) => {
                        return Err(ModelError::Authentication(format!(
                            "no credential configured for Gemini model {}",
                            config.model_id
                        )));
                    }
                };
                let mut model = GeminiModel::with_api_key(config.model_id, api_key);
                if let Some(base_url) = config.base_url {
                    model = model.with_base_url(base_url);
                }
                Ok(Arc::new(model))
            }
        }
    }
}
