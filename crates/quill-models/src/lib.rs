//! Model implementations for Quill.
//!
//! This crate provides concrete implementations of the `Model` trait.
//!
//! # Supported Providers
//!
//! - **Mock**: Dry runs and development (echoes the prompt)
//! - **Gemini**: Google's Gemini models (API key required)
//!
//! [`ScriptedModel`] replays a fixed sequence of outcomes and is used by the
//! router and workflow tests.

pub mod factory;
pub mod gemini;
pub mod scripted;

use async_trait::async_trait;
use quill_abstraction::{Model, ModelError, ModelParameters, ModelResponse, ModelUsage};
use tracing::debug;

pub use factory::{ModelConfig, ModelFactory, ModelType, resolve_credential};
pub use gemini::GeminiModel;
pub use scripted::ScriptedModel;

/// A mock implementation of the `Model` trait for dry runs and demonstration.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
}

impl MockModel {
    /// Creates a new `MockModel` with the given ID.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            prompt_len = prompt.len(),
            parameters = ?parameters,
            "MockModel generating text"
        );

        let response_content = format!("Mock response for: {prompt}\nModel ID: {}", self.id);

        let prompt_tokens = count_tokens(prompt);
        let completion_tokens = count_tokens(&response_content);
        let total_tokens = prompt_tokens + completion_tokens;

        Ok(ModelResponse {
            content: response_content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage { prompt_tokens, completion_tokens, total_tokens }),
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_echoes_prompt() {
        let model = MockModel::new("mock-1".to_string());
        let response = model.generate_text("plan the research", None).await.unwrap();
        assert!(response.content.contains("plan the research"));
        assert!(response.content.contains("mock-1"));
        assert_eq!(response.model_id.as_deref(), Some("mock-1"));
    }

    #[tokio::test]
    async fn test_mock_model_usage() {
        let model = MockModel::new("mock-1".to_string());
        let response = model.generate_text("one two three", None).await.unwrap();
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("  a  b\nc "), 3);
    }
}
