//! Scripted model backend.
//!
//! Replays a fixed sequence of outcomes, one per call. Once the script is
//! exhausted the last outcome repeats, so `ScriptedModel::always_ok` and
//! `ScriptedModel::always_err` are single-entry scripts.

use async_trait::async_trait;
use quill_abstraction::{Model, ModelError, ModelParameters, ModelResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// A model that returns pre-recorded outcomes in order.
#[derive(Debug)]
pub struct ScriptedModel {
    id: String,
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    last: Mutex<Option<Result<String, ModelError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    latency: Option<Duration>,
}

impl ScriptedModel {
    /// Creates a scripted model from an ordered list of outcomes.
    ///
    /// # Arguments
    /// * `id` - Model ID reported by `model_id()`
    /// * `outcomes` - Outcomes returned by successive calls
    #[must_use]
    pub fn new(id: impl Into<String>, outcomes: Vec<Result<String, ModelError>>) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(outcomes.into()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            latency: None,
        }
    }

    /// A model that always succeeds with `text`.
    #[must_use]
    pub fn always_ok(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, vec![Ok(text.into())])
    }

    /// A model that always fails with `error`.
    #[must_use]
    pub fn always_err(id: impl Into<String>, error: ModelError) -> Self {
        Self::new(id, vec![Err(error)])
    }

    /// Delays every response by `latency` (tokio time, so paused clocks apply).
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of times `generate_text` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn next_outcome(&self) -> Result<String, ModelError> {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(outcome) = script.pop_front() {
            *last = Some(outcome.clone());
            return outcome;
        }
        last.clone()
            .unwrap_or_else(|| Err(ModelError::Other(format!("script for '{}' is empty", self.id))))
    }
}

#[async_trait]
impl Model for ScriptedModel {
    async fn generate_text(
        &self,
        prompt: &str,
        _parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.to_string());
        debug!(model_id = %self.id, call, "ScriptedModel generating text");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.next_outcome().map(|content| ModelResponse {
            content,
            model_id: Some(self.id.clone()),
            usage: None,
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}
