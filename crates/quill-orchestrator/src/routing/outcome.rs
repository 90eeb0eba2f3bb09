//! Classification of backend call results.

use crate::error::FailureKind;
use quill_abstraction::{ModelError, ModelResponse};
use std::time::Duration;

/// Message fragments that indicate quota or rate limit exhaustion.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "ratelimit",
    "quota",
    "429",
    "too many requests",
    "resource exhausted",
    "resource_exhausted",
    "limit exceeded",
];

/// The router's view of one backend call.
#[derive(Debug, Clone)]
pub enum CallOutcome {
    /// The backend produced text.
    Success(ModelResponse),
    /// Quota or rate limit hit; retry after a cooldown.
    RateLimited(String),
    /// Recoverable hiccup; counts towards the retry limit.
    TransientFailure {
        /// Failure message.
        message: String,
        /// Whether the call hit the per-call timeout.
        timed_out: bool,
    },
    /// Broken until an operator resets the endpoint.
    FatalFailure(String),
}

impl CallOutcome {
    /// Classifies a backend result.
    #[must_use]
    pub fn classify(result: Result<ModelResponse, ModelError>) -> Self {
        match result {
            Ok(response) if response.content.trim().is_empty() => Self::TransientFailure {
                message: "empty response".to_string(),
                timed_out: false,
            },
            Ok(response) => Self::Success(response),
            Err(error) => Self::from_error(&error),
        }
    }

    /// Classifies a backend error.
    #[must_use]
    pub fn from_error(error: &ModelError) -> Self {
        let message = error.to_string();
        match error {
            ModelError::QuotaExceeded { .. } => Self::RateLimited(message),
            ModelError::Authentication(_) | ModelError::UnsupportedModelProvider(_) => {
                Self::FatalFailure(message)
            }
            _ if is_rate_limit_message(&message) => Self::RateLimited(message),
            _ => Self::TransientFailure { message, timed_out: false },
        }
    }

    /// Outcome for a call that exceeded `limit`.
    #[must_use]
    pub fn timed_out(limit: Duration) -> Self {
        Self::TransientFailure {
            message: format!("no response within {limit:?}"),
            timed_out: true,
        }
    }

    /// Failure kind for the exhaustion report; `None` on success.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::RateLimited(_) => Some(FailureKind::RateLimited),
            Self::TransientFailure { timed_out: true, .. } => Some(FailureKind::TimedOut),
            Self::TransientFailure { .. } => Some(FailureKind::Transient),
            Self::FatalFailure(_) => Some(FailureKind::Fatal),
        }
    }
}

/// Whether an error message describes rate limiting or quota exhaustion.
#[must_use]
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content: &str) -> ModelResponse {
        ModelResponse { content: content.to_string(), model_id: None, usage: None }
    }

    #[test]
    fn test_success() {
        assert!(matches!(CallOutcome::classify(Ok(response("text"))), CallOutcome::Success(_)));
    }

    #[test]
    fn test_blank_response_is_transient() {
        let outcome = CallOutcome::classify(Ok(response("  \n")));
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Transient));
    }

    #[test]
    fn test_quota_exceeded_is_rate_limited() {
        let err = ModelError::QuotaExceeded { provider: "gemini".into(), message: None };
        assert!(matches!(CallOutcome::from_error(&err), CallOutcome::RateLimited(_)));
    }

    #[test]
    fn test_rate_limit_keywords_in_other_errors() {
        let messages = [
            "HTTP 429",
            "Resource exhausted",
            "Too Many Requests",
            "daily quota",
            "Rate limit hit",
        ];
        for msg in messages {
            let err = ModelError::ModelResponseError(msg.to_string());
            assert!(
                matches!(CallOutcome::from_error(&err), CallOutcome::RateLimited(_)),
                "{msg} should be rate limited"
            );
        }
    }

    #[test]
    fn test_auth_and_provider_errors_are_fatal() {
        let auth = ModelError::Authentication("bad key".into());
        let provider = ModelError::UnsupportedModelProvider("nope".into());
        assert_eq!(CallOutcome::from_error(&auth).failure_kind(), Some(FailureKind::Fatal));
        assert_eq!(CallOutcome::from_error(&provider).failure_kind(), Some(FailureKind::Fatal));
    }

    #[test]
    fn test_network_and_parse_errors_are_transient() {
        let network = ModelError::RequestError("connection reset".into());
        let parse = ModelError::SerializationError("bad json".into());
        assert_eq!(CallOutcome::from_error(&network).failure_kind(), Some(FailureKind::Transient));
        assert_eq!(CallOutcome::from_error(&parse).failure_kind(), Some(FailureKind::Transient));
    }

    #[test]
    fn test_timeout_kind() {
        let outcome = CallOutcome::timed_out(Duration::from_secs(5));
        assert_eq!(outcome.failure_kind(), Some(FailureKind::TimedOut));
    }
}
