// Error types for routing, configuration and workflow runs

use crate::workflow::Stage;
use quill_abstraction::ModelError;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Why a single endpoint did not produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Backend reported quota or rate limit exhaustion.
    RateLimited,
    /// Network, server or parse hiccup.
    Transient,
    /// The call exceeded the per-call timeout.
    TimedOut,
    /// Misconfiguration or invalid credentials.
    Fatal,
    /// Not attempted: the endpoint is cooling down.
    SkippedCoolingDown,
    /// Not attempted: the endpoint was disabled by a fatal failure.
    SkippedDisabled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RateLimited => "rate limited",
            Self::Transient => "transient failure",
            Self::TimedOut => "timed out",
            Self::Fatal => "fatal failure",
            Self::SkippedCoolingDown => "skipped: cooling down",
            Self::SkippedDisabled => "skipped: disabled",
        };
        f.write_str(s)
    }
}

/// One endpoint's contribution to a failed `generate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Endpoint name.
    pub endpoint: String,
    /// Failure classification.
    pub kind: FailureKind,
    /// Backend message or skip detail.
    pub message: String,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), kind, message: message.into() }
    }

    /// Whether the endpoint was actually called.
    #[must_use]
    pub const fn was_attempted(&self) -> bool {
        !matches!(self.kind, FailureKind::SkippedCoolingDown | FailureKind::SkippedDisabled)
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}: {}", self.endpoint, self.kind)
        } else {
            write!(f, "{}: {} ({})", self.endpoint, self.kind, self.message)
        }
    }
}

fn join_failures(failures: &[FailureRecord]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Routing errors
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RoutingError {
    /// Every configured endpoint failed or was unavailable.
    #[error("All models exhausted: {}", join_failures(.0))]
    AllModelsExhausted(Vec<FailureRecord>),

    /// The router has no endpoints.
    #[error("No model endpoints configured")]
    NoEndpoints,
}

impl RoutingError {
    /// Per-endpoint failure reasons, if any.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        match self {
            Self::AllModelsExhausted(failures) => failures,
            Self::NoEndpoints => &[],
        }
    }
}

/// Errors that can occur while loading configuration or building backends.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// A backend could not be constructed for an endpoint.
    #[error("Failed to create backend for endpoint '{endpoint}': {source}")]
    Backend {
        /// Endpoint name.
        endpoint: String,
        /// Underlying model error.
        #[source]
        source: ModelError,
    },
}

/// Why a workflow run did not produce a genuinely approved report.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// A stage could not get a response from any model.
    #[error("{stage} stage failed: {error}")]
    StageFailed {
        /// Stage that failed.
        stage: Stage,
        /// Router error.
        error: RoutingError,
    },

    /// The run executed `limit` stages without approval.
    #[error("Iteration limit of {limit} reached without approval")]
    IterationLimitExceeded {
        /// Configured maximum.
        limit: u32,
    },

    /// Critique asked for another round but the stage's cap was reached.
    #[error(
        "{stage} attempt limit reached ({attempts}/{limit}) while critique still requests changes"
    )]
    AttemptLimitExceeded {
        /// Stage whose cap was reached.
        stage: Stage,
        /// Attempts performed.
        attempts: u32,
        /// Configured maximum.
        limit: u32,
    },

    /// The run was cancelled by the caller.
    #[error("Run cancelled")]
    Cancelled,

    /// The run exceeded its wall-clock ceiling.
    #[error("Run timed out after {:?}", .limit)]
    RunTimedOut {
        /// Configured ceiling.
        #[serde(with = "crate::config::secs")]
        limit: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_record_display() {
        let record = FailureRecord::new("gemini-1.5-pro", FailureKind::RateLimited, "429");
        assert_eq!(record.to_string(), "gemini-1.5-pro: rate limited (429)");

        let skipped = FailureRecord::new("flash", FailureKind::SkippedDisabled, "");
        assert_eq!(skipped.to_string(), "flash: skipped: disabled");
        assert!(!skipped.was_attempted());
        assert!(record.was_attempted());
    }

    #[test]
    fn test_all_models_exhausted_lists_every_endpoint() {
        let err = RoutingError::AllModelsExhausted(vec![
            FailureRecord::new("a", FailureKind::Fatal, "bad key"),
            FailureRecord::new("b", FailureKind::Transient, "503"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("a: fatal failure (bad key)"));
        assert!(msg.contains("b: transient failure (503)"));
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_failure_reason_serializes_with_tag() {
        let reason =
            FailureReason::AttemptLimitExceeded { stage: Stage::Write, attempts: 2, limit: 2 };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["reason"], "attempt_limit_exceeded");
        assert_eq!(json["stage"], "write");

        let timeout = FailureReason::RunTimedOut { limit: Duration::from_secs(90) };
        let json = serde_json::to_value(&timeout).unwrap();
        assert_eq!(json["limit"], 90.0);
    }
}
