//! Workflow limits and failure policies.

use super::stage::Stage;
use crate::config::secs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What to do when critique wants another round but the stage cap is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptCapPolicy {
    /// Accept the current draft as a forced approval.
    #[default]
    ForceApprove,
    /// Stop the run as failed.
    Fail,
}

impl FromStr for AttemptCapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "force_approve" => Ok(Self::ForceApprove),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "unknown attempt cap policy '{other}' (expected force-approve or fail)"
            )),
        }
    }
}

impl fmt::Display for AttemptCapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForceApprove => f.write_str("force-approve"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

/// What to do when a stage gets no response from any model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageFailurePolicy {
    /// Fail the run with the routing error attached.
    #[default]
    Fail,
    /// Run the stage once more; the retry is not a new iteration.
    RetryOnce,
    /// Use the prompt builder's default content, failing if it has none.
    Fallback,
}

/// Limits and policies for workflow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowPolicy {
    /// Maximum stage executions per run.
    pub max_iterations: u32,
    /// Maximum research rounds requested by critique.
    pub max_research_attempts: u32,
    /// Maximum drafts per run.
    pub max_writing_attempts: u32,
    /// Behavior when an attempt cap is reached.
    pub on_attempt_cap: AttemptCapPolicy,
    /// Default behavior when a stage exhausts all models.
    pub on_stage_failure: StageFailurePolicy,
    /// Per-stage overrides of `on_stage_failure`.
    pub stage_failure_overrides: BTreeMap<Stage, StageFailurePolicy>,
    /// Wall-clock ceiling for a whole run.
    #[serde(rename = "run_timeout_secs", with = "secs")]
    pub run_timeout: Duration,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            max_research_attempts: 2,
            max_writing_attempts: 2,
            on_attempt_cap: AttemptCapPolicy::ForceApprove,
            on_stage_failure: StageFailurePolicy::Fail,
            stage_failure_overrides: BTreeMap::new(),
            run_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl WorkflowPolicy {
    /// Failure policy for `stage`.
    #[must_use]
    pub fn failure_policy_for(&self, stage: Stage) -> StageFailurePolicy {
        self.stage_failure_overrides.get(&stage).copied().unwrap_or(self.on_stage_failure)
    }

    /// Sets the iteration limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Sets the research attempt limit.
    #[must_use]
    pub fn with_max_research_attempts(mut self, max: u32) -> Self {
        self.max_research_attempts = max;
        self
    }

    /// Sets the writing attempt limit.
    #[must_use]
    pub fn with_max_writing_attempts(mut self, max: u32) -> Self {
        self.max_writing_attempts = max;
        self
    }

    /// Sets the attempt cap policy.
    #[must_use]
    pub fn with_attempt_cap_policy(mut self, policy: AttemptCapPolicy) -> Self {
        self.on_attempt_cap = policy;
        self
    }

    /// Sets the default stage failure policy.
    #[must_use]
    pub fn with_stage_failure_policy(mut self, policy: StageFailurePolicy) -> Self {
        self.on_stage_failure = policy;
        self
    }

    /// Overrides the failure policy for one stage.
    #[must_use]
    pub fn with_stage_override(mut self, stage: Stage, policy: StageFailurePolicy) -> Self {
        self.stage_failure_overrides.insert(stage, policy);
        self
    }

    /// Sets the run timeout.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_cap_policy_from_str() {
        assert_eq!("force-approve".parse(), Ok(AttemptCapPolicy::ForceApprove));
        assert_eq!("FORCE_APPROVE".parse(), Ok(AttemptCapPolicy::ForceApprove));
        assert_eq!("fail".parse(), Ok(AttemptCapPolicy::Fail));
        assert!("retry".parse::<AttemptCapPolicy>().is_err());
        assert_eq!(AttemptCapPolicy::ForceApprove.to_string(), "force-approve");
    }

    #[test]
    fn test_stage_override() {
        let policy = WorkflowPolicy::default()
            .with_stage_failure_policy(StageFailurePolicy::RetryOnce)
            .with_stage_override(Stage::Plan, StageFailurePolicy::Fallback);
        assert_eq!(policy.failure_policy_for(Stage::Plan), StageFailurePolicy::Fallback);
        assert_eq!(policy.failure_policy_for(Stage::Critique), StageFailurePolicy::RetryOnce);
    }

    #[test]
    fn test_serde_roundtrip_of_defaults() {
        let policy = WorkflowPolicy::default()
            .with_stage_override(Stage::Write, StageFailurePolicy::Fallback);
        let text = toml::to_string(&policy).unwrap();
        assert!(text.contains("run_timeout_secs"));
        let back: WorkflowPolicy = toml::from_str(&text).unwrap();
        assert_eq!(back, policy);
    }
}
