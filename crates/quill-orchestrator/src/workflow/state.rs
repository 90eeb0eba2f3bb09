//! Workflow run state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phase of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    /// Producing the research plan.
    Planning,
    /// Synthesizing research data.
    Researching,
    /// Drafting the report.
    Writing,
    /// Reviewing the draft.
    Critiquing,
    /// Terminal: a report was accepted.
    Approved,
    /// Terminal: the run stopped without a report.
    Failed,
}

impl WorkflowPhase {
    /// Whether the phase is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Failed)
    }

    /// Checks if the run can move to the given phase.
    ///
    /// # Arguments
    /// * `to` - The target phase
    ///
    /// # Returns
    /// Returns `true` if the transition is valid, `false` otherwise.
    #[must_use]
    #[allow(clippy::match_same_arms)] // Each arm is a distinct transition rule
    pub const fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            // Terminal phases never change
            (Self::Approved | Self::Failed, _) => false,
            // Any active phase can fail
            (_, Self::Failed) => true,
            (Self::Planning, Self::Researching) => true,
            (Self::Researching, Self::Writing) => true,
            (Self::Writing, Self::Critiquing) => true,
            // Critique approves, asks for a rewrite, or sends research back
            (Self::Critiquing, Self::Approved | Self::Writing | Self::Researching) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::Researching => "researching",
            Self::Writing => "writing",
            Self::Critiquing => "critiquing",
            Self::Approved => "approved",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Critique verdict on the current draft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// No critique yet.
    #[default]
    Pending,
    /// Draft accepted.
    Approved,
    /// Draft needs another writing pass.
    RevisionNeeded,
    /// Draft needs more research.
    ResearchInsufficient,
}

impl ApprovalStatus {
    /// Snake-case name as used in critic responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::RevisionNeeded => "revision_needed",
            Self::ResearchInsufficient => "research_insufficient",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "revision_needed" => Ok(Self::RevisionNeeded),
            "research_insufficient" => Ok(Self::ResearchInsufficient),
            _ => Err(()),
        }
    }
}

/// Everything one run has produced so far.
///
/// Owned by a single run and never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Research topic.
    pub topic: String,
    /// Output of the plan stage.
    pub research_plan: Option<String>,
    /// Output of the latest research stage.
    pub synthesized_data: Option<String>,
    /// Output of the latest write stage.
    pub draft_report: Option<String>,
    /// Feedback from the latest critique that asked for another round.
    pub critique_feedback: Option<String>,
    /// Latest critique verdict.
    pub approval_status: ApprovalStatus,
    /// Accepted report; set only when the run is approved.
    pub final_report: Option<String>,
    /// Stage executions so far.
    pub current_iteration: u32,
    /// Research rounds requested by critique.
    pub research_attempts: u32,
    /// Drafts written so far.
    pub writing_attempts: u32,
    /// Critiques performed.
    pub critique_rounds: u32,
}

impl WorkflowState {
    /// Creates the initial state for `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self { topic: topic.into(), ..Self::default() }
    }

    /// The most complete document produced so far.
    #[must_use]
    pub fn best_effort_report(&self) -> Option<&str> {
        self.final_report.as_deref().or(self.draft_report.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        use WorkflowPhase::*;
        assert!(Planning.can_transition_to(Researching));
        assert!(Researching.can_transition_to(Writing));
        assert!(Writing.can_transition_to(Critiquing));
        assert!(Critiquing.can_transition_to(Approved));
        assert!(Critiquing.can_transition_to(Writing));
        assert!(Critiquing.can_transition_to(Researching));
        assert!(Writing.can_transition_to(Failed));

        assert!(!Planning.can_transition_to(Writing));
        assert!(!Writing.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Planning));
        assert!(Approved.is_terminal() && Failed.is_terminal() && !Critiquing.is_terminal());
    }

    #[test]
    fn test_approval_status_parsing() {
        assert_eq!("APPROVED".parse(), Ok(ApprovalStatus::Approved));
        assert_eq!("revision needed".parse(), Ok(ApprovalStatus::RevisionNeeded));
        assert_eq!(" research-insufficient ".parse(), Ok(ApprovalStatus::ResearchInsufficient));
        assert_eq!("maybe".parse::<ApprovalStatus>(), Err(()));
    }

    #[test]
    fn test_new_state() {
        let state = WorkflowState::new("quantum networking");
        assert_eq!(state.topic, "quantum networking");
        assert_eq!(state.approval_status, ApprovalStatus::Pending);
        assert_eq!(state.current_iteration, 0);
        assert_eq!(state.best_effort_report(), None);
    }

    #[test]
    fn test_best_effort_report_prefers_final() {
        let mut state = WorkflowState::new("t");
        state.draft_report = Some("draft".into());
        assert_eq!(state.best_effort_report(), Some("draft"));
        state.final_report = Some("final".into());
        assert_eq!(state.best_effort_report(), Some("final"));
    }
}
