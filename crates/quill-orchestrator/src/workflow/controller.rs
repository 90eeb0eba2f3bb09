//! Workflow controller.
//!
//! Drives Plan, Research, Write and Critique in state-machine order for one
//! topic. Every stage execution counts as one iteration, and the iteration
//! limit is checked before each stage, so a run performs at most
//! `max_iterations` stage executions whatever the critic says.

use super::policy::{AttemptCapPolicy, StageFailurePolicy, WorkflowPolicy};
use super::progress::{ProgressEvent, ProgressReporter};
use super::prompts::DefaultPromptBuilder;
use super::stage::{PromptBuilder, Stage, StageExecutor, StageOutput, StageView, Verdict};
use super::state::{ApprovalStatus, WorkflowPhase, WorkflowState};
use crate::error::FailureReason;
use crate::routing::{ModelRouter, instant_after};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_REVISION_FEEDBACK: &str =
    "The report needs revision to improve clarity, depth, and overall quality.";
const DEFAULT_RESEARCH_FEEDBACK: &str = "The current research is insufficient. Gather additional \
     information to provide more depth and coverage.";

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A report was produced.
    Approved,
    /// No report was produced.
    Failed,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The critic approved the draft.
    Approved,
    /// An attempt cap was reached and the draft was accepted as is.
    ForcedApproval,
    /// The run stopped without a report.
    Failed,
}

impl Completion {
    /// Run status for this completion.
    #[must_use]
    pub const fn status(self) -> RunStatus {
        match self {
            Self::Approved | Self::ForcedApproval => RunStatus::Approved,
            Self::Failed => RunStatus::Failed,
        }
    }
}

/// Result of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// Run ID, also carried by progress events.
    pub run_id: Uuid,
    /// Approved or failed.
    pub status: RunStatus,
    /// Genuine approval, forced approval or failure.
    pub completion: Completion,
    /// The accepted report.
    pub final_report: Option<String>,
    /// Why the run failed, or why approval was forced.
    pub failure_reason: Option<FailureReason>,
    /// State at the end of the run.
    pub state: WorkflowState,
    /// Run start time.
    pub started_at: DateTime<Utc>,
    /// Run end time.
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Whether the critic genuinely approved the report.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.completion == Completion::Approved
    }

    /// The final report, or the latest draft of a failed run.
    #[must_use]
    pub fn best_effort_report(&self) -> Option<&str> {
        self.final_report.as_deref().or(self.state.draft_report.as_deref())
    }
}

enum Step {
    Next(Stage),
    Finish(Completion, Option<FailureReason>),
}

/// Runs research workflows against a shared router.
pub struct WorkflowController {
    router: Arc<ModelRouter>,
    prompts: Arc<dyn PromptBuilder>,
    policy: WorkflowPolicy,
    progress: ProgressReporter,
}

impl fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowController")
            .field("router", &self.router)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl WorkflowController {
    /// Creates a controller using the default prompt builder.
    ///
    /// # Arguments
    /// * `router` - Shared model router
    /// * `policy` - Limits and failure policies
    #[must_use]
    pub fn new(router: Arc<ModelRouter>, policy: WorkflowPolicy) -> Self {
        Self {
            router,
            prompts: Arc::new(DefaultPromptBuilder::new()),
            policy,
            progress: ProgressReporter::new(),
        }
    }

    /// Replaces the prompt builder.
    #[must_use]
    pub fn with_prompt_builder(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    /// The workflow policy.
    #[must_use]
    pub const fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    /// The shared router.
    #[must_use]
    pub const fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    /// Subscribes to progress events of all runs started by this controller.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Runs the workflow for `topic` to completion.
    pub async fn run(&self, topic: &str) -> RunOutcome {
        self.run_with_cancel(topic, CancellationToken::new()).await
    }

    /// Runs the workflow for `topic`, checking `cancel` between stages.
    pub async fn run_with_cancel(&self, topic: &str, cancel: CancellationToken) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = instant_after(Instant::now(), self.policy.run_timeout);
        let mut state = WorkflowState::new(topic);
        let mut stage = Stage::Plan;
        let mut came_from: Option<Stage> = None;

        info!(run_id = %run_id, topic = %topic, "Workflow run started");
        self.progress.emit_run_started(run_id, topic);

        let (completion, failure_reason) = loop {
            if cancel.is_cancelled() {
                break (Completion::Failed, Some(FailureReason::Cancelled));
            }
            if Instant::now() >= deadline {
                let limit = self.policy.run_timeout;
                break (Completion::Failed, Some(FailureReason::RunTimedOut { limit }));
            }
            if state.current_iteration >= self.policy.max_iterations {
                let limit = self.policy.max_iterations;
                break (Completion::Failed, Some(FailureReason::IterationLimitExceeded { limit }));
            }

            state.current_iteration += 1;
            let iteration = state.current_iteration;
            debug!(run_id = %run_id, iteration, stage = %stage, "Executing stage");
            self.progress.emit_stage_started(run_id, iteration, stage);

            let output = match self.execute_stage(stage, &state, deadline).await {
                Ok(output) => output,
                Err(reason) => {
                    self.progress.emit_stage_failed(run_id, iteration, stage, reason.to_string());
                    break (Completion::Failed, Some(reason));
                }
            };
            self.progress.emit_stage_completed(run_id, iteration, stage, summarize(&output));

            match self.apply(stage, came_from, output, &mut state) {
                Step::Next(next) => {
                    debug_assert!(stage.phase().can_transition_to(next.phase()));
                    info!(
                        run_id = %run_id,
                        iteration,
                        from = %stage.phase(),
                        to = %next.phase(),
                        "Stage transition"
                    );
                    came_from = Some(stage);
                    stage = next;
                }
                Step::Finish(completion, reason) => break (completion, reason),
            }
        };

        self.finish(run_id, started_at, state, completion, failure_reason)
    }

    /// Executes one stage, applying the stage failure policy.
    async fn execute_stage(
        &self,
        stage: Stage,
        state: &WorkflowState,
        deadline: Instant,
    ) -> Result<StageOutput, FailureReason> {
        let executor =
            StageExecutor::new(stage, Arc::clone(&self.router), Arc::clone(&self.prompts));
        let view = StageView::for_stage(stage, state);
        let policy = self.policy.failure_policy_for(stage);
        let mut retried = false;

        loop {
            let result = timeout_at(deadline, executor.execute(&view))
                .await
                .map_err(|_| FailureReason::RunTimedOut { limit: self.policy.run_timeout })?;

            let error = match result {
                Ok(output) => return Ok(output),
                Err(error) => error,
            };

            match policy {
                StageFailurePolicy::RetryOnce if !retried => {
                    warn!(stage = %stage, error = %error, "Stage failed, retrying once");
                    retried = true;
                }
                StageFailurePolicy::Fallback => {
                    if let Some(output) = executor.fallback(&view) {
                        warn!(
                            stage = %stage,
                            error = %error,
                            "Stage failed, using fallback content"
                        );
                        return Ok(output);
                    }
                    return Err(FailureReason::StageFailed { stage, error });
                }
                StageFailurePolicy::Fail | StageFailurePolicy::RetryOnce => {
                    return Err(FailureReason::StageFailed { stage, error });
                }
            }
        }
    }

    fn apply(
        &self,
        stage: Stage,
        came_from: Option<Stage>,
        output: StageOutput,
        state: &mut WorkflowState,
    ) -> Step {
        match stage {
            Stage::Plan => {
                state.research_plan = Some(output.into_text());
                Step::Next(Stage::Research)
            }
            Stage::Research => {
                state.synthesized_data = Some(output.into_text());
                if came_from == Some(Stage::Plan) {
                    state.writing_attempts = 0;
                }
                Step::Next(Stage::Write)
            }
            Stage::Write => {
                state.draft_report = Some(output.into_text());
                state.writing_attempts += 1;
                Step::Next(Stage::Critique)
            }
            Stage::Critique => {
                let verdict = output.into_verdict(state.draft_report.as_deref().unwrap_or(""));
                self.apply_verdict(verdict, state)
            }
        }
    }

    fn apply_verdict(&self, verdict: Verdict, state: &mut WorkflowState) -> Step {
        state.critique_rounds += 1;
        state.approval_status = verdict.status;

        let policy = &self.policy;
        match verdict.status {
            ApprovalStatus::Approved => {
                state.final_report = state.draft_report.clone();
                Step::Finish(Completion::Approved, None)
            }
            ApprovalStatus::ResearchInsufficient => {
                if state.research_attempts < policy.max_research_attempts {
                    state.critique_feedback =
                        Some(feedback_or(verdict.feedback, DEFAULT_RESEARCH_FEEDBACK));
                    state.research_attempts += 1;
                    Step::Next(Stage::Research)
                } else {
                    let attempts = state.research_attempts;
                    self.attempt_cap(Stage::Research, attempts, policy.max_research_attempts, state)
                }
            }
            ApprovalStatus::RevisionNeeded | ApprovalStatus::Pending => {
                if state.writing_attempts < policy.max_writing_attempts {
                    state.critique_feedback =
                        Some(feedback_or(verdict.feedback, DEFAULT_REVISION_FEEDBACK));
                    Step::Next(Stage::Write)
                } else {
                    let attempts = state.writing_attempts;
                    self.attempt_cap(Stage::Write, attempts, policy.max_writing_attempts, state)
                }
            }
        }
    }

    fn attempt_cap(
        &self,
        stage: Stage,
        attempts: u32,
        limit: u32,
        state: &mut WorkflowState,
    ) -> Step {
        let reason = FailureReason::AttemptLimitExceeded { stage, attempts, limit };
        match self.policy.on_attempt_cap {
            AttemptCapPolicy::ForceApprove => {
                warn!(
                    stage = %stage,
                    attempts,
                    limit,
                    "Attempt cap reached, accepting current draft"
                );
                state.final_report = state.draft_report.clone();
                Step::Finish(Completion::ForcedApproval, Some(reason))
            }
            AttemptCapPolicy::Fail => {
                warn!(stage = %stage, attempts, limit, "Attempt cap reached, failing run");
                Step::Finish(Completion::Failed, Some(reason))
            }
        }
    }

    fn finish(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        state: WorkflowState,
        completion: Completion,
        failure_reason: Option<FailureReason>,
    ) -> RunOutcome {
        let phase = match completion.status() {
            RunStatus::Approved => WorkflowPhase::Approved,
            RunStatus::Failed => WorkflowPhase::Failed,
        };
        let summary = match (&completion, &failure_reason) {
            (Completion::Approved, _) => {
                format!("approved after {} iterations", state.current_iteration)
            }
            (_, Some(reason)) => format!("{phase}: {reason}"),
            (_, None) => phase.to_string(),
        };

        let iterations = state.current_iteration;
        match completion {
            Completion::Approved => info!(run_id = %run_id, iterations, "Workflow approved"),
            Completion::ForcedApproval => {
                warn!(run_id = %run_id, iterations, summary = %summary, "Workflow force-approved");
            }
            Completion::Failed => {
                error!(run_id = %run_id, iterations, summary = %summary, "Workflow failed");
            }
        }
        self.progress.emit_run_finished(run_id, completion != Completion::Failed, summary);

        RunOutcome {
            run_id,
            status: completion.status(),
            completion,
            final_report: state.final_report.clone(),
            failure_reason,
            state,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

fn feedback_or(feedback: String, default: &str) -> String {
    if feedback.trim().is_empty() { default.to_string() } else { feedback }
}

fn summarize(output: &StageOutput) -> String {
    match output {
        StageOutput::Text(text) => format!("{} chars", text.chars().count()),
        StageOutput::Verdict(verdict) => format!("verdict: {}", verdict.status),
    }
}
