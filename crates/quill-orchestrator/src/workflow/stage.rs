//! Stages and the executor that runs one stage through the router.

use super::state::{ApprovalStatus, WorkflowPhase, WorkflowState};
use super::verdict::parse_verdict;
use crate::error::Result;
use crate::routing::{GenerationHint, ModelRouter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One step of the research pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Produce a research plan.
    Plan,
    /// Synthesize research data.
    Research,
    /// Draft the report.
    Write,
    /// Review the draft.
    Critique,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Self; 4] = [Self::Plan, Self::Research, Self::Write, Self::Critique];

    /// Lowercase stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Research => "research",
            Self::Write => "write",
            Self::Critique => "critique",
        }
    }

    /// Workflow phase during which this stage runs.
    #[must_use]
    pub const fn phase(self) -> WorkflowPhase {
        match self {
            Self::Plan => WorkflowPhase::Planning,
            Self::Research => WorkflowPhase::Researching,
            Self::Write => WorkflowPhase::Writing,
            Self::Critique => WorkflowPhase::Critiquing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of [`WorkflowState`] a stage is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageView<'a> {
    /// Stage the view was built for.
    pub stage: Stage,
    /// Research topic.
    pub topic: &'a str,
    /// Research plan (research, write, critique).
    pub research_plan: Option<&'a str>,
    /// Synthesized data (research on a re-research round, write, critique).
    pub synthesized_data: Option<&'a str>,
    /// Current draft (write on a revision round, critique).
    pub draft_report: Option<&'a str>,
    /// Feedback from the last critique (research, write).
    pub critique_feedback: Option<&'a str>,
}

impl<'a> StageView<'a> {
    /// Narrows `state` to the fields `stage` may read.
    #[must_use]
    pub fn for_stage(stage: Stage, state: &'a WorkflowState) -> Self {
        let mut view = Self {
            stage,
            topic: &state.topic,
            research_plan: None,
            synthesized_data: None,
            draft_report: None,
            critique_feedback: None,
        };
        match stage {
            Stage::Plan => {}
            Stage::Research => {
                view.research_plan = state.research_plan.as_deref();
                view.synthesized_data = state.synthesized_data.as_deref();
                view.critique_feedback = state.critique_feedback.as_deref();
            }
            Stage::Write => {
                view.research_plan = state.research_plan.as_deref();
                view.synthesized_data = state.synthesized_data.as_deref();
                view.draft_report = state.draft_report.as_deref();
                view.critique_feedback = state.critique_feedback.as_deref();
            }
            Stage::Critique => {
                view.research_plan = state.research_plan.as_deref();
                view.synthesized_data = state.synthesized_data.as_deref();
                view.draft_report = state.draft_report.as_deref();
            }
        }
        view
    }
}

/// Parsed critique result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Assessment of the draft.
    pub status: ApprovalStatus,
    /// Feedback for the next round.
    pub feedback: String,
}

/// Shaped output of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    /// Plan, research and write stages produce text.
    Text(String),
    /// The critique stage produces a verdict.
    Verdict(Verdict),
}

impl StageOutput {
    /// Text content; a verdict yields its feedback.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Verdict(verdict) => verdict.feedback,
        }
    }

    /// Verdict content; text is parsed as a critic response about `draft`.
    #[must_use]
    pub fn into_verdict(self, draft: &str) -> Verdict {
        match self {
            Self::Text(text) => parse_verdict(&text, draft),
            Self::Verdict(verdict) => verdict,
        }
    }
}

/// Builds prompt text for each stage.
///
/// The core never writes prompt content itself; it only decides which state
/// each stage can see.
pub trait PromptBuilder: Send + Sync {
    /// Builds the prompt for `view.stage`.
    fn build(&self, view: &StageView<'_>) -> String;

    /// Default stage output used when no model is reachable, if any.
    fn fallback(&self, _view: &StageView<'_>) -> Option<String> {
        None
    }

    /// Generation hint for a stage.
    fn generation_hint(&self, stage: Stage) -> GenerationHint {
        GenerationHint::for_stage(stage.as_str())
    }
}

/// Runs one stage: builds the prompt, calls the router, shapes the output.
pub struct StageExecutor {
    stage: Stage,
    router: Arc<ModelRouter>,
    prompts: Arc<dyn PromptBuilder>,
}

impl fmt::Debug for StageExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageExecutor").field("stage", &self.stage).finish_non_exhaustive()
    }
}

impl StageExecutor {
    /// Creates an executor for `stage`.
    #[must_use]
    pub fn new(stage: Stage, router: Arc<ModelRouter>, prompts: Arc<dyn PromptBuilder>) -> Self {
        Self { stage, router, prompts }
    }

    /// The stage this executor runs.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Executes the stage against `view`.
    ///
    /// # Errors
    /// Returns the router error if no endpoint produced a response.
    pub async fn execute(&self, view: &StageView<'_>) -> Result<StageOutput> {
        let prompt = self.prompts.build(view);
        let hint = self.prompts.generation_hint(self.stage);
        let response = self.router.generate(&prompt, &hint).await?;
        debug!(
            stage = %self.stage,
            endpoint = %response.endpoint,
            response_len = response.content.len(),
            "Stage produced output"
        );
        Ok(self.shape(response.content, view))
    }

    /// The prompt builder's default output for this stage, if it has one.
    #[must_use]
    pub fn fallback(&self, view: &StageView<'_>) -> Option<StageOutput> {
        self.prompts.fallback(view).map(|text| self.shape(text, view))
    }

    fn shape(&self, text: String, view: &StageView<'_>) -> StageOutput {
        match self.stage {
            Stage::Critique => {
                StageOutput::Verdict(parse_verdict(&text, view.draft_report.unwrap_or("")))
            }
            Stage::Plan | Stage::Research | Stage::Write => StageOutput::Text(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{ModelEndpoint, RouterPolicy};
    use quill_models::ScriptedModel;
    use std::time::Duration;

    struct EchoPrompts;

    impl PromptBuilder for EchoPrompts {
        fn build(&self, view: &StageView<'_>) -> String {
            format!("{}:{}", view.stage, view.topic)
        }
    }

    fn full_state() -> WorkflowState {
        let mut state = WorkflowState::new("topic");
        state.research_plan = Some("plan".into());
        state.synthesized_data = Some("data".into());
        state.draft_report = Some("draft".into());
        state.critique_feedback = Some("feedback".into());
        state
    }

    fn router_with(text: &str) -> Arc<ModelRouter> {
        Arc::new(
            ModelRouter::new(RouterPolicy::default().with_model_switch_delay(Duration::ZERO))
                .with_endpoint(
                    ModelEndpoint::new("m", 1),
                    Arc::new(ScriptedModel::always_ok("m", text)),
                ),
        )
    }

    #[test]
    fn test_plan_view_sees_only_topic() {
        let state = full_state();
        let view = StageView::for_stage(Stage::Plan, &state);
        assert_eq!(view.topic, "topic");
        assert_eq!(view.research_plan, None);
        assert_eq!(view.synthesized_data, None);
        assert_eq!(view.draft_report, None);
        assert_eq!(view.critique_feedback, None);
    }

    #[test]
    fn test_research_view_hides_draft() {
        let state = full_state();
        let view = StageView::for_stage(Stage::Research, &state);
        assert_eq!(view.research_plan, Some("plan"));
        assert_eq!(view.synthesized_data, Some("data"));
        assert_eq!(view.critique_feedback, Some("feedback"));
        assert_eq!(view.draft_report, None);
    }

    #[test]
    fn test_write_view_sees_feedback_and_draft() {
        let state = full_state();
        let view = StageView::for_stage(Stage::Write, &state);
        assert_eq!(view.draft_report, Some("draft"));
        assert_eq!(view.critique_feedback, Some("feedback"));
    }

    #[test]
    fn test_critique_view_hides_feedback() {
        let state = full_state();
        let view = StageView::for_stage(Stage::Critique, &state);
        assert_eq!(view.draft_report, Some("draft"));
        assert_eq!(view.critique_feedback, None);
    }

    #[tokio::test]
    async fn test_text_stage_returns_text() {
        let executor =
            StageExecutor::new(Stage::Plan, router_with("a plan"), Arc::new(EchoPrompts));
        let state = WorkflowState::new("topic");
        let view = StageView::for_stage(Stage::Plan, &state);
        let output = executor.execute(&view).await.unwrap();
        assert_eq!(output, StageOutput::Text("a plan".into()));
    }

    #[tokio::test]
    async fn test_critique_stage_parses_verdict() {
        let reply =
            r#"{"overall_assessment": "Research_Insufficient", "specific_feedback": "dig deeper"}"#;
        let executor =
            StageExecutor::new(Stage::Critique, router_with(reply), Arc::new(EchoPrompts));
        let state = full_state();
        let view = StageView::for_stage(Stage::Critique, &state);
        let output = executor.execute(&view).await.unwrap();
        assert_eq!(
            output,
            StageOutput::Verdict(Verdict {
                status: ApprovalStatus::ResearchInsufficient,
                feedback: "dig deeper".into(),
            })
        );
    }

    #[test]
    fn test_no_fallback_by_default() {
        let executor = StageExecutor::new(Stage::Write, router_with("x"), Arc::new(EchoPrompts));
        let state = full_state();
        assert_eq!(executor.fallback(&StageView::for_stage(Stage::Write, &state)), None);
    }

    #[test]
    fn test_output_conversions() {
        let verdict = Verdict { status: ApprovalStatus::Approved, feedback: "good".into() };
        assert_eq!(StageOutput::Verdict(verdict.clone()).into_text(), "good");
        assert_eq!(StageOutput::Verdict(verdict.clone()).into_verdict("d"), verdict);
        assert_eq!(StageOutput::Text("t".into()).into_text(), "t");
    }
}
