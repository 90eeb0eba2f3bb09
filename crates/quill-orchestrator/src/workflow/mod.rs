//! Research workflow: Plan, Research, Write and Critique.
//!
//! The [`WorkflowController`] owns one [`WorkflowState`] per run and moves it
//! through the stages. Each stage sees a narrowed [`StageView`] of the state,
//! gets its prompt from a [`PromptBuilder`] and reaches a model only through
//! the shared [`ModelRouter`](crate::routing::ModelRouter).

pub mod controller;
pub mod policy;
pub mod progress;
pub mod prompts;
pub mod stage;
pub mod state;
pub mod verdict;

pub use controller::{Completion, RunOutcome, RunStatus, WorkflowController};
pub use policy::{AttemptCapPolicy, StageFailurePolicy, WorkflowPolicy};
pub use progress::{ProgressEvent, ProgressReporter};
pub use prompts::DefaultPromptBuilder;
pub use stage::{PromptBuilder, Stage, StageExecutor, StageOutput, StageView, Verdict};
pub use state::{ApprovalStatus, WorkflowPhase, WorkflowState};
pub use verdict::{heuristic_verdict, parse_verdict};
