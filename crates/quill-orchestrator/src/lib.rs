//! Research report orchestration for Quill.
//!
//! Two parts:
//! - [`routing`]: a [`ModelRouter`] that fails over across model endpoints
//!   and tracks their health.
//! - [`workflow`]: a [`WorkflowController`] that drives a topic through
//!   planning, research, writing and critique until a report is approved.

pub mod config;
pub mod error;
pub mod routing;
pub mod workflow;

pub use config::{ConfigLoader, QuillConfig};
pub use error::{ConfigError, FailureKind, FailureReason, FailureRecord, RoutingError};
pub use routing::{
    GenerationHint, HealthSnapshot, ModelEndpoint, ModelRouter, RoutedResponse, RouterPolicy,
};
pub use workflow::{
    ApprovalStatus, AttemptCapPolicy, Completion, ProgressEvent, RunOutcome, RunStatus, Stage,
    StageFailurePolicy, WorkflowController, WorkflowPhase, WorkflowPolicy, WorkflowState,
};
