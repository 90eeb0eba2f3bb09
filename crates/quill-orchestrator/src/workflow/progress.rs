//! Progress reporting for workflow runs.
//!
//! Events are broadcast on a bounded channel. Emitting never blocks: slow
//! subscribers lose the oldest events and see `RecvError::Lagged`.

use super::stage::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Buffered events per subscriber.
const CHANNEL_CAPACITY: usize = 100;

/// Progress event types.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A run has started.
    RunStarted {
        /// Run ID.
        run_id: Uuid,
        /// Research topic.
        topic: String,
        /// Event time.
        timestamp: DateTime<Utc>,
    },
    /// A stage has started.
    StageStarted {
        /// Run ID.
        run_id: Uuid,
        /// Iteration number of this stage execution.
        iteration: u32,
        /// Stage.
        stage: Stage,
        /// Event time.
        timestamp: DateTime<Utc>,
    },
    /// A stage has produced output.
    StageCompleted {
        /// Run ID.
        run_id: Uuid,
        /// Iteration number of this stage execution.
        iteration: u32,
        /// Stage.
        stage: Stage,
        /// Event time.
        timestamp: DateTime<Utc>,
        /// Short description of the output.
        summary: String,
    },
    /// A stage could not produce output.
    StageFailed {
        /// Run ID.
        run_id: Uuid,
        /// Iteration number of this stage execution.
        iteration: u32,
        /// Stage.
        stage: Stage,
        /// Event time.
        timestamp: DateTime<Utc>,
        /// Error message.
        error: String,
    },
    /// A run has reached a terminal phase.
    RunFinished {
        /// Run ID.
        run_id: Uuid,
        /// Whether a report was produced.
        approved: bool,
        /// Event time.
        timestamp: DateTime<Utc>,
        /// Short description of the outcome.
        summary: String,
    },
}

impl ProgressEvent {
    /// Run the event belongs to.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StageStarted { run_id, .. }
            | Self::StageCompleted { run_id, .. }
            | Self::StageFailed { run_id, .. }
            | Self::RunFinished { run_id, .. } => *run_id,
        }
    }

    /// Whether this is the last event of a run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::RunFinished { .. })
    }
}

/// Progress reporter for workflow runs.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    /// Broadcast sender for progress events.
    broadcast_tx: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    /// Creates a new progress reporter.
    #[must_use]
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { broadcast_tx }
    }

    /// Subscribes to progress events.
    ///
    /// # Returns
    /// Returns a receiver for events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.broadcast_tx.subscribe()
    }

    fn emit(&self, event: ProgressEvent) {
        debug!("Progress event: {:?}", event);
        // No subscribers is fine.
        let _ = self.broadcast_tx.send(event);
    }

    /// Emits a run started event.
    pub fn emit_run_started(&self, run_id: Uuid, topic: &str) {
        self.emit(ProgressEvent::RunStarted {
            run_id,
            topic: topic.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Emits a stage started event.
    pub fn emit_stage_started(&self, run_id: Uuid, iteration: u32, stage: Stage) {
        self.emit(ProgressEvent::StageStarted { run_id, iteration, stage, timestamp: Utc::now() });
    }

    /// Emits a stage completed event.
    pub fn emit_stage_completed(
        &self,
        run_id: Uuid,
        iteration: u32,
        stage: Stage,
        summary: String,
    ) {
        self.emit(ProgressEvent::StageCompleted {
            run_id,
            iteration,
            stage,
            timestamp: Utc::now(),
            summary,
        });
    }

    /// Emits a stage failed event.
    pub fn emit_stage_failed(&self, run_id: Uuid, iteration: u32, stage: Stage, error: String) {
        self.emit(ProgressEvent::StageFailed {
            run_id,
            iteration,
            stage,
            timestamp: Utc::now(),
            error,
        });
    }

    /// Emits a run finished event.
    pub fn emit_run_finished(&self, run_id: Uuid, approved: bool, summary: String) {
        self.emit(ProgressEvent::RunFinished { run_id, approved, timestamp: Utc::now(), summary });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_events_are_delivered_in_order() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        let run_id = Uuid::new_v4();

        reporter.emit_run_started(run_id, "topic");
        reporter.emit_stage_started(run_id, 1, Stage::Plan);
        reporter.emit_stage_completed(run_id, 1, Stage::Plan, "120 chars".into());
        reporter.emit_run_finished(run_id, true, "approved".into());

        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::RunStarted { .. }));
        let started = rx.recv().await.unwrap();
        assert!(matches!(started, ProgressEvent::StageStarted { iteration: 1, .. }));
        let completed = rx.recv().await.unwrap();
        assert_eq!(completed.run_id(), run_id);
        assert!(rx.recv().await.unwrap().is_terminal());
    }

    #[test]
    fn test_emit_without_subscribers_does_not_block() {
        let reporter = ProgressReporter::new();
        for i in 0..1000 {
            reporter.emit_stage_started(Uuid::new_v4(), i, Stage::Write);
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        let run_id = Uuid::new_v4();
        for i in 0..(CHANNEL_CAPACITY as u32 + 10) {
            reporter.emit_stage_started(run_id, i, Stage::Research);
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(10))));
        let oldest_kept = rx.recv().await.unwrap();
        assert!(matches!(oldest_kept, ProgressEvent::StageStarted { iteration: 10, .. }));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ProgressEvent::StageCompleted {
            run_id: Uuid::nil(),
            iteration: 2,
            stage: Stage::Research,
            timestamp: Utc::now(),
            summary: "done".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stage_completed");
        assert_eq!(json["stage"], "research");
        assert_eq!(json["iteration"], 2);
    }
}
