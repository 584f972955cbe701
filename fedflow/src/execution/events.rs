// Execution events
// Progress reporting for fit/predict runs. Events are emitted best-effort
// over an unbounded channel; a closed receiver never fails a run.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::component::ComponentKind;
use crate::execution::runner::RunMode;
use crate::party::{PartyId, Role};

/// Sender for execution progress events.
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events.
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Adapt a progress receiver into a `Stream` of events.
pub fn progress_stream(rx: ProgressReceiver) -> UnboundedReceiverStream<ExecutionEvent> {
    UnboundedReceiverStream::new(rx)
}

/// Events emitted while a plan executes.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// A run started.
    PipelineStarted { mode: RunMode, total_stages: usize },

    /// A run finished.
    PipelineCompleted {
        mode: RunMode,
        success: bool,
        duration: Duration,
    },

    /// A stage was reached in topological order.
    StageStarted {
        component: String,
        kind: ComponentKind,
        index: usize,
        total_parties: usize,
    },

    /// Every participating party completed the stage.
    StageCompleted {
        component: String,
        index: usize,
        duration: Duration,
    },

    /// One party's share of a stage started.
    TaskStarted {
        component: String,
        role: Role,
        party: PartyId,
    },

    /// One party's share of a stage completed.
    TaskCompleted {
        component: String,
        role: Role,
        party: PartyId,
        duration: Duration,
    },

    /// A party's share of a stage failed; the run aborts.
    StageFailed {
        component: String,
        role: Role,
        party: PartyId,
        message: String,
    },
}

impl ExecutionEvent {
    pub fn pipeline_started(mode: RunMode, total_stages: usize) -> Self {
        ExecutionEvent::PipelineStarted { mode, total_stages }
    }

    pub fn pipeline_completed(mode: RunMode, success: bool, duration: Duration) -> Self {
        ExecutionEvent::PipelineCompleted {
            mode,
            success,
            duration,
        }
    }

    pub fn stage_started(
        component: &str,
        kind: ComponentKind,
        index: usize,
        total_parties: usize,
    ) -> Self {
        ExecutionEvent::StageStarted {
            component: component.to_string(),
            kind,
            index,
            total_parties,
        }
    }

    pub fn stage_completed(component: &str, index: usize, duration: Duration) -> Self {
        ExecutionEvent::StageCompleted {
            component: component.to_string(),
            index,
            duration,
        }
    }
}

/// Best-effort event emission for an optional sender.
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(tx) = self {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_event_ignores_closed_receivers() {
        let (tx, rx) = progress_channel();
        drop(rx);
        let sender = Some(tx);
        // Must not panic or error.
        sender.send_event(ExecutionEvent::pipeline_started(RunMode::Fit, 3));
    }

    #[tokio::test]
    async fn stream_adapter_yields_events() {
        use tokio_stream::StreamExt;

        let (tx, rx) = progress_channel();
        let sender = Some(tx);
        sender.send_event(ExecutionEvent::pipeline_started(RunMode::Fit, 1));
        drop(sender);

        let events: Vec<_> = progress_stream(rx).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            ExecutionEvent::PipelineStarted { total_stages: 1, .. }
        ));
    }
}
