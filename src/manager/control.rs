//! Task control: cancellation.

use crate::types::{CancelOutcome, CancelResponse, Event, TaskId};

use super::TaskManager;

impl TaskManager {
    /// Request cancellation of a task
    ///
    /// Never fails. Unknown ids report [`CancelOutcome::NotFound`]; finished
    /// tasks are left untouched and report their terminal status, so calling
    /// this repeatedly is harmless. A task that has not started yet is
    /// canceled immediately. A running task gets its cancellation signal set
    /// and stops at its next progress report; its status only changes once
    /// the worker has finished.
    pub fn cancel(&self, id: &TaskId) -> CancelResponse {
        let outcome = self.registry.request_cancel(id);

        match outcome {
            CancelOutcome::NotFound => {
                tracing::debug!(task_id = %id, "Cancel requested for unknown task");
            }
            CancelOutcome::CancelRequested => {
                tracing::info!(task_id = %id, "Cancellation requested");
            }
            CancelOutcome::Canceled => {
                tracing::info!(task_id = %id, "Task canceled before it started");
                self.event_tx.send(Event::Canceled { id: *id }).ok();
            }
            CancelOutcome::AlreadyFinished { status } => {
                tracing::debug!(task_id = %id, %status, "Cancel requested for finished task");
            }
        }

        CancelResponse { id: *id, outcome }
    }
}
