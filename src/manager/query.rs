//! Status queries and bulk polling.

use crate::types::{CheckReport, CheckedTask, TaskId, TaskInfo, TaskList, WaitMode, WaitReport};
use std::time::Duration;
use tokio::time::Instant;

use super::TaskManager;

impl TaskManager {
    /// Snapshot of one task, `None` if the id is unknown
    pub fn get_status(&self, id: &TaskId) -> Option<TaskInfo> {
        self.registry.get(id)
    }

    /// All tasks, newest first, optionally filtered by status name
    ///
    /// The filter is compared case-insensitively with the status name
    /// (`"pending"`, `"running"`, ...). `None` or an empty filter returns
    /// every task.
    pub fn list_downloads(&self, status_filter: Option<&str>) -> TaskList {
        let tasks = self.registry.list(status_filter);
        TaskList {
            total: tasks.len(),
            tasks,
        }
    }

    /// Split `ids` into finished and still-active tasks without blocking
    ///
    /// Unknown ids are reported as finished ([`CheckedTask::NotFound`]) so a
    /// caller polling until `all_done` never loops forever on a typo.
    /// Both lists keep the request order.
    pub fn check_downloads(&self, ids: &[TaskId]) -> CheckReport {
        let mut completed = Vec::new();
        let mut pending = Vec::new();

        for id in ids {
            match self.registry.get(id) {
                None => completed.push(CheckedTask::NotFound { id: *id }),
                Some(info) if info.is_done => completed.push(CheckedTask::Finished(info)),
                Some(_) => pending.push(*id),
            }
        }

        CheckReport {
            all_done: pending.is_empty(),
            completed,
            pending,
        }
    }

    /// Wait until the tasks in `ids` satisfy `mode`, or `timeout` elapses
    ///
    /// [`WaitMode::Any`] returns once at least one task is finished,
    /// [`WaitMode::All`] once every task is. Unknown ids count as finished.
    /// An empty `ids` list returns immediately. Timing out is not an error:
    /// the report carries whatever state was reached and `timed_out = true`.
    /// A timeout too large to represent (such as `Duration::MAX`) waits
    /// without a deadline.
    pub async fn wait_for_downloads(
        &self,
        ids: &[TaskId],
        mode: WaitMode,
        timeout: Duration,
    ) -> WaitReport {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            // Register for the next terminal transition before looking at state
            let notified = self.registry.finished().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let report = self.check_downloads(ids);
            if wait_satisfied(&report, mode) {
                return WaitReport {
                    completed: report.completed,
                    pending: report.pending,
                    timed_out: false,
                };
            }

            let Some(deadline) = deadline else {
                notified.await;
                continue;
            };

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let report = self.check_downloads(ids);
                let timed_out = !wait_satisfied(&report, mode);
                tracing::debug!(
                    waiting_on = report.pending.len(),
                    timed_out,
                    "wait_for_downloads deadline reached"
                );
                return WaitReport {
                    completed: report.completed,
                    pending: report.pending,
                    timed_out,
                };
            }
        }
    }
}

fn wait_satisfied(report: &CheckReport, mode: WaitMode) -> bool {
    match mode {
        WaitMode::All => report.all_done,
        WaitMode::Any => !report.completed.is_empty() || report.pending.is_empty(),
    }
}
