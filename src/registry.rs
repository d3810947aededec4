//! Task registry: the single source of truth for task state
//!
//! All records live in one `HashMap` behind a `std::sync::RwLock`. The lock
//! is only held for O(1)/O(n) bookkeeping, never across an `.await` and
//! never while a retrieval operation runs, so the synchronous progress
//! callback can write to it from inside an operation.
//!
//! Records are never evicted; every id handed out stays resolvable for the
//! lifetime of the registry.

use crate::error::{Error, Result};
use crate::types::{Artifact, CancelOutcome, Status, TaskId, TaskInfo, TaskParams};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Error recorded when a task is canceled before its worker started
pub(crate) const CANCELED_BEFORE_START: &str = "Canceled.";

/// Mutable state of one task
#[derive(Debug)]
pub(crate) struct TaskRecord {
    pub(crate) id: TaskId,
    pub(crate) params: TaskParams,
    pub(crate) status: Status,
    pub(crate) progress: f64,
    pub(crate) result: Option<Artifact>,
    pub(crate) error: Option<String>,
    pub(crate) warning: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    /// Set at most once, never cleared
    pub(crate) cancel: CancellationToken,
    /// Append-only, de-duplicated
    pub(crate) side_files: Vec<PathBuf>,
    /// Creation order, breaks `created_at` ties
    pub(crate) seq: u64,
    /// True while the worker is inside the retrieval operation
    pub(crate) live: bool,
}

impl TaskRecord {
    fn new(id: TaskId, params: TaskParams, seq: u64) -> Self {
        Self {
            id,
            params,
            status: Status::Pending,
            progress: 0.0,
            result: None,
            error: None,
            warning: None,
            created_at: Utc::now(),
            completed_at: None,
            cancel: CancellationToken::new(),
            side_files: Vec::new(),
            seq,
            live: false,
        }
    }

    pub(crate) fn snapshot(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            url: self.params.url.clone(),
            media_kind: self.params.media_kind,
            quality: self.params.quality.clone(),
            format: self.params.format.clone(),
            status: self.status,
            is_done: self.status.is_terminal(),
            progress: clamp_progress(self.progress),
            result: self.result.clone(),
            error: self.error.clone(),
            warning: self.warning.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }

    /// Validate and merge `update`; returns whether a terminal state was entered
    fn merge(&mut self, update: TaskUpdate) -> Result<bool> {
        let current = self.status;
        if current.is_terminal() {
            return Err(Error::InvalidTransition {
                id: self.id,
                from: current,
                to: update.status.unwrap_or(current),
            });
        }
        if let Some(next) = update.status
            && !current.can_transition_to(next)
        {
            return Err(Error::InvalidTransition {
                id: self.id,
                from: current,
                to: next,
            });
        }

        if let Some(next) = update.status {
            self.status = next;
        }
        if let Some(progress) = update.progress.filter(|p| p.is_finite()) {
            self.progress = clamp_progress(progress);
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(warning) = update.warning {
            self.warning = Some(warning);
        }
        if let Some(path) = update.side_file
            && !self.side_files.contains(&path)
        {
            self.side_files.push(path);
        }

        let entered_terminal = self.status.is_terminal() && self.completed_at.is_none();
        if entered_terminal {
            self.completed_at = Some(Utc::now());
        }
        Ok(entered_terminal)
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

/// Partial update of a task record
///
/// Only fields that are `Some` are written; everything else is left as it
/// is. This lets the worker and the progress monitor update different
/// aspects of the same record without clobbering each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    /// New status (must be a legal forward transition)
    pub status: Option<Status>,
    /// New progress, clamped to [0, 100]; non-finite values are ignored
    pub progress: Option<f64>,
    /// Produced file
    pub result: Option<Artifact>,
    /// Failure or cancellation message
    pub error: Option<String>,
    /// Degraded-success message
    pub warning: Option<String>,
    /// Side file to append (ignored if already recorded)
    pub side_file: Option<PathBuf>,
}

impl TaskUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the progress
    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set the result
    pub fn result(mut self, result: Artifact) -> Self {
        self.result = Some(result);
        self
    }

    /// Set the error message
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the warning message
    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// Append a side file
    pub fn side_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.side_file = Some(path.into());
        self
    }
}

/// Concurrency-safe map from [`TaskId`] to task state
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, TaskRecord>>,
    next_seq: AtomicU64,
    /// Signalled after every terminal transition
    finished: Notify,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, TaskRecord>> {
        // Every write is a complete merge, so a poisoned map is still consistent.
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, TaskRecord>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new record in `pending` and return its id
    pub fn create(&self, params: TaskParams) -> TaskId {
        let id = TaskId::new();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.write().insert(id, TaskRecord::new(id, params, seq));
        id
    }

    /// Snapshot of a task, `None` for unknown ids
    pub fn get(&self, id: &TaskId) -> Option<TaskInfo> {
        self.read().get(id).map(TaskRecord::snapshot)
    }

    /// Whether a task with this id exists
    pub fn contains(&self, id: &TaskId) -> bool {
        self.read().contains_key(id)
    }

    /// Number of tasks ever created
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no task was created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of all tasks, newest first
    ///
    /// `status_filter` is matched case-insensitively against the status
    /// name. An empty or whitespace-only filter matches everything; a filter
    /// naming no known status matches nothing.
    pub fn list(&self, status_filter: Option<&str>) -> Vec<TaskInfo> {
        let filter = status_filter
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty());

        let tasks = self.read();
        let mut matching: Vec<&TaskRecord> = tasks
            .values()
            .filter(|record| {
                filter
                    .as_deref()
                    .is_none_or(|f| record.status.as_str() == f)
            })
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        matching.into_iter().map(TaskRecord::snapshot).collect()
    }

    /// Atomically merge a partial update into a record
    ///
    /// Fails with [`Error::NotFound`] for unknown ids and with
    /// [`Error::InvalidTransition`] when the record is already terminal or the
    /// requested status is not a legal forward transition. A rejected update
    /// changes nothing. `completed_at` is stamped on the first terminal
    /// transition.
    pub fn apply_update(&self, id: &TaskId, update: TaskUpdate) -> Result<TaskInfo> {
        let (snapshot, entered_terminal) = {
            let mut tasks = self.write();
            let record = tasks.get_mut(id).ok_or(Error::NotFound(*id))?;
            let entered_terminal = record.merge(update)?;
            (record.snapshot(), entered_terminal)
        };

        if entered_terminal {
            self.finished.notify_waiters();
        }
        Ok(snapshot)
    }

    /// Cancellation token of a task
    pub fn cancel_token(&self, id: &TaskId) -> Option<CancellationToken> {
        self.read().get(id).map(|record| record.cancel.clone())
    }

    /// Side files recorded so far, in recording order
    pub fn side_files(&self, id: &TaskId) -> Vec<PathBuf> {
        self.read()
            .get(id)
            .map(|record| record.side_files.clone())
            .unwrap_or_default()
    }

    /// Request cancellation of a task
    ///
    /// Terminal tasks are left untouched and their status reported back. A
    /// pending task without a live worker is moved to `canceled` right away;
    /// otherwise the token is set and the worker stops at its next progress
    /// report.
    pub fn request_cancel(&self, id: &TaskId) -> CancelOutcome {
        let (outcome, entered_terminal) = {
            let mut tasks = self.write();
            match tasks.get_mut(id) {
                None => (CancelOutcome::NotFound, false),
                Some(record) if record.status.is_terminal() => (
                    CancelOutcome::AlreadyFinished {
                        status: record.status,
                    },
                    false,
                ),
                Some(record) => {
                    record.cancel.cancel();
                    if record.status == Status::Pending && !record.live {
                        record.status = Status::Canceled;
                        record.error = Some(CANCELED_BEFORE_START.to_string());
                        record.completed_at = Some(Utc::now());
                        (CancelOutcome::Canceled, true)
                    } else {
                        (CancelOutcome::CancelRequested, false)
                    }
                }
            }
        };

        if entered_terminal {
            self.finished.notify_waiters();
        }
        outcome
    }

    /// Move a pending task to `running` and mark its worker live
    ///
    /// Returns the parameters and cancellation token for the worker, or
    /// `None` if the task is unknown or no longer pending (for example
    /// because it was canceled before the worker got scheduled).
    pub(crate) fn begin(&self, id: &TaskId) -> Option<(TaskParams, CancellationToken)> {
        let mut tasks = self.write();
        let record = tasks.get_mut(id)?;
        if record.status != Status::Pending {
            return None;
        }
        record.status = Status::Running;
        record.progress = 0.0;
        record.live = true;
        Some((record.params.clone(), record.cancel.clone()))
    }

    /// Write the worker's terminal update and mark the worker as gone
    ///
    /// `live` is cleared even if the update is rejected.
    pub(crate) fn finish(&self, id: &TaskId, update: TaskUpdate) -> Result<TaskInfo> {
        let (result, entered_terminal) = {
            let mut tasks = self.write();
            let record = tasks.get_mut(id).ok_or(Error::NotFound(*id))?;
            record.live = false;
            match record.merge(update) {
                Ok(entered_terminal) => (Ok(record.snapshot()), entered_terminal),
                Err(e) => (Err(e), false),
            }
        };

        if entered_terminal {
            self.finished.notify_waiters();
        }
        result
    }

    /// Ids of tasks that have not reached a terminal state
    pub fn active_ids(&self) -> Vec<TaskId> {
        self.read()
            .values()
            .filter(|record| !record.status.is_terminal())
            .map(|record| record.id)
            .collect()
    }

    /// Number of workers currently inside a retrieval operation
    pub fn live_count(&self) -> usize {
        self.read().values().filter(|record| record.live).count()
    }

    /// Notification fired after every terminal transition
    ///
    /// Create and `enable()` the `Notified` future before inspecting state to
    /// avoid missing a wake-up.
    pub(crate) fn finished(&self) -> &Notify {
        &self.finished
    }
}
