//! Progress monitoring and cooperative cancellation
//!
//! A [`ProgressMonitor`] is handed to the retrieval operation of each task.
//! The operation calls [`ProgressMonitor::report`] whenever its transfer
//! makes progress; the monitor normalizes the event into a percentage for
//! the registry and is the only place where cancellation is enforced.
//! There is no watcher thread: a canceled task stops at its next report, or
//! never if the operation stops reporting.

use crate::cleanup::FileRemover;
use crate::error::RetrievalError;
use crate::registry::{TaskRegistry, TaskUpdate};
use crate::selection::is_partial;
use crate::types::{Event, TaskId};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Highest progress reported while a task is still in flight
///
/// 100 is reserved for the terminal `completed` transition so pollers never
/// see "done" early.
pub const IN_FLIGHT_PROGRESS_CAP: f64 = 99.0;

/// Stage reported by a progress event
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProgressStatus {
    /// Bytes are being transferred
    Downloading,
    /// One artifact was fully written (the job may still have stages left)
    Finished,
    /// Anything else (errors, post-processing stages, ...)
    Other(String),
    /// No status given
    #[default]
    Unknown,
}

impl From<String> for ProgressStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "downloading" => ProgressStatus::Downloading,
            "finished" => ProgressStatus::Finished,
            "" => ProgressStatus::Unknown,
            _ => ProgressStatus::Other(status),
        }
    }
}

impl From<ProgressStatus> for String {
    fn from(status: ProgressStatus) -> Self {
        match status {
            ProgressStatus::Downloading => "downloading".to_string(),
            ProgressStatus::Finished => "finished".to_string(),
            ProgressStatus::Other(other) => other,
            ProgressStatus::Unknown => String::new(),
        }
    }
}

/// One progress notification from a retrieval operation
///
/// Deserializes from an open JSON mapping: unknown keys are ignored, and
/// byte counts that are missing, negative or not numbers become `None`.
/// Key aliases accept the field names emitted by common downloader hooks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage of the transfer
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: ProgressStatus,
    /// Bytes transferred so far
    #[serde(
        default,
        alias = "downloaded_bytes",
        deserialize_with = "lenient_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub transferred_bytes: Option<u64>,
    /// Exact total size, if known
    #[serde(
        default,
        deserialize_with = "lenient_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_bytes: Option<u64>,
    /// Estimated total size, used when the exact size is unknown
    #[serde(
        default,
        deserialize_with = "lenient_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_bytes_estimate: Option<u64>,
    /// Incomplete temporary file being written
    #[serde(default, alias = "tmpfilename", skip_serializing_if = "Option::is_none")]
    pub temp_path: Option<PathBuf>,
    /// Final file name of the artifact
    #[serde(default, alias = "filename", skip_serializing_if = "Option::is_none")]
    pub final_path: Option<PathBuf>,
}

impl ProgressEvent {
    /// Byte progress of a running transfer
    pub fn downloading(transferred_bytes: u64, total_bytes: u64) -> Self {
        Self {
            status: ProgressStatus::Downloading,
            transferred_bytes: Some(transferred_bytes),
            total_bytes: Some(total_bytes),
            ..Default::default()
        }
    }

    /// Byte progress against an estimated total
    pub fn downloading_estimated(transferred_bytes: u64, total_bytes_estimate: u64) -> Self {
        Self {
            status: ProgressStatus::Downloading,
            transferred_bytes: Some(transferred_bytes),
            total_bytes_estimate: Some(total_bytes_estimate),
            ..Default::default()
        }
    }

    /// One artifact finished writing to `final_path`
    pub fn finished(final_path: impl Into<PathBuf>) -> Self {
        Self {
            status: ProgressStatus::Finished,
            final_path: Some(final_path.into()),
            ..Default::default()
        }
    }

    /// Attach the temporary file being written
    pub fn with_temp_path(mut self, temp_path: impl Into<PathBuf>) -> Self {
        self.temp_path = Some(temp_path.into());
        self
    }

    /// Parse an event from a JSON value
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ProgressStatus, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => ProgressStatus::from(s),
        _ => ProgressStatus::Unknown,
    })
}

fn lenient_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64().or_else(|| {
            v.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        })
    }))
}

/// Percentage of a determinate byte-progress event
///
/// Returns `None` unless the event is `downloading` with a transferred
/// count and a positive total (`total_bytes`, falling back to
/// `total_bytes_estimate`). The result is clamped to [0, 100].
pub fn extract_progress_percent(event: &ProgressEvent) -> Option<f64> {
    if event.status != ProgressStatus::Downloading {
        return None;
    }
    let transferred = event.transferred_bytes?;
    let total = event
        .total_bytes
        .filter(|t| *t > 0)
        .or(event.total_bytes_estimate.filter(|t| *t > 0))?;

    let percent = transferred as f64 / total as f64 * 100.0;
    Some(percent.clamp(0.0, 100.0))
}

/// Progress callback bound to one task
pub struct ProgressMonitor {
    id: TaskId,
    registry: Arc<TaskRegistry>,
    cancel: CancellationToken,
    remover: Arc<dyn FileRemover>,
    event_tx: broadcast::Sender<Event>,
    partial_suffix: String,
}

impl std::fmt::Debug for ProgressMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressMonitor")
            .field("id", &self.id)
            .field("canceled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ProgressMonitor {
    pub(crate) fn new(
        id: TaskId,
        registry: Arc<TaskRegistry>,
        cancel: CancellationToken,
        remover: Arc<dyn FileRemover>,
        event_tx: broadcast::Sender<Event>,
        partial_suffix: impl Into<String>,
    ) -> Self {
        Self {
            id,
            registry,
            cancel,
            remover,
            event_tx,
            partial_suffix: partial_suffix.into(),
        }
    }

    /// Task this monitor reports for
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Whether cancellation was requested
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with [`RetrievalError::Canceled`] if cancellation was requested
    ///
    /// Useful before starting expensive work that does not report progress.
    pub fn check_canceled(&self) -> Result<(), RetrievalError> {
        if self.is_canceled() {
            Err(RetrievalError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Handle one progress event
    ///
    /// Returns `Err(RetrievalError::Canceled)` once cancellation was
    /// requested, after deleting any partial file the event points at. The
    /// retrieval operation must propagate that error unchanged.
    pub fn report(&self, event: &ProgressEvent) -> Result<(), RetrievalError> {
        if self.is_canceled() {
            self.cleanup_partial_files(event);
            tracing::debug!(task_id = %self.id, "cancellation observed in progress callback");
            return Err(RetrievalError::Canceled);
        }

        if let Some(percent) = extract_progress_percent(event) {
            self.set_progress(percent.min(IN_FLIGHT_PROGRESS_CAP));
            return Ok(());
        }

        if event.status == ProgressStatus::Finished {
            if let Some(path) = &event.final_path {
                self.record_side_file(path.clone());
            }
            self.set_progress(IN_FLIGHT_PROGRESS_CAP);
        }
        Ok(())
    }

    /// Remember a file produced before the final result is known
    ///
    /// Side files are candidates for salvage if the operation later fails.
    pub fn record_side_file(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        if let Err(e) = self
            .registry
            .apply_update(&self.id, TaskUpdate::new().side_file(path.clone()))
        {
            tracing::debug!(task_id = %self.id, ?path, error = %e, "side file not recorded");
        }
    }

    fn set_progress(&self, percent: f64) {
        match self
            .registry
            .apply_update(&self.id, TaskUpdate::new().progress(percent))
        {
            Ok(info) => {
                tracing::trace!(task_id = %self.id, percent = info.progress, "progress");
                self.event_tx
                    .send(Event::Progress {
                        id: self.id,
                        percent: info.progress,
                    })
                    .ok();
            }
            Err(e) => {
                tracing::debug!(task_id = %self.id, error = %e, "progress update ignored");
            }
        }
    }

    fn cleanup_partial_files(&self, event: &ProgressEvent) {
        let paths = [event.temp_path.as_deref(), event.final_path.as_deref()];
        for path in paths.into_iter().flatten() {
            if !is_partial(path, &self.partial_suffix) {
                continue;
            }
            self.remove_quietly(path);
        }
    }

    fn remove_quietly(&self, path: &Path) {
        if let Err(e) = self.remover.remove(path) {
            tracing::debug!(task_id = %self.id, ?path, error = %e, "partial file cleanup failed");
        }
    }
}
