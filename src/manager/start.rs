//! Task creation and the per-task worker.

use crate::error::{Error, Result, RetrievalError};
use crate::params::{normalize_request, preferred_extension};
use crate::progress::ProgressMonitor;
use crate::registry::TaskUpdate;
use crate::selection::{choose_primary_file, is_partial};
use crate::types::{
    Artifact, DownloadRequest, Event, StartedTask, Status, TaskId, TaskInfo, TaskParams,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::TaskManager;

/// Warning recorded when a retrieval succeeds without any usable file
const NO_OUTPUT_WARNING: &str = "no output file was produced";

impl TaskManager {
    /// Start a background download
    ///
    /// Validates and normalizes the request, records a `pending` task and
    /// spawns exactly one worker for it, then returns immediately. The
    /// worker is never retried or restarted.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the media kind is not supported; no task is created
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(manager: TaskManager) -> Result<()> {
    /// let started = manager
    ///     .start_download(DownloadRequest::new("https://example.com/watch?v=1").media_type("audio"))
    ///     .await?;
    /// println!("poll {} every {}s", started.id, started.recommended_poll_secs);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start_download(&self, request: DownloadRequest) -> Result<StartedTask> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let params = normalize_request(&request, &self.config).inspect_err(|e| {
            tracing::warn!(url = %request.url, error = %e, "Rejected download request");
        })?;

        let id = self.registry.create(params.clone());
        tracing::info!(
            task_id = %id,
            url = %params.url,
            media_kind = %params.media_kind,
            quality = %params.quality,
            "Task queued"
        );
        self.event_tx
            .send(Event::Queued {
                id,
                url: params.url.clone(),
                media_kind: params.media_kind,
            })
            .ok();

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_task(id).await;
        });

        Ok(StartedTask {
            id,
            status: Status::Pending,
            url: params.url,
            recommended_poll_secs: self.config.recommended_poll_secs,
        })
    }

    /// Drive one task from `pending` to a terminal state
    ///
    /// Every outcome, including a panic inside the retrieval operation, ends
    /// up as a terminal status on the task; nothing propagates further.
    pub(crate) async fn run_task(&self, id: TaskId) {
        let Some((params, cancel)) = self.registry.begin(&id) else {
            tracing::debug!(task_id = %id, "Task no longer pending, worker exiting");
            return;
        };

        tracing::info!(task_id = %id, retrieval = self.retrieval.name(), "Task started");
        self.event_tx.send(Event::Started { id }).ok();

        let monitor = ProgressMonitor::new(
            id,
            self.registry.clone(),
            cancel.clone(),
            self.remover.clone(),
            self.event_tx.clone(),
            self.config.partial_suffix.clone(),
        );

        let outcome = match AssertUnwindSafe(self.retrieval.retrieve(&params, &monitor))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(task_id = %id, panic = %message, "Retrieval operation panicked");
                Err(RetrievalError::Failed(format!(
                    "retrieval operation panicked: {}",
                    message
                )))
            }
        };

        let update = self.classify(&id, &params, &cancel, outcome).await;
        match self.registry.finish(&id, update) {
            Ok(info) => {
                self.emit_terminal(&info);
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "Terminal update rejected");
            }
        }
    }

    /// Turn a retrieval outcome into the terminal update for the task
    async fn classify(
        &self,
        id: &TaskId,
        params: &TaskParams,
        cancel: &CancellationToken,
        outcome: std::result::Result<Option<Artifact>, RetrievalError>,
    ) -> TaskUpdate {
        match outcome {
            Ok(artifact) if cancel.is_cancelled() => {
                tracing::info!(
                    task_id = %id,
                    discarded = ?artifact.map(|a| a.path),
                    "Task canceled before its result was recorded"
                );
                TaskUpdate::new()
                    .status(Status::Canceled)
                    .error(RetrievalError::Canceled.to_string())
            }
            Ok(artifact) => {
                let artifact = match self.usable(id, artifact).await {
                    Some(artifact) => Some(artifact),
                    None => self.salvage(id, params).await,
                };
                let update = TaskUpdate::new().status(Status::Completed).progress(100.0);
                match artifact {
                    Some(artifact) => {
                        let artifact = with_known_size(artifact).await;
                        tracing::info!(task_id = %id, path = ?artifact.path, size = ?artifact.size, "Task completed");
                        update.result(artifact)
                    }
                    None => {
                        tracing::warn!(task_id = %id, "Task completed without an output file");
                        update.warning(NO_OUTPUT_WARNING)
                    }
                }
            }
            Err(RetrievalError::Canceled) => {
                tracing::info!(task_id = %id, "Task canceled");
                TaskUpdate::new()
                    .status(Status::Canceled)
                    .error(RetrievalError::Canceled.to_string())
            }
            Err(RetrievalError::Failed(message)) => match self.salvage(id, params).await {
                Some(artifact) => {
                    let artifact = with_known_size(artifact).await;
                    tracing::warn!(
                        task_id = %id,
                        path = ?artifact.path,
                        error = %message,
                        "Retrieval failed, salvaged a partial result"
                    );
                    TaskUpdate::new()
                        .status(Status::Completed)
                        .progress(100.0)
                        .result(artifact)
                        .warning(message)
                }
                None => {
                    tracing::warn!(task_id = %id, error = %message, "Task failed");
                    TaskUpdate::new().status(Status::Failed).error(message)
                }
            },
        }
    }

    /// Keep a returned artifact only if it is a finished regular file
    async fn usable(&self, id: &TaskId, artifact: Option<Artifact>) -> Option<Artifact> {
        let artifact = artifact?;
        if is_partial(&artifact.path, &self.config.partial_suffix) {
            tracing::warn!(task_id = %id, path = ?artifact.path, "Returned result is still partial, ignoring it");
            return None;
        }
        match tokio::fs::metadata(&artifact.path).await {
            Ok(meta) if meta.is_file() => Some(artifact),
            _ => {
                tracing::warn!(task_id = %id, path = ?artifact.path, "Returned result is not a file, ignoring it");
                None
            }
        }
    }

    /// Pick the best side file recorded for a task, if any is usable
    async fn salvage(&self, id: &TaskId, params: &TaskParams) -> Option<Artifact> {
        let candidates = self.registry.side_files(id);
        if candidates.is_empty() {
            return None;
        }

        let preferred = preferred_extension(params, &self.config);
        let partial_suffix = self.config.partial_suffix.clone();
        let chosen = tokio::task::spawn_blocking(move || {
            choose_primary_file(&candidates, &preferred, &partial_suffix)
        })
        .await;

        match chosen {
            Ok(path) => path.map(Artifact::new),
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "Result selection did not finish");
                None
            }
        }
    }

    fn emit_terminal(&self, info: &TaskInfo) {
        let event = match info.status {
            Status::Completed => Event::Completed {
                id: info.id,
                path: info.result.as_ref().map(|r| r.path.clone()),
                warning: info.warning.clone(),
            },
            Status::Failed => Event::Failed {
                id: info.id,
                error: info.error.clone().unwrap_or_default(),
            },
            Status::Canceled => Event::Canceled { id: info.id },
            Status::Pending | Status::Running => return,
        };
        self.event_tx.send(event).ok();
    }
}

/// Fill in the size of an artifact from the filesystem when it is unknown
async fn with_known_size(mut artifact: Artifact) -> Artifact {
    if artifact.size.is_none() {
        artifact.size = tokio::fs::metadata(&artifact.path)
            .await
            .ok()
            .map(|meta| meta.len());
    }
    artifact
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
