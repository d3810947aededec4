//! Shared test helpers for creating TaskManager instances and fake retrievals.

use crate::config::Config;
use crate::error::RetrievalError;
use crate::manager::TaskManager;
use crate::progress::{ProgressEvent, ProgressMonitor};
use crate::retrieval::RetrievalOperation;
use crate::types::{Artifact, TaskId, TaskInfo, TaskParams, WaitMode};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::Notify;

/// Helper to create a TaskManager whose directories live in a temp dir.
/// Returns the manager and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager(
    retrieval: Arc<dyn RetrievalOperation>,
) -> (TaskManager, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let config = Config {
        download_dir: temp_dir.path().join("downloads"),
        temp_dir: temp_dir.path().join("temp"),
        shutdown_timeout: Duration::from_secs(2),
        ..Default::default()
    };

    let manager = TaskManager::new(config, retrieval).await.unwrap();
    (manager, temp_dir)
}

/// Wait (bounded) until a task reaches a terminal state and return it
pub(crate) async fn wait_terminal(manager: &TaskManager, id: TaskId) -> TaskInfo {
    let report = manager
        .wait_for_downloads(&[id], WaitMode::All, Duration::from_secs(5))
        .await;
    assert!(!report.timed_out, "task {} did not finish in time", id);
    manager.get_status(&id).unwrap()
}

/// Writes a 10-byte file into `output_dir` and returns it
pub(crate) struct InstantRetrieval {
    pub(crate) output_dir: PathBuf,
    pub(crate) file_name: String,
    pub(crate) calls: AtomicUsize,
    pub(crate) seen: std::sync::Mutex<Vec<TaskParams>>,
}

impl InstantRetrieval {
    pub(crate) fn new(output_dir: impl Into<PathBuf>, file_name: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_name: file_name.to_string(),
            calls: AtomicUsize::new(0),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RetrievalOperation for InstantRetrieval {
    async fn retrieve(
        &self,
        params: &TaskParams,
        monitor: &ProgressMonitor,
    ) -> Result<Option<Artifact>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(params.clone());

        let path = self.output_dir.join(&self.file_name);
        tokio::fs::write(&path, b"0123456789").await?;

        monitor.report(&ProgressEvent::downloading(10, 10))?;
        monitor.report(&ProgressEvent::finished(&path))?;
        Ok(Some(Artifact::new(path)))
    }

    fn name(&self) -> &str {
        "instant"
    }
}

/// Reports progress forever until canceled
pub(crate) struct LoopingRetrieval {
    pub(crate) started: Arc<Notify>,
    pub(crate) temp_path: Option<PathBuf>,
}

impl LoopingRetrieval {
    pub(crate) fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            temp_path: None,
        }
    }
}

#[async_trait]
impl RetrievalOperation for LoopingRetrieval {
    async fn retrieve(
        &self,
        _params: &TaskParams,
        monitor: &ProgressMonitor,
    ) -> Result<Option<Artifact>, RetrievalError> {
        let mut transferred = 0u64;
        let mut first = true;
        loop {
            let mut event = ProgressEvent::downloading(transferred % 100, 100);
            if let Some(path) = &self.temp_path {
                event = event.with_temp_path(path);
            }
            monitor.report(&event)?;
            if first {
                self.started.notify_one();
                first = false;
            }
            transferred += 7;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Reports a little progress, records a side file, then fails
pub(crate) struct FailingRetrieval {
    pub(crate) side_file: Option<PathBuf>,
    pub(crate) message: String,
}

#[async_trait]
impl RetrievalOperation for FailingRetrieval {
    async fn retrieve(
        &self,
        _params: &TaskParams,
        monitor: &ProgressMonitor,
    ) -> Result<Option<Artifact>, RetrievalError> {
        monitor.report(&ProgressEvent::downloading(50, 200))?;
        if let Some(path) = &self.side_file {
            monitor.report(&ProgressEvent::finished(path))?;
        }
        Err(RetrievalError::failed(&self.message))
    }
}

/// Panics inside the operation
pub(crate) struct PanickingRetrieval;

#[async_trait]
impl RetrievalOperation for PanickingRetrieval {
    async fn retrieve(
        &self,
        _params: &TaskParams,
        _monitor: &ProgressMonitor,
    ) -> Result<Option<Artifact>, RetrievalError> {
        panic!("extractor exploded");
    }
}

/// Optionally reports progress, then waits for `release` without reporting
///
/// Returns `result` once released. Used to hold a task in `running`.
pub(crate) struct GatedRetrieval {
    pub(crate) started: Arc<Notify>,
    pub(crate) release: Arc<Notify>,
    pub(crate) progress: Option<ProgressEvent>,
    pub(crate) result: Option<PathBuf>,
}

impl GatedRetrieval {
    pub(crate) fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            progress: None,
            result: None,
        }
    }
}

#[async_trait]
impl RetrievalOperation for GatedRetrieval {
    async fn retrieve(
        &self,
        _params: &TaskParams,
        monitor: &ProgressMonitor,
    ) -> Result<Option<Artifact>, RetrievalError> {
        if let Some(event) = &self.progress {
            monitor.report(event)?;
        }
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.result.clone().map(Artifact::new))
    }
}
