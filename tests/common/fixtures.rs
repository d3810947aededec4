//! Scripted retrieval operations and manager setup for integration tests

use async_trait::async_trait;
use media_dl::{
    Artifact, Config, ProgressEvent, ProgressMonitor, RetrievalError, RetrievalOperation,
    TaskManager, TaskParams,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// How a [`ScriptedRetrieval`] ends
#[derive(Clone, Debug)]
pub enum Ending {
    /// Rename the partial file to its final name and return it
    Finish,
    /// Rename the partial file, then fail with this message
    FailAfterWrite(String),
    /// Fail with this message while the partial file is still incomplete
    FailMidway(String),
}

/// Simulates a downloader hook: writes `<name>.part` in chunks while
/// emitting JSON progress events, then renames it
pub struct ScriptedRetrieval {
    pub output_dir: PathBuf,
    pub chunks: u64,
    pub chunk_size: u64,
    pub delay: Duration,
    pub ending: Ending,
}

impl ScriptedRetrieval {
    pub fn new(output_dir: impl Into<PathBuf>, ending: Ending) -> Self {
        Self {
            output_dir: output_dir.into(),
            chunks: 4,
            chunk_size: 256,
            delay: Duration::from_millis(5),
            ending,
        }
    }

    pub fn slow(mut self, chunks: u64, delay: Duration) -> Self {
        self.chunks = chunks;
        self.delay = delay;
        self
    }
}

#[async_trait]
impl RetrievalOperation for ScriptedRetrieval {
    async fn retrieve(
        &self,
        params: &TaskParams,
        monitor: &ProgressMonitor,
    ) -> Result<Option<Artifact>, RetrievalError> {
        let extension = params.format.clone().unwrap_or_else(|| "mp4".to_string());
        let final_path = self
            .output_dir
            .join(format!("{}.{}", monitor.task_id(), extension));
        let part_path = PathBuf::from(format!("{}.part", final_path.display()));
        let total = self.chunks * self.chunk_size;

        let mut written = Vec::new();
        for chunk in 0..self.chunks {
            if chunk == self.chunks / 2
                && let Ending::FailMidway(message) = &self.ending
            {
                return Err(RetrievalError::failed(message));
            }

            written.extend(std::iter::repeat_n(0u8, self.chunk_size as usize));
            tokio::fs::write(&part_path, &written).await?;

            let event = ProgressEvent::from_value(serde_json::json!({
                "status": "downloading",
                "downloaded_bytes": (chunk + 1) * self.chunk_size,
                "total_bytes": total,
                "tmpfilename": part_path,
                "filename": final_path,
            }))
            .map_err(RetrievalError::failed)?;
            monitor.report(&event)?;

            tokio::time::sleep(self.delay).await;
        }

        tokio::fs::rename(&part_path, &final_path).await?;
        monitor.report(&ProgressEvent::finished(&final_path))?;

        match &self.ending {
            Ending::Finish => Ok(Some(Artifact::new(final_path))),
            Ending::FailAfterWrite(message) | Ending::FailMidway(message) => {
                Err(RetrievalError::failed(message))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Create a manager rooted in a fresh temp dir
///
/// The retrieval writes into the manager's download dir, which is returned
/// alongside the temp dir guard.
pub async fn create_manager(ending: Ending) -> (TaskManager, PathBuf, TempDir) {
    create_manager_with(|dir| ScriptedRetrieval::new(dir, ending)).await
}

/// Like [`create_manager`] with a custom retrieval built from the download dir
pub async fn create_manager_with(
    build: impl FnOnce(PathBuf) -> ScriptedRetrieval,
) -> (TaskManager, PathBuf, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config {
        download_dir: temp_dir.path().join("downloads"),
        temp_dir: temp_dir.path().join("temp"),
        shutdown_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let download_dir = config.download_dir.clone();
    let retrieval = Arc::new(build(download_dir.clone()));
    let manager = TaskManager::new(config, retrieval).await.unwrap();
    (manager, download_dir, temp_dir)
}
