//! Task manager split into focused submodules.
//!
//! The `TaskManager` struct and its methods are organized by concern:
//! - [`start`] - Request validation, task creation and the per-task worker
//! - [`control`] - Cancellation
//! - [`query`] - Status lookups, listing and bulk polling
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod lifecycle;
mod query;
mod start;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::cleanup::{FileRemover, ScopedRemover};
use crate::config::Config;
use crate::error::Result;
use crate::registry::TaskRegistry;
use crate::retrieval::RetrievalOperation;
use crate::types::Event;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::broadcast;

/// Background task manager (cloneable - all fields are Arc-wrapped)
///
/// Owns the task registry, spawns one tokio task per download and
/// reconciles each outcome into a terminal task state.
#[derive(Clone)]
pub struct TaskManager {
    /// Task state shared with the workers and their progress monitors
    pub(crate) registry: Arc<TaskRegistry>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// The embedder-supplied transfer implementation
    pub(crate) retrieval: Arc<dyn RetrievalOperation>,
    /// Deletes partial files when a task is canceled
    pub(crate) remover: Arc<dyn FileRemover>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Whether new downloads are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl TaskManager {
    /// Create a new TaskManager
    ///
    /// Validates the configuration, creates the download and temp
    /// directories, and restricts partial-file cleanup to the configured
    /// allowed directories.
    pub async fn new(config: Config, retrieval: Arc<dyn RetrievalOperation>) -> Result<Self> {
        config.validate()?;
        config.ensure_directories().await?;

        let remover = Arc::new(ScopedRemover::new(config.allowed_dirs()));
        Ok(Self::with_remover(config, retrieval, remover))
    }

    /// Create a TaskManager with a custom file remover
    ///
    /// Does not touch the filesystem.
    pub fn with_remover(
        config: Config,
        retrieval: Arc<dyn RetrievalOperation>,
        remover: Arc<dyn FileRemover>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(config.event_channel_capacity.max(1));

        tracing::debug!(
            retrieval = retrieval.name(),
            download_dir = ?config.download_dir,
            "task manager created"
        );

        Self {
            registry: Arc::new(TaskRegistry::new()),
            config: Arc::new(config),
            retrieval,
            remover,
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Subscribe to lifecycle events
    ///
    /// Slow subscribers may miss events (`RecvError::Lagged`); task state
    /// itself is always available through the query methods.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The underlying task registry
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
