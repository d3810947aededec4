//! # media-dl
//!
//! Background task manager for long-running media downloads.
//!
//! A caller starts a download and gets a task id back immediately. The
//! transfer itself runs in its own tokio task through an embedder-supplied
//! [`RetrievalOperation`]; the caller polls, lists, cancels or waits on
//! tasks by id while it runs.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Non-blocking** - Starting a download never waits for the transfer
//! - **Cooperative** - Cancellation is observed at the next progress report
//! - **Forgiving** - A failed transfer that left a usable file completes with a warning
//! - **Library-first** - The transfer is pluggable; no extractor is bundled
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{
//!     Artifact, Config, DownloadRequest, ProgressEvent, ProgressMonitor, RetrievalError,
//!     RetrievalOperation, TaskManager, TaskParams, WaitMode,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct MyExtractor;
//!
//! #[async_trait::async_trait]
//! impl RetrievalOperation for MyExtractor {
//!     async fn retrieve(
//!         &self,
//!         params: &TaskParams,
//!         monitor: &ProgressMonitor,
//!     ) -> Result<Option<Artifact>, RetrievalError> {
//!         monitor.report(&ProgressEvent::downloading(1024, 4096))?;
//!         // ... fetch params.url ...
//!         Ok(None)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = TaskManager::new(Config::default(), Arc::new(MyExtractor)).await?;
//!
//!     let started = manager
//!         .start_download(DownloadRequest::new("https://example.com/watch?v=1").media_type("audio"))
//!         .await?;
//!
//!     let report = manager
//!         .wait_for_downloads(&[started.id], WaitMode::All, Duration::from_secs(600))
//!         .await;
//!     println!("files: {:?}", manager.check_downloads(&[started.id]).completed_paths());
//!     assert!(!report.timed_out);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Scoped file removal for partial downloads
pub mod cleanup;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Task manager (decomposed into focused submodules)
pub mod manager;
/// Request validation and defaults
pub mod params;
/// Progress events, monitoring and cooperative cancellation
pub mod progress;
/// Task registry
pub mod registry;
/// Retrieval operation trait
pub mod retrieval;
/// Primary result file selection
pub mod selection;
/// Core types
pub mod types;

// Re-export commonly used types
pub use cleanup::{FileRemover, ScopedRemover};
pub use config::Config;
pub use error::{Error, Result, RetrievalError, ValidationError};
pub use manager::TaskManager;
pub use params::normalize_request;
pub use progress::{ProgressEvent, ProgressMonitor, ProgressStatus, extract_progress_percent};
pub use registry::{TaskRegistry, TaskUpdate};
pub use retrieval::RetrievalOperation;
pub use selection::choose_primary_file;
pub use types::{
    Artifact, CancelOutcome, CancelResponse, CheckReport, CheckedTask, DownloadRequest, Event,
    MediaKind, StartedTask, Status, TaskId, TaskInfo, TaskList, TaskParams, WaitMode, WaitReport,
};

/// Run the manager until a shutdown signal arrives
///
/// Waits for SIGTERM or SIGINT (Ctrl+C on non-Unix platforms), then calls
/// [`TaskManager::shutdown`].
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, RetrievalOperation, TaskManager, run_with_shutdown};
/// use std::sync::Arc;
///
/// # async fn example(retrieval: Arc<dyn RetrievalOperation>) -> Result<(), Box<dyn std::error::Error>> {
/// let manager = TaskManager::new(Config::from_env()?, retrieval).await?;
///
/// // Run with automatic signal handling
/// run_with_shutdown(manager).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(manager: TaskManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
