//! The retrieval operation seam
//!
//! The actual transfer (extraction, download, conversion) is supplied by the
//! embedder through [`RetrievalOperation`]. The task manager only drives it
//! and observes it through the [`ProgressMonitor`].

use crate::error::RetrievalError;
use crate::progress::ProgressMonitor;
use crate::types::{Artifact, TaskParams};
use async_trait::async_trait;

/// Performs the transfer for one task
///
/// Implementations run inside the task's own tokio task, never on a
/// caller's request path. They should call
/// [`ProgressMonitor::report`] as the transfer advances and propagate its
/// [`RetrievalError::Canceled`] unchanged; cancellation is only observed
/// there. Blocking implementations should move their work to
/// `tokio::task::spawn_blocking` and report from that thread.
///
/// Returning `Ok(None)` means "finished, but I do not know which file is the
/// result"; the manager then picks one from the side files recorded through
/// the monitor.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use media_dl::{Artifact, ProgressEvent, ProgressMonitor, RetrievalError, RetrievalOperation, TaskParams};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl RetrievalOperation for Fixed {
///     async fn retrieve(
///         &self,
///         _params: &TaskParams,
///         monitor: &ProgressMonitor,
///     ) -> Result<Option<Artifact>, RetrievalError> {
///         monitor.report(&ProgressEvent::downloading(512, 1024))?;
///         monitor.report(&ProgressEvent::finished("/downloads/clip.mp4"))?;
///         Ok(Some(Artifact::with_size("/downloads/clip.mp4", 1024)))
///     }
/// }
/// ```
#[async_trait]
pub trait RetrievalOperation: Send + Sync {
    /// Run the transfer described by `params`
    async fn retrieve(
        &self,
        params: &TaskParams,
        monitor: &ProgressMonitor,
    ) -> Result<Option<Artifact>, RetrievalError>;

    /// Human-readable name for logging
    fn name(&self) -> &str {
        "retrieval"
    }
}
