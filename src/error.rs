//! Error types for media-dl
//!
//! This module provides the error handling for the library:
//! - [`Error`] - the crate-level error returned by fallible public operations
//! - [`ValidationError`] - rejected download requests (no task is created)
//! - [`RetrievalError`] - the tagged outcome a retrieval operation fails with
//!
//! Failures that happen inside a running task never surface as [`Error`].
//! They are recorded on the task itself (`failed` / `canceled` status plus
//! an `error` or `warning` string) so callers only ever see status snapshots.

use crate::types::{Status, TaskId};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Download request rejected before a task was created
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No task with this identifier exists
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Update would move a task backwards or out of a terminal state
    #[error("task {id}: invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The task whose update was rejected
        id: TaskId,
        /// Status the task is currently in
        from: Status,
        /// Status the update asked for (equal to `from` when a terminal task was touched)
        to: Status,
    },

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Refused to touch a path outside the allowed directories
    #[error("path is outside allowed directories: {}", .0.display())]
    PathNotAllowed(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors produced while normalizing a download request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The requested media kind is not one of the supported kinds
    #[error("unsupported media_type '{kind}'. Expected one of: video, audio")]
    UnsupportedMediaKind {
        /// The media kind as supplied by the caller
        kind: String,
    },
}

/// Outcome of a retrieval operation that did not produce a result
///
/// `Canceled` is raised by [`ProgressMonitor::report`](crate::ProgressMonitor::report)
/// once cancellation was requested. Retrieval operations must propagate it
/// (typically with `?`) instead of mapping it into `Failed`, so the runner
/// can record the task as `canceled` rather than `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// Cooperative cancellation was observed
    #[error("Canceled by user.")]
    Canceled,

    /// Any other retrieval failure
    #[error("{0}")]
    Failed(String),
}

impl RetrievalError {
    /// Create a `Failed` error from anything displayable
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }

    /// Whether this is the cooperative cancellation signal
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl From<std::io::Error> for RetrievalError {
    fn from(e: std::io::Error) -> Self {
        Self::Failed(e.to_string())
    }
}
