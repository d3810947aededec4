//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use uuid::Uuid;

/// Opaque unique identifier for a download task
///
/// Rendered as 32 lowercase hex digits. Identifiers are random (UUID v4)
/// and never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Task status
///
/// `Pending` and `Running` are the only non-terminal states. A task never
/// leaves a terminal state once it reached one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created, its worker has not started the retrieval yet
    Pending,
    /// Retrieval operation in flight
    Running,
    /// Finished with a result (possibly degraded, see `warning`)
    Completed,
    /// Finished without a usable result
    Failed,
    /// Stopped by a cancellation request
    Canceled,
}

impl Status {
    /// All statuses in state-machine order
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::Running,
        Status::Completed,
        Status::Failed,
        Status::Canceled,
    ];

    /// Lowercase name used on the wire and for filtering
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Canceled => "canceled",
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Canceled)
    }

    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// Staying in the same non-terminal state is allowed so that partial
    /// updates can repeat the current status harmlessly.
    pub fn can_transition_to(&self, next: Status) -> bool {
        match (self, next) {
            (Status::Pending, Status::Pending) => true,
            (Status::Pending, Status::Running) => true,
            (Status::Pending, Status::Canceled) => true,
            (Status::Running, Status::Running) => true,
            (Status::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    /// Case-insensitive parse; surrounding whitespace is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

/// Kind of media a task retrieves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video (merged audio and video streams where possible)
    Video,
    /// Audio only, optionally converted to a target format
    Audio,
}

impl MediaKind {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw download request as received from a caller
///
/// Fields are normalized and defaulted by
/// [`normalize_request`](crate::params::normalize_request) before a task is
/// created.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source locator
    pub url: String,
    /// Requested media kind ("video" or "audio"; empty means video)
    #[serde(default)]
    pub media_type: String,
    /// Requested quality ("best", "720p", "192", ...); empty means default
    #[serde(default)]
    pub quality: String,
    /// Optional target format hint (e.g. "mp3" for audio)
    #[serde(default)]
    pub format: Option<String>,
}

impl DownloadRequest {
    /// Create a request for the given URL with every other field defaulted
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the media kind
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Set the quality
    pub fn quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    /// Set the format hint
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Validated, immutable parameters of a task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Source locator
    pub url: String,
    /// Media kind
    pub media_kind: MediaKind,
    /// Normalized quality
    pub quality: String,
    /// Normalized format hint (always set for audio)
    pub format: Option<String>,
}

/// A produced file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Path of the file
    pub path: PathBuf,
    /// Size in bytes, if known
    pub size: Option<u64>,
}

impl Artifact {
    /// Create an artifact with an unknown size
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
        }
    }

    /// Create an artifact with a known size
    pub fn with_size(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size: Some(size),
        }
    }
}

/// Point-in-time snapshot of a task, as returned to callers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task identifier
    pub id: TaskId,
    /// Source locator
    pub url: String,
    /// Media kind
    pub media_kind: MediaKind,
    /// Normalized quality
    pub quality: String,
    /// Normalized format hint
    pub format: Option<String>,
    /// Current status
    pub status: Status,
    /// Whether `status` is terminal
    pub is_done: bool,
    /// Completion percentage in [0, 100]
    pub progress: f64,
    /// Produced file, once a terminal state with a usable file is reached
    pub result: Option<Artifact>,
    /// Failure or cancellation message
    pub error: Option<String>,
    /// Degraded-success message
    pub warning: Option<String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task reached its terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

/// Response to a successful `start_download`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedTask {
    /// Identifier to poll or cancel with
    pub id: TaskId,
    /// Always `pending` at the time of the response
    pub status: Status,
    /// Source locator, echoed back
    pub url: String,
    /// Suggested interval between status polls
    pub recommended_poll_secs: u64,
}

/// What a cancellation request did
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    /// No task with this identifier exists
    NotFound,
    /// The cancellation signal was set; the worker stops at its next progress report
    CancelRequested,
    /// The task had not started yet and was canceled immediately
    Canceled,
    /// The task had already finished; nothing changed
    AlreadyFinished {
        /// The terminal status the task is in
        status: Status,
    },
}

impl CancelOutcome {
    /// Status string reported to callers ("not_found", "cancel_requested", or a status name)
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelOutcome::NotFound => "not_found",
            CancelOutcome::CancelRequested => "cancel_requested",
            CancelOutcome::Canceled => Status::Canceled.as_str(),
            CancelOutcome::AlreadyFinished { status } => status.as_str(),
        }
    }
}

/// Response to `cancel`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Task the request was for
    pub id: TaskId,
    /// What happened
    #[serde(flatten)]
    pub outcome: CancelOutcome,
}

/// Listing of tasks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    /// Matching tasks, newest first
    pub tasks: Vec<TaskInfo>,
    /// Number of matching tasks
    pub total: usize,
}

/// A task that no longer needs polling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckedTask {
    /// The task reached a terminal state
    Finished(TaskInfo),
    /// The identifier is unknown
    NotFound {
        /// The unknown identifier
        id: TaskId,
    },
}

impl CheckedTask {
    /// Identifier of the checked task
    pub fn id(&self) -> TaskId {
        match self {
            CheckedTask::Finished(info) => info.id,
            CheckedTask::NotFound { id } => *id,
        }
    }

    /// Terminal status, or `None` for an unknown identifier
    pub fn status(&self) -> Option<Status> {
        match self {
            CheckedTask::Finished(info) => Some(info.status),
            CheckedTask::NotFound { .. } => None,
        }
    }
}

/// Non-blocking bulk poll result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Finished (or unknown) tasks, in request order
    pub completed: Vec<CheckedTask>,
    /// Tasks still pending or running, in request order
    pub pending: Vec<TaskId>,
    /// Whether nothing is left pending
    pub all_done: bool,
}

impl CheckReport {
    /// Paths of the files produced by the finished tasks
    pub fn completed_paths(&self) -> Vec<PathBuf> {
        self.completed
            .iter()
            .filter_map(|task| match task {
                CheckedTask::Finished(info) => info.result.as_ref().map(|r| r.path.clone()),
                CheckedTask::NotFound { .. } => None,
            })
            .collect()
    }
}

/// When `wait_for_downloads` should return
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    /// As soon as at least one task is finished
    Any,
    /// Once every task is finished
    #[default]
    All,
}

impl std::str::FromStr for WaitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(WaitMode::Any),
            "all" => Ok(WaitMode::All),
            other => Err(format!("unknown wait mode '{}'", other)),
        }
    }
}

/// Blocking bulk poll result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaitReport {
    /// Finished (or unknown) tasks, in request order
    pub completed: Vec<CheckedTask>,
    /// Tasks still pending or running, in request order
    pub pending: Vec<TaskId>,
    /// Whether the timeout elapsed before the wait criterion was met
    pub timed_out: bool,
}

/// Lifecycle event broadcast to subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task created
    Queued {
        /// Task ID
        id: TaskId,
        /// Source locator
        url: String,
        /// Media kind
        media_kind: MediaKind,
    },

    /// Worker started the retrieval operation
    Started {
        /// Task ID
        id: TaskId,
    },

    /// Progress update (never 100 before completion)
    Progress {
        /// Task ID
        id: TaskId,
        /// Completion percentage
        percent: f64,
    },

    /// Task completed
    Completed {
        /// Task ID
        id: TaskId,
        /// Produced file, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        /// Set when the result was salvaged or degraded
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },

    /// Task failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Error message
        error: String,
    },

    /// Task canceled
    Canceled {
        /// Task ID
        id: TaskId,
    },

    /// Manager is shutting down
    Shutdown,
}
