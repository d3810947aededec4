//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables read by [`Config::from_env`]
pub const ENV_PREFIX: &str = "MEDIA_DL_";

/// Main configuration for [`TaskManager`](crate::TaskManager)
///
/// Every field has a sensible default, so `Config::default()` works out of
/// the box. Configuration can also be deserialized from JSON (missing
/// fields fall back to their defaults) or read from `MEDIA_DL_*`
/// environment variables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Temporary directory for intermediate files (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Additional directories cleanup is allowed to delete files in
    #[serde(default)]
    pub extra_allowed_dirs: Vec<PathBuf>,

    /// Quality used for video requests that leave it empty (default: "best")
    #[serde(default = "default_video_quality")]
    pub default_video_quality: String,

    /// Format used for audio requests that leave it empty (default: "mp3")
    #[serde(default = "default_audio_format")]
    pub default_audio_format: String,

    /// Bitrate used for audio requests without a numeric quality (default: "192")
    #[serde(default = "default_audio_quality")]
    pub default_audio_quality: String,

    /// Container preferred when salvaging video results (default: "mp4")
    #[serde(default = "default_video_container")]
    pub preferred_video_container: String,

    /// Suffix marking in-progress files (default: ".part")
    #[serde(default = "default_partial_suffix")]
    pub partial_suffix: String,

    /// Poll interval suggested to callers after a start (default: 2)
    #[serde(default = "default_poll_secs")]
    pub recommended_poll_secs: u64,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,

    /// How long shutdown waits for running tasks (default: 30s)
    #[serde(default = "default_shutdown_timeout", with = "duration_secs")]
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            temp_dir: default_temp_dir(),
            extra_allowed_dirs: Vec::new(),
            default_video_quality: default_video_quality(),
            default_audio_format: default_audio_format(),
            default_audio_quality: default_audio_quality(),
            preferred_video_container: default_video_container(),
            partial_suffix: default_partial_suffix(),
            recommended_poll_secs: default_poll_secs(),
            event_channel_capacity: default_event_capacity(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from `MEDIA_DL_*` environment variables
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!(error = %e, "Failed to load .env file");
        }

        let mut config = Self::default();

        if let Some(dir) = env_var("DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_var("TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Some(dirs) = env_var("EXTRA_ALLOWED_DIRS") {
            config.extra_allowed_dirs = std::env::split_paths(&dirs).collect();
        }
        if let Some(quality) = env_var("DEFAULT_VIDEO_QUALITY") {
            config.default_video_quality = quality;
        }
        if let Some(format) = env_var("DEFAULT_AUDIO_FORMAT") {
            config.default_audio_format = format;
        }
        if let Some(quality) = env_var("DEFAULT_AUDIO_QUALITY") {
            config.default_audio_quality = quality;
        }
        if let Some(container) = env_var("PREFERRED_VIDEO_CONTAINER") {
            config.preferred_video_container = container;
        }
        if let Some(suffix) = env_var("PARTIAL_SUFFIX") {
            config.partial_suffix = suffix;
        }
        if let Some(secs) = env_var("RECOMMENDED_POLL_SECS") {
            config.recommended_poll_secs = parse_env("RECOMMENDED_POLL_SECS", &secs)?;
        }
        if let Some(capacity) = env_var("EVENT_CHANNEL_CAPACITY") {
            config.event_channel_capacity = parse_env("EVENT_CHANNEL_CAPACITY", &capacity)?;
        }
        if let Some(secs) = env_var("SHUTDOWN_TIMEOUT_SECS") {
            config.shutdown_timeout =
                Duration::from_secs(parse_env("SHUTDOWN_TIMEOUT_SECS", &secs)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.default_audio_quality.is_empty()
            || !self.default_audio_quality.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::Config {
                message: format!(
                    "default audio quality must be a bitrate in kbps, got '{}'",
                    self.default_audio_quality
                ),
                key: Some("default_audio_quality".to_string()),
            });
        }
        if self.default_audio_format.trim().is_empty() {
            return Err(Error::Config {
                message: "default audio format must not be empty".to_string(),
                key: Some("default_audio_format".to_string()),
            });
        }
        if self.partial_suffix.is_empty() {
            return Err(Error::Config {
                message: "partial suffix must not be empty".to_string(),
                key: Some("partial_suffix".to_string()),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Config {
                message: "event channel capacity must be at least 1".to_string(),
                key: Some("event_channel_capacity".to_string()),
            });
        }
        Ok(())
    }

    /// Directories file cleanup is allowed to touch
    pub fn allowed_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.download_dir.clone(), self.temp_dir.clone()];
        dirs.extend(self.extra_allowed_dirs.iter().cloned());
        dirs
    }

    /// Create the download and temp directories if they do not exist
    pub async fn ensure_directories(&self) -> Result<()> {
        create_dir(&self.download_dir, "download").await?;
        create_dir(&self.temp_dir, "temp").await
    }
}

async fn create_dir(path: &Path, what: &str) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to create {} directory '{}': {}",
                what,
                path.display(),
                e
            ),
        ))
    })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| Error::Config {
        message: format!("invalid value '{}': {}", value, e),
        key: Some(format!("{}{}", ENV_PREFIX, name)),
    })
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_video_quality() -> String {
    "best".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "192".to_string()
}

fn default_video_container() -> String {
    "mp4".to_string()
}

fn default_partial_suffix() -> String {
    ".part".to_string()
}

fn default_poll_secs() -> u64 {
    2
}

fn default_event_capacity() -> usize {
    1000
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Serialize a `Duration` as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
