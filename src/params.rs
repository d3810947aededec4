//! Request normalization
//!
//! Turns a raw [`DownloadRequest`] into validated [`TaskParams`], applying
//! the configured defaults per media kind.

use crate::config::Config;
use crate::error::ValidationError;
use crate::types::{DownloadRequest, MediaKind, TaskParams};

/// Parse a media kind; empty input means video
pub fn parse_media_kind(raw: &str) -> Result<MediaKind, ValidationError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" | "video" => Ok(MediaKind::Video),
        "audio" => Ok(MediaKind::Audio),
        _ => Err(ValidationError::UnsupportedMediaKind {
            kind: raw.trim().to_string(),
        }),
    }
}

/// Validate a request and fill in defaults
///
/// - video: empty quality becomes `default_video_quality`; the format hint
///   is kept (lowercased) when given
/// - audio: quality must be a bitrate made of ASCII digits, anything else
///   becomes `default_audio_quality`; an empty format becomes
///   `default_audio_format`
pub fn normalize_request(
    request: &DownloadRequest,
    config: &Config,
) -> Result<TaskParams, ValidationError> {
    let media_kind = parse_media_kind(&request.media_type)?;

    let mut quality = request.quality.trim().to_string();
    let mut format = request
        .format
        .as_deref()
        .map(|f| f.trim().to_ascii_lowercase())
        .filter(|f| !f.is_empty());

    match media_kind {
        MediaKind::Video => {
            if quality.is_empty() {
                quality = config.default_video_quality.clone();
            }
        }
        MediaKind::Audio => {
            if quality.is_empty() || !quality.bytes().all(|b| b.is_ascii_digit()) {
                quality = config.default_audio_quality.clone();
            }
            if format.is_none() {
                format = Some(config.default_audio_format.trim().to_ascii_lowercase());
            }
        }
    }

    Ok(TaskParams {
        url: request.url.clone(),
        media_kind,
        quality,
        format,
    })
}

/// File extension a finished task of these parameters should preferably have
pub fn preferred_extension(params: &TaskParams, config: &Config) -> String {
    match params.media_kind {
        MediaKind::Video => config.preferred_video_container.to_ascii_lowercase(),
        MediaKind::Audio => params
            .format
            .clone()
            .unwrap_or_else(|| config.default_audio_format.to_ascii_lowercase()),
    }
}
