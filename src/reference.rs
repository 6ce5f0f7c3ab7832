#![forbid(unsafe_code)]

//! Turns whatever the user typed (full URL or bare id) into canonical
//! video, playlist and channel identifiers.

use url::Url;

use crate::error::PipelineError;

const YOUTUBE_BASE: &str = "https://www.youtube.com";

/// Channel tabs that may trail a channel URL and are not part of its id.
const CHANNEL_TABS: &[&str] = &["videos", "shorts", "streams", "featured", "playlists"];

/// One source video as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    /// Platform id when recognisable, otherwise the input URL itself.
    pub id: String,
    /// Original input, used as the error log key.
    pub source: String,
}

impl VideoRef {
    pub fn resolve(input: &str) -> Result<Self, PipelineError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::invalid_reference(input, "empty video reference"));
        }
        let id = if is_url(trimmed) {
            let url = parse_url(trimmed)?;
            video_id_from_url(&url).unwrap_or_else(|| trimmed.to_string())
        } else {
            trimmed.to_string()
        };
        Ok(Self {
            id,
            source: trimmed.to_string(),
        })
    }

    /// What the media host is asked to resolve: the URL as given, or the
    /// canonical watch URL for bare ids.
    pub fn locator(&self) -> String {
        if is_url(&self.source) {
            self.source.clone()
        } else {
            watch_url(&self.id)
        }
    }
}

/// Extracts the `list` parameter of a playlist URL, or returns a bare id.
pub fn resolve_playlist_id(input: &str) -> Result<String, PipelineError> {
    let trimmed = input.trim();
    if !is_url(trimmed) {
        return non_empty(input, trimmed);
    }
    let url = parse_url(trimmed)?;
    url.query_pairs()
        .find(|(key, value)| key == "list" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| PipelineError::invalid_reference(input, "missing `list` query parameter"))
}

/// Takes the last meaningful path segment of a channel URL, or returns a
/// bare id.
pub fn resolve_channel_id(input: &str) -> Result<String, PipelineError> {
    let trimmed = input.trim();
    if !is_url(trimmed) {
        return non_empty(input, trimmed);
    }
    let url = parse_url(trimmed)?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
        .unwrap_or_default();

    let mut candidates = segments.iter().rev();
    let mut last = candidates.next();
    if let Some(segment) = last
        && CHANNEL_TABS.contains(segment)
        && segments.len() > 1
    {
        last = candidates.next();
    }
    last.map(|segment| segment.to_string())
        .ok_or_else(|| PipelineError::invalid_reference(input, "missing channel path segment"))
}

pub fn watch_url(video_id: &str) -> String {
    format!("{YOUTUBE_BASE}/watch?v={video_id}")
}

pub fn playlist_url(list_id: &str) -> String {
    format!("{YOUTUBE_BASE}/playlist?list={list_id}")
}

/// Upload listing of a channel given its `UC…` id, `@handle` or legacy
/// custom name.
pub fn channel_videos_url(channel_id: &str) -> String {
    if channel_id.starts_with('@') {
        format!("{YOUTUBE_BASE}/{channel_id}/videos")
    } else if channel_id.starts_with("UC") && channel_id.len() == 24 {
        format!("{YOUTUBE_BASE}/channel/{channel_id}/videos")
    } else {
        format!("{YOUTUBE_BASE}/c/{channel_id}/videos")
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("https://") || input.starts_with("http://")
}

fn parse_url(input: &str) -> Result<Url, PipelineError> {
    Url::parse(input).map_err(|err| PipelineError::invalid_reference(input, err.to_string()))
}

fn non_empty(input: &str, trimmed: &str) -> Result<String, PipelineError> {
    if trimmed.is_empty() {
        Err(PipelineError::invalid_reference(input, "empty identifier"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn video_id_from_url(url: &Url) -> Option<String> {
    if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "v")
        && !value.is_empty()
    {
        return Some(value.into_owned());
    }

    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    if url.host_str() == Some("youtu.be") {
        return segments.first().map(|id| id.to_string());
    }

    match segments.as_slice() {
        ["shorts" | "embed" | "live", id, ..] => Some(id.to_string()),
        _ => None,
    }
}
