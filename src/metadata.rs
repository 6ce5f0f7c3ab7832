#![forbid(unsafe_code)]

//! Plain data describing a video and its audio renditions.
//!
//! Nothing in here performs I/O: the structs are filled by a
//! [`MediaHost`](crate::fetcher::MediaHost) and then only read.

use serde::{Deserialize, Serialize};

use crate::naming;

/// MIME type of the renditions we download.
pub const MP4_AUDIO: &str = "audio/mp4";

/// Description of a single downloadable audio rendition (e.g. 128k m4a).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    /// Selector understood by the host when downloading this stream.
    pub format_id: String,
    pub mime_type: String,
    pub bitrate_kbps: f64,
}

impl AudioStream {
    pub fn is_mp4_audio(&self) -> bool {
        self.mime_type == MP4_AUDIO
    }
}

/// Everything the pipeline needs to know about one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Platform identifier reported by the host.
    pub id: String,
    pub title: String,
    pub author: String,
    pub duration_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub watch_url: String,
    #[serde(default)]
    pub audio_streams: Vec<AudioStream>,
}

impl VideoMetadata {
    /// Highest bitrate `audio/mp4` stream, if any.
    pub fn best_mp4_audio(&self) -> Option<&AudioStream> {
        self.audio_streams
            .iter()
            .filter(|stream| stream.is_mp4_audio())
            .max_by(|a, b| a.bitrate_kbps.total_cmp(&b.bitrate_kbps))
    }

    pub fn display_name(&self) -> String {
        naming::display_name(&self.author, &self.title)
    }

    pub fn duration_text(&self) -> String {
        format_duration(self.duration_seconds)
    }
}

/// Renders durations as `HH:MM:SS`, or `MM:SS` when under an hour.
pub fn format_duration(duration: u64) -> String {
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(format_id: &str, mime_type: &str, bitrate_kbps: f64) -> AudioStream {
        AudioStream {
            format_id: format_id.into(),
            mime_type: mime_type.into(),
            bitrate_kbps,
        }
    }

    fn sample(streams: Vec<AudioStream>) -> VideoMetadata {
        VideoMetadata {
            id: "abc123".into(),
            title: "Live Session".into(),
            author: "Artist".into(),
            duration_seconds: 245,
            thumbnail_url: None,
            watch_url: "https://www.youtube.com/watch?v=abc123".into(),
            audio_streams: streams,
        }
    }

    #[test]
    fn best_mp4_audio_prefers_highest_bitrate() {
        let meta = sample(vec![
            stream("139", MP4_AUDIO, 48.0),
            stream("251", "audio/webm", 160.0),
            stream("140", MP4_AUDIO, 129.5),
        ]);
        assert_eq!(meta.best_mp4_audio().unwrap().format_id, "140");
    }

    #[test]
    fn best_mp4_audio_ignores_other_containers() {
        let meta = sample(vec![stream("251", "audio/webm", 160.0)]);
        assert!(meta.best_mp4_audio().is_none());
    }

    #[test]
    fn duration_text_pads_fields() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(65), "01:05");
        assert_eq!(format_duration(3600 + 2 * 60 + 3), "01:02:03");
        assert_eq!(sample(Vec::new()).duration_text(), "04:05");
    }

    #[test]
    fn display_name_delegates_to_naming_rules() {
        assert_eq!(sample(Vec::new()).display_name(), "Artist - Live Session");
    }
}
