#![forbid(unsafe_code)]

//! Enumeration of the videos that belong to a channel or playlist.

use crate::error::PipelineError;

/// Lazy, finite, single-use stream of video ids.
pub type VideoIds<'a> = Box<dyn Iterator<Item = Result<String, PipelineError>> + 'a>;

/// Lists channel and playlist contents. Every call re-queries the source;
/// nothing is cached.
pub trait Catalog {
    fn channel_videos(&self, channel_id: &str) -> Result<VideoIds<'_>, PipelineError>;

    fn playlist_videos(&self, playlist_id: &str) -> Result<VideoIds<'_>, PipelineError>;
}

/// Where the ids of a run come from, as selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Videos(Vec<String>),
    Playlist(String),
    Channel(String),
}
