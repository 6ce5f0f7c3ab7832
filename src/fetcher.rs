#![forbid(unsafe_code)]

//! Capability to resolve video metadata and download audio streams.
//!
//! Kept separate from [`VideoMetadata`] so the data can be built by hand in
//! tests while the I/O side is swapped for a mock.

use std::path::Path;

use crate::error::PipelineError;
use crate::metadata::{AudioStream, VideoMetadata};
use crate::reference::VideoRef;

pub trait MediaHost {
    /// Looks the video up. Fails with `NotFound`/`Unavailable` when it is gone
    /// or restricted and with `TransientNetwork` when the lookup may succeed
    /// later.
    fn fetch_metadata(&self, video: &VideoRef) -> Result<VideoMetadata, PipelineError>;

    /// Downloads one stream to `target`. A single attempt; retrying is the
    /// caller's business.
    fn download_audio(
        &self,
        metadata: &VideoMetadata,
        stream: &AudioStream,
        target: &Path,
    ) -> Result<(), PipelineError>;
}

/// Picks the best `audio/mp4` stream for the video.
pub fn select_audio_stream(metadata: &VideoMetadata) -> Result<&AudioStream, PipelineError> {
    metadata.best_mp4_audio().ok_or_else(|| {
        PipelineError::Unavailable(format!("{}: no mp4 audio stream offered", metadata.id))
    })
}
