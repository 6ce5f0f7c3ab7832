#![forbid(unsafe_code)]

//! Error kinds shared by every stage of the audio pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while resolving, downloading, trimming or
/// tagging a single video.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed URL or identifier given on the command line.
    #[error("invalid reference `{input}`: {reason}")]
    InvalidReference { input: String, reason: String },

    /// The video was removed or never existed.
    #[error("video not found: {0}")]
    NotFound(String),

    /// The video exists but cannot be fetched (private, region blocked,
    /// age gated, no usable audio stream).
    #[error("video unavailable: {0}")]
    Unavailable(String),

    /// Network hiccup worth retrying.
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    /// Tags could not be loaded or saved. Never fatal for an item.
    #[error("cannot write tags to {}: {reason}", path.display())]
    TagWrite { path: PathBuf, reason: String },

    /// Directory creation, rename or scratch file failure.
    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An external program failed for a reason that retrying won't fix.
    #[error("{program} failed: {reason}")]
    Tool { program: String, reason: String },

    /// A host answered with something we could not decode.
    #[error("unreadable response from {program}: {reason}")]
    Parse { program: String, reason: String },
}

impl PipelineError {
    pub fn invalid_reference(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn tool(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Tool {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Only network level failures are retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_transient() {
        assert!(PipelineError::TransientNetwork("reset".into()).is_transient());
        assert!(!PipelineError::NotFound("abc".into()).is_transient());
        assert!(!PipelineError::tool("ffmpeg", "exit status 1").is_transient());
        assert!(
            !PipelineError::filesystem("/tmp/x", io::Error::other("boom")).is_transient()
        );
    }

    #[test]
    fn messages_name_the_subject() {
        let err = PipelineError::invalid_reference("https://x", "missing `list` parameter");
        assert_eq!(
            err.to_string(),
            "invalid reference `https://x`: missing `list` parameter"
        );
        let err = PipelineError::TagWrite {
            path: PathBuf::from("out/song.m4a"),
            reason: "bad atom".into(),
        };
        assert!(err.to_string().contains("out/song.m4a"));
    }
}
