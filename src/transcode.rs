#![forbid(unsafe_code)]

//! ffmpeg invocations: duration trimming and tag remuxing.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::PipelineError;
use crate::tools::{last_stderr_line, run_captured};

const LABEL: &str = "ffmpeg";

/// Rewrites a downloaded stream into the final audio file.
pub trait Transcoder {
    /// Re-encodes `input` into `output`, keeping exactly the first `seconds`
    /// of audio. Not retried: a failing transcode fails the same way again.
    fn trim(&self, input: &Path, output: &Path, seconds: u64) -> Result<(), PipelineError>;
}

/// Text tags and optional cover art written into an audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub cover_png: Option<&'a Path>,
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
    verbose: bool,
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            program: program.into(),
            verbose,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-y")
            .arg("-hide_banner")
            .arg("-nostdin")
            .arg("-loglevel")
            .arg(if self.verbose { "info" } else { "error" });
        command
    }

    /// Builds the trim arguments after the shared prefix.
    fn trim_args(input: &Path, output: &Path, seconds: u64) -> Vec<String> {
        vec![
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-af".to_string(),
            format!("atrim=duration={seconds}"),
            "-c:a".to_string(),
            "aac".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Builds the remux arguments: streams are copied, the cover becomes an
    /// attached picture and the tags replace any existing ones.
    fn tag_args(input: &Path, output: &Path, tags: &TagSet<'_>) -> Vec<String> {
        let mut args = vec!["-i".to_string(), input.to_string_lossy().to_string()];

        if let Some(cover) = tags.cover_png {
            args.extend([
                "-i".to_string(),
                cover.to_string_lossy().to_string(),
                "-map".to_string(),
                "0:a".to_string(),
                "-map".to_string(),
                "1:v".to_string(),
                "-disposition:v:0".to_string(),
                "attached_pic".to_string(),
            ]);
        } else {
            args.extend(["-map".to_string(), "0:a".to_string()]);
        }

        args.extend([
            "-c".to_string(),
            "copy".to_string(),
            "-metadata".to_string(),
            format!("title={}", tags.title),
            "-metadata".to_string(),
            format!("artist={}", tags.artist),
            output.to_string_lossy().to_string(),
        ]);
        args
    }

    /// Writes `tags` into a copy of `input` at `output`.
    pub fn write_tags(
        &self,
        input: &Path,
        output: &Path,
        tags: &TagSet<'_>,
    ) -> Result<(), PipelineError> {
        let mut command = self.command();
        command.args(Self::tag_args(input, output, tags));
        self.run(command, output)
    }

    fn run(&self, mut command: Command, output_path: &Path) -> Result<(), PipelineError> {
        let output = run_captured(&mut command, LABEL)?;
        if !output.status.success() {
            return Err(PipelineError::tool(
                LABEL,
                format!(
                    "{} ({}): {}",
                    output_path.display(),
                    output.status,
                    last_stderr_line(&output.stderr)
                ),
            ));
        }
        Ok(())
    }
}

impl Transcoder for Ffmpeg {
    fn trim(&self, input: &Path, output: &Path, seconds: u64) -> Result<(), PipelineError> {
        let mut command = self.command();
        command.args(Self::trim_args(input, output, seconds));
        self.run(command, output)
    }
}
