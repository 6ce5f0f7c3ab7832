#![forbid(unsafe_code)]

//! yt-dlp backed [`MediaHost`] and [`Catalog`].
//!
//! Metadata comes from `--dump-single-json`, listings from
//! `--flat-playlist --get-id` read line by line while the process runs, and
//! downloads from a `--format <id>` invocation writing straight to the
//! requested path.

use serde::Deserialize;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::debug;

use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::fetcher::MediaHost;
use crate::metadata::{AudioStream, MP4_AUDIO, VideoMetadata};
use crate::reference::{self, VideoRef};
use crate::source::{Catalog, VideoIds};
use crate::tools::{last_stderr_line, run_captured};

const LABEL: &str = "yt-dlp";

#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    socket_timeout: Duration,
    retries: u32,
    cookies: Option<PathBuf>,
    verbose: bool,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            socket_timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            retries: crate::config::DEFAULT_MAX_ATTEMPTS,
            cookies: None,
            verbose: false,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            program: config.yt_dlp.clone(),
            socket_timeout: config.timeout,
            retries: config.max_attempts,
            cookies: config.cookies.clone(),
            verbose: config.verbose,
        }
    }

    /// Base invocation shared by every call: quiet diagnostics, bounded socket
    /// reads and the cookies jar when one is configured.
    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--no-warnings")
            .arg("--socket-timeout")
            .arg(self.socket_timeout.as_secs().max(1).to_string());

        if let Some(cookies) = &self.cookies
            && cookies.exists()
        {
            command.arg("--cookies").arg(cookies);
        }
        command
    }

    fn list(&self, list_url: &str) -> Result<VideoIds<'_>, PipelineError> {
        debug!("Listing {list_url}");
        let mut command = self.command();
        command
            .arg("--flat-playlist")
            .arg("--get-id")
            .arg("--ignore-errors")
            .arg(list_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if self.verbose {
                Stdio::inherit()
            } else {
                Stdio::null()
            });

        let mut child = command
            .spawn()
            .map_err(|err| PipelineError::tool(LABEL, format!("cannot start process: {err}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::tool(LABEL, "listing stdout was not captured"))?;

        Ok(Box::new(IdStream {
            child,
            lines: BufReader::new(stdout).lines(),
            list_url: list_url.to_string(),
            finished: false,
        }))
    }
}

impl MediaHost for YtDlp {
    fn fetch_metadata(&self, video: &VideoRef) -> Result<VideoMetadata, PipelineError> {
        let locator = video.locator();
        let mut command = self.command();
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-playlist")
            .arg(&locator);

        let output = run_captured(&mut command, LABEL)?;
        if !output.status.success() {
            return Err(classify_failure(&locator, output.status, &output.stderr));
        }

        let raw_json = String::from_utf8_lossy(&output.stdout);
        parse_video_info(&raw_json, &video.id)
    }

    fn download_audio(
        &self,
        metadata: &VideoMetadata,
        stream: &AudioStream,
        target: &Path,
    ) -> Result<(), PipelineError> {
        let mut command = self.command();
        command
            .arg("--format")
            .arg(&stream.format_id)
            .arg("--output")
            .arg(output_template(target))
            .arg("--retries")
            .arg(self.retries.to_string())
            .arg("--force-overwrites")
            .arg("--no-part")
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg(&metadata.watch_url);

        let output = run_captured(&mut command, LABEL)?;
        if !output.status.success() {
            return Err(classify_failure(
                &metadata.watch_url,
                output.status,
                &output.stderr,
            ));
        }
        if !target.exists() {
            return Err(PipelineError::tool(
                LABEL,
                format!(
                    "reported success but {} was not written",
                    target.display()
                ),
            ));
        }
        Ok(())
    }
}

impl Catalog for YtDlp {
    fn channel_videos(&self, channel_id: &str) -> Result<VideoIds<'_>, PipelineError> {
        self.list(&reference::channel_videos_url(channel_id))
    }

    fn playlist_videos(&self, playlist_id: &str) -> Result<VideoIds<'_>, PipelineError> {
        self.list(&reference::playlist_url(playlist_id))
    }
}

/// Ids printed by a running `--flat-playlist` listing. Dropping the stream
/// before the end kills the listing process.
struct IdStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    list_url: String,
    finished: bool,
}

impl Iterator for IdStream {
    type Item = Result<String, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    let id = line.trim();
                    if !id.is_empty() {
                        return Some(Ok(id.to_string()));
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(PipelineError::tool(
                        LABEL,
                        format!("reading listing of {}: {err}", self.list_url),
                    )));
                }
                None => {
                    self.finished = true;
                    return match self.child.wait() {
                        Ok(status) if status.success() => None,
                        Ok(status) => Some(Err(PipelineError::tool(
                            LABEL,
                            format!("listing {} exited with {status}", self.list_url),
                        ))),
                        Err(err) => Some(Err(PipelineError::tool(
                            LABEL,
                            format!("waiting for listing of {}: {err}", self.list_url),
                        ))),
                    };
                }
            }
        }
    }
}

impl Drop for IdStream {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// `%` starts a field in yt-dlp output templates.
fn output_template(target: &Path) -> String {
    target.to_string_lossy().replace('%', "%%")
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.first(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum CreatorInfo {
    Name(String),
    Object {
        name: Option<String>,
        title: Option<String>,
    },
}

impl CreatorInfo {
    fn name(&self) -> Option<&str> {
        match self {
            CreatorInfo::Name(value) => Some(value.as_str()),
            CreatorInfo::Object { name, title } => name.as_deref().or(title.as_deref()),
        }
    }
}

/// Subset of the `yt-dlp --dump-single-json` payload. Everything is optional
/// because older videos may lack metadata.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    id: Option<String>,
    title: Option<String>,
    fulltitle: Option<String>,
    channel: Option<OneOrMany<CreatorInfo>>,
    uploader: Option<OneOrMany<CreatorInfo>>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    format_id: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    abr: Option<f64>,
    tbr: Option<f64>,
}

impl FormatInfo {
    fn is_audio_only(&self) -> bool {
        let has_audio = self
            .acodec
            .as_deref()
            .is_some_and(|codec| codec != "none");
        let has_video = self
            .vcodec
            .as_deref()
            .is_some_and(|codec| codec != "none");
        has_audio && !has_video
    }

    fn to_audio_stream(&self) -> Option<AudioStream> {
        if !self.is_audio_only() {
            return None;
        }
        let format_id = self.format_id.as_deref()?.trim();
        if format_id.is_empty() {
            return None;
        }
        let mime_type = match self.ext.as_deref() {
            Some("m4a" | "mp4") => MP4_AUDIO.to_string(),
            Some(ext) => format!("audio/{ext}"),
            None => "audio/unknown".to_string(),
        };
        Some(AudioStream {
            format_id: format_id.to_string(),
            mime_type,
            bitrate_kbps: self.abr.or(self.tbr).unwrap_or(0.0),
        })
    }
}

/// Translates the yt-dlp JSON payload into [`VideoMetadata`].
pub fn parse_video_info(raw_json: &str, fallback_id: &str) -> Result<VideoMetadata, PipelineError> {
    let info: VideoInfo = serde_json::from_str(raw_json).map_err(|err| PipelineError::Parse {
        program: LABEL.to_string(),
        reason: err.to_string(),
    })?;

    let id = info
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| fallback_id.to_string());
    let title = info
        .fulltitle
        .as_deref()
        .or(info.title.as_deref())
        .filter(|title| !title.is_empty())
        .unwrap_or(&id)
        .to_string();
    let author = [&info.channel, &info.uploader]
        .into_iter()
        .flatten()
        .filter_map(|creators| creators.first().and_then(CreatorInfo::name))
        .find(|name| !name.trim().is_empty())
        .unwrap_or("Unknown")
        .to_string();

    let duration_seconds = match info.duration {
        Some(duration) if duration > 0.0 => duration.round() as u64,
        _ => {
            return Err(PipelineError::Unavailable(format!(
                "{id}: no fixed duration (live or upcoming stream)"
            )));
        }
    };

    let watch_url = info
        .webpage_url
        .clone()
        .unwrap_or_else(|| reference::watch_url(&id));
    let audio_streams = info
        .formats
        .iter()
        .filter_map(FormatInfo::to_audio_stream)
        .collect();

    Ok(VideoMetadata {
        id,
        title,
        author,
        duration_seconds,
        thumbnail_url: info.thumbnail.clone(),
        watch_url,
        audio_streams,
    })
}

/// Maps yt-dlp diagnostics onto the pipeline's error kinds.
fn classify_failure(subject: &str, status: ExitStatus, stderr: &[u8]) -> PipelineError {
    let reason = last_stderr_line(stderr);
    let lowered = String::from_utf8_lossy(stderr).to_lowercase();
    let detail = format!("{subject}: {reason}");

    const UNAVAILABLE: &[&str] = &[
        "private video",
        "sign in to confirm your age",
        "available in your country",
        "members-only",
        "requested format is not available",
        "this live event will begin",
    ];
    const NOT_FOUND: &[&str] = &[
        "video unavailable",
        "has been removed",
        "does not exist",
        "http error 404",
        "incomplete youtube id",
    ];
    const TRANSIENT: &[&str] = &[
        "timed out",
        "timeout",
        "connection reset",
        "connection refused",
        "connection aborted",
        "remote end closed",
        "temporary failure in name resolution",
        "network is unreachable",
        "incompleteread",
        "http error 403",
        "http error 429",
        "http error 500",
        "http error 502",
        "http error 503",
        "http error 504",
    ];

    if UNAVAILABLE.iter().any(|needle| lowered.contains(needle)) {
        PipelineError::Unavailable(detail)
    } else if NOT_FOUND.iter().any(|needle| lowered.contains(needle)) {
        PipelineError::NotFound(detail)
    } else if TRANSIENT.iter().any(|needle| lowered.contains(needle)) {
        PipelineError::TransientNetwork(detail)
    } else {
        PipelineError::tool(LABEL, format!("{detail} ({status})"))
    }
}
