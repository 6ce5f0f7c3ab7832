#![forbid(unsafe_code)]

//! Per-video download pipeline and the batch loop around it.
//!
//! Every video goes through metadata lookup, naming, the skip-if-present
//! check, download to `<id>.download.mp4`, trim into `<id>.m4a`, tagging and
//! finally the rename to `<display name>.m4a`. Any failure is recorded in the
//! run's [`ErrorLog`] and the batch moves on to the next video.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::fetcher::{MediaHost, select_audio_stream};
use crate::metadata::VideoMetadata;
use crate::naming;
use crate::reference::{VideoRef, resolve_channel_id, resolve_playlist_id};
use crate::retry::retry;
use crate::scratch::ScratchFile;
use crate::source::{Catalog, Selection};
use crate::tags::TagWriter;
use crate::transcode::Transcoder;

/// How a single video ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Downloaded,
    /// Final file present and `--missing` given.
    AlreadyPresent,
    /// Final file present, `--missing --tags` given, tags rewritten.
    TagsRefreshed,
    /// Dry run: everything up to the download was evaluated.
    Planned,
}

/// Working state for one video that is being downloaded.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub video: VideoRef,
    pub download_path: PathBuf,
    pub output_path: PathBuf,
    pub final_path: PathBuf,
    pub attempts: u32,
}

impl DownloadJob {
    pub fn new(video: &VideoRef, metadata: &VideoMetadata, dir: &Path, final_path: PathBuf) -> Self {
        Self {
            video: video.clone(),
            download_path: naming::download_path(dir, &metadata.id),
            output_path: naming::output_path(dir, &metadata.id),
            final_path,
            attempts: 0,
        }
    }
}

/// Failures of one run keyed by the identifier the user (or the listing)
/// gave. Later failures for the same key replace earlier ones.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Vec<(String, PipelineError)>,
}

impl ErrorLog {
    pub fn record(&mut self, key: impl Into<String>, err: PipelineError) {
        let key = key.into();
        error!("Cannot download video: {key}: {err}");
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = err,
            None => self.entries.push((key, err)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PipelineError> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, err)| err)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PipelineError)> {
        self.entries.iter().map(|(key, err)| (key.as_str(), err))
    }
}

/// What a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Videos taken from the source, whatever their outcome.
    pub attempted: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub tags_refreshed: usize,
    pub planned: usize,
    pub limit_reached: bool,
    pub errors: ErrorLog,
}

impl RunReport {
    fn count(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Downloaded => self.downloaded += 1,
            ItemOutcome::AlreadyPresent => self.already_present += 1,
            ItemOutcome::TagsRefreshed => self.tags_refreshed += 1,
            ItemOutcome::Planned => self.planned += 1,
        }
    }

    /// Totals at info level, then every failure as a warning.
    pub fn log_summary(&self) {
        info!(
            "Processed {} videos: {} downloaded, {} already present, {} tags refreshed, {} planned, {} failed",
            self.attempted,
            self.downloaded,
            self.already_present,
            self.tags_refreshed,
            self.planned,
            self.errors.len()
        );
        if !self.errors.is_empty() {
            warn!("Some videos were not downloaded:");
            for (video, err) in self.errors.iter() {
                warn!("{video}: {err}");
            }
        }
    }
}

/// Sequential orchestrator. Holds the run configuration and the external
/// capabilities; owns no mutable state between runs.
pub struct Pipeline<'a> {
    config: &'a RunConfig,
    host: &'a dyn MediaHost,
    catalog: &'a dyn Catalog,
    transcoder: &'a dyn Transcoder,
    tagger: &'a dyn TagWriter,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a RunConfig,
        host: &'a dyn MediaHost,
        catalog: &'a dyn Catalog,
        transcoder: &'a dyn Transcoder,
        tagger: &'a dyn TagWriter,
    ) -> Self {
        Self {
            config,
            host,
            catalog,
            transcoder,
            tagger,
        }
    }

    /// Runs the whole selection. Only an unusable playlist/channel reference
    /// or a listing that cannot start fails the run; per-video problems end up
    /// in the report.
    pub fn run(&self, selection: &Selection) -> Result<RunReport, PipelineError> {
        match selection {
            Selection::Videos(inputs) => {
                info!("Downloading {} videos", inputs.len());
                let dir = self.download_dir(".");
                Ok(self.process_all(inputs.iter().cloned().map(Ok), "videos", &dir))
            }
            Selection::Playlist(input) => {
                info!("Downloading all videos of playlist: {input}");
                let list_id = resolve_playlist_id(input)?;
                info!("ListId: {list_id}");
                let dir = self.download_dir(&list_id);
                let ids = self.catalog.playlist_videos(&list_id)?;
                Ok(self.process_all(ids, &list_id, &dir))
            }
            Selection::Channel(input) => {
                info!("Downloading all videos of channel: {input}");
                let channel_id = resolve_channel_id(input)?;
                info!("ChannelId: {channel_id}");
                let dir = self.download_dir(&channel_id);
                let ids = self.catalog.channel_videos(&channel_id)?;
                Ok(self.process_all(ids, &channel_id, &dir))
            }
        }
    }

    /// `--dir` when given, otherwise `default`.
    pub fn download_dir(&self, default: &str) -> PathBuf {
        self.config
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(default))
    }

    /// Processes inputs one after the other until they run out or the item
    /// limit is hit. A listing error is recorded under `source` and ends the
    /// batch, since nothing after it can be read.
    pub fn process_all<I>(&self, inputs: I, source: &str, dir: &Path) -> RunReport
    where
        I: IntoIterator<Item = Result<String, PipelineError>>,
    {
        let mut report = RunReport::default();

        for input in inputs {
            let raw = match input {
                Ok(raw) => raw,
                Err(err) => {
                    report.errors.record(source, err);
                    break;
                }
            };

            match VideoRef::resolve(&raw).and_then(|video| self.process_video(&video, dir)) {
                Ok(outcome) => report.count(outcome),
                Err(err) => report.errors.record(raw, err),
            }

            report.attempted += 1;
            if let Some(limit) = self.config.limit
                && report.attempted >= limit
            {
                warn!("Limit reached {limit}");
                report.limit_reached = true;
                break;
            }
        }

        report
    }

    /// Takes one video from lookup to its final file.
    pub fn process_video(&self, video: &VideoRef, dir: &Path) -> Result<ItemOutcome, PipelineError> {
        let metadata = retry(self.config.max_attempts, PipelineError::is_transient, |_| {
            self.host.fetch_metadata(video)
        })?;

        let display_name = metadata.display_name();
        info!("Video: {display_name} | {}", metadata.duration_text());
        info!(" > {}", metadata.watch_url);

        let final_path = naming::final_path(dir, &display_name);

        if !self.config.dry_run && !dir.exists() {
            fs::create_dir_all(dir).map_err(|err| PipelineError::filesystem(dir, err))?;
        }

        if final_path.exists() && self.config.missing_only {
            if self.config.update_tags {
                self.write_tags(&metadata, &final_path);
                return Ok(ItemOutcome::TagsRefreshed);
            }
            info!("Already downloaded");
            return Ok(ItemOutcome::AlreadyPresent);
        }

        let mut job = DownloadJob::new(video, &metadata, dir, final_path);

        if self.config.dry_run {
            info!("Downloading audio: {}", metadata.title);
            info!("Trimming audio {}", job.download_path.display());
            info!("Updating music tags: {}", job.output_path.display());
            return Ok(ItemOutcome::Planned);
        }

        let output = ScratchFile::new(&job.output_path);
        {
            let download = ScratchFile::new(&job.download_path);
            self.download(&metadata, &mut job, download.path())?;

            info!("Trimming audio {}", download.path().display());
            self.transcoder
                .trim(download.path(), output.path(), metadata.duration_seconds)?;
        }

        self.write_tags(&metadata, output.path());

        output
            .persist(&job.final_path)
            .map_err(|err| PipelineError::filesystem(&job.final_path, err))?;
        debug!(
            "Saved {} after {} download attempt(s)",
            job.final_path.display(),
            job.attempts
        );
        Ok(ItemOutcome::Downloaded)
    }

    fn download(
        &self,
        metadata: &VideoMetadata,
        job: &mut DownloadJob,
        target: &Path,
    ) -> Result<(), PipelineError> {
        info!("Downloading audio: {}", metadata.title);
        let stream = select_audio_stream(metadata)?;
        debug!(
            "Selected format {} ({}, {} kbps)",
            stream.format_id, stream.mime_type, stream.bitrate_kbps
        );

        let mut attempts = 0;
        let result = retry(self.config.max_attempts, PipelineError::is_transient, |attempt| {
            attempts = attempt;
            self.host.download_audio(metadata, stream, target)
        });
        job.attempts = attempts;
        result
    }

    /// Tag failures never fail the video.
    fn write_tags(&self, metadata: &VideoMetadata, path: &Path) {
        info!("Updating music tags: {}", path.display());
        if self.config.dry_run {
            return;
        }
        if let Err(err) = self.tagger.apply_tags(metadata, path) {
            warn!("Cannot set music tags: {err}");
        }
    }
}
