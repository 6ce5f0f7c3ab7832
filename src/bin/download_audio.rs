#![forbid(unsafe_code)]

//! Command-line downloader that saves the audio track of YouTube videos,
//! playlists or whole channels as tagged `.m4a` files.
//!
//! Exactly one source selector is accepted per run. Every video found goes
//! through the same pipeline; failures are collected and summarised at the
//! end instead of aborting the batch.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use yt_audio_tools::config::{RunOverrides, resolve_run_config};
use yt_audio_tools::http::HttpImageFetcher;
use yt_audio_tools::pipeline::Pipeline;
use yt_audio_tools::source::Selection;
use yt_audio_tools::tags::FfmpegTagWriter;
use yt_audio_tools::tools::ensure_program_available;
use yt_audio_tools::transcode::Ffmpeg;
use yt_audio_tools::ytdlp::YtDlp;

#[derive(Debug, Parser)]
#[command(
    name = "download_audio",
    version,
    about = "Download YouTube audio tracks as tagged m4a files"
)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["videos", "playlist", "channel"])
))]
struct Args {
    /// Video ids or URLs
    #[arg(short = 'v', long, num_args = 1.., value_name = "ID_OR_URL")]
    videos: Vec<String>,

    /// Playlist id or URL
    #[arg(short = 'l', long, value_name = "ID_OR_URL")]
    playlist: Option<String>,

    /// Channel id, handle or URL
    #[arg(short = 'c', long, value_name = "ID_OR_URL")]
    channel: Option<String>,

    /// Resolve and log everything without downloading or writing files
    #[arg(short = 'd', long)]
    dry_run: bool,

    /// Stop after this many videos
    #[arg(short = 'm', long, value_parser = clap::value_parser!(u32).range(1..))]
    limit: Option<u32>,

    /// Network timeout in seconds
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Attempts per metadata lookup and per download
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: Option<u32>,

    /// Debug logging, ffmpeg diagnostics included
    #[arg(long)]
    verbose: bool,

    /// Skip videos whose final file already exists
    #[arg(long)]
    missing: bool,

    /// With --missing, rewrite tags of files that already exist
    #[arg(long)]
    tags: bool,

    /// Download directory (defaults to the playlist/channel id, or `.`)
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Netscape cookies file passed to yt-dlp
    #[arg(long, value_name = "PATH")]
    cookies: Option<PathBuf>,

    /// Settings file (defaults to `.env`)
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

impl Args {
    fn selection(&self) -> Selection {
        if let Some(playlist) = &self.playlist {
            Selection::Playlist(playlist.clone())
        } else if let Some(channel) = &self.channel {
            Selection::Channel(channel.clone())
        } else {
            Selection::Videos(self.videos.clone())
        }
    }

    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            dry_run: self.dry_run,
            limit: self.limit.map(|limit| limit as usize),
            timeout_secs: self.timeout,
            max_attempts: self.max_attempts,
            missing_only: self.missing,
            update_tags: self.tags,
            verbose: self.verbose,
            output_dir: self.dir.clone(),
            cookies: self.cookies.clone(),
            env_path: self.env_file.clone(),
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = resolve_run_config(args.overrides()).context("loading settings")?;

    ensure_program_available(&config.yt_dlp, "--version")?;
    if !config.dry_run {
        ensure_program_available(&config.ffmpeg, "-version")?;
    }
    if config.dry_run {
        info!("Dry run: nothing will be downloaded or written");
    }

    let yt_dlp = YtDlp::from_config(&config);
    let ffmpeg = Ffmpeg::new(config.ffmpeg.clone(), config.verbose);
    let tagger = FfmpegTagWriter::new(
        ffmpeg.clone(),
        HttpImageFetcher::new(config.timeout),
        config.thumbnail_size,
    );
    let pipeline = Pipeline::new(&config, &yt_dlp, &yt_dlp, &ffmpeg, &tagger);

    let report = pipeline
        .run(&args.selection())
        .context("preparing the download")?;
    report.log_summary();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn videos_accept_several_values() {
        let args = Args::try_parse_from(["download_audio", "-v", "abc", "https://youtu.be/xyz"])
            .unwrap();
        assert_eq!(
            args.selection(),
            Selection::Videos(vec!["abc".into(), "https://youtu.be/xyz".into()])
        );
    }

    #[test]
    fn exactly_one_selector_is_required() {
        let err = Args::try_parse_from(["download_audio", "--dry-run"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Args::try_parse_from(["download_audio", "-l", "PL1", "-c", "@band"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn zero_limit_and_attempts_are_rejected() {
        for flag in ["--limit", "--max-attempts", "--timeout"] {
            let err = Args::try_parse_from(["download_audio", "-l", "PL1", flag, "0"]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "{flag}");
        }
    }

    #[test]
    fn flags_map_onto_overrides() {
        let args = Args::try_parse_from([
            "download_audio",
            "-c",
            "@band",
            "-d",
            "-m",
            "3",
            "-t",
            "30",
            "-r",
            "2",
            "--missing",
            "--tags",
            "--dir",
            "music",
        ])
        .unwrap();

        assert_eq!(args.selection(), Selection::Channel("@band".into()));
        let overrides = args.overrides();
        assert!(overrides.dry_run);
        assert_eq!(overrides.limit, Some(3));
        assert_eq!(overrides.timeout_secs, Some(30));
        assert_eq!(overrides.max_attempts, Some(2));
        assert!(overrides.missing_only);
        assert!(overrides.update_tags);
        assert_eq!(overrides.output_dir, Some(PathBuf::from("music")));
    }
}
