#![forbid(unsafe_code)]

//! Downloads YouTube audio as tagged `.m4a` files.
//!
//! A run resolves the user's video, playlist or channel reference, lists the
//! videos it covers and hands each one to the [`pipeline::Pipeline`]: metadata
//! from yt-dlp, best mp4 audio stream, ffmpeg trim to the reported duration,
//! title/artist/cover tags, then a rename to `<Author - Title>.m4a`.

pub mod artwork;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod reference;
pub mod retry;
pub mod scratch;
pub mod source;
pub mod tags;
pub mod tools;
pub mod transcode;
pub mod ytdlp;
