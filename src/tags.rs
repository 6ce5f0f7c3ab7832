#![forbid(unsafe_code)]

//! Title, artist and cover art embedding.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::artwork;
use crate::error::PipelineError;
use crate::http::ImageFetcher;
use crate::metadata::VideoMetadata;
use crate::scratch::ScratchFile;
use crate::transcode::{Ffmpeg, TagSet};

pub trait TagWriter {
    /// Sets title and artist from the video and embeds the square thumbnail.
    fn apply_tags(&self, metadata: &VideoMetadata, path: &Path) -> Result<(), PipelineError>;
}

/// Remuxes the file through ffmpeg with the new tags, then swaps it in place.
pub struct FfmpegTagWriter<I> {
    ffmpeg: Ffmpeg,
    images: I,
    thumbnail_size: u32,
}

impl<I: ImageFetcher> FfmpegTagWriter<I> {
    pub fn new(ffmpeg: Ffmpeg, images: I, thumbnail_size: u32) -> Self {
        Self {
            ffmpeg,
            images,
            thumbnail_size,
        }
    }

    /// Fetches the thumbnail and writes the square PNG to a temporary file.
    fn cover_art(&self, metadata: &VideoMetadata) -> Result<Option<NamedTempFile>, PipelineError> {
        let Some(url) = metadata.thumbnail_url.as_deref() else {
            return Ok(None);
        };
        debug!("Generating song thumbnail: {url} ({}px)", self.thumbnail_size);

        let bytes = self.images.fetch_image(url)?;
        let png = artwork::square_png(&bytes, self.thumbnail_size).map_err(|err| {
            PipelineError::Parse {
                program: "thumbnail".to_string(),
                reason: format!("{url}: {err}"),
            }
        })?;

        let mut file = tempfile::Builder::new()
            .prefix("cover-")
            .suffix(".png")
            .tempfile()
            .map_err(|err| PipelineError::filesystem(std::env::temp_dir(), err))?;
        file.write_all(&png)
            .map_err(|err| PipelineError::filesystem(file.path().to_path_buf(), err))?;
        Ok(Some(file))
    }
}

impl<I: ImageFetcher> TagWriter for FfmpegTagWriter<I> {
    fn apply_tags(&self, metadata: &VideoMetadata, path: &Path) -> Result<(), PipelineError> {
        let tag_error = |reason: String| PipelineError::TagWrite {
            path: path.to_path_buf(),
            reason,
        };

        let cover = match self.cover_art(metadata) {
            Ok(cover) => cover,
            Err(err) => {
                warn!("Cannot prepare artwork for {}: {err}", metadata.id);
                None
            }
        };

        let scratch = ScratchFile::new(tagging_path(path));
        let tags = TagSet {
            title: &metadata.title,
            artist: &metadata.author,
            cover_png: cover.as_ref().map(|file| file.path()),
        };
        self.ffmpeg
            .write_tags(path, scratch.path(), &tags)
            .map_err(|err| tag_error(err.to_string()))?;
        scratch
            .persist(path)
            .map_err(|err| tag_error(format!("replacing file: {err}")))
    }
}

/// `<stem>.tagging.m4a` next to the file being tagged.
fn tagging_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| crate::naming::AUDIO_EXTENSION.to_string());
    path.with_file_name(format!("{stem}.tagging.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbImage};
    use std::cell::Cell;
    use std::io::Cursor;

    struct StaticImage {
        bytes: Option<Vec<u8>>,
        calls: Cell<usize>,
    }

    impl ImageFetcher for StaticImage {
        fn fetch_image(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
            self.calls.set(self.calls.get() + 1);
            self.bytes
                .clone()
                .ok_or_else(|| PipelineError::NotFound(url.to_string()))
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn metadata(thumbnail_url: Option<&str>) -> VideoMetadata {
        VideoMetadata {
            id: "abc".into(),
            title: "Song".into(),
            author: "Band".into(),
            duration_seconds: 100,
            thumbnail_url: thumbnail_url.map(str::to_string),
            watch_url: "https://www.youtube.com/watch?v=abc".into(),
            audio_streams: Vec::new(),
        }
    }

    #[test]
    fn tagging_path_keeps_extension() {
        assert_eq!(
            tagging_path(Path::new("out/Band - Song.m4a")),
            Path::new("out/Band - Song.tagging.m4a")
        );
    }

    #[test]
    fn cover_art_is_a_png_temp_file() {
        let writer = FfmpegTagWriter::new(
            Ffmpeg::new("ffmpeg", false),
            StaticImage {
                bytes: Some(png_bytes(800, 600)),
                calls: Cell::new(0),
            },
            512,
        );
        let cover = writer
            .cover_art(&metadata(Some("https://i.ytimg.com/a.jpg")))
            .unwrap()
            .unwrap();
        let decoded = image::open(cover.path()).unwrap();
        assert_eq!(decoded.dimensions(), (384, 384));

        assert!(writer.cover_art(&metadata(None)).unwrap().is_none());
        assert_eq!(writer.images.calls.get(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn apply_tags_rewrites_in_place_even_without_artwork() -> anyhow::Result<()> {
        use crate::transcode::tests::install_ffmpeg_stub;
        use std::fs;

        let dir = tempfile::tempdir()?;
        let writer = FfmpegTagWriter::new(
            Ffmpeg::new(install_ffmpeg_stub(dir.path())?, false),
            StaticImage {
                bytes: None,
                calls: Cell::new(0),
            },
            512,
        );
        let song = dir.path().join("Band - Song.m4a");
        fs::write(&song, "audio")?;

        writer.apply_tags(&metadata(Some("https://i.ytimg.com/gone.jpg")), &song)?;

        assert_eq!(fs::read_to_string(&song)?, "audio");
        assert!(!dir.path().join("Band - Song.tagging.m4a").exists());
        let log = fs::read_to_string(dir.path().join("ffmpeg.log"))?;
        assert!(log.contains("title=Song"));
        assert!(log.contains("artist=Band"));
        assert!(!log.contains("attached_pic"));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn apply_tags_failure_is_a_tag_error() -> anyhow::Result<()> {
        use crate::transcode::tests::install_ffmpeg_stub;
        use std::fs;

        let dir = tempfile::tempdir()?;
        let writer = FfmpegTagWriter::new(
            Ffmpeg::new(install_ffmpeg_stub(dir.path())?, false),
            StaticImage {
                bytes: None,
                calls: Cell::new(0),
            },
            512,
        );
        let song = dir.path().join("corrupt.m4a");
        fs::write(&song, "junk")?;

        let err = writer.apply_tags(&metadata(None), &song).unwrap_err();
        assert!(matches!(err, PipelineError::TagWrite { .. }));
        assert!(!dir.path().join("corrupt.tagging.m4a").exists());
        Ok(())
    }
}
