#![forbid(unsafe_code)]

//! Human readable names and the filesystem-safe paths derived from them.

use std::path::{Path, PathBuf};

/// Extension of every file the pipeline produces.
pub const AUDIO_EXTENSION: &str = "m4a";
/// Suffix of the raw stream while it is being downloaded.
pub const DOWNLOAD_SUFFIX: &str = "download.mp4";

/// Punctuation kept as-is in file names, on top of letters, digits and
/// whitespace.
const ALLOWED_PUNCTUATION: &[char] = &[
    '-', '+', '_', '=', '(', ')', '[', ']', '&', '^', '%', '$', '#', '@', '!',
];

/// `"{author} - {title}"`, or just the title when it already mentions the
/// author (case-insensitively).
pub fn display_name(author: &str, title: &str) -> String {
    if title.to_lowercase().contains(&author.to_lowercase()) {
        title.to_string()
    } else {
        format!("{author} - {title}")
    }
}

/// Replaces every character outside the allow-list with `-`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_allowed(c) { c } else { '-' })
        .collect()
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || ALLOWED_PUNCTUATION.contains(&c)
}

/// `<dir>/<sanitized display name>.m4a`
pub fn final_path(dir: &Path, display_name: &str) -> PathBuf {
    dir.join(format!(
        "{}.{AUDIO_EXTENSION}",
        sanitize_file_name(display_name)
    ))
}

/// `<dir>/<video id>.m4a`, the trimmed file before it gets its final name.
pub fn output_path(dir: &Path, video_id: &str) -> PathBuf {
    dir.join(format!("{video_id}.{AUDIO_EXTENSION}"))
}

/// `<dir>/<video id>.download.mp4`
pub fn download_path(dir: &Path, video_id: &str) -> PathBuf {
    dir.join(format!("{video_id}.{DOWNLOAD_SUFFIX}"))
}
