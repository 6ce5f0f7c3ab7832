#![forbid(unsafe_code)]

//! Working files that must not outlive the step that created them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Removes its path when dropped unless it was persisted first. A file that
/// never got created is fine.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the file to `target`, after which it is no longer removed.
    pub fn persist(mut self, target: &Path) -> io::Result<()> {
        fs::rename(&self.path, target)?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = remove_if_exists(&self.path) {
            warn!("Cannot remove {}: {err}", self.path.display());
        }
    }
}

/// `fs::remove_file` that treats an already missing file as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dropped_scratch_file_is_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.download.mp4");
        {
            let scratch = ScratchFile::new(&path);
            fs::write(scratch.path(), "partial").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn never_created_scratch_file_is_fine() {
        let dir = tempdir().unwrap();
        drop(ScratchFile::new(dir.path().join("missing")));
        remove_if_exists(&dir.path().join("missing")).unwrap();
    }

    #[test]
    fn persisted_scratch_file_survives() {
        let dir = tempdir().unwrap();
        let scratch = ScratchFile::new(dir.path().join("abc.m4a"));
        fs::write(scratch.path(), "audio").unwrap();
        let target = dir.path().join("Band - Song.m4a");
        scratch.persist(&target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "audio");
        assert!(!dir.path().join("abc.m4a").exists());
    }
}
