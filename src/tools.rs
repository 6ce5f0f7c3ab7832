#![forbid(unsafe_code)]

//! Helpers for driving the external programs (`yt-dlp`, `ffmpeg`).

use anyhow::{Result, bail};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::debug;

use crate::error::PipelineError;

/// Runs `<program> <version_flag>` to fail loudly when a dependency such as
/// yt-dlp is missing.
pub fn ensure_program_available(program: &Path, version_flag: &str) -> Result<()> {
    let status = Command::new(program)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!(
            "{} is installed but returned a failure status",
            program.display()
        ),
        Err(err) => bail!(
            "{} is not installed or not in PATH: {}",
            program.display(),
            err
        ),
    }
}

/// Runs the command to completion with stdout and stderr captured. Only a
/// failure to start the process is an error here; the exit status is left to
/// the caller.
pub(crate) fn run_captured(command: &mut Command, label: &str) -> Result<Output, PipelineError> {
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|err| PipelineError::tool(label, format!("cannot start process: {err}")))?;

    if !output.stderr.is_empty() {
        debug!("{label} stderr: {}", String::from_utf8_lossy(&output.stderr).trim_end());
    }
    Ok(output)
}

/// Last non-empty stderr line, which is where both tools put the reason.
pub(crate) fn last_stderr_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("no diagnostics")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_stderr_line_skips_blank_lines() {
        let stderr = b"WARNING: something\nERROR: Video unavailable\n\n";
        assert_eq!(last_stderr_line(stderr), "ERROR: Video unavailable");
        assert_eq!(last_stderr_line(b""), "no diagnostics");
    }

    #[test]
    fn missing_program_is_reported() {
        let err = ensure_program_available(Path::new("/nonexistent/yt-dlp-missing"), "--version")
            .unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }

    #[cfg(unix)]
    #[test]
    fn available_program_passes() {
        ensure_program_available(Path::new("true"), "--version").unwrap();
    }
}
