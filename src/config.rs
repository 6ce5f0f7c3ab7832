#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const ENV_FILE_VAR: &str = "YTA_ENV_FILE";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 512;
pub const DEFAULT_YT_DLP: &str = "yt-dlp";
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Immutable options for one run of the downloader.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub dry_run: bool,
    /// Stop after this many attempted videos.
    pub limit: Option<usize>,
    /// Bounds every single network read.
    pub timeout: Duration,
    pub max_attempts: u32,
    pub missing_only: bool,
    pub update_tags: bool,
    pub verbose: bool,
    /// Overrides the per-source default download directory.
    pub output_dir: Option<PathBuf>,
    /// Side of the square cover art, in pixels.
    pub thumbnail_size: u32,
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub cookies: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            missing_only: false,
            update_tags: false,
            verbose: false,
            output_dir: None,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            yt_dlp: PathBuf::from(DEFAULT_YT_DLP),
            ffmpeg: PathBuf::from(DEFAULT_FFMPEG),
            cookies: None,
        }
    }
}

/// Values given on the command line. `None` falls through to the environment,
/// then to the env file, then to the defaults.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub missing_only: bool,
    pub update_tags: bool,
    pub verbose: bool,
    pub output_dir: Option<PathBuf>,
    pub cookies: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_run_config(overrides: RunOverrides) -> Result<RunConfig> {
    let env_path = overrides
        .env_path
        .clone()
        .or_else(|| env_var_string(ENV_FILE_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    Ok(build_run_config(&file_vars, env_var_string, overrides))
}

fn build_run_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RunOverrides,
) -> RunConfig {
    let defaults = RunConfig::default();
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let max_attempts = overrides
        .max_attempts
        .or_else(|| lookup("YTA_MAX_ATTEMPTS").and_then(|value| value.parse::<u32>().ok()))
        .filter(|attempts| *attempts > 0)
        .unwrap_or(defaults.max_attempts);
    let timeout = overrides
        .timeout_secs
        .or_else(|| lookup("YTA_TIMEOUT_SECS").and_then(|value| value.parse::<u64>().ok()))
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(defaults.timeout);
    let thumbnail_size = lookup("YTA_THUMBNAIL_SIZE")
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(defaults.thumbnail_size);
    let output_dir = overrides
        .output_dir
        .or_else(|| lookup("YTA_DOWNLOAD_DIR").map(PathBuf::from));
    let cookies = overrides
        .cookies
        .or_else(|| lookup("YTA_COOKIES").map(PathBuf::from));
    let yt_dlp = lookup("YTA_YT_DLP")
        .map(PathBuf::from)
        .unwrap_or(defaults.yt_dlp);
    let ffmpeg = lookup("YTA_FFMPEG")
        .map(PathBuf::from)
        .unwrap_or(defaults.ffmpeg);

    RunConfig {
        dry_run: overrides.dry_run,
        limit: overrides.limit,
        timeout,
        max_attempts,
        missing_only: overrides.missing_only,
        update_tags: overrides.update_tags,
        verbose: overrides.verbose,
        output_dir,
        thumbnail_size,
        yt_dlp,
        ffmpeg,
        cookies,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| {
        file_vars
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Parses `KEY=value` lines, tolerating `export`, quotes, blank lines and
/// comments. A missing file yields no variables.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> RunConfig {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_run_config(&vars, |_| None, RunOverrides::default())
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let config = build_run_config(&HashMap::new(), |_| None, RunOverrides::default());
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.thumbnail_size, DEFAULT_THUMBNAIL_SIZE);
        assert_eq!(config.yt_dlp, PathBuf::from("yt-dlp"));
        assert_eq!(config.ffmpeg, PathBuf::from("ffmpeg"));
        assert!(config.output_dir.is_none());
        assert!(config.limit.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn env_file_values_are_read() {
        let config = config_from(
            "YTA_MAX_ATTEMPTS=\"3\"\nYTA_TIMEOUT_SECS=30\nYTA_DOWNLOAD_DIR='/music'\nYTA_FFMPEG=/opt/ffmpeg\n",
        );
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.output_dir, Some(PathBuf::from("/music")));
        assert_eq!(config.ffmpeg, PathBuf::from("/opt/ffmpeg"));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config_from(
            "YTA_MAX_ATTEMPTS=nope\nYTA_TIMEOUT_SECS=0\nYTA_THUMBNAIL_SIZE=-4\n",
        );
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.thumbnail_size, DEFAULT_THUMBNAIL_SIZE);
    }

    #[test]
    fn overrides_beat_env_which_beats_file() {
        let mut vars = HashMap::new();
        vars.insert("YTA_MAX_ATTEMPTS".to_string(), "2".to_string());
        vars.insert("YTA_TIMEOUT_SECS".to_string(), "10".to_string());
        vars.insert("YTA_DOWNLOAD_DIR".to_string(), "/file-dir".to_string());
        vars.insert("YTA_THUMBNAIL_SIZE".to_string(), "256".to_string());

        let overrides = RunOverrides {
            max_attempts: Some(9),
            output_dir: Some(PathBuf::from("/cli-dir")),
            dry_run: true,
            limit: Some(4),
            ..RunOverrides::default()
        };

        let config = build_run_config(
            &vars,
            |key| match key {
                "YTA_TIMEOUT_SECS" => Some("45".to_string()),
                "YTA_MAX_ATTEMPTS" => Some("7".to_string()),
                _ => None,
            },
            overrides,
        );

        assert_eq!(config.max_attempts, 9);
        assert_eq!(config.timeout, Duration::from_secs(45));
        assert_eq!(config.output_dir, Some(PathBuf::from("/cli-dir")));
        assert_eq!(config.thumbnail_size, 256);
        assert_eq!(config.limit, Some(4));
        assert!(config.dry_run);
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export YTA_DOWNLOAD_DIR="/media"
            YTA_YT_DLP='/usr/local/bin/yt-dlp'
            YTA_COOKIES =  "cookies.txt"
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("YTA_DOWNLOAD_DIR").unwrap(), "/media");
        assert_eq!(vars.get("YTA_YT_DLP").unwrap(), "/usr/local/bin/yt-dlp");
        assert_eq!(vars.get("YTA_COOKIES").unwrap(), "cookies.txt");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn resolve_run_config_reads_explicit_env_file() {
        let cfg = make_config("YTA_THUMBNAIL_SIZE=300\n");
        let config = resolve_run_config(RunOverrides {
            env_path: Some(cfg.path().to_path_buf()),
            ..RunOverrides::default()
        })
        .unwrap();
        assert_eq!(config.thumbnail_size, 300);
    }
}
