//! Optional TOML configuration file.
//!
//! Every key is optional; CLI flags override file values, which override the
//! built-in defaults.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Config directory name under the XDG config root.
const APP_DIR: &str = "memories-downloader";

/// Errors loading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// The offending key.
        field: &'static str,
        /// The rejected value.
        value: u64,
        /// Human-readable accepted range.
        expected: &'static str,
    },
}

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Path to `memories_history.html`.
    pub html_file: Option<PathBuf>,
    /// Folder downloads are written into.
    pub output_dir: Option<PathBuf>,
    /// Path to `downloaded_files.json`.
    pub ledger_file: Option<PathBuf>,
    /// Path to `download_errors.json`.
    pub error_file: Option<PathBuf>,
    /// Worker count (1..=100).
    pub concurrency: Option<usize>,
    /// Whole-request timeout in seconds (1..=3600).
    pub request_timeout_secs: Option<u64>,
    /// Whether to tag files with exiftool.
    pub use_exiftool: Option<bool>,
    /// Program used for tagging.
    pub exiftool_path: Option<PathBuf>,
}

impl FileConfig {
    /// Parses a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys.
    pub fn from_toml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validates config values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            return Err(ConfigError::OutOfRange {
                field: "concurrency",
                value: concurrency as u64,
                expected: "1..=100",
            });
        }
        if let Some(timeout) = self.request_timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            return Err(ConfigError::OutOfRange {
                field: "request_timeout_secs",
                value: timeout,
                expected: "1..=3600",
            });
        }
        Ok(())
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/memories-downloader/config.toml`
/// 2. `$HOME/.config/memories-downloader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads and validates the config file.
///
/// With `explicit` set the file must exist. Otherwise the default path is
/// used and a missing file yields the empty config.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, parsed or validated.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match resolve_default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = FileConfig::from_toml(&raw, &path)?;
    config.validate()?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}
