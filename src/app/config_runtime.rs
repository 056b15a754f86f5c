use std::path::PathBuf;

use anyhow::{Result, bail};
use memories_core::config::FileConfig;
use memories_core::download::{REQUEST_TIMEOUT_SECS, default_concurrency};
use memories_core::export::EXPORT_FILE;
use memories_core::ledger::{ERROR_LOG_FILE, LEDGER_FILE};
use memories_core::metadata::DEFAULT_EXIFTOOL;

use crate::cli::{CommonArgs, DownloadArgs, ExportArgs};

/// Default download folder, relative to the working directory.
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "snapchat_memories";

/// Effective settings after merging CLI flags, the config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunSettings {
    pub(crate) html_file: PathBuf,
    pub(crate) output_dir: PathBuf,
    pub(crate) ledger_file: PathBuf,
    pub(crate) error_file: PathBuf,
    pub(crate) concurrency: usize,
    pub(crate) request_timeout_secs: u64,
    pub(crate) use_exiftool: bool,
    pub(crate) exiftool_path: PathBuf,
    pub(crate) limit: Option<usize>,
}

/// Builds settings for `dedupe`, which only needs the folder and concurrency.
pub(crate) fn resolve_common(common: &CommonArgs, file: &FileConfig) -> Result<RunSettings> {
    resolve(common, &ExportArgs::default(), None, None, None, file)
}

/// Builds settings for `locations`.
pub(crate) fn resolve_export(
    common: &CommonArgs,
    export: &ExportArgs,
    file: &FileConfig,
) -> Result<RunSettings> {
    resolve(common, export, None, None, None, file)
}

/// Builds settings for `download` and `all`.
pub(crate) fn resolve_download(args: &DownloadArgs, file: &FileConfig) -> Result<RunSettings> {
    resolve(
        &args.common,
        &args.export,
        args.error_file.as_ref(),
        args.timeout_secs,
        args.limit,
        file,
    )
}

fn resolve(
    common: &CommonArgs,
    export: &ExportArgs,
    error_file: Option<&PathBuf>,
    timeout_secs: Option<u64>,
    limit: Option<usize>,
    file: &FileConfig,
) -> Result<RunSettings> {
    let pick = |cli: Option<&PathBuf>, from_file: Option<&PathBuf>, default: &str| {
        cli.or(from_file)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(default))
    };

    let concurrency = common
        .concurrency
        .map(usize::from)
        .or(file.concurrency)
        .unwrap_or_else(default_concurrency);
    if !(1..=100).contains(&concurrency) {
        bail!("Invalid effective concurrency value: {concurrency}. Expected range: 1..=100");
    }

    let request_timeout_secs = timeout_secs
        .or(file.request_timeout_secs)
        .unwrap_or(REQUEST_TIMEOUT_SECS);
    if !(1..=3600).contains(&request_timeout_secs) {
        bail!(
            "Invalid effective request timeout: {request_timeout_secs}. Expected range: 1..=3600"
        );
    }

    if limit == Some(0) {
        bail!("--limit must be at least 1");
    }

    Ok(RunSettings {
        html_file: pick(export.html_file.as_ref(), file.html_file.as_ref(), EXPORT_FILE),
        output_dir: pick(
            common.output_dir.as_ref(),
            file.output_dir.as_ref(),
            DEFAULT_OUTPUT_DIR,
        ),
        ledger_file: pick(export.ledger_file.as_ref(), file.ledger_file.as_ref(), LEDGER_FILE),
        error_file: pick(error_file, file.error_file.as_ref(), ERROR_LOG_FILE),
        concurrency,
        request_timeout_secs,
        use_exiftool: !export.no_exiftool && file.use_exiftool.unwrap_or(true),
        exiftool_path: file
            .exiftool_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXIFTOOL)),
        limit,
    })
}

/// Log level used when `RUST_LOG` is not set.
pub(crate) fn resolve_default_log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
