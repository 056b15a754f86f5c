//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Download, tag and tidy an exported Snapchat Memories archive.
///
/// Reads `memories_history.html` from a Snapchat data export, downloads every
/// memory it lists, writes capture dates and locations into the files, and
/// removes duplicates left behind by multi-part memories.
#[derive(Parser, Debug)]
#[command(name = "memories")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/memories-downloader/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline stages.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download every memory listed in the export
    Download(DownloadArgs),
    /// Write GPS coordinates from the export into downloaded files
    Locations(LocationArgs),
    /// Remove duplicate files inside extracted memory folders
    Dedupe(DedupeArgs),
    /// Run download, locations and dedupe in sequence
    All(AllArgs),
}

/// Settings shared by every stage.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Folder memories are downloaded into
    #[arg(short, long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent workers (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,
}

/// Settings for stages that read the export and the ledger.
#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Path to memories_history.html
    #[arg(long = "html", value_name = "FILE")]
    pub html_file: Option<PathBuf>,

    /// Path to the downloaded-files ledger
    #[arg(long = "ledger", value_name = "FILE")]
    pub ledger_file: Option<PathBuf>,

    /// Do not write metadata with exiftool
    #[arg(long)]
    pub no_exiftool: bool,
}

/// Arguments for `download`.
#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub export: ExportArgs,

    /// Path to the error log
    #[arg(long = "errors", value_name = "FILE")]
    pub error_file: Option<PathBuf>,

    /// Whole-request timeout in seconds (1-3600)
    #[arg(long = "timeout", value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout_secs: Option<u64>,

    /// Only schedule the first N memories of the export
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Arguments for `locations`.
#[derive(Args, Debug, Clone, Default)]
pub struct LocationArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `dedupe`.
#[derive(Args, Debug, Clone, Default)]
pub struct DedupeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Delete duplicates (default is a dry run that only lists them)
    #[arg(long)]
    pub apply: bool,
}

/// Arguments for `all`.
#[derive(Args, Debug, Clone, Default)]
pub struct AllArgs {
    #[command(flatten)]
    pub download: DownloadArgs,

    /// Delete duplicates at the end (default is a dry run)
    #[arg(long)]
    pub apply: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args)
    }

    #[test]
    fn test_cli_download_defaults() {
        let cli = parse(&["memories", "download"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.common.concurrency, None);
        assert_eq!(args.limit, None);
        assert!(!args.export.no_exiftool);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = parse(&["memories", "download", "-vv", "--config", "c.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn test_cli_download_flags() {
        let cli = parse(&[
            "memories",
            "download",
            "--html",
            "export.html",
            "-o",
            "out",
            "-c",
            "8",
            "--limit",
            "5",
            "--timeout",
            "30",
            "--no-exiftool",
        ])
        .unwrap();
        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.export.html_file, Some(PathBuf::from("export.html")));
        assert_eq!(args.common.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.common.concurrency, Some(8));
        assert_eq!(args.limit, Some(5));
        assert_eq!(args.timeout_secs, Some(30));
        assert!(args.export.no_exiftool);
    }

    #[test]
    fn test_cli_concurrency_zero_rejected() {
        let err = parse(&["memories", "download", "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_concurrency_over_max_rejected() {
        let err = parse(&["memories", "dedupe", "-c", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_dedupe_is_dry_run_by_default() {
        let cli = parse(&["memories", "dedupe"]).unwrap();
        let Command::Dedupe(args) = cli.command else {
            panic!("expected dedupe");
        };
        assert!(!args.apply);

        let cli = parse(&["memories", "dedupe", "--apply"]).unwrap();
        let Command::Dedupe(args) = cli.command else {
            panic!("expected dedupe");
        };
        assert!(args.apply);
    }

    #[test]
    fn test_cli_all_accepts_download_and_apply_flags() {
        let cli = parse(&["memories", "all", "--limit", "2", "--apply", "-q"]).unwrap();
        assert!(cli.quiet);
        let Command::All(args) = cli.command else {
            panic!("expected all");
        };
        assert_eq!(args.download.limit, Some(2));
        assert!(args.apply);
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        assert!(parse(&["memories"]).is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = parse(&["memories", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = parse(&["memories", "download", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
