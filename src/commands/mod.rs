//! CLI command handlers.

mod dedupe;
mod download;
mod locations;

use std::sync::Arc;

use anyhow::Result;
use memories_core::config::FileConfig;
use memories_core::metadata::{ExifTool, MetadataWriter, NoopWriter};
use tracing::info;

use crate::app::config_runtime::{RunSettings, resolve_common, resolve_download, resolve_export};
use crate::cli::{Cli, Command};

pub(crate) use dedupe::run_dedupe;
pub(crate) use download::run_download;
pub(crate) use locations::run_locations;

/// Runs the selected subcommand.
pub(crate) async fn run_command(cli: &Cli, file: &FileConfig) -> Result<()> {
    match &cli.command {
        Command::Download(args) => {
            let settings = resolve_download(args, file)?;
            run_download(&settings, cli.quiet).await?;
        }
        Command::Locations(args) => {
            let settings = resolve_export(&args.common, &args.export, file)?;
            run_locations(&settings).await?;
        }
        Command::Dedupe(args) => {
            let settings = resolve_common(&args.common, file)?;
            run_dedupe(&settings, args.apply).await?;
        }
        Command::All(args) => {
            let settings = resolve_download(&args.download, file)?;
            info!("step 1/3: downloading memories");
            run_download(&settings, cli.quiet).await?;
            info!("step 2/3: writing locations");
            run_locations(&settings).await?;
            info!("step 3/3: removing duplicates");
            run_dedupe(&settings, args.apply).await?;
        }
    }
    Ok(())
}

/// Picks the metadata writer for a run.
pub(crate) async fn build_writer(settings: &RunSettings) -> Arc<dyn MetadataWriter> {
    if settings.use_exiftool {
        Arc::new(ExifTool::detect(&settings.exiftool_path).await)
    } else {
        info!("metadata tagging disabled");
        Arc::new(NoopWriter)
    }
}
