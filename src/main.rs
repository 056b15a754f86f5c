//! CLI entry point for the memories downloader.

use anyhow::{Context, Result};
use clap::Parser;
use memories_core::config::load_config;
use tracing::{debug, info};

mod app;
mod cli;
mod commands;

use app::config_runtime::resolve_default_log_level;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = resolve_default_log_level(cli.quiet, cli.verbose);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");
    info!("memories downloader starting");

    let file_config = load_config(cli.config.as_deref()).context("Invalid configuration")?;
    commands::run_command(&cli, &file_config).await
}
