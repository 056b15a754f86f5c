//! Locations command handler: GPS enrichment of downloaded files.

use anyhow::{Context, Result, bail};
use memories_core::export::read_export;
use memories_core::ledger::Ledger;
use memories_core::metadata::locations::{LocationReport, METADATA_FILE, apply_locations};
use tracing::info;

use super::build_writer;
use crate::app::config_runtime::RunSettings;

pub(crate) async fn run_locations(settings: &RunSettings) -> Result<LocationReport> {
    if !settings.ledger_file.exists() {
        bail!(
            "'{}' not found. Run `memories download` first",
            settings.ledger_file.display()
        );
    }

    let index = read_export(&settings.html_file)
        .await
        .with_context(|| format!("Failed to read export '{}'", settings.html_file.display()))?;
    let ledger = Ledger::load(&settings.ledger_file)
        .await
        .with_context(|| format!("Failed to load '{}'", settings.ledger_file.display()))?;
    info!(
        locations = index.location_count(),
        links = index.links.len(),
        "parsed export"
    );

    let writer = build_writer(settings).await;
    let metadata_path = settings.ledger_file.with_file_name(METADATA_FILE);
    let report = apply_locations(
        &index,
        &ledger,
        &settings.output_dir,
        writer,
        &metadata_path,
        settings.concurrency,
    )
    .await
    .context("Failed to save location results")?;

    info!(
        processed = report.entries,
        with_location = report.with_location,
        without_location = report.entries - report.with_location,
        gps_written = report.written,
        gps_failed = report.failed,
        metadata = %metadata_path.display(),
        "locations finished"
    );
    Ok(report)
}
