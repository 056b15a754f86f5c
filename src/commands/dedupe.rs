//! Dedupe command handler.

use anyhow::{Context, Result};
use memories_core::dedupe::{DedupeReport, remove_duplicates};
use tracing::info;

use crate::app::config_runtime::RunSettings;

pub(crate) async fn run_dedupe(settings: &RunSettings, apply: bool) -> Result<DedupeReport> {
    let report = remove_duplicates(&settings.output_dir, !apply, settings.concurrency)
        .await
        .with_context(|| {
            format!(
                "Failed to scan '{}' for duplicates",
                settings.output_dir.display()
            )
        })?;

    if report.planned == 0 {
        info!("no duplicates found");
        return Ok(report);
    }

    for folder in &report.folders {
        for group in &folder.groups {
            info!(
                folder = %folder.folder.display(),
                keep = %group.keep.display(),
                delete = group.delete.len(),
                "duplicate group"
            );
        }
    }

    if report.dry_run {
        info!(
            folders = report.folders.len(),
            to_delete = report.planned,
            "dry run, nothing deleted; pass --apply to delete duplicates"
        );
    } else {
        info!(
            deleted = report.deleted,
            failed = report.failed,
            "duplicates removed"
        );
    }
    Ok(report)
}
