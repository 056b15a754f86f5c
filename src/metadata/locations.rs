//! GPS enrichment pass over already downloaded memories.
//!
//! Runs after the download pass. For each export row with coordinates whose
//! asset is in the ledger and not yet tagged, the location and capture date
//! are written into the file (or every media file of its extracted folder).
//! Successful assets get `metadata_written = true` so later passes skip
//! them. A `metadata.json` summary of every ledger asset in the export is
//! rewritten each time.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{GeoPoint, MetadataWriter, TagOutcome, lowercase_extension, media_files_in};
use crate::archive::expansion_dir;
use crate::export::ExportIndex;
use crate::identity::AssetId;
use crate::ledger::{JsonStore, Ledger, LedgerError};

/// Default summary filename.
pub const METADATA_FILE: &str = "metadata.json";

/// One asset in `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Ledger filename.
    pub filename: String,
    /// Raw capture date.
    pub date: Option<String>,
    /// Content-Type reported at download time.
    pub content_type: Option<String>,
    /// Coordinates from the export row, if any.
    pub location: Option<GeoPoint>,
}

/// Counts from one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationReport {
    /// Export assets found in the ledger.
    pub entries: usize,
    /// Of those, assets whose row has coordinates.
    pub with_location: usize,
    /// Files tagged.
    pub written: usize,
    /// Files the writer skipped.
    pub skipped: usize,
    /// Files the writer failed on.
    pub failed: usize,
    /// Ledger records flipped to `metadata_written`.
    pub marked: usize,
}

#[derive(Debug)]
struct GpsJob {
    id: AssetId,
    path: PathBuf,
    date: Option<String>,
    location: GeoPoint,
}

/// Tags located assets and writes `metadata.json`.
///
/// # Errors
///
/// Returns [`LedgerError`] if the ledger or `metadata.json` cannot be
/// written. Tagging failures are only counted.
#[instrument(skip_all, fields(dir = %download_dir.display(), concurrency = concurrency))]
pub async fn apply_locations(
    index: &ExportIndex,
    ledger: &Ledger,
    download_dir: &Path,
    writer: Arc<dyn MetadataWriter>,
    metadata_path: &Path,
    concurrency: usize,
) -> Result<LocationReport, LedgerError> {
    let records = ledger.snapshot().await;
    let summary = JsonStore::<MetadataEntry>::empty(metadata_path);
    let mut report = LocationReport::default();
    let mut jobs = Vec::new();

    for (i, link) in index.links.iter().enumerate() {
        let id = AssetId::resolve(&link.url);
        let Some(record) = records.get(&id) else {
            continue;
        };
        let location = index.location(i);
        report.entries += 1;

        summary
            .upsert(
                id.clone(),
                MetadataEntry {
                    filename: record.filename.clone(),
                    date: record.date.clone(),
                    content_type: record.content_type.clone(),
                    location,
                },
            )
            .await;

        let Some(location) = location else {
            continue;
        };
        report.with_location += 1;
        if record.metadata_written {
            continue;
        }

        for path in gps_targets(&download_dir.join(&record.filename)).await {
            jobs.push(GpsJob {
                id: id.clone(),
                path,
                date: record.date.clone(),
                location,
            });
        }
    }

    debug!(jobs = jobs.len(), "tagging located files");
    let outcomes: Vec<(AssetId, TagOutcome)> = stream::iter(jobs)
        .map(|job| {
            let writer = Arc::clone(&writer);
            async move {
                let outcome = writer
                    .write_tags(&job.path, job.date.as_deref(), Some(job.location))
                    .await;
                debug!(path = %job.path.display(), ?outcome, "gps tagging");
                (job.id, outcome)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut completed = BTreeSet::new();
    for (id, outcome) in outcomes {
        match outcome {
            TagOutcome::Written => {
                report.written += 1;
                completed.insert(id);
            }
            TagOutcome::Skipped(_) => report.skipped += 1,
            TagOutcome::Failed(_) => report.failed += 1,
        }
    }

    for id in &completed {
        if ledger.update(id, |record| record.metadata_written = true).await {
            report.marked += 1;
        }
    }
    if report.marked > 0 {
        ledger.persist().await?;
    }
    summary.persist().await?;

    info!(
        entries = report.entries,
        with_location = report.with_location,
        written = report.written,
        failed = report.failed,
        "location pass complete"
    );
    Ok(report)
}

/// Files to tag for a ledger filename: the file itself, or the media files
/// of its extracted folder. PNG files get no GPS.
async fn gps_targets(path: &Path) -> Vec<PathBuf> {
    if tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file()) {
        return if accepts_gps(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let folder = expansion_dir(path);
    if tokio::fs::metadata(&folder).await.is_ok_and(|m| m.is_dir()) {
        let mut files = media_files_in(&folder).await;
        files.retain(|file| accepts_gps(file));
        return files;
    }
    Vec::new()
}

fn accepts_gps(path: &Path) -> bool {
    lowercase_extension(path).as_deref() != Some("png")
}
