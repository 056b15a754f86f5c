//! Per-asset download lifecycle.
//!
//! A [`FetchWorker`] takes one [`DownloadTask`] from the ledger check to the
//! ledger update. Fetch and disk writes are hard steps: their
//! [`DownloadError`] fails the task and lands in the error log. Tagging and
//! zip expansion are soft steps reported as [`StepOutcome`]; they never fail
//! the task.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, content_type};
use super::error::DownloadError;
use super::filename::build_output_path;
use super::task::DownloadTask;
use crate::archive::expand_archive;
use crate::identity::AssetId;
use crate::ledger::{DownloadRecord, ErrorLog, ErrorRecord, Ledger, now_timestamp};
use crate::metadata::{FolderTagReport, MetadataWriter, TagOutcome, tag_folder};

/// Result of a sub-step that is allowed to fail without failing the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    /// The step did its job.
    Success(T),
    /// The step did not apply or did not work; the reason is logged only.
    SoftFailure(String),
}

impl<T> StepOutcome<T> {
    /// Returns true for [`StepOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<TagOutcome> for StepOutcome<()> {
    fn from(outcome: TagOutcome) -> Self {
        match outcome {
            TagOutcome::Written => Self::Success(()),
            TagOutcome::Skipped(reason) => Self::SoftFailure(format!("skipped: {reason}")),
            TagOutcome::Failed(reason) => Self::SoftFailure(reason),
        }
    }
}

/// Classified result of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The identifier was already in the ledger; nothing was fetched.
    Skipped,
    /// The asset was fetched, stored and added to the in-memory ledger.
    Downloaded,
    /// A hard step failed; the error log has the details.
    Failed,
}

/// What a worker reports back for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    /// Identifier derived from the task URL.
    pub id: AssetId,
    /// The task's position in the export.
    pub index: usize,
    /// How the task ended.
    pub outcome: TaskOutcome,
}

/// Runs the download lifecycle for single tasks.
///
/// Shared by all concurrent tasks of a run behind an `Arc`. The worker only
/// upserts into the ledger; persisting it is the engine's job. Failures are
/// persisted to the error log immediately.
#[derive(Debug)]
pub struct FetchWorker {
    client: HttpClient,
    download_dir: PathBuf,
    ledger: Arc<Ledger>,
    errors: Arc<ErrorLog>,
    tagger: Arc<dyn MetadataWriter>,
}

impl FetchWorker {
    /// Creates a worker writing into `download_dir`.
    #[must_use]
    pub fn new(
        client: HttpClient,
        download_dir: impl Into<PathBuf>,
        ledger: Arc<Ledger>,
        errors: Arc<ErrorLog>,
        tagger: Arc<dyn MetadataWriter>,
    ) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
            ledger,
            errors,
            tagger,
        }
    }

    /// Folder downloads are written into.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// The ledger this worker records successes in.
    #[must_use]
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// The error log this worker records failures in.
    #[must_use]
    pub fn error_log(&self) -> &Arc<ErrorLog> {
        &self.errors
    }

    /// Processes one task. Never returns an error; failures are classified.
    #[instrument(skip(self, task), fields(index = task.sequence_index))]
    pub async fn process(&self, task: &DownloadTask) -> TaskResult {
        let id = AssetId::resolve(&task.url);

        if self.ledger.contains(&id).await {
            debug!(asset_id = %id, "already downloaded, skipping");
            return TaskResult {
                id,
                index: task.sequence_index,
                outcome: TaskOutcome::Skipped,
            };
        }

        let outcome = match self.fetch_and_store(&id, task).await {
            Ok(record) => {
                info!(asset_id = %id, filename = %record.filename, "downloaded");
                self.ledger.upsert(id.clone(), record).await;
                TaskOutcome::Downloaded
            }
            Err(error) => {
                warn!(
                    asset_id = %id,
                    index = task.sequence_index,
                    error = %error,
                    "download failed"
                );
                self.record_failure(&id, task, &error).await;
                TaskOutcome::Failed
            }
        };

        TaskResult {
            id,
            index: task.sequence_index,
            outcome,
        }
    }

    /// Writes an [`ErrorRecord`] for `id` and persists the error log.
    ///
    /// A failed persist is logged and otherwise ignored; the in-memory entry
    /// is written out with the next failure.
    pub async fn record_failure(&self, id: &AssetId, task: &DownloadTask, error: &DownloadError) {
        let record = ErrorRecord {
            url: task.url.clone(),
            date: task.capture_date_raw.clone(),
            error: error.to_string(),
            index: task.sequence_index,
            timestamp: now_timestamp(),
        };
        if let Err(e) = self.errors.upsert_and_persist(id.clone(), record).await {
            warn!(asset_id = %id, error = %e, "failed to persist error log");
        }
    }

    async fn fetch_and_store(
        &self,
        id: &AssetId,
        task: &DownloadTask,
    ) -> Result<DownloadRecord, DownloadError> {
        let response = self.client.fetch(&task.url, task.is_get_request).await?;
        let content_type = content_type(&response);

        let (path, filename) = build_output_path(
            &self.download_dir,
            id,
            task.capture_date_raw.as_deref(),
            content_type.as_deref(),
            &task.url,
        );
        let bytes = self.client.download_to_path(response, &path).await?;
        debug!(asset_id = %id, path = %path.display(), bytes, "saved");

        let date = task.capture_date_raw.as_deref();
        let tagged = self.tag_file(&path, date).await;
        if let StepOutcome::SoftFailure(reason) = &tagged {
            debug!(asset_id = %id, %reason, "metadata not written");
        }

        if is_zip(&filename) {
            match self.expand_and_tag(&path, date).await {
                StepOutcome::Success(report) => debug!(
                    asset_id = %id,
                    written = report.written,
                    skipped = report.skipped,
                    failed = report.failed,
                    "tagged extracted files"
                ),
                StepOutcome::SoftFailure(reason) => {
                    warn!(asset_id = %id, %reason, "zip expansion skipped");
                }
            }
        }

        Ok(DownloadRecord {
            filename,
            url: task.url.clone(),
            date: task.capture_date_raw.clone(),
            content_type,
            metadata_written: tagged.is_success(),
            timestamp: now_timestamp(),
        })
    }

    async fn tag_file(&self, path: &Path, date: Option<&str>) -> StepOutcome<()> {
        self.tagger.write_tags(path, date, None).await.into()
    }

    async fn expand_and_tag(
        &self,
        zip_path: &Path,
        date: Option<&str>,
    ) -> StepOutcome<FolderTagReport> {
        match expand_archive(zip_path).await {
            Ok(folder) => {
                StepOutcome::Success(tag_folder(self.tagger.as_ref(), &folder, date, None).await)
            }
            Err(e) => StepOutcome::SoftFailure(e.to_string()),
        }
    }
}

fn is_zip(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".zip")
}
