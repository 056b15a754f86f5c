//! Download engine for running fetch workers concurrently.
//!
//! This module provides the `DownloadEngine` which runs a [`FetchWorker`]
//! over a task list using a semaphore-based concurrency control pattern and
//! keeps the ledger durable while the run progresses.
//!
//! # Overview
//!
//! Every task is spawned onto a [`JoinSet`] up front and waits for a permit
//! inside its own Tokio task. Results are collected in completion order, so
//! the ledger is persisted as soon as each download lands rather than at the
//! end of the batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::constants::PROGRESS_INTERVAL;
use super::error::DownloadError;
use super::task::DownloadTask;
use super::worker::{FetchWorker, TaskOutcome, TaskResult};
use crate::identity::AssetId;
use crate::ledger::LedgerError;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Concurrency used when the CPU count cannot be determined.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default worker count: half the available CPUs, at least 2.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|cpus| (cpus.get() / 2).max(2))
        .unwrap_or(DEFAULT_CONCURRENCY)
        .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Error type for download engine operations.
///
/// Individual task failures are never engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The download folder could not be created.
    #[error("could not create download folder {path}: {source}")]
    CreateDir {
        /// The folder path.
        path: std::path::PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The final ledger persist failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Live counters for a run.
///
/// Shared with the caller through [`DownloadEngine::stats`] so a progress
/// display can poll them while [`DownloadEngine::run`] is in flight.
#[derive(Debug, Default)]
pub struct DownloadStats {
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    total: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of assets downloaded so far.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Returns the number of tasks skipped as already downloaded.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of failed tasks.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of finished tasks.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.downloaded() + self.skipped() + self.failed()
    }

    /// Returns the size of the current task list.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Counts one finished task.
    pub fn record(&self, outcome: TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Downloaded => &self.downloaded,
            TaskOutcome::Skipped => &self.skipped,
            TaskOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            downloaded: self.downloaded(),
            skipped: self.skipped(),
            failed: self.failed(),
            total: self.total(),
        }
    }
}

/// Final counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Assets fetched in this run.
    pub downloaded: usize,
    /// Tasks whose identifier was already in the ledger.
    pub skipped: usize,
    /// Tasks that ended in the error log.
    pub failed: usize,
    /// Tasks scheduled.
    pub total: usize,
}

/// Bounded-concurrency scheduler for [`FetchWorker`]s.
///
/// # Concurrency Model
///
/// - Each task runs in its own Tokio task on a [`JoinSet`]
/// - A semaphore permit is acquired inside the task before any work starts
/// - Permits are released automatically when the task ends (RAII)
/// - A panicking task is reported as a failed outcome and logged to the
///   error log; it never aborts the run
///
/// # Durability
///
/// The ledger is persisted after every `Downloaded` result and once more
/// after the last task, whatever the outcome mix.
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    stats: Arc<DownloadStats>,
}

impl DownloadEngine {
    /// Creates a new engine with the specified concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use memories_core::download::DownloadEngine;
    ///
    /// let engine = DownloadEngine::new(8).unwrap();
    /// assert_eq!(engine.concurrency(), 8);
    /// ```
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating download engine");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            stats: Arc::new(DownloadStats::new()),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the live counters of this engine.
    #[must_use]
    pub fn stats(&self) -> Arc<DownloadStats> {
        Arc::clone(&self.stats)
    }

    /// Runs `worker` over every task and returns the final counts.
    ///
    /// Creates the worker's download folder if needed. Results are handled
    /// in completion order; progress is logged every
    /// [`PROGRESS_INTERVAL`](super::PROGRESS_INTERVAL) completions and at
    /// the end.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CreateDir`] if the download folder cannot be
    /// created and [`EngineError::Ledger`] if the final ledger persist
    /// fails. Individual task failures do NOT cause this method to error.
    #[instrument(skip(self, worker, tasks), fields(tasks = tasks.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        worker: Arc<FetchWorker>,
        tasks: Vec<DownloadTask>,
    ) -> Result<RunSummary, EngineError> {
        let download_dir = worker.download_dir().to_path_buf();
        tokio::fs::create_dir_all(&download_dir)
            .await
            .map_err(|source| EngineError::CreateDir {
                path: download_dir.clone(),
                source,
            })?;

        let total = tasks.len();
        self.stats.total.fetch_add(total, Ordering::SeqCst);
        info!(total, dir = %download_dir.display(), "starting downloads");

        let mut set = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(total);
        for task in tasks {
            let semaphore = Arc::clone(&self.semaphore);
            let worker = Arc::clone(&worker);
            let spawned = task.clone();
            let handle = set.spawn(async move {
                // Held until the task ends.
                let _permit = semaphore.acquire_owned().await;
                worker.process(&spawned).await
            });
            in_flight.insert(handle.id(), task);
        }

        let mut finished = 0usize;
        while let Some(joined) = set.join_next_with_id().await {
            let result = match joined {
                Ok((task_id, result)) => {
                    in_flight.remove(&task_id);
                    result
                }
                Err(join_error) => {
                    let Some(task) = in_flight.remove(&join_error.id()) else {
                        warn!(error = %join_error, "unknown download task ended abnormally");
                        continue;
                    };
                    aborted_result(&worker, &task, &join_error.to_string()).await
                }
            };

            self.stats.record(result.outcome);
            if result.outcome == TaskOutcome::Downloaded
                && let Err(e) = worker.ledger().persist().await
            {
                warn!(asset_id = %result.id, error = %e, "failed to persist ledger, will retry");
            }

            finished += 1;
            if finished % PROGRESS_INTERVAL == 0 {
                info!(
                    finished,
                    total,
                    downloaded = self.stats.downloaded(),
                    skipped = self.stats.skipped(),
                    failed = self.stats.failed(),
                    "progress"
                );
            }
        }

        worker.ledger().persist().await?;

        let summary = self.stats.summary();
        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            total,
            "downloads complete"
        );
        Ok(summary)
    }
}

/// Converts a panicked or cancelled task into a failed outcome.
async fn aborted_result(worker: &FetchWorker, task: &DownloadTask, reason: &str) -> TaskResult {
    let id = AssetId::resolve(&task.url);
    let error = DownloadError::aborted(&task.url, reason);
    warn!(asset_id = %id, index = task.sequence_index, error = %error, "download task aborted");
    worker.record_failure(&id, task, &error).await;
    TaskResult {
        id,
        index: task.sequence_index,
        outcome: TaskOutcome::Failed,
    }
}
