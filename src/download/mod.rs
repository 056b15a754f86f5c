//! Fetching memories from the export and recording the results.
//!
//! This module provides the download side of the pipeline:
//!
//! - [`HttpClient`] issues the GET or POST for one asset and streams the body to disk
//! - [`FetchWorker`] runs one [`DownloadTask`] end to end, from the ledger
//!   dedupe check through tagging and zip expansion to the ledger update
//! - [`DownloadEngine`] runs workers over a task list with bounded
//!   concurrency and persists the ledger after every successful download
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use memories_core::download::{DownloadEngine, DownloadTask, FetchWorker, HttpClient};
//! use memories_core::ledger::{ErrorLog, Ledger};
//! use memories_core::metadata::NoopWriter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Arc::new(Ledger::load("downloaded_files.json").await?);
//! let errors = Arc::new(ErrorLog::load("download_errors.json").await?);
//! let worker = FetchWorker::new(
//!     HttpClient::new(),
//!     "snapchat_memories",
//!     Arc::clone(&ledger),
//!     errors,
//!     Arc::new(NoopWriter),
//! );
//! let tasks = vec![DownloadTask::new("https://example.com/get?mid=abc", true, None, 0)];
//! let engine = DownloadEngine::new(4)?;
//! let summary = engine.run(Arc::new(worker), tasks).await?;
//! println!("downloaded {}, skipped {}", summary.downloaded, summary.skipped);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
pub mod filename;
mod task;
mod worker;

pub use client::{BROWSER_USER_AGENT, HttpClient};
pub use constants::{PROGRESS_INTERVAL, REQUEST_TIMEOUT_SECS};
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadStats, EngineError, RunSummary,
    default_concurrency,
};
pub use error::DownloadError;
pub use filename::build_output_path;
pub use task::DownloadTask;
pub use worker::{FetchWorker, StepOutcome, TaskOutcome, TaskResult};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
