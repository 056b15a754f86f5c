//! Memories Core Library
//!
//! This library provides the pipeline behind the `memories` tool, which
//! downloads the photos and videos listed in a Snapchat "Memories" export,
//! tags them with capture date and location, and tidies extracted archives.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`identity`] - Stable asset identifiers derived from URLs
//! - [`ledger`] - Durable JSON ledger of downloads and failures
//! - [`download`] - HTTP fetch, per-asset worker and concurrent engine
//! - [`archive`] - Zip expansion of multi-part memories
//! - [`metadata`] - Date/GPS tagging through an external tool
//! - [`export`] - Reader for `memories_history.html`
//! - [`dedupe`] - Duplicate removal inside extracted folders
//! - [`config`] - Optional TOML configuration file

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod dates;
pub mod dedupe;
pub mod download;
pub mod export;
pub mod identity;
pub mod ledger;
pub mod metadata;

// Re-export commonly used types
pub use download::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadError, DownloadStats, DownloadTask, EngineError,
    FetchWorker, HttpClient, RunSummary, TaskOutcome,
};
pub use export::{ExportIndex, parse_export, read_export};
pub use identity::AssetId;
pub use ledger::{DownloadRecord, ErrorLog, ErrorRecord, Ledger, LedgerError};
pub use metadata::{ExifTool, MetadataWriter, NoopWriter, TagOutcome};
