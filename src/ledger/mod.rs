//! Durable job ledger for memory downloads.
//!
//! Two independent JSON stores live next to each other:
//!
//! - [`Ledger`] (`downloaded_files.json`) maps an [`AssetId`] to a
//!   [`DownloadRecord`]. A present key means the asset is fully handled and
//!   later runs skip it.
//! - [`ErrorLog`] (`download_errors.json`) maps an [`AssetId`] to the last
//!   [`ErrorRecord`] seen for it. It is informational only; reruns retry
//!   these assets.
//!
//! Both stores keep the whole map in memory and rewrite the file on every
//! persist, using a temp file in the same directory plus an atomic rename.
//!
//! [`AssetId`]: crate::identity::AssetId

mod error;
mod store;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub use error::LedgerError;
pub use store::JsonStore;

/// Default ledger filename.
pub const LEDGER_FILE: &str = "downloaded_files.json";

/// Default error log filename.
pub const ERROR_LOG_FILE: &str = "download_errors.json";

/// One successfully downloaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Bare filename under the download folder. For zip downloads this is
    /// the `.zip` name; the extracted directory drops the extension.
    pub filename: String,
    /// Source URL as found in the export.
    pub url: String,
    /// Raw capture date string from the export.
    pub date: Option<String>,
    /// Content-Type reported by the server.
    pub content_type: Option<String>,
    /// Whether tagging succeeded for the file.
    #[serde(default)]
    pub metadata_written: bool,
    /// ISO 8601 time the record was created.
    pub timestamp: String,
}

/// The last failure seen for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Source URL as found in the export.
    pub url: String,
    /// Raw capture date string from the export.
    pub date: Option<String>,
    /// Human-readable failure message.
    pub error: String,
    /// Position of the task in the export.
    pub index: usize,
    /// ISO 8601 time of the failure.
    pub timestamp: String,
}

/// Store of completed downloads.
pub type Ledger = JsonStore<DownloadRecord>;

/// Store of failed downloads.
pub type ErrorLog = JsonStore<ErrorRecord>;

/// Current time as an ISO 8601 / RFC 3339 string.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
