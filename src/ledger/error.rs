//! Error types for ledger persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or persisting a JSON store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading, writing, or renaming the backing file failed.
    #[error("IO error on ledger file {path}: {source}")]
    Io {
        /// The ledger file involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but does not hold a valid JSON object.
    #[error("ledger file {path} is not valid JSON: {source}")]
    Json {
        /// The ledger file involved.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The blocking write task panicked or was cancelled.
    #[error("ledger write task for {path} did not complete: {source}")]
    Join {
        /// The ledger file involved.
        path: PathBuf,
        /// The join failure.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl LedgerError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a JSON error.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
