//! Stable asset identifiers derived from download URLs.
//!
//! The identifier is the only key used for dedupe and for the ledger/error
//! stores, so it must be identical across process restarts.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[allow(clippy::expect_used)]
static MID_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mid=([a-zA-Z0-9\-]+)").expect("mid pattern is valid"));

/// Stable identifier for one remote asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Derives the identifier for `url`.
    ///
    /// Uses the value of the `mid=` query parameter when present, otherwise
    /// the lowercase hex SHA-256 digest of the raw URL string.
    #[must_use]
    pub fn resolve(url: &str) -> Self {
        if let Some(mid) = MID_PARAM.captures(url).and_then(|c| c.get(1)) {
            return Self(mid.as_str().to_string());
        }
        Self(hex::encode(Sha256::digest(url.as_bytes())))
    }

    /// Wraps an already-derived identifier (ledger keys, tests).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
