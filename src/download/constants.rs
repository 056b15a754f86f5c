//! Constants for the download module.

/// Whole-request timeout for one asset fetch (60 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Progress is reported after this many completed tasks, and at the end.
pub const PROGRESS_INTERVAL: usize = 10;
