//! The unit of work handed to a [`FetchWorker`](super::FetchWorker).

/// One asset to fetch, as listed in the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// URL from the export's `downloadMemories(...)` call.
    pub url: String,
    /// GET when true, otherwise POST with the query string as body.
    pub is_get_request: bool,
    /// Raw capture date from the matching table row.
    pub capture_date_raw: Option<String>,
    /// Position in the export, kept for error reports.
    pub sequence_index: usize,
}

impl DownloadTask {
    /// Creates a task.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        is_get_request: bool,
        capture_date_raw: Option<String>,
        sequence_index: usize,
    ) -> Self {
        Self {
            url: url.into(),
            is_get_request,
            capture_date_raw,
            sequence_index,
        }
    }
}
