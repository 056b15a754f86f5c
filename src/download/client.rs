//! HTTP client wrapper for fetching memories.
//!
//! This module provides the `HttpClient` struct which issues the export's
//! GET or POST requests and streams response bodies to disk.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::REQUEST_TIMEOUT_SECS;
use super::error::DownloadError;

/// Browser User-Agent sent with every request.
///
/// The memories endpoints reject obvious non-browser clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// HTTP client for fetching memories with streaming support.
///
/// Created once per run and shared by all workers so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default 60 second request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Creates a client with an explicit whole-request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends the request for one asset and checks for a 2xx status.
    ///
    /// GET requests go to `url` as is. POST requests go to the part of
    /// `url` before `?`, with the part after it sent as a form body.
    /// Redirects are followed.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for an unparseable URL,
    /// [`DownloadError::Timeout`] / [`DownloadError::Network`] for transport
    /// failures and [`DownloadError::HttpStatus`] for non-2xx responses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        is_get_request: bool,
    ) -> Result<reqwest::Response, DownloadError> {
        let request = if is_get_request {
            Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
            self.client.get(url)
        } else {
            let (endpoint, body) = url.split_once('?').unwrap_or((url, ""));
            Url::parse(endpoint).map_err(|_| DownloadError::invalid_url(url))?;
            self.client
                .post(endpoint)
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                )
                .body(body.to_string())
        };

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        debug!(status = status.as_u16(), "request succeeded");
        Ok(response)
    }

    /// Streams `response` into a new file at `path`, returning bytes written.
    ///
    /// A partially written file is removed when the stream fails.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the file cannot be created or written
    /// and [`DownloadError::Network`] if the body stream fails.
    pub async fn download_to_path(
        &self,
        response: reqwest::Response,
        path: &Path,
    ) -> Result<u64, DownloadError> {
        let url = response.url().to_string();
        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        let result = stream_to_file(&mut file, response, &url, path).await;
        if result.is_err() {
            debug!(path = %path.display(), "cleaning up partial file after error");
            drop(file);
            let _ = tokio::fs::remove_file(path).await;
        }
        result
    }
}

/// Returns the response's Content-Type header, if readable.
#[must_use]
pub(crate) fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Streams response body to file, returning bytes written.
///
/// This is extracted to enable cleanup on error in the caller.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
