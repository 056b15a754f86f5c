//! Reader for the `memories_history.html` export.
//!
//! Produces the ordered download links and the per-row date/location data
//! of the export's table. Link `i` pairs with table row `i`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::download::DownloadTask;
use crate::metadata::GeoPoint;

/// Default export filename.
pub const EXPORT_FILE: &str = "memories_history.html";

#[allow(clippy::expect_used)]
static DOWNLOAD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"downloadMemories\('(.+?)',\s*this,\s*(true|false)\)")
        .expect("download link regex is valid")
});

#[allow(clippy::expect_used)]
static COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Latitude,\s*Longitude:\s*([+-]?\d+\.?\d*),\s*([+-]?\d+\.?\d*)")
        .expect("coordinate regex is valid")
});

#[allow(clippy::expect_used)]
static TABLE_ROWS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("body > div.rightpanel > table > tbody > tr").expect("row selector is valid")
});

#[allow(clippy::expect_used)]
static TABLE_CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("cell selector is valid"));

/// Errors reading the export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The export file could not be read.
    #[error("could not read export {path}: {source}")]
    Read {
        /// The export path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// One `downloadMemories(...)` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLink {
    /// The URL argument.
    pub url: String,
    /// Whether the asset is fetched with GET (otherwise POST).
    pub is_get_request: bool,
}

/// One data row of the export table.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    /// Text of the first cell (the capture date).
    pub date: String,
    /// Coordinates found in any cell of the row.
    pub location: Option<GeoPoint>,
}

/// Parsed export contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportIndex {
    /// Download links in document order.
    pub links: Vec<ExportLink>,
    /// Table rows with at least one cell, in document order.
    pub rows: Vec<ExportRow>,
}

impl ExportIndex {
    /// Builds one task per link, pairing link `i` with row `i`'s date.
    #[must_use]
    pub fn tasks(&self) -> Vec<DownloadTask> {
        self.links
            .iter()
            .enumerate()
            .map(|(index, link)| DownloadTask {
                url: link.url.clone(),
                is_get_request: link.is_get_request,
                capture_date_raw: self.rows.get(index).map(|row| row.date.clone()),
                sequence_index: index,
            })
            .collect()
    }

    /// Location recorded in row `index`, if any.
    #[must_use]
    pub fn location(&self, index: usize) -> Option<GeoPoint> {
        self.rows.get(index).and_then(|row| row.location)
    }

    /// Number of rows carrying coordinates.
    #[must_use]
    pub fn location_count(&self) -> usize {
        self.rows.iter().filter(|row| row.location.is_some()).count()
    }
}

/// Reads and parses the export at `path`.
///
/// # Errors
///
/// Returns [`ExportError::Read`] when the file cannot be read.
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn read_export(path: &Path) -> Result<ExportIndex, ExportError> {
    let html = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ExportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let index = parse_export(&html);
    debug!(
        links = index.links.len(),
        rows = index.rows.len(),
        locations = index.location_count(),
        "parsed export"
    );
    Ok(index)
}

/// Parses export HTML. Never fails; an unrelated document yields nothing.
#[must_use]
pub fn parse_export(html: &str) -> ExportIndex {
    let links = DOWNLOAD_LINK
        .captures_iter(html)
        .map(|caps| ExportLink {
            url: caps[1].to_string(),
            is_get_request: &caps[2] == "true",
        })
        .collect();

    let document = Html::parse_document(html);
    let rows = document
        .select(&TABLE_ROWS)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&TABLE_CELLS).map(cell_text).collect();
            let date = cells.first()?.clone();
            let location = cells.iter().find_map(|text| parse_location(text));
            Some(ExportRow { date, location })
        })
        .collect();

    ExportIndex { links, rows }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().map(str::trim).collect::<String>()
}

fn parse_location(text: &str) -> Option<GeoPoint> {
    let caps = COORDINATES.captures(text)?;
    Some(GeoPoint {
        latitude: caps[1].parse().ok()?,
        longitude: caps[2].parse().ok()?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<html><body>
<div class="leftpanel"></div>
<div class="rightpanel"><table><tbody>
<tr><th>Date</th><th>Media Type</th><th>Location</th><th></th></tr>
<tr><td>2023-05-01 10:00:00 UTC</td><td>Image</td><td>Latitude, Longitude: 48.26275, 13.296288</td>
<td><a href="javascript:downloadMemories('https://app.snapchat.com/dmd/memories?uid=u&mid=AAA-111&ts=1', this, true)">Download</a></td></tr>
<tr><td>2023-05-02 11:30:00 UTC</td><td>Video</td><td>Latitude, Longitude: 0.0, 0.0</td>
<td><a href="javascript:downloadMemories('https://app.snapchat.com/dmd/memories?uid=u&mid=BBB-222&ts=2', this, false)">Download</a></td></tr>
<tr><td>2023-05-03 12:00:00 UTC</td><td>Image</td><td></td>
<td><a href="javascript:downloadMemories('https://cdn.example.com/x.jpg', this, true)">Download</a></td></tr>
</tbody></table></div>
</body></html>"#;

    #[test]
    fn test_parse_export_links_in_order() {
        let index = parse_export(SAMPLE);
        assert_eq!(index.links.len(), 3);
        assert!(index.links[0].url.ends_with("mid=AAA-111&ts=1"));
        assert!(index.links[0].is_get_request);
        assert!(!index.links[1].is_get_request);
    }

    #[test]
    fn test_parse_export_rows_skip_header() {
        let index = parse_export(SAMPLE);
        assert_eq!(index.rows.len(), 3);
        assert_eq!(index.rows[0].date, "2023-05-01 10:00:00 UTC");
    }

    #[test]
    fn test_locations_stay_aligned_with_rows() {
        let index = parse_export(SAMPLE);
        let first = index.location(0).unwrap();
        assert!((first.latitude - 48.26275).abs() < 1e-9);
        assert!((first.longitude - 13.296288).abs() < 1e-9);
        assert!(index.location(1).is_some());
        assert!(index.location(2).is_none());
        assert!(index.location(99).is_none());
        assert_eq!(index.location_count(), 2);
    }

    #[test]
    fn test_tasks_pair_links_with_dates() {
        let index = parse_export(SAMPLE);
        let tasks = index.tasks();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[1].sequence_index, 1);
        assert_eq!(
            tasks[1].capture_date_raw.as_deref(),
            Some("2023-05-02 11:30:00 UTC")
        );
        assert!(!tasks[1].is_get_request);
    }

    #[test]
    fn test_more_links_than_rows_leaves_date_empty() {
        let html = "<script>downloadMemories('https://e.com/a?mid=x', this, true)</script>";
        let tasks = parse_export(html).tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].capture_date_raw, None);
    }

    #[test]
    fn test_unrelated_document_is_empty() {
        let index = parse_export("<html><body><p>nothing here</p></body></html>");
        assert!(index.links.is_empty());
        assert!(index.rows.is_empty());
    }

    #[tokio::test]
    async fn test_read_export_missing_file() {
        let result = read_export(Path::new("/definitely/not/here.html")).await;
        assert!(matches!(result, Err(ExportError::Read { .. })));
    }
}
