//! Capture-date parsing for the export's date column.
//!
//! The export is not consistent about its date format, so the accepted
//! formats are tried in order and the first match wins.

use chrono::{NaiveDate, NaiveDateTime};

/// Date-time formats tried in order after stripping a trailing `UTC`.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%d.%m.%Y %H:%M:%S"];

/// Date-only formats, interpreted as midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Parses a raw capture date from the export.
///
/// Accepts `YYYY-MM-DD HH:MM:SS [UTC]`, `YYYY-MM-DD` and
/// `DD.MM.YYYY [HH:MM:SS]`. Returns `None` for anything else.
#[must_use]
pub fn parse_capture_date(raw: &str) -> Option<NaiveDateTime> {
    let cleaned = raw.replace("UTC", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cleaned, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Filename prefix form, `YYYYMMDD_HHMMSS`.
#[must_use]
pub fn filename_prefix(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m%d_%H%M%S").to_string()
}

/// EXIF form, `YYYY:MM:DD HH:MM:SS`.
#[must_use]
pub fn exif_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y:%m:%d %H:%M:%S").to_string()
}
