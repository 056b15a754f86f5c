//! On-disk naming for downloaded memories.
//!
//! Pattern: `[YYYYMMDD_HHMMSS_]<asset-id><ext>` directly under the download
//! folder. No collision handling is done here; identifiers are unique by
//! construction and a repeated name simply overwrites.

use std::path::{Path, PathBuf};

use url::Url;

use crate::dates::{filename_prefix, parse_capture_date};
use crate::identity::AssetId;

/// Extensions accepted verbatim from the URL path.
const URL_EXTENSIONS: &[&str] = &[".mp4", ".jpg", ".jpeg", ".png", ".zip"];

/// Extension used when neither the URL nor the content type decides.
pub const FALLBACK_EXTENSION: &str = ".mp4";

/// Builds the output path and bare filename for one asset.
///
/// The date prefix is only added when `capture_date` parses under one of
/// the accepted formats. The extension comes from the URL path when it is
/// in the allow-list, then from `content_type`, then [`FALLBACK_EXTENSION`].
#[must_use]
pub fn build_output_path(
    download_dir: &Path,
    id: &AssetId,
    capture_date: Option<&str>,
    content_type: Option<&str>,
    url: &str,
) -> (PathBuf, String) {
    let base = match capture_date.and_then(parse_capture_date) {
        Some(dt) => format!("{}_{id}", filename_prefix(&dt)),
        None => id.to_string(),
    };

    let extension = extension_from_url(url)
        .or_else(|| content_type.and_then(extension_from_content_type))
        .unwrap_or(FALLBACK_EXTENSION);

    let filename = format!("{base}{extension}");
    (download_dir.join(&filename), filename)
}

/// Returns the allow-listed extension of the URL's last path segment.
pub(crate) fn extension_from_url(url: &str) -> Option<&'static str> {
    let last_segment = match Url::parse(url) {
        Ok(parsed) => parsed.path_segments()?.next_back()?.to_string(),
        Err(_) => {
            let path = url.split('?').next().unwrap_or(url);
            path.rsplit('/').next().unwrap_or(path).to_string()
        }
    };
    let dot_index = last_segment.rfind('.')?;
    let ext = last_segment[dot_index..].to_ascii_lowercase();
    URL_EXTENSIONS.iter().copied().find(|known| *known == ext)
}

/// Guesses an extension from a Content-Type header by substring match.
pub(crate) fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let lowered = content_type.to_ascii_lowercase();
    if lowered.contains("video") {
        Some(".mp4")
    } else if lowered.contains("image/jpeg") || lowered.contains("image/jpg") {
        Some(".jpg")
    } else if lowered.contains("image/png") {
        Some(".png")
    } else if lowered.contains("zip") {
        Some(".zip")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> AssetId {
        AssetId::from_raw("abc123")
    }

    #[test]
    fn test_dated_jpeg_without_url_extension() {
        let (path, filename) = build_output_path(
            Path::new("out"),
            &id(),
            Some("2023-05-01 10:00:00"),
            Some("image/jpeg"),
            "https://example.com/dmd/memories?mid=abc123",
        );
        assert_eq!(filename, "20230501_100000_abc123.jpg");
        assert_eq!(path, Path::new("out").join("20230501_100000_abc123.jpg"));
    }

    #[test]
    fn test_unparseable_date_leaves_identifier_unprefixed() {
        let (_, filename) = build_output_path(
            Path::new("out"),
            &id(),
            Some("sometime last summer"),
            Some("image/png"),
            "https://example.com/get",
        );
        assert_eq!(filename, "abc123.png");
    }

    #[test]
    fn test_url_extension_wins_over_content_type() {
        let (_, filename) = build_output_path(
            Path::new("out"),
            &id(),
            None,
            Some("image/jpeg"),
            "https://cdn.example.com/media/clip.mp4?sig=1",
        );
        assert_eq!(filename, "abc123.mp4");
    }

    #[test]
    fn test_url_extension_outside_allow_list_is_ignored() {
        let (_, filename) = build_output_path(
            Path::new("out"),
            &id(),
            None,
            Some("application/zip"),
            "https://cdn.example.com/media/file.bin",
        );
        assert_eq!(filename, "abc123.zip");
    }

    #[test]
    fn test_fallback_extension_is_mp4() {
        let (_, filename) =
            build_output_path(Path::new("out"), &id(), None, None, "https://example.com/x");
        assert_eq!(filename, "abc123.mp4");
        let (_, filename) = build_output_path(
            Path::new("out"),
            &id(),
            None,
            Some("application/octet-stream"),
            "https://example.com/x",
        );
        assert_eq!(filename, "abc123.mp4");
    }

    #[test]
    fn test_extension_from_content_type_order() {
        assert_eq!(extension_from_content_type("video/mp4"), Some(".mp4"));
        assert_eq!(extension_from_content_type("image/jpg"), Some(".jpg"));
        assert_eq!(extension_from_content_type("IMAGE/JPEG; q=1"), Some(".jpg"));
        assert_eq!(extension_from_content_type("image/png"), Some(".png"));
        assert_eq!(
            extension_from_content_type("application/x-zip-compressed"),
            Some(".zip")
        );
        assert_eq!(extension_from_content_type("text/html"), None);
    }

    #[test]
    fn test_extension_from_url_handles_unparseable_url() {
        assert_eq!(extension_from_url("media/photo.JPG?x=1"), Some(".jpg"));
        assert_eq!(extension_from_url("media/photo"), None);
    }
}
