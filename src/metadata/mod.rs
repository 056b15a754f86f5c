//! Capture-date and GPS tagging of downloaded media.
//!
//! Tagging is delegated to an external tool behind the [`MetadataWriter`]
//! trait. The download pipeline only looks at the returned [`TagOutcome`];
//! a failed or skipped write never fails a download.

mod exiftool;
pub mod locations;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use exiftool::{DEFAULT_EXIFTOOL, ExifTool};

/// Extensions that get image tags.
pub(crate) const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions that get video tags.
pub(crate) const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// A latitude/longitude pair from the export's location column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Degrees north (negative is south).
    pub latitude: f64,
    /// Degrees east (negative is west).
    pub longitude: f64,
}

/// Result of one tagging attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// Tags were written to the file.
    Written,
    /// Nothing was attempted (tool missing, helper file, no usable data).
    Skipped(String),
    /// The tool ran and reported an error.
    Failed(String),
}

impl TagOutcome {
    /// Returns true only for [`TagOutcome::Written`].
    #[must_use]
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Writes descriptive metadata into a media file.
#[async_trait]
pub trait MetadataWriter: Send + Sync + fmt::Debug {
    /// Tags `path` with the capture date and, when given, a location.
    async fn write_tags(
        &self,
        path: &Path,
        date: Option<&str>,
        location: Option<GeoPoint>,
    ) -> TagOutcome;
}

/// Writer used when tagging is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWriter;

#[async_trait]
impl MetadataWriter for NoopWriter {
    async fn write_tags(
        &self,
        _path: &Path,
        _date: Option<&str>,
        _location: Option<GeoPoint>,
    ) -> TagOutcome {
        TagOutcome::Skipped("metadata tagging disabled".to_string())
    }
}

/// Counts from tagging every media file of a folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderTagReport {
    /// Files tagged successfully.
    pub written: usize,
    /// Files skipped by the writer.
    pub skipped: usize,
    /// Files the writer failed on.
    pub failed: usize,
}

impl FolderTagReport {
    fn record(&mut self, outcome: &TagOutcome) {
        match outcome {
            TagOutcome::Written => self.written += 1,
            TagOutcome::Skipped(_) => self.skipped += 1,
            TagOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Returns true when `path` has a taggable media extension.
#[must_use]
pub fn is_media_file(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| {
        IMAGE_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
    })
}

pub(crate) fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Recursively lists media files under `dir`, sorted by path.
///
/// Unreadable directories are skipped.
pub async fn media_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&current).await else {
            debug!(dir = %current.display(), "skipping unreadable directory");
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => stack.push(path),
                Ok(kind) if kind.is_file() && is_media_file(&path) => found.push(path),
                _ => {}
            }
        }
    }

    found.sort();
    found
}

/// Tags every media file under `dir`. Best-effort; never fails.
pub async fn tag_folder(
    writer: &dyn MetadataWriter,
    dir: &Path,
    date: Option<&str>,
    location: Option<GeoPoint>,
) -> FolderTagReport {
    let mut report = FolderTagReport::default();
    for file in media_files_in(dir).await {
        let outcome = writer.write_tags(&file, date, location).await;
        debug!(path = %file.display(), ?outcome, "tagged extracted file");
        report.record(&outcome);
    }
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingWriter {
        seen: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl MetadataWriter for RecordingWriter {
        async fn write_tags(
            &self,
            path: &Path,
            _date: Option<&str>,
            _location: Option<GeoPoint>,
        ) -> TagOutcome {
            self.seen.lock().unwrap().push(path.to_path_buf());
            if path.to_string_lossy().contains("overlay") {
                TagOutcome::Skipped("overlay".to_string())
            } else {
                TagOutcome::Written
            }
        }
    }

    #[test]
    fn test_is_media_file() {
        assert!(is_media_file(Path::new("a/b.JPG")));
        assert!(is_media_file(Path::new("clip.mov")));
        assert!(!is_media_file(Path::new("notes.txt")));
        assert!(!is_media_file(Path::new("no_extension")));
    }

    #[tokio::test]
    async fn test_tag_folder_walks_nested_media_only() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("main.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("main-overlay.png"), b"x").unwrap();
        std::fs::write(dir.path().join("nested/clip.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let writer = RecordingWriter::default();
        let report = tag_folder(&writer, dir.path(), Some("2023-01-01"), None).await;

        assert_eq!(writer.seen.lock().unwrap().len(), 3);
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_noop_writer_skips() {
        let outcome = NoopWriter
            .write_tags(Path::new("x.jpg"), Some("2023-01-01"), None)
            .await;
        assert!(!outcome.is_written());
        assert!(matches!(outcome, TagOutcome::Skipped(_)));
    }
}
