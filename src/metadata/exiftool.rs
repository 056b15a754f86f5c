//! `exiftool`-backed [`MetadataWriter`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{GeoPoint, IMAGE_EXTENSIONS, MetadataWriter, TagOutcome, VIDEO_EXTENSIONS};
use crate::dates::{exif_datetime, parse_capture_date};

/// Default program name looked up on `PATH`.
pub const DEFAULT_EXIFTOOL: &str = "exiftool";

/// Name fragments of helper files that never get tags.
const HELPER_MARKERS: &[&str] = &["-overlay", "thumbnail"];

/// Writes EXIF/QuickTime tags by shelling out to `exiftool`.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    available: bool,
}

impl ExifTool {
    /// Probes `program -ver` once and remembers whether it works.
    pub async fn detect(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let available = Command::new(&program)
            .arg("-ver")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success());
        if available {
            info!(program = %program.display(), "exiftool found, metadata will be written to files");
        } else {
            warn!(
                program = %program.display(),
                "exiftool not found, metadata will not be written (install from https://exiftool.org/)"
            );
        }
        Self { program, available }
    }

    /// Returns whether the probe succeeded.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }
}

#[async_trait]
impl MetadataWriter for ExifTool {
    async fn write_tags(
        &self,
        path: &Path,
        date: Option<&str>,
        location: Option<GeoPoint>,
    ) -> TagOutcome {
        if !self.available {
            return TagOutcome::Skipped("exiftool unavailable".to_string());
        }
        let captured = date.and_then(parse_capture_date);
        if captured.is_none() && location.is_none() {
            return TagOutcome::Skipped("no parseable date or location".to_string());
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if HELPER_MARKERS.iter().any(|marker| filename.contains(marker)) {
            if let Some(dt) = captured {
                set_mtime(path, dt).await;
            }
            return TagOutcome::Skipped(format!("helper file {filename}"));
        }

        let Some(args) = tag_args(path, captured.as_ref(), location) else {
            if let Some(dt) = captured {
                set_mtime(path, dt).await;
            }
            return TagOutcome::Skipped(format!("no tags apply to {filename}"));
        };

        let output = Command::new(&self.program)
            .arg("-overwrite_original")
            .arg("-q")
            .args(&args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                if let Some(dt) = captured {
                    set_mtime(path, dt).await;
                }
                debug!(path = %path.display(), "metadata written");
                TagOutcome::Written
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                debug!(path = %path.display(), %stderr, "exiftool reported failure");
                TagOutcome::Failed(format!("exiftool exited with {}: {stderr}", output.status))
            }
            Err(e) => TagOutcome::Failed(format!("failed to run exiftool: {e}")),
        }
    }
}

/// Builds the tag arguments for one file, or `None` when nothing applies.
fn tag_args(
    path: &Path,
    captured: Option<&NaiveDateTime>,
    location: Option<GeoPoint>,
) -> Option<Vec<String>> {
    let ext = super::lowercase_extension(path)?;
    let is_image = IMAGE_EXTENSIONS.contains(&ext.as_str());
    let is_video = VIDEO_EXTENSIONS.contains(&ext.as_str());
    if !is_image && !is_video {
        return None;
    }

    let mut args = Vec::new();
    // PNG has no reliable GPS block.
    if let Some(point) = location
        && ext != "png"
    {
        let lat_ref = if point.latitude >= 0.0 { "N" } else { "S" };
        let lon_ref = if point.longitude >= 0.0 { "E" } else { "W" };
        args.push(format!("-GPSLatitude={}", point.latitude.abs()));
        args.push(format!("-GPSLatitudeRef={lat_ref}"));
        args.push(format!("-GPSLongitude={}", point.longitude.abs()));
        args.push(format!("-GPSLongitudeRef={lon_ref}"));
    }

    if let Some(dt) = captured {
        let stamp = exif_datetime(dt);
        let tags: &[&str] = if is_image {
            &["DateTimeOriginal", "CreateDate", "ModifyDate"]
        } else {
            &["CreateDate", "MediaCreateDate", "TrackCreateDate", "ModifyDate"]
        };
        args.extend(tags.iter().map(|tag| format!("-{tag}={stamp}")));
    }

    (!args.is_empty()).then_some(args)
}

/// Sets the file's modification time to the capture time (local zone).
async fn set_mtime(path: &Path, dt: NaiveDateTime) {
    let Some(local) = Local.from_local_datetime(&dt).earliest() else {
        return;
    };
    let when: SystemTime = local.into();
    let path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        std::fs::File::options()
            .write(true)
            .open(&path)
            .and_then(|file| file.set_modified(when))
    })
    .await;
    if let Ok(Err(e)) = result {
        debug!(error = %e, "could not set file modification time");
    }
}
