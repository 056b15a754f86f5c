//! Zip expansion for multi-part memories.
//!
//! Some memories arrive as a zip holding the base media plus overlay
//! images. The archive is unpacked into a sibling folder with the same base
//! name and then removed, so the folder takes the archive's place on disk.

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors from zip expansion. All of them leave the archive in place.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive could not be opened or a file could not be written.
    #[error("IO error expanding {path}: {source}")]
    Io {
        /// The archive or entry path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The archive is corrupt or uses an unsupported feature.
    #[error("invalid zip archive {path}: {source}")]
    Zip {
        /// The archive path.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// The blocking extraction task panicked.
    #[error("extraction task for {path} did not complete")]
    Join {
        /// The archive path.
        path: PathBuf,
    },
}

/// Folder a zip at `zip_path` expands into: the same path without extension.
#[must_use]
pub fn expansion_dir(zip_path: &Path) -> PathBuf {
    zip_path.with_extension("")
}

/// Extracts `zip_path` into [`expansion_dir`] and deletes the archive.
///
/// Returns the folder path on success. On failure the archive is kept and
/// a folder created by this call is removed again.
///
/// # Errors
///
/// Returns [`ArchiveError`] when the archive cannot be read, an entry
/// cannot be written, or the archive cannot be removed afterwards.
#[instrument(level = "debug", skip(zip_path), fields(path = %zip_path.display()))]
pub async fn expand_archive(zip_path: &Path) -> Result<PathBuf, ArchiveError> {
    let zip_path = zip_path.to_path_buf();
    let task_path = zip_path.clone();
    tokio::task::spawn_blocking(move || expand_blocking(&task_path))
        .await
        .map_err(|_| ArchiveError::Join { path: zip_path })?
}

fn expand_blocking(zip_path: &Path) -> Result<PathBuf, ArchiveError> {
    let dest = expansion_dir(zip_path);
    let created_dest = !dest.exists();

    let result = extract_into(zip_path, &dest);
    if let Err(error) = result {
        if created_dest && dest.exists() {
            debug!(dest = %dest.display(), "removing partial extraction");
            let _ = std::fs::remove_dir_all(&dest);
        }
        warn!(path = %zip_path.display(), error = %error, "zip expansion failed, keeping archive");
        return Err(error);
    }

    std::fs::remove_file(zip_path).map_err(|source| ArchiveError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    info!(
        archive = %zip_path.display(),
        dest = %dest.display(),
        "expanded archive and removed zip"
    );
    Ok(dest)
}

fn extract_into(zip_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file = File::open(zip_path).map_err(|source| ArchiveError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| ArchiveError::Zip {
        path: zip_path.to_path_buf(),
        source,
    })?;
    std::fs::create_dir_all(dest).map_err(|source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    // `extract` rejects entries whose names escape `dest`.
    archive.extract(dest).map_err(|source| ArchiveError::Zip {
        path: zip_path.to_path_buf(),
        source,
    })?;
    Ok(archive.len())
}
