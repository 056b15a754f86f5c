//! Duplicate removal inside extracted memory folders.
//!
//! Zip memories often carry the same media twice under different names.
//! Files directly inside each subfolder of the download folder are grouped
//! by SHA-256; one file per group is kept and the rest are deleted.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use futures_util::{StreamExt, stream};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors from duplicate scanning.
#[derive(Debug, Error)]
pub enum DedupeError {
    /// The folder to scan does not exist.
    #[error("folder '{path}' does not exist")]
    MissingRoot {
        /// The missing folder.
        path: PathBuf,
    },

    /// A folder could not be listed.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The folder involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Files with identical content inside one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Hex SHA-256 of the content.
    pub hash: String,
    /// File that stays.
    pub keep: PathBuf,
    /// Files that go.
    pub delete: Vec<PathBuf>,
}

/// Duplicate groups found in one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderDuplicates {
    /// The scanned folder.
    pub folder: PathBuf,
    /// Groups with at least one file to delete.
    pub groups: Vec<DuplicateGroup>,
}

/// Outcome of a dedupe pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeReport {
    /// Folders holding duplicates, sorted by path.
    pub folders: Vec<FolderDuplicates>,
    /// Files marked for deletion.
    pub planned: usize,
    /// Files actually deleted.
    pub deleted: usize,
    /// Files that could not be deleted.
    pub failed: usize,
    /// Whether deletion was skipped.
    pub dry_run: bool,
}

/// Identifier part of a folder name: the text after the second `_` of
/// `YYYYMMDD_HHMMSS_<id>`, or the whole name without any `_`.
fn folder_identifier(folder_name: &str) -> &str {
    if folder_name.contains('_') {
        folder_name.splitn(3, '_').last().unwrap_or(folder_name)
    } else {
        folder_name
    }
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn scan_folder(folder: &Path) -> Result<Vec<DuplicateGroup>, DedupeError> {
    let io_err = |source| DedupeError::Io {
        path: folder.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    if files.len() < 2 {
        return Ok(Vec::new());
    }
    files.sort();

    let mut by_hash: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        match hash_file(&path) {
            Ok(hash) => by_hash.entry(hash).or_default().push(path),
            Err(e) => warn!(path = %path.display(), error = %e, "could not hash file, ignoring it"),
        }
    }

    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = folder_identifier(&folder_name);

    let groups = by_hash
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(hash, mut paths)| {
            let keep_index = paths
                .iter()
                .position(|p| {
                    p.file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with(prefix))
                })
                .unwrap_or(0);
            let keep = paths.remove(keep_index);
            DuplicateGroup {
                hash,
                keep,
                delete: paths,
            }
        })
        .collect();
    Ok(groups)
}

/// Finds duplicate groups among the files directly inside `folder`.
///
/// Unreadable files are left out of the comparison.
///
/// # Errors
///
/// Returns [`DedupeError::Io`] if the folder cannot be listed.
pub async fn find_duplicates(folder: &Path) -> Result<Vec<DuplicateGroup>, DedupeError> {
    let folder = folder.to_path_buf();
    let task_folder = folder.clone();
    tokio::task::spawn_blocking(move || scan_folder(&task_folder))
        .await
        .map_err(|e| DedupeError::Io {
            path: folder,
            source: std::io::Error::other(e),
        })?
}

/// Scans every direct subfolder of `root` and deletes duplicates unless
/// `dry_run` is set.
///
/// # Errors
///
/// Returns [`DedupeError::MissingRoot`] when `root` is absent and
/// [`DedupeError::Io`] when it cannot be listed. Subfolder and deletion
/// errors are logged and counted.
#[instrument(skip(root), fields(root = %root.display()))]
pub async fn remove_duplicates(
    root: &Path,
    dry_run: bool,
    concurrency: usize,
) -> Result<DedupeReport, DedupeError> {
    if !tokio::fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
        return Err(DedupeError::MissingRoot {
            path: root.to_path_buf(),
        });
    }

    let io_err = |source| DedupeError::Io {
        path: root.to_path_buf(),
        source,
    };
    let mut subfolders = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        if entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
            subfolders.push(entry.path());
        }
    }
    debug!(subfolders = subfolders.len(), "scanning for duplicates");

    let mut folders: Vec<FolderDuplicates> = stream::iter(subfolders)
        .map(|folder| async move {
            match find_duplicates(&folder).await {
                Ok(groups) => FolderDuplicates { folder, groups },
                Err(e) => {
                    warn!(error = %e, "skipping folder");
                    FolderDuplicates {
                        folder,
                        groups: Vec::new(),
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .filter(|found| std::future::ready(!found.groups.is_empty()))
        .collect()
        .await;
    folders.sort_by(|a, b| a.folder.cmp(&b.folder));

    let mut report = DedupeReport {
        planned: folders
            .iter()
            .flat_map(|f| &f.groups)
            .map(|g| g.delete.len())
            .sum(),
        dry_run,
        ..DedupeReport::default()
    };

    if !dry_run {
        for group in folders.iter().flat_map(|f| &f.groups) {
            for path in &group.delete {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => {
                        debug!(path = %path.display(), keep = %group.keep.display(), "deleted duplicate");
                        report.deleted += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "could not delete duplicate");
                        report.failed += 1;
                    }
                }
            }
        }
    }
    report.folders = folders;

    info!(
        folders = report.folders.len(),
        planned = report.planned,
        deleted = report.deleted,
        failed = report.failed,
        dry_run,
        "dedupe complete"
    );
    Ok(report)
}
