//! Generic mutex-guarded JSON map with atomic full-file persistence.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::LedgerError;
use crate::identity::AssetId;

/// A JSON object on disk mirrored by an in-memory map.
///
/// # Critical section
///
/// The map and the file share one lock. `persist()` serializes and writes
/// while holding it, so two persists never interleave and a persist always
/// writes a map that includes every `upsert` that returned before it took
/// the lock. Writes go to a sibling temp file which is fsynced and renamed
/// over the target, so a crash leaves either the previous or the new file.
///
/// The lock is held across the blocking write and its `sync_all`, so every
/// other call on the store, including the workers' `contains()` skip check,
/// waits for the fsync to finish. Persist throughput bounds the run.
#[derive(Debug)]
pub struct JsonStore<R> {
    path: PathBuf,
    entries: Mutex<BTreeMap<AssetId, R>>,
}

impl<R> JsonStore<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Loads the store from `path`, starting empty when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the file exists but cannot be read and
    /// [`LedgerError::Json`] if it is not a JSON object of records.
    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<BTreeMap<AssetId, R>>(&bytes)
                .map_err(|e| LedgerError::json(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(LedgerError::io(&path, e)),
        };
        debug!(entries = entries.len(), "loaded store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Creates an empty store that will persist to `path`.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true when `id` has a record.
    pub async fn contains(&self, id: &AssetId) -> bool {
        self.entries.lock().await.contains_key(id)
    }

    /// Returns a copy of the record for `id`.
    pub async fn get(&self, id: &AssetId) -> Option<R> {
        self.entries.lock().await.get(id).cloned()
    }

    /// Inserts or replaces the record for `id` in memory only.
    pub async fn upsert(&self, id: AssetId, record: R) {
        self.entries.lock().await.insert(id, record);
    }

    /// Applies `update` to the record for `id`, returning whether it existed.
    pub async fn update<F>(&self, id: &AssetId, update: F) -> bool
    where
        F: FnOnce(&mut R),
    {
        match self.entries.lock().await.get_mut(id) {
            Some(record) => {
                update(record);
                true
            }
            None => false,
        }
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true when no records are held.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Returns a copy of the whole map.
    pub async fn snapshot(&self) -> BTreeMap<AssetId, R> {
        self.entries.lock().await.clone()
    }

    /// Rewrites the backing file from the in-memory map.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if serialization, the write, or the rename
    /// fails. The previous file is left intact in that case.
    pub async fn persist(&self) -> Result<(), LedgerError> {
        let guard = self.entries.lock().await;
        let bytes =
            serde_json::to_vec_pretty(&*guard).map_err(|e| LedgerError::json(&self.path, e))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|source| LedgerError::Join {
                path: self.path.clone(),
                source,
            })??;
        debug!(path = %self.path.display(), entries = guard.len(), "persisted store");
        drop(guard);
        Ok(())
    }

    /// Inserts a record and rewrites the file.
    ///
    /// # Errors
    ///
    /// Same as [`persist`](Self::persist).
    pub async fn upsert_and_persist(&self, id: AssetId, record: R) -> Result<(), LedgerError> {
        self.upsert(id, record).await;
        self.persist().await
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LedgerError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| LedgerError::io(&dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| LedgerError::io(&dir, e))?;
    let temp_path = temp.path().to_path_buf();
    temp.write_all(bytes)
        .map_err(|e| LedgerError::io(&temp_path, e))?;
    temp.write_all(b"\n")
        .map_err(|e| LedgerError::io(&temp_path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| LedgerError::io(&temp_path, e))?;
    temp.persist(path)
        .map_err(|e| LedgerError::io(path, e.error))?;
    Ok(())
}
