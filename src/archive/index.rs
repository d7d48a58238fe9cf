//! Archive index - JSON map of archive id to [`ArchiveRecord`]
//!
//! The index file is rewritten wholesale on every mutation. Load, mutate and
//! save happen under one mutex, and the in-memory map is only replaced after
//! the file has been renamed into place, so a failed write leaves both the
//! file and the map at their previous state.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::ArchiveRecord;
use crate::utils::atomic_write;

pub struct ArchiveIndex {
    path: PathBuf,
    entries: Mutex<BTreeMap<Uuid, ArchiveRecord>>,
}

impl ArchiveIndex {
    /// Load the index at `path`; a missing file is an empty index.
    pub fn open<P: AsRef<Path>>(path: P) -> LifecycleResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries: BTreeMap<Uuid, ArchiveRecord> = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| LifecycleError::CorruptArchive {
                    path: path.clone(),
                    cause: format!("unreadable archive index: {}", e),
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(LifecycleError::archive_io(&path, e)),
        };

        debug!(path = %path.display(), archives = entries.len(), "Loaded archive index");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, archive_id: &Uuid) -> Option<ArchiveRecord> {
        self.entries.lock().get(archive_id).cloned()
    }

    pub fn contains(&self, archive_id: &Uuid) -> bool {
        self.entries.lock().contains_key(archive_id)
    }

    /// Snapshot of every entry
    pub fn all(&self) -> Vec<ArchiveRecord> {
        self.entries.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn insert(&self, record: ArchiveRecord) -> LifecycleResult<()> {
        self.update(|entries| {
            entries.insert(record.archive_id, record);
            true
        })
        .map(|_| ())
    }

    /// Remove an entry; returns the removed record, or `None` if unknown.
    pub fn remove(&self, archive_id: &Uuid) -> LifecycleResult<Option<ArchiveRecord>> {
        let mut removed = None;
        self.update(|entries| {
            removed = entries.remove(archive_id);
            removed.is_some()
        })?;
        Ok(removed)
    }

    /// Apply `mutate` to a copy of the map and persist it if `mutate`
    /// reports a change.
    fn update<F>(&self, mutate: F) -> LifecycleResult<bool>
    where
        F: FnOnce(&mut BTreeMap<Uuid, ArchiveRecord>) -> bool,
    {
        let mut guard = self.entries.lock();
        let mut next = guard.clone();
        if !mutate(&mut next) {
            return Ok(false);
        }

        let bytes = serde_json::to_vec_pretty(&next)?;
        atomic_write(&self.path, &bytes).map_err(|e| LifecycleError::archive_io(&self.path, e))?;

        *guard = next;
        Ok(true)
    }
}
