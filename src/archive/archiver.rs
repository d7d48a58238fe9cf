//! Archiver - moves cold event batches into compressed archive blobs
//!
//! An archive operation orders the batch, compresses every record, writes a
//! single blob next to its siblings and then records it in the index. The
//! blob is always on disk before the index references it, so an interrupted
//! archive leaves at most an orphaned blob for
//! [`Archiver::cleanup_orphaned_blobs`] to remove.

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compression::Compressor;
use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{
    ArchiveFilters, ArchiveInfo, ArchiveMetadata, ArchiveRecord, ArchiveResult, ArchiveStats,
    ArchiveVerification, CleanupReport, CompressionAlgorithm, CompressionResult, DateRange,
    EventRecord,
};
use crate::utils::{atomic_write_with, bytes_to_mb, cleanup_temp_files, elapsed_ms, CancelFlag};

use super::blob::{blob_file_name, ArchiveBlob, BlobHeader, BlobItem};
use super::config::{ArchiveConfig, ArchiveOverrides, RetentionPolicy};
use super::index::ArchiveIndex;
use super::strategy::order_records;
use super::{query, retention};

/// File name of the index inside the storage location
pub const INDEX_FILE_NAME: &str = "archive_index.json";

/// Archive manager owning the archive index
pub struct Archiver {
    pub(crate) config: ArchiveConfig,
    pub(crate) compressor: Compressor,
    pub(crate) index: ArchiveIndex,
    /// Archive ids whose blob is being written and not yet indexed
    pub(crate) pending: Mutex<HashSet<Uuid>>,
}

/// Marks an archive id in-flight for the lifetime of the guard
struct PendingArchive<'a> {
    pending: &'a Mutex<HashSet<Uuid>>,
    archive_id: Uuid,
}

impl<'a> PendingArchive<'a> {
    fn register(pending: &'a Mutex<HashSet<Uuid>>, archive_id: Uuid) -> Self {
        pending.lock().insert(archive_id);
        Self {
            pending,
            archive_id,
        }
    }
}

impl Drop for PendingArchive<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.archive_id);
    }
}

impl Archiver {
    /// Open an archiver whose index lives at `<storage_location>/archive_index.json`
    pub fn new(config: ArchiveConfig) -> LifecycleResult<Self> {
        let index_path = config.storage_location.join(INDEX_FILE_NAME);
        Self::open(config, index_path)
    }

    /// Open an archiver with an explicit index path.
    ///
    /// Leftover `.tmp` files from interrupted writes in the storage
    /// location are removed before the index is loaded.
    pub fn open<P: AsRef<Path>>(config: ArchiveConfig, index_path: P) -> LifecycleResult<Self> {
        let storage = config.storage_location.clone();
        fs::create_dir_all(&storage).map_err(|e| LifecycleError::archive_io(&storage, e))?;

        let cleaned =
            cleanup_temp_files(&storage).map_err(|e| LifecycleError::archive_io(&storage, e))?;
        if cleaned > 0 {
            info!(cleaned, dir = %storage.display(), "Removed interrupted archive writes");
        }

        let index = ArchiveIndex::open(index_path)?;

        Ok(Self {
            compressor: Compressor::with_config(config.compression.clone()),
            config,
            index,
            pending: Mutex::new(HashSet::new()),
        })
    }

    /// Replace the compressor, e.g. one with a dedicated worker pool
    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn storage_location(&self) -> &Path {
        &self.config.storage_location
    }

    pub fn index_path(&self) -> &Path {
        self.index.path()
    }

    // ========================================================================
    // Archive / restore / delete
    // ========================================================================

    /// Archive a batch, reporting failure in the returned [`ArchiveResult`].
    pub fn archive_events(
        &self,
        records: &[EventRecord],
        overrides: &ArchiveOverrides,
    ) -> ArchiveResult {
        self.report_archive(records, overrides, None)
    }

    /// [`Archiver::archive_events`] abandoning the archive once `cancel`
    /// fires.
    ///
    /// Cancellation is honoured up to the index insert: a cancelled archive
    /// writes no index entry and removes any blob it already wrote.
    pub fn archive_events_cancellable(
        &self,
        records: &[EventRecord],
        overrides: &ArchiveOverrides,
        cancel: &CancelFlag,
    ) -> ArchiveResult {
        self.report_archive(records, overrides, Some(cancel))
    }

    fn report_archive(
        &self,
        records: &[EventRecord],
        overrides: &ArchiveOverrides,
        cancel: Option<&CancelFlag>,
    ) -> ArchiveResult {
        let start_time = Utc::now();
        match self.archive_batch(records, overrides, start_time, cancel) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    event_count = records.len(),
                    kind = ?e.kind(),
                    error = %e,
                    "Archive operation failed"
                );
                ArchiveResult::failed(start_time, e.to_string())
            }
        }
    }

    /// Archive a batch, propagating failure as an error.
    ///
    /// Fails with `ArchiveConditionNotMet` when the merged config's trigger
    /// conditions are not met, and with `ArchiveIo` when the blob or the
    /// index cannot be written.
    pub fn try_archive_events(
        &self,
        records: &[EventRecord],
        overrides: &ArchiveOverrides,
    ) -> LifecycleResult<ArchiveResult> {
        self.archive_batch(records, overrides, Utc::now(), None)
    }

    fn archive_batch(
        &self,
        records: &[EventRecord],
        overrides: &ArchiveOverrides,
        start_time: DateTime<Utc>,
        cancel: Option<&CancelFlag>,
    ) -> LifecycleResult<ArchiveResult> {
        let started = Instant::now();
        let config = overrides.apply(&self.config);

        let batch_size: u64 = records.iter().map(|r| r.serialized_size() as u64).sum();
        if !config.should_archive(records.len(), batch_size) {
            return Err(LifecycleError::ArchiveConditionNotMet {
                event_count: records.len(),
                size_mb: bytes_to_mb(batch_size),
            });
        }

        let ordered = order_records(records.to_vec(), config.strategy);
        let results = self.compressor.compress_batch(&ordered, &config.compression);

        let items = ordered
            .iter()
            .zip(results)
            .map(|(record, result)| blob_item(record, result))
            .collect::<LifecycleResult<Vec<_>>>()?;

        let archive_id = Uuid::new_v4();
        let created_at = Utc::now();
        let _pending = PendingArchive::register(&self.pending, archive_id);

        let original_size: u64 = items.iter().map(|item| item.original_size).sum();
        let archived_size: u64 = items.iter().map(BlobItem::compressed_size).sum();
        let compression_ratio = if archived_size == 0 {
            0.0
        } else {
            original_size as f64 / archived_size as f64
        };

        let blob = ArchiveBlob {
            header: BlobHeader {
                archive_id,
                created_at,
                strategy: config.strategy,
                item_count: items.len() as u64,
            },
            items,
        };
        if cancel.map_or(false, CancelFlag::is_cancelled) {
            return Err(archive_cancelled(archive_id));
        }
        let file_path = config.storage_location.join(blob_file_name(archive_id));
        write_blob(&file_path, &blob)?;

        let record = ArchiveRecord {
            archive_id,
            event_count: blob.items.len() as u64,
            original_size,
            archived_size,
            compression_ratio,
            strategy: config.strategy,
            created_at,
            file_path: file_path.clone(),
            metadata: batch_metadata(&ordered, created_at),
        };

        let committed = match cancel {
            Some(cancel) if !cancel.try_commit() => Err(archive_cancelled(archive_id)),
            _ => self.index.insert(record),
        };
        if let Err(e) = committed {
            // Never leave a blob the caller was told failed
            if let Err(remove_err) = fs::remove_file(&file_path) {
                warn!(
                    %archive_id,
                    path = %file_path.display(),
                    error = %remove_err,
                    "Could not remove blob of abandoned archive; left as orphan"
                );
            }
            return Err(e);
        }

        let duration_ms = elapsed_ms(started);
        info!(
            %archive_id,
            event_count = ordered.len(),
            original_size,
            archived_size,
            compression_ratio,
            strategy = %config.strategy,
            duration_ms,
            path = %file_path.display(),
            "Archived events"
        );

        Ok(ArchiveResult {
            archive_id: Some(archive_id),
            event_count: ordered.len() as u64,
            original_size,
            archived_size,
            compression_ratio,
            start_time,
            end_time: Utc::now(),
            duration_ms,
            file_path: Some(file_path),
            success: true,
            error: None,
            archived_event_ids: ordered.into_iter().map(|r| r.id).collect(),
        })
    }

    /// Restore the records of an archive, optionally only `event_ids`.
    ///
    /// Restore is lossy-tolerant: an item that fails to decompress is logged
    /// and skipped, so the result holds only the items that decoded.
    pub fn restore_events(
        &self,
        archive_id: Uuid,
        event_ids: Option<&[String]>,
    ) -> LifecycleResult<Vec<EventRecord>> {
        let started = Instant::now();
        let record = self
            .index
            .get(&archive_id)
            .ok_or(LifecycleError::ArchiveNotFound(archive_id))?;
        let blob = read_blob(&record.file_path)?;

        let wanted: Option<HashSet<&str>> =
            event_ids.map(|ids| ids.iter().map(String::as_str).collect());

        let mut restored = Vec::new();
        let mut skipped = 0usize;
        for item in &blob.items {
            if let Some(wanted) = &wanted {
                if !wanted.contains(item.event_id.as_str()) {
                    continue;
                }
            }

            match self.compressor.decompress::<EventRecord>(&item.data, item.algorithm) {
                Ok(event) => restored.push(event),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        %archive_id,
                        event_id = %item.event_id,
                        algorithm = %item.algorithm,
                        error = %e,
                        "Skipping unrecoverable archived event"
                    );
                }
            }
        }

        info!(
            %archive_id,
            restored = restored.len(),
            skipped,
            duration_ms = elapsed_ms(started),
            "Restored events"
        );
        Ok(restored)
    }

    /// Delete an archive's index entry and blob.
    ///
    /// Returns `false` when the id is unknown.
    pub fn delete_archive(&self, archive_id: Uuid) -> LifecycleResult<bool> {
        Ok(self.remove_archive(archive_id)?.is_some())
    }

    /// Remove the index entry, then the blob. Returns the removed record
    /// and the bytes freed on disk.
    pub(crate) fn remove_archive(
        &self,
        archive_id: Uuid,
    ) -> LifecycleResult<Option<(ArchiveRecord, u64)>> {
        let record = match self.index.remove(&archive_id)? {
            Some(record) => record,
            None => {
                debug!(%archive_id, "Delete requested for unknown archive");
                return Ok(None);
            }
        };

        let size = fs::metadata(&record.file_path).map(|m| m.len()).unwrap_or(0);
        let freed = match fs::remove_file(&record.file_path) {
            Ok(()) => size,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => {
                warn!(
                    %archive_id,
                    path = %record.file_path.display(),
                    error = %e,
                    "Archive unindexed but blob could not be removed"
                );
                0
            }
        };

        info!(%archive_id, freed, "Deleted archive");
        Ok(Some((record, freed)))
    }

    // ========================================================================
    // Query
    // ========================================================================

    pub fn get_archive_info(&self, archive_id: Uuid) -> Option<ArchiveInfo> {
        query::get_archive_info(self, archive_id, Utc::now())
    }

    /// Archives matching every set filter, newest first
    pub fn list_archives(&self, filters: &ArchiveFilters) -> Vec<ArchiveInfo> {
        query::list_archives(self, filters, Utc::now())
    }

    pub fn archive_stats(&self) -> ArchiveStats {
        query::archive_stats(self)
    }

    // ========================================================================
    // Retention and maintenance
    // ========================================================================

    /// Delete every archive older than the policy's cold retention window
    pub fn cleanup_expired_archives(&self, policy: &RetentionPolicy) -> CleanupReport {
        retention::cleanup_expired_archives(self, policy, Utc::now())
    }

    /// [`Archiver::cleanup_expired_archives`] evaluated at `now`
    pub fn cleanup_expired_archives_at(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> CleanupReport {
        retention::cleanup_expired_archives(self, policy, now)
    }

    pub fn verify_archive(&self, archive_id: Uuid) -> LifecycleResult<ArchiveVerification> {
        retention::verify_archive(self, archive_id)
    }

    /// Remove blobs in the storage location that no index entry references.
    ///
    /// Returns the number of files removed.
    pub fn cleanup_orphaned_blobs(&self) -> LifecycleResult<usize> {
        retention::cleanup_orphaned_blobs(self)
    }
}

/// Build the stored item for one record; a failed compression falls back
/// to storing the serialized record uncompressed.
fn blob_item(record: &EventRecord, result: CompressionResult) -> LifecycleResult<BlobItem> {
    if result.success {
        return Ok(BlobItem {
            event_id: record.id.clone(),
            algorithm: result.algorithm,
            original_size: result.original_size,
            data: result.compressed_bytes,
        });
    }

    warn!(
        event_id = %record.id,
        algorithm = %result.algorithm,
        error = result.error.as_deref().unwrap_or("unknown"),
        "Storing event uncompressed after compression failure"
    );
    let data = serde_json::to_vec(record)?;
    Ok(BlobItem {
        event_id: record.id.clone(),
        algorithm: CompressionAlgorithm::None,
        original_size: data.len() as u64,
        data,
    })
}

fn batch_metadata(records: &[EventRecord], fallback: DateTime<Utc>) -> ArchiveMetadata {
    let event_types: BTreeSet<String> = records.iter().map(|r| r.event_type.clone()).collect();
    let tenant_ids: BTreeSet<String> = records.iter().filter_map(|r| r.tenant_id.clone()).collect();
    let start = records.iter().map(|r| r.occurred_at).min().unwrap_or(fallback);
    let end = records.iter().map(|r| r.occurred_at).max().unwrap_or(fallback);

    ArchiveMetadata {
        event_types,
        tenant_ids,
        date_range: DateRange { start, end },
    }
}

fn archive_cancelled(archive_id: Uuid) -> LifecycleError {
    debug!(%archive_id, "Archive abandoned after cancellation");
    LifecycleError::Cancelled(format!("archive {} abandoned before commit", archive_id))
}

fn write_blob(path: &Path, blob: &ArchiveBlob) -> LifecycleResult<()> {
    atomic_write_with(path, |file| {
        let mut writer = BufWriter::new(file);
        blob.write_to(&mut writer)?;
        writer.flush()
    })
    .map_err(|e| LifecycleError::archive_io(path, e))
}

/// Read and decode a blob; structural damage is `CorruptArchive`.
pub(crate) fn read_blob(path: &Path) -> LifecycleResult<ArchiveBlob> {
    let file = File::open(path).map_err(|e| LifecycleError::archive_io(path, e))?;
    ArchiveBlob::read_from(BufReader::new(file)).map_err(|e| corrupt_or_io(path, e))
}

pub(crate) fn corrupt_or_io(path: &Path, e: io::Error) -> LifecycleError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            LifecycleError::CorruptArchive {
                path: PathBuf::from(path),
                cause: e.to_string(),
            }
        }
        _ => LifecycleError::archive_io(path, e),
    }
}
