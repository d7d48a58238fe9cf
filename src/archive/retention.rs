//! Retention cleanup, integrity checks and orphan removal

use std::fs::{self, File};
use std::io::{self, BufReader};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{ArchiveVerification, CleanupReport};
use crate::utils::atomic::temp_path_for;
use crate::utils::format_size;

use super::archiver::corrupt_or_io;
use super::blob::{parse_blob_file_name, ArchiveBlob, BLOB_EXTENSION};
use super::{Archiver, RetentionPolicy};

/// Delete every archive whose age exceeds `cold_data_retention_days` at `now`.
///
/// A failure on one archive is logged and recorded in the report; the pass
/// continues with the rest.
pub(super) fn cleanup_expired_archives(
    archiver: &Archiver,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    for record in archiver.index.all() {
        let age_days = record.age_days(now);
        if !policy.is_expired(age_days) {
            continue;
        }

        match archiver.remove_archive(record.archive_id) {
            Ok(Some((_, freed))) => {
                report.deleted_count += 1;
                report.freed_space += freed;
                report.deleted_archives.push(record.archive_id);
            }
            // Removed concurrently
            Ok(None) => {}
            Err(e) => {
                warn!(
                    archive_id = %record.archive_id,
                    age_days,
                    error = %e,
                    "Failed to delete expired archive"
                );
                report.failed_archives.push((record.archive_id, e.to_string()));
            }
        }
    }

    info!(
        deleted = report.deleted_count,
        failed = report.failed_archives.len(),
        freed = %format_size(report.freed_space),
        retention_days = policy.cold_data_retention_days,
        "Retention cleanup finished"
    );
    report
}

/// Decode an archive's blob and every item, comparing against the index.
pub(super) fn verify_archive(
    archiver: &Archiver,
    archive_id: Uuid,
) -> LifecycleResult<ArchiveVerification> {
    let record = archiver
        .index
        .get(&archive_id)
        .ok_or(LifecycleError::ArchiveNotFound(archive_id))?;

    let mut verification = ArchiveVerification::default();

    let file = match File::open(&record.file_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(%archive_id, path = %record.file_path.display(), "Archive blob missing");
            return Ok(verification);
        }
        Err(e) => return Err(LifecycleError::archive_io(&record.file_path, e)),
    };
    verification.blob_present = true;

    let blob = match ArchiveBlob::read_from(BufReader::new(file)) {
        Ok(blob) => blob,
        Err(e) => match corrupt_or_io(&record.file_path, e) {
            LifecycleError::CorruptArchive { cause, .. } => {
                warn!(%archive_id, cause = %cause, "Archive blob is corrupt");
                verification.items_failed = record.event_count;
                return Ok(verification);
            }
            other => return Err(other),
        },
    };

    verification.header_matches = blob.header.archive_id == record.archive_id
        && blob.header.item_count == record.event_count;

    for item in &blob.items {
        match archiver
            .compressor
            .decompress_bytes(&item.data, item.algorithm)
        {
            Ok(bytes) if bytes.len() as u64 == item.original_size => verification.items_ok += 1,
            Ok(bytes) => {
                debug!(
                    %archive_id,
                    event_id = %item.event_id,
                    expected = item.original_size,
                    actual = bytes.len(),
                    "Archived item size mismatch"
                );
                verification.items_failed += 1;
            }
            Err(e) => {
                debug!(%archive_id, event_id = %item.event_id, error = %e, "Archived item unreadable");
                verification.items_failed += 1;
            }
        }
    }

    info!(
        %archive_id,
        intact = verification.is_intact(),
        items_ok = verification.items_ok,
        items_failed = verification.items_failed,
        "Verified archive"
    );
    Ok(verification)
}

/// Remove unindexed blobs and stale temp files from the storage location.
///
/// Archives still being written are skipped: the pending set stays locked
/// for the whole scan, and an archive leaves the pending set only after its
/// index entry exists.
pub(super) fn cleanup_orphaned_blobs(archiver: &Archiver) -> LifecycleResult<usize> {
    let dir = archiver.storage_location().to_path_buf();
    let index_temp = temp_path_for(archiver.index.path());

    let pending = archiver.pending.lock();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(LifecycleError::archive_io(&dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| LifecycleError::archive_io(&dir, e))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let orphan = if let Some(archive_id) = parse_blob_file_name(name) {
            !pending.contains(&archive_id) && !archiver.index.contains(&archive_id)
        } else if path.extension().map_or(false, |ext| ext == "tmp") {
            let in_flight = path
                .with_extension(BLOB_EXTENSION)
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_blob_file_name)
                .map_or(false, |id| pending.contains(&id));
            !in_flight && path != index_temp
        } else {
            false
        };

        if !orphan {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed orphaned archive file");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove orphaned file"),
        }
    }

    info!(removed, dir = %dir.display(), "Orphan cleanup finished");
    Ok(removed)
}
