//! Read-only queries over the archive index

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{ArchiveFilters, ArchiveInfo, ArchiveRecord, ArchiveStats};

use super::Archiver;

pub(super) fn get_archive_info(
    archiver: &Archiver,
    archive_id: Uuid,
    now: DateTime<Utc>,
) -> Option<ArchiveInfo> {
    archiver
        .index
        .get(&archive_id)
        .map(|record| describe(archiver, record, now))
}

pub(super) fn list_archives(
    archiver: &Archiver,
    filters: &ArchiveFilters,
    now: DateTime<Utc>,
) -> Vec<ArchiveInfo> {
    let mut records: Vec<ArchiveRecord> = archiver
        .index
        .all()
        .into_iter()
        .filter(|record| filters.matches(record))
        .collect();

    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.archive_id.cmp(&b.archive_id))
    });

    records
        .into_iter()
        .map(|record| describe(archiver, record, now))
        .collect()
}

pub(super) fn archive_stats(archiver: &Archiver) -> ArchiveStats {
    let records = archiver.index.all();

    let mut stats = ArchiveStats {
        archive_count: records.len(),
        ..Default::default()
    };
    for record in &records {
        stats.event_count += record.event_count;
        stats.original_size += record.original_size;
        stats.archived_size += record.archived_size;
        stats.oldest_archive = Some(match stats.oldest_archive {
            Some(oldest) => oldest.min(record.created_at),
            None => record.created_at,
        });
        stats.newest_archive = Some(match stats.newest_archive {
            Some(newest) => newest.max(record.created_at),
            None => record.created_at,
        });
    }

    stats.compression_ratio = if stats.archived_size == 0 {
        0.0
    } else {
        stats.original_size as f64 / stats.archived_size as f64
    };
    stats
}

fn describe(archiver: &Archiver, record: ArchiveRecord, now: DateTime<Utc>) -> ArchiveInfo {
    let age_days = record.age_days(now);
    ArchiveInfo {
        tier: archiver.config.retention.classify(age_days),
        age_days,
        record,
    }
}
