//! Archive lifecycle integration tests
//!
//! Covers the full flow through the public API:
//! - Archiving a batch and restoring it
//! - Listing, info and stats over the index
//! - Retention cleanup at explicit instants
//! - Orphan cleanup and integrity checks
//! - The fetch, archive, delete job over a JSONL event log

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use event_lifecycle::archive::{ArchiveConfig, ArchiveOverrides, Archiver, RetentionPolicy, TriggerConditions};
use event_lifecycle::error::LifecycleError;
use event_lifecycle::event_store::{ArchiveCriteria, ArchiveJob, EventSource, JsonlEventStore};
use event_lifecycle::types::{
    ArchiveFilters, ArchiveStrategy, CompressionAlgorithm, CompressionConfig, EventRecord,
    RetentionTier,
};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_data_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    PathBuf::from(format!(
        "target/test_archive_lifecycle_{}_{}",
        std::process::id(),
        id
    ))
}

fn cleanup_dir(path: &Path) {
    let _ = fs::remove_dir_all(path);
}

/// Archive config that archives any non-empty batch
fn eager_config(dir: &Path) -> ArchiveConfig {
    let mut config = ArchiveConfig::new(dir);
    config.trigger_conditions = TriggerConditions {
        time_interval_days: None,
        size_threshold_mb: None,
        event_count_threshold: None,
    };
    config.compression = CompressionConfig::with_algorithm(CompressionAlgorithm::Gzip).min_size(0);
    config
}

fn order_events(n: usize, tenant: &str) -> Vec<EventRecord> {
    (0..n)
        .map(|i| {
            EventRecord::new(
                format!("{}-evt-{}", tenant, i),
                format!("order-{}", i % 3),
                if i % 2 == 0 { "OrderPlaced" } else { "OrderShipped" },
                json!({"orderId": i, "lines": vec!["widget"; 20], "note": "x".repeat(200)}),
            )
            .with_tenant(tenant)
            .occurred_at(Utc::now() - Duration::days(40 + i as i64))
        })
        .collect()
}

#[test]
fn test_archive_and_restore_round_trip() {
    let data_dir = test_data_dir();
    let archiver = Archiver::new(eager_config(&data_dir)).unwrap();
    let events = order_events(12, "acme");

    let result = archiver.archive_events(&events, &ArchiveOverrides::default());
    assert!(result.success, "archive failed: {:?}", result.error);
    assert_eq!(result.event_count, 12);
    assert!(result.archived_size < result.original_size);
    assert!(result.compression_ratio > 1.0);

    let archive_id = result.archive_id.unwrap();
    let blob_path = result.file_path.unwrap();
    assert!(blob_path.exists());

    let mut restored = archiver.restore_events(archive_id, None).unwrap();
    restored.sort_by(|a, b| a.id.cmp(&b.id));
    let mut expected = events.clone();
    expected.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(restored, expected);

    let subset = archiver
        .restore_events(archive_id, Some(&["acme-evt-3".to_string()]))
        .unwrap();
    assert_eq!(subset.len(), 1);
    assert_eq!(subset[0].event_type, "OrderShipped");

    cleanup_dir(&data_dir);
}

#[test]
fn test_index_survives_reopen() {
    let data_dir = test_data_dir();
    let archive_id = {
        let archiver = Archiver::new(eager_config(&data_dir)).unwrap();
        archiver
            .archive_events(&order_events(3, "acme"), &ArchiveOverrides::default())
            .archive_id
            .unwrap()
    };

    let reopened = Archiver::new(eager_config(&data_dir)).unwrap();
    let info = reopened.get_archive_info(archive_id).unwrap();
    assert_eq!(info.record.event_count, 3);
    assert_eq!(info.tier, RetentionTier::Hot);
    assert_eq!(reopened.restore_events(archive_id, None).unwrap().len(), 3);

    cleanup_dir(&data_dir);
}

#[test]
fn test_trigger_conditions_not_met() {
    let data_dir = test_data_dir();
    let mut config = eager_config(&data_dir);
    config.trigger_conditions.event_count_threshold = Some(100);
    let archiver = Archiver::new(config).unwrap();

    let result = archiver.archive_events(&order_events(5, "acme"), &ArchiveOverrides::default());
    assert!(!result.success);
    assert!(result.archive_id.is_none());
    assert!(result.error.is_some());

    let err = archiver
        .try_archive_events(&order_events(5, "acme"), &ArchiveOverrides::default())
        .unwrap_err();
    assert!(matches!(err, LifecycleError::ArchiveConditionNotMet { event_count: 5, .. }));
    assert_eq!(archiver.archive_stats().archive_count, 0);

    cleanup_dir(&data_dir);
}

#[test]
fn test_empty_batch_is_rejected() {
    let data_dir = test_data_dir();
    let archiver = Archiver::new(eager_config(&data_dir)).unwrap();

    let result = archiver.archive_events(&[], &ArchiveOverrides::default());
    assert!(!result.success);

    cleanup_dir(&data_dir);
}

#[test]
fn test_overrides_apply_per_call() {
    let data_dir = test_data_dir();
    let archiver = Archiver::new(eager_config(&data_dir)).unwrap();

    let overrides = ArchiveOverrides::default()
        .strategy(ArchiveStrategy::Hybrid)
        .compression(CompressionConfig::with_algorithm(CompressionAlgorithm::Zstd).min_size(0));
    let result = archiver.archive_events(&order_events(6, "acme"), &overrides);
    assert!(result.success);

    let info = archiver.get_archive_info(result.archive_id.unwrap()).unwrap();
    assert_eq!(info.record.strategy, ArchiveStrategy::Hybrid);
    assert_eq!(archiver.config().strategy, ArchiveStrategy::ByTime);

    cleanup_dir(&data_dir);
}

#[test]
fn test_list_filters_and_stats() {
    let data_dir = test_data_dir();
    let archiver = Archiver::new(eager_config(&data_dir)).unwrap();

    let first = archiver.archive_events(&order_events(4, "acme"), &ArchiveOverrides::default());
    let second = archiver.archive_events(&order_events(2, "globex"), &ArchiveOverrides::default());
    assert!(first.success && second.success);

    let all = archiver.list_archives(&ArchiveFilters::default());
    assert_eq!(all.len(), 2);
    assert!(all[0].record.created_at >= all[1].record.created_at);

    let globex = archiver.list_archives(&ArchiveFilters {
        tenant_id: Some("globex".to_string()),
        ..Default::default()
    });
    assert_eq!(globex.len(), 1);
    assert_eq!(globex[0].record.archive_id, second.archive_id.unwrap());

    let shipped = archiver.list_archives(&ArchiveFilters {
        event_type: Some("OrderShipped".to_string()),
        ..Default::default()
    });
    assert_eq!(shipped.len(), 2);

    let future = archiver.list_archives(&ArchiveFilters {
        start_date: Some(Utc::now() + Duration::days(1)),
        ..Default::default()
    });
    assert!(future.is_empty());

    let stats = archiver.archive_stats();
    assert_eq!(stats.archive_count, 2);
    assert_eq!(stats.event_count, 6);
    assert!(stats.archived_size > 0);
    assert!(stats.oldest_archive <= stats.newest_archive);

    cleanup_dir(&data_dir);
}

#[test]
fn test_retention_cleanup_at_instants() {
    let data_dir = test_data_dir();
    let archiver = Archiver::new(eager_config(&data_dir)).unwrap();
    let result = archiver.archive_events(&order_events(3, "acme"), &ArchiveOverrides::default());
    let archive_id = result.archive_id.unwrap();
    let blob_path = result.file_path.unwrap();
    let policy = RetentionPolicy::default();

    let report = archiver.cleanup_expired_archives_at(&policy, Utc::now() + Duration::days(10));
    assert_eq!(report.deleted_count, 0);
    assert!(archiver.get_archive_info(archive_id).is_some());

    let report = archiver.cleanup_expired_archives_at(&policy, Utc::now() + Duration::days(400));
    assert_eq!(report.deleted_count, 1);
    assert_eq!(report.deleted_archives, vec![archive_id]);
    assert!(report.freed_space > 0);
    assert!(!blob_path.exists());
    assert!(archiver.get_archive_info(archive_id).is_none());

    cleanup_dir(&data_dir);
}

#[test]
fn test_delete_archive() {
    let data_dir = test_data_dir();
    let archiver = Archiver::new(eager_config(&data_dir)).unwrap();
    let result = archiver.archive_events(&order_events(2, "acme"), &ArchiveOverrides::default());
    let archive_id = result.archive_id.unwrap();

    assert!(!archiver.delete_archive(Uuid::new_v4()).unwrap());
    assert!(archiver.delete_archive(archive_id).unwrap());
    assert!(!archiver.delete_archive(archive_id).unwrap());
    assert!(!result.file_path.unwrap().exists());

    let err = archiver.restore_events(archive_id, None).unwrap_err();
    assert!(matches!(err, LifecycleError::ArchiveNotFound(id) if id == archive_id));

    cleanup_dir(&data_dir);
}

#[test]
fn test_verify_and_corruption() {
    let data_dir = test_data_dir();
    let archiver = Archiver::new(eager_config(&data_dir)).unwrap();
    let result = archiver.archive_events(&order_events(5, "acme"), &ArchiveOverrides::default());
    let archive_id = result.archive_id.unwrap();
    let blob_path = result.file_path.unwrap();

    let verification = archiver.verify_archive(archive_id).unwrap();
    assert!(verification.is_intact());
    assert_eq!(verification.items_ok, 5);

    fs::write(&blob_path, b"definitely not an archive").unwrap();
    let verification = archiver.verify_archive(archive_id).unwrap();
    assert!(!verification.is_intact());

    let err = archiver.restore_events(archive_id, None).unwrap_err();
    assert!(matches!(err, LifecycleError::CorruptArchive { .. }));

    fs::remove_file(&blob_path).unwrap();
    assert!(!archiver.verify_archive(archive_id).unwrap().blob_present);

    cleanup_dir(&data_dir);
}

#[test]
fn test_orphaned_blobs_are_removed() {
    let data_dir = test_data_dir();
    let archiver = Archiver::new(eager_config(&data_dir)).unwrap();
    let result = archiver.archive_events(&order_events(2, "acme"), &ArchiveOverrides::default());
    let kept = result.file_path.unwrap();

    let orphan = data_dir.join(format!("archive_{}.evar", Uuid::new_v4()));
    let leftover = data_dir.join(format!("archive_{}.tmp", Uuid::new_v4()));
    fs::write(&orphan, b"orphan").unwrap();
    fs::write(&leftover, b"partial").unwrap();
    fs::write(data_dir.join("notes.txt"), b"unrelated").unwrap();

    assert_eq!(archiver.cleanup_orphaned_blobs().unwrap(), 2);
    assert!(!orphan.exists());
    assert!(!leftover.exists());
    assert!(kept.exists());
    assert!(data_dir.join("notes.txt").exists());

    cleanup_dir(&data_dir);
}

#[test]
fn test_concurrent_archives() {
    let data_dir = test_data_dir();
    let archiver = Arc::new(Archiver::new(eager_config(&data_dir)).unwrap());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let archiver = Arc::clone(&archiver);
            thread::spawn(move || {
                let tenant = format!("tenant-{}", i);
                archiver.archive_events(&order_events(3, &tenant), &ArchiveOverrides::default())
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().success);
    }

    let reopened = Archiver::new(eager_config(&data_dir)).unwrap();
    assert_eq!(reopened.archive_stats().archive_count, 6);
    assert_eq!(reopened.archive_stats().event_count, 18);

    cleanup_dir(&data_dir);
}

#[test]
fn test_archive_job_over_event_log() {
    let data_dir = test_data_dir();
    let store = JsonlEventStore::new(data_dir.join("events.jsonl"));
    let now = Utc::now();

    for event in order_events(4, "acme") {
        store.append(&event).unwrap();
    }
    store
        .append(&EventRecord::new("fresh", "order-9", "OrderPlaced", json!({})).occurred_at(now))
        .unwrap();

    let archiver = Archiver::new(eager_config(&data_dir.join("archive"))).unwrap();
    let job = ArchiveJob::new(ArchiveCriteria::default().older_than_days(30).tenant("acme"));
    let report = job.run(&store, &archiver).unwrap();

    assert_eq!(report.fetched, 4);
    assert_eq!(report.deleted, 4);
    let archive = report.archive.unwrap();
    assert!(archive.success);

    let remaining = store.load_events().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "fresh");

    let restored = archiver.restore_events(archive.archive_id.unwrap(), None).unwrap();
    assert_eq!(restored.len(), 4);

    let again = job.run(&store, &archiver).unwrap();
    assert_eq!(again.fetched, 0);
    assert!(again.archive.is_none());
    assert!(store
        .fetch_events_for_archiving(&ArchiveCriteria::default())
        .unwrap()
        .iter()
        .all(|e| e.id == "fresh"));

    cleanup_dir(&data_dir);
}
