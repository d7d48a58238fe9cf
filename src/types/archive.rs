//! Archive records, results and reports

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::days_between;

/// Policy by which a batch is ordered before compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveStrategy {
    /// Ascending occurrence time
    #[default]
    ByTime,
    /// Lexicographic by event type
    ByEventType,
    /// Lexicographic by tenant id, records without a tenant first
    ByTenant,
    /// Ascending serialized size
    BySize,
    /// Tenant, then event type, then occurrence time, then event id
    Hybrid,
}

impl fmt::Display for ArchiveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchiveStrategy::ByTime => "BY_TIME",
            ArchiveStrategy::ByEventType => "BY_EVENT_TYPE",
            ArchiveStrategy::ByTenant => "BY_TENANT",
            ArchiveStrategy::BySize => "BY_SIZE",
            ArchiveStrategy::Hybrid => "HYBRID",
        };
        f.write_str(name)
    }
}

impl FromStr for ArchiveStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BY_TIME" => Ok(ArchiveStrategy::ByTime),
            "BY_EVENT_TYPE" => Ok(ArchiveStrategy::ByEventType),
            "BY_TENANT" => Ok(ArchiveStrategy::ByTenant),
            "BY_SIZE" => Ok(ArchiveStrategy::BySize),
            "HYBRID" => Ok(ArchiveStrategy::Hybrid),
            other => Err(format!("unknown archive strategy: {}", other)),
        }
    }
}

/// Inclusive occurrence-time range covered by an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Descriptive metadata stored with each archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
    pub event_types: BTreeSet<String>,
    pub tenant_ids: BTreeSet<String>,
    pub date_range: DateRange,
}

/// Index entry for one archive; immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub archive_id: Uuid,
    pub event_count: u64,
    pub original_size: u64,
    pub archived_size: u64,
    pub compression_ratio: f64,
    pub strategy: ArchiveStrategy,
    pub created_at: DateTime<Utc>,
    pub file_path: PathBuf,
    pub metadata: ArchiveMetadata,
}

impl ArchiveRecord {
    /// Whole days elapsed between creation and `now`
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        days_between(self.created_at, now)
    }
}

/// Outcome of an archive operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResult {
    pub archive_id: Option<Uuid>,
    pub event_count: u64,
    pub original_size: u64,
    pub archived_size: u64,
    pub compression_ratio: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub file_path: Option<PathBuf>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ids of the events written to the archive, in archive order
    #[serde(default)]
    pub archived_event_ids: Vec<String>,
}

impl ArchiveResult {
    pub fn failed(start_time: DateTime<Utc>, error: impl Into<String>) -> Self {
        let end_time = Utc::now();
        Self {
            archive_id: None,
            event_count: 0,
            original_size: 0,
            archived_size: 0,
            compression_ratio: 0.0,
            start_time,
            end_time,
            duration_ms: (end_time - start_time).num_milliseconds().max(0) as u64,
            file_path: None,
            success: false,
            error: Some(error.into()),
            archived_event_ids: Vec::new(),
        }
    }
}

/// Conjunctive filters for listing archives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveFilters {
    /// Archives created at or after this instant
    pub start_date: Option<DateTime<Utc>>,
    /// Archives created at or before this instant
    pub end_date: Option<DateTime<Utc>>,
    pub event_type: Option<String>,
    pub tenant_id: Option<String>,
}

impl ArchiveFilters {
    pub fn matches(&self, record: &ArchiveRecord) -> bool {
        if let Some(start) = self.start_date {
            if record.created_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if record.created_at > end {
                return false;
            }
        }
        if let Some(event_type) = &self.event_type {
            if !record.metadata.event_types.contains(event_type) {
                return false;
            }
        }
        if let Some(tenant_id) = &self.tenant_id {
            if !record.metadata.tenant_ids.contains(tenant_id) {
                return false;
            }
        }
        true
    }
}

/// Age classification of stored data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionTier {
    Hot,
    Warm,
    Cold,
    /// Older than the cold retention window; eligible for deletion
    Expired,
}

/// Archive record enriched with its current age and tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveInfo {
    #[serde(flatten)]
    pub record: ArchiveRecord,
    pub age_days: i64,
    pub tier: RetentionTier,
}

/// Result of a retention cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted_count: usize,
    /// Bytes released on disk
    pub freed_space: u64,
    pub deleted_archives: Vec<Uuid>,
    /// Expired archives whose deletion failed, with the reason
    pub failed_archives: Vec<(Uuid, String)>,
}

/// Totals across the archive index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStats {
    pub archive_count: usize,
    pub event_count: u64,
    pub original_size: u64,
    pub archived_size: u64,
    pub compression_ratio: f64,
    pub oldest_archive: Option<DateTime<Utc>>,
    pub newest_archive: Option<DateTime<Utc>>,
}

/// Integrity check of one archive blob against its index entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveVerification {
    pub blob_present: bool,
    pub header_matches: bool,
    pub items_ok: u64,
    pub items_failed: u64,
}

impl ArchiveVerification {
    pub fn is_intact(&self) -> bool {
        self.blob_present && self.header_matches && self.items_failed == 0
    }
}
