//! The event store as seen by archiving

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleResult;
use crate::types::EventRecord;

/// Which events to select for archiving
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveCriteria {
    /// Only events that occurred at least this many days ago
    pub older_than_days: Option<u32>,
    /// Only these event types; empty means all
    pub event_types: Vec<String>,
    pub tenant_id: Option<String>,
    /// At most this many events, oldest first
    pub limit: Option<usize>,
}

impl ArchiveCriteria {
    pub fn older_than_days(mut self, days: u32) -> Self {
        self.older_than_days = Some(days);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` qualifies when evaluated at `now`
    pub fn matches(&self, record: &EventRecord, now: DateTime<Utc>) -> bool {
        if let Some(days) = self.older_than_days {
            if record.occurred_at > now - Duration::days(i64::from(days)) {
                return false;
            }
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&record.event_type) {
            return false;
        }
        if let Some(tenant_id) = &self.tenant_id {
            if record.tenant_id.as_ref() != Some(tenant_id) {
                return false;
            }
        }
        true
    }

    /// Filter, order oldest first, and truncate to `limit`
    pub fn select<'a, I>(&self, records: I, now: DateTime<Utc>) -> Vec<EventRecord>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let mut selected: Vec<EventRecord> = records
            .into_iter()
            .filter(|record| self.matches(record, now))
            .cloned()
            .collect();
        selected.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Source of archivable events
///
/// This crate never mutates the store on its own; [`super::ArchiveJob`]
/// deletes events only after they are safely archived.
pub trait EventSource: Send + Sync {
    fn fetch_events_for_archiving(&self, criteria: &ArchiveCriteria) -> LifecycleResult<Vec<EventRecord>>;

    /// Delete events by id; returns how many were removed
    fn delete_events(&self, ids: &[String]) -> LifecycleResult<usize>;
}
