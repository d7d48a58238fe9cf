//! In-memory event store

use std::collections::HashSet;

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::LifecycleResult;
use crate::types::EventRecord;

use super::source::{ArchiveCriteria, EventSource};

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<EventRecord>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<EventRecord>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    pub fn append(&self, event: EventRecord) {
        self.events.write().push(event);
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.events.read().iter().any(|e| e.id == id)
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.read().clone()
    }
}

impl EventSource for InMemoryEventStore {
    fn fetch_events_for_archiving(&self, criteria: &ArchiveCriteria) -> LifecycleResult<Vec<EventRecord>> {
        Ok(criteria.select(self.events.read().iter(), Utc::now()))
    }

    fn delete_events(&self, ids: &[String]) -> LifecycleResult<usize> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|e| !ids.contains(e.id.as_str()));
        Ok(before - events.len())
    }
}
