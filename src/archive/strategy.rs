//! Batch ordering per archive strategy
//!
//! All orderings are stable: records that compare equal keep their input order.

use std::cmp::Ordering;

use crate::types::{ArchiveStrategy, EventRecord};

/// Reorder `records` according to `strategy`
pub fn order_records(mut records: Vec<EventRecord>, strategy: ArchiveStrategy) -> Vec<EventRecord> {
    match strategy {
        ArchiveStrategy::ByTime => records.sort_by_key(|r| r.occurred_at),
        ArchiveStrategy::ByEventType => records.sort_by(|a, b| a.event_type.cmp(&b.event_type)),
        // None < Some, so records without a tenant come first
        ArchiveStrategy::ByTenant => records.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id)),
        ArchiveStrategy::BySize => records.sort_by_cached_key(EventRecord::serialized_size),
        ArchiveStrategy::Hybrid => records.sort_by(hybrid_order),
    }
    records
}

/// Tenant, then event type, then occurrence time, then event id
fn hybrid_order(a: &EventRecord, b: &EventRecord) -> Ordering {
    a.tenant_id
        .cmp(&b.tenant_id)
        .then_with(|| a.event_type.cmp(&b.event_type))
        .then_with(|| a.occurred_at.cmp(&b.occurred_at))
        .then_with(|| a.id.cmp(&b.id))
}
