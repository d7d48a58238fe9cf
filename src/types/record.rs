//! Event records and payload envelopes
//!
//! `EventRecord` is the unit the archiver groups, compresses and restores.
//! `EventPayload` is the generic envelope the migrator transforms: a `kind`
//! tag plus a map of JSON fields, so scripts and validators can match on the
//! kind without runtime type inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw event as supplied by the event store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    pub aggregate_id: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub occurred_at: DateTime<Utc>,
}

impl EventRecord {
    /// Create a record that occurred now
    pub fn new(
        id: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: id.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            tenant_id: None,
            payload,
            metadata: Map::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = at;
        self
    }

    /// Length of the record's JSON serialization in bytes.
    ///
    /// Returns 0 if the record cannot be serialized.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

/// Generic event payload envelope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventPayload {
    /// Runtime kind of the payload (e.g. `UserCreated`)
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl EventPayload {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Build an envelope from a JSON object; non-object values yield `None`.
    pub fn from_json(kind: impl Into<String>, value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self {
                kind: kind.into(),
                fields,
            }),
            _ => None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field only if it is a non-empty string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Move a field to a new name. Returns false if the source field is absent.
    pub fn rename_field(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.fields.remove(from) {
            Some(value) => {
                self.fields.insert(to.into(), value);
                true
            }
            None => false,
        }
    }

    /// The fields as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = EventRecord::new("e1", "agg-1", "UserCreated", json!({"name": "Ada"}))
            .with_tenant("t1");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["aggregateId"], "agg-1");
        assert_eq!(value["eventType"], "UserCreated");
        assert_eq!(value["tenantId"], "t1");
        assert!(value.get("metadata").is_none());
        assert!(record.serialized_size() > 0);
    }

    #[test]
    fn test_payload_field_helpers() {
        let mut payload = EventPayload::new("UserCreated")
            .with_field("name", "Ada")
            .with_field("mail", "ada@example.com");

        assert_eq!(payload.get_str("name"), Some("Ada"));
        assert!(payload.rename_field("mail", "email"));
        assert!(!payload.rename_field("mail", "email"));
        assert_eq!(payload.get_str("email"), Some("ada@example.com"));

        payload.set("name", "");
        assert_eq!(payload.get_str("name"), None);
    }

    #[test]
    fn test_payload_from_json_requires_object() {
        assert!(EventPayload::from_json("X", json!([1, 2])).is_none());
        let payload = EventPayload::from_json("X", json!({"a": 1})).unwrap();
        assert_eq!(payload.to_json(), json!({"a": 1}));
    }
}
