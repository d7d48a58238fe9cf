//! Post-migration validation
//!
//! Two layers, both must pass:
//! - basic integrity: `eventId`, `aggregateId`, `eventType` are strings and
//!   `occurredOn` is an RFC 3339 timestamp or an epoch integer
//! - rules registered for `(event type, target version)`

use std::collections::HashMap;
use std::sync::Arc;

use chrono::DateTime;
use parking_lot::RwLock;
use serde_json::Value;

use crate::types::EventPayload;

/// Version-specific check; `Err` carries the reason
pub type ValidationRule = Arc<dyn Fn(&EventPayload) -> Result<(), String> + Send + Sync>;

const REQUIRED_STRING_FIELDS: [&str; 3] = ["eventId", "aggregateId", "eventType"];

pub(crate) fn check_basic(payload: &EventPayload) -> Result<(), String> {
    for field in REQUIRED_STRING_FIELDS {
        match payload.get(field) {
            Some(Value::String(_)) => {}
            Some(_) => return Err(format!("field '{}' must be a string", field)),
            None => return Err(format!("missing required field '{}'", field)),
        }
    }

    match payload.get("occurredOn") {
        Some(Value::String(s)) if DateTime::parse_from_rfc3339(s).is_ok() => Ok(()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
        Some(_) => Err("field 'occurredOn' must be a timestamp".to_string()),
        None => Err("missing required field 'occurredOn'".to_string()),
    }
}

/// `UserCreated` at 1.1.0 carries an email address
fn require_email(payload: &EventPayload) -> Result<(), String> {
    match payload.get("email") {
        Some(Value::String(_)) => Ok(()),
        _ => Err("UserCreated 1.1.0 requires a string 'email' field".to_string()),
    }
}

/// Rules keyed by (event type, version)
pub(crate) struct RuleRegistry {
    rules: RwLock<HashMap<(String, String), Vec<ValidationRule>>>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let registry = Self {
            rules: RwLock::new(HashMap::new()),
        };
        registry.add("UserCreated", "1.1.0", Arc::new(require_email));
        registry
    }
}

impl RuleRegistry {
    pub fn add(&self, event_type: &str, version: &str, rule: ValidationRule) {
        self.rules
            .write()
            .entry((event_type.to_string(), version.to_string()))
            .or_default()
            .push(rule);
    }

    #[cfg(test)]
    pub fn count(&self, event_type: &str, version: &str) -> usize {
        self.rules
            .read()
            .get(&(event_type.to_string(), version.to_string()))
            .map_or(0, Vec::len)
    }

    /// Run every rule for `(event_type, version)`; the first failure wins.
    pub fn check(&self, event_type: &str, version: &str, payload: &EventPayload) -> Result<(), String> {
        let rules = self
            .rules
            .read()
            .get(&(event_type.to_string(), version.to_string()))
            .cloned()
            .unwrap_or_default();

        rules.iter().try_for_each(|rule| rule(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_created() -> EventPayload {
        EventPayload::from_json(
            "UserCreated",
            json!({
                "eventId": "evt-1",
                "aggregateId": "user-1",
                "eventType": "UserCreated",
                "occurredOn": "2024-03-01T12:00:00Z",
                "email": "ada@example.com",
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_basic_accepts_complete_payload() {
        assert!(check_basic(&user_created()).is_ok());

        let mut epoch = user_created();
        epoch.set("occurredOn", 1_709_294_400_000u64);
        assert!(check_basic(&epoch).is_ok());
    }

    #[test]
    fn test_basic_rejects_missing_or_mistyped() {
        let mut payload = user_created();
        payload.remove("aggregateId");
        assert!(check_basic(&payload).unwrap_err().contains("aggregateId"));

        let mut payload = user_created();
        payload.set("eventId", 42);
        assert!(check_basic(&payload).unwrap_err().contains("eventId"));

        let mut payload = user_created();
        payload.set("occurredOn", "yesterday");
        assert!(check_basic(&payload).unwrap_err().contains("occurredOn"));
    }

    #[test]
    fn test_builtin_email_rule() {
        let rules = RuleRegistry::default();
        assert_eq!(rules.count("UserCreated", "1.1.0"), 1);
        assert!(rules.check("UserCreated", "1.1.0", &user_created()).is_ok());

        let mut payload = user_created();
        payload.remove("email");
        assert!(rules.check("UserCreated", "1.1.0", &payload).is_err());
        assert!(rules.check("UserCreated", "1.0.0", &payload).is_ok());
        assert!(rules.check("OrderPlaced", "1.1.0", &payload).is_ok());
    }

    #[test]
    fn test_custom_rule() {
        let rules = RuleRegistry::default();
        rules.add(
            "UserCreated",
            "2.0.0",
            Arc::new(|payload: &EventPayload| {
                payload
                    .get_str("displayName")
                    .map(|_| ())
                    .ok_or_else(|| "displayName required".to_string())
            }),
        );
        assert!(rules.check("UserCreated", "2.0.0", &user_created()).is_err());
    }
}
