//! Applies migration scripts to event payloads

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{ErrorKind, LifecycleError, LifecycleResult};
use crate::types::EventPayload;
use crate::utils::elapsed_ms;

use super::script::{MigrationScript, ScriptRegistry, TransformError};
use super::validation::{check_basic, RuleRegistry, ValidationRule};

/// Fields consulted, in order, for a payload's event type before falling
/// back to its `kind`
const EVENT_TYPE_FIELDS: [&str; 4] = ["eventType", "type", "event_name", "name"];

/// Batch progress is reported every this many items
pub const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub processed: usize,
    pub total: usize,
    pub percentage: f64,
}

/// One payload that failed during batch migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Position in the input batch
    pub index: usize,
    pub kind: ErrorKind,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchMigrationSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// Outcome of a batch migration: the migrated payloads in input order
/// (failures excluded) plus a record per failure.
#[derive(Debug, Clone, Default)]
pub struct BatchMigration {
    pub migrated: Vec<EventPayload>,
    pub failures: Vec<BatchFailure>,
}

impl BatchMigration {
    pub fn summary(&self) -> BatchMigrationSummary {
        BatchMigrationSummary {
            total: self.migrated.len() + self.failures.len(),
            success: self.migrated.len(),
            failed: self.failures.len(),
        }
    }
}

/// Registry of migration scripts and validation rules.
///
/// Independent of [`crate::versioning::VersionManager`]; version strings
/// are matched exactly.
#[derive(Default)]
pub struct VersionMigrator {
    scripts: ScriptRegistry,
    rules: RuleRegistry,
}

impl VersionMigrator {
    /// Migrator with the built-in validation rules
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Script registry
    // ========================================================================

    /// Register a transform for `(event_type, from_version, to_version)`.
    ///
    /// Registering the same key again replaces the previous script.
    pub fn register_migration_script<F>(
        &self,
        event_type: &str,
        from_version: &str,
        to_version: &str,
        transform: F,
    ) where
        F: Fn(EventPayload) -> Result<EventPayload, TransformError> + Send + Sync + 'static,
    {
        self.register_script(MigrationScript::new(event_type, from_version, to_version, transform));
    }

    pub fn register_script(&self, script: MigrationScript) {
        let (event_type, from, to) = (
            script.event_type.clone(),
            script.from_version.clone(),
            script.to_version.clone(),
        );
        if self.scripts.insert(script).is_some() {
            warn!(
                event_type = %event_type,
                from_version = %from,
                to_version = %to,
                "Overwriting migration script"
            );
        } else {
            info!(
                event_type = %event_type,
                from_version = %from,
                to_version = %to,
                "Registered migration script"
            );
        }
    }

    /// Returns whether a script was removed
    pub fn unregister_migration_script(
        &self,
        event_type: &str,
        from_version: &str,
        to_version: &str,
    ) -> bool {
        self.scripts.remove(event_type, from_version, to_version)
    }

    pub fn scripts_for(&self, event_type: &str) -> Vec<MigrationScript> {
        self.scripts.for_event_type(event_type)
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    /// Scripts that would run to take `event_type` from `from_version` to
    /// `to_version`: the direct script if registered, else the shortest chain.
    pub fn migration_path(
        &self,
        event_type: &str,
        from_version: &str,
        to_version: &str,
    ) -> Option<Vec<MigrationScript>> {
        if let Some(direct) = self.scripts.get(event_type, from_version, to_version) {
            return Some(vec![direct]);
        }
        self.scripts.shortest_path(event_type, from_version, to_version)
    }

    pub fn has_migration_path(&self, event_type: &str, from_version: &str, to_version: &str) -> bool {
        self.migration_path(event_type, from_version, to_version)
            .is_some()
    }

    // ========================================================================
    // Migration
    // ========================================================================

    /// Migrate `payload` from `from_version` to `to_version`.
    ///
    /// Equal versions return the payload untouched. When neither a direct
    /// script nor a chain exists the payload is returned unchanged with a
    /// warning. A failing transform aborts with `MigrationScript`.
    pub fn migrate_event_data(
        &self,
        payload: EventPayload,
        from_version: &str,
        to_version: &str,
    ) -> LifecycleResult<EventPayload> {
        let event_type = extract_event_type(&payload)?;

        if from_version == to_version {
            return Ok(payload);
        }

        let Some(path) = self.migration_path(&event_type, from_version, to_version) else {
            warn!(
                event_type = %event_type,
                from_version,
                to_version,
                "No migration path, returning payload unchanged"
            );
            return Ok(payload);
        };

        let started = Instant::now();
        let hops = path.len();
        let mut current = payload;
        for script in &path {
            current = script.apply(current).map_err(|e| {
                error!(
                    event_type = %event_type,
                    from_version = %script.from_version,
                    to_version = %script.to_version,
                    requested_from = from_version,
                    requested_to = to_version,
                    error = %e,
                    "Migration script failed"
                );
                LifecycleError::MigrationScript {
                    event_type: event_type.clone(),
                    from_version: script.from_version.clone(),
                    to_version: script.to_version.clone(),
                    cause: e.to_string(),
                }
            })?;
        }

        debug!(
            event_type = %event_type,
            from_version,
            to_version,
            hops,
            duration_ms = elapsed_ms(started),
            "Migrated event payload"
        );
        Ok(current)
    }

    /// Migrate every payload in order; failures are recorded, not fatal.
    pub fn migrate_batch_event_data(
        &self,
        payloads: Vec<EventPayload>,
        from_version: &str,
        to_version: &str,
    ) -> BatchMigration {
        self.migrate_batch_event_data_with_progress(payloads, from_version, to_version, |_| {})
    }

    /// [`VersionMigrator::migrate_batch_event_data`] reporting progress every
    /// [`PROGRESS_INTERVAL`] items and once at the end.
    pub fn migrate_batch_event_data_with_progress<F>(
        &self,
        payloads: Vec<EventPayload>,
        from_version: &str,
        to_version: &str,
        mut on_progress: F,
    ) -> BatchMigration
    where
        F: FnMut(MigrationProgress),
    {
        let started = Instant::now();
        let total = payloads.len();
        let mut outcome = BatchMigration::default();

        for (index, payload) in payloads.into_iter().enumerate() {
            match self.migrate_event_data(payload, from_version, to_version) {
                Ok(migrated) => outcome.migrated.push(migrated),
                Err(e) => {
                    warn!(index, kind = ?e.kind(), error = %e, "Batch item migration failed");
                    outcome.failures.push(BatchFailure {
                        index,
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }

            let processed = index + 1;
            if processed % PROGRESS_INTERVAL == 0 || processed == total {
                let progress = MigrationProgress {
                    processed,
                    total,
                    percentage: processed as f64 * 100.0 / total as f64,
                };
                debug!(processed, total, percentage = progress.percentage, "Batch migration progress");
                on_progress(progress);
            }
        }

        let summary = outcome.summary();
        info!(
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            from_version,
            to_version,
            duration_ms = elapsed_ms(started),
            "Batch migration finished"
        );
        outcome
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Add a rule that payloads of `event_type` must satisfy at `version`
    pub fn register_validation_rule<F>(&self, event_type: &str, version: &str, rule: F)
    where
        F: Fn(&EventPayload) -> Result<(), String> + Send + Sync + 'static,
    {
        let rule: ValidationRule = Arc::new(rule);
        self.rules.add(event_type, version, rule);
    }

    /// Check a migrated payload against the basic integrity layer and the
    /// rules registered for its type at `to_version`.
    pub fn check_migration(&self, payload: &EventPayload, to_version: &str) -> LifecycleResult<()> {
        check_basic(payload).map_err(LifecycleError::Validation)?;

        let event_type = payload.get_str("eventType").unwrap_or(payload.kind.as_str());
        self.rules
            .check(event_type, to_version, payload)
            .map_err(LifecycleError::Validation)
    }

    pub fn validate_migration(&self, payload: &EventPayload, to_version: &str) -> bool {
        match self.check_migration(payload, to_version) {
            Ok(()) => true,
            Err(e) => {
                debug!(to_version, error = %e, "Migration validation failed");
                false
            }
        }
    }
}

/// First non-empty string among the candidate fields, else the payload kind.
pub fn extract_event_type(payload: &EventPayload) -> LifecycleResult<String> {
    EVENT_TYPE_FIELDS
        .iter()
        .find_map(|field| payload.get_str(field))
        .or_else(|| Some(payload.kind.as_str()).filter(|kind| !kind.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| LifecycleError::EventTypeExtraction {
            kind: payload.kind.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: usize) -> EventPayload {
        EventPayload::from_json(
            "UserCreated",
            json!({
                "eventId": format!("evt-{}", id),
                "aggregateId": format!("user-{}", id),
                "eventType": "UserCreated",
                "occurredOn": "2024-03-01T12:00:00Z",
                "mail": format!("user{}@example.com", id),
            }),
        )
        .unwrap()
    }

    fn migrator() -> VersionMigrator {
        let migrator = VersionMigrator::new();
        migrator.register_migration_script("UserCreated", "1.0.0", "1.1.0", |mut payload| {
            if !payload.rename_field("mail", "email") {
                return Err("payload has no 'mail' field".into());
            }
            Ok(payload)
        });
        migrator.register_migration_script("UserCreated", "1.1.0", "1.2.0", |payload| {
            Ok(payload.with_field("verified", false))
        });
        migrator
    }

    #[test]
    fn test_extract_event_type_order() {
        let payload = EventPayload::new("Fallback")
            .with_field("name", "ByName")
            .with_field("type", "ByType");
        assert_eq!(extract_event_type(&payload).unwrap(), "ByType");

        let payload = EventPayload::new("Fallback").with_field("eventType", "");
        assert_eq!(extract_event_type(&payload).unwrap(), "Fallback");

        let err = extract_event_type(&EventPayload::default()).unwrap_err();
        assert!(matches!(err, LifecycleError::EventTypeExtraction { .. }));
    }

    #[test]
    fn test_same_version_is_untouched() {
        let migrator = VersionMigrator::new();
        let payload = user(1);
        assert_eq!(migrator.migrate_event_data(payload.clone(), "1.0.0", "1.0.0").unwrap(), payload);
    }

    #[test]
    fn test_same_version_still_requires_event_type() {
        let migrator = VersionMigrator::new();
        assert!(migrator
            .migrate_event_data(EventPayload::default(), "1.0.0", "1.0.0")
            .is_err());
    }

    #[test]
    fn test_direct_and_chained_migration() {
        let migrator = migrator();

        let direct = migrator.migrate_event_data(user(1), "1.0.0", "1.1.0").unwrap();
        assert_eq!(direct.get_str("email"), Some("user1@example.com"));
        assert!(direct.get("verified").is_none());

        let chained = migrator.migrate_event_data(user(1), "1.0.0", "1.2.0").unwrap();
        assert_eq!(chained.get_str("email"), Some("user1@example.com"));
        assert_eq!(chained.get("verified"), Some(&json!(false)));
        assert!(migrator.has_migration_path("UserCreated", "1.0.0", "1.2.0"));
        assert_eq!(migrator.migration_path("UserCreated", "1.0.0", "1.2.0").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_path_passes_through() {
        let migrator = migrator();
        let payload = user(1);
        let result = migrator.migrate_event_data(payload.clone(), "1.0.0", "9.0.0").unwrap();
        assert_eq!(result, payload);
        assert!(!migrator.has_migration_path("UserCreated", "1.0.0", "9.0.0"));
    }

    #[test]
    fn test_transform_failure_propagates() {
        let migrator = migrator();
        let mut payload = user(1);
        payload.remove("mail");

        let err = migrator.migrate_event_data(payload, "1.0.0", "1.1.0").unwrap_err();
        match err {
            LifecycleError::MigrationScript { from_version, to_version, cause, .. } => {
                assert_eq!(from_version, "1.0.0");
                assert_eq!(to_version, "1.1.0");
                assert!(cause.contains("mail"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_batch_partial_failure() {
        let migrator = migrator();
        let mut broken = user(2);
        broken.remove("mail");

        let outcome = migrator.migrate_batch_event_data(vec![user(1), broken, user(3)], "1.0.0", "1.1.0");

        assert_eq!(outcome.migrated.len(), 2);
        assert_eq!(
            outcome.summary(),
            BatchMigrationSummary { total: 3, success: 2, failed: 1 }
        );
        assert_eq!(outcome.failures[0].index, 1);
        assert_eq!(outcome.failures[0].kind, ErrorKind::MigrationScript);
        assert_eq!(outcome.migrated[1].get_str("eventId"), Some("evt-3"));
    }

    #[test]
    fn test_batch_progress_interval() {
        let migrator = migrator();
        let payloads: Vec<_> = (0..250).map(user).collect();
        let mut reports = Vec::new();

        migrator.migrate_batch_event_data_with_progress(payloads, "1.0.0", "1.1.0", |p| {
            reports.push(p)
        });

        let processed: Vec<usize> = reports.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![100, 200, 250]);
        assert_eq!(reports.last().unwrap().percentage, 100.0);
    }

    #[test]
    fn test_validate_migration() {
        let migrator = migrator();
        let migrated = migrator.migrate_event_data(user(1), "1.0.0", "1.1.0").unwrap();
        assert!(migrator.validate_migration(&migrated, "1.1.0"));
        assert!(!migrator.validate_migration(&user(1), "1.1.0"));
        assert!(migrator.validate_migration(&user(1), "1.0.0"));

        let err = migrator.check_migration(&EventPayload::new("UserCreated"), "1.0.0").unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[test]
    fn test_register_validation_rule() {
        let migrator = migrator();
        migrator.register_validation_rule("UserCreated", "1.2.0", |payload| {
            match payload.get("verified") {
                Some(serde_json::Value::Bool(_)) => Ok(()),
                _ => Err("verified flag required".to_string()),
            }
        });

        let migrated = migrator.migrate_event_data(user(1), "1.0.0", "1.2.0").unwrap();
        assert!(migrator.validate_migration(&migrated, "1.2.0"));
        assert!(!migrator.validate_migration(&user(1), "1.2.0"));
    }

    #[test]
    fn test_overwrite_and_unregister() {
        let migrator = migrator();
        migrator.register_migration_script("UserCreated", "1.0.0", "1.1.0", |payload| {
            Ok(payload.with_field("overwritten", true))
        });
        assert_eq!(migrator.script_count(), 2);

        let migrated = migrator.migrate_event_data(user(1), "1.0.0", "1.1.0").unwrap();
        assert_eq!(migrated.get("overwritten"), Some(&json!(true)));

        assert!(migrator.unregister_migration_script("UserCreated", "1.0.0", "1.1.0"));
        assert_eq!(migrator.scripts_for("UserCreated").len(), 1);
    }
}
