//! Schema version records and compatibility classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One registered schema version of an event type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventVersion {
    pub event_type: String,
    /// `major.minor.patch[-prerelease]`
    pub version: String,
    /// Opaque schema descriptor
    #[serde(default)]
    pub schema: Value,
    pub backward_compatible: bool,
    pub forward_compatible: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_at: Option<DateTime<Utc>>,
}

impl EventVersion {
    /// A new, non-deprecated version with no compatibility declarations
    pub fn new(event_type: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            version: version.into(),
            schema: Value::Null,
            backward_compatible: false,
            forward_compatible: false,
            created_at: Utc::now(),
            deprecated_at: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn backward_compatible(mut self, value: bool) -> Self {
        self.backward_compatible = value;
        self
    }

    pub fn forward_compatible(mut self, value: bool) -> Self {
        self.forward_compatible = value;
        self
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated_at.is_some()
    }
}

/// How two versions of the same event type relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityType {
    Identical,
    /// Same release line, only the patch level differs
    FullyCompatible,
    BackwardCompatible,
    /// Reserved classification; the decision table never yields it
    ForwardCompatible,
    RequiresMigration,
    Incompatible,
}

impl CompatibilityType {
    /// Whether data can be consumed without running a migration
    pub fn is_compatible(&self) -> bool {
        matches!(
            self,
            CompatibilityType::Identical
                | CompatibilityType::FullyCompatible
                | CompatibilityType::BackwardCompatible
                | CompatibilityType::ForwardCompatible
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Result of comparing two versions; computed, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    pub compatible: bool,
    pub compatibility_type: CompatibilityType,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_suggestion: Option<String>,
}

impl CompatibilityResult {
    pub fn new(compatibility_type: CompatibilityType, risk_level: RiskLevel) -> Self {
        Self {
            compatible: compatibility_type.is_compatible(),
            compatibility_type,
            risk_level,
            migration_suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.migration_suggestion = Some(suggestion.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatible_flag_follows_type() {
        assert!(CompatibilityResult::new(CompatibilityType::Identical, RiskLevel::None).compatible);
        assert!(
            CompatibilityResult::new(CompatibilityType::BackwardCompatible, RiskLevel::Low)
                .compatible
        );
        assert!(
            !CompatibilityResult::new(CompatibilityType::RequiresMigration, RiskLevel::Medium)
                .compatible
        );
        assert!(
            !CompatibilityResult::new(CompatibilityType::Incompatible, RiskLevel::High).compatible
        );
    }

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_event_version_serializes_camel_case() {
        let version = EventVersion::new("UserCreated", "1.1.0").backward_compatible(true);
        let value = serde_json::to_value(&version).unwrap();
        assert_eq!(value["eventType"], "UserCreated");
        assert_eq!(value["backwardCompatible"], true);
        assert!(value.get("deprecatedAt").is_none());
    }
}
