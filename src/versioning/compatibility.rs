//! Compatibility classification between two versions of one event type.
//!
//! Rules are evaluated in order; the first match wins:
//!
//! | # | Condition                                  | Type                  | Risk   |
//! |---|--------------------------------------------|-----------------------|--------|
//! | 1 | either version unregistered                | `INCOMPATIBLE`        | HIGH   |
//! | 2 | same version string                        | `IDENTICAL`           | NONE   |
//! | 3 | either version deprecated                  | `INCOMPATIBLE`        | HIGH   |
//! | 4 | either version string malformed            | `INCOMPATIBLE`        | MEDIUM |
//! | 5 | major differs                              | `INCOMPATIBLE`        | HIGH   |
//! | 6 | minor differs, upgrade to a backward-compatible target | `BACKWARD_COMPATIBLE` | LOW |
//! | 6 | minor differs, otherwise                   | `REQUIRES_MIGRATION`  | MEDIUM |
//! | 7 | patch differs, both releases               | `FULLY_COMPATIBLE`    | LOW    |
//! | 8 | either side is a pre-release               | `INCOMPATIBLE`        | MEDIUM |
//! | 9 | otherwise                                  | `FULLY_COMPATIBLE`    | LOW    |

use crate::types::{CompatibilityResult, CompatibilityType, EventVersion, RiskLevel};

use super::semantic::SemanticVersion;

/// Classify migrating data from `from` to `to`.
///
/// `None` stands for a version that is not registered.
pub fn classify(from: Option<&EventVersion>, to: Option<&EventVersion>) -> CompatibilityResult {
    let (from, to) = match (from, to) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            return CompatibilityResult::new(CompatibilityType::Incompatible, RiskLevel::High)
                .with_suggestion("Register both versions before comparing them")
        }
    };

    if from.version == to.version {
        return CompatibilityResult::new(CompatibilityType::Identical, RiskLevel::None);
    }

    if from.is_deprecated() || to.is_deprecated() {
        let deprecated = if to.is_deprecated() { &to.version } else { &from.version };
        return CompatibilityResult::new(CompatibilityType::Incompatible, RiskLevel::High)
            .with_suggestion(format!(
                "Version {} of {} is deprecated; upgrade to a supported version",
                deprecated, to.event_type
            ));
    }

    let (from_semver, to_semver) = match (
        SemanticVersion::parse(&from.version),
        SemanticVersion::parse(&to.version),
    ) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return CompatibilityResult::new(CompatibilityType::Incompatible, RiskLevel::Medium)
                .with_suggestion("Use major.minor.patch version strings")
        }
    };

    if from_semver.major() != to_semver.major() {
        return CompatibilityResult::new(CompatibilityType::Incompatible, RiskLevel::High)
            .with_suggestion(format!(
                "Major version change {} -> {}; register a migration script",
                from.version, to.version
            ));
    }

    if from_semver.minor() != to_semver.minor() {
        if to_semver.minor() > from_semver.minor() && to.backward_compatible {
            return CompatibilityResult::new(
                CompatibilityType::BackwardCompatible,
                RiskLevel::Low,
            );
        }
        return CompatibilityResult::new(CompatibilityType::RequiresMigration, RiskLevel::Medium)
            .with_suggestion(format!(
                "Migrate {} data from {} to {}",
                to.event_type, from.version, to.version
            ));
    }

    let both_releases = !from_semver.is_prerelease() && !to_semver.is_prerelease();
    if from_semver.patch() != to_semver.patch() && both_releases {
        return CompatibilityResult::new(CompatibilityType::FullyCompatible, RiskLevel::Low);
    }

    if !both_releases {
        return CompatibilityResult::new(CompatibilityType::Incompatible, RiskLevel::Medium)
            .with_suggestion("Pre-release versions are not interchangeable with releases");
    }

    CompatibilityResult::new(CompatibilityType::FullyCompatible, RiskLevel::Low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn version(v: &str) -> EventVersion {
        EventVersion::new("UserCreated", v)
    }

    fn check(from: &EventVersion, to: &EventVersion) -> (CompatibilityType, RiskLevel) {
        let result = classify(Some(from), Some(to));
        (result.compatibility_type, result.risk_level)
    }

    #[test]
    fn test_unknown_version() {
        let result = classify(Some(&version("1.0.0")), None);
        assert_eq!(result.compatibility_type, CompatibilityType::Incompatible);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(!result.compatible);
    }

    #[test]
    fn test_identical() {
        assert_eq!(
            check(&version("1.0.0"), &version("1.0.0")),
            (CompatibilityType::Identical, RiskLevel::None)
        );
    }

    #[test]
    fn test_deprecated_suggests_upgrade() {
        let mut old = version("1.0.0");
        old.deprecated_at = Some(Utc::now());
        let result = classify(Some(&old), Some(&version("1.0.1")));
        assert_eq!(result.compatibility_type, CompatibilityType::Incompatible);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(result.migration_suggestion.unwrap().contains("upgrade"));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            check(&version("1.0"), &version("1.0.1")),
            (CompatibilityType::Incompatible, RiskLevel::Medium)
        );
    }

    #[test]
    fn test_major_change() {
        assert_eq!(
            check(&version("1.0.0"), &version("2.0.0")),
            (CompatibilityType::Incompatible, RiskLevel::High)
        );
    }

    #[test]
    fn test_minor_change() {
        let target = version("1.1.0").backward_compatible(true);
        assert_eq!(
            check(&version("1.0.0"), &target),
            (CompatibilityType::BackwardCompatible, RiskLevel::Low)
        );
        assert_eq!(
            check(&version("1.0.0"), &version("1.1.0")),
            (CompatibilityType::RequiresMigration, RiskLevel::Medium)
        );
        // downgrade never qualifies, whatever the target declares
        let downgrade = version("1.0.0").backward_compatible(true);
        assert_eq!(
            check(&version("1.1.0"), &downgrade),
            (CompatibilityType::RequiresMigration, RiskLevel::Medium)
        );
    }

    #[test]
    fn test_patch_change() {
        assert_eq!(
            check(&version("1.0.0"), &version("1.0.5")),
            (CompatibilityType::FullyCompatible, RiskLevel::Low)
        );
    }

    #[test]
    fn test_prerelease() {
        assert_eq!(
            check(&version("1.0.0-beta"), &version("1.0.0")),
            (CompatibilityType::Incompatible, RiskLevel::Medium)
        );
        assert_eq!(
            check(&version("1.0.0-alpha"), &version("1.0.1-beta")),
            (CompatibilityType::Incompatible, RiskLevel::Medium)
        );
    }

    #[test]
    fn test_same_release_different_spelling() {
        assert_eq!(
            check(&version("v1.0.0"), &version("1.0.0")),
            (CompatibilityType::FullyCompatible, RiskLevel::Low)
        );
    }
}
