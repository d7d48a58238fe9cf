//! Version registry keyed by event type and version string

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{CompatibilityResult, EventVersion};

use super::compatibility::classify;
use super::persistence;
use super::semantic::{compare_versions, SemanticVersion};

type VersionMap = BTreeMap<String, BTreeMap<String, EventVersion>>;

/// Registers schema versions per event type and answers compatibility
/// questions between them.
///
/// In-memory by default; [`VersionManager::with_persistence`] backs the
/// registry with a JSON file rewritten after every mutation.
#[derive(Debug, Default)]
pub struct VersionManager {
    versions: RwLock<VersionMap>,
    persistence_path: Option<PathBuf>,
}

impl VersionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a registry backed by `path`, loading any versions already there.
    pub fn with_persistence<P: AsRef<Path>>(path: P) -> LifecycleResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut map = VersionMap::new();
        let loaded = persistence::load(&path)?;
        let count = loaded.len();
        for version in loaded {
            map.entry(version.event_type.clone())
                .or_default()
                .insert(version.version.clone(), version);
        }
        debug!(path = %path.display(), versions = count, "Loaded version registry");

        Ok(Self {
            versions: RwLock::new(map),
            persistence_path: Some(path),
        })
    }

    /// Insert or overwrite `(event_type, version.version)`.
    ///
    /// Malformed version strings are accepted with a warning; comparisons
    /// involving them classify as incompatible. Fails only when the
    /// registry is persisted and the write fails.
    pub fn register_version(
        &self,
        event_type: &str,
        mut version: EventVersion,
    ) -> LifecycleResult<()> {
        if version.event_type != event_type {
            debug!(
                event_type,
                declared = %version.event_type,
                "Normalizing event type of registered version"
            );
            version.event_type = event_type.to_string();
        }
        if SemanticVersion::parse(&version.version).is_none() {
            warn!(
                event_type,
                version = %version.version,
                "Registering malformed version string"
            );
        }

        let mut versions = self.versions.write();
        let key = version.version.clone();
        let mut next = versions.clone();
        let previous = next
            .entry(event_type.to_string())
            .or_default()
            .insert(key.clone(), version);

        // The live map only changes once the file holds the new state.
        self.persist(&next)?;
        *versions = next;

        if previous.is_some() {
            warn!(event_type, version = %key, "Overwriting registered version");
        } else {
            info!(event_type, version = %key, "Registered event version");
        }
        Ok(())
    }

    /// Exact version, or the latest when `version` is `None`
    pub fn get_version(&self, event_type: &str, version: Option<&str>) -> Option<EventVersion> {
        match version {
            Some(version) => self
                .versions
                .read()
                .get(event_type)
                .and_then(|versions| versions.get(version))
                .cloned(),
            None => self.latest_version(event_type),
        }
    }

    /// Exact version, failing with `VersionNotFound` when unregistered
    pub fn require_version(&self, event_type: &str, version: &str) -> LifecycleResult<EventVersion> {
        self.get_version(event_type, Some(version))
            .ok_or_else(|| LifecycleError::VersionNotFound {
                event_type: event_type.to_string(),
                version: version.to_string(),
            })
    }

    /// Highest non-deprecated version; if every version is deprecated,
    /// the highest overall.
    pub fn latest_version(&self, event_type: &str) -> Option<EventVersion> {
        let versions = self.versions.read();
        let versions = versions.get(event_type)?;

        let by_semver = |a: &&EventVersion, b: &&EventVersion| compare_versions(&a.version, &b.version);
        versions
            .values()
            .filter(|v| !v.is_deprecated())
            .max_by(by_semver)
            .or_else(|| versions.values().max_by(by_semver))
            .cloned()
    }

    /// Every version of `event_type`, highest first
    pub fn get_all_versions(&self, event_type: &str) -> Vec<EventVersion> {
        let mut all: Vec<EventVersion> = self
            .versions
            .read()
            .get(event_type)
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| descending(&a.version, &b.version));
        all
    }

    /// Event types with at least one registered version
    pub fn event_types(&self) -> Vec<String> {
        self.versions.read().keys().cloned().collect()
    }

    pub fn check_compatibility(
        &self,
        event_type: &str,
        from_version: &str,
        to_version: &str,
    ) -> CompatibilityResult {
        let versions = self.versions.read();
        let registered = versions.get(event_type);
        let from = registered.and_then(|v| v.get(from_version));
        let to = registered.and_then(|v| v.get(to_version));

        let result = classify(from, to);
        debug!(
            event_type,
            from_version,
            to_version,
            compatibility = ?result.compatibility_type,
            risk = ?result.risk_level,
            "Checked version compatibility"
        );
        result
    }

    /// Versions that data at `version` can be read as without migration,
    /// highest first. Includes `version` itself when registered.
    pub fn get_compatible_versions(&self, event_type: &str, version: &str) -> Vec<String> {
        let versions = self.versions.read();
        let Some(registered) = versions.get(event_type) else {
            return Vec::new();
        };
        let from = registered.get(version);

        let mut compatible: Vec<String> = registered
            .values()
            .filter(|other| classify(from, Some(other)).compatible)
            .map(|other| other.version.clone())
            .collect();
        compatible.sort_by(|a, b| descending(a, b));
        compatible
    }

    /// Whether reading `from_version` data as `to_version` needs a migration
    pub fn is_migration_required(
        &self,
        event_type: &str,
        from_version: &str,
        to_version: &str,
    ) -> bool {
        !self
            .check_compatibility(event_type, from_version, to_version)
            .compatible
    }

    /// Mark a version deprecated at `at` (default now).
    ///
    /// Unknown versions are a logged no-op, as is a deprecation the
    /// registry file could not record. Returns whether a version was
    /// updated.
    pub fn deprecate_version(
        &self,
        event_type: &str,
        version: &str,
        at: Option<DateTime<Utc>>,
    ) -> bool {
        let mut versions = self.versions.write();
        let mut next = versions.clone();
        let Some(entry) = next
            .get_mut(event_type)
            .and_then(|registered| registered.get_mut(version))
        else {
            warn!(event_type, version, "Cannot deprecate unknown version");
            return false;
        };

        let at = at.unwrap_or_else(Utc::now);
        entry.deprecated_at = Some(at);

        if let Err(e) = self.persist(&next) {
            warn!(event_type, version, error = %e, "Failed to persist deprecation");
            return false;
        }
        *versions = next;
        info!(event_type, version, deprecated_at = %at, "Deprecated event version");
        true
    }

    fn persist(&self, versions: &VersionMap) -> LifecycleResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let all = versions
            .values()
            .flat_map(|registered| registered.values().cloned())
            .collect();
        persistence::save(path, all)
    }
}

fn descending(a: &str, b: &str) -> Ordering {
    compare_versions(b, a)
}
