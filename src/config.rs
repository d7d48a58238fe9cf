//! Runtime configuration
//!
//! Paths and defaults resolved from `EVENT_LIFECYCLE_*` environment
//! variables. Relative paths are resolved against the working directory.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::archive::{ArchiveConfig, RetentionPolicy, INDEX_FILE_NAME};
use crate::logging::LogFormat;

pub const DATA_DIR_VAR: &str = "EVENT_LIFECYCLE_DATA_DIR";
pub const ARCHIVE_DIR_VAR: &str = "EVENT_LIFECYCLE_ARCHIVE_DIR";
pub const LOG_FORMAT_VAR: &str = "EVENT_LIFECYCLE_LOG_FORMAT";
pub const COLD_RETENTION_VAR: &str = "EVENT_LIFECYCLE_COLD_RETENTION_DAYS";

const DEFAULT_DATA_DIR: &str = "data";
const ARCHIVE_DIR_NAME: &str = "archive";
const VERSIONS_FILE_NAME: &str = "event_versions.json";
const EVENTS_FILE_NAME: &str = "events.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConfig {
    pub data_dir: PathBuf,
    /// Where archive blobs are written
    pub archive_dir: PathBuf,
    pub index_path: PathBuf,
    /// Persisted version registry
    pub versions_path: PathBuf,
    /// JSONL event log used by the CLI
    pub events_path: PathBuf,
    pub log_format: LogFormat,
    pub retention: RetentionPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl LifecycleConfig {
    /// Layout everything under `data_dir`
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        let data_dir = data_dir.into();
        let archive_dir = data_dir.join(ARCHIVE_DIR_NAME);
        Self {
            index_path: archive_dir.join(INDEX_FILE_NAME),
            versions_path: data_dir.join(VERSIONS_FILE_NAME),
            events_path: data_dir.join(EVENTS_FILE_NAME),
            archive_dir,
            data_dir,
            log_format: LogFormat::default(),
            retention: RetentionPolicy::default(),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Invalid values are logged
    /// and the default kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(|v| resolve(&current_dir, &v))
            .unwrap_or_else(|| current_dir.join(DEFAULT_DATA_DIR));
        let mut config = Self::new(data_dir);

        if let Some(dir) = lookup(ARCHIVE_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            config.archive_dir = resolve(&current_dir, &dir);
            config.index_path = config.archive_dir.join(INDEX_FILE_NAME);
        }

        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            match format.parse() {
                Ok(format) => config.log_format = format,
                Err(e) => warn!(var = LOG_FORMAT_VAR, error = %e, "Ignoring invalid log format"),
            }
        }

        if let Some(days) = lookup(COLD_RETENTION_VAR) {
            match days.trim().parse::<u32>() {
                Ok(days) => config.retention.cold_data_retention_days = days,
                Err(e) => warn!(var = COLD_RETENTION_VAR, value = %days, error = %e, "Ignoring invalid retention days"),
            }
        }

        config
    }

    /// Archive config writing into `archive_dir` with this retention policy
    pub fn archive_config(&self) -> ArchiveConfig {
        ArchiveConfig {
            storage_location: self.archive_dir.clone(),
            retention: self.retention.clone(),
            ..Default::default()
        }
    }
}

fn resolve(base: &Path, value: &str) -> PathBuf {
    let path = Path::new(value.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
